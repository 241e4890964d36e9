//! Request routing dispatch module
//!
//! Entry point for HTTP request processing: method validation, body size
//! check, route matching, access logging.

use crate::config::AppState;
use crate::handler::uploads;
use crate::http;
use crate::logger::{self, AccessLogEntry};
use http_body_util::Full;
use hyper::body::{Body as _, Bytes};
use hyper::header::{self, HeaderValue};
use hyper::http::request::Parts;
use hyper::{Method, Request, Response, Version};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

/// Request information needed by route handlers
pub struct RequestContext<'a> {
    pub path: &'a str,
    pub is_head: bool,
    pub if_none_match: Option<String>,
}

/// Main entry point for HTTP request handling
///
/// The request body is never read, so any body type is accepted.
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
    peer_addr: SocketAddr,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let started = Instant::now();
    let (parts, _) = req.into_parts();
    let method = &parts.method;

    let mut response = if let Some(resp) = check_http_method(method, state.config.http.enable_cors) {
        resp
    } else if let Some(resp) = check_body_size(&parts, state.config.http.max_body_size) {
        resp
    } else {
        let ctx = RequestContext {
            path: parts.uri.path(),
            is_head: *method == Method::HEAD,
            if_none_match: header_string(&parts, header::IF_NONE_MATCH),
        };
        route_request(&ctx, &state).await
    };

    if let Ok(server) = HeaderValue::from_str(&state.config.http.server_name) {
        response.headers_mut().insert(header::SERVER, server);
    }
    if state.config.http.enable_cors {
        http::apply_cors_headers(&mut response);
    }

    if state.access_log_enabled() {
        log_access(&parts, &response, peer_addr, started, &state);
    }

    Ok(response)
}

/// Check HTTP method and return appropriate response for non-GET/HEAD methods
fn check_http_method(method: &Method, enable_cors: bool) -> Option<Response<Full<Bytes>>> {
    match *method {
        Method::GET | Method::HEAD => None,
        Method::OPTIONS => Some(http::build_options_response(enable_cors)),
        _ => {
            logger::log_warning(&format!("Method not allowed: {method}"));
            Some(http::build_405_response())
        }
    }
}

/// Validate Content-Length header and return 413 if exceeded
fn check_body_size(parts: &Parts, max_body_size: u64) -> Option<Response<Full<Bytes>>> {
    let size_str = header_string(parts, header::CONTENT_LENGTH)?;
    match size_str.parse::<u64>() {
        Ok(size) if size > max_body_size => {
            logger::log_warning(&format!(
                "Request body too large: {size} bytes (max: {max_body_size})"
            ));
            Some(http::build_413_response())
        }
        Ok(_) => None,
        Err(_) => {
            logger::log_warning(&format!(
                "Invalid Content-Length value: '{size_str}', skipping size check"
            ));
            None
        }
    }
}

/// Route request based on path and configuration
async fn route_request(ctx: &RequestContext<'_>, state: &AppState) -> Response<Full<Bytes>> {
    let health = &state.config.health;
    if health.enabled && (ctx.path == health.liveness_path || ctx.path == health.readiness_path) {
        return http::build_health_response("ok");
    }

    match upload_tail(ctx.path, state.config.upload_prefix()) {
        Some(tail) => uploads::serve_upload(ctx, &state.resolver, tail).await,
        None => http::build_404_response(),
    }
}

/// Part of `path` after the upload prefix, or `None` when the path is
/// outside the upload route. `/uploads` and `/uploads/` yield `""`.
fn upload_tail<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = path.strip_prefix(prefix)?;
    if rest.is_empty() {
        Some(rest)
    } else {
        rest.strip_prefix('/')
    }
}

fn header_string(parts: &Parts, name: header::HeaderName) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string)
}

fn log_access(
    parts: &Parts,
    response: &Response<Full<Bytes>>,
    peer_addr: SocketAddr,
    started: Instant,
    state: &AppState,
) {
    let mut entry = AccessLogEntry::new(
        peer_addr.ip().to_string(),
        parts.method.to_string(),
        parts.uri.path().to_string(),
    );
    entry.query = parts.uri.query().map(ToString::to_string);
    entry.http_version = version_label(parts.version).to_string();
    entry.status = response.status().as_u16();
    entry.body_bytes = response.body().size_hint().exact().unwrap_or(0);
    entry.referer = header_string(parts, header::REFERER);
    entry.user_agent = header_string(parts, header::USER_AGENT);
    entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);

    logger::log_access(&entry, &state.config.logging.access_log_format);
}

fn version_label(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "0.9",
        Version::HTTP_10 => "1.0",
        Version::HTTP_2 => "2",
        Version::HTTP_3 => "3",
        _ => "1.1",
    }
}
