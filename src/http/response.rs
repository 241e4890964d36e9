//! HTTP response building module
//!
//! Builders for every response the server sends. Failures to build a
//! response are logged and replaced by an empty response with the same
//! status.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{self, HeaderValue};
use hyper::{Response, StatusCode};

use super::cache::CachePolicy;
use crate::error::UploadError;
use crate::uploads::ServedFile;

/// Build 200 response for an uploaded file
///
/// HEAD requests keep every header, including `Content-Length`, but carry no body.
pub fn build_upload_response(file: &ServedFile, etag: &str, is_head: bool) -> Response<Full<Bytes>> {
    let body = if is_head {
        Bytes::new()
    } else {
        file.bytes.clone()
    };

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, file.content_type)
        .header(header::CONTENT_LENGTH, file.len())
        .header(header::CACHE_CONTROL, CachePolicy::UPLOADS.to_header_value())
        .header(header::ETAG, etag)
        .body(Full::new(body))
        .unwrap_or_else(|e| fallback(StatusCode::OK, &e))
}

/// Build 304 Not Modified response
pub fn build_304_response(etag: &str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::NOT_MODIFIED)
        .header(header::ETAG, etag)
        .header(header::CACHE_CONTROL, CachePolicy::UPLOADS.to_header_value())
        .body(Full::new(Bytes::new()))
        .unwrap_or_else(|e| fallback(StatusCode::NOT_MODIFIED, &e))
}

/// Map a resolver failure to its status and public message.
///
/// The body never contains a filesystem path.
pub fn build_upload_error_response(err: &UploadError) -> Response<Full<Bytes>> {
    let (status, message) = match err {
        UploadError::InvalidRequest => (StatusCode::BAD_REQUEST, "Invalid file path"),
        UploadError::AccessDenied => (StatusCode::FORBIDDEN, "Access denied"),
        UploadError::NotFound => (StatusCode::NOT_FOUND, "File not found"),
        UploadError::InternalError(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
        }
    };
    build_text_response(status, message)
}

/// Build 404 response for paths outside every route
pub fn build_404_response() -> Response<Full<Bytes>> {
    build_text_response(StatusCode::NOT_FOUND, "Not Found")
}

/// Build 405 Method Not Allowed response
pub fn build_405_response() -> Response<Full<Bytes>> {
    let mut response = build_text_response(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed");
    response
        .headers_mut()
        .insert(header::ALLOW, HeaderValue::from_static("GET, HEAD, OPTIONS"));
    response
}

/// Build 413 Payload Too Large response
pub fn build_413_response() -> Response<Full<Bytes>> {
    build_text_response(StatusCode::PAYLOAD_TOO_LARGE, "Payload Too Large")
}

/// Build OPTIONS response (preflight request)
pub fn build_options_response(enable_cors: bool) -> Response<Full<Bytes>> {
    let mut builder = Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header(header::ALLOW, "GET, HEAD, OPTIONS");

    if enable_cors {
        builder = builder
            .header(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*")
            .header(header::ACCESS_CONTROL_ALLOW_METHODS, "GET, HEAD, OPTIONS")
            .header(header::ACCESS_CONTROL_ALLOW_HEADERS, "If-None-Match")
            .header(header::ACCESS_CONTROL_MAX_AGE, "86400");
    }

    builder
        .body(Full::new(Bytes::new()))
        .unwrap_or_else(|e| fallback(StatusCode::NO_CONTENT, &e))
}

/// Allow cross-origin reads of any response, including uploads
pub fn apply_cors_headers(response: &mut Response<Full<Bytes>>) {
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_EXPOSE_HEADERS,
        HeaderValue::from_static("ETag, Content-Length"),
    );
}

/// Build health check response
pub fn build_health_response(status: &'static str) -> Response<Full<Bytes>> {
    build_text_response(StatusCode::OK, status)
}

/// Plain-text response that caches must not store
pub fn build_text_response(status: StatusCode, message: &'static str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .header(header::CONTENT_LENGTH, message.len())
        .header(header::CACHE_CONTROL, CachePolicy::NoStore.to_header_value())
        .body(Full::new(Bytes::from_static(message.as_bytes())))
        .unwrap_or_else(|e| fallback(status, &e))
}

fn fallback(status: StatusCode, error: &hyper::http::Error) -> Response<Full<Bytes>> {
    crate::logger::log_error(&format!("Failed to build {status} response: {error}"));
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = status;
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_text(response: Response<Full<Bytes>>) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn header_str<'a>(response: &'a Response<Full<Bytes>>, name: header::HeaderName) -> &'a str {
        response.headers().get(name).unwrap().to_str().unwrap()
    }

    #[tokio::test]
    async fn test_upload_response_headers() {
        let file = ServedFile {
            bytes: Bytes::from_static(b"photo-bytes"),
            content_type: "image/jpeg",
        };
        let response = build_upload_response(&file, "\"e1\"", false);
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header_str(&response, header::CONTENT_TYPE), "image/jpeg");
        assert_eq!(header_str(&response, header::CONTENT_LENGTH), "11");
        assert_eq!(
            header_str(&response, header::CACHE_CONTROL),
            "public, max-age=31536000, immutable"
        );
        assert_eq!(header_str(&response, header::ETAG), "\"e1\"");
        assert_eq!(body_text(response).await, "photo-bytes");
    }

    #[tokio::test]
    async fn test_head_upload_response_has_length_but_no_body() {
        let file = ServedFile {
            bytes: Bytes::from_static(b"12345"),
            content_type: "application/pdf",
        };
        let response = build_upload_response(&file, "\"e2\"", true);
        assert_eq!(header_str(&response, header::CONTENT_LENGTH), "5");
        assert_eq!(body_text(response).await, "");
    }

    #[tokio::test]
    async fn test_upload_error_statuses_and_bodies() {
        let cases = [
            (UploadError::InvalidRequest, StatusCode::BAD_REQUEST, "Invalid file path"),
            (UploadError::AccessDenied, StatusCode::FORBIDDEN, "Access denied"),
            (UploadError::NotFound, StatusCode::NOT_FOUND, "File not found"),
            (
                UploadError::InternalError(std::io::Error::other("disk on fire")),
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal Server Error",
            ),
        ];

        for (err, status, message) in cases {
            let response = build_upload_error_response(&err);
            assert_eq!(response.status(), status);
            assert_eq!(header_str(&response, header::CONTENT_TYPE), "text/plain; charset=utf-8");
            assert_eq!(body_text(response).await, message);
        }
    }

    #[test]
    fn test_405_lists_allowed_methods() {
        let response = build_405_response();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(header_str(&response, header::ALLOW), "GET, HEAD, OPTIONS");
    }

    #[test]
    fn test_options_cors_headers() {
        let plain = build_options_response(false);
        assert!(plain.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());

        let cors = build_options_response(true);
        assert_eq!(cors.status(), StatusCode::NO_CONTENT);
        assert_eq!(header_str(&cors, header::ACCESS_CONTROL_ALLOW_ORIGIN), "*");
    }

    #[tokio::test]
    async fn test_cors_headers_on_upload_response() {
        let file = ServedFile {
            bytes: Bytes::from_static(b"receipt"),
            content_type: "application/pdf",
        };
        let mut response = build_upload_response(&file, "\"abc\"", false);
        apply_cors_headers(&mut response);

        assert_eq!(header_str(&response, header::ACCESS_CONTROL_ALLOW_ORIGIN), "*");
        assert_eq!(
            header_str(&response, header::ACCESS_CONTROL_EXPOSE_HEADERS),
            "ETag, Content-Length"
        );
        assert_eq!(header_str(&response, header::CONTENT_LENGTH), "7");
        assert_eq!(body_text(response).await, "receipt");
    }
}
