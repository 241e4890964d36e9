//! Upload file serving
//!
//! Converts the URI tail into a `RequestedPath`, runs the resolver and maps
//! the outcome to an HTTP response.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::Response;

use crate::handler::router::RequestContext;
use crate::http::{self, cache};
use crate::uploads::{RequestedPath, UploadResolver};

/// Serve the file named by `tail`, the request path after the upload prefix
pub async fn serve_upload(
    ctx: &RequestContext<'_>,
    resolver: &UploadResolver,
    tail: &str,
) -> Response<Full<Bytes>> {
    let requested = match RequestedPath::from_uri_tail(tail) {
        Ok(requested) => requested,
        Err(err) => return http::build_upload_error_response(&err),
    };

    match resolver.resolve_and_serve(&requested).await {
        Ok(file) => {
            let etag = cache::generate_etag(&file.bytes);
            if cache::check_etag_match(ctx.if_none_match.as_deref(), &etag) {
                return http::build_304_response(&etag);
            }
            http::build_upload_response(&file, &etag, ctx.is_head)
        }
        Err(err) => http::build_upload_error_response(&err),
    }
}
