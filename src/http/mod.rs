//! HTTP protocol layer module
//!
//! Content types, cache headers and response builders, independent of
//! how requests are routed.

pub mod cache;
pub mod mime;
pub mod response;

pub use response::{
    apply_cors_headers,
    build_304_response, build_404_response, build_405_response, build_413_response,
    build_health_response, build_options_response, build_upload_error_response,
    build_upload_response,
};
