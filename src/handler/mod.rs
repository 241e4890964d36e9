//! Request handler module
//!
//! Dispatches requests to health checks and the upload file route.

pub mod router;
pub mod uploads;

// Re-export main entry point
pub use router::handle_request;
