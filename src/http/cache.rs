//! HTTP cache control module
//!
//! Provides `ETag` generation, conditional request matching and the
//! `Cache-Control` policies used by the server.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// One year, the longest max-age caches are expected to honor
pub const ONE_YEAR_SECS: u32 = 31_536_000;

/// Generate a strong `ETag` from file content
///
/// Returns a quoted string, e.g. `"1f3a9c"`.
pub fn generate_etag(content: &[u8]) -> String {
    let mut hasher = DefaultHasher::new();
    content.len().hash(&mut hasher);
    content.hash(&mut hasher);
    format!("\"{:x}\"", hasher.finish())
}

/// Check if the client's `If-None-Match` header matches the server's `ETag`
///
/// Supports a single tag, a comma separated list, weak tags (`W/"..."`)
/// and the `*` wildcard.
pub fn check_etag_match(if_none_match: Option<&str>, etag: &str) -> bool {
    if_none_match.is_some_and(|header| {
        header.split(',').map(str::trim).any(|candidate| {
            candidate == "*" || candidate.strip_prefix("W/").unwrap_or(candidate) == etag
        })
    })
}

/// Cache-Control policy attached to a response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// Content never changes under the same URL
    Immutable(u32),
    /// Must not be stored (errors, health probes)
    NoStore,
}

impl CachePolicy {
    /// Policy for uploaded files. Filenames are content-addressed or
    /// versioned by the uploader; nothing here invalidates them.
    pub const UPLOADS: Self = Self::Immutable(ONE_YEAR_SECS);

    pub fn to_header_value(self) -> String {
        match self {
            Self::Immutable(max_age) => format!("public, max-age={max_age}, immutable"),
            Self::NoStore => "no-store".to_string(),
        }
    }
}
