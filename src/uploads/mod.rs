//! Upload serving module
//!
//! Resolves untrusted request paths against a fixed upload root and loads
//! the matching file. Two layers guard the root: leading escape prefixes
//! are stripped from each segment, then the joined path must still lie
//! inside the root.

pub mod path;
mod resolver;

pub use path::{RequestedPath, UploadRoot};
pub use resolver::{ServedFile, UploadResolver};
