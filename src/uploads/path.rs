// Lexical path handling for upload requests
// Nothing here touches the filesystem; all work is done on path text.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{AppError, UploadError};

/// Absolute, normalized directory that bounds every served file.
///
/// Built once at startup and shared read-only by all requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRoot {
    dir: String,
}

impl UploadRoot {
    /// Accepts only absolute paths; `.` and `..` components are collapsed.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self, AppError> {
        let dir = dir.as_ref();
        let text = dir
            .to_str()
            .filter(|_| dir.is_absolute())
            .ok_or_else(|| AppError::UploadRoot(dir.display().to_string()))?;

        Ok(Self {
            dir: normalize(text),
        })
    }

    pub fn as_path(&self) -> &Path {
        Path::new(&self.dir)
    }

    pub fn as_str(&self) -> &str {
        &self.dir
    }

    /// Component-wise containment check (`/srv/up` does not contain `/srv/upx`)
    pub fn contains(&self, path: &Path) -> bool {
        path.starts_with(self.as_path())
    }
}

impl fmt::Display for UploadRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.dir)
    }
}

/// Untrusted, non-empty list of path segments taken from a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestedPath {
    segments: Vec<String>,
}

impl RequestedPath {
    pub fn new<I, S>(segments: I) -> Result<Self, UploadError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() {
            return Err(UploadError::InvalidRequest);
        }
        Ok(Self { segments })
    }

    /// Parse the part of a URI path that follows the upload route prefix.
    ///
    /// Empty pieces (`a//b`, trailing `/`) are dropped and each piece is
    /// percent-decoded, so a decoded segment may itself contain `/` or `..`.
    pub fn from_uri_tail(tail: &str) -> Result<Self, UploadError> {
        let segments = tail
            .split('/')
            .filter(|piece| !piece.is_empty())
            .map(|piece| {
                urlencoding::decode(piece)
                    .map(std::borrow::Cow::into_owned)
                    .map_err(|_| UploadError::InvalidRequest)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(segments)
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

impl fmt::Display for RequestedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

/// Collapse `.`, `..` and repeated separators using POSIX rules.
///
/// Leading `..` survives in relative paths; `..` directly under `/` is
/// dropped. An empty relative result becomes `.`.
pub fn normalize(path: &str) -> String {
    let absolute = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();

    for component in path.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                if parts.last().is_some_and(|last| *last != "..") {
                    parts.pop();
                } else if !absolute {
                    parts.push("..");
                }
            }
            name => parts.push(name),
        }
    }

    let joined = parts.join("/");
    if absolute {
        format!("/{joined}")
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}

/// Remove every leading `../` or `..\` from a segment.
///
/// A bare `..` with no separator after it is left alone; the containment
/// check after joining rejects it.
pub fn strip_leading_parents(mut segment: &str) -> &str {
    while let Some(rest) = segment
        .strip_prefix("../")
        .or_else(|| segment.strip_prefix("..\\"))
    {
        segment = rest;
    }
    segment
}

/// Normalize one segment, then strip its leading parent escapes.
pub fn sanitize_segment(segment: &str) -> String {
    strip_leading_parents(&normalize(segment)).to_string()
}

/// Join sanitized segments below the root and normalize the result.
///
/// Absolute-looking segments are appended, they never replace the root.
pub fn join_under(root: &UploadRoot, segments: &[String]) -> PathBuf {
    let mut joined = String::with_capacity(
        root.as_str().len() + segments.iter().map(|s| s.len() + 1).sum::<usize>(),
    );
    joined.push_str(root.as_str());
    for segment in segments {
        joined.push('/');
        joined.push_str(segment);
    }
    PathBuf::from(normalize(&joined))
}
