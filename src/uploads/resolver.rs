// Upload resolver
// Maps an untrusted request path to a file under the upload root and loads it

use hyper::body::Bytes;
use std::path::{Path, PathBuf};
use tokio::fs;

use super::path::{join_under, sanitize_segment, RequestedPath, UploadRoot};
use crate::error::UploadError;
use crate::http::mime;
use crate::logger;

/// File loaded from the upload root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServedFile {
    pub bytes: Bytes,
    pub content_type: &'static str,
}

impl ServedFile {
    /// Size of the file in bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }
}

/// Stateless resolver bound to one upload root.
///
/// Holds no mutable state; share it behind an `Arc` across requests.
#[derive(Debug, Clone)]
pub struct UploadResolver {
    root: UploadRoot,
}

impl UploadResolver {
    pub const fn new(root: UploadRoot) -> Self {
        Self { root }
    }

    pub const fn root(&self) -> &UploadRoot {
        &self.root
    }

    /// Sanitize each segment, join under the root and verify containment.
    ///
    /// The containment check after the join is the security boundary; the
    /// per-segment cleanup only removes leading escape prefixes.
    pub fn resolve(&self, requested: &RequestedPath) -> Result<PathBuf, UploadError> {
        let sanitized: Vec<String> = requested
            .segments()
            .iter()
            .map(|segment| sanitize_segment(segment))
            .collect();

        let resolved = join_under(&self.root, &sanitized);
        if !self.root.contains(&resolved) {
            logger::log_warning(&access_denied_message(requested, &resolved));
            return Err(UploadError::AccessDenied);
        }

        Ok(resolved)
    }

    /// Resolve the request and read the file exactly once.
    pub async fn resolve_and_serve(
        &self,
        requested: &RequestedPath,
    ) -> Result<ServedFile, UploadError> {
        let resolved = self.resolve(requested)?;

        match fs::read(&resolved).await {
            Ok(content) => Ok(ServedFile {
                bytes: Bytes::from(content),
                content_type: mime::content_type_for(&resolved),
            }),
            Err(e) => {
                let err = UploadError::from(e);
                if let UploadError::InternalError(cause) = &err {
                    logger::log_error(&read_failure_message(&resolved, cause));
                } else {
                    logger::log_debug(&format!("Upload not found: {}", resolved.display()));
                }
                Err(err)
            }
        }
    }
}

fn access_denied_message(requested: &RequestedPath, resolved: &Path) -> String {
    format!(
        "Upload path traversal blocked: '{requested}' -> {}",
        resolved.display()
    )
}

fn read_failure_message(path: &Path, cause: &std::io::Error) -> String {
    format!("Failed to read upload '{}': {cause}", path.display())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs as std_fs;
    use tempfile::TempDir;

    /// Lays out `<tmp>/public/uploads` with a few files and a sibling secret.
    fn fixture() -> (TempDir, UploadResolver) {
        let tmp = TempDir::new().unwrap();
        let uploads = tmp.path().join("public").join("uploads");
        std_fs::create_dir_all(uploads.join("equipment")).unwrap();
        std_fs::write(uploads.join("equipment").join("excavator.png"), b"\x89PNG fake").unwrap();
        std_fs::write(uploads.join("contract.pdf"), b"%PDF-1.7 rental").unwrap();
        std_fs::write(uploads.join("file.unknownext"), b"opaque").unwrap();
        std_fs::write(tmp.path().join("public").join("secret.txt"), b"top secret").unwrap();

        let resolver = UploadResolver::new(UploadRoot::new(&uploads).unwrap());
        (tmp, resolver)
    }

    fn request(segments: &[&str]) -> RequestedPath {
        RequestedPath::new(segments.iter().copied()).unwrap()
    }

    #[tokio::test]
    async fn test_serves_existing_file_with_type_and_length() {
        let (_tmp, resolver) = fixture();
        let file = resolver
            .resolve_and_serve(&request(&["equipment", "excavator.png"]))
            .await
            .unwrap();
        assert_eq!(file.content_type, "image/png");
        assert_eq!(file.len(), 9);
        assert_eq!(&file.bytes[..], b"\x89PNG fake");
    }

    #[tokio::test]
    async fn test_parent_segments_are_denied() {
        let (_tmp, resolver) = fixture();
        let result = resolver
            .resolve_and_serve(&request(&["..", "..", "etc", "passwd"]))
            .await;
        assert!(matches!(result, Err(UploadError::AccessDenied)));
    }

    #[tokio::test]
    async fn test_single_bare_parent_reaching_sibling_is_denied() {
        let (_tmp, resolver) = fixture();
        let result = resolver
            .resolve_and_serve(&request(&["..", "secret.txt"]))
            .await;
        assert!(matches!(result, Err(UploadError::AccessDenied)));
    }

    #[tokio::test]
    async fn test_dotdot_prefixed_name_stays_inside_root() {
        let (_tmp, resolver) = fixture();
        let result = resolver.resolve_and_serve(&request(&["..secret.txt"])).await;
        assert!(matches!(result, Err(UploadError::NotFound)));
    }

    #[tokio::test]
    async fn test_leading_escape_prefix_is_stripped() {
        let (_tmp, resolver) = fixture();
        let file = resolver
            .resolve_and_serve(&request(&["../contract.pdf"]))
            .await
            .unwrap();
        assert_eq!(file.content_type, "application/pdf");

        let result = resolver.resolve_and_serve(&request(&["../secret.txt"])).await;
        assert!(matches!(result, Err(UploadError::NotFound)));
    }

    #[tokio::test]
    async fn test_embedded_traversal_never_leaves_root() {
        let (_tmp, resolver) = fixture();
        let cases: [&[&str]; 4] = [
            &["equipment/../../secret.txt"],
            &["equipment", "../../../secret.txt"],
            &["..\\..\\secret.txt"],
            &["/../secret.txt"],
        ];
        for segments in cases {
            let result = resolver.resolve_and_serve(&request(segments)).await;
            assert!(
                matches!(result, Err(UploadError::NotFound | UploadError::AccessDenied)),
                "{segments:?} escaped the root: {result:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let (_tmp, resolver) = fixture();
        let result = resolver.resolve_and_serve(&request(&["missing.png"])).await;
        assert!(matches!(result, Err(UploadError::NotFound)));
    }

    #[tokio::test]
    async fn test_unknown_extension_falls_back_to_octet_stream() {
        let (_tmp, resolver) = fixture();
        let file = resolver
            .resolve_and_serve(&request(&["file.unknownext"]))
            .await
            .unwrap();
        assert_eq!(file.content_type, "application/octet-stream");
        assert_eq!(file.len(), 6);
    }

    #[tokio::test]
    async fn test_repeated_requests_are_identical() {
        let (_tmp, resolver) = fixture();
        let req = request(&["contract.pdf"]);
        let first = resolver.resolve_and_serve(&req).await.unwrap();
        let second = resolver.resolve_and_serve(&req).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_reading_a_directory_is_internal_error() {
        let (_tmp, resolver) = fixture();
        let result = resolver.resolve_and_serve(&request(&["equipment"])).await;
        assert!(matches!(result, Err(UploadError::InternalError(_))));
    }

    #[test]
    fn test_read_failure_message_names_path_and_cause() {
        let (_tmp, resolver) = fixture();
        let dir = resolver.resolve(&request(&["equipment"])).unwrap();
        let cause = std_fs::read(&dir).unwrap_err();

        let message = read_failure_message(&dir, &cause);
        assert!(dir.is_absolute());
        assert!(message.contains(&dir.display().to_string()), "{message}");
        assert!(message.contains(&cause.to_string()), "{message}");
    }

    #[test]
    fn test_access_denied_message_names_request_and_resolved_path() {
        let (_tmp, resolver) = fixture();
        let requested = request(&["..", "secret.txt"]);
        let resolved = join_under(resolver.root(), &["..".to_string(), "secret.txt".to_string()]);
        assert!(!resolver.root().contains(&resolved));

        let message = access_denied_message(&requested, &resolved);
        assert!(message.contains("../secret.txt"), "{message}");
        assert!(message.contains(&resolved.display().to_string()), "{message}");
    }

    #[test]
    fn test_resolve_stays_under_root() {
        let (_tmp, resolver) = fixture();
        let resolved = resolver.resolve(&request(&["/etc/passwd"])).unwrap();
        assert!(resolved.starts_with(resolver.root().as_path()));
        assert!(resolved.ends_with("etc/passwd"));
    }
}
