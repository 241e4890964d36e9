// Application state module
// Read-only state shared by every connection

use super::types::Config;
use crate::error::AppError;
use crate::uploads::UploadResolver;

/// Application state
///
/// Built once before the listener starts and never mutated afterwards.
pub struct AppState {
    pub config: Config,
    pub resolver: UploadResolver,
}

impl AppState {
    /// Resolve the upload root and build the resolver around it
    pub fn new(config: Config) -> Result<Self, AppError> {
        let resolver = UploadResolver::new(config.upload_root()?);
        Ok(Self { config, resolver })
    }

    pub fn access_log_enabled(&self) -> bool {
        self.config.logging.access_log
    }
}
