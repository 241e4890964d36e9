// Configuration module entry point
// Loads layered configuration and builds the shared runtime state

mod state;
mod types;

use std::net::SocketAddr;
use std::path::Path;

use crate::error::AppError;
use crate::uploads::UploadRoot;

pub use state::AppState;
pub use types::Config;

/// Config file used when no path is given on the command line
const DEFAULT_CONFIG_PATH: &str = "config";

/// Prefix for environment overrides, e.g. `UPLOADS_SERVER__PORT=9000`
const ENV_PREFIX: &str = "UPLOADS";

impl Config {
    /// Load configuration from the path given as first CLI argument,
    /// falling back to `config.toml` in the working directory
    pub fn load() -> Result<Self, AppError> {
        let path = std::env::args()
            .nth(1)
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(&path)
    }

    /// Load configuration from specified file path (extension optional).
    /// A missing file is not an error; defaults and environment still apply.
    pub fn load_from(config_path: &str) -> Result<Self, AppError> {
        let settings = config::Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("uploads.root", "public/uploads")?
            .set_default("uploads.route_prefix", "/uploads")?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("performance.keep_alive_timeout", 75)?
            .set_default("performance.read_timeout", 30)?
            .set_default("performance.write_timeout", 30)?
            .set_default("performance.shutdown_grace_period", 10)?
            .set_default("http.server_name", "rental-uploads")?
            .set_default("http.enable_cors", false)?
            .set_default("http.max_body_size", 1_048_576)? // 1MB, GET-only server
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut cfg: Self = settings.try_deserialize()?;
        cfg.uploads.route_prefix = normalize_route_prefix(&cfg.uploads.route_prefix);
        Ok(cfg)
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, AppError> {
        let addr = format!("{}:{}", self.server.host, self.server.port);
        addr.parse()
            .map_err(|source| AppError::Address { addr, source })
    }

    /// Resolve the configured upload directory to an absolute root.
    ///
    /// Called once at startup; the result is never recomputed.
    pub fn upload_root(&self) -> Result<UploadRoot, AppError> {
        let configured = Path::new(&self.uploads.root);
        if configured.is_absolute() {
            UploadRoot::new(configured)
        } else {
            UploadRoot::new(std::env::current_dir()?.join(configured))
        }
    }

    /// Upload route prefix without a trailing slash
    pub fn upload_prefix(&self) -> &str {
        self.uploads.route_prefix.trim_end_matches('/')
    }
}

/// Route prefix with exactly one leading slash and no trailing slash;
/// `/` stays `/`
fn normalize_route_prefix(prefix: &str) -> String {
    format!("/{}", prefix.trim_matches('/'))
}
