//! API configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One mebibyte.
pub const MIB: usize = 1024 * 1024;

/// Configuration for the HTTP API server.
///
/// # Example
///
/// ```rust
/// use meshgen_api::ApiConfig;
///
/// let config = ApiConfig {
///     port: 9000,
///     temp_dir: "/var/tmp/meshgen".into(),
///     ..Default::default()
/// };
/// assert!(config.is_supported_format("PNG"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Interface to bind.
    ///
    /// Default: `0.0.0.0`
    pub host: String,

    /// Port to bind the HTTP server to.
    ///
    /// Default: 8000
    pub port: u16,

    /// Directory for per-request input and output files.
    ///
    /// Created at startup if missing.
    ///
    /// Default: `/tmp/temp_3d`
    pub temp_dir: PathBuf,

    /// Largest accepted upload in bytes.
    ///
    /// Default: 10 MiB
    pub max_upload_bytes: usize,

    /// Accepted image extensions, lowercase, without the dot.
    pub supported_formats: Vec<String>,

    /// Serve the OpenAPI document at `/openapi.json`.
    ///
    /// Default: true
    pub enable_openapi: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            temp_dir: PathBuf::from("/tmp/temp_3d"),
            max_upload_bytes: 10 * MIB,
            supported_formats: ["jpg", "jpeg", "png", "webp", "bmp"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            enable_openapi: true,
        }
    }
}

impl ApiConfig {
    /// Case-insensitive membership test.
    pub fn is_supported_format(&self, ext: &str) -> bool {
        let ext = ext.to_lowercase();
        self.supported_formats.iter().any(|f| f.eq_ignore_ascii_case(&ext))
    }

    /// Supported formats, sorted and deduplicated, for messages and the root payload.
    pub fn sorted_formats(&self) -> Vec<String> {
        let mut formats: Vec<String> = self
            .supported_formats
            .iter()
            .map(|f| f.to_lowercase())
            .collect();
        formats.sort();
        formats.dedup();
        formats
    }

    /// Upload limit in whole megabytes, as shown to clients.
    pub fn max_upload_mb(&self) -> usize {
        self.max_upload_bytes / MIB
    }

    /// Body limit for the router. Leaves room for multipart framing so an
    /// oversize file still reaches validation.
    pub fn body_limit(&self) -> usize {
        self.max_upload_bytes.saturating_add(MIB)
    }

    /// `host:port` string for binding and logs.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
