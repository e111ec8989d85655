//! Upload validation.
//!
//! Checks run in a fixed order: filename present, extension supported, size
//! within the limit. The first failure wins.

use crate::config::ApiConfig;
use crate::error::{ApiError, ApiResult};

/// Lowercased text after the last `.`; the whole name when there is no dot.
pub fn extension_of(filename: &str) -> String {
    filename
        .rsplit('.')
        .next()
        .unwrap_or(filename)
        .to_lowercase()
}

/// Validate an upload's metadata and size. Returns the normalized extension.
pub fn validate_upload(filename: Option<&str>, size: usize, config: &ApiConfig) -> ApiResult<String> {
    let filename = match filename {
        Some(name) if !name.is_empty() => name,
        _ => return Err(ApiError::BadRequest("No filename provided".to_string())),
    };

    let ext = extension_of(filename);
    if !config.is_supported_format(&ext) {
        return Err(ApiError::BadRequest(format!(
            "Unsupported format: {}. Supported: {}",
            ext,
            config.sorted_formats().join(", ")
        )));
    }

    if size > config.max_upload_bytes {
        return Err(too_large(config));
    }

    Ok(ext)
}

/// Error for an upload over the limit.
pub fn too_large(config: &ApiConfig) -> ApiError {
    ApiError::BadRequest(format!("File too large (max {}MB)", config.max_upload_mb()))
}
