//! Shared application state.
//!
//! Holds the API configuration and the process-wide pipeline holder. Cloned
//! into every handler through `Arc`.

use std::sync::Arc;

use meshgen_pipeline::PipelineHolder;

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Debug, Clone)]
pub struct AppState {
    /// HTTP surface configuration
    pub config: ApiConfig,

    /// Lazily loaded generator shared by all requests
    pub pipeline: Arc<PipelineHolder>,
}

/// State type the router is parameterised over.
pub type SharedState = Arc<AppState>;

impl AppState {
    /// Build the state and make sure the temp directory exists.
    pub fn new(config: ApiConfig, pipeline: Arc<PipelineHolder>) -> std::io::Result<Self> {
        std::fs::create_dir_all(&config.temp_dir)?;
        tracing::info!(temp_dir = %config.temp_dir.display(), "Temp directory ready");
        Ok(Self { config, pipeline })
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_creates_temp_dir() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");

        let state = test_support::state_in(&nested, Vec::new());

        assert!(nested.is_dir());
        assert_eq!(state.config.temp_dir, nested);
        assert!(!state.pipeline.is_loaded());
    }
}
