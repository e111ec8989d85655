//! MeshGen API Crate
//!
//! HTTP layer for the image-to-3D service, built on Axum.
//!
//! # Routes
//!
//! - `GET /`: service identity and supported formats
//! - `GET /health`: pipeline load state and accelerator summary
//! - `POST /generate-3d`: multipart image upload, returns a `.glb`
//! - `GET /openapi.json`: OpenAPI document (when enabled)
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use meshgen_api::{ApiConfig, AppState};
//! use meshgen_hardware::AccelerationInfo;
//! use meshgen_pipeline::{PipelineHolder, WorkerLoader};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let loader = Arc::new(WorkerLoader::new("python3", vec!["shapegen_worker.py".into()]));
//!     let holder = PipelineHolder::new("tencent/Hunyuan3D-2", loader, AccelerationInfo::detect());
//!     let state = AppState::new(ApiConfig::default(), Arc::new(holder))?;
//!
//!     meshgen_api::run_server(Arc::new(state), async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

mod artifacts;
mod config;
mod error;
mod router;
mod state;
mod validation;

pub mod route_trait;
pub mod routes;

pub use artifacts::{GenerationRequest, TempArtifacts};
pub use config::{ApiConfig, MIB};
pub use error::{ApiError, ApiResult, ErrorBody};
pub use router::{build_router, OPENAPI_PATH};
pub use state::{AppState, SharedState};

use std::future::Future;

/// Bind `state.config.host:port` and serve until `shutdown` resolves.
///
/// In-flight requests are allowed to finish after `shutdown` fires.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails.
pub async fn run_server<F>(state: SharedState, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = state.config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    tracing::info!("MeshGen API server listening on http://{}", local_addr);
    if state.config.enable_openapi {
        tracing::info!("OpenAPI document: http://{}{}", local_addr, OPENAPI_PATH);
    }

    let app = build_router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!("MeshGen API server stopped");
    Ok(())
}
