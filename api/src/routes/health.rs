//! Health check endpoint.
//!
//! Reports whether the pipeline has been loaded yet and what accelerators
//! were found at startup. Never triggers a load itself.

use async_trait::async_trait;
use axum::{extract::State, http::Method, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::ApiResult;
use crate::route_trait::{self, RouteHandler, RouteMetadata};
use crate::state::{AppState, SharedState};

/// Health check request (no parameters).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthRequest {}

/// Health check response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Whether the generator has been constructed
    pub pipeline_loaded: bool,
    /// Whether a CUDA device was found
    pub cuda_available: bool,
    /// Number of CUDA devices
    pub device_count: usize,
    /// Scratch directory for request files
    pub temp_dir: String,
}

impl HealthResponse {
    fn from_state(state: &AppState) -> Self {
        let accel = state.pipeline.acceleration();
        Self {
            status: "healthy".to_string(),
            pipeline_loaded: state.pipeline.is_loaded(),
            cuda_available: accel.cuda_available,
            device_count: accel.device_count,
            temp_dir: state.config.temp_dir.display().to_string(),
        }
    }
}

/// `GET /health`
pub struct HealthRoute;

/// Service health, pipeline load state and accelerator summary.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    responses(
        (status = 200, description = "Service and pipeline status", body = HealthResponse)
    )
)]
pub async fn get_health(State(state): State<SharedState>) -> ApiResult<Json<HealthResponse>> {
    route_trait::serve::<HealthRoute>(&state, HealthRequest {}).await
}

#[async_trait]
impl RouteHandler for HealthRoute {
    type Request = HealthRequest;
    type Response = HealthResponse;

    fn metadata() -> RouteMetadata {
        RouteMetadata {
            path: "/health",
            method: Method::GET,
            tags: &["System"],
            description: "Service health, pipeline load state and accelerator summary",
        }
    }

    async fn validate_request(_req: &Self::Request) -> ApiResult<()> {
        Ok(())
    }

    async fn handle(_req: Self::Request, state: &AppState) -> ApiResult<Self::Response> {
        let response = HealthResponse::from_state(state);
        tracing::debug!(
            pipeline_loaded = response.pipeline_loaded,
            cuda_available = response.cuda_available,
            "Health check"
        );
        Ok(response)
    }
}
