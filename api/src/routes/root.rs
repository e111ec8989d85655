//! Service identity endpoint.

use async_trait::async_trait;
use axum::{extract::State, http::Method, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::ApiResult;
use crate::route_trait::{self, RouteHandler, RouteMetadata};
use crate::state::{AppState, SharedState};

/// Root request (no parameters).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootRequest {}

/// Root response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RootResponse {
    /// Service name
    pub message: String,
    /// Always "healthy" when the process answers
    pub status: String,
    /// Accepted image extensions, sorted
    pub supported_formats: Vec<String>,
    /// Scratch directory for request files
    pub temp_dir: String,
}

/// `GET /`
pub struct RootRoute;

/// Service identity and supported upload formats.
#[utoipa::path(
    get,
    path = "/",
    tag = "System",
    responses(
        (status = 200, description = "Service identity", body = RootResponse)
    )
)]
pub async fn get_root(State(state): State<SharedState>) -> ApiResult<Json<RootResponse>> {
    route_trait::serve::<RootRoute>(&state, RootRequest {}).await
}

#[async_trait]
impl RouteHandler for RootRoute {
    type Request = RootRequest;
    type Response = RootResponse;

    fn metadata() -> RouteMetadata {
        RouteMetadata {
            path: "/",
            method: Method::GET,
            tags: &["System"],
            description: "Service identity and supported upload formats",
        }
    }

    async fn validate_request(_req: &Self::Request) -> ApiResult<()> {
        Ok(())
    }

    async fn handle(_req: Self::Request, state: &AppState) -> ApiResult<Self::Response> {
        Ok(RootResponse {
            message: "3D Model Generator API".to_string(),
            status: "healthy".to_string(),
            supported_formats: state.config.sorted_formats(),
            temp_dir: state.config.temp_dir.display().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::state_in;

    #[tokio::test]
    async fn test_root_payload() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_in(dir.path(), Vec::new());

        let response = RootRoute::handle(RootRequest {}, &state).await.unwrap();

        assert_eq!(response.message, "3D Model Generator API");
        assert_eq!(response.status, "healthy");
        assert_eq!(response.supported_formats, vec!["bmp", "jpeg", "jpg", "png", "webp"]);
        assert_eq!(response.temp_dir, dir.path().display().to_string());
    }

    #[test]
    fn test_metadata() {
        let meta = RootRoute::metadata();
        assert_eq!(meta.path, "/");
        assert_eq!(meta.method, Method::GET);
    }
}
