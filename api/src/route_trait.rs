//! Route handler trait for the JSON routes.
//!
//! Every JSON route declares its metadata, validates its request and returns
//! a typed response. The axum handler for a route is a thin documented
//! function that calls [`serve`].

use async_trait::async_trait;
use axum::{http::Method, Json};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt::Debug;

use crate::error::ApiResult;
use crate::state::AppState;

/// Route metadata, used for registration and logs.
#[derive(Debug, Clone)]
pub struct RouteMetadata {
    /// HTTP path (e.g., "/health")
    pub path: &'static str,
    /// HTTP method
    pub method: Method,
    /// OpenAPI tags for grouping
    pub tags: &'static [&'static str],
    /// What the route does
    pub description: &'static str,
}

/// Route handler trait.
///
/// # Example
/// ```ignore
/// struct HealthRoute;
///
/// #[async_trait]
/// impl RouteHandler for HealthRoute {
///     type Request = HealthRequest;
///     type Response = HealthResponse;
///
///     fn metadata() -> RouteMetadata {
///         RouteMetadata {
///             path: "/health",
///             method: Method::GET,
///             tags: &["System"],
///             description: "Service and pipeline status",
///         }
///     }
///
///     async fn validate_request(_req: &Self::Request) -> ApiResult<()> {
///         Ok(())
///     }
///
///     async fn handle(_req: Self::Request, state: &AppState) -> ApiResult<Self::Response> {
///         Ok(HealthResponse::from_state(state))
///     }
/// }
/// ```
#[async_trait]
pub trait RouteHandler: Send + Sync + 'static {
    /// Request type
    type Request: DeserializeOwned + Debug + Send + Sync + 'static;

    /// Response type
    type Response: Serialize + Debug + Send + Sync + 'static;

    /// Route metadata.
    fn metadata() -> RouteMetadata;

    /// Called before `handle`. Return `ApiError::BadRequest` on failure.
    async fn validate_request(req: &Self::Request) -> ApiResult<()>;

    /// Produce the response.
    async fn handle(req: Self::Request, state: &AppState) -> ApiResult<Self::Response>;
}

/// Validate `req`, run the handler and wrap the response as JSON.
pub async fn serve<H: RouteHandler>(state: &AppState, req: H::Request) -> ApiResult<Json<H::Response>> {
    let metadata = H::metadata();
    tracing::debug!(method = %metadata.method, path = metadata.path, request = ?req, "Handling request");

    H::validate_request(&req).await?;
    let response = H::handle(req, state).await?;
    Ok(Json(response))
}
