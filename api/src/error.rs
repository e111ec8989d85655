//! Error types for the API.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use meshgen_pipeline::PipelineError;
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

/// Result type for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

/// API error types.
///
/// The message of each variant is sent to the client verbatim as `detail`.
#[derive(Debug)]
pub enum ApiError {
    /// Bad request (400) - upload rejected by validation
    BadRequest(String),

    /// Unprocessable entity (422) - request shape is wrong, e.g. missing form field
    UnprocessableEntity(String),

    /// Internal server error (500) - anything after validation failed
    InternalError(String),
}

impl ApiError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::UnprocessableEntity(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message sent as `detail`.
    pub fn detail(&self) -> &str {
        match self {
            Self::BadRequest(msg) | Self::UnprocessableEntity(msg) | Self::InternalError(msg) => msg,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            Self::UnprocessableEntity(msg) => write!(f, "Unprocessable Entity: {}", msg),
            Self::InternalError(msg) => write!(f, "Internal Error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

/// Error body returned for every non-2xx response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    /// Human-readable explanation
    pub detail: String,
    /// HTTP status code
    pub status: u16,
    /// Short summary of the status
    pub title: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let title = match &self {
            Self::BadRequest(_) => "Bad Request",
            Self::UnprocessableEntity(_) => "Unprocessable Entity",
            Self::InternalError(_) => "Internal Server Error",
        };

        let body = ErrorBody {
            title: title.to_string(),
            status: status.as_u16(),
            detail: match self {
                Self::BadRequest(msg) | Self::UnprocessableEntity(msg) | Self::InternalError(msg) => {
                    msg
                }
            },
        };

        (status, Json(body)).into_response()
    }
}

/// Every pipeline failure is a server-side failure; its message becomes the detail.
impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        ApiError::InternalError(err.to_string())
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        ApiError::InternalError(err.to_string())
    }
}
