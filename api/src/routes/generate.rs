//! Image to 3D model endpoint.
//!
//! `POST /generate-3d` takes a multipart upload in the `image` field and
//! returns a binary glTF model. Flow:
//!
//! 1. read and validate the upload (400 on failure, nothing written)
//! 2. save it under the temp directory
//! 3. acquire the pipeline, generate, export the first mesh
//! 4. read the `.glb` back and respond
//!
//! Steps 2 to 4 run in their own task so a client disconnect does not cut
//! generation short. The request's [`GenerationRequest`] lives in that task
//! and its temp files are removed when it finishes, whatever the outcome.

use axum::{
    body::Bytes,
    extract::{
        multipart::{MultipartError, MultipartRejection},
        Multipart, State,
    },
    http::{header, HeaderName, Method, StatusCode},
    response::{IntoResponse, Response},
};
use meshgen_pipeline::{export, PipelineError};
use std::time::Instant;
use utoipa::ToSchema;

use crate::artifacts::GenerationRequest;
use crate::config::ApiConfig;
use crate::error::{ApiError, ApiResult, ErrorBody};
use crate::route_trait::RouteMetadata;
use crate::state::SharedState;
use crate::validation;

/// Multipart field carrying the image.
pub const IMAGE_FIELD: &str = "image";

/// Media type of the response body.
pub const GLB_CONTENT_TYPE: &str = "model/gltf-binary";

/// Header echoing the request id back to the client.
pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Multipart form accepted by `/generate-3d` (documentation only).
#[derive(Debug, ToSchema)]
pub struct UploadImage {
    /// Image file; jpg, jpeg, png, webp or bmp
    #[schema(value_type = String, format = Binary)]
    pub image: Vec<u8>,
}

/// `POST /generate-3d`
pub struct GenerateRoute;

impl GenerateRoute {
    /// Route metadata.
    pub fn metadata() -> RouteMetadata {
        RouteMetadata {
            path: "/generate-3d",
            method: Method::POST,
            tags: &["Generation"],
            description: "Generate a binary glTF model from an uploaded image",
        }
    }
}

struct ImageUpload {
    filename: Option<String>,
    data: Bytes,
}

/// Generate a 3D model from an uploaded image.
#[utoipa::path(
    post,
    path = "/generate-3d",
    tag = "Generation",
    request_body(content = UploadImage, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Binary glTF model", content_type = "model/gltf-binary", body = Vec<u8>),
        (status = 400, description = "Upload rejected", body = ErrorBody),
        (status = 422, description = "Missing image field", body = ErrorBody),
        (status = 500, description = "Pipeline, generation or export failure", body = ErrorBody)
    )
)]
pub async fn generate_3d(
    State(state): State<SharedState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Response> {
    let multipart =
        multipart.map_err(|rejection| ApiError::UnprocessableEntity(rejection.body_text()))?;
    let upload = read_upload(multipart, &state.config).await?;

    let ext = validation::validate_upload(upload.filename.as_deref(), upload.data.len(), &state.config)
        .inspect_err(|e| tracing::warn!(error = %e, filename = ?upload.filename, "Upload rejected"))?;

    let request = GenerationRequest::new(&state.config.temp_dir);
    let request_id = request.request_id();
    let download_name = request.download_name();

    tracing::info!(
        request_id = %request_id,
        filename = ?upload.filename,
        format = %ext,
        bytes = upload.data.len(),
        "Generation request accepted"
    );

    let started = Instant::now();
    let worker_state = state.clone();
    let outcome = tokio::spawn(async move {
        let result = run_generation(&worker_state, &request, upload.data).await;
        request.cleanup().await;
        result
    })
    .await
    .map_err(|e| ApiError::InternalError(format!("generation task failed: {e}")))
    .and_then(|result| result);

    let glb = match outcome {
        Ok(glb) => glb,
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "Generation request failed");
            return Err(e);
        }
    };

    tracing::info!(
        request_id = %request_id,
        bytes = glb.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Generation request completed"
    );

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, GLB_CONTENT_TYPE.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{download_name}\""),
            ),
            (REQUEST_ID_HEADER, request_id.to_string()),
        ],
        glb,
    )
        .into_response())
}

/// Pull the `image` field out of the form, buffering it once.
async fn read_upload(mut multipart: Multipart, config: &ApiConfig) -> ApiResult<ImageUpload> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, config))?
    {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }

        let filename = field.file_name().map(str::to_owned);
        let data = field.bytes().await.map_err(|e| multipart_error(e, config))?;
        return Ok(ImageUpload { filename, data });
    }

    Err(ApiError::UnprocessableEntity(format!(
        "Field required: {IMAGE_FIELD}"
    )))
}

fn multipart_error(e: MultipartError, config: &ApiConfig) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        validation::too_large(config)
    } else {
        ApiError::BadRequest(e.body_text())
    }
}

/// Save, generate, export and read back. The caller removes the temp files.
async fn run_generation(
    state: &SharedState,
    request: &GenerationRequest,
    data: Bytes,
) -> ApiResult<Vec<u8>> {
    let request_id = request.request_id();

    tokio::fs::create_dir_all(&state.config.temp_dir).await?;
    tokio::fs::write(request.input_path(), &data).await?;
    tracing::debug!(
        request_id = %request_id,
        path = %request.input_path().display(),
        "Saved input image"
    );

    let generator = state.pipeline.acquire().await?;

    let input = request.input_path().to_path_buf();
    let output = request.output_path().to_path_buf();
    let (vertices, faces) = tokio::task::spawn_blocking(move || {
        let meshes = generator.generate(&input)?;
        let mesh = meshes.first().ok_or(PipelineError::EmptyResult)?;
        export::write_glb(mesh, &output)?;
        Ok::<_, PipelineError>((mesh.vertex_count(), mesh.face_count()))
    })
    .await
    .map_err(|e| ApiError::InternalError(format!("generation task failed: {e}")))??;

    tracing::info!(request_id = %request_id, vertices, faces, "Mesh exported");

    let glb = tokio::fs::read(request.output_path()).await?;
    Ok(glb)
}
