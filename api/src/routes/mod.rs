//! API route handlers.

pub mod generate;
pub mod health;
pub mod root;

use utoipa::OpenApi;

/// OpenAPI documentation for the service.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "3D Model Generator API",
        description = "Turns a single image into a binary glTF mesh",
        license(name = "MIT")
    ),
    paths(root::get_root, health::get_health, generate::generate_3d),
    components(schemas(
        root::RootResponse,
        health::HealthResponse,
        generate::UploadImage,
        crate::error::ErrorBody,
    )),
    tags(
        (name = "System", description = "Service status"),
        (name = "Generation", description = "Image to 3D model")
    )
)]
pub struct ApiDoc;
