/// Pipeline errors
///
/// Represents every way loading, invoking or exporting can fail. The
/// `Display` text is what ends up in the HTTP `detail` field.
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Failed to load model: {0}")]
    LoadFailed(String),

    #[error("Failed to generate 3D model")]
    EmptyResult,

    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("Export failed: {0}")]
    Export(String),

    #[error("Worker error: {0}")]
    Worker(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
