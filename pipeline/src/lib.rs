//! MeshGen Pipeline Crate
//!
//! Everything between "an image file on disk" and "a `.glb` file on disk".
//!
//! # Architecture
//!
//! - **`ShapeGenerator`** / **`PipelineLoader`**: the seam to the external
//!   image-to-3D model. The model itself is opaque; this crate only knows how
//!   to construct it once and how to invoke it with an image path.
//! - **`PipelineHolder`**: owns the lazily constructed generator behind a
//!   single-flight guard. Failed loads are not cached, the next call retries.
//! - **`worker`**: the production backend, an external worker process spoken
//!   to over length-prefixed JSON frames on stdin/stdout.
//! - **`export`**: serializes a [`MeshResult`] to binary glTF without any
//!   mesh processing.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use meshgen_hardware::AccelerationInfo;
//! use meshgen_pipeline::{export, PipelineHolder, WorkerLoader};
//!
//! # async fn run() -> meshgen_pipeline::Result<()> {
//! let loader = Arc::new(WorkerLoader::new("python3", vec!["shapegen_worker.py".into()]));
//! let holder = PipelineHolder::new("tencent/Hunyuan3D-2", loader, AccelerationInfo::detect());
//!
//! let generator = holder.acquire().await?;
//! let meshes = generator.generate(Path::new("/tmp/temp_3d/input.jpg"))?;
//! export::write_glb(&meshes[0], Path::new("/tmp/temp_3d/output.glb"))?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod export;
pub mod holder;
pub mod types;
pub mod worker;

pub use error::{PipelineError, Result};
pub use holder::PipelineHolder;
pub use types::{MeshResult, PipelineLoader, ShapeGenerator};
pub use worker::{WorkerChannel, WorkerLoader};

/// Model repository loaded when nothing else is configured.
pub const DEFAULT_MODEL_ID: &str = "tencent/Hunyuan3D-2";
