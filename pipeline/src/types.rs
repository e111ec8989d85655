//! Mesh data and the traits that stand in for the external model.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

use crate::Result;

/// One generated mesh: vertex positions and triangle indices.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeshResult {
    pub vertices: Vec<[f32; 3]>,
    pub faces: Vec<[u32; 3]>,
}

impl MeshResult {
    pub fn new(vertices: Vec<[f32; 3]>, faces: Vec<[u32; 3]>) -> Self {
        Self { vertices, faces }
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }
}

/// A constructed image-to-3D capability.
///
/// `generate` blocks for as long as the model takes; async callers must run
/// it on a blocking thread. The instance is shared by all in-flight requests.
pub trait ShapeGenerator: Send + Sync {
    /// Run the model on the image at `image` and return its meshes.
    fn generate(&self, image: &Path) -> Result<Vec<MeshResult>>;

    /// Whether this instance can still serve requests. A holder drops
    /// instances that report `false` and loads a fresh one.
    fn is_alive(&self) -> bool {
        true
    }

    /// Short human readable description, used in logs.
    fn describe(&self) -> String {
        "shape generator".to_string()
    }
}

/// Constructs a [`ShapeGenerator`] from a model identifier.
///
/// May be slow and may touch disk, network or accelerator memory.
pub trait PipelineLoader: Send + Sync {
    fn load(&self, model_id: &str) -> Result<Arc<dyn ShapeGenerator>>;
}
