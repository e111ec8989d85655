//! Per-request temp files.
//!
//! Every generation request gets a fresh id and two paths under the temp
//! directory. The paths are owned by [`TempArtifacts`], which removes both
//! files when dropped, whichever way the request ends. Async callers hand the
//! request to [`GenerationRequest::cleanup`] so the unlinks run on the
//! blocking pool; a plain drop still cleans up if that never happens.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Removes the input and output files of one request on drop.
#[derive(Debug)]
pub struct TempArtifacts {
    input_path: PathBuf,
    output_path: PathBuf,
}

impl TempArtifacts {
    /// Take ownership of two paths. Nothing is created on disk.
    pub fn new(input_path: PathBuf, output_path: PathBuf) -> Self {
        Self {
            input_path,
            output_path,
        }
    }

    /// Where the uploaded image is written.
    pub fn input_path(&self) -> &Path {
        &self.input_path
    }

    /// Where the exported model is written.
    pub fn output_path(&self) -> &Path {
        &self.output_path
    }
}

impl Drop for TempArtifacts {
    fn drop(&mut self) {
        for path in [&self.input_path, &self.output_path] {
            match std::fs::remove_file(path) {
                Ok(()) => tracing::debug!(path = %path.display(), "Removed temp file"),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to remove temp file"
                ),
            }
        }
    }
}

/// Identity and scratch space for one `/generate-3d` call.
#[derive(Debug)]
pub struct GenerationRequest {
    request_id: Uuid,
    artifacts: TempArtifacts,
}

impl GenerationRequest {
    /// New request id with `input_<id>.jpg` and `output_<id>.glb` under `temp_dir`.
    ///
    /// The input always gets a `.jpg` suffix whatever the upload's format.
    pub fn new(temp_dir: &Path) -> Self {
        let request_id = Uuid::new_v4();
        let artifacts = TempArtifacts::new(
            temp_dir.join(format!("input_{request_id}.jpg")),
            temp_dir.join(format!("output_{request_id}.glb")),
        );
        Self {
            request_id,
            artifacts,
        }
    }

    /// Unique token for paths, logs and the download name.
    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    /// Suggested client-side filename for the model.
    pub fn download_name(&self) -> String {
        format!("model_{}.glb", self.request_id)
    }

    /// Where the uploaded image is written.
    pub fn input_path(&self) -> &Path {
        self.artifacts.input_path()
    }

    /// Where the exported model is written.
    pub fn output_path(&self) -> &Path {
        self.artifacts.output_path()
    }

    /// Remove both files on a blocking thread.
    pub async fn cleanup(self) {
        let request_id = self.request_id;
        if let Err(e) = tokio::task::spawn_blocking(move || drop(self)).await {
            tracing::warn!(request_id = %request_id, error = %e, "Temp file cleanup task failed");
        }
    }
}
