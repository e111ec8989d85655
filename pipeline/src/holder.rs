//! Process-wide owner of the lazily loaded generator.
//!
//! The holder is constructed explicitly and injected into the HTTP state, so
//! tests can hand it a fake [`PipelineLoader`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use meshgen_hardware::AccelerationInfo;
use parking_lot::RwLock;
use tokio::sync::Mutex;

use crate::error::{PipelineError, Result};
use crate::types::{PipelineLoader, ShapeGenerator};

/// Single-flight, retry-on-failure cache around one [`ShapeGenerator`].
///
/// - Concurrent first callers share one in-flight load and all receive the
///   same instance.
/// - Callers that were waiting on a load that failed get that failure; they
///   do not start loads of their own.
/// - The next call after a failure tries again.
/// - An instance that stops reporting [`ShapeGenerator::is_alive`] is
///   dropped and the next call loads a replacement.
pub struct PipelineHolder {
    model_id: String,
    loader: Arc<dyn PipelineLoader>,
    acceleration: AccelerationInfo,
    current: RwLock<Option<Arc<dyn ShapeGenerator>>>,
    /// Serializes loads. Holds the failure of the last finished attempt.
    load_gate: Mutex<Option<PipelineError>>,
    /// Finished load attempts, successful or not.
    attempts: AtomicU64,
}

impl PipelineHolder {
    pub fn new(
        model_id: impl Into<String>,
        loader: Arc<dyn PipelineLoader>,
        acceleration: AccelerationInfo,
    ) -> Self {
        Self {
            model_id: model_id.into(),
            loader,
            acceleration,
            current: RwLock::new(None),
            load_gate: Mutex::new(None),
            attempts: AtomicU64::new(0),
        }
    }

    /// Get the generator, loading it first if there is no live one.
    ///
    /// The load itself runs on a blocking thread so the executor keeps
    /// serving other requests while weights are read.
    pub async fn acquire(&self) -> Result<Arc<dyn ShapeGenerator>> {
        if let Some(generator) = self.live() {
            return Ok(generator);
        }

        let seen = self.attempts.load(Ordering::Acquire);
        let mut last_failure = self.load_gate.lock().await;

        if let Some(generator) = self.live() {
            return Ok(generator);
        }

        // An attempt finished while we waited for the gate
        if self.attempts.load(Ordering::Acquire) != seen {
            if let Some(e) = last_failure.as_ref() {
                return Err(shared_failure(e));
            }
        }

        let result = self.load().await;
        match &result {
            Ok(generator) => {
                *self.current.write() = Some(Arc::clone(generator));
                *last_failure = None;
            }
            Err(e) => *last_failure = Some(shared_failure(e)),
        }
        self.attempts.fetch_add(1, Ordering::Release);

        result
    }

    /// Whether a live generator is currently loaded.
    pub fn is_loaded(&self) -> bool {
        self.current
            .read()
            .as_ref()
            .is_some_and(|generator| generator.is_alive())
    }

    /// Forget `stale` if it is still the cached instance. Returns whether it
    /// was removed.
    pub fn invalidate(&self, stale: &Arc<dyn ShapeGenerator>) -> bool {
        let mut current = self.current.write();
        match current.as_ref() {
            Some(cached) if same_instance(cached, stale) => {
                tracing::warn!(
                    model_id = %self.model_id,
                    generator = %cached.describe(),
                    "Dropping pipeline, next request reloads it"
                );
                *current = None;
                true
            }
            _ => false,
        }
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// Accelerator summary captured when the holder was built.
    pub fn acceleration(&self) -> &AccelerationInfo {
        &self.acceleration
    }

    fn live(&self) -> Option<Arc<dyn ShapeGenerator>> {
        let generator = self.current.read().as_ref().map(Arc::clone)?;
        if generator.is_alive() {
            return Some(generator);
        }

        self.invalidate(&generator);
        None
    }

    async fn load(&self) -> Result<Arc<dyn ShapeGenerator>> {
        let loader = Arc::clone(&self.loader);
        let model_id = self.model_id.clone();
        let started = Instant::now();

        tracing::info!(
            model_id = %self.model_id,
            cuda_available = self.acceleration.cuda_available,
            device_count = self.acceleration.device_count,
            "Loading pipeline..."
        );

        let result = tokio::task::spawn_blocking(move || loader.load(&model_id))
            .await
            .map_err(|e| PipelineError::LoadFailed(format!("loader task aborted: {e}")))
            .and_then(|loaded| loaded);

        match &result {
            Ok(generator) => tracing::info!(
                model_id = %self.model_id,
                generator = %generator.describe(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Pipeline loaded successfully"
            ),
            Err(e) => tracing::error!(
                model_id = %self.model_id,
                error = %e,
                "Failed to load pipeline"
            ),
        }

        result
    }
}

fn same_instance(a: &Arc<dyn ShapeGenerator>, b: &Arc<dyn ShapeGenerator>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// Copy of a load failure for callers that waited on the failing attempt.
fn shared_failure(e: &PipelineError) -> PipelineError {
    match e {
        PipelineError::LoadFailed(message) => PipelineError::LoadFailed(message.clone()),
        other => PipelineError::LoadFailed(other.to_string()),
    }
}

impl std::fmt::Debug for PipelineHolder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineHolder")
            .field("model_id", &self.model_id)
            .field("loaded", &self.is_loaded())
            .field("acceleration", &self.acceleration)
            .finish()
    }
}
