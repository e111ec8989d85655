//! Worker process backend.
//!
//! The model runs in a separate process (usually a Python script) that
//! speaks length-prefixed JSON over stdin/stdout:
//!
//! ```text
//! [u32 little-endian length][UTF-8 JSON payload]
//! ```
//!
//! 1. On startup the worker loads the model and sends
//!    `{"status":"ready","device":"cuda"}` or `{"status":"error","message":"..."}`.
//! 2. Each request is `{"image":"/path/to/input.jpg"}`.
//! 3. Each reply is `{"meshes":[{"vertices":[[x,y,z],..],"faces":[[a,b,c],..]}]}`
//!    or `{"error":"..."}`.
//!
//! Anything the worker writes to stderr is passed through to ours.

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{PipelineError, Result};
use crate::types::{MeshResult, PipelineLoader, ShapeGenerator};

/// Largest frame accepted from the worker. Dense meshes are big, but a
/// corrupt length prefix should not make us allocate gigabytes.
pub const MAX_FRAME_BYTES: usize = 256 * 1024 * 1024;

/// Environment variable carrying the model id to the worker.
pub const ENV_MODEL_ID: &str = "MESHGEN_MODEL_ID";

#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
enum Handshake {
    Ready {
        #[serde(default)]
        device: Option<String>,
    },
    Error {
        message: String,
    },
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    image: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GenerateReply {
    Meshes { meshes: Vec<MeshResult> },
    Failed { error: String },
}

/// Framed JSON channel over any reader/writer pair.
///
/// A failed or oversized read leaves the stream at an unknown offset, so the
/// channel refuses all further traffic once that happens.
pub struct WorkerChannel<R, W> {
    reader: R,
    writer: W,
    poisoned: bool,
}

impl<R: Read, W: Write> WorkerChannel<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader,
            writer,
            poisoned: false,
        }
    }

    pub fn into_inner(self) -> (R, W) {
        (self.reader, self.writer)
    }

    /// Whether framing was lost on an earlier call.
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Serialize `message` and write it as one frame.
    pub fn send<T: Serialize>(&mut self, message: &T) -> Result<()> {
        self.ensure_in_sync()?;

        let payload = serde_json::to_vec(message)?;
        if payload.len() > MAX_FRAME_BYTES {
            return Err(PipelineError::Worker(format!(
                "outgoing frame of {} bytes exceeds limit",
                payload.len()
            )));
        }

        self.write_frame(&payload).inspect_err(|_| self.poisoned = true)
    }

    /// Read one frame and deserialize it.
    pub fn receive<T: DeserializeOwned>(&mut self) -> Result<T> {
        self.ensure_in_sync()?;

        let payload = self.read_frame().inspect_err(|_| self.poisoned = true)?;
        Ok(serde_json::from_slice(&payload)?)
    }

    fn ensure_in_sync(&self) -> Result<()> {
        if self.poisoned {
            return Err(PipelineError::Worker(
                "channel is out of sync after an earlier failure".to_string(),
            ));
        }
        Ok(())
    }

    fn write_frame(&mut self, payload: &[u8]) -> Result<()> {
        self.writer.write_all(&(payload.len() as u32).to_le_bytes())?;
        self.writer.write_all(payload)?;
        self.writer.flush()?;
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Vec<u8>> {
        let mut length_bytes = [0u8; 4];
        self.reader
            .read_exact(&mut length_bytes)
            .map_err(closed_or_io)?;
        let length = u32::from_le_bytes(length_bytes) as usize;

        if length > MAX_FRAME_BYTES {
            return Err(PipelineError::Worker(format!(
                "frame of {length} bytes exceeds limit of {MAX_FRAME_BYTES}"
            )));
        }

        let mut payload = vec![0u8; length];
        self.reader.read_exact(&mut payload).map_err(closed_or_io)?;
        Ok(payload)
    }

    /// Wait for the startup message. Returns the device the worker reports.
    pub fn handshake(&mut self) -> Result<Option<String>> {
        match self.receive::<Handshake>() {
            Ok(Handshake::Ready { device }) => Ok(device),
            Ok(Handshake::Error { message }) => Err(PipelineError::LoadFailed(message)),
            Err(e) => Err(PipelineError::LoadFailed(format!(
                "worker did not complete startup: {e}"
            ))),
        }
    }

    /// Ask the worker to run the model on `image`.
    pub fn generate(&mut self, image: &Path) -> Result<Vec<MeshResult>> {
        let image = image.to_string_lossy();
        self.send(&GenerateRequest { image: &image })?;

        match self.receive::<GenerateReply>()? {
            GenerateReply::Meshes { meshes } => Ok(meshes),
            GenerateReply::Failed { error } => Err(PipelineError::Generation(error)),
        }
    }
}

fn closed_or_io(e: std::io::Error) -> PipelineError {
    if e.kind() == ErrorKind::UnexpectedEof {
        PipelineError::Worker("worker closed its output".to_string())
    } else {
        PipelineError::IoError(e)
    }
}

type ProcessChannel = WorkerChannel<BufReader<ChildStdout>, BufWriter<ChildStdin>>;

/// [`ShapeGenerator`] backed by a running worker process.
///
/// Requests are serialized over the single stdin/stdout pair; the worker
/// handles one image at a time anyway. Once the process exits or the channel
/// loses framing the generator reports itself dead and is never reused.
pub struct SubprocessGenerator {
    model_id: String,
    device: Option<String>,
    pid: u32,
    alive: AtomicBool,
    channel: Mutex<ProcessChannel>,
    child: Mutex<Child>,
}

impl SubprocessGenerator {
    pub fn device(&self) -> Option<&str> {
        self.device.as_deref()
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    fn mark_dead(&self, reason: &str) {
        if self.alive.swap(false, Ordering::AcqRel) {
            tracing::warn!(pid = self.pid, reason, "Shape worker is no longer usable");
        }
    }
}

impl ShapeGenerator for SubprocessGenerator {
    fn generate(&self, image: &Path) -> Result<Vec<MeshResult>> {
        let mut channel = self.channel.lock();
        let result = channel.generate(image);
        if channel.is_poisoned() {
            self.mark_dead("lost contact over stdin/stdout");
        }
        result
    }

    fn is_alive(&self) -> bool {
        if !self.alive.load(Ordering::Acquire) {
            return false;
        }

        // Only held by Drop, so a failed try_lock means we are going away anyway
        if let Some(mut child) = self.child.try_lock() {
            match child.try_wait() {
                Ok(Some(status)) => {
                    self.mark_dead(&format!("process exited with {status}"));
                    return false;
                }
                Ok(None) => {}
                Err(e) => tracing::debug!(pid = self.pid, error = %e, "Could not poll shape worker"),
            }
        }

        true
    }

    fn describe(&self) -> String {
        format!(
            "{} on {} (worker pid {})",
            self.model_id,
            self.device.as_deref().unwrap_or("unknown device"),
            self.pid
        )
    }
}

impl Drop for SubprocessGenerator {
    fn drop(&mut self) {
        let child = self.child.get_mut();
        tracing::info!(pid = self.pid, "Stopping shape worker");
        let _ = child.kill();
        let _ = child.wait();
    }
}

/// Spawns the worker process and waits for its handshake.
#[derive(Debug, Clone)]
pub struct WorkerLoader {
    program: String,
    args: Vec<String>,
}

impl WorkerLoader {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl PipelineLoader for WorkerLoader {
    fn load(&self, model_id: &str) -> Result<Arc<dyn ShapeGenerator>> {
        tracing::info!(program = %self.program, args = ?self.args, model_id, "Starting shape worker");

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg("--model")
            .arg(model_id)
            .env(ENV_MODEL_ID, model_id)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| {
                PipelineError::LoadFailed(format!("failed to start worker `{}`: {e}", self.program))
            })?;

        let pid = child.id();
        let (stdin, stdout) = match (child.stdin.take(), child.stdout.take()) {
            (Some(stdin), Some(stdout)) => (stdin, stdout),
            _ => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(PipelineError::LoadFailed(
                    "worker stdio was not captured".to_string(),
                ));
            }
        };

        let mut channel = WorkerChannel::new(BufReader::new(stdout), BufWriter::new(stdin));
        let device = match channel.handshake() {
            Ok(device) => device,
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(e);
            }
        };

        tracing::info!(pid, device = ?device, "Shape worker ready");

        Ok(Arc::new(SubprocessGenerator {
            model_id: model_id.to_string(),
            device,
            pid,
            alive: AtomicBool::new(true),
            channel: Mutex::new(channel),
            child: Mutex::new(child),
        }))
    }
}
