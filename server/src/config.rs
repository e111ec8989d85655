//! Configuration system for the MeshGen server.
//!
//! Supports:
//! - CLI arguments and environment variables (highest priority)
//! - TOML config file
//! - Defaults (lowest priority)

use anyhow::{Context, Result};
use clap::Parser;
use meshgen_api::{ApiConfig, MIB};
use meshgen_pipeline::DEFAULT_MODEL_ID;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default worker interpreter.
pub const DEFAULT_WORKER_PROGRAM: &str = "python3";

/// Default worker script, relative to the working directory.
pub const DEFAULT_WORKER_SCRIPT: &str = "shapegen_worker.py";

/// Command-line arguments for the MeshGen server.
///
/// Options left unset fall through to the config file, then to defaults.
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "meshgen-server")]
#[command(about = "MeshGen Server - turn a single image into a binary glTF model over HTTP")]
#[command(version)]
pub struct CliArgs {
    /// Interface to bind
    #[arg(long, env = "HOST")]
    pub host: Option<String>,

    /// HTTP port
    #[arg(long, short = 'p', env = "PORT")]
    pub port: Option<u16>,

    /// Directory for per-request temp files
    #[arg(long, env = "TEMP_DIR")]
    pub temp_dir: Option<PathBuf>,

    /// Model repository passed to the worker
    #[arg(long, env = "MESHGEN_MODEL_ID")]
    pub model_id: Option<String>,

    /// Worker executable
    #[arg(long, env = "MESHGEN_WORKER")]
    pub worker_program: Option<String>,

    /// Argument for the worker executable (repeatable)
    #[arg(
        long = "worker-arg",
        env = "MESHGEN_WORKER_ARGS",
        value_delimiter = ',',
        allow_hyphen_values = true
    )]
    pub worker_args: Vec<String>,

    /// Optional TOML configuration file
    #[arg(long, short = 'c', env = "MESHGEN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Load the pipeline at startup instead of on the first request
    #[arg(long, env = "MESHGEN_PRELOAD")]
    pub preload: bool,

    /// Log filter directive (e.g. "info" or "meshgen_api=debug")
    #[arg(long, env = "RUST_LOG")]
    pub log_level: Option<String>,
}

/// `[server]` table.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSection {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub temp_dir: Option<PathBuf>,
    pub max_upload_mb: Option<usize>,
}

/// `[pipeline]` table.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineSection {
    pub model_id: Option<String>,
    pub worker_program: Option<String>,
    pub worker_args: Option<Vec<String>>,
    pub preload: Option<bool>,
}

/// Contents of the optional TOML file. Every key is optional.
///
/// ```toml
/// [server]
/// port = 8000
/// temp_dir = "/var/tmp/meshgen"
///
/// [pipeline]
/// worker_program = "python3"
/// worker_args = ["/opt/meshgen/shapegen_worker.py"]
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub server: ServerSection,
    pub pipeline: PipelineSection,
}

impl FileConfig {
    /// Load from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        toml::from_str(&contents).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}

/// Fully resolved server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub api: ApiConfig,
    pub model_id: String,
    pub worker_program: String,
    pub worker_args: Vec<String>,
    pub preload: bool,
}

impl ServerConfig {
    /// Load configuration from CLI args and the optional config file.
    ///
    /// Priority: CLI args / environment > config file > defaults
    pub fn load(args: &CliArgs) -> Result<Self> {
        let file = match &args.config {
            Some(path) => FileConfig::from_file(path)
                .with_context(|| format!("Failed to load config from {:?}", path))?,
            None => FileConfig::default(),
        };

        Ok(Self::resolve(args, file))
    }

    /// Merge already parsed sources.
    pub fn resolve(args: &CliArgs, file: FileConfig) -> Self {
        let defaults = ApiConfig::default();
        let FileConfig { server, pipeline } = file;

        let api = ApiConfig {
            host: args.host.clone().or(server.host).unwrap_or(defaults.host),
            port: args.port.or(server.port).unwrap_or(defaults.port),
            temp_dir: args
                .temp_dir
                .clone()
                .or(server.temp_dir)
                .unwrap_or(defaults.temp_dir),
            max_upload_bytes: server
                .max_upload_mb
                .map(|mb| mb.saturating_mul(MIB))
                .unwrap_or(defaults.max_upload_bytes),
            ..defaults
        };

        let worker_args = if !args.worker_args.is_empty() {
            args.worker_args.clone()
        } else {
            pipeline
                .worker_args
                .unwrap_or_else(|| vec![DEFAULT_WORKER_SCRIPT.to_string()])
        };

        Self {
            api,
            model_id: args
                .model_id
                .clone()
                .or(pipeline.model_id)
                .unwrap_or_else(|| DEFAULT_MODEL_ID.to_string()),
            worker_program: args
                .worker_program
                .clone()
                .or(pipeline.worker_program)
                .unwrap_or_else(|| DEFAULT_WORKER_PROGRAM.to_string()),
            worker_args,
            preload: args.preload || pipeline.preload.unwrap_or(false),
        }
    }
}
