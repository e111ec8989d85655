//! MeshGen Server - HTTP service that turns a single image into a binary glTF model.
//!
//! Wires the pieces together: accelerator probe, worker-backed pipeline
//! holder, API state and the Axum server with graceful shutdown.

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod config;

use crate::config::{CliArgs, ServerConfig};
use meshgen_api::AppState;
use meshgen_hardware::AccelerationInfo;
use meshgen_pipeline::{PipelineHolder, WorkerLoader};

const DEFAULT_LOG_FILTER: &str =
    "meshgen_server=info,meshgen_api=info,meshgen_pipeline=info,tower_http=info";

fn init_tracing(directive: Option<&str>) -> Result<()> {
    let filter = match directive {
        Some(directive) => EnvFilter::try_new(directive)
            .with_context(|| format!("Invalid log filter: {directive}"))?,
        None => EnvFilter::new(DEFAULT_LOG_FILTER),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, finishing in-flight requests");
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_tracing(args.log_level.as_deref())?;

    info!("Starting MeshGen Server v{}", env!("CARGO_PKG_VERSION"));

    let config = ServerConfig::load(&args)?;
    info!(
        bind = %config.api.bind_addr(),
        temp_dir = %config.api.temp_dir.display(),
        model_id = %config.model_id,
        worker = %config.worker_program,
        worker_args = ?config.worker_args,
        "Configuration loaded"
    );

    let acceleration = tokio::task::spawn_blocking(AccelerationInfo::detect)
        .await
        .context("Accelerator probe panicked")?;
    info!(
        cuda_available = acceleration.cuda_available,
        device_count = acceleration.device_count,
        gpus = acceleration.devices.len(),
        "Accelerator probe finished"
    );

    let loader = Arc::new(WorkerLoader::new(
        config.worker_program.clone(),
        config.worker_args.clone(),
    ));
    let pipeline = Arc::new(PipelineHolder::new(
        config.model_id.clone(),
        loader,
        acceleration,
    ));

    let state = AppState::new(config.api.clone(), Arc::clone(&pipeline)).with_context(|| {
        format!("Failed to create temp directory {:?}", config.api.temp_dir)
    })?;

    if config.preload {
        let pipeline = Arc::clone(&pipeline);
        tokio::spawn(async move {
            info!("Preloading pipeline");
            if let Err(e) = pipeline.acquire().await {
                warn!(error = %e, "Preload failed, will retry on first request");
            }
        });
    }

    meshgen_api::run_server(Arc::new(state), shutdown_signal()).await
}
