//! camdetect: live object detection served over HTTP and WebSocket

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use color_eyre::Result;
use tokio::sync::watch;
use tracing::{error, info};

use camdetect::capture::{CameraPeripheral, FrameSource, SyntheticCamera};
use camdetect::inference::{InferenceEngine, NullEngine};
use camdetect::pipeline::buffers::MemoryBudget;
use camdetect::pipeline::{LatestFrame, Pipeline, PipelineOptions, ResultPublisher};
use camdetect::server::{self, AppState, WsHub};
use camdetect::{utils, CameraConfig, CameraSource, Config};

fn open_camera(config: &CameraConfig) -> Result<Box<dyn CameraPeripheral>> {
    match config.source {
        CameraSource::Synthetic => {
            info!("Using synthetic camera");
            Ok(Box::new(SyntheticCamera::new(config)))
        }
        #[cfg(feature = "v4l2")]
        CameraSource::V4l2 => {
            let path = if config.device.is_empty() {
                utils::auto_detect_device()?.path
            } else {
                config.device.clone()
            };
            info!("Using capture device: {}", path);
            Ok(Box::new(camdetect::capture::V4l2Camera::open(&path, config)?))
        }
        #[cfg(not(feature = "v4l2"))]
        CameraSource::V4l2 => Err(color_eyre::eyre::eyre!(
            "built without the v4l2 feature; use the synthetic camera"
        )),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize error handling and logging
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("camdetect=debug")),
        )
        .with_timer(tracing_subscriber::fmt::time::uptime())
        .init();

    info!("camdetect launching...");

    // Load configuration
    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = Config::load(config_path.as_deref())?;
    camdetect::CONFIG.store(Arc::new(config.clone()));
    let restart_delay = Duration::from_millis(config.pipeline.restart_delay_ms);

    let camera = match open_camera(&config.camera) {
        Ok(camera) => camera,
        Err(e) => {
            error!("Camera initialization failed: {:#}", e);
            utils::restart(restart_delay);
        }
    };

    let engine: Box<dyn InferenceEngine> = Box::new(NullEngine::new(&config.model));
    let model = engine.input_resolution();

    let hub = WsHub::new(config.server.broadcast_capacity);
    let latest: LatestFrame = Arc::new(ArcSwapOption::empty());
    let mut budget = MemoryBudget::new(
        config.memory.internal_heap_bytes,
        config.memory.external_pool_bytes,
    );

    let pipeline = match Pipeline::new(
        FrameSource::new(camera),
        engine,
        ResultPublisher::new(Arc::new(hub.clone())),
        latest.clone(),
        &mut budget,
        PipelineOptions::from_config(&config),
    ) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            error!(fatal = e.is_fatal(), "Pipeline setup failed: {}", e);
            utils::restart(restart_delay);
        }
    };

    // Pipeline thread, stopped through the channel between cycles
    let (stop_pipeline, pipeline_stopped) = flume::bounded::<()>(1);
    let worker = std::thread::Builder::new()
        .name("detect-pipeline".into())
        .spawn(move || pipeline.run(pipeline_stopped))?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown requested");
        }
        let _ = shutdown_tx.send(true);
    });

    let state = AppState {
        latest,
        hub,
        model,
        shutdown: shutdown_rx.clone(),
    };
    let mut server_shutdown = shutdown_rx;
    let served = server::serve(&config.server.bind_addr, state, async move {
        let _ = server_shutdown.changed().await;
    })
    .await;

    let _ = stop_pipeline.send(());
    if worker.join().is_err() {
        error!("Pipeline thread panicked");
    }

    served?;
    info!("camdetect shutting down");
    Ok(())
}
