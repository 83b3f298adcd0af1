pub mod scanner;
pub mod settings;

use std::sync::atomic::Ordering;

use anyhow::{Context, Result};
use camscan_media::decode_pipeline::{BarcodeDetected, DecodePipeline, DecodePipelineMetrics};
use scanner::Scanner;
use settings::Settings;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

type Detections = mpsc::UnboundedReceiver<BarcodeDetected>;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!("camscan starting");

    if std::env::args().any(|arg| arg == "--list-cameras") {
        return list_cameras();
    }

    let settings = Settings::load();
    let (pipeline, detections) = build_pipeline(&settings)?;
    let mut scanner = Scanner::new(pipeline);
    let detections = tokio::spawn(scanner::log_detections(detections));

    start_capture(&mut scanner, &settings)?;

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    tracing::info!("shutting down");

    scanner.stop_camera();
    scanner.pipeline().wait_idle().await;
    log_metrics(scanner.pipeline().metrics());
    drop(scanner);

    let count = detections.await.context("detection logger panicked")?;
    tracing::info!(count, "camscan stopped");
    Ok(())
}

#[cfg(feature = "rxing")]
fn build_pipeline(settings: &Settings) -> Result<(DecodePipeline, Detections)> {
    DecodePipeline::new(
        camscan_media::rxing_decoder::RxingDecoder::new(),
        settings.pipeline_config(),
    )
    .context("failed to create decode pipeline")
}

#[cfg(not(feature = "rxing"))]
fn build_pipeline(_settings: &Settings) -> Result<(DecodePipeline, Detections)> {
    anyhow::bail!("camscan was built without a symbol decoder; enable the `rxing` feature")
}

#[cfg(feature = "camera")]
fn start_capture(scanner: &mut Scanner, settings: &Settings) -> Result<()> {
    anyhow::ensure!(
        scanner.start_camera(settings),
        "could not open camera {}",
        settings.camera_index
    );
    Ok(())
}

#[cfg(not(feature = "camera"))]
fn start_capture(_scanner: &mut Scanner, _settings: &Settings) -> Result<()> {
    anyhow::bail!("camscan was built without camera support; enable the `camera` feature")
}

#[cfg(feature = "camera")]
fn list_cameras() -> Result<()> {
    for camera in camscan_media::camera::list_cameras()? {
        println!("{}\t{}\t{}", camera.index, camera.name, camera.description);
    }
    Ok(())
}

#[cfg(not(feature = "camera"))]
fn list_cameras() -> Result<()> {
    anyhow::bail!("camscan was built without camera support; enable the `camera` feature")
}

fn log_metrics(m: &DecodePipelineMetrics) {
    tracing::info!(
        frames_submitted = m.frames_submitted.load(Ordering::Relaxed),
        frames_throttled = m.frames_throttled.load(Ordering::Relaxed),
        frames_dropped_busy = m.frames_dropped_busy.load(Ordering::Relaxed),
        decodes_completed = m.decodes_completed.load(Ordering::Relaxed),
        decode_failures = m.decode_failures.load(Ordering::Relaxed),
        format_errors = m.format_errors.load(Ordering::Relaxed),
        detections_emitted = m.detections_emitted.load(Ordering::Relaxed),
        duplicates_suppressed = m.duplicates_suppressed.load(Ordering::Relaxed),
        "pipeline metrics"
    );
}
