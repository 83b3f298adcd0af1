//! Scanner integration: camera capture feeding the decode pipeline.
//!
//! Frames flow from a dedicated capture thread straight into
//! [`DecodePipeline::submit_owned_frame`]; the pipeline decides which ones are
//! decoded. Detections are drained by [`log_detections`].
//!
//! Camera capture requires the `camera` feature.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use camscan_media::decode_pipeline::{BarcodeDetected, DecodePipeline};
use camscan_media::video_types::RawFrame;
use tokio::sync::mpsc;

/// Owns the decode pipeline and the capture thread feeding it.
pub struct Scanner {
    pipeline: Arc<DecodePipeline>,
    /// Stop flag of the running capture thread (std::thread, not tokio).
    camera_stop: Option<Arc<AtomicBool>>,
}

impl Scanner {
    pub fn new(pipeline: DecodePipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            camera_stop: None,
        }
    }

    pub fn pipeline(&self) -> &DecodePipeline {
        &self.pipeline
    }

    /// Hand one frame to the pipeline, as the capture thread does.
    pub fn feed(&self, frame: RawFrame) -> bool {
        self.pipeline.submit_owned_frame(frame)
    }

    /// Start camera capture.
    ///
    /// Returns true if the camera was successfully opened.
    #[cfg(feature = "camera")]
    pub fn start_camera(&mut self, settings: &crate::settings::Settings) -> bool {
        if self.camera_stop.is_some() {
            tracing::debug!("camera already running");
            return true;
        }

        let stop_flag = Arc::new(AtomicBool::new(false));
        let started = start_camera_capture(
            Arc::clone(&self.pipeline),
            settings.camera_index,
            settings.camera_config(),
            Arc::clone(&stop_flag),
        );

        if started {
            self.camera_stop = Some(stop_flag);
            self.pipeline.start();
            tracing::info!("camera started");
        } else {
            tracing::warn!("failed to start camera");
        }
        started
    }

    /// Stop camera capture and put the pipeline to idle.
    pub fn stop_camera(&mut self) {
        if let Some(stop) = self.camera_stop.take() {
            stop.store(true, Ordering::Relaxed);
            tracing::info!("camera stopped");
        }
        self.pipeline.stop();
    }

    pub fn is_camera_on(&self) -> bool {
        self.camera_stop.is_some()
    }
}

impl Drop for Scanner {
    fn drop(&mut self) {
        self.stop_camera();
    }
}

/// Spawn the capture thread and wait until the camera has opened.
#[cfg(feature = "camera")]
fn start_camera_capture(
    pipeline: Arc<DecodePipeline>,
    camera_index: u32,
    config: camscan_media::camera::CameraConfig,
    stop: Arc<AtomicBool>,
) -> bool {
    use camscan_media::camera::Camera;

    // Camera types (nokhwa) are not Send, so open and use on a dedicated thread
    let (ready_tx, ready_rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        let mut camera = match Camera::open(camera_index, config) {
            Ok(camera) => {
                let _ = ready_tx.send(true);
                camera
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to open camera");
                let _ = ready_tx.send(false);
                return;
            }
        };

        let mut consecutive_errors = 0u32;
        while !stop.load(Ordering::Relaxed) {
            match camera.capture_frame() {
                Ok(frame) => {
                    consecutive_errors = 0;
                    pipeline.submit_owned_frame(frame);
                }
                Err(e) => {
                    consecutive_errors += 1;
                    tracing::warn!(error = %e, consecutive_errors, "camera capture error");
                    if consecutive_errors >= 10 {
                        tracing::error!("too many capture errors, stopping camera thread");
                        break;
                    }
                    std::thread::sleep(std::time::Duration::from_millis(50));
                }
            }
        }

        if let Err(e) = camera.stop() {
            tracing::warn!(error = %e, "failed to stop camera cleanly");
        }
        tracing::debug!("camera capture thread exiting");
    });

    ready_rx.recv().unwrap_or(false)
}

/// Log every detection until the pipeline's event channel closes.
///
/// Decoded text is also written to stdout, one symbol per line.
pub async fn log_detections(mut rx: mpsc::UnboundedReceiver<BarcodeDetected>) -> u64 {
    let mut count = 0;
    while let Some(event) = rx.recv().await {
        for symbol in &event.symbols {
            count += 1;
            let text = symbol.text.as_deref().unwrap_or("");
            tracing::info!(
                frame_id = event.frame_id,
                format = %symbol.format,
                text,
                corners = symbol.corner_points.len(),
                "barcode detected"
            );
            println!("{}\t{}", symbol.format, text);
        }
    }
    count
}
