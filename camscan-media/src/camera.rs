//! Camera capture using `nokhwa`.
//!
//! Requires the `camera` feature to be enabled. Frames are delivered as
//! straight-alpha [`PixelFormat::Rgba32`] buffers ready for the decode pipeline.

use anyhow::{Context, Result};
use nokhwa::pixel_format::RgbAFormat;
use nokhwa::utils::{
    ApiBackend, CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType,
    Resolution,
};

use crate::video_types::{PixelFormat, RawFrame};

/// Camera configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraConfig {
    pub width: u32,
    pub height: u32,
    /// Target capture frame rate.
    pub frame_rate: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            frame_rate: 30,
        }
    }
}

/// Information about an available camera.
#[derive(Debug, Clone)]
pub struct CameraInfo {
    pub name: String,
    pub index: u32,
    /// Backend-specific description.
    pub description: String,
}

/// List available cameras.
///
/// Returns an empty list if no cameras are detected.
pub fn list_cameras() -> Result<Vec<CameraInfo>> {
    let cameras = match nokhwa::query(ApiBackend::Auto) {
        Ok(c) => c,
        Err(e) => {
            tracing::debug!(error = %e, "camera query returned error, treating as empty");
            return Ok(Vec::new());
        }
    };

    let result: Vec<CameraInfo> = cameras
        .into_iter()
        .filter_map(|cam| match cam.index() {
            CameraIndex::Index(i) => Some(CameraInfo {
                name: cam.human_name().to_string(),
                index: *i,
                description: cam.description().to_string(),
            }),
            CameraIndex::String(_) => None,
        })
        .collect();

    tracing::debug!(count = result.len(), "enumerated cameras");
    Ok(result)
}

/// An open camera stream.
pub struct Camera {
    inner: nokhwa::Camera,
    config: CameraConfig,
}

impl Camera {
    /// Open a camera and start streaming.
    pub fn open(camera_index: u32, config: CameraConfig) -> Result<Self> {
        let requested = RequestedFormat::new::<RgbAFormat>(RequestedFormatType::Closest(
            CameraFormat::new(
                Resolution::new(config.width, config.height),
                FrameFormat::MJPEG,
                config.frame_rate,
            ),
        ));

        let mut camera = nokhwa::Camera::new(CameraIndex::Index(camera_index), requested)
            .context("failed to open camera")?;
        camera
            .open_stream()
            .context("failed to open camera stream")?;

        let res = camera.resolution();
        let config = CameraConfig {
            width: res.width(),
            height: res.height(),
            frame_rate: camera.frame_rate(),
        };
        tracing::info!(
            camera_index,
            width = config.width,
            height = config.height,
            fps = config.frame_rate,
            "camera opened"
        );

        Ok(Self {
            inner: camera,
            config,
        })
    }

    /// Capture the next frame as RGBA.
    pub fn capture_frame(&mut self) -> Result<RawFrame> {
        let res = self.inner.resolution();
        let mut data = vec![0u8; res.width() as usize * res.height() as usize * 4];
        self.inner
            .write_frame_to_buffer::<RgbAFormat>(&mut data)
            .context("failed to capture and decode frame")?;
        Ok(RawFrame::new(
            data,
            res.width(),
            res.height(),
            PixelFormat::Rgba32,
        ))
    }

    pub fn stop(&mut self) -> Result<()> {
        self.inner
            .stop_stream()
            .context("failed to stop camera stream")?;
        tracing::info!("camera stopped");
        Ok(())
    }

    /// The negotiated configuration.
    pub fn config(&self) -> &CameraConfig {
        &self.config
    }

    pub fn is_open(&self) -> bool {
        self.inner.is_stream_open()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::init_test_tracing;

    #[test]
    fn list_cameras_does_not_panic() {
        init_test_tracing();
        match list_cameras() {
            Ok(cameras) => {
                for cam in &cameras {
                    tracing::info!(index = cam.index, name = %cam.name, "camera");
                }
            }
            Err(e) => tracing::info!(error = %e, "could not enumerate cameras"),
        }
    }

    #[test]
    fn camera_config_default() {
        let config = CameraConfig::default();
        assert_eq!(config.width, 640);
        assert_eq!(config.height, 480);
        assert_eq!(config.frame_rate, 30);
    }

    #[test]
    fn captured_frames_convert_to_luminance() {
        init_test_tracing();
        let cameras = list_cameras().unwrap_or_default();
        let Some(info) = cameras.first() else {
            tracing::info!("skipping: no cameras available");
            return;
        };
        let mut camera = match Camera::open(info.index, CameraConfig::default()) {
            Ok(c) => c,
            Err(e) => {
                tracing::info!(error = %e, "skipping: failed to open camera");
                return;
            }
        };

        let frame = camera.capture_frame().expect("failed to capture frame");
        assert_eq!(frame.format, PixelFormat::Rgba32);
        assert_eq!(frame.width, camera.config().width);

        let map = frame.to_luminance().expect("rgba frame converts");
        assert_eq!(map.data().len(), frame.pixel_count());

        camera.stop().expect("failed to stop camera");
        assert!(!camera.is_open());
    }
}
