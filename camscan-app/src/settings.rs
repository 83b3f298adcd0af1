//! Scanner settings persistence via TOML.
//!
//! Settings are stored at `<config_dir>/camscan/settings.toml`.
//! Missing or corrupted config files return sensible defaults.

use std::path::PathBuf;

use anyhow::{Context, Result};
use camscan_media::decode_pipeline::PipelineConfig;
use camscan_media::throttle::{ThrottleConfig, DEFAULT_FRAME_RATE, DEFAULT_MIN_INTERVAL};
use camscan_symbols::DecodeOptions;
use serde::{Deserialize, Serialize};

/// User-configurable settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Index of the camera to open.
    pub camera_index: u32,
    /// Requested capture width in pixels.
    pub width: u32,
    /// Requested capture height in pixels.
    pub height: u32,
    /// Requested capture frame rate.
    pub capture_frame_rate: u32,
    /// Start with detection enabled.
    pub detection_enabled: bool,
    /// Decode every N-th frame; zero or negative disables decoding.
    pub decode_every: i32,
    /// Lower bound on the decode interval.
    pub min_interval: u32,
    /// Suppress detections that repeat the previous result.
    pub control_duplicates: bool,
    /// Symbol decoder options.
    pub decode: DecodeOptions,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            camera_index: 0,
            width: 640,
            height: 480,
            capture_frame_rate: 30,
            detection_enabled: true,
            decode_every: DEFAULT_FRAME_RATE,
            min_interval: DEFAULT_MIN_INTERVAL,
            control_duplicates: true,
            decode: DecodeOptions::default(),
        }
    }
}

impl Settings {
    /// Load settings from the default config path.
    ///
    /// Returns defaults if the file doesn't exist or is corrupted.
    pub fn load() -> Self {
        Self::load_from_dir(Self::config_dir())
    }

    /// Save settings to the default config path.
    pub fn save(&self) -> Result<()> {
        self.save_to_dir(Self::config_dir())
    }

    /// Load settings from a specific config directory.
    pub fn load_from_dir(config_dir: PathBuf) -> Self {
        let path = config_dir.join("settings.toml");
        match std::fs::read_to_string(&path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(settings) => {
                    tracing::info!(path = %path.display(), "settings loaded");
                    settings
                }
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "corrupted settings file, using defaults"
                    );
                    Self::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(
                    path = %path.display(),
                    "settings file not found, using defaults"
                );
                Self::default()
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to read settings file, using defaults"
                );
                Self::default()
            }
        }
    }

    /// Save settings to a specific config directory.
    pub fn save_to_dir(&self, config_dir: PathBuf) -> Result<()> {
        std::fs::create_dir_all(&config_dir).with_context(|| {
            format!(
                "failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        let path = config_dir.join("settings.toml");
        let contents = toml::to_string_pretty(self).context("failed to serialize settings")?;
        std::fs::write(&path, &contents)
            .with_context(|| format!("failed to write settings file: {}", path.display()))?;

        tracing::info!(path = %path.display(), "settings saved");
        Ok(())
    }

    /// Pipeline configuration derived from these settings.
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            options: self.decode.clone(),
            throttle: ThrottleConfig {
                frame_rate: self.decode_every,
                min_interval: self.min_interval,
            },
            control_duplicates: self.control_duplicates,
            detection_enabled: self.detection_enabled,
        }
    }

    /// Camera configuration derived from these settings.
    #[cfg(feature = "camera")]
    pub fn camera_config(&self) -> camscan_media::camera::CameraConfig {
        camscan_media::camera::CameraConfig {
            width: self.width,
            height: self.height,
            frame_rate: self.capture_frame_rate,
        }
    }

    fn config_dir() -> PathBuf {
        directories::ProjectDirs::from("", "", "camscan")
            .map(|d| d.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("camscan-config"))
    }
}
