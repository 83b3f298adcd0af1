//! Error types for frame conversion, session configuration, and decoding.

use camscan_symbols::BarcodeSymbology;
use thiserror::Error;

use crate::video_types::PixelFormat;

/// A frame could not be turned into a luminance map.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("unsupported pixel format {0}")]
    UnsupportedFormat(PixelFormat),
    #[error("cannot infer pixel format from {len} bytes for a {width}x{height} frame")]
    AmbiguousFormat { len: usize, width: u32, height: u32 },
    #[error("frame has zero width or height ({width}x{height})")]
    EmptyFrame { width: u32, height: u32 },
}

/// Decode options the session cannot honour.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("symbology {0} is not supported by the decoder")]
    UnsupportedSymbology(BarcodeSymbology),
}

/// A single decode attempt failed inside the symbol decoder.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("decoder error: {0}")]
    Backend(String),
    #[error("decoder panicked: {0}")]
    Panicked(String),
}
