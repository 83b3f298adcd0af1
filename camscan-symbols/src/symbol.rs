//! Decoded symbol results.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::symbology::BarcodeSymbology;

/// A point in frame pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// A metadata value attached to a decoded symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetadataValue {
    Int(i64),
    Text(String),
    Bytes(Vec<u8>),
}

/// Metadata key recording the clockwise rotation (degrees) a symbol was found at.
pub const METADATA_ORIENTATION: &str = "ORIENTATION";

/// One symbol found in a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedSymbol {
    /// Decoded text, if the payload is textual.
    pub text: Option<String>,
    /// Raw payload bytes, if the decoder exposes them.
    pub raw_bytes: Option<Vec<u8>>,
    /// Corner or finder points, in frame coordinates.
    pub corner_points: Vec<Point>,
    pub format: BarcodeSymbology,
    pub metadata: BTreeMap<String, MetadataValue>,
    /// Milliseconds since the UNIX epoch when the symbol was decoded.
    pub timestamp: u64,
}

impl DecodedSymbol {
    /// A text symbol stamped with the current time.
    pub fn new(text: impl Into<String>, format: BarcodeSymbology) -> Self {
        Self {
            text: Some(text.into()),
            raw_bytes: None,
            corner_points: Vec::new(),
            format,
            metadata: BTreeMap::new(),
            timestamp: now_millis(),
        }
    }

    /// Whether two symbols carry the same payload text and symbology.
    pub fn same_content(&self, other: &Self) -> bool {
        self.format == other.format && self.text == other.text
    }
}

/// Current wall-clock time in milliseconds since the UNIX epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
