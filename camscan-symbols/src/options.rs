//! Decoder configuration.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::symbology::{BarcodeSymbology, SymbologySet, DEFAULT_SYMBOLOGY};

/// Options applied to every decode attempt of a session.
///
/// Treated as an immutable value: changing any field means building a new
/// `DecodeOptions` and configuring the session with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeOptions {
    /// Retry rotated copies of the frame when the upright pass finds nothing.
    pub auto_rotate: bool,
    /// Character set hint for byte-mode payloads (e.g. `UTF-8`).
    pub character_set: Option<String>,
    /// Symbologies the decoder may report. Empty means [`DEFAULT_SYMBOLOGY`].
    pub possible_formats: BTreeSet<BarcodeSymbology>,
    /// The frame contains only a barcode, no surrounding scene.
    pub pure_barcode: bool,
    /// Report every disjoint symbol in the frame instead of the first one.
    pub read_multiple_codes: bool,
    /// Spend more time looking for a symbol.
    pub try_harder: bool,
    /// Retry with inverted luminance (light symbol on dark background).
    pub try_inverted: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            auto_rotate: false,
            character_set: None,
            possible_formats: BTreeSet::from([DEFAULT_SYMBOLOGY]),
            pure_barcode: false,
            read_multiple_codes: false,
            try_harder: true,
            try_inverted: false,
        }
    }
}

impl DecodeOptions {
    /// Options restricted to the given symbologies, other fields defaulted.
    pub fn with_formats(formats: impl IntoIterator<Item = BarcodeSymbology>) -> Self {
        Self {
            possible_formats: formats.into_iter().collect(),
            ..Self::default()
        }
    }

    /// The allow-list as a decoder bitmask, never empty.
    ///
    /// An empty configured set yields `{DEFAULT_SYMBOLOGY}` rather than an
    /// unrestricted search.
    pub fn effective_formats(&self) -> SymbologySet {
        let set: SymbologySet = self.possible_formats.iter().copied().collect();
        if set.is_empty() {
            [DEFAULT_SYMBOLOGY].into_iter().collect()
        } else {
            set
        }
    }
}
