//! Suppression of repeated detection events for an unchanged scene.

use camscan_symbols::DecodedSymbol;

/// Whether a freshly decoded set should be emitted.
///
/// Empty sets are never emitted. Without duplicate control every non-empty
/// set is emitted. With it, a set is suppressed only when every symbol
/// already appeared (same text and format) in `previous`.
pub fn should_emit(
    new_results: &[DecodedSymbol],
    previous_results: &[DecodedSymbol],
    control_duplicates: bool,
) -> bool {
    if new_results.is_empty() {
        return false;
    }
    if !control_duplicates {
        return true;
    }
    new_results
        .iter()
        .any(|new| !previous_results.iter().any(|prev| prev.same_content(new)))
}

/// Remembers the last emitted set and applies [`should_emit`] to new ones.
#[derive(Debug, Default)]
pub struct ResultStabilizer {
    previous: Vec<DecodedSymbol>,
    control_duplicates: bool,
}

impl ResultStabilizer {
    pub fn new(control_duplicates: bool) -> Self {
        Self {
            previous: Vec::new(),
            control_duplicates,
        }
    }

    /// Offer a decoded set; returns it back if it should be emitted.
    ///
    /// An emitted set becomes the new comparison baseline.
    pub fn offer(&mut self, results: Vec<DecodedSymbol>) -> Option<Vec<DecodedSymbol>> {
        if !should_emit(&results, &self.previous, self.control_duplicates) {
            return None;
        }
        self.previous = results.clone();
        Some(results)
    }

    /// The last emitted set.
    pub fn previous(&self) -> &[DecodedSymbol] {
        &self.previous
    }

    /// Forget the last emitted set.
    pub fn clear(&mut self) {
        self.previous.clear();
    }

    pub fn set_control_duplicates(&mut self, control_duplicates: bool) {
        self.control_duplicates = control_duplicates;
    }

    pub fn control_duplicates(&self) -> bool {
        self.control_duplicates
    }
}
