//! Barcode symbologies and the bitmask set handed to symbol decoders.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Symbology substituted when a caller configures an empty format allow-list.
pub const DEFAULT_SYMBOLOGY: BarcodeSymbology = BarcodeSymbology::QrCode;

/// A barcode encoding standard.
///
/// Every variant except [`All1D`](Self::All1D) owns exactly one bit of a
/// [`SymbologySet`]. `All1D` is a composite covering the common linear codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BarcodeSymbology {
    #[serde(rename = "AZTEC")]
    Aztec,
    #[serde(rename = "CODABAR")]
    Codabar,
    #[serde(rename = "CODE_39")]
    Code39,
    #[serde(rename = "CODE_93")]
    Code93,
    #[serde(rename = "CODE_128")]
    Code128,
    #[serde(rename = "DATA_MATRIX")]
    DataMatrix,
    #[serde(rename = "EAN_8")]
    Ean8,
    #[serde(rename = "EAN_13")]
    Ean13,
    #[serde(rename = "ITF")]
    Itf,
    #[serde(rename = "MAXICODE")]
    MaxiCode,
    #[serde(rename = "PDF_417")]
    Pdf417,
    #[serde(rename = "QR_CODE")]
    QrCode,
    #[serde(rename = "RSS_14")]
    Rss14,
    #[serde(rename = "RSS_EXPANDED")]
    RssExpanded,
    #[serde(rename = "UPC_A")]
    UpcA,
    #[serde(rename = "UPC_E")]
    UpcE,
    #[serde(rename = "UPC_EAN_EXTENSION")]
    UpcEanExtension,
    #[serde(rename = "MSI")]
    Msi,
    #[serde(rename = "PLESSEY")]
    Plessey,
    #[serde(rename = "IMB")]
    Imb,
    #[serde(rename = "PHARMA_CODE")]
    PharmaCode,
    #[serde(rename = "ALL_1D")]
    All1D,
}

impl BarcodeSymbology {
    /// Every symbology, concrete ones first, in bit order.
    pub const ALL: [Self; 22] = [
        Self::Aztec,
        Self::Codabar,
        Self::Code39,
        Self::Code93,
        Self::Code128,
        Self::DataMatrix,
        Self::Ean8,
        Self::Ean13,
        Self::Itf,
        Self::MaxiCode,
        Self::Pdf417,
        Self::QrCode,
        Self::Rss14,
        Self::RssExpanded,
        Self::UpcA,
        Self::UpcE,
        Self::UpcEanExtension,
        Self::Msi,
        Self::Plessey,
        Self::Imb,
        Self::PharmaCode,
        Self::All1D,
    ];

    /// Members of the `All1D` composite.
    pub const ONE_DIMENSIONAL: [Self; 11] = [
        Self::Codabar,
        Self::Code39,
        Self::Code93,
        Self::Code128,
        Self::Ean8,
        Self::Ean13,
        Self::Itf,
        Self::Rss14,
        Self::RssExpanded,
        Self::UpcA,
        Self::UpcE,
    ];

    /// Canonical upper-case name, e.g. `QR_CODE`.
    pub fn name(self) -> &'static str {
        match self {
            Self::Aztec => "AZTEC",
            Self::Codabar => "CODABAR",
            Self::Code39 => "CODE_39",
            Self::Code93 => "CODE_93",
            Self::Code128 => "CODE_128",
            Self::DataMatrix => "DATA_MATRIX",
            Self::Ean8 => "EAN_8",
            Self::Ean13 => "EAN_13",
            Self::Itf => "ITF",
            Self::MaxiCode => "MAXICODE",
            Self::Pdf417 => "PDF_417",
            Self::QrCode => "QR_CODE",
            Self::Rss14 => "RSS_14",
            Self::RssExpanded => "RSS_EXPANDED",
            Self::UpcA => "UPC_A",
            Self::UpcE => "UPC_E",
            Self::UpcEanExtension => "UPC_EAN_EXTENSION",
            Self::Msi => "MSI",
            Self::Plessey => "PLESSEY",
            Self::Imb => "IMB",
            Self::PharmaCode => "PHARMA_CODE",
            Self::All1D => "ALL_1D",
        }
    }

    /// Whether this value stands for several concrete symbologies.
    pub fn is_composite(self) -> bool {
        matches!(self, Self::All1D)
    }

    /// Bitmask of the concrete symbologies this value covers.
    pub fn mask(self) -> u32 {
        match self {
            Self::All1D => Self::ONE_DIMENSIONAL
                .iter()
                .fold(0, |mask, s| mask | s.mask()),
            concrete => 1 << (concrete as u32),
        }
    }

    /// Look up the concrete symbology owning exactly the given bit.
    pub fn from_bit(bit: u32) -> Option<Self> {
        if bit.count_ones() != 1 {
            return None;
        }
        Self::ALL
            .iter()
            .copied()
            .find(|s| !s.is_composite() && s.mask() == bit)
    }
}

impl fmt::Display for BarcodeSymbology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when a symbology name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown barcode symbology: {0:?}")]
pub struct ParseSymbologyError(pub String);

impl FromStr for BarcodeSymbology {
    type Err = ParseSymbologyError;

    /// Parse a canonical name. Matching ignores ASCII case and accepts `-` for `_`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        Self::ALL
            .iter()
            .copied()
            .find(|sym| sym.name() == normalized)
            .ok_or_else(|| ParseSymbologyError(s.to_string()))
    }
}

/// Bitmask of concrete symbologies, the representation decoders consume.
///
/// Composites are expanded on insertion, so a set never contains `All1D`
/// itself; it contains its members.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SymbologySet(u32);

impl SymbologySet {
    /// Every valid bit.
    const VALID_BITS: u32 = (1 << 21) - 1;

    /// An empty set.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// A set containing every concrete symbology.
    pub const fn all() -> Self {
        Self(Self::VALID_BITS)
    }

    /// Rebuild a set from raw bits, rejecting bits no symbology owns.
    pub fn from_bits(bits: u32) -> Option<Self> {
        (bits & !Self::VALID_BITS == 0).then_some(Self(bits))
    }

    /// Raw bitmask.
    pub fn bits(self) -> u32 {
        self.0
    }

    /// Add a symbology (composites add all of their members).
    pub fn insert(&mut self, symbology: BarcodeSymbology) {
        self.0 |= symbology.mask();
    }

    /// Whether every concrete symbology covered by `symbology` is present.
    pub fn contains(self, symbology: BarcodeSymbology) -> bool {
        let mask = symbology.mask();
        self.0 & mask == mask
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Number of concrete symbologies in the set.
    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Members of `self` missing from `other`.
    pub fn difference(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    /// Iterate the concrete symbologies in bit order.
    pub fn iter(self) -> impl Iterator<Item = BarcodeSymbology> {
        BarcodeSymbology::ALL
            .into_iter()
            .filter(move |s| !s.is_composite() && self.0 & s.mask() != 0)
    }
}

impl FromIterator<BarcodeSymbology> for SymbologySet {
    fn from_iter<I: IntoIterator<Item = BarcodeSymbology>>(iter: I) -> Self {
        let mut set = Self::empty();
        for symbology in iter {
            set.insert(symbology);
        }
        set
    }
}

impl fmt::Display for SymbologySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(BarcodeSymbology::name).collect();
        write!(f, "[{}]", names.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_roundtrip_through_from_str() {
        for sym in BarcodeSymbology::ALL {
            assert_eq!(sym.name().parse::<BarcodeSymbology>().unwrap(), sym);
        }
    }

    #[test]
    fn from_str_is_lenient_about_case_and_dashes() {
        assert_eq!(
            "qr-code".parse::<BarcodeSymbology>().unwrap(),
            BarcodeSymbology::QrCode
        );
        assert_eq!(
            " code_128 ".parse::<BarcodeSymbology>().unwrap(),
            BarcodeSymbology::Code128
        );
        assert!("QR".parse::<BarcodeSymbology>().is_err());
    }

    #[test]
    fn every_concrete_symbology_owns_a_distinct_bit() {
        let mut seen = 0u32;
        for sym in BarcodeSymbology::ALL.iter().filter(|s| !s.is_composite()) {
            let bit = sym.mask();
            assert_eq!(bit.count_ones(), 1, "{sym} should own one bit");
            assert_eq!(seen & bit, 0, "{sym} bit collides");
            assert_eq!(BarcodeSymbology::from_bit(bit), Some(*sym));
            seen |= bit;
        }
        assert_eq!(SymbologySet::from_bits(seen), Some(SymbologySet::all()));
    }

    #[test]
    fn all_1d_expands_to_linear_codes() {
        let set: SymbologySet = [BarcodeSymbology::All1D].into_iter().collect();
        assert_eq!(set.len(), BarcodeSymbology::ONE_DIMENSIONAL.len());
        assert!(set.contains(BarcodeSymbology::Code128));
        assert!(set.contains(BarcodeSymbology::Ean13));
        assert!(set.contains(BarcodeSymbology::All1D));
        assert!(!set.contains(BarcodeSymbology::QrCode));
        assert!(set.iter().all(|s| !s.is_composite()));
        assert_eq!(BarcodeSymbology::from_bit(BarcodeSymbology::All1D.mask()), None);
    }

    #[test]
    fn from_bits_rejects_unowned_bits() {
        assert!(SymbologySet::from_bits(1 << 30).is_none());
        assert_eq!(SymbologySet::from_bits(0), Some(SymbologySet::empty()));
    }

    #[test]
    fn difference_reports_missing_members() {
        let wanted: SymbologySet = [BarcodeSymbology::QrCode, BarcodeSymbology::Msi]
            .into_iter()
            .collect();
        let supported: SymbologySet = [BarcodeSymbology::QrCode].into_iter().collect();
        let missing: Vec<_> = wanted.difference(supported).iter().collect();
        assert_eq!(missing, vec![BarcodeSymbology::Msi]);
    }

    #[test]
    fn display_lists_members() {
        let set: SymbologySet = [BarcodeSymbology::QrCode, BarcodeSymbology::Aztec]
            .into_iter()
            .collect();
        assert_eq!(set.to_string(), "[AZTEC, QR_CODE]");
    }
}
