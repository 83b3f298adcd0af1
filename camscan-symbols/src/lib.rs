//! Shared barcode types for camscan: symbologies, decode options, and decoded symbols.

pub mod options;
pub mod symbol;
pub mod symbology;

pub use options::DecodeOptions;
pub use symbol::{now_millis, DecodedSymbol, MetadataValue, Point, METADATA_ORIENTATION};
pub use symbology::{BarcodeSymbology, ParseSymbologyError, SymbologySet, DEFAULT_SYMBOLOGY};
