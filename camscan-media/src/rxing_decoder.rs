//! Symbol decoding with `rxing`.
//!
//! Requires the `rxing` feature to be enabled.

use std::collections::{HashMap, HashSet};

use camscan_symbols::{
    now_millis, BarcodeSymbology, DecodedSymbol, MetadataValue, Point, SymbologySet,
};
use rxing::{
    BarcodeFormat, DecodeHintType, DecodeHintValue, DecodingHintDictionary, Exceptions,
    RXingResultMetadataValue,
};

use crate::decode_session::{DecodeHints, SymbolDecoder};
use crate::error::DecodeError;
use crate::luminance::LuminanceMap;

/// Map a symbology to the `rxing` format, if `rxing` can read it.
pub fn to_rxing_format(symbology: BarcodeSymbology) -> Option<BarcodeFormat> {
    use BarcodeSymbology as S;
    let format = match symbology {
        S::Aztec => BarcodeFormat::AZTEC,
        S::Codabar => BarcodeFormat::CODABAR,
        S::Code39 => BarcodeFormat::CODE_39,
        S::Code93 => BarcodeFormat::CODE_93,
        S::Code128 => BarcodeFormat::CODE_128,
        S::DataMatrix => BarcodeFormat::DATA_MATRIX,
        S::Ean8 => BarcodeFormat::EAN_8,
        S::Ean13 => BarcodeFormat::EAN_13,
        S::Itf => BarcodeFormat::ITF,
        S::MaxiCode => BarcodeFormat::MAXICODE,
        S::Pdf417 => BarcodeFormat::PDF_417,
        S::QrCode => BarcodeFormat::QR_CODE,
        S::Rss14 => BarcodeFormat::RSS_14,
        S::RssExpanded => BarcodeFormat::RSS_EXPANDED,
        S::UpcA => BarcodeFormat::UPC_A,
        S::UpcE => BarcodeFormat::UPC_E,
        S::UpcEanExtension => BarcodeFormat::UPC_EAN_EXTENSION,
        S::Msi | S::Plessey | S::Imb | S::PharmaCode | S::All1D => return None,
    };
    Some(format)
}

/// Map an `rxing` format back to a symbology.
pub fn from_rxing_format(format: &BarcodeFormat) -> Option<BarcodeSymbology> {
    BarcodeSymbology::ALL
        .into_iter()
        .find(|s| to_rxing_format(*s).as_ref() == Some(format))
}

/// Decoder backed by `rxing`'s multi-format reader.
#[derive(Debug, Default)]
pub struct RxingDecoder;

impl RxingDecoder {
    pub fn new() -> Self {
        Self
    }

    fn hint_dictionary(hints: &DecodeHints) -> DecodingHintDictionary {
        let formats: HashSet<BarcodeFormat> =
            hints.formats.iter().filter_map(to_rxing_format).collect();

        let mut dict: DecodingHintDictionary = HashMap::new();
        dict.insert(
            DecodeHintType::POSSIBLE_FORMATS,
            DecodeHintValue::PossibleFormats(formats),
        );
        if hints.try_harder {
            dict.insert(DecodeHintType::TRY_HARDER, DecodeHintValue::TryHarder(true));
        }
        if hints.pure_barcode {
            dict.insert(
                DecodeHintType::PURE_BARCODE,
                DecodeHintValue::PureBarcode(true),
            );
        }
        if let Some(charset) = &hints.character_set {
            dict.insert(
                DecodeHintType::CHARACTER_SET,
                DecodeHintValue::CharacterSet(charset.clone()),
            );
        }
        dict
    }
}

impl SymbolDecoder for RxingDecoder {
    fn supported(&self) -> SymbologySet {
        BarcodeSymbology::ALL
            .into_iter()
            .filter(|s| to_rxing_format(*s).is_some())
            .collect()
    }

    fn decode(
        &mut self,
        map: &LuminanceMap,
        hints: &DecodeHints,
    ) -> Result<Option<DecodedSymbol>, DecodeError> {
        let mut dict = Self::hint_dictionary(hints);
        match rxing::helpers::detect_in_luma_with_hints(
            map.data().to_vec(),
            map.width(),
            map.height(),
            None,
            &mut dict,
        ) {
            Ok(result) => Ok(convert_result(&result)),
            Err(Exceptions::NotFoundException(_)) => Ok(None),
            Err(e) => Err(backend_error(e)),
        }
    }

    fn decode_multiple(
        &mut self,
        map: &LuminanceMap,
        hints: &DecodeHints,
    ) -> Result<Vec<DecodedSymbol>, DecodeError> {
        let mut dict = Self::hint_dictionary(hints);
        match rxing::helpers::detect_multiple_in_luma_with_hints(
            map.data().to_vec(),
            map.width(),
            map.height(),
            &mut dict,
        ) {
            Ok(results) => Ok(results.iter().filter_map(convert_result).collect()),
            Err(Exceptions::NotFoundException(_)) => Ok(Vec::new()),
            Err(e) => Err(backend_error(e)),
        }
    }
}

fn backend_error(e: Exceptions) -> DecodeError {
    tracing::debug!(error = %e, "rxing error");
    DecodeError::Backend(e.to_string())
}

/// Convert an `rxing` result; formats without a symbology are dropped.
fn convert_result(result: &rxing::RXingResult) -> Option<DecodedSymbol> {
    let Some(format) = from_rxing_format(result.getBarcodeFormat()) else {
        tracing::debug!(format = ?result.getBarcodeFormat(), "ignoring unmapped rxing format");
        return None;
    };

    let raw = result.getRawBytes().to_vec();
    // Metadata keys are plain unit variants, e.g. `ORIENTATION`.
    let metadata = result
        .getRXingResultMetadata()
        .iter()
        .filter_map(|(key, value)| Some((format!("{key:?}"), metadata_value(value)?)))
        .collect();

    Some(DecodedSymbol {
        text: Some(result.getText().to_owned()),
        raw_bytes: (!raw.is_empty()).then_some(raw),
        corner_points: result
            .getPoints()
            .iter()
            .map(|p| Point::new(p.x, p.y))
            .collect(),
        format,
        metadata,
        timestamp: now_millis(),
    })
}

/// Convert one `rxing` metadata value. Structured values with no flat form are skipped.
fn metadata_value(value: &RXingResultMetadataValue) -> Option<MetadataValue> {
    use RXingResultMetadataValue as V;
    let value = match value {
        V::Orientation(n) => MetadataValue::Int(*n as i64),
        V::IssueNumber(n) => MetadataValue::Int(*n as i64),
        V::StructuredAppendSequence(n) => MetadataValue::Int(*n as i64),
        V::StructuredAppendParity(n) => MetadataValue::Int(*n as i64),
        V::ErrorCorrectionLevel(s)
        | V::SuggestedPrice(s)
        | V::PossibleCountry(s)
        | V::UpcEanExtension(s)
        | V::SymbologyIdentifier(s)
        | V::OTHER(s) => MetadataValue::Text(s.clone()),
        V::ByteSegments(segments) => MetadataValue::Bytes(segments.concat()),
        _ => return None,
    };
    Some(value)
}

#[cfg(test)]
mod tests {
    use rxing::{MultiFormatWriter, Writer};

    use super::*;

    fn hints(formats: &[BarcodeSymbology]) -> DecodeHints {
        DecodeHints {
            formats: formats.iter().copied().collect(),
            try_harder: true,
            pure_barcode: false,
            character_set: None,
        }
    }

    #[test]
    fn format_mapping_round_trips() {
        for symbology in BarcodeSymbology::ALL {
            if let Some(format) = to_rxing_format(symbology) {
                assert_eq!(from_rxing_format(&format), Some(symbology));
            }
        }
    }

    #[test]
    fn unsupported_symbologies_are_excluded() {
        let supported = RxingDecoder::new().supported();
        assert!(supported.contains(BarcodeSymbology::QrCode));
        assert!(supported.contains(BarcodeSymbology::Code128));
        assert!(!supported.contains(BarcodeSymbology::Msi));
        assert!(!supported.contains(BarcodeSymbology::PharmaCode));
        assert_eq!(supported.len(), 17);
    }

    #[test]
    fn hint_dictionary_reflects_options() {
        let mut h = hints(&[BarcodeSymbology::QrCode]);
        h.character_set = Some("UTF-8".into());
        let dict = RxingDecoder::hint_dictionary(&h);
        assert!(dict.contains_key(&DecodeHintType::POSSIBLE_FORMATS));
        assert!(dict.contains_key(&DecodeHintType::TRY_HARDER));
        assert!(dict.contains_key(&DecodeHintType::CHARACTER_SET));
        assert!(!dict.contains_key(&DecodeHintType::PURE_BARCODE));
    }

    #[test]
    fn blank_frame_yields_nothing() {
        let map = LuminanceMap::new(vec![255; 64 * 64], 64, 64);
        let mut decoder = RxingDecoder::new();
        assert_eq!(
            decoder.decode(&map, &hints(&[BarcodeSymbology::QrCode])),
            Ok(None)
        );
    }

    #[test]
    fn metadata_values_keep_their_type() {
        assert_eq!(
            metadata_value(&RXingResultMetadataValue::Orientation(90)),
            Some(MetadataValue::Int(90))
        );
        assert_eq!(
            metadata_value(&RXingResultMetadataValue::ErrorCorrectionLevel("M".into())),
            Some(MetadataValue::Text("M".into()))
        );
        assert_eq!(
            metadata_value(&RXingResultMetadataValue::ByteSegments(vec![vec![1, 2], vec![3]])),
            Some(MetadataValue::Bytes(vec![1, 2, 3]))
        );
    }

    /// Render `contents` with rxing's writer: dark modules become 0, the rest 255.
    fn render(contents: &str, format: BarcodeFormat, width: i32, height: i32) -> LuminanceMap {
        let matrix = MultiFormatWriter::default()
            .encode(contents, &format, width, height)
            .unwrap();
        let (w, h) = (matrix.getWidth(), matrix.getHeight());
        let mut data = Vec::with_capacity((w * h) as usize);
        for y in 0..h {
            for x in 0..w {
                data.push(if matrix.get(x, y) { 0 } else { 255 });
            }
        }
        LuminanceMap::new(data, w, h)
    }

    /// Place two maps side by side on a white canvas with a gap between them.
    fn side_by_side(left: &LuminanceMap, right: &LuminanceMap) -> LuminanceMap {
        let gap = 40;
        let width = left.width() + gap + right.width();
        let height = left.height().max(right.height());
        let mut data = vec![255u8; (width * height) as usize];
        for (map, x0) in [(left, 0), (right, left.width() + gap)] {
            for y in 0..map.height() {
                for x in 0..map.width() {
                    data[(y * width + x0 + x) as usize] = map.get(x, y).unwrap_or(255);
                }
            }
        }
        LuminanceMap::new(data, width, height)
    }

    #[test]
    fn rendered_qr_code_is_decoded() {
        let map = render("https://example.org/camscan", BarcodeFormat::QR_CODE, 200, 200);
        let mut decoder = RxingDecoder::new();

        let symbol = decoder
            .decode(&map, &hints(&[BarcodeSymbology::QrCode]))
            .unwrap()
            .expect("qr code not found");
        assert_eq!(symbol.text.as_deref(), Some("https://example.org/camscan"));
        assert_eq!(symbol.format, BarcodeSymbology::QrCode);
        assert!(symbol.raw_bytes.is_some());
        assert!(symbol.corner_points.len() >= 3);
        assert!(matches!(
            symbol.metadata.get("ERROR_CORRECTION_LEVEL"),
            Some(MetadataValue::Text(_))
        ));
    }

    #[test]
    fn rendered_code_128_is_decoded() {
        let map = render("CAMSCAN-128", BarcodeFormat::CODE_128, 300, 80);
        let mut decoder = RxingDecoder::new();

        let symbol = decoder
            .decode(&map, &hints(&[BarcodeSymbology::Code128]))
            .unwrap()
            .expect("code 128 not found");
        assert_eq!(symbol.text.as_deref(), Some("CAMSCAN-128"));
        assert_eq!(symbol.format, BarcodeSymbology::Code128);
        assert!(!symbol.corner_points.is_empty());
    }

    #[test]
    fn two_codes_in_one_frame_are_both_decoded() {
        let left = render("LEFT", BarcodeFormat::QR_CODE, 160, 160);
        let right = render("RIGHT", BarcodeFormat::QR_CODE, 160, 160);
        let map = side_by_side(&left, &right);
        let mut decoder = RxingDecoder::new();

        let found = decoder
            .decode_multiple(&map, &hints(&[BarcodeSymbology::QrCode]))
            .unwrap();
        let mut texts: Vec<_> = found.iter().filter_map(|s| s.text.as_deref()).collect();
        texts.sort_unstable();
        assert_eq!(texts, vec!["LEFT", "RIGHT"]);
        assert!(found.iter().all(|s| s.format == BarcodeSymbology::QrCode));
    }
}
