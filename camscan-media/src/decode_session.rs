//! Decode sessions: configured invocations of an external symbol decoder.
//!
//! `DecodeSession` owns a [`SymbolDecoder`] and an immutable [`DecodeOptions`]
//! value. Configuration translates the options into decoder-facing
//! [`DecodeHints`] and fails fast on symbologies the decoder cannot report.
//! Decoding runs the plain pass, then the inverted and rotated passes the
//! options ask for, and contains every decoder failure (including panics).

use std::panic::{self, AssertUnwindSafe};

use camscan_symbols::{
    DecodeOptions, DecodedSymbol, MetadataValue, Point, SymbologySet, METADATA_ORIENTATION,
};

use crate::error::{ConfigError, DecodeError};
use crate::luminance::LuminanceMap;

/// Options translated into the form a symbol decoder consumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeHints {
    /// Allowed symbologies; never empty.
    pub formats: SymbologySet,
    pub try_harder: bool,
    pub pure_barcode: bool,
    pub character_set: Option<String>,
}

impl DecodeHints {
    fn from_options(options: &DecodeOptions) -> Self {
        Self {
            formats: options.effective_formats(),
            try_harder: options.try_harder,
            pure_barcode: options.pure_barcode,
            character_set: options.character_set.clone(),
        }
    }
}

/// An external barcode symbol decoder.
///
/// Implementations locate and decode symbols in a luminance map. Finding
/// nothing is `Ok` with no symbols, not an error.
pub trait SymbolDecoder: Send + 'static {
    /// Symbologies the decoder can be restricted to.
    fn supported(&self) -> SymbologySet;

    /// Decode the first symbol found.
    fn decode(
        &mut self,
        map: &LuminanceMap,
        hints: &DecodeHints,
    ) -> Result<Option<DecodedSymbol>, DecodeError>;

    /// Decode every disjoint symbol in the map.
    ///
    /// The default falls back to a single-symbol decode.
    fn decode_multiple(
        &mut self,
        map: &LuminanceMap,
        hints: &DecodeHints,
    ) -> Result<Vec<DecodedSymbol>, DecodeError> {
        Ok(self.decode(map, hints)?.into_iter().collect())
    }
}

/// A symbol decoder bound to a validated set of options.
pub struct DecodeSession {
    decoder: Box<dyn SymbolDecoder>,
    options: DecodeOptions,
    hints: DecodeHints,
}

impl DecodeSession {
    /// Create a session with the given options.
    pub fn new(decoder: Box<dyn SymbolDecoder>, options: DecodeOptions) -> Result<Self, ConfigError> {
        let hints = validate(decoder.as_ref(), &options)?;
        Ok(Self {
            decoder,
            options,
            hints,
        })
    }

    /// Replace the session options wholesale.
    ///
    /// On error the previous options stay in force.
    pub fn configure(&mut self, options: DecodeOptions) -> Result<(), ConfigError> {
        self.hints = validate(self.decoder.as_ref(), &options)?;
        self.options = options;
        tracing::debug!(formats = %self.hints.formats, "decode session configured");
        Ok(())
    }

    pub fn options(&self) -> &DecodeOptions {
        &self.options
    }

    pub fn hints(&self) -> &DecodeHints {
        &self.hints
    }

    /// Decode a map, treating any decoder failure as "no symbols".
    pub fn decode(&mut self, map: &LuminanceMap) -> Vec<DecodedSymbol> {
        match self.try_decode(map) {
            Ok(symbols) => symbols,
            Err(e) => {
                tracing::warn!(error = %e, "decode attempt failed, treating as no result");
                Vec::new()
            }
        }
    }

    /// Decode a map, reporting decoder failures.
    ///
    /// Runs the upright pass first, then an inverted pass if `try_inverted`
    /// is set, then the three remaining rotations if `auto_rotate` is set.
    /// A pass that fails counts as finding nothing and the next pass still
    /// runs; the last error is returned only when every pass failed.
    /// Points found on a rotated pass are mapped back to the original frame.
    pub fn try_decode(&mut self, map: &LuminanceMap) -> Result<Vec<DecodedSymbol>, DecodeError> {
        let mut passes = PassLog::default();

        let found = passes.record("upright", self.run_pass(map));
        if !found.is_empty() {
            return Ok(found);
        }

        if self.options.try_inverted {
            let found = passes.record("inverted", self.run_pass(&map.inverted()));
            if !found.is_empty() {
                tracing::trace!("symbols found on inverted pass");
                return Ok(found);
            }
        }

        if self.options.auto_rotate {
            let mut rotated = map.clone();
            for quarter_turns in 1..=3u32 {
                rotated = rotated.rotated_counter_clockwise();
                let mut found = passes.record("rotated", self.run_pass(&rotated));
                if !found.is_empty() {
                    tracing::trace!(quarter_turns, "symbols found on rotated pass");
                    for symbol in &mut found {
                        restore_orientation(symbol, map.width(), map.height(), quarter_turns);
                    }
                    return Ok(found);
                }
            }
        }

        passes.finish()
    }

    /// One decoder invocation with panics contained and formats enforced.
    fn run_pass(&mut self, map: &LuminanceMap) -> Result<Vec<DecodedSymbol>, DecodeError> {
        let multiple = self.options.read_multiple_codes;
        let hints = &self.hints;
        let decoder = &mut self.decoder;

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            if multiple {
                decoder.decode_multiple(map, hints)
            } else {
                decoder.decode(map, hints).map(|s| s.into_iter().collect())
            }
        }));

        let mut symbols = match outcome {
            Ok(result) => result?,
            Err(payload) => return Err(DecodeError::Panicked(panic_message(payload.as_ref()))),
        };

        symbols.retain(|s| {
            let allowed = hints.formats.contains(s.format);
            if !allowed {
                tracing::trace!(format = %s.format, "dropping symbol outside the allowed formats");
            }
            allowed
        });
        Ok(symbols)
    }
}

/// Outcome of the passes run for one frame.
#[derive(Default)]
struct PassLog {
    attempted: usize,
    failed: usize,
    last_error: Option<DecodeError>,
}

impl PassLog {
    /// Record one pass; a failed pass yields no symbols.
    fn record(
        &mut self,
        pass: &'static str,
        result: Result<Vec<DecodedSymbol>, DecodeError>,
    ) -> Vec<DecodedSymbol> {
        self.attempted += 1;
        match result {
            Ok(symbols) => symbols,
            Err(e) => {
                tracing::debug!(pass, error = %e, "decode pass failed");
                self.failed += 1;
                self.last_error = Some(e);
                Vec::new()
            }
        }
    }

    /// Nothing was found: report the last error if no pass succeeded.
    fn finish(self) -> Result<Vec<DecodedSymbol>, DecodeError> {
        match self.last_error {
            Some(e) if self.failed == self.attempted => Err(e),
            _ => Ok(Vec::new()),
        }
    }
}

fn validate(decoder: &dyn SymbolDecoder, options: &DecodeOptions) -> Result<DecodeHints, ConfigError> {
    if options.possible_formats.is_empty() {
        tracing::debug!(
            default = %camscan_symbols::DEFAULT_SYMBOLOGY,
            "no formats configured, using default symbology"
        );
    }
    let hints = DecodeHints::from_options(options);
    if let Some(unsupported) = hints.formats.difference(decoder.supported()).iter().next() {
        return Err(ConfigError::UnsupportedSymbology(unsupported));
    }
    Ok(hints)
}

/// Map points found in a map rotated `quarter_turns` times counter-clockwise
/// back into the original `width x height` frame and record the orientation.
fn restore_orientation(symbol: &mut DecodedSymbol, width: u32, height: u32, quarter_turns: u32) {
    let w = width as f32;
    let h = height as f32;
    for p in &mut symbol.corner_points {
        *p = match quarter_turns % 4 {
            1 => Point::new(w - p.y, p.x),
            2 => Point::new(w - p.x, h - p.y),
            3 => Point::new(p.y, h - p.x),
            _ => *p,
        };
    }
    symbol.metadata.insert(
        METADATA_ORIENTATION.to_string(),
        MetadataValue::Int(i64::from(quarter_turns * 90)),
    );
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
