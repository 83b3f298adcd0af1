//! Shared test utilities: tracing setup and an instrumented fake decoder.
//!
//! Available behind the `test-util` feature or in `#[cfg(test)]` within camscan-media.
//!
//! `FnDecoder` stands in for a real symbol decoder. Its behaviour is a closure
//! over the luminance map, and a shared [`DecodeCounters`] records how often and
//! how concurrently it was invoked.

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use camscan_symbols::{DecodedSymbol, SymbologySet};

use crate::decode_session::{DecodeHints, SymbolDecoder};
use crate::error::DecodeError;
use crate::luminance::LuminanceMap;

/// Initialise a tracing subscriber for tests.
///
/// Respects the `RUST_LOG` environment variable, defaults to `debug`.
/// Safe to call multiple times; later calls are no-ops.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "debug".into()),
        )
        .with_test_writer()
        .try_init();
}

/// Invocation counters shared between a [`FnDecoder`] and the test.
#[derive(Debug, Default)]
pub struct DecodeCounters {
    pub single_calls: AtomicUsize,
    pub multiple_calls: AtomicUsize,
    /// Decodes currently running.
    pub active: AtomicUsize,
    /// Highest value `active` ever reached.
    pub max_active: AtomicUsize,
}

impl DecodeCounters {
    /// Total decoder invocations.
    pub fn calls(&self) -> usize {
        self.single_calls.load(Ordering::SeqCst) + self.multiple_calls.load(Ordering::SeqCst)
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    fn enter(&self) {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

type DecodeFn = dyn FnMut(&LuminanceMap, &DecodeHints) -> Result<Vec<DecodedSymbol>, DecodeError> + Send;

/// A decoder whose results come from a closure.
pub struct FnDecoder {
    decode: Box<DecodeFn>,
    supported: SymbologySet,
    delay: Duration,
    counters: Arc<DecodeCounters>,
}

impl FnDecoder {
    /// A decoder supporting every symbology.
    pub fn new<F>(decode: F) -> Self
    where
        F: FnMut(&LuminanceMap, &DecodeHints) -> Result<Vec<DecodedSymbol>, DecodeError>
            + Send
            + 'static,
    {
        Self {
            decode: Box::new(decode),
            supported: SymbologySet::all(),
            delay: Duration::ZERO,
            counters: Arc::new(DecodeCounters::default()),
        }
    }

    /// A decoder returning scripted result sets in order, then nothing.
    pub fn scripted(script: Vec<Vec<DecodedSymbol>>) -> Self {
        let mut script = VecDeque::from(script);
        Self::new(move |_, _| Ok(script.pop_front().unwrap_or_default()))
    }

    /// Restrict the symbologies the decoder claims to support.
    pub fn with_supported(mut self, supported: SymbologySet) -> Self {
        self.supported = supported;
        self
    }

    /// Sleep this long in every decode call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn counters(&self) -> Arc<DecodeCounters> {
        Arc::clone(&self.counters)
    }

    fn run(
        &mut self,
        map: &LuminanceMap,
        hints: &DecodeHints,
    ) -> Result<Vec<DecodedSymbol>, DecodeError> {
        self.counters.enter();
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        let result = panic::catch_unwind(AssertUnwindSafe(|| (self.decode)(map, hints)));
        self.counters.exit();
        match result {
            Ok(result) => result,
            Err(payload) => panic::resume_unwind(payload),
        }
    }
}

impl SymbolDecoder for FnDecoder {
    fn supported(&self) -> SymbologySet {
        self.supported
    }

    fn decode(
        &mut self,
        map: &LuminanceMap,
        hints: &DecodeHints,
    ) -> Result<Option<DecodedSymbol>, DecodeError> {
        self.counters.single_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.run(map, hints)?.into_iter().next())
    }

    fn decode_multiple(
        &mut self,
        map: &LuminanceMap,
        hints: &DecodeHints,
    ) -> Result<Vec<DecodedSymbol>, DecodeError> {
        self.counters.multiple_calls.fetch_add(1, Ordering::SeqCst);
        self.run(map, hints)
    }
}
