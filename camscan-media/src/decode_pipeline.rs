//! Frame-to-decode pipeline: submit → throttle → convert → decode → stabilize → emit.
//!
//! `DecodePipeline` receives frames from the capture layer, decides which ones
//! to decode, and runs conversion and decoding on tokio's blocking pool so the
//! delivery thread never waits on a decoder. At most one decode is in flight;
//! frames that become eligible while it runs are dropped, not queued.
//! Detections are delivered on an unbounded channel from the worker.
//!
//! State per capture session: `Idle` (stopped or detection disabled),
//! `Armed` (waiting for an eligible frame), `Decoding` (a decode in flight).

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Context, Result};
use camscan_symbols::{DecodeOptions, DecodedSymbol};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, Notify};

use crate::decode_session::{DecodeSession, SymbolDecoder};
use crate::error::{ConfigError, DecodeError, FrameError};
use crate::stabilizer::ResultStabilizer;
use crate::throttle::{FrameThrottle, ThrottleConfig};
use crate::video_types::RawFrame;

/// Configuration for the decode pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub options: DecodeOptions,
    pub throttle: ThrottleConfig,
    /// Suppress emissions that repeat the previous result set.
    pub control_duplicates: bool,
    /// Start with detection enabled.
    pub detection_enabled: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            options: DecodeOptions::default(),
            throttle: ThrottleConfig::default(),
            control_duplicates: true,
            detection_enabled: true,
        }
    }
}

/// Externally visible pipeline state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Armed,
    Decoding,
}

/// Event raised when a decode produced a result set worth emitting.
#[derive(Debug, Clone)]
pub struct BarcodeDetected {
    /// Sequence number of the source frame (1-based submission order).
    pub frame_id: u64,
    /// Never empty.
    pub symbols: Vec<DecodedSymbol>,
}

/// Per-frame failures, reported only to diagnostics subscribers.
#[derive(Debug, Clone)]
pub enum PipelineDiagnostic {
    FormatError { frame_id: u64, error: FrameError },
    DecodeFailure { frame_id: u64, error: DecodeError },
}

/// Metrics exposed for observability and test assertions.
#[derive(Debug, Default)]
pub struct DecodePipelineMetrics {
    pub frames_submitted: AtomicU64,
    /// Frames skipped because the throttle interval was not reached.
    pub frames_throttled: AtomicU64,
    /// Eligible frames dropped because a decode was in flight.
    pub frames_dropped_busy: AtomicU64,
    pub decodes_started: AtomicU64,
    pub decodes_completed: AtomicU64,
    pub decode_failures: AtomicU64,
    pub format_errors: AtomicU64,
    pub detections_emitted: AtomicU64,
    pub duplicates_suppressed: AtomicU64,
    /// Completed decodes whose result was discarded after disable/stop.
    pub results_discarded: AtomicU64,
}

/// State shared between the submitting side and decode workers.
struct Shared {
    session: Mutex<DecodeSession>,
    stabilizer: Mutex<ResultStabilizer>,
    throttle: Mutex<FrameThrottle>,
    running: AtomicBool,
    detection_enabled: AtomicBool,
    in_flight: AtomicBool,
    /// Bumped whenever detection is disabled or the pipeline stops; results of
    /// decodes dispatched under an older generation are discarded.
    generation: AtomicU64,
    events_tx: mpsc::UnboundedSender<BarcodeDetected>,
    diagnostics_tx: Mutex<Option<mpsc::UnboundedSender<PipelineDiagnostic>>>,
    metrics: DecodePipelineMetrics,
    idle: Notify,
}

/// A decode admitted for dispatch.
#[derive(Debug, Clone, Copy)]
struct Ticket {
    frame_id: u64,
    generation: u64,
}

/// Frame-to-decode pipeline for one capture session.
pub struct DecodePipeline {
    shared: Arc<Shared>,
    runtime: Handle,
}

impl DecodePipeline {
    /// Create a pipeline and the receiver of its detection events.
    ///
    /// Must be called from within a tokio runtime. Fails if the initial
    /// options name a symbology the decoder does not support.
    pub fn new<D: SymbolDecoder>(
        decoder: D,
        config: PipelineConfig,
    ) -> Result<(Self, mpsc::UnboundedReceiver<BarcodeDetected>)> {
        let runtime = Handle::try_current().context("decode pipeline requires a tokio runtime")?;
        let session = DecodeSession::new(Box::new(decoder), config.options)
            .context("invalid initial decode options")?;
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        tracing::info!(
            formats = %session.hints().formats,
            frame_rate = config.throttle.frame_rate,
            min_interval = config.throttle.min_interval,
            control_duplicates = config.control_duplicates,
            detection_enabled = config.detection_enabled,
            "decode pipeline created"
        );

        let shared = Arc::new(Shared {
            session: Mutex::new(session),
            stabilizer: Mutex::new(ResultStabilizer::new(config.control_duplicates)),
            throttle: Mutex::new(FrameThrottle::new(config.throttle)),
            running: AtomicBool::new(true),
            detection_enabled: AtomicBool::new(config.detection_enabled),
            in_flight: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            events_tx,
            diagnostics_tx: Mutex::new(None),
            metrics: DecodePipelineMetrics::default(),
            idle: Notify::new(),
        });

        Ok((Self { shared, runtime }, events_rx))
    }

    /// Offer a frame borrowed from the capture callback.
    ///
    /// Returns quickly on the calling thread. If the frame is dispatched, it is
    /// copied before returning, so the caller may reuse the buffer immediately.
    /// Returns whether a decode was dispatched.
    pub fn submit_frame(&self, frame: &RawFrame) -> bool {
        match self.admit() {
            Some(ticket) => {
                self.dispatch(frame.clone(), ticket);
                true
            }
            None => false,
        }
    }

    /// Offer a frame the caller no longer needs; avoids the copy.
    pub fn submit_owned_frame(&self, frame: RawFrame) -> bool {
        match self.admit() {
            Some(ticket) => {
                self.dispatch(frame, ticket);
                true
            }
            None => false,
        }
    }

    /// Replace the decode options. Fails fast on unsupported symbologies,
    /// leaving the previous options in force.
    pub fn set_decode_options(&self, options: DecodeOptions) -> Result<(), ConfigError> {
        let result = lock(&self.shared.session).configure(options);
        match &result {
            Ok(()) => tracing::info!("decode options updated"),
            Err(e) => tracing::warn!(error = %e, "rejected decode options"),
        }
        result
    }

    /// Enable or disable detection. Disabling discards the result of any
    /// decode still in flight.
    pub fn set_detection_enabled(&self, enabled: bool) {
        let _stabilizer = lock(&self.shared.stabilizer);
        let was = self.shared.detection_enabled.swap(enabled, Ordering::SeqCst);
        if was == enabled {
            return;
        }
        if enabled {
            lock(&self.shared.throttle).reset();
        } else {
            self.shared.generation.fetch_add(1, Ordering::SeqCst);
        }
        tracing::debug!(enabled, "detection state changed");
    }

    pub fn is_detection_enabled(&self) -> bool {
        self.shared.detection_enabled.load(Ordering::SeqCst)
    }

    /// Change the "decode every N frames" rate. Zero or negative stops decoding.
    pub fn set_frame_rate(&self, frame_rate: i32) {
        lock(&self.shared.throttle).set_rate(frame_rate);
        tracing::debug!(frame_rate, "decode frame rate changed");
    }

    /// Change the minimum decode interval (safety cap). 1 disables the cap.
    pub fn set_min_interval(&self, min_interval: u32) {
        lock(&self.shared.throttle).set_min_interval(min_interval);
        tracing::debug!(min_interval, "decode interval cap changed");
    }

    pub fn set_control_duplicates(&self, control_duplicates: bool) {
        lock(&self.shared.stabilizer).set_control_duplicates(control_duplicates);
    }

    /// Forget the last emitted result set.
    pub fn clear_results(&self) {
        lock(&self.shared.stabilizer).clear();
        tracing::debug!("results cleared");
    }

    /// The last emitted result set.
    pub fn results(&self) -> Vec<DecodedSymbol> {
        lock(&self.shared.stabilizer).previous().to_vec()
    }

    /// Stop processing frames. An in-flight decode finishes but emits nothing.
    pub fn stop(&self) {
        let _stabilizer = lock(&self.shared.stabilizer);
        if self.shared.running.swap(false, Ordering::SeqCst) {
            self.shared.generation.fetch_add(1, Ordering::SeqCst);
            tracing::info!("decode pipeline stopped");
        }
    }

    /// Resume processing after [`stop`](Self::stop).
    pub fn start(&self) {
        let _stabilizer = lock(&self.shared.stabilizer);
        if !self.shared.running.swap(true, Ordering::SeqCst) {
            lock(&self.shared.throttle).reset();
            tracing::info!("decode pipeline started");
        }
    }

    pub fn state(&self) -> PipelineState {
        if !self.shared.is_active() {
            PipelineState::Idle
        } else if self.shared.in_flight.load(Ordering::SeqCst) {
            PipelineState::Decoding
        } else {
            PipelineState::Armed
        }
    }

    /// Subscribe to per-frame failure diagnostics. Replaces any earlier subscriber.
    pub fn subscribe_diagnostics(&self) -> mpsc::UnboundedReceiver<PipelineDiagnostic> {
        let (tx, rx) = mpsc::unbounded_channel();
        *lock(&self.shared.diagnostics_tx) = Some(tx);
        rx
    }

    /// Get the pipeline metrics.
    pub fn metrics(&self) -> &DecodePipelineMetrics {
        &self.shared.metrics
    }

    /// Wait until no decode is in flight.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.shared.idle.notified();
            if !self.shared.in_flight.load(Ordering::SeqCst) {
                return;
            }
            notified.await;
        }
    }

    /// Decide on the delivery thread whether this frame gets decoded.
    fn admit(&self) -> Option<Ticket> {
        let shared = &self.shared;
        let frame_id = shared.metrics.frames_submitted.fetch_add(1, Ordering::Relaxed) + 1;

        if !shared.is_active() {
            return None;
        }

        let mut throttle = lock(&shared.throttle);
        if !throttle.tick() {
            shared.metrics.frames_throttled.fetch_add(1, Ordering::Relaxed);
            return None;
        }
        if shared
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            shared.metrics.frames_dropped_busy.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(frame_id, "decode in flight, dropping frame");
            return None;
        }
        throttle.reset();
        drop(throttle);

        shared.metrics.decodes_started.fetch_add(1, Ordering::Relaxed);
        Some(Ticket {
            frame_id,
            generation: shared.generation.load(Ordering::SeqCst),
        })
    }

    fn dispatch(&self, frame: RawFrame, ticket: Ticket) {
        tracing::trace!(
            frame_id = ticket.frame_id,
            width = frame.width,
            height = frame.height,
            format = %frame.format,
            "dispatching decode"
        );
        // Taken before spawning so the flag clears even if the task never runs.
        let in_flight = InFlightGuard(Arc::clone(&self.shared));
        self.runtime
            .spawn_blocking(move || in_flight.0.process(frame, ticket));
    }
}

impl Drop for DecodePipeline {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Shared {
    fn is_active(&self) -> bool {
        self.running.load(Ordering::SeqCst) && self.detection_enabled.load(Ordering::SeqCst)
    }

    /// Worker body: convert, decode, stabilize, emit.
    fn process(&self, frame: RawFrame, ticket: Ticket) {
        let frame_id = ticket.frame_id;

        let map = match frame.to_luminance() {
            Ok(map) => map,
            Err(error) => {
                self.metrics.format_errors.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(frame_id, error = %error, "frame conversion failed");
                self.diagnose(PipelineDiagnostic::FormatError { frame_id, error });
                return;
            }
        };
        drop(frame);

        let result = lock(&self.session).try_decode(&map);
        self.metrics.decodes_completed.fetch_add(1, Ordering::Relaxed);

        let symbols = match result {
            Ok(symbols) => symbols,
            Err(error) => {
                self.metrics.decode_failures.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(frame_id, error = %error, "decode failed");
                self.diagnose(PipelineDiagnostic::DecodeFailure { frame_id, error });
                return;
            }
        };
        if symbols.is_empty() {
            tracing::trace!(frame_id, "no symbols found");
            return;
        }

        // Generation check and emission happen under the stabilizer lock, which
        // disable/stop also take, so nothing is emitted after they return.
        let mut stabilizer = lock(&self.stabilizer);
        if !self.is_active() || self.generation.load(Ordering::SeqCst) != ticket.generation {
            self.metrics.results_discarded.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(frame_id, "detection disabled during decode, discarding result");
            return;
        }
        let Some(symbols) = stabilizer.offer(symbols) else {
            self.metrics.duplicates_suppressed.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(frame_id, "duplicate result suppressed");
            return;
        };

        tracing::debug!(
            frame_id,
            count = symbols.len(),
            first = symbols[0].text.as_deref().unwrap_or(""),
            "barcode detected"
        );
        self.metrics.detections_emitted.fetch_add(1, Ordering::Relaxed);
        if self
            .events_tx
            .send(BarcodeDetected { frame_id, symbols })
            .is_err()
        {
            tracing::debug!("detection receiver dropped");
        }
    }

    fn diagnose(&self, diagnostic: PipelineDiagnostic) {
        let mut tx = lock(&self.diagnostics_tx);
        if let Some(sender) = tx.as_ref() {
            if sender.send(diagnostic).is_err() {
                *tx = None;
            }
        }
    }
}

/// Clears the in-flight flag when a worker finishes, however it exits,
/// or when its task is dropped without running.
struct InFlightGuard(Arc<Shared>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.in_flight.store(false, Ordering::SeqCst);
        self.0.idle.notify_waiters();
    }
}

/// Lock a mutex, recovering the data if a previous holder panicked.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
