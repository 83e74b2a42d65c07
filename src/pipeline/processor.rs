use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use arc_swap::{ArcSwap, ArcSwapOption};
use tracing::{debug, info, warn};

use super::mailbox::Mailbox;
use super::stats::{DecodeTimings, ProcessorStats, StatsSnapshot};
use crate::capture::decoded::DecodedFrame;
use crate::capture::decoder::{DecodeSettings, FrameDecoder};
use crate::capture::frame::CompressedFrame;
use crate::ProcessorConfig;

struct Shared {
    incoming: Mailbox<Arc<CompressedFrame>>,
    current: ArcSwapOption<DecodedFrame>,
    last_compressed: ArcSwapOption<CompressedFrame>,
    settings: ArcSwap<DecodeSettings>,
    running: AtomicBool,
    stats: ProcessorStats,
}

/// Decodes the most recently submitted compressed frame on a background thread.
///
/// Frames submitted while another is pending replace it; the consumer polls
/// [`FrameProcessor::current`] at its own pace.
pub struct FrameProcessor {
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
}

impl Default for FrameProcessor {
    fn default() -> Self {
        Self::new(DecodeSettings::default())
    }
}

impl FrameProcessor {
    pub fn new(settings: DecodeSettings) -> Self {
        Self {
            shared: Arc::new(Shared {
                incoming: Mailbox::new(),
                current: ArcSwapOption::empty(),
                last_compressed: ArcSwapOption::empty(),
                settings: ArcSwap::from_pointee(settings),
                running: AtomicBool::new(false),
                stats: ProcessorStats::default(),
            }),
            handle: None,
        }
    }

    /// Spawns the decode thread. Does nothing if it is already running.
    pub fn start<D: FrameDecoder + 'static>(&mut self, decoder: D, config: &ProcessorConfig) -> io::Result<()> {
        if self.is_running() {
            return Ok(());
        }
        self.join();

        self.shared.running.store(true, Ordering::Release);
        let shared = Arc::clone(&self.shared);
        let idle = Duration::from_millis(config.idle_sleep_ms);
        let window = config.timing_window;
        let core_id = config.core_id;

        let handle = thread::Builder::new()
            .name("kvid-decode".to_string())
            .spawn(move || {
                if let Some(id) = core_id {
                    if !core_affinity::set_for_current(core_affinity::CoreId { id }) {
                        warn!(core = id, "Failed to pin decode thread");
                    }
                }
                decode_loop(&shared, decoder, idle, window);
            });

        match handle {
            Ok(handle) => {
                self.handle = Some(handle);
                info!("Frame processor started");
                Ok(())
            }
            Err(e) => {
                self.shared.running.store(false, Ordering::Release);
                Err(e)
            }
        }
    }

    /// Stops accepting work and waits for an in-flight decode to finish.
    pub fn stop(&mut self) {
        self.shared.running.store(false, Ordering::Release);
        self.join();
    }

    fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Decode thread panicked");
            } else {
                info!("Frame processor stopped");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Queues a compressed frame, replacing any frame not yet claimed.
    pub fn submit(&self, frame: impl Into<Arc<CompressedFrame>>) {
        let evicted = self.shared.incoming.post(frame.into());
        self.shared.stats.record_submitted(evicted);
    }

    /// Publishes an already decoded frame directly.
    pub fn submit_decoded(&self, frame: DecodedFrame) {
        self.shared.current.store(Some(Arc::new(frame)));
    }

    /// Latest decoded frame. Never blocks the decode thread.
    pub fn current(&self) -> Option<Arc<DecodedFrame>> {
        self.shared.current.load_full()
    }

    /// Compressed frame most recently claimed by the decode thread
    pub fn last_compressed(&self) -> Option<Arc<CompressedFrame>> {
        self.shared.last_compressed.load_full()
    }

    pub fn invalidate_frame(&self) {
        self.shared.current.store(None);
    }

    /// Drops the pending compressed frame and forgets the last claimed one.
    pub fn invalidate_compressed(&self) {
        self.shared.incoming.clear();
        self.shared.last_compressed.store(None);
    }

    pub fn update_settings(&self, settings: DecodeSettings) {
        self.shared.settings.store(Arc::new(settings));
    }

    pub fn settings(&self) -> DecodeSettings {
        **self.shared.settings.load()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }
}

impl Drop for FrameProcessor {
    fn drop(&mut self) {
        self.stop();
    }
}

fn decode_loop<D: FrameDecoder>(shared: &Shared, mut decoder: D, idle: Duration, window: usize) {
    let mut timings = DecodeTimings::new(window);
    debug!("Decode loop running");

    while shared.running.load(Ordering::Acquire) {
        let loop_start = Instant::now();
        let mut busy = Duration::ZERO;

        if let Some(frame) = shared.incoming.take() {
            shared.last_compressed.store(Some(Arc::clone(&frame)));
            let settings = shared.settings.load();

            let decode_start = Instant::now();
            match decoder.decode(&settings, &frame) {
                Ok(decoded) => {
                    busy = decode_start.elapsed();
                    shared.current.store(Some(Arc::new(decoded)));
                    shared.stats.record_decoded(&mut timings, busy.as_micros() as u64);
                }
                Err(e) => {
                    busy = decode_start.elapsed();
                    // previous frame stays visible
                    warn!(
                        device = frame.info.device_id,
                        capture = frame.info.capture_id,
                        "Decode failed: {e}"
                    );
                    shared.stats.record_failed();
                }
            }
        }

        thread::sleep(idle);
        shared.stats.record_loop(busy, loop_start.elapsed());
    }

    debug!("Decode loop exited");
}
