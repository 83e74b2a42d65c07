//! Decode loop statistics

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crossbeam::utils::CachePadded;
use ringbuf::traits::{Consumer, Observer, RingBuffer};
use ringbuf::HeapRb;

/// Rolling window of decode durations, owned by the decode thread
pub struct DecodeTimings {
    window: HeapRb<u64>,
}

impl DecodeTimings {
    pub fn new(capacity: usize) -> Self {
        Self {
            window: HeapRb::new(capacity.max(1)),
        }
    }

    /// Records a duration in microseconds, evicting the oldest when full.
    pub fn push(&mut self, us: u64) {
        self.window.push_overwrite(us);
    }

    pub fn len(&self) -> usize {
        self.window.occupied_len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    pub fn average_us(&self) -> f64 {
        let len = self.window.occupied_len();
        if len == 0 {
            return 0.0;
        }
        self.window.iter().sum::<u64>() as f64 / len as f64
    }
}

#[derive(Default)]
struct Counters {
    submitted: AtomicU64,
    decoded: AtomicU64,
    dropped: AtomicU64,
    failed: AtomicU64,
    busy_ns: AtomicU64,
    loop_ns: AtomicU64,
    avg_decode_us_bits: AtomicU64,
}

/// Counters shared between the processor handle and its decode thread
#[derive(Default)]
pub struct ProcessorStats {
    counters: CachePadded<Counters>,
}

/// Point-in-time copy of [`ProcessorStats`]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StatsSnapshot {
    pub submitted: u64,
    pub decoded: u64,
    /// Compressed frames replaced before the decode thread claimed them
    pub dropped: u64,
    pub failed: u64,
    pub avg_decode_us: f64,
    /// Share of loop time spent decoding
    pub busy_ratio: f64,
}

impl ProcessorStats {
    pub(crate) fn record_submitted(&self, evicted: usize) {
        self.counters.submitted.fetch_add(1, Ordering::Relaxed);
        if evicted > 0 {
            self.counters
                .dropped
                .fetch_add(evicted as u64, Ordering::Relaxed);
            metrics::counter!("kvid_dropped_frames").increment(evicted as u64);
        }
    }

    pub(crate) fn record_decoded(&self, timings: &mut DecodeTimings, us: u64) {
        timings.push(us);
        self.counters.decoded.fetch_add(1, Ordering::Relaxed);
        self.counters
            .avg_decode_us_bits
            .store(timings.average_us().to_bits(), Ordering::Relaxed);
        metrics::histogram!("kvid_decode_time_us").record(us as f64);
    }

    pub(crate) fn record_failed(&self) {
        self.counters.failed.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("kvid_decode_failures").increment(1);
    }

    pub(crate) fn record_loop(&self, busy: Duration, total: Duration) {
        self.counters
            .busy_ns
            .fetch_add(busy.as_nanos() as u64, Ordering::Relaxed);
        self.counters
            .loop_ns
            .fetch_add(total.as_nanos() as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let c = &self.counters;
        let busy = c.busy_ns.load(Ordering::Relaxed);
        let total = c.loop_ns.load(Ordering::Relaxed);
        StatsSnapshot {
            submitted: c.submitted.load(Ordering::Relaxed),
            decoded: c.decoded.load(Ordering::Relaxed),
            dropped: c.dropped.load(Ordering::Relaxed),
            failed: c.failed.load(Ordering::Relaxed),
            avg_decode_us: f64::from_bits(c.avg_decode_us_bits.load(Ordering::Relaxed)),
            busy_ratio: if total == 0 {
                0.0
            } else {
                busy as f64 / total as f64
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rolling_average() {
        let mut timings = DecodeTimings::new(3);
        assert_eq!(timings.average_us(), 0.0);
        for us in [10, 20, 30, 100] {
            timings.push(us);
        }
        assert_eq!(timings.len(), 3);
        assert_eq!(timings.average_us(), 50.0);
    }

    #[test]
    fn test_snapshot() {
        let stats = ProcessorStats::default();
        let mut timings = DecodeTimings::new(4);
        stats.record_submitted(0);
        stats.record_submitted(1);
        stats.record_decoded(&mut timings, 40);
        stats.record_failed();
        stats.record_loop(Duration::from_millis(1), Duration::from_millis(4));

        let s = stats.snapshot();
        assert_eq!((s.submitted, s.decoded, s.dropped, s.failed), (2, 1, 1, 1));
        assert_eq!(s.avg_decode_us, 40.0);
        assert_eq!(s.busy_ratio, 0.25);
    }
}
