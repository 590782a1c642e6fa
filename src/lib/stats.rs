//! Lightweight pipeline counters.
//!
//! Counters are updated with relaxed atomics on the hot paths and read as a
//! coherent-enough [`StatsSnapshot`] for the shutdown summary. This is plain
//! bookkeeping, not a metrics subsystem.

use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counters shared by the client paths and the worker.
#[derive(Debug, Default)]
pub struct PipelineStats {
    /// Blocks accepted by the write path.
    blocks_submitted: AtomicU64,
    /// Bytes accepted by the write path (after truncation).
    bytes_submitted: AtomicU64,
    /// Blocks the worker transformed successfully.
    blocks_transformed: AtomicU64,
    /// Bytes the worker transformed successfully.
    bytes_transformed: AtomicU64,
    /// Blocks delivered to readers.
    blocks_delivered: AtomicU64,
    /// Bytes copied out to readers (remainders discarded by short reads
    /// are not counted).
    bytes_delivered: AtomicU64,
    /// Blocks the worker had to drop (output allocation failure).
    transform_failures: AtomicU64,
    /// Highest input queue occupancy observed.
    peak_input_depth: AtomicU64,
    /// Highest output queue occupancy observed.
    peak_output_depth: AtomicU64,
}

impl PipelineStats {
    /// Create a zeroed set of counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_submitted(&self, bytes: u64) {
        self.blocks_submitted.fetch_add(1, Ordering::Relaxed);
        self.bytes_submitted.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn record_transformed(&self, bytes: u64) {
        self.blocks_transformed.fetch_add(1, Ordering::Relaxed);
        self.bytes_transformed.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn record_delivered(&self, bytes: u64) {
        self.blocks_delivered.fetch_add(1, Ordering::Relaxed);
        self.bytes_delivered.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn record_transform_failure(&self) {
        self.transform_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn note_input_depth(&self, depth: usize) {
        update_peak(&self.peak_input_depth, depth as u64);
    }

    pub(crate) fn note_output_depth(&self, depth: usize) {
        update_peak(&self.peak_output_depth, depth as u64);
    }

    /// Read all counters at once.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            blocks_submitted: self.blocks_submitted.load(Ordering::Relaxed),
            bytes_submitted: self.bytes_submitted.load(Ordering::Relaxed),
            blocks_transformed: self.blocks_transformed.load(Ordering::Relaxed),
            bytes_transformed: self.bytes_transformed.load(Ordering::Relaxed),
            blocks_delivered: self.blocks_delivered.load(Ordering::Relaxed),
            bytes_delivered: self.bytes_delivered.load(Ordering::Relaxed),
            transform_failures: self.transform_failures.load(Ordering::Relaxed),
            peak_input_depth: self.peak_input_depth.load(Ordering::Relaxed),
            peak_output_depth: self.peak_output_depth.load(Ordering::Relaxed),
        }
    }
}

/// Raise `peak` to `value` if `value` is higher.
fn update_peak(peak: &AtomicU64, value: u64) {
    let mut current = peak.load(Ordering::Relaxed);
    while value > current {
        match peak.compare_exchange_weak(current, value, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => break,
            Err(actual) => current = actual,
        }
    }
}

/// A point-in-time copy of the pipeline counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub blocks_submitted: u64,
    pub bytes_submitted: u64,
    pub blocks_transformed: u64,
    pub bytes_transformed: u64,
    pub blocks_delivered: u64,
    pub bytes_delivered: u64,
    pub transform_failures: u64,
    pub peak_input_depth: u64,
    pub peak_output_depth: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let stats = PipelineStats::new();
        stats.record_submitted(64);
        stats.record_submitted(32);
        stats.record_transformed(64);
        stats.record_delivered(60);
        stats.record_transform_failure();

        let snap = stats.snapshot();
        assert_eq!(snap.blocks_submitted, 2);
        assert_eq!(snap.bytes_submitted, 96);
        assert_eq!(snap.blocks_transformed, 1);
        assert_eq!(snap.bytes_transformed, 64);
        assert_eq!(snap.blocks_delivered, 1);
        assert_eq!(snap.bytes_delivered, 60);
        assert_eq!(snap.transform_failures, 1);
    }

    #[test]
    fn test_peak_depth_only_rises() {
        let stats = PipelineStats::new();
        stats.note_input_depth(3);
        stats.note_input_depth(1);
        stats.note_input_depth(5);
        stats.note_output_depth(2);

        let snap = stats.snapshot();
        assert_eq!(snap.peak_input_depth, 5);
        assert_eq!(snap.peak_output_depth, 2);
    }
}
