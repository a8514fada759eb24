use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters describing engine activity, updated lock-free from ingestion and
/// maintenance paths. Pure data; exporting to a metrics backend is the
/// caller's concern.
#[derive(Debug, Default)]
pub struct DedupTelemetry {
    records_observed: AtomicU64,
    records_forwarded: AtomicU64,
    duplicates_dropped: AtomicU64,
    parse_failures: AtomicU64,
    gaps_opened: AtomicU64,
    gaps_resolved_consensus: AtomicU64,
    gaps_resolved_timeout: AtomicU64,
    sequences_discarded: AtomicU64,
    forward_latency_count: AtomicU64,
    forward_latency_sum_ms: AtomicU64,
    forward_latency_max_ms: AtomicU64,
}

impl DedupTelemetry {
    /// Creates zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_observed(&self) {
        self.records_observed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_forwarded(&self) {
        self.records_forwarded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn duplicates_dropped(&self, count: u64) {
        if count > 0 {
            self.duplicates_dropped.fetch_add(count, Ordering::Relaxed);
        }
    }

    pub(crate) fn parse_failure(&self) {
        self.parse_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn gap_opened(&self) {
        self.gaps_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn gap_resolved_consensus(&self) {
        self.gaps_resolved_consensus.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn gap_resolved_timeout(&self) {
        self.gaps_resolved_timeout.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn sequences_discarded(&self, count: u64) {
        if count > 0 {
            self.sequences_discarded.fetch_add(count, Ordering::Relaxed);
        }
    }

    /// Records latency from capture to forward, measured when the record
    /// carries a capture timestamp.
    pub(crate) fn forward_latency(&self, latency_ms: u64) {
        self.forward_latency_count.fetch_add(1, Ordering::Relaxed);
        self.forward_latency_sum_ms
            .fetch_add(latency_ms, Ordering::Relaxed);
        self.forward_latency_max_ms
            .fetch_max(latency_ms, Ordering::Relaxed);
    }

    /// Consistent-enough point-in-time view for observers.
    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            records_observed: self.records_observed.load(Ordering::Relaxed),
            records_forwarded: self.records_forwarded.load(Ordering::Relaxed),
            duplicates_dropped: self.duplicates_dropped.load(Ordering::Relaxed),
            parse_failures: self.parse_failures.load(Ordering::Relaxed),
            gaps_opened: self.gaps_opened.load(Ordering::Relaxed),
            gaps_resolved_consensus: self.gaps_resolved_consensus.load(Ordering::Relaxed),
            gaps_resolved_timeout: self.gaps_resolved_timeout.load(Ordering::Relaxed),
            sequences_discarded: self.sequences_discarded.load(Ordering::Relaxed),
            forward_latency_count: self.forward_latency_count.load(Ordering::Relaxed),
            forward_latency_sum_ms: self.forward_latency_sum_ms.load(Ordering::Relaxed),
            forward_latency_max_ms: self.forward_latency_max_ms.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time counter values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TelemetrySnapshot {
    pub records_observed: u64,
    pub records_forwarded: u64,
    pub duplicates_dropped: u64,
    pub parse_failures: u64,
    pub gaps_opened: u64,
    pub gaps_resolved_consensus: u64,
    pub gaps_resolved_timeout: u64,
    pub sequences_discarded: u64,
    pub forward_latency_count: u64,
    pub forward_latency_sum_ms: u64,
    pub forward_latency_max_ms: u64,
}

impl TelemetrySnapshot {
    /// Mean capture-to-forward latency, when any was recorded.
    pub fn forward_latency_mean_ms(&self) -> Option<u64> {
        if self.forward_latency_count == 0 {
            return None;
        }
        Some(self.forward_latency_sum_ms / self.forward_latency_count)
    }
}
