use crate::assignment::Assignment;
use crate::clock::{MillisClock, SystemClock};
use crate::config::{ConfigError, DedupConfig};
use crate::partition_state::PartitionState;
use crate::record::{
    CapturedRecord, PartitionId, SourceIndex, HEADER_CAPTURE_TIME, HEADER_SEND_TIME, HEADER_SOURCE,
};
use crate::sender::{OutboundRecord, RecordSender, SendError};
use crate::strategy::{DedupDecision, DedupStrategy, GapEvent};
use crate::telemetry::DedupTelemetry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard};
use tracing::{debug, info, warn};

type PartitionMap = HashMap<PartitionId, Arc<Mutex<PartitionState>>>;

/// Errors surfaced by ingestion and maintenance entrypoints.
///
/// `Display` and `Error` are implemented by hand rather than derived:
/// `SourceOutOfRange::source` is a capture-source index, not an error cause,
/// but thiserror unconditionally treats any field named `source` as the
/// `Error::source`.
#[derive(Debug, PartialEq, Eq)]
pub enum DedupError {
    /// The handler was not started or has been closed.
    NotRunning,
    /// A record arrived with a source index outside the configured range.
    SourceOutOfRange {
        source: SourceIndex,
        source_count: u32,
    },
    /// The downstream sender failed to acquire its resources.
    SenderOpen { source: SendError },
    /// A downstream send failed. Partition state is left unadvanced, so the
    /// caller may retry the same record safely.
    Send {
        partition: PartitionId,
        source: SendError,
    },
}

impl std::fmt::Display for DedupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotRunning => write!(f, "record handler is not running"),
            Self::SourceOutOfRange {
                source,
                source_count,
            } => write!(
                f,
                "source index {source} out of range for {source_count} configured sources"
            ),
            Self::SenderOpen { source } => {
                write!(f, "failed to open downstream sender: {source}")
            }
            Self::Send { partition, source } => {
                write!(f, "downstream send failed for partition {partition}: {source}")
            }
        }
    }
}

impl std::error::Error for DedupError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::SenderOpen { source } | Self::Send { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Reconciles redundant capture streams into one deduplicated, strictly
/// ordered output stream per partition.
///
/// Owns the per-partition state map. Callers drive it with `handle` for each
/// raw record and `check_cache` for gap maintenance; the rebalance
/// collaborator drives `assigned`/`revoked`. All entrypoints take `&self`:
/// partitions are mutually independent and each is guarded by its own mutex,
/// while the map itself sits behind a read/write lock so ownership changes
/// are exclusive with classification for the affected partitions.
pub struct RecordHandler<S, R> {
    config: DedupConfig,
    strategy: S,
    sender: R,
    clock: Arc<dyn MillisClock>,
    partitions: RwLock<PartitionMap>,
    running: AtomicBool,
    telemetry: Arc<DedupTelemetry>,
}

impl<S: DedupStrategy, R: RecordSender> RecordHandler<S, R> {
    /// Creates a handler on the system clock.
    pub fn new(config: DedupConfig, strategy: S, sender: R) -> Result<Self, ConfigError> {
        Self::with_clock(config, strategy, sender, Arc::new(SystemClock))
    }

    /// Creates a handler on an explicit clock (tests drive gap timeouts
    /// deterministically through `ManualClock`).
    pub fn with_clock(
        config: DedupConfig,
        strategy: S,
        sender: R,
        clock: Arc<dyn MillisClock>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            strategy,
            sender,
            clock,
            partitions: RwLock::new(HashMap::new()),
            running: AtomicBool::new(false),
            telemetry: Arc::new(DedupTelemetry::new()),
        })
    }

    /// Engine activity counters.
    pub fn telemetry(&self) -> Arc<DedupTelemetry> {
        Arc::clone(&self.telemetry)
    }

    /// The validated configuration this handler runs on.
    pub fn config(&self) -> &DedupConfig {
        &self.config
    }

    /// Acquires the sender and begins accepting records. Idempotent.
    pub fn start(&self) -> Result<(), DedupError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        if let Err(source) = self.sender.open() {
            self.running.store(false, Ordering::SeqCst);
            return Err(DedupError::SenderOpen { source });
        }
        info!(
            source_count = self.config.source_count,
            gap_timeout_ms = self.config.gap_timeout_ms,
            "record handler started"
        );
        Ok(())
    }

    /// Stops ingestion, waits for in-flight calls, releases the sender, and
    /// drops all partition state. Buffered records are never flushed;
    /// reassignment elsewhere may redeliver them.
    pub fn close(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        // the write lock doubles as the barrier for in-flight calls, which
        // hold the read lock for their full duration
        let mut partitions = self.partitions.write().unwrap();
        for (_, state) in partitions.drain() {
            state.lock().unwrap().close();
        }
        drop(partitions);
        self.sender.close();
        info!("record handler closed");
    }

    /// Applies an ownership snapshot: state is created (and seeded from
    /// resume data) for newly owned partitions, kept untouched for
    /// partitions owned across the reassignment, and dropped for partitions
    /// no longer present.
    pub fn assigned(&self, assignment: &Assignment) {
        let mut partitions = self.partitions.write().unwrap();
        partitions.retain(|&partition, state| {
            let keep = assignment.contains(partition);
            if !keep {
                state.lock().unwrap().close();
                debug!(partition, "partition dropped by reassignment");
            }
            keep
        });
        for &partition in assignment.partitions() {
            partitions.entry(partition).or_insert_with(|| {
                let state = match assignment.resume_sequence(partition) {
                    Some(last_delivered) => {
                        debug!(partition, last_delivered, "partition state seeded from resume data");
                        PartitionState::resumed(assignment.source_count(), last_delivered)
                    }
                    None => PartitionState::new(assignment.source_count()),
                };
                Arc::new(Mutex::new(state))
            });
        }
        info!(owned = partitions.len(), "partition assignment applied");
    }

    /// Drops state for each revoked partition without flushing.
    pub fn revoked(&self, revoked: impl IntoIterator<Item = PartitionId>) {
        let mut partitions = self.partitions.write().unwrap();
        for partition in revoked {
            if let Some(state) = partitions.remove(&partition) {
                state.lock().unwrap().close();
                debug!(partition, "partition state dropped on revoke");
            }
        }
    }

    /// Partitions currently holding state.
    pub fn partition_ids(&self) -> Vec<PartitionId> {
        self.partitions.read().unwrap().keys().copied().collect()
    }

    /// Classifies one raw record from `source` and emits everything it
    /// unlocks.
    ///
    /// A record below the expected sequence is dropped as a duplicate; one
    /// at the expected sequence is forwarded (strategy permitting) and the
    /// buffers are cascaded; one ahead of it is buffered, opening the gap
    /// clock on first sign of a hole. Unparsable sequences drop the record
    /// without stalling the partition.
    pub fn handle(&self, record: CapturedRecord, source: SourceIndex) -> Result<(), DedupError> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(DedupError::NotRunning);
        }
        if source >= self.config.source_count {
            return Err(DedupError::SourceOutOfRange {
                source,
                source_count: self.config.source_count,
            });
        }
        self.telemetry.record_observed();
        let partition = record.partition;
        let sequence = match self.strategy.parse_sequence(&record) {
            Ok(sequence) => sequence,
            Err(err) => {
                self.telemetry.parse_failure();
                warn!(partition, source, %err, "dropping record with unparsable sequence");
                return Ok(());
            }
        };

        let (_map, state) = self.state_for(partition)?;
        let mut state = state.lock().unwrap();

        let expected = match state.expected() {
            Some(expected) => expected,
            None => {
                // first observed record becomes the baseline
                debug!(partition, sequence, "partition baseline initialized");
                state.init_expected(sequence);
                sequence
            }
        };
        if sequence < expected {
            self.telemetry.duplicates_dropped(1);
            debug!(partition, source, sequence, expected, "duplicate dropped");
            return Ok(());
        }
        if sequence > expected
            && self.config.ordered_capture
            && state
                .latest_buffered(source)
                .is_some_and(|latest| latest >= sequence)
        {
            // ordered capture: this source already delivered past this
            // sequence, so the arrival is a replay
            self.telemetry.duplicates_dropped(1);
            return Ok(());
        }
        if !state.buffer(source, sequence, record) {
            if sequence > expected {
                self.telemetry.duplicates_dropped(1);
                debug!(partition, source, sequence, "same-source replay dropped");
                return Ok(());
            }
            // a copy at the expected sequence is already buffered (for
            // example after a failed send); fall through uncounted so the
            // cascade retries it
        }
        self.cascade(partition, &mut state)?;
        self.settle_gap(partition, &mut state, false);
        Ok(())
    }

    /// Explicit gap-maintenance pass for one partition, callable from a
    /// periodic driver or manually, independent of record arrival.
    ///
    /// No-op while no gap is open. Otherwise the consensus fast path fires
    /// when every configured source buffers the same next sequence; failing
    /// that, once the gap timeout elapses the engine advances to the global
    /// minimum buffered sequence and writes the skipped range off as
    /// unrecoverable.
    pub fn check_cache(&self, partition: PartitionId) -> Result<(), DedupError> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(DedupError::NotRunning);
        }
        let partitions = self.partitions.read().unwrap();
        let Some(state) = partitions.get(&partition).map(Arc::clone) else {
            return Ok(());
        };
        let mut state = state.lock().unwrap();
        let Some(opened_at) = state.gap_opened_at() else {
            return Ok(());
        };

        // a held record at the head may have been released since last pass
        self.cascade(partition, &mut state)?;
        self.settle_gap(partition, &mut state, false);
        if state.gap_opened_at().is_none() {
            return Ok(());
        }
        let Some(expected) = state.expected() else {
            return Ok(());
        };

        let votes = state.votes();
        let unanimous = votes.len() == state.source_count() as usize
            && votes.windows(2).all(|pair| pair[0] == pair[1]);
        if unanimous && votes[0] > expected {
            // every surviving source shows the identical hole; waiting
            // cannot help
            let target = votes[0];
            self.telemetry.gap_resolved_consensus();
            info!(partition, from = expected, to = target, "gap resolved by cross-source consensus");
            state.advance_to(target);
            self.cascade(partition, &mut state)?;
            self.settle_gap(partition, &mut state, true);
            return Ok(());
        }

        let now = self.clock.now_ms();
        if now.saturating_sub(opened_at) > self.config.gap_timeout_ms {
            let Some(target) = state.min_pending() else {
                return Ok(());
            };
            if target > expected {
                self.telemetry.gap_resolved_timeout();
                self.telemetry.sequences_discarded(target - expected);
                warn!(
                    partition,
                    from = expected,
                    to = target,
                    skipped = target - expected,
                    "gap timed out; advancing past unrecoverable sequences"
                );
                state.advance_to(target);
                self.cascade(partition, &mut state)?;
                self.settle_gap(partition, &mut state, true);
            }
        }
        Ok(())
    }

    /// Runs `check_cache` across every owned partition.
    pub fn check_all(&self) -> Result<(), DedupError> {
        for partition in self.partition_ids() {
            self.check_cache(partition)?;
        }
        Ok(())
    }

    /// Emits consecutively available buffered records starting at the
    /// expected sequence, dropping mirror copies as each sequence resolves.
    /// Stops on the first hole or on a strategy `Hold`.
    fn cascade(&self, partition: PartitionId, state: &mut PartitionState) -> Result<(), DedupError> {
        loop {
            let Some(expected) = state.expected() else {
                return Ok(());
            };
            let Some((source, record)) = state.record_at(expected) else {
                return Ok(());
            };
            match self.strategy.decide(&record) {
                DedupDecision::Hold => return Ok(()),
                DedupDecision::Drop => {
                    let removed = state.advance_past(expected);
                    self.telemetry.duplicates_dropped(removed.saturating_sub(1) as u64);
                }
                DedupDecision::Forward => {
                    self.forward(partition, source, &record)?;
                    let removed = state.advance_past(expected);
                    self.telemetry.duplicates_dropped(removed.saturating_sub(1) as u64);
                }
            }
        }
    }

    /// Gap bookkeeping after a cascade: fully drained buffers close the gap;
    /// otherwise the gap clock starts if it was not already ticking. After a
    /// gap resolution (`reopen`), leftover buffered records constitute a new
    /// hole with a fresh clock and a fresh notification.
    fn settle_gap(&self, partition: PartitionId, state: &mut PartitionState, reopen: bool) {
        if state.pending_is_empty() {
            state.clear_gap();
            return;
        }
        if reopen {
            state.clear_gap();
        }
        if state.gap_opened_at().is_none() {
            let (Some(expected), Some(next)) = (state.expected(), state.min_pending()) else {
                return;
            };
            state.open_gap(self.clock.now_ms());
            if next > expected {
                self.telemetry.gap_opened();
                info!(partition, from = expected, to = next, "sequence gap opened");
                self.strategy.on_sequence_gap(GapEvent {
                    partition,
                    from_sequence: expected,
                    to_sequence: next,
                });
            }
        }
    }

    /// Publishes one record with provenance headers attached. Telemetry and
    /// state only advance after the sender confirms.
    fn forward(
        &self,
        partition: PartitionId,
        source: SourceIndex,
        record: &CapturedRecord,
    ) -> Result<(), DedupError> {
        let now = self.clock.now_ms();
        let prefix = &self.config.header_prefix;
        let mut headers = record.headers.clone();
        headers.insert(format!("{prefix}{HEADER_SOURCE}"), source.to_be_bytes());
        if let Some(capture_time) = record.capture_time_ms {
            headers.insert(
                format!("{prefix}{HEADER_CAPTURE_TIME}"),
                capture_time.to_be_bytes(),
            );
        }
        headers.insert(format!("{prefix}{HEADER_SEND_TIME}"), now.to_be_bytes());
        let outbound = OutboundRecord {
            partition,
            key: record.key.clone(),
            value: record.value.clone(),
            headers,
        };
        self.sender
            .send(outbound)
            .map_err(|err| DedupError::Send { partition, source: err })?;
        self.telemetry.record_forwarded();
        if let Some(capture_time) = record.capture_time_ms {
            self.telemetry.forward_latency(now.saturating_sub(capture_time));
        }
        Ok(())
    }

    /// Resolves (or lazily creates) the state for `partition`, returning the
    /// map guard alongside it so reassignment stays exclusive with the
    /// caller's critical section.
    fn state_for(
        &self,
        partition: PartitionId,
    ) -> Result<(RwLockReadGuard<'_, PartitionMap>, Arc<Mutex<PartitionState>>), DedupError> {
        loop {
            let partitions = self.partitions.read().unwrap();
            let existing = partitions.get(&partition).map(Arc::clone);
            if let Some(state) = existing {
                return Ok((partitions, state));
            }
            drop(partitions);

            let mut partitions = self.partitions.write().unwrap();
            if !self.running.load(Ordering::SeqCst) {
                return Err(DedupError::NotRunning);
            }
            partitions.entry(partition).or_insert_with(|| {
                Arc::new(Mutex::new(PartitionState::new(self.config.source_count)))
            });
        }
    }
}
