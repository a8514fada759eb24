use crate::record::{CapturedRecord, Sequence, SourceIndex};
use std::collections::BTreeMap;

/// Synchronization phase of one partition.
///
/// `Uninitialized → InSync` on the first record (or resume seed),
/// `InSync ⇄ Gap` as holes open and drain, `Closed` on revoke or shutdown
/// from any phase. No other transitions exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Uninitialized,
    InSync,
    Gap,
    Closed,
}

/// Mutable dedup state for one owned partition.
///
/// Holds the next expected sequence, one ordered buffer of ahead-of-sequence
/// records per capture source, and the instant the current gap opened.
/// Buffers never hold an entry below the expected sequence; every advance
/// prunes as it goes. Partitions are mutually independent, so nothing in here
/// is shared across instances.
#[derive(Debug)]
pub struct PartitionState {
    source_count: u32,
    expected: Option<Sequence>,
    pending: Vec<BTreeMap<Sequence, CapturedRecord>>,
    gap_detected_at: Option<u64>,
    phase: SyncPhase,
}

impl PartitionState {
    /// Creates cold-start state: the first observed record sets the baseline.
    pub fn new(source_count: u32) -> Self {
        Self {
            source_count,
            expected: None,
            pending: (0..source_count).map(|_| BTreeMap::new()).collect(),
            gap_detected_at: None,
            phase: SyncPhase::Uninitialized,
        }
    }

    /// Creates state resumed after `last_delivered`, so a restarted owner
    /// does not re-emit acknowledged output.
    pub fn resumed(source_count: u32, last_delivered: Sequence) -> Self {
        let mut state = Self::new(source_count);
        state.expected = Some(last_delivered + 1);
        state.phase = SyncPhase::InSync;
        state
    }

    /// Number of capture sources this partition is fed from.
    pub fn source_count(&self) -> u32 {
        self.source_count
    }

    /// Current phase.
    pub fn phase(&self) -> SyncPhase {
        self.phase
    }

    /// Next sequence owed downstream, unset until the baseline is known.
    pub fn expected(&self) -> Option<Sequence> {
        self.expected
    }

    /// Instant the currently open gap was first detected.
    pub fn gap_opened_at(&self) -> Option<u64> {
        self.gap_detected_at
    }

    /// Total buffered records across all sources.
    pub fn pending_len(&self) -> usize {
        self.pending.iter().map(BTreeMap::len).sum()
    }

    /// True when no source holds a buffered record.
    pub fn pending_is_empty(&self) -> bool {
        self.pending.iter().all(BTreeMap::is_empty)
    }

    /// Highest sequence buffered for `source`, if any.
    pub fn latest_buffered(&self, source: SourceIndex) -> Option<Sequence> {
        self.pending[source as usize]
            .keys()
            .next_back()
            .copied()
    }

    /// Lowest sequence buffered on any source.
    pub fn min_pending(&self) -> Option<Sequence> {
        self.pending
            .iter()
            .filter_map(|buffer| buffer.keys().next().copied())
            .min()
    }

    /// Per-source minima at or above the expected sequence. Sources with an
    /// empty buffer abstain; buffers are pruned on every advance, so the head
    /// entry is the vote.
    pub fn votes(&self) -> Vec<Sequence> {
        self.pending
            .iter()
            .filter_map(|buffer| buffer.keys().next().copied())
            .collect()
    }

    pub(crate) fn init_expected(&mut self, sequence: Sequence) {
        if self.expected.is_none() {
            self.expected = Some(sequence);
            self.phase = SyncPhase::InSync;
        }
    }

    /// Buffers an ahead-of-sequence record. Returns false when this source
    /// already holds an entry at that sequence (the arrival is a replay).
    pub(crate) fn buffer(
        &mut self,
        source: SourceIndex,
        sequence: Sequence,
        record: CapturedRecord,
    ) -> bool {
        let buffer = &mut self.pending[source as usize];
        if buffer.contains_key(&sequence) {
            return false;
        }
        buffer.insert(sequence, record);
        true
    }

    /// First buffered copy of `sequence` across sources, lowest source index
    /// winning. The copy stays buffered until the send is confirmed.
    pub(crate) fn record_at(&self, sequence: Sequence) -> Option<(SourceIndex, CapturedRecord)> {
        self.pending
            .iter()
            .enumerate()
            .find_map(|(source, buffer)| {
                buffer
                    .get(&sequence)
                    .map(|record| (source as SourceIndex, record.clone()))
            })
    }

    /// Advances past a just-delivered sequence, discarding mirror copies on
    /// every source. Returns the number of mirrors removed.
    pub(crate) fn advance_past(&mut self, delivered: Sequence) -> usize {
        self.set_expected(delivered + 1);
        self.discard_below(delivered + 1)
    }

    /// Jumps the expected sequence forward to `target` during gap
    /// resolution. Returns the number of buffered entries discarded as
    /// unrecoverable (zero unless sources disagreed below the target).
    pub(crate) fn advance_to(&mut self, target: Sequence) -> usize {
        self.set_expected(target);
        self.discard_below(target)
    }

    pub(crate) fn open_gap(&mut self, now_ms: u64) {
        self.gap_detected_at = Some(now_ms);
        self.phase = SyncPhase::Gap;
    }

    pub(crate) fn clear_gap(&mut self) {
        self.gap_detected_at = None;
        if self.expected.is_some() {
            self.phase = SyncPhase::InSync;
        }
    }

    pub(crate) fn close(&mut self) {
        self.pending.iter_mut().for_each(BTreeMap::clear);
        self.gap_detected_at = None;
        self.phase = SyncPhase::Closed;
    }

    fn set_expected(&mut self, next: Sequence) {
        debug_assert!(self.expected.is_some_and(|current| next >= current));
        self.expected = Some(next);
    }

    fn discard_below(&mut self, floor: Sequence) -> usize {
        let mut removed = 0;
        for buffer in &mut self.pending {
            while let Some((&head, _)) = buffer.first_key_value() {
                if head >= floor {
                    break;
                }
                buffer.pop_first();
                removed += 1;
            }
        }
        removed
    }
}
