use crate::record::{Offset, PartitionId, Sequence, SourceIndex};
use std::collections::{BTreeSet, HashMap};

/// Immutable snapshot of partition ownership handed over by the external
/// rebalance collaborator.
///
/// Resume maps let a restarted owner pick up without re-emitting output that
/// was already acknowledged downstream: `resume_sequences` holds the last
/// *delivered* sequence per partition, `resume_offsets` the per-source log
/// positions the consumer should seek back to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    partitions: BTreeSet<PartitionId>,
    source_count: u32,
    resume_offsets: HashMap<(PartitionId, SourceIndex), Offset>,
    resume_sequences: HashMap<PartitionId, Sequence>,
}

impl Assignment {
    /// Creates a snapshot without resume state (cold start).
    pub fn new(partitions: impl IntoIterator<Item = PartitionId>, source_count: u32) -> Self {
        Self {
            partitions: partitions.into_iter().collect(),
            source_count,
            resume_offsets: HashMap::new(),
            resume_sequences: HashMap::new(),
        }
    }

    /// Attaches per-source resume offsets.
    pub fn with_resume_offsets(
        mut self,
        resume_offsets: HashMap<(PartitionId, SourceIndex), Offset>,
    ) -> Self {
        self.resume_offsets = resume_offsets;
        self
    }

    /// Attaches last-delivered sequences.
    pub fn with_resume_sequences(
        mut self,
        resume_sequences: HashMap<PartitionId, Sequence>,
    ) -> Self {
        self.resume_sequences = resume_sequences;
        self
    }

    /// Partitions owned under this snapshot.
    pub fn partitions(&self) -> &BTreeSet<PartitionId> {
        &self.partitions
    }

    /// True when `partition` is owned under this snapshot.
    pub fn contains(&self, partition: PartitionId) -> bool {
        self.partitions.contains(&partition)
    }

    /// Number of redundant capture sources feeding the owner.
    pub fn source_count(&self) -> u32 {
        self.source_count
    }

    /// Log position to resume a given source at, if known.
    pub fn resume_offset(&self, partition: PartitionId, source: SourceIndex) -> Option<Offset> {
        self.resume_offsets.get(&(partition, source)).copied()
    }

    /// Last sequence already delivered for `partition`, if known.
    pub fn resume_sequence(&self, partition: PartitionId) -> Option<Sequence> {
        self.resume_sequences.get(&partition).copied()
    }
}
