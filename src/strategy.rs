use crate::record::{CapturedRecord, PartitionId, Sequence};
use thiserror::Error;

/// Errors raised while extracting a sequence from a record.
///
/// These are local, per-record failures: the offending record is dropped and
/// partition progress continues.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SequenceError {
    /// The record carries no key to parse a sequence from.
    #[error("record carries no key to parse a sequence from")]
    MissingKey,
    /// The configured sequence header is absent.
    #[error("record is missing sequence header '{0}'")]
    MissingHeader(String),
    /// The sequence field is not a big-endian u64.
    #[error("sequence field must be 8 bytes, got {0}")]
    InvalidWidth(usize),
}

/// Final disposition for a record that has reached the head of its partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupDecision {
    /// Publish downstream and advance.
    Forward,
    /// Advance without publishing.
    Drop,
    /// Leave buffered; the engine re-consults on the next cascade or
    /// maintenance pass.
    Hold,
}

/// Gap observation delivered once per gap opening.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GapEvent {
    pub partition: PartitionId,
    /// First sequence missing on every source.
    pub from_sequence: Sequence,
    /// Lowest sequence buffered beyond the hole.
    pub to_sequence: Sequence,
}

/// Pluggable sequence extraction and gap observation.
///
/// Implementations are substitutable values with no shared mutable state;
/// the engine owns all per-partition bookkeeping.
pub trait DedupStrategy: Send + Sync {
    /// Extracts the application-level sequence from a record.
    fn parse_sequence(&self, record: &CapturedRecord) -> Result<Sequence, SequenceError>;

    /// Disposition for a record about to be emitted in order. The default
    /// forwards everything.
    fn decide(&self, _record: &CapturedRecord) -> DedupDecision {
        DedupDecision::Forward
    }

    /// Observer-only hook fired once per gap opening. Must not influence
    /// control flow.
    fn on_sequence_gap(&self, _gap: GapEvent) {}
}

/// Reads the sequence as a big-endian u64 record key.
#[derive(Debug, Default, Clone, Copy)]
pub struct SequenceFromKey;

impl DedupStrategy for SequenceFromKey {
    fn parse_sequence(&self, record: &CapturedRecord) -> Result<Sequence, SequenceError> {
        let key = record.key.as_deref().ok_or(SequenceError::MissingKey)?;
        parse_be_u64(key)
    }
}

/// Reads the sequence from a named header as a big-endian u64.
#[derive(Debug, Clone)]
pub struct SequenceFromHeader {
    header: String,
}

impl SequenceFromHeader {
    /// Creates an extractor bound to `header`.
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
        }
    }

    /// Name of the header holding the sequence.
    pub fn header(&self) -> &str {
        &self.header
    }
}

impl DedupStrategy for SequenceFromHeader {
    fn parse_sequence(&self, record: &CapturedRecord) -> Result<Sequence, SequenceError> {
        let value = record
            .headers
            .get(&self.header)
            .ok_or_else(|| SequenceError::MissingHeader(self.header.clone()))?;
        parse_be_u64(value)
    }
}

fn parse_be_u64(raw: &[u8]) -> Result<Sequence, SequenceError> {
    let bytes: [u8; 8] = raw
        .try_into()
        .map_err(|_| SequenceError::InvalidWidth(raw.len()))?;
    Ok(u64::from_be_bytes(bytes))
}
