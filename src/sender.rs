use crate::record::{Headers, PartitionId};
use thiserror::Error;

/// Failure surfaced by the downstream publisher. The engine never retries
/// internally; the error propagates to the ingestion caller with partition
/// state unadvanced, so an external retry is safe.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct SendError {
    message: String,
}

impl SendError {
    /// Creates an error with the given description.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Record forwarded downstream after winning deduplication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundRecord {
    pub partition: PartitionId,
    pub key: Option<Vec<u8>>,
    pub value: Vec<u8>,
    pub headers: Headers,
}

/// Ordered downstream publisher.
///
/// Implementations must preserve submission order per partition; they may be
/// asynchronous internally as long as that contract holds. The engine never
/// issues overlapping sends for the same partition.
pub trait RecordSender: Send + Sync {
    /// Acquires underlying resources. A failure here is fatal at startup.
    fn open(&self) -> Result<(), SendError>;

    /// Publishes one record.
    fn send(&self, record: OutboundRecord) -> Result<(), SendError>;

    /// Releases underlying resources.
    fn close(&self);
}
