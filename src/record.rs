use std::fmt;

/// Identifier of one independently ordered unit of the logical stream.
pub type PartitionId = u32;

/// Identifier of one of several redundant capture paths.
pub type SourceIndex = u32;

/// Application-level monotonic event identifier, distinct from broker offsets.
pub type Sequence = u64;

/// Position of a record within its source log.
pub type Offset = i64;

/// Provenance header suffix naming the capture source that won deduplication.
pub const HEADER_SOURCE: &str = "source";

/// Provenance header suffix carrying the original capture time in millis.
pub const HEADER_CAPTURE_TIME: &str = "capture-time";

/// Provenance header suffix carrying the forward time in millis.
pub const HEADER_SEND_TIME: &str = "send-time";

/// Ordered key/value header pairs carried through deduplication untouched.
///
/// Duplicate keys are permitted; `get` resolves to the last value written,
/// matching log-transport header semantics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, Vec<u8>)>,
}

impl Headers {
    /// Creates an empty header set.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Appends a header pair.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) {
        self.entries.push((key.into(), value.into()));
    }

    /// Returns the last value written under `key`, if any.
    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .rev()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_slice())
    }

    /// Iterates over all pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_slice()))
    }

    /// Number of header pairs.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no headers are present.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, Vec<u8>)> for Headers {
    fn from_iter<I: IntoIterator<Item = (String, Vec<u8>)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// One raw record observed on a capture source, logically immutable once
/// ingested.
///
/// The engine interprets only the sequence (through the pluggable extractor);
/// key, value, and headers pass through untouched apart from provenance
/// header augmentation on forward. The cross-process capture timestamp is an
/// explicit typed field rather than an untyped header lookup.
#[derive(Clone, PartialEq, Eq)]
pub struct CapturedRecord {
    pub partition: PartitionId,
    pub key: Option<Vec<u8>>,
    pub value: Vec<u8>,
    pub headers: Headers,
    pub source_offset: Offset,
    pub capture_time_ms: Option<u64>,
}

impl CapturedRecord {
    /// Creates a record with the given partition and payload.
    pub fn new(partition: PartitionId, value: impl Into<Vec<u8>>) -> Self {
        Self {
            partition,
            key: None,
            value: value.into(),
            headers: Headers::new(),
            source_offset: 0,
            capture_time_ms: None,
        }
    }

    /// Sets the record key.
    pub fn with_key(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Sets the pass-through headers.
    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    /// Sets the source log offset.
    pub fn with_source_offset(mut self, offset: Offset) -> Self {
        self.source_offset = offset;
        self
    }

    /// Sets the original capture timestamp in millis.
    pub fn with_capture_time_ms(mut self, capture_time_ms: u64) -> Self {
        self.capture_time_ms = Some(capture_time_ms);
        self
    }
}

impl fmt::Debug for CapturedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapturedRecord")
            .field("partition", &self.partition)
            .field("key_len", &self.key.as_ref().map(Vec::len))
            .field("value_len", &self.value.len())
            .field("headers", &self.headers.len())
            .field("source_offset", &self.source_offset)
            .field("capture_time_ms", &self.capture_time_ms)
            .finish()
    }
}
