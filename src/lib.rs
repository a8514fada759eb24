//! Reconciles multiple redundant captures of a sequenced event stream into
//! one deduplicated, strictly ordered output stream per logical partition.
//!
//! Several capture points observe the same feed and each publishes into its
//! own log topic; the [`RecordHandler`] merges those copies back together,
//! suppressing duplicates, cascading in-order emission, and resolving
//! sequence gaps either by cross-source consensus or by a timeout fallback.

pub mod assignment;
pub mod clock;
pub mod config;
pub mod handler;
pub mod maintenance;
pub mod partition_state;
pub mod record;
pub mod sender;
pub mod strategy;
pub mod telemetry;

pub use assignment::Assignment;
pub use clock::{ManualClock, MillisClock, SystemClock};
pub use config::{ConfigError, DedupConfig};
pub use handler::{DedupError, RecordHandler};
pub use maintenance::CacheMaintenanceTimer;
pub use partition_state::{PartitionState, SyncPhase};
pub use record::{
    CapturedRecord, Headers, Offset, PartitionId, Sequence, SourceIndex, HEADER_CAPTURE_TIME,
    HEADER_SEND_TIME, HEADER_SOURCE,
};
pub use sender::{OutboundRecord, RecordSender, SendError};
pub use strategy::{
    DedupDecision, DedupStrategy, GapEvent, SequenceError, SequenceFromHeader, SequenceFromKey,
};
pub use telemetry::{DedupTelemetry, TelemetrySnapshot};
