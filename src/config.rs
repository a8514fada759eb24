use serde::{Deserialize, Serialize};
use thiserror::Error;

const DEFAULT_GAP_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_CHECK_INTERVAL_MS: u64 = 100;

/// Errors raised while validating an engine configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// `source_count` must cover at least one capture path.
    #[error("source_count must be at least 1 (got {0})")]
    NoSources(u32),
    /// The maintenance timer interval cannot be zero.
    #[error("check_interval_ms must be greater than zero")]
    ZeroCheckInterval,
}

/// Validated engine configuration, constructed once at startup.
///
/// External document parsing stays with the caller; this type only carries
/// the plain values the engine reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DedupConfig {
    /// Number of redundant capture sources publishing copies of the stream.
    pub source_count: u32,
    /// How long a sequence gap may stay open before the timeout fallback
    /// advances past it.
    #[serde(default = "default_gap_timeout_ms")]
    pub gap_timeout_ms: u64,
    /// Asserts that each source delivers its own records in non-decreasing
    /// sequence order, enabling same-source replay suppression.
    #[serde(default)]
    pub ordered_capture: bool,
    /// Namespace prepended to provenance headers on forwarded records.
    #[serde(default)]
    pub header_prefix: String,
    /// Interval for the periodic cache maintenance driver.
    #[serde(default = "default_check_interval_ms")]
    pub check_interval_ms: u64,
}

fn default_gap_timeout_ms() -> u64 {
    DEFAULT_GAP_TIMEOUT_MS
}

fn default_check_interval_ms() -> u64 {
    DEFAULT_CHECK_INTERVAL_MS
}

impl DedupConfig {
    /// Creates a configuration with default timing knobs.
    pub fn new(source_count: u32) -> Self {
        Self {
            source_count,
            gap_timeout_ms: DEFAULT_GAP_TIMEOUT_MS,
            ordered_capture: false,
            header_prefix: String::new(),
            check_interval_ms: DEFAULT_CHECK_INTERVAL_MS,
        }
    }

    /// Sets the gap timeout.
    pub fn with_gap_timeout_ms(mut self, gap_timeout_ms: u64) -> Self {
        self.gap_timeout_ms = gap_timeout_ms;
        self
    }

    /// Sets the ordered-capture assertion.
    pub fn with_ordered_capture(mut self, ordered_capture: bool) -> Self {
        self.ordered_capture = ordered_capture;
        self
    }

    /// Sets the provenance header prefix.
    pub fn with_header_prefix(mut self, header_prefix: impl Into<String>) -> Self {
        self.header_prefix = header_prefix.into();
        self
    }

    /// Sets the maintenance interval.
    pub fn with_check_interval_ms(mut self, check_interval_ms: u64) -> Self {
        self.check_interval_ms = check_interval_ms;
        self
    }

    /// Checks the configuration for values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.source_count == 0 {
            return Err(ConfigError::NoSources(self.source_count));
        }
        if self.check_interval_ms == 0 {
            return Err(ConfigError::ZeroCheckInterval);
        }
        Ok(())
    }
}
