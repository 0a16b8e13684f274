//! ShipperConfig - configuration for one shipper instance

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use validator::Validate;

use crate::StreamTarget;

/// Largest accepted `queue_capacity`
pub const MAX_QUEUE_CAPACITY: usize = 1_000_000;

/// Shipper configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ShipperConfig {
    /// Log group (must already exist on the sink)
    #[validate(length(min = 1, message = "group_id must not be empty"))]
    pub group_id: String,

    /// Log stream (created if missing)
    #[validate(length(min = 1, message = "stream_id must not be empty"))]
    pub stream_id: String,

    /// Event queue capacity; events beyond it are dropped
    #[serde(default = "default_queue_capacity")]
    #[validate(range(
        min = 1,
        max = 1_000_000,
        message = "queue_capacity must be between 1 and 1000000"
    ))]
    pub queue_capacity: usize,

    /// Flush period
    #[serde(default = "default_flush_interval_ms")]
    #[validate(range(min = 1, message = "flush_interval_ms must be > 0"))]
    pub flush_interval_ms: u64,

    /// Initial state of the enable/disable gate
    #[serde(default = "default_start_enabled")]
    pub start_enabled: bool,

    /// Most verbose severity forwarded by the tracing hook
    #[serde(default)]
    pub max_level: Severity,

    /// Upper bound on a single append call (None = wait forever)
    #[serde(default)]
    pub append_timeout_ms: Option<u64>,

    /// Adopt the sink's expected token after a token conflict
    #[serde(default)]
    pub refresh_token_on_conflict: bool,

    /// Sink selection
    #[validate(nested)]
    pub sink: SinkConfig,
}

fn default_queue_capacity() -> usize {
    100
}

fn default_flush_interval_ms() -> u64 {
    200
}

fn default_start_enabled() -> bool {
    true
}

impl ShipperConfig {
    /// Config with defaults for everything but the target and sink
    pub fn new(
        group_id: impl Into<String>,
        stream_id: impl Into<String>,
        sink: SinkConfig,
    ) -> Self {
        Self {
            group_id: group_id.into(),
            stream_id: stream_id.into(),
            queue_capacity: default_queue_capacity(),
            flush_interval_ms: default_flush_interval_ms(),
            start_enabled: default_start_enabled(),
            max_level: Severity::default(),
            append_timeout_ms: None,
            refresh_token_on_conflict: false,
            sink,
        }
    }

    pub fn target(&self) -> StreamTarget {
        StreamTarget::new(&self.group_id, &self.stream_id)
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    pub fn append_timeout(&self) -> Option<Duration> {
        self.append_timeout_ms.map(Duration::from_millis)
    }
}

/// Sink configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SinkConfig {
    /// Sink type
    pub sink_type: SinkType,

    /// Type-specific parameters
    #[serde(default)]
    pub params: HashMap<String, String>,
}

impl SinkConfig {
    pub fn memory() -> Self {
        Self {
            sink_type: SinkType::Memory,
            params: HashMap::new(),
        }
    }

    pub fn file(base_path: impl Into<String>) -> Self {
        Self {
            sink_type: SinkType::File,
            params: HashMap::from([("base_path".to_string(), base_path.into())]),
        }
    }
}

/// Sink type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkType {
    /// In-process stream service
    Memory,
    /// Directory-backed stream service
    File,
}

/// Log severity, most severe first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warn,
    Info,
    #[default]
    Debug,
    Trace,
}

impl Severity {
    /// All severities up to and including `self`
    pub fn and_above(self) -> Vec<Severity> {
        [
            Self::Error,
            Self::Warn,
            Self::Info,
            Self::Debug,
            Self::Trace,
        ]
        .into_iter()
        .filter(|s| *s <= self)
        .collect()
    }
}
