//! LogStreamSink trait - remote append-only log service interface
//!
//! Defines the three operations the shipper needs from a log service.

use crate::{ContractError, LogEvent, SequenceToken};

/// Identifies the stream the shipper appends to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamTarget {
    /// Log group
    pub group: String,
    /// Log stream inside the group
    pub stream: String,
}

impl StreamTarget {
    pub fn new(group: impl Into<String>, stream: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            stream: stream.into(),
        }
    }
}

/// One stream as reported by `describe_streams`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDescription {
    pub stream: String,
    /// `None` means the stream has never been appended to
    pub token: Option<SequenceToken>,
}

/// Result of a successful append
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendOutcome {
    /// Token to present on the next append
    pub next_token: Option<SequenceToken>,
}

/// Remote log-stream service
///
/// All sink implementations must implement this trait.
#[trait_variant::make(LogStreamSink: Send)]
pub trait LocalLogStreamSink {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// List streams in `group` whose name starts with `prefix`
    ///
    /// # Errors
    /// `GroupNotFound` if the group does not exist
    async fn describe_streams(
        &self,
        group: &str,
        prefix: &str,
    ) -> Result<Vec<StreamDescription>, ContractError>;

    /// Create an empty stream
    async fn create_stream(&mut self, group: &str, stream: &str) -> Result<(), ContractError>;

    /// Append `events` after the tail identified by `token`
    ///
    /// # Errors
    /// `InvalidSequenceToken` if `token` is not the stream's current token,
    /// or any transport/service error
    async fn append_events(
        &mut self,
        target: &StreamTarget,
        token: Option<&SequenceToken>,
        events: &[LogEvent],
    ) -> Result<AppendOutcome, ContractError>;
}
