//! LogEvent / SequenceToken - the units the shipper moves around

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single log record ready to be shipped
///
/// Immutable once created. `timestamp` is milliseconds since the Unix epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEvent {
    /// Formatted message
    pub message: String,

    /// Milliseconds since epoch
    pub timestamp: i64,
}

impl LogEvent {
    /// Create an event with an explicit timestamp
    pub fn new(message: impl Into<String>, timestamp: i64) -> Self {
        Self {
            message: message.into(),
            timestamp,
        }
    }
}

/// Opaque continuation token returned by the sink after each append
///
/// Must be presented on the next append to prove the caller is writing
/// after the current tail of the stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SequenceToken(String);

impl SequenceToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SequenceToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SequenceToken {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SequenceToken {
    fn from(value: String) -> Self {
        Self(value)
    }
}
