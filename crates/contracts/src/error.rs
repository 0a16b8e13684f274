//! Layered error definitions
//!
//! Categorized by source: config / stream / sink

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Stream Errors =====
    /// The log group does not exist on the sink
    #[error("log group not found: {group}")]
    GroupNotFound { group: String },

    /// The log stream does not exist in the group
    #[error("log stream '{stream}' not found in group '{group}'")]
    StreamNotFound { group: String, stream: String },

    /// The log stream already exists
    #[error("log stream '{stream}' already exists in group '{group}'")]
    StreamAlreadyExists { group: String, stream: String },

    /// The presented sequence token is not the stream's current one
    #[error("invalid sequence token, expected {expected:?}")]
    InvalidSequenceToken { expected: Option<String> },

    // ===== Sink Errors =====
    /// Sink request error
    #[error("sink '{sink_name}' request error: {message}")]
    SinkRequest { sink_name: String, message: String },

    /// Sink call did not complete in time
    #[error("sink '{sink_name}' timed out after {timeout_ms}ms")]
    SinkTimeout { sink_name: String, timeout_ms: u64 },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create sink request error
    pub fn sink_request(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkRequest {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }

    /// Create group-not-found error
    pub fn group_not_found(group: impl Into<String>) -> Self {
        Self::GroupNotFound {
            group: group.into(),
        }
    }

    /// True if the sink rejected the append because of a stale token
    pub fn is_token_conflict(&self) -> bool {
        matches!(self, Self::InvalidSequenceToken { .. })
    }
}
