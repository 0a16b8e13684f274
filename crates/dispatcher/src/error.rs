//! Dispatcher error types

use contracts::{ContractError, StreamTarget};
use thiserror::Error;

/// Dispatcher-specific errors
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// Stream discovery/creation failed; the dispatcher is not started
    #[error("failed to initialize stream '{group}/{stream}': {source}")]
    Initialization {
        group: String,
        stream: String,
        #[source]
        source: ContractError,
    },

    /// A record could not be rendered to a message; nothing was enqueued
    #[error("failed to format log record")]
    Formatting(#[from] std::fmt::Error),

    /// Append call failed; the batch stays pending for the next tick
    #[error("append to '{group}/{stream}' failed: {source}")]
    Append {
        group: String,
        stream: String,
        #[source]
        source: ContractError,
    },

    /// Sink creation error
    #[error("failed to create sink '{name}': {message}")]
    SinkCreation { name: String, message: String },

    /// Sink error (from contract)
    #[error("sink error: {0}")]
    Contract(#[from] ContractError),
}

impl DispatcherError {
    /// Create an initialization error for `target`
    pub fn initialization(target: &StreamTarget, source: ContractError) -> Self {
        Self::Initialization {
            group: target.group.clone(),
            stream: target.stream.clone(),
            source,
        }
    }

    /// Create an append error for `target`
    pub fn append(target: &StreamTarget, source: ContractError) -> Self {
        Self::Append {
            group: target.group.clone(),
            stream: target.stream.clone(),
            source,
        }
    }

    /// Create a sink creation error
    pub fn sink_creation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkCreation {
            name: name.into(),
            message: message.into(),
        }
    }
}
