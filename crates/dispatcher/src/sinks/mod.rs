//! Sink implementations
//!
//! Contains MemorySink and FileSink, plus `AnySink` for config-driven selection.

mod file;
mod memory;

pub use self::file::{FileSink, FileSinkConfig};
pub use self::memory::MemorySink;

use contracts::{
    AppendOutcome, ContractError, LogEvent, LogStreamSink, SequenceToken, SinkConfig, SinkType,
    StreamDescription, StreamTarget,
};
use tracing::instrument;

use crate::error::DispatcherError;

/// Any sink selectable from configuration
pub enum AnySink {
    Memory(MemorySink),
    File(FileSink),
}

/// Create a sink from configuration
#[instrument(name = "dispatcher_create_sink", skip(config), fields(sink_type = ?config.sink_type))]
pub fn create_sink(config: &SinkConfig) -> Result<AnySink, DispatcherError> {
    match config.sink_type {
        SinkType::Memory => Ok(AnySink::Memory(MemorySink::new("memory"))),
        SinkType::File => {
            let sink = FileSink::from_params("file", &config.params)
                .map_err(|e| DispatcherError::sink_creation("file", e.to_string()))?;
            Ok(AnySink::File(sink))
        }
    }
}

impl LogStreamSink for AnySink {
    fn name(&self) -> &str {
        match self {
            Self::Memory(sink) => sink.name(),
            Self::File(sink) => sink.name(),
        }
    }

    async fn describe_streams(
        &self,
        group: &str,
        prefix: &str,
    ) -> Result<Vec<StreamDescription>, ContractError> {
        match self {
            Self::Memory(sink) => sink.describe_streams(group, prefix).await,
            Self::File(sink) => sink.describe_streams(group, prefix).await,
        }
    }

    async fn create_stream(&mut self, group: &str, stream: &str) -> Result<(), ContractError> {
        match self {
            Self::Memory(sink) => sink.create_stream(group, stream).await,
            Self::File(sink) => sink.create_stream(group, stream).await,
        }
    }

    async fn append_events(
        &mut self,
        target: &StreamTarget,
        token: Option<&SequenceToken>,
        events: &[LogEvent],
    ) -> Result<AppendOutcome, ContractError> {
        match self {
            Self::Memory(sink) => sink.append_events(target, token, events).await,
            Self::File(sink) => sink.append_events(target, token, events).await,
        }
    }
}
