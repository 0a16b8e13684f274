//! Sequencer state and the one-time stream initializer

use contracts::{LogStreamSink, SequenceToken, StreamTarget};
use tracing::{debug, info, instrument};

use crate::error::DispatcherError;

/// The single live continuation token
///
/// Owned by the dispatcher worker; nothing else mutates it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SequencerState {
    token: Option<SequenceToken>,
}

impl SequencerState {
    pub fn new(token: Option<SequenceToken>) -> Self {
        Self { token }
    }

    /// Token to present on the next append; None for a fresh stream
    pub fn current(&self) -> Option<&SequenceToken> {
        self.token.as_ref()
    }

    /// Replace the token with the one returned by the sink
    pub fn advance(&mut self, next: Option<SequenceToken>) {
        self.token = next;
    }
}

/// Discover or create the target stream and seed the sequencer
///
/// Only an exact name match counts as "found"; other streams sharing the
/// prefix are ignored.
///
/// # Errors
/// `Initialization` if the group is missing, discovery fails, or the stream
/// cannot be created
#[instrument(
    name = "stream_initialize",
    skip(sink, target),
    fields(sink = %sink.name(), group = %target.group, stream = %target.stream)
)]
pub async fn initialize<S: LogStreamSink>(
    sink: &mut S,
    target: &StreamTarget,
) -> Result<SequencerState, DispatcherError> {
    let streams = sink
        .describe_streams(&target.group, &target.stream)
        .await
        .map_err(|e| DispatcherError::initialization(target, e))?;

    if let Some(existing) = streams.into_iter().find(|s| s.stream == target.stream) {
        debug!(token = ?existing.token, "Stream found");
        return Ok(SequencerState::new(existing.token));
    }

    sink.create_stream(&target.group, &target.stream)
        .await
        .map_err(|e| DispatcherError::initialization(target, e))?;

    info!("Stream created");
    Ok(SequencerState::new(None))
}
