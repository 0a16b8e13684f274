//! MemorySink - in-process append-only stream service

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use contracts::{
    AppendOutcome, ContractError, LogEvent, LogStreamSink, SequenceToken, StreamDescription,
    StreamTarget,
};
use tracing::{debug, instrument};

#[derive(Debug, Default)]
struct MemoryStream {
    events: Vec<LogEvent>,
    token: Option<SequenceToken>,
    appends: u64,
}

#[derive(Debug, Default)]
struct MemoryState {
    groups: HashMap<String, BTreeMap<String, MemoryStream>>,
    /// Upcoming appends that fail before touching the stream
    injected_failures: usize,
    append_delay: Option<Duration>,
    append_calls: u64,
}

/// Sink that keeps streams in memory and enforces the token protocol
///
/// Clones share the same state, so a test can keep one clone for inspection
/// while the dispatcher owns another. Tokens are the stream's append count.
#[derive(Debug, Clone)]
pub struct MemorySink {
    name: String,
    state: Arc<Mutex<MemoryState>>,
}

impl MemorySink {
    /// Create an empty service with no groups
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(Mutex::new(MemoryState::default())),
        }
    }

    /// Builder: add a group
    pub fn with_group(self, group: impl Into<String>) -> Self {
        self.create_group(group);
        self
    }

    pub fn create_group(&self, group: impl Into<String>) {
        self.state().groups.entry(group.into()).or_default();
    }

    /// Events stored in a stream, in append order
    pub fn stream_events(&self, group: &str, stream: &str) -> Option<Vec<LogEvent>> {
        self.state()
            .groups
            .get(group)
            .and_then(|streams| streams.get(stream))
            .map(|s| s.events.clone())
    }

    /// Current token of a stream
    pub fn stream_token(&self, group: &str, stream: &str) -> Option<SequenceToken> {
        self.state()
            .groups
            .get(group)
            .and_then(|streams| streams.get(stream))
            .and_then(|s| s.token.clone())
    }

    /// Make the next `count` appends fail
    pub fn fail_next_appends(&self, count: usize) {
        self.state().injected_failures = count;
    }

    /// Delay every append (simulates a slow service)
    pub fn set_append_delay(&self, delay: Option<Duration>) {
        self.state().append_delay = delay;
    }

    /// Number of append calls received, successful or not
    pub fn append_calls(&self) -> u64 {
        self.state().append_calls
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn apply_append(
        &self,
        target: &StreamTarget,
        token: Option<&SequenceToken>,
        events: &[LogEvent],
    ) -> Result<AppendOutcome, ContractError> {
        let mut state = self.state();
        state.append_calls += 1;

        if state.injected_failures > 0 {
            state.injected_failures -= 1;
            return Err(ContractError::sink_request(&self.name, "injected failure"));
        }

        let streams = state
            .groups
            .get_mut(&target.group)
            .ok_or_else(|| ContractError::group_not_found(&target.group))?;
        let stream = streams
            .get_mut(&target.stream)
            .ok_or_else(|| ContractError::StreamNotFound {
                group: target.group.clone(),
                stream: target.stream.clone(),
            })?;

        if stream.token.as_ref() != token {
            return Err(ContractError::InvalidSequenceToken {
                expected: stream.token.as_ref().map(|t| t.to_string()),
            });
        }

        stream.events.extend_from_slice(events);
        stream.appends += 1;
        stream.token = Some(SequenceToken::new(stream.appends.to_string()));

        Ok(AppendOutcome {
            next_token: stream.token.clone(),
        })
    }
}

impl LogStreamSink for MemorySink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn describe_streams(
        &self,
        group: &str,
        prefix: &str,
    ) -> Result<Vec<StreamDescription>, ContractError> {
        let state = self.state();
        let streams = state
            .groups
            .get(group)
            .ok_or_else(|| ContractError::group_not_found(group))?;

        Ok(streams
            .iter()
            .filter(|(name, _)| name.starts_with(prefix))
            .map(|(name, s)| StreamDescription {
                stream: name.clone(),
                token: s.token.clone(),
            })
            .collect())
    }

    async fn create_stream(&mut self, group: &str, stream: &str) -> Result<(), ContractError> {
        let mut state = self.state();
        let streams = state
            .groups
            .get_mut(group)
            .ok_or_else(|| ContractError::group_not_found(group))?;

        if streams.contains_key(stream) {
            return Err(ContractError::StreamAlreadyExists {
                group: group.to_string(),
                stream: stream.to_string(),
            });
        }
        streams.insert(stream.to_string(), MemoryStream::default());
        debug!(sink = %self.name, group, stream, "Stream created");
        Ok(())
    }

    #[instrument(
        name = "memory_sink_append",
        skip(self, token, events),
        fields(sink = %self.name, events = events.len())
    )]
    async fn append_events(
        &mut self,
        target: &StreamTarget,
        token: Option<&SequenceToken>,
        events: &[LogEvent],
    ) -> Result<AppendOutcome, ContractError> {
        let delay = self.state().append_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.apply_append(target, token, events)
    }
}
