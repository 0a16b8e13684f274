//! BatchDispatcher - timer-driven batching loop
//!
//! Single worker that owns the pending batch, the sequence token and the sink.
//! Events accumulate between ticks; on each tick the whole batch is appended
//! in one call. A failed append keeps the batch (and the token) for the next
//! tick, with newer events appended behind it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use contracts::{
    ContractError, LogEvent, LogStreamSink, SequenceToken, ShipperConfig, StreamTarget,
};
use observability::FlushStats;
use tokio::sync::oneshot;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

use crate::error::DispatcherError;
use crate::gate::Gate;
use crate::metrics::DispatcherMetrics;
use crate::queue::EventReceiver;
use crate::sequencer::SequencerState;

/// Loop tuning
#[derive(Debug, Clone)]
pub struct DispatcherOptions {
    /// Tick period
    pub flush_interval: Duration,
    /// Upper bound on one append call
    pub append_timeout: Option<Duration>,
    /// Adopt the sink's expected token after a token conflict
    pub refresh_token_on_conflict: bool,
}

impl DispatcherOptions {
    pub fn from_config(config: &ShipperConfig) -> Self {
        Self {
            flush_interval: config.flush_interval(),
            append_timeout: config.append_timeout(),
            refresh_token_on_conflict: config.refresh_token_on_conflict,
        }
    }
}

impl Default for DispatcherOptions {
    fn default() -> Self {
        Self {
            flush_interval: Duration::from_millis(200),
            append_timeout: None,
            refresh_token_on_conflict: false,
        }
    }
}

/// What a tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Gate closed; nothing sent
    Paused,
    /// Nothing pending
    Empty,
    /// Batch appended and cleared
    Flushed { events: usize },
    /// Append failed; batch retained
    Failed { events: usize },
}

/// The batching state machine
pub struct BatchDispatcher<S> {
    target: StreamTarget,
    sink: S,
    rx: EventReceiver,
    pending: Vec<LogEvent>,
    sequencer: SequencerState,
    gate: Gate,
    metrics: Arc<DispatcherMetrics>,
    options: DispatcherOptions,
    stats: FlushStats,
}

impl<S: LogStreamSink + Send + 'static> BatchDispatcher<S> {
    pub fn new(
        target: StreamTarget,
        sink: S,
        rx: EventReceiver,
        sequencer: SequencerState,
        gate: Gate,
        metrics: Arc<DispatcherMetrics>,
        options: DispatcherOptions,
    ) -> Self {
        Self {
            target,
            sink,
            rx,
            pending: Vec::new(),
            sequencer,
            gate,
            metrics,
            options,
            stats: FlushStats::new(),
        }
    }

    /// Events waiting for the next successful append, oldest first
    pub fn pending(&self) -> &[LogEvent] {
        &self.pending
    }

    pub fn current_token(&self) -> Option<&SequenceToken> {
        self.sequencer.current()
    }

    pub fn stats(&self) -> &FlushStats {
        &self.stats
    }

    /// Move everything queued so far behind the pending batch
    pub fn collect(&mut self) -> usize {
        let drained = self.rx.drain_into(&mut self.pending);
        if drained > 0 {
            self.publish_pending_len();
        }
        drained
    }

    /// Handle one tick
    pub async fn on_tick(&mut self) -> TickOutcome {
        self.collect();

        if !self.gate.is_open() {
            return TickOutcome::Paused;
        }
        if self.pending.is_empty() {
            return TickOutcome::Empty;
        }

        let events = self.pending.len();
        match self.flush().await {
            Ok(()) => TickOutcome::Flushed { events },
            Err(e) => {
                warn!(
                    group = %self.target.group,
                    stream = %self.target.stream,
                    pending = events,
                    error = %e,
                    "Append failed, batch retained for next tick"
                );
                TickOutcome::Failed { events }
            }
        }
    }

    /// Append the whole pending batch with the current token
    ///
    /// On success the batch is cleared and the returned token adopted. On
    /// failure both are left untouched (unless a token refresh applies).
    #[instrument(
        name = "dispatcher_flush",
        skip(self),
        fields(
            group = %self.target.group,
            stream = %self.target.stream,
            events = self.pending.len()
        )
    )]
    async fn flush(&mut self) -> Result<(), DispatcherError> {
        let started = Instant::now();
        let result = self.append().await;
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

        match result {
            Ok(next_token) => {
                let events = self.pending.len();
                self.sequencer.advance(next_token);
                self.pending.clear();

                self.metrics.record_append(events);
                self.stats.record_success(events, latency_ms);
                observability::record_append_success(
                    &self.target.group,
                    &self.target.stream,
                    events,
                    latency_ms,
                );
                self.publish_pending_len();
                debug!(events, token = ?self.sequencer.current(), "Batch appended");
                Ok(())
            }
            Err(e) => {
                self.metrics.inc_failed_appends();
                self.stats.record_failure(latency_ms);
                observability::record_append_failure(
                    &self.target.group,
                    &self.target.stream,
                    latency_ms,
                );
                self.maybe_refresh_token(&e);
                Err(DispatcherError::append(&self.target, e))
            }
        }
    }

    async fn append(&mut self) -> Result<Option<SequenceToken>, ContractError> {
        let call = self
            .sink
            .append_events(&self.target, self.sequencer.current(), &self.pending);

        let result = match self.options.append_timeout {
            Some(limit) => time::timeout(limit, call).await.map_err(|_| limit),
            None => Ok(call.await),
        };

        match result {
            Ok(outcome) => Ok(outcome?.next_token),
            Err(limit) => Err(ContractError::SinkTimeout {
                sink_name: self.sink.name().to_string(),
                timeout_ms: limit.as_millis() as u64,
            }),
        }
    }

    fn maybe_refresh_token(&mut self, error: &ContractError) {
        if !self.options.refresh_token_on_conflict {
            return;
        }
        if let ContractError::InvalidSequenceToken { expected } = error {
            info!(
                stale = ?self.sequencer.current(),
                expected = ?expected,
                "Adopting sink's expected sequence token"
            );
            self.sequencer
                .advance(expected.as_deref().map(SequenceToken::from));
        }
    }

    fn accept(&mut self, event: LogEvent) {
        self.pending.push(event);
        self.publish_pending_len();
    }

    fn publish_pending_len(&self) {
        self.metrics.set_pending_len(self.pending.len());
        observability::record_pending_len(
            &self.target.group,
            &self.target.stream,
            self.pending.len(),
        );
    }

    /// Run until shutdown is signalled or every producer is gone
    ///
    /// Dropping the shutdown sender without sending detaches the worker: it
    /// keeps running for the lifetime of the runtime.
    #[instrument(
        name = "dispatcher_run",
        skip(self, shutdown),
        fields(group = %self.target.group, stream = %self.target.stream, sink = %self.sink.name())
    )]
    pub async fn run(mut self, mut shutdown: oneshot::Receiver<()>) {
        let period = self.options.flush_interval;
        let mut ticker = time::interval_at(time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut detached = false;

        info!(
            interval_ms = period.as_millis() as u64,
            token = ?self.sequencer.current(),
            "Dispatcher started"
        );

        loop {
            tokio::select! {
                biased;
                signal = &mut shutdown, if !detached => {
                    if signal.is_ok() {
                        break;
                    }
                    debug!("Shipper handle dropped, dispatcher detached");
                    detached = true;
                }
                _ = ticker.tick() => {
                    self.on_tick().await;
                }
                event = self.rx.recv() => match event {
                    Some(event) => self.accept(event),
                    None => {
                        debug!("All producers gone");
                        break;
                    }
                },
            }
        }

        self.finish().await;
    }

    /// Final best-effort flush
    async fn finish(mut self) {
        match self.on_tick().await {
            TickOutcome::Paused if !self.pending.is_empty() => {
                warn!(
                    unsent = self.pending.len(),
                    "Dispatcher stopping while paused, pending events discarded"
                );
            }
            TickOutcome::Failed { events } => {
                warn!(unsent = events, "Final flush failed, pending events discarded");
            }
            _ => {}
        }

        info!(summary = %self.stats.summary(), "Dispatcher stopped");
    }
}
