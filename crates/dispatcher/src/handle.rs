//! Shipper - owned handle over a running dispatcher worker

use std::fmt::{self, Write as _};
use std::sync::Arc;

use chrono::Utc;
use contracts::{
    ContractError, LogEvent, LogStreamSink, Severity, ShipperConfig, StreamTarget,
    MAX_QUEUE_CAPACITY,
};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, trace};

use crate::dispatcher::{BatchDispatcher, DispatcherOptions};
use crate::error::DispatcherError;
use crate::gate::Gate;
use crate::layer::ShipperLayer;
use crate::metrics::{DispatcherMetrics, MetricsSnapshot};
use crate::queue::{self, EventQueue};
use crate::sequencer;
use crate::sinks::{create_sink, AnySink};

/// Producer-facing entry point
///
/// Cheap to clone and usable from any thread; never blocks.
#[derive(Debug, Clone)]
pub struct EventProducer {
    queue: EventQueue,
    metrics: Arc<DispatcherMetrics>,
    target: Arc<StreamTarget>,
}

impl EventProducer {
    pub(crate) fn new(
        queue: EventQueue,
        metrics: Arc<DispatcherMetrics>,
        target: Arc<StreamTarget>,
    ) -> Self {
        Self {
            queue,
            metrics,
            target,
        }
    }

    /// Format `record`, stamp it with the current time and enqueue it
    ///
    /// A full queue is not an error: the event is dropped and `Ok` returned.
    ///
    /// # Errors
    /// `Formatting` if the record's `Display` impl fails; nothing is enqueued
    pub fn fire(&self, record: impl fmt::Display) -> Result<(), DispatcherError> {
        self.fire_at(record, Utc::now().timestamp_millis())
    }

    /// Like [`fire`](Self::fire) with an explicit timestamp (ms since epoch)
    pub fn fire_at(
        &self,
        record: impl fmt::Display,
        timestamp: i64,
    ) -> Result<(), DispatcherError> {
        let mut message = String::new();
        if let Err(e) = write!(message, "{record}") {
            self.metrics.inc_formatting_failure_count();
            observability::record_formatting_failure();
            return Err(DispatcherError::Formatting(e));
        }
        self.fire_event(LogEvent::new(message, timestamp));
        Ok(())
    }

    /// Enqueue a ready-made event
    ///
    /// Returns true if queued, false if dropped (queue full)
    pub fn fire_event(&self, event: LogEvent) -> bool {
        if self.queue.try_push(event) {
            self.metrics.inc_enqueued_count();
            observability::record_event_enqueued(&self.target.group, &self.target.stream);
            true
        } else {
            self.metrics.inc_dropped_count();
            observability::record_event_dropped(&self.target.group, &self.target.stream);
            trace!(
                group = %self.target.group,
                stream = %self.target.stream,
                capacity = self.queue.capacity(),
                "Queue full, event dropped"
            );
            false
        }
    }

    /// Events waiting in the queue (not yet in the pending batch)
    pub fn queued(&self) -> usize {
        self.queue.len()
    }
}

/// Handle to a running shipper
///
/// Dropping it without calling [`shutdown`](Self::shutdown) leaves the worker
/// running in the background for the lifetime of the runtime.
pub struct Shipper {
    target: Arc<StreamTarget>,
    producer: EventProducer,
    gate: Gate,
    metrics: Arc<DispatcherMetrics>,
    max_level: Severity,
    shutdown_tx: oneshot::Sender<()>,
    worker_handle: JoinHandle<()>,
}

impl Shipper {
    /// Initialize the stream on `sink` and spawn the worker
    ///
    /// Shorthand for [`DispatcherBuilder::build`].
    pub async fn start<S: LogStreamSink + Send + 'static>(
        config: ShipperConfig,
        sink: S,
    ) -> Result<Self, DispatcherError> {
        DispatcherBuilder::new(config, sink).build().await
    }

    pub fn target(&self) -> &StreamTarget {
        &self.target
    }

    /// A producer for call sites that outlive borrowing the shipper
    pub fn producer(&self) -> EventProducer {
        self.producer.clone()
    }

    /// See [`EventProducer::fire`]
    pub fn fire(&self, record: impl fmt::Display) -> Result<(), DispatcherError> {
        self.producer.fire(record)
    }

    /// A tracing layer forwarding events up to the configured `max_level`
    pub fn layer(&self) -> ShipperLayer {
        ShipperLayer::new(self.producer(), self.max_level)
    }

    /// Stop forwarding; events keep accumulating
    pub fn pause(&self) {
        self.gate.pause();
    }

    /// Resume forwarding; the next tick flushes everything accumulated
    pub fn resume(&self) {
        self.gate.resume();
    }

    pub fn is_sending_enabled(&self) -> bool {
        self.gate.is_open()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Stop the worker after one final flush attempt
    #[instrument(
        name = "shipper_shutdown",
        skip(self),
        fields(group = %self.target.group, stream = %self.target.stream)
    )]
    pub async fn shutdown(self) {
        // A closed receiver means the worker already exited
        let _ = self.shutdown_tx.send(());
        if let Err(e) = self.worker_handle.await {
            error!(error = ?e, "Dispatcher task panicked");
        }
        debug!("Shipper shutdown complete");
    }
}

/// Builder: initialize the stream, then spawn the worker
pub struct DispatcherBuilder<S> {
    config: ShipperConfig,
    sink: S,
}

impl<S: LogStreamSink + Send + 'static> DispatcherBuilder<S> {
    pub fn new(config: ShipperConfig, sink: S) -> Self {
        Self { config, sink }
    }

    /// Build and start the shipper
    ///
    /// # Errors
    /// `Contract` if `queue_capacity` is out of range, `Initialization` if the
    /// stream cannot be discovered or created; no worker is spawned in either
    /// case
    #[instrument(
        name = "dispatcher_builder_build",
        skip(self),
        fields(group = %self.config.group_id, stream = %self.config.stream_id)
    )]
    pub async fn build(mut self) -> Result<Shipper, DispatcherError> {
        let capacity = self.config.queue_capacity;
        if !(1..=MAX_QUEUE_CAPACITY).contains(&capacity) {
            return Err(ContractError::config_validation(
                "queue_capacity",
                format!("{capacity} is outside 1..={MAX_QUEUE_CAPACITY}"),
            )
            .into());
        }

        let target = self.config.target();
        let sequencer = sequencer::initialize(&mut self.sink, &target).await?;

        let (queue, rx) = queue::bounded(self.config.queue_capacity);
        let gate = Gate::new(self.config.start_enabled);
        let metrics = Arc::new(DispatcherMetrics::new());
        let target = Arc::new(target);
        let producer = EventProducer::new(queue, Arc::clone(&metrics), Arc::clone(&target));

        let dispatcher = BatchDispatcher::new(
            (*target).clone(),
            self.sink,
            rx,
            sequencer,
            gate.clone(),
            Arc::clone(&metrics),
            DispatcherOptions::from_config(&self.config),
        );

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let worker_handle = tokio::spawn(dispatcher.run(shutdown_rx));

        info!(
            queue_capacity = self.config.queue_capacity,
            sending_enabled = self.config.start_enabled,
            "Shipper started"
        );

        Ok(Shipper {
            target,
            producer,
            gate,
            metrics,
            max_level: self.config.max_level,
            shutdown_tx,
            worker_handle,
        })
    }
}

/// Convenience function to create a shipper from configuration
#[instrument(name = "shipper_create", skip(config), fields(sink_type = ?config.sink.sink_type))]
pub async fn create_shipper(config: &ShipperConfig) -> Result<Shipper, DispatcherError> {
    let sink = create_sink(&config.sink)?;
    // An in-process service has nothing provisioned out of band
    if let AnySink::Memory(memory) = &sink {
        memory.create_group(&config.group_id);
    }
    DispatcherBuilder::new(config.clone(), sink).build().await
}
