//! ShipperLayer - tracing hook that feeds events into the shipper
//!
//! Every event at or above the configured level is rendered as
//! `<rfc3339> <LEVEL> <target>: <message> key=value ...` and fired into the
//! queue. Events from the shipper's own crates are skipped so the dispatcher's
//! diagnostics never loop back into the stream.

use std::fmt::{self, Write as _};

use chrono::{DateTime, SecondsFormat, Utc};
use contracts::Severity;
use tracing::field::{Field, Visit};
use tracing::{warn, Event, Level, Metadata, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

use crate::handle::EventProducer;

/// Targets never forwarded
const OWN_TARGETS: &[&str] = &["dispatcher", "observability"];

/// Layer forwarding tracing events to a shipper
#[derive(Debug, Clone)]
pub struct ShipperLayer {
    producer: EventProducer,
    max_level: Level,
    excluded_targets: Vec<String>,
}

impl ShipperLayer {
    pub fn new(producer: EventProducer, max_level: Severity) -> Self {
        Self {
            producer,
            max_level: to_level(max_level),
            excluded_targets: OWN_TARGETS.iter().map(|t| t.to_string()).collect(),
        }
    }

    /// Also skip events whose target starts with `prefix`
    ///
    /// Use it for crates the sink itself logs through (HTTP clients etc.).
    pub fn exclude_target(mut self, prefix: impl Into<String>) -> Self {
        self.excluded_targets.push(prefix.into());
        self
    }

    /// Severities this layer forwards
    pub fn levels(&self) -> Vec<Severity> {
        from_level(self.max_level).and_above()
    }

    fn forwards(&self, metadata: &Metadata<'_>) -> bool {
        if *metadata.level() > self.max_level {
            return false;
        }
        let target = metadata.target();
        !self
            .excluded_targets
            .iter()
            .any(|prefix| is_module_prefix(target, prefix))
    }
}

/// `prefix` equals `target` or is a parent module path of it
fn is_module_prefix(target: &str, prefix: &str) -> bool {
    match target.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with("::"),
        None => false,
    }
}

fn to_level(severity: Severity) -> Level {
    match severity {
        Severity::Error => Level::ERROR,
        Severity::Warn => Level::WARN,
        Severity::Info => Level::INFO,
        Severity::Debug => Level::DEBUG,
        Severity::Trace => Level::TRACE,
    }
}

fn from_level(level: Level) -> Severity {
    match level {
        Level::ERROR => Severity::Error,
        Level::WARN => Severity::Warn,
        Level::INFO => Severity::Info,
        Level::DEBUG => Severity::Debug,
        _ => Severity::Trace,
    }
}

impl<S: Subscriber> Layer<S> for ShipperLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if !self.forwards(metadata) {
            return;
        }

        let mut visitor = RecordVisitor::default();
        event.record(&mut visitor);

        let now = Utc::now();
        let record = EventRecord {
            time: now,
            level: *metadata.level(),
            target: metadata.target(),
            visitor,
        };

        if let Err(e) = self.producer.fire_at(&record, now.timestamp_millis()) {
            warn!(target: "dispatcher::layer", error = %e, "Dropping log record");
        }
    }
}

/// Collects the message and fields of one event
#[derive(Default)]
struct RecordVisitor {
    message: String,
    fields: String,
    failed: bool,
}

impl RecordVisitor {
    fn push_field(&mut self, name: &str, value: fmt::Arguments<'_>) {
        if write!(self.fields, " {name}={value}").is_err() {
            self.failed = true;
        }
    }
}

impl Visit for RecordVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            self.push_field(field.name(), format_args!("{value:?}"));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            if write!(self.message, "{value:?}").is_err() {
                self.failed = true;
            }
        } else {
            self.push_field(field.name(), format_args!("{value:?}"));
        }
    }
}

/// One rendered tracing event
struct EventRecord<'a> {
    time: DateTime<Utc>,
    level: Level,
    target: &'a str,
    visitor: RecordVisitor,
}

impl fmt::Display for EventRecord<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.visitor.failed {
            return Err(fmt::Error);
        }
        write!(
            f,
            "{} {:>5} {}: {}{}",
            self.time.to_rfc3339_opts(SecondsFormat::Millis, true),
            self.level,
            self.target,
            self.visitor.message,
            self.visitor.fields
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::DispatcherMetrics;
    use crate::queue::{self, EventReceiver};
    use contracts::{LogEvent, StreamTarget};
    use std::sync::Arc;
    use tracing::{debug, error, info, trace};
    use tracing_subscriber::layer::SubscriberExt;

    struct Unprintable;

    impl fmt::Debug for Unprintable {
        fn fmt(&self, _f: &mut fmt::Formatter<'_>) -> fmt::Result {
            Err(fmt::Error)
        }
    }

    fn layer(max_level: Severity) -> (ShipperLayer, EventReceiver, Arc<DispatcherMetrics>) {
        let (queue, rx) = queue::bounded(16);
        let metrics = Arc::new(DispatcherMetrics::new());
        let producer = EventProducer::new(
            queue,
            Arc::clone(&metrics),
            Arc::new(StreamTarget::new("app", "web-1")),
        );
        (ShipperLayer::new(producer, max_level), rx, metrics)
    }

    fn captured(rx: &mut EventReceiver) -> Vec<LogEvent> {
        let mut out = Vec::new();
        rx.drain_into(&mut out);
        out
    }

    #[test]
    fn test_forwards_formatted_event() {
        let (layer, mut rx, _) = layer(Severity::Debug);
        let subscriber = tracing_subscriber::registry().with(layer);

        tracing::subscriber::with_default(subscriber, || {
            info!(target: "billing", order_id = 42, customer = "acme", "Order settled");
        });

        let events = captured(&mut rx);
        assert_eq!(events.len(), 1);
        let message = &events[0].message;
        assert!(message.contains(" INFO billing: Order settled"), "{message}");
        assert!(message.ends_with(" order_id=42 customer=\"acme\""), "{message}");
        assert!(events[0].timestamp > 0);
    }

    #[test]
    fn test_level_filter() {
        let (layer, mut rx, _) = layer(Severity::Debug);
        let subscriber = tracing_subscriber::registry().with(layer);

        tracing::subscriber::with_default(subscriber, || {
            error!(target: "billing", "kept");
            debug!(target: "billing", "kept too");
            trace!(target: "billing", "too verbose");
        });

        let events = captured(&mut rx);
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn test_own_targets_skipped() {
        let (layer, mut rx, _) = layer(Severity::Trace);
        let layer = layer.exclude_target("hyper");
        let subscriber = tracing_subscriber::registry().with(layer);

        tracing::subscriber::with_default(subscriber, || {
            info!(target: "dispatcher::dispatcher", "internal");
            info!(target: "observability", "internal");
            info!(target: "hyper::proto", "client noise");
            info!(target: "hyperion", "not a child of hyper");
        });

        let events = captured(&mut rx);
        assert_eq!(events.len(), 1);
        assert!(events[0].message.contains("hyperion"));
    }

    #[test]
    fn test_formatting_failure_not_enqueued() {
        let (layer, mut rx, metrics) = layer(Severity::Debug);
        let subscriber = tracing_subscriber::registry().with(layer);

        tracing::subscriber::with_default(subscriber, || {
            info!(target: "billing", broken = ?Unprintable, "Will not render");
        });

        assert!(captured(&mut rx).is_empty());
        assert_eq!(metrics.formatting_failure_count(), 1);
    }

    #[test]
    fn test_levels() {
        let (layer, _rx, _) = layer(Severity::Info);
        assert_eq!(
            layer.levels(),
            vec![Severity::Error, Severity::Warn, Severity::Info]
        );
    }

    #[test]
    fn test_is_module_prefix() {
        assert!(is_module_prefix("dispatcher", "dispatcher"));
        assert!(is_module_prefix("dispatcher::handle", "dispatcher"));
        assert!(!is_module_prefix("dispatcher_ext", "dispatcher"));
    }
}
