//! Shipper metrics
//!
//! Prometheus counters/gauges through the `metrics` facade, plus an
//! in-memory flush aggregator for summaries.

use metrics::{counter, gauge, histogram};

/// Record an event accepted by the queue
pub fn record_event_enqueued(group: &str, stream: &str) {
    counter!(
        "log_shipper_events_enqueued_total",
        "group" => group.to_string(),
        "stream" => stream.to_string()
    )
    .increment(1);
}

/// Record an event dropped because the queue was full
pub fn record_event_dropped(group: &str, stream: &str) {
    counter!(
        "log_shipper_events_dropped_total",
        "group" => group.to_string(),
        "stream" => stream.to_string()
    )
    .increment(1);
}

/// Record a record that could not be formatted
pub fn record_formatting_failure() {
    counter!("log_shipper_formatting_failures_total").increment(1);
}

/// Record a successful append of `events` events
pub fn record_append_success(group: &str, stream: &str, events: usize, latency_ms: f64) {
    counter!(
        "log_shipper_appends_total",
        "group" => group.to_string(),
        "stream" => stream.to_string(),
        "status" => "success"
    )
    .increment(1);
    counter!(
        "log_shipper_events_shipped_total",
        "group" => group.to_string(),
        "stream" => stream.to_string()
    )
    .increment(events as u64);
    histogram!("log_shipper_batch_size").record(events as f64);
    histogram!("log_shipper_append_latency_ms").record(latency_ms);
}

/// Record a failed append; the batch stays pending
pub fn record_append_failure(group: &str, stream: &str, latency_ms: f64) {
    counter!(
        "log_shipper_appends_total",
        "group" => group.to_string(),
        "stream" => stream.to_string(),
        "status" => "failure"
    )
    .increment(1);
    histogram!("log_shipper_append_latency_ms").record(latency_ms);
}

/// Record the size of the pending batch
pub fn record_pending_len(group: &str, stream: &str, len: usize) {
    gauge!(
        "log_shipper_pending_events",
        "group" => group.to_string(),
        "stream" => stream.to_string()
    )
    .set(len as f64);
}

/// Flush statistics aggregator
///
/// Aggregated in memory so the dispatcher can log a summary on shutdown.
#[derive(Debug, Clone, Default)]
pub struct FlushStats {
    /// Successful appends
    pub appended_batches: u64,

    /// Events in successful appends
    pub appended_events: u64,

    /// Failed appends
    pub failed_appends: u64,

    /// Longest run of consecutive failures
    pub longest_failure_streak: u64,

    current_streak: u64,

    /// Append latency (ms)
    pub latency_ms: RunningStats,

    /// Events per successful append
    pub batch_size: RunningStats,
}

impl FlushStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&mut self, events: usize, latency_ms: f64) {
        self.appended_batches += 1;
        self.appended_events += events as u64;
        self.current_streak = 0;
        self.latency_ms.push(latency_ms);
        self.batch_size.push(events as f64);
    }

    pub fn record_failure(&mut self, latency_ms: f64) {
        self.failed_appends += 1;
        self.current_streak += 1;
        self.longest_failure_streak = self.longest_failure_streak.max(self.current_streak);
        self.latency_ms.push(latency_ms);
    }

    /// Consecutive failures since the last success
    pub fn current_failure_streak(&self) -> u64 {
        self.current_streak
    }

    pub fn summary(&self) -> FlushSummary {
        let attempts = self.appended_batches + self.failed_appends;
        FlushSummary {
            appended_batches: self.appended_batches,
            appended_events: self.appended_events,
            failed_appends: self.failed_appends,
            failure_rate: if attempts > 0 {
                self.failed_appends as f64 / attempts as f64 * 100.0
            } else {
                0.0
            },
            longest_failure_streak: self.longest_failure_streak,
            latency_ms: StatsSummary::from(&self.latency_ms),
            batch_size: StatsSummary::from(&self.batch_size),
        }
    }
}

/// Flush summary
#[derive(Debug, Clone, Default)]
pub struct FlushSummary {
    pub appended_batches: u64,
    pub appended_events: u64,
    pub failed_appends: u64,
    pub failure_rate: f64,
    pub longest_failure_streak: u64,
    pub latency_ms: StatsSummary,
    pub batch_size: StatsSummary,
}

impl std::fmt::Display for FlushSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Flush Summary ===")?;
        writeln!(
            f,
            "Appended: {} batches, {} events",
            self.appended_batches, self.appended_events
        )?;
        writeln!(
            f,
            "Failed appends: {} ({:.2}%)",
            self.failed_appends, self.failure_rate
        )?;
        writeln!(f, "Longest failure streak: {}", self.longest_failure_streak)?;
        writeln!(f, "Append latency (ms): {}", self.latency_ms)?;
        writeln!(f, "Batch size: {}", self.batch_size)?;
        Ok(())
    }
}

/// Summary statistics
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online statistics (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
