//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 合约快照测试
//! - 内存 / 文件 sink 的 e2e 测试
//! - tracing 钩子层到日志流的完整链路

#[cfg(test)]
mod contract_tests {
    use contracts::{Severity, ShipperConfig, SinkConfig};

    #[test]
    fn test_config_defaults() {
        let config = ShipperConfig::new("app", "web-1", SinkConfig::memory());
        assert_eq!(config.queue_capacity, 100);
        assert_eq!(config.flush_interval_ms, 200);
        assert!(config.start_enabled);
        assert_eq!(config.max_level, Severity::Debug);
        assert_eq!(config.append_timeout_ms, None);
        assert!(!config.refresh_token_on_conflict);
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::fs;
    use std::sync::Arc;
    use std::time::Duration;

    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{LogEvent, SequenceToken, StreamTarget};
    use dispatcher::{
        create_shipper, initialize, BatchDispatcher, DispatcherBuilder, DispatcherMetrics,
        DispatcherOptions, Gate, MemorySink, Shipper, TickOutcome,
    };
    use tempfile::tempdir;
    use tokio::time::sleep;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::Layer;

    fn messages(events: &[LogEvent]) -> Vec<&str> {
        events.iter().map(|e| e.message.as_str()).collect()
    }

    /// Capacity 3: overflow drop, failed append retained, late arrival behind it
    #[tokio::test]
    async fn test_drop_retry_and_reorder_free_delivery() {
        let sink = MemorySink::new("mem").with_group("app");
        let target = StreamTarget::new("app", "web-1");
        let sequencer = initialize(&mut sink.clone(), &target).await.unwrap();

        let (queue, rx) = dispatcher::queue::bounded(3);
        let mut batcher = BatchDispatcher::new(
            target,
            sink.clone(),
            rx,
            sequencer,
            Gate::default(),
            Arc::new(DispatcherMetrics::new()),
            DispatcherOptions::default(),
        );

        let accepted: Vec<bool> = ["A", "B", "C", "D"]
            .into_iter()
            .map(|m| queue.try_push(LogEvent::new(m, 0)))
            .collect();
        assert_eq!(accepted, vec![true, true, true, false]);

        assert_eq!(batcher.on_tick().await, TickOutcome::Flushed { events: 3 });
        assert_eq!(batcher.current_token(), Some(&SequenceToken::new("1")));

        assert!(queue.try_push(LogEvent::new("E", 1)));
        sink.fail_next_appends(1);
        assert_eq!(batcher.on_tick().await, TickOutcome::Failed { events: 1 });
        assert_eq!(messages(batcher.pending()), vec!["E"]);
        assert_eq!(batcher.current_token(), Some(&SequenceToken::new("1")));

        assert!(queue.try_push(LogEvent::new("F", 2)));
        assert_eq!(batcher.on_tick().await, TickOutcome::Flushed { events: 2 });
        assert_eq!(batcher.current_token(), Some(&SequenceToken::new("2")));
        assert!(batcher.pending().is_empty());

        let stored = sink.stream_events("app", "web-1").unwrap();
        assert_eq!(messages(&stored), vec!["A", "B", "C", "E", "F"]);
    }

    #[tokio::test]
    async fn test_file_shipper_from_toml() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("app")).unwrap();

        let toml = format!(
            r#"
group_id = "app"
stream_id = "web-1"
queue_capacity = 10
flush_interval_ms = 20

[sink]
sink_type = "file"
params = {{ base_path = "{}" }}
"#,
            dir.path().display()
        );
        let config = ConfigLoader::load_from_str(&toml, ConfigFormat::Toml).unwrap();

        let shipper = create_shipper(&config).await.unwrap();
        shipper.fire("first").unwrap();
        shipper.fire(format_args!("second {}", 2)).unwrap();
        shipper.shutdown().await;

        let content = fs::read_to_string(dir.path().join("app/web-1.jsonl")).unwrap();
        let events: Vec<LogEvent> = content
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(messages(&events), vec!["first", "second 2"]);

        let token = fs::read_to_string(dir.path().join("app/web-1.token")).unwrap();
        assert_eq!(token.trim(), "1");
    }

    #[tokio::test]
    async fn test_file_shipper_needs_existing_group() {
        let dir = tempdir().unwrap();
        let config = contracts::ShipperConfig::new(
            "missing",
            "web-1",
            contracts::SinkConfig::file(dir.path().display().to_string()),
        );

        let result = create_shipper(&config).await;
        assert!(matches!(
            result,
            Err(dispatcher::DispatcherError::Initialization { .. })
        ));
    }

    #[tokio::test]
    async fn test_second_run_continues_stream() {
        let sink = MemorySink::new("mem").with_group("app");
        let config = contracts::ShipperConfig::new("app", "web-1", contracts::SinkConfig::memory());

        let first = DispatcherBuilder::new(config.clone(), sink.clone())
            .build()
            .await
            .unwrap();
        first.fire("run 1").unwrap();
        first.shutdown().await;

        let second = Shipper::start(config, sink.clone()).await.unwrap();
        second.fire("run 2").unwrap();
        second.shutdown().await;

        let stored = sink.stream_events("app", "web-1").unwrap();
        assert_eq!(messages(&stored), vec!["run 1", "run 2"]);
        assert_eq!(
            sink.stream_token("app", "web-1"),
            Some(SequenceToken::new("2"))
        );
    }

    #[tokio::test]
    async fn test_tracing_layer_feeds_stream() {
        let sink = MemorySink::new("mem").with_group("app");
        let mut config =
            contracts::ShipperConfig::new("app", "web-1", contracts::SinkConfig::memory());
        config.flush_interval_ms = 20;
        config.max_level = contracts::Severity::Info;

        let shipper = DispatcherBuilder::new(config, sink.clone())
            .build()
            .await
            .unwrap();

        let subscriber = tracing_subscriber::registry().with(shipper.layer());
        let guard = tracing::subscriber::set_default(subscriber);
        tracing::info!(target: "checkout", cart = 7, "Cart submitted");
        tracing::debug!(target: "checkout", "Below max level");
        tracing::warn!(target: "dispatcher::dispatcher", "Own diagnostics");
        drop(guard);

        shipper.shutdown().await;

        let stored = sink.stream_events("app", "web-1").unwrap();
        assert_eq!(stored.len(), 1);
        assert!(stored[0].message.contains("INFO checkout: Cart submitted cart=7"));
    }

    /// Only test in this crate that installs the global subscriber
    #[tokio::test]
    async fn test_observability_init_with_shipper_layer() {
        let sink = MemorySink::new("mem").with_group("app");
        let mut config =
            contracts::ShipperConfig::new("app", "web-1", contracts::SinkConfig::memory());
        config.max_level = contracts::Severity::Info;
        let shipper = Shipper::start(config, sink.clone()).await.unwrap();

        let observability_config = observability::ObservabilityConfig {
            log_format: observability::LogFormat::Compact,
            metrics_port: None,
            default_log_level: "warn".to_string(),
        };
        observability::init_with_layers(observability_config, vec![shipper.layer().boxed()])
            .unwrap();

        tracing::info!(target: "billing", invoice = 311, "Invoice issued");
        shipper.shutdown().await;

        let stored = sink.stream_events("app", "web-1").unwrap();
        assert!(stored
            .iter()
            .any(|e| e.message.contains("INFO billing: Invoice issued invoice=311")));
    }

    #[tokio::test]
    async fn test_pause_holds_until_resume() {
        let sink = MemorySink::new("mem").with_group("app");
        let mut config =
            contracts::ShipperConfig::new("app", "web-1", contracts::SinkConfig::memory());
        config.flush_interval_ms = 20;

        let shipper = DispatcherBuilder::new(config, sink.clone())
            .build()
            .await
            .unwrap();

        shipper.pause();
        shipper.fire("held").unwrap();
        sleep(Duration::from_millis(100)).await;
        assert_eq!(sink.append_calls(), 0);

        shipper.resume();
        sleep(Duration::from_millis(100)).await;
        assert_eq!(sink.append_calls(), 1);

        shipper.shutdown().await;
        let stored = sink.stream_events("app", "web-1").unwrap();
        assert_eq!(messages(&stored), vec!["held"]);
    }
}
