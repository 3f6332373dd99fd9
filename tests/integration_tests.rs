//! Integration tests for the event logger
//!
//! These tests verify:
//! - Log injection prevention
//! - Enriched fan-out to file and broker sinks
//! - Key derivation failures and client errors reported out of band
//! - Layered configuration (file, environment, severity)
//! - Thread safety of identifier generation

use async_trait::async_trait;
use parking_lot::Mutex;
use rust_event_logger::config::{
    AckPolicy, Compression, ConfigFile, ConfigResolver, ConfigStage, ConsoleTarget, IdStrategy,
    KeyStrategy, LogBackend, LoggerConfig, OutputFormat, PartitionStrategy, ProducerConfig,
    ResolveMode,
};
use rust_event_logger::core::{
    Appender, BrokerClient, DeliveryPolicy, EnrichedRecord, LogContext, LogLevel, Logger,
    LoggerError, Result, SinkDescriptor,
};
use std::collections::HashSet;
use std::fs;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

#[derive(Default)]
struct RecordingClient {
    published: Mutex<Vec<(String, Vec<u8>, String)>>,
    policies: Mutex<Vec<DeliveryPolicy>>,
    reject_all: bool,
}

#[async_trait]
impl BrokerClient for RecordingClient {
    async fn publish(
        &self,
        topic: &str,
        key: &[u8],
        value: &[u8],
        policy: &DeliveryPolicy,
    ) -> Result<()> {
        self.policies.lock().push(policy.clone());
        if self.reject_all {
            return Err(LoggerError::broker(topic, "leader not available"));
        }
        self.published.lock().push((
            topic.to_string(),
            key.to_vec(),
            String::from_utf8_lossy(value).to_string(),
        ));
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

#[derive(Clone, Default)]
struct MemoryAppender {
    lines: Arc<Mutex<Vec<String>>>,
}

impl Appender for MemoryAppender {
    fn append(&self, line: &str, _level: LogLevel) -> Result<()> {
        self.lines.lock().push(line.to_string());
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

fn broker_config(file: &std::path::Path) -> LoggerConfig {
    LoggerConfig {
        enable_broker: true,
        file_location: file.to_path_buf(),
        producer: ProducerConfig {
            topic: "audit".to_string(),
            key_name: "billing".to_string(),
            flush_interval: Duration::from_millis(20),
            ..Default::default()
        },
        ..Default::default()
    }
}

#[test]
fn test_log_injection_prevention() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let log_file = temp_dir.path().join("injection_test.log");

    let config = LoggerConfig {
        file_format: OutputFormat::Text,
        file_location: log_file.clone(),
        ..Default::default()
    };
    let logger = Logger::builder().config(config).build().expect("Failed to build");

    let malicious_message = "User login\nERROR [2024-10-17] Fake error injected\nINFO Continuation";
    logger.info(malicious_message);
    logger.flush().expect("Failed to flush");

    let content = fs::read_to_string(&log_file).expect("Failed to read log file");
    assert!(content.contains("\\n"));
    assert!(!content.contains("\nERROR [2024-10-17] Fake error injected\n"));

    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 1, "Log should be a single line, not multiple");
}

#[test]
fn test_enriched_fan_out_to_file_and_broker() {
    let temp_dir = TempDir::new().unwrap();
    let log_file = temp_dir.path().join("events.log");
    let client = Arc::new(RecordingClient::default());

    let logger = Logger::builder()
        .config(broker_config(&log_file))
        .broker_client(client.clone())
        .build()
        .unwrap();
    assert_eq!(logger.sink_names(), vec!["file", "broker:audit"]);

    logger.log_with_fields(
        LogLevel::Warn,
        "invoice overdue",
        LogContext::new().with_field("invoice", "inv-7").with_field("days", 12),
    );
    logger.flush().unwrap();

    // File sink: plain JSON
    let content = fs::read_to_string(&log_file).unwrap();
    let file_line: serde_json::Value = serde_json::from_str(content.trim()).unwrap();
    assert_eq!(file_line["msg"], "invoice overdue");
    assert_eq!(file_line["days"], 12);
    assert!(file_line.get("specversion").is_none());

    // Broker sink: envelope keyed by the fixed key name
    let published = client.published.lock();
    assert_eq!(published.len(), 1);
    let (topic, key, value) = &published[0];
    assert_eq!(topic, "audit");
    assert_eq!(key.as_slice(), b"billing");

    let event = EnrichedRecord::from_json(value).unwrap();
    assert_eq!(event.record.level, LogLevel::Warn);
    assert_eq!(event.source, "urn:rust-event-logger:logger");
    assert_eq!(event.spec_version, "1.0");
    assert_eq!(event.subject.as_deref(), Some("warn"));
    assert_eq!(event.record.fields.get("invoice").and_then(|v| v.as_str()), Some("inv-7"));
    assert_eq!(logger.metrics().broker_published(), 1);
}

#[test]
fn test_missing_extracted_key_is_reported_not_raised() {
    let temp_dir = TempDir::new().unwrap();
    let log_file = temp_dir.path().join("events.log");
    let client = Arc::new(RecordingClient::default());

    let mut config = broker_config(&log_file);
    config.producer.key = KeyStrategy::Extracted;
    config.producer.key_name = "tenant".to_string();

    let logger = Logger::builder()
        .config(config)
        .broker_client(client.clone())
        .build()
        .unwrap();

    logger.info("no tenant here");
    logger.log_with_fields(
        LogLevel::Info,
        "tenant known",
        LogContext::new().with_field("tenant", "acme"),
    );
    logger.flush().unwrap();

    let errors = logger.broker_errors().unwrap();
    let error = errors.try_recv().unwrap();
    assert!(error.key.is_none());
    assert!(matches!(error.error, LoggerError::MissingField { .. }));
    assert!(errors.try_recv().is_err());

    let published = client.published.lock();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].1.as_slice(), b"acme");

    // The file sink still got both records
    assert_eq!(fs::read_to_string(&log_file).unwrap().lines().count(), 2);
    assert_eq!(logger.metrics().key_failures(), 1);
}

#[test]
fn test_client_errors_surface_out_of_band() {
    let temp_dir = TempDir::new().unwrap();
    let client = Arc::new(RecordingClient {
        reject_all: true,
        ..Default::default()
    });

    let logger = Logger::builder()
        .config(broker_config(&temp_dir.path().join("events.log")))
        .broker_client(client)
        .build()
        .unwrap();

    logger.error("payment failed");
    // The broker accepted the enqueue, so flushing succeeds
    logger.flush().unwrap();

    let error = logger
        .broker_errors()
        .unwrap()
        .recv_timeout(Duration::from_secs(1))
        .unwrap();
    assert_eq!(error.topic, "audit");
    assert_eq!(error.key.as_deref(), Some(b"billing".as_slice()));
    assert!(error.to_string().contains("leader not available"));
    assert_eq!(logger.metrics().broker_errors(), 1);
}

#[test]
fn test_resolve_file_then_env() {
    let file = ConfigFile::parse(
        "evlog_config.toml",
        r#"
            level = "debug"
            enable_broker = true
            enable_file = false

            [producer]
            brokers = ["kafka-1:9092", "kafka-2:9092"]
            topic = "from-file"
            key = "level"

            [enrichment]
            id_strategy = "uuid"
        "#,
    )
    .unwrap();

    let resolution = ConfigResolver::new(ResolveMode::Both)
        .with_config_file(file)
        .with_env_vars([("EVLOG_PRODUCER_TOPIC", "from-env"), ("EVLOG_LEVEL", "info")])
        .resolve()
        .unwrap();
    let config = resolution.config;

    assert!(resolution.recovered.is_empty());
    assert_eq!(config.level, LogLevel::Info);
    assert!(config.enable_broker);
    assert_eq!(config.producer.brokers, vec!["kafka-1:9092", "kafka-2:9092"]);
    assert_eq!(config.producer.topic, "from-env");
    assert_eq!(config.producer.key, KeyStrategy::Level);
    assert_eq!(config.enrichment.id_strategy, IdStrategy::Uuid);
}

#[test]
fn test_disabled_feature_failure_is_recoverable() {
    let resolution = ConfigResolver::new(ResolveMode::Env)
        .with_env_vars([("EVLOG_ROTATION_MAX_BACKUPS", "-3")])
        .resolve()
        .unwrap();

    assert_eq!(resolution.recovered.len(), 1);
    assert_eq!(resolution.recovered[0].stage, ConfigStage::Rotation);
    assert!(!resolution.recovered[0].is_fatal());
    assert!(!resolution.config.enable_rotation);

    let err = ConfigResolver::new(ResolveMode::Env)
        .with_env_vars([
            ("EVLOG_ENABLE_ROTATION", "true"),
            ("EVLOG_ROTATION_MAX_BACKUPS", "-3"),
        ])
        .resolve()
        .unwrap_err();
    assert!(err.is_fatal());
    assert_eq!(err.stage, ConfigStage::Rotation);
}

#[test]
fn test_increment_ids_unique_across_threads() {
    let sink = MemoryAppender::default();
    let config = LoggerConfig {
        enable_file: false,
        enrichment: rust_event_logger::config::EnrichmentConfig {
            id_strategy: IdStrategy::Increment,
            ..Default::default()
        },
        ..Default::default()
    };
    let logger = Arc::new(
        Logger::builder()
            .config(config)
            .sink(SinkDescriptor::writer(OutputFormat::Enriched, LogLevel::Debug, sink.clone()))
            .build()
            .unwrap(),
    );

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let logger = Arc::clone(&logger);
            thread::spawn(move || {
                for i in 0..250 {
                    logger.info(format!("thread {} message {}", t, i));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let lines = sink.lines.lock();
    assert_eq!(lines.len(), 2000);
    let ids: HashSet<String> = lines
        .iter()
        .map(|line| EnrichedRecord::from_json(line).unwrap().id)
        .collect();
    assert_eq!(ids.len(), 2000);
}

#[test]
fn test_rotating_file_sink_from_config() {
    let temp_dir = TempDir::new().unwrap();
    let log_file = temp_dir.path().join("rotating.log");
    let config = LoggerConfig {
        enable_rotation: true,
        file_location: log_file.clone(),
        ..Default::default()
    };

    let logger = Logger::builder().config(config).build().unwrap();
    assert_eq!(logger.sink_names(), vec!["rotating_file"]);

    logger.info("first");
    logger.flush().unwrap();
    assert!(fs::read_to_string(&log_file).unwrap().contains("\"msg\":\"first\""));
}

#[tokio::test]
async fn test_logger_usable_inside_async_runtime() {
    let temp_dir = TempDir::new().unwrap();
    let client = Arc::new(RecordingClient::default());

    let logger = Logger::builder()
        .config(broker_config(&temp_dir.path().join("events.log")))
        .broker_client(client.clone())
        .build()
        .unwrap();

    // Publishing never blocks, even from async code
    for i in 0..10 {
        logger.info(format!("async message {}", i));
    }
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(client.published.lock().len(), 10);
}

#[test]
fn test_client_receives_configured_delivery_policy() {
    let temp_dir = TempDir::new().unwrap();
    let client = Arc::new(RecordingClient::default());

    let mut config = broker_config(&temp_dir.path().join("events.log"));
    config.producer.brokers = vec!["kafka-a:9093".to_string()];
    config.producer.partition = PartitionStrategy::Hash;
    config.producer.compression = Compression::Zstd;
    config.producer.acks = AckPolicy::All;
    config.producer.retry_max = 3;

    let logger = Logger::builder()
        .config(config)
        .broker_client(client.clone())
        .build()
        .unwrap();
    logger.info("policy check");
    logger.flush().unwrap();

    let policies = client.policies.lock();
    assert_eq!(policies.len(), 1);
    let policy = &policies[0];
    assert_eq!(policy.brokers, vec!["kafka-a:9093"]);
    assert_eq!(policy.partition, PartitionStrategy::Hash);
    assert_eq!(policy.compression, Compression::Zstd);
    assert_eq!(policy.acks, AckPolicy::All);
    assert_eq!(policy.retry_max, 3);
    assert_eq!(policy.tls, None);
}

#[test]
fn test_disabled_broker_never_publishes() {
    for strategy in KeyStrategy::ALL {
        let client = Arc::new(RecordingClient::default());
        let sink = MemoryAppender::default();
        let config = LoggerConfig {
            enable_file: false,
            enable_broker: false,
            producer: ProducerConfig {
                key: *strategy,
                key_name: String::new(),
                flush_interval: Duration::ZERO,
                ..Default::default()
            },
            ..Default::default()
        };

        let logger = Logger::builder()
            .config(config)
            .broker_client(client.clone())
            .sink(SinkDescriptor::writer(OutputFormat::Json, LogLevel::Debug, sink.clone()))
            .build()
            .unwrap();
        assert!(logger.broker_errors().is_none());
        assert_eq!(logger.sink_names(), vec!["memory"]);

        logger.error("not for the broker");
        logger.flush().unwrap();
        drop(logger);

        assert!(client.published.lock().is_empty(), "{} reached the client", strategy);
        assert!(client.policies.lock().is_empty());
        assert_eq!(sink.lines.lock().len(), 1);
    }
}

fn push(cases: &mut Vec<Vec<(String, String)>>, var: &str, value: &str) {
    cases.push(vec![(var.to_string(), value.to_string())]);
}

/// Every accepted spelling of every enumerated field, one at a time
fn every_enumerated_value() -> Vec<Vec<(String, String)>> {
    let mut cases = Vec::new();

    for level in LogLevel::ALL {
        for var in ["EVLOG_LEVEL", "EVLOG_BROKER_LEVEL", "EVLOG_CONSOLE_LEVEL", "EVLOG_FILE_LEVEL"] {
            push(&mut cases, var, level.as_str());
        }
    }
    for format in OutputFormat::ALL {
        for var in ["EVLOG_BROKER_FORMAT", "EVLOG_CONSOLE_FORMAT", "EVLOG_FILE_FORMAT"] {
            push(&mut cases, var, format.as_str());
        }
    }
    for backend in LogBackend::ALL {
        if *backend != LogBackend::Facade || cfg!(feature = "log-facade") {
            push(&mut cases, "EVLOG_BACKEND", backend.as_str());
        }
    }
    for target in ConsoleTarget::ALL {
        push(&mut cases, "EVLOG_CONSOLE_TARGET", target.as_str());
    }
    for partition in PartitionStrategy::ALL {
        push(&mut cases, "EVLOG_PRODUCER_PARTITION", partition.as_str());
    }
    for key in KeyStrategy::ALL {
        push(&mut cases, "EVLOG_PRODUCER_KEY", key.as_str());
    }
    for compression in Compression::ALL {
        push(&mut cases, "EVLOG_PRODUCER_COMPRESSION", compression.as_str());
    }
    for acks in AckPolicy::ALL {
        push(&mut cases, "EVLOG_PRODUCER_ACKS", acks.as_str());
    }
    for strategy in IdStrategy::ALL {
        push(&mut cases, "EVLOG_ENRICH_ID_STRATEGY", strategy.as_str());
        cases.push(vec![
            ("EVLOG_ENRICH_ID_STRATEGY".to_string(), strategy.as_str().to_string()),
            ("EVLOG_PRODUCER_ID_STRATEGY".to_string(), strategy.as_str().to_string()),
        ]);
    }
    cases
}

#[test]
fn test_every_enumerated_value_resolves_without_diagnostics() {
    for mode in ["env", "ENV", "file", "both"] {
        assert!(ConfigResolver::from_mode_str(mode).is_ok(), "mode {}", mode);
    }

    for case in every_enumerated_value() {
        let label = format!("{:?}", case);
        // Every feature on, so any diagnostic would be fatal
        let mut vars = vec![
            ("EVLOG_ENABLE_BROKER".to_string(), "true".to_string()),
            ("EVLOG_ENABLE_CONSOLE".to_string(), "true".to_string()),
            ("EVLOG_ENABLE_ROTATION".to_string(), "true".to_string()),
        ];
        vars.extend(case);

        let resolution = ConfigResolver::new(ResolveMode::Env)
            .with_env_vars(vars)
            .resolve()
            .unwrap_or_else(|e| panic!("{} rejected: {}", label, e));
        assert!(resolution.recovered.is_empty(), "{} recovered failures", label);
    }
}
