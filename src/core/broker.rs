//! Fire-and-forget broker sink
//!
//! Callers only ever enqueue. A dedicated worker thread owns a
//! current-thread tokio runtime, batches queued messages and hands them to
//! the [`BrokerClient`] once the flush interval has elapsed since the first
//! queued message.

use super::broker_client::{BrokerClient, DeliveryPolicy};
use super::error::{LoggerError, Result};
use super::key_deriver::KeyDeriver;
use super::log_record::LogRecord;
use super::metrics::LoggerMetrics;
use crate::config::ProducerConfig;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Default shutdown timeout for draining the broker queue (5 seconds)
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Largest batch handed to the client in one go
const MAX_BATCH_SIZE: usize = 256;

/// Unread broker errors kept for the application
const ERROR_CHANNEL_CAPACITY: usize = 1024;

/// A message that could not be published, reported out of band
#[derive(Debug, thiserror::Error)]
#[error("broker error on topic '{topic}': {error}")]
pub struct BrokerError {
    pub topic: String,
    /// Absent when the key itself could not be derived
    pub key: Option<Vec<u8>>,
    #[source]
    pub error: LoggerError,
}

/// What became of one published record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Publish {
    Queued,
    /// Dropped and already reported on the error channel
    Abandoned,
}

struct Message {
    key: Vec<u8>,
    value: Vec<u8>,
}

enum Command {
    Publish(Message),
    Flush(Sender<()>),
}

/// Print and keep the error; new errors are dropped once the channel is full
fn report(errors: &Sender<BrokerError>, error: BrokerError) {
    eprintln!("[LOGGER ERROR] {}", error);
    let _ = errors.try_send(error);
}

pub struct BrokerSink {
    topic: String,
    keys: KeyDeriver,
    capacity: usize,
    sender: Option<Sender<Command>>,
    worker: Option<thread::JoinHandle<()>>,
    errors_tx: Sender<BrokerError>,
    errors_rx: Receiver<BrokerError>,
    metrics: Arc<LoggerMetrics>,
    client_name: String,
}

impl BrokerSink {
    pub fn new(
        config: &ProducerConfig,
        client: Arc<dyn BrokerClient>,
        metrics: Arc<LoggerMetrics>,
    ) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| {
                LoggerError::io_operation("starting broker runtime", "cannot build tokio runtime", e)
            })?;

        let (sender, receiver) = bounded(config.queue_capacity);
        let (errors_tx, errors_rx) = bounded(ERROR_CHANNEL_CAPACITY);
        let client_name = client.name().to_string();

        let worker = Worker {
            topic: config.topic.clone(),
            policy: DeliveryPolicy::from_config(config),
            flush_interval: config.flush_interval,
            client,
            receiver,
            errors: errors_tx.clone(),
            metrics: Arc::clone(&metrics),
        };
        let handle = thread::Builder::new()
            .name("evlog-broker".to_string())
            .spawn(move || worker.run(runtime))
            .map_err(|e| {
                LoggerError::io_operation("spawning broker worker", "cannot spawn thread", e)
            })?;

        Ok(Self {
            topic: config.topic.clone(),
            keys: KeyDeriver::from_config(config),
            capacity: config.queue_capacity,
            sender: Some(sender),
            worker: Some(handle),
            errors_tx,
            errors_rx,
            metrics,
            client_name,
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn client_name(&self) -> &str {
        &self.client_name
    }

    /// Derive the key and enqueue `encoded`; never blocks.
    ///
    /// A record without a usable key or arriving on a full queue is
    /// abandoned. It is counted and reported on [`errors`](Self::errors)
    /// here, so callers only see [`Publish::Abandoned`].
    pub fn publish(&self, record: &LogRecord, encoded: &str) -> Result<Publish> {
        let sender = self.sender.as_ref().ok_or(LoggerError::LoggerStopped)?;

        let key = match self.keys.derive_key(record) {
            Ok(key) => key,
            Err(e) => {
                self.metrics.record_key_failure();
                report(
                    &self.errors_tx,
                    BrokerError {
                        topic: self.topic.clone(),
                        key: None,
                        error: e,
                    },
                );
                return Ok(Publish::Abandoned);
            }
        };

        let message = Message {
            key,
            value: encoded.as_bytes().to_vec(),
        };
        match sender.try_send(Command::Publish(message)) {
            Ok(()) => Ok(Publish::Queued),
            Err(TrySendError::Full(Command::Publish(message))) => {
                self.metrics.record_broker_dropped();
                report(
                    &self.errors_tx,
                    BrokerError {
                        topic: self.topic.clone(),
                        key: Some(message.key),
                        error: LoggerError::queue_full(sender.len(), self.capacity),
                    },
                );
                Ok(Publish::Abandoned)
            }
            Err(TrySendError::Full(Command::Flush(_))) => Err(LoggerError::ChannelSendError),
            Err(TrySendError::Disconnected(_)) => Err(LoggerError::LoggerStopped),
        }
    }

    /// Hand everything queued so far to the client and wait for it
    pub fn flush(&self, timeout: Duration) -> Result<()> {
        let sender = self.sender.as_ref().ok_or(LoggerError::LoggerStopped)?;
        let deadline = Instant::now() + timeout;

        let (ack_tx, ack_rx) = bounded(1);
        sender
            .send_deadline(Command::Flush(ack_tx), deadline)
            .map_err(|_| LoggerError::FlushTimeout { timeout })?;
        ack_rx
            .recv_deadline(deadline)
            .map_err(|_| LoggerError::FlushTimeout { timeout })
    }

    /// Out-of-band channel of publish failures
    pub fn errors(&self) -> Receiver<BrokerError> {
        self.errors_rx.clone()
    }

    /// Messages currently waiting for the worker
    pub fn queued(&self) -> usize {
        self.sender.as_ref().map_or(0, Sender::len)
    }
}

impl Drop for BrokerSink {
    fn drop(&mut self) {
        // Closing the channel lets the worker drain and exit
        drop(self.sender.take());

        if let Some(handle) = self.worker.take() {
            let start = Instant::now();
            let timeout = DEFAULT_SHUTDOWN_TIMEOUT;

            loop {
                if handle.is_finished() {
                    if let Err(e) = handle.join() {
                        eprintln!(
                            "[LOGGER ERROR] Broker worker thread panicked during shutdown: {:?}",
                            e
                        );
                    }
                    break;
                }

                if start.elapsed() >= timeout {
                    eprintln!(
                        "[LOGGER WARNING] Broker worker did not finish within {:?} timeout. \
                         Some events may be lost.",
                        timeout
                    );
                    break;
                }

                thread::sleep(Duration::from_millis(10));
            }
        }

        let dropped = self.metrics.broker_dropped();
        if dropped > 0 {
            eprintln!(
                "[LOGGER WARNING] Broker sink '{}' shutting down with {} dropped events (drop rate: {:.2}%)",
                self.topic,
                dropped,
                self.metrics.broker_drop_rate()
            );
        }
    }
}

struct Worker {
    topic: String,
    policy: DeliveryPolicy,
    flush_interval: Duration,
    client: Arc<dyn BrokerClient>,
    receiver: Receiver<Command>,
    errors: Sender<BrokerError>,
    metrics: Arc<LoggerMetrics>,
}

impl Worker {
    fn run(self, runtime: tokio::runtime::Runtime) {
        let mut batch: Vec<Message> = Vec::with_capacity(MAX_BATCH_SIZE);
        // Set when the first message of a batch arrives
        let mut deadline: Option<Instant> = None;

        loop {
            let command = match deadline {
                None => match self.receiver.recv() {
                    Ok(command) => command,
                    Err(_) => break,
                },
                Some(at) => match self.receiver.recv_deadline(at) {
                    Ok(command) => command,
                    Err(RecvTimeoutError::Timeout) => {
                        self.deliver(&runtime, &mut batch);
                        deadline = None;
                        continue;
                    }
                    Err(RecvTimeoutError::Disconnected) => break,
                },
            };

            match command {
                Command::Publish(message) => {
                    batch.push(message);
                    if self.flush_interval.is_zero() || batch.len() >= MAX_BATCH_SIZE {
                        self.deliver(&runtime, &mut batch);
                        deadline = None;
                    } else if deadline.is_none() {
                        deadline = Some(Instant::now() + self.flush_interval);
                    }
                }
                Command::Flush(ack) => {
                    self.deliver(&runtime, &mut batch);
                    deadline = None;
                    self.flush_client(&runtime);
                    let _ = ack.send(());
                }
            }
        }

        // Channel closed: whatever is left goes out before exit
        self.deliver(&runtime, &mut batch);
        self.flush_client(&runtime);
    }

    /// Publish in queue order; a panicking client only loses its own message
    fn deliver(&self, runtime: &tokio::runtime::Runtime, batch: &mut Vec<Message>) {
        for message in batch.drain(..) {
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                runtime.block_on(self.client.publish(
                    &self.topic,
                    &message.key,
                    &message.value,
                    &self.policy,
                ))
            }));

            match outcome {
                Ok(Ok(())) => {
                    self.metrics.record_broker_published();
                }
                Ok(Err(e)) => {
                    self.metrics.record_broker_error();
                    report(
                        &self.errors,
                        BrokerError {
                            topic: self.topic.clone(),
                            key: Some(message.key),
                            error: e,
                        },
                    );
                }
                Err(panic_err) => {
                    self.metrics.record_broker_error();
                    eprintln!(
                        "[LOGGER CRITICAL] Broker client '{}' panicked: {:?}",
                        self.client.name(),
                        panic_err
                    );
                }
            }
        }
    }

    fn flush_client(&self, runtime: &tokio::runtime::Runtime) {
        let outcome = catch_unwind(AssertUnwindSafe(|| runtime.block_on(self.client.flush())));
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => report(
                &self.errors,
                BrokerError {
                    topic: self.topic.clone(),
                    key: None,
                    error: e,
                },
            ),
            Err(panic_err) => eprintln!(
                "[LOGGER CRITICAL] Broker client '{}' panicked during flush: {:?}",
                self.client.name(),
                panic_err
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KeyStrategy;
    use crate::core::log_level::LogLevel;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingClient {
        published: Mutex<Vec<(String, Vec<u8>, String)>>,
        fail_on: Option<String>,
    }

    #[async_trait]
    impl BrokerClient for RecordingClient {
        async fn publish(
            &self,
            topic: &str,
            key: &[u8],
            value: &[u8],
            _policy: &DeliveryPolicy,
        ) -> Result<()> {
            let value = String::from_utf8_lossy(value).to_string();
            if self.fail_on.as_deref() == Some(value.as_str()) {
                return Err(LoggerError::broker(topic, "rejected"));
            }
            self.published
                .lock()
                .push((topic.to_string(), key.to_vec(), value));
            Ok(())
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    /// Blocks every publish until the gate sender is dropped
    struct GatedClient {
        gate: Receiver<()>,
    }

    #[async_trait]
    impl BrokerClient for GatedClient {
        async fn publish(&self, _: &str, _: &[u8], _: &[u8], _: &DeliveryPolicy) -> Result<()> {
            let _ = self.gate.recv();
            Ok(())
        }

        fn name(&self) -> &str {
            "gated"
        }
    }

    fn producer(flush_ms: u64) -> ProducerConfig {
        ProducerConfig {
            topic: "events".to_string(),
            key: KeyStrategy::Level,
            flush_interval: Duration::from_millis(flush_ms),
            ..Default::default()
        }
    }

    fn record(message: &str) -> LogRecord {
        LogRecord::new(LogLevel::Info, message)
    }

    #[test]
    fn test_messages_wait_for_flush_interval() {
        let client = Arc::new(RecordingClient::default());
        let sink = BrokerSink::new(
            &producer(60_000),
            client.clone(),
            Arc::new(LoggerMetrics::new()),
        )
        .unwrap();

        sink.publish(&record("a"), "a").unwrap();
        sink.publish(&record("b"), "b").unwrap();
        thread::sleep(Duration::from_millis(50));
        assert!(client.published.lock().is_empty());

        sink.flush(Duration::from_secs(5)).unwrap();
        let published = client.published.lock().clone();
        assert_eq!(published.len(), 2);
        assert_eq!(published[0], ("events".to_string(), b"info".to_vec(), "a".to_string()));
        assert_eq!(published[1].2, "b");
    }

    #[test]
    fn test_batch_is_delivered_after_interval() {
        let client = Arc::new(RecordingClient::default());
        let sink =
            BrokerSink::new(&producer(20), client.clone(), Arc::new(LoggerMetrics::new())).unwrap();

        sink.publish(&record("late"), "late").unwrap();

        let start = Instant::now();
        while client.published.lock().is_empty() && start.elapsed() < Duration::from_secs(5) {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(client.published.lock().len(), 1);
    }

    #[test]
    fn test_drop_drains_queue() {
        let client = Arc::new(RecordingClient::default());
        let metrics = Arc::new(LoggerMetrics::new());
        {
            let sink = BrokerSink::new(&producer(60_000), client.clone(), metrics.clone()).unwrap();
            for i in 0..10 {
                sink.publish(&record("m"), &format!("m{}", i)).unwrap();
            }
        }
        assert_eq!(client.published.lock().len(), 10);
        assert_eq!(metrics.broker_published(), 10);
    }

    #[test]
    fn test_client_errors_go_out_of_band() {
        let client = Arc::new(RecordingClient {
            fail_on: Some("bad".to_string()),
            ..Default::default()
        });
        let metrics = Arc::new(LoggerMetrics::new());
        let sink = BrokerSink::new(&producer(0), client.clone(), metrics.clone()).unwrap();

        assert_eq!(sink.publish(&record("bad"), "bad").unwrap(), Publish::Queued);
        assert_eq!(sink.publish(&record("good"), "good").unwrap(), Publish::Queued);
        sink.flush(Duration::from_secs(5)).unwrap();

        let error = sink.errors().try_recv().unwrap();
        assert_eq!(error.topic, "events");
        assert_eq!(error.key.as_deref(), Some(&b"info"[..]));
        assert_eq!(metrics.broker_errors(), 1);
        assert_eq!(metrics.broker_published(), 1);
    }

    #[test]
    fn test_missing_key_field_abandons_record() {
        let config = ProducerConfig {
            key: KeyStrategy::Extracted,
            key_name: "tenant".to_string(),
            ..producer(0)
        };
        let client = Arc::new(RecordingClient::default());
        let metrics = Arc::new(LoggerMetrics::new());
        let sink = BrokerSink::new(&config, client.clone(), metrics.clone()).unwrap();

        assert_eq!(sink.publish(&record("no tenant"), "x").unwrap(), Publish::Abandoned);
        sink.flush(Duration::from_secs(5)).unwrap();

        assert!(client.published.lock().is_empty());
        assert_eq!(metrics.key_failures(), 1);
        let error = sink.errors().try_recv().unwrap();
        assert!(error.key.is_none());
        assert!(matches!(error.error, LoggerError::MissingField { .. }));
    }

    #[test]
    fn test_full_queue_drops_without_blocking() {
        let (gate_tx, gate_rx) = bounded::<()>(0);
        let config = ProducerConfig {
            queue_capacity: 1,
            ..producer(0)
        };
        let metrics = Arc::new(LoggerMetrics::new());
        let sink =
            BrokerSink::new(&config, Arc::new(GatedClient { gate: gate_rx }), metrics.clone())
                .unwrap();

        let start = Instant::now();
        let outcomes: Vec<_> = (0..3)
            .map(|i| sink.publish(&record("m"), &i.to_string()))
            .collect();
        assert!(start.elapsed() < Duration::from_secs(1));
        assert!(outcomes
            .iter()
            .any(|r| matches!(r, Ok(Publish::Abandoned))));
        assert!(metrics.broker_dropped() >= 1);
        let error = sink.errors().try_recv().unwrap();
        assert!(matches!(error.error, LoggerError::QueueFull { .. }));

        drop(gate_tx);
        drop(sink);
    }
}
