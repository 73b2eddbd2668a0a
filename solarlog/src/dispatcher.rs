//! Reading fan-out to sinks.
//!
//! Each sink runs behind a [`SinkHandle`]: a bounded queue plus a worker
//! task that owns the sink. Fan-out is a non-blocking `try_send` per sink,
//! so a slow or failing sink can never stall the scheduler or its
//! neighbors, while each sink still sees readings in production order.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use solarlog_common::{BackoffPolicy, Reading};

use crate::sinks::{Sink, SinkError};

/// Per-sink delivery counters, shared between worker and dispatcher.
#[derive(Debug, Default)]
pub struct SinkMetrics {
    delivered: AtomicU64,
    failed: AtomicU64,
    skipped: AtomicU64,
    dropped: AtomicU64,
    unavailable: AtomicBool,
}

impl SinkMetrics {
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn skipped(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn unavailable(&self) -> bool {
        self.unavailable.load(Ordering::Relaxed)
    }
}

/// Final per-sink delivery report, produced at shutdown.
#[derive(Debug, Clone)]
pub struct SinkReport {
    pub name: String,
    pub delivered: u64,
    pub failed: u64,
    pub skipped: u64,
    pub dropped: u64,
    pub unavailable: bool,
}

/// Handle to a running sink worker.
pub struct SinkHandle {
    name: String,
    tx: mpsc::Sender<Arc<Reading>>,
    metrics: Arc<SinkMetrics>,
    worker: JoinHandle<()>,
}

impl SinkHandle {
    /// Spawn the worker task for a sink.
    ///
    /// `failure_ceiling` converts repeated transient failures into
    /// unavailability; used for best-effort sinks that must not be
    /// retried indefinitely.
    pub fn spawn(
        sink: Box<dyn Sink>,
        queue_capacity: usize,
        backoff: BackoffPolicy,
        failure_ceiling: Option<u32>,
    ) -> Self {
        let name = sink.name().to_string();
        let (tx, rx) = mpsc::channel(queue_capacity);
        let metrics = Arc::new(SinkMetrics::default());

        let worker_metrics = Arc::clone(&metrics);
        let worker_name = name.clone();
        let worker = tokio::spawn(async move {
            sink_worker(sink, rx, worker_metrics, backoff, failure_ceiling, worker_name).await;
        });

        Self {
            name,
            tx,
            metrics,
            worker,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metrics(&self) -> &Arc<SinkMetrics> {
        &self.metrics
    }

    /// Hand a reading to the sink without blocking.
    ///
    /// Returns false if the queue is full (reading dropped for this sink).
    pub fn try_send(&self, reading: Arc<Reading>) -> bool {
        match self.tx.try_send(reading) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(r)) => {
                self.metrics.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(sink = %self.name, device = %r.device, "queue full, reading dropped");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                error!(sink = %self.name, "sink worker closed unexpectedly");
                false
            }
        }
    }

    /// Drain the queue, close the sink, and return the final report.
    pub async fn shutdown(self) -> SinkReport {
        drop(self.tx);
        if let Err(e) = self.worker.await {
            error!(sink = %self.name, error = ?e, "sink worker panicked");
        }
        SinkReport {
            name: self.name,
            delivered: self.metrics.delivered(),
            failed: self.metrics.failed(),
            skipped: self.metrics.skipped(),
            dropped: self.metrics.dropped(),
            unavailable: self.metrics.unavailable(),
        }
    }
}

/// Worker loop owning one sink.
///
/// A transient failure starts a backoff window: readings arriving inside
/// the window are skipped, not queued for replay (at-most-once delivery).
/// A permanent failure, or hitting the failure ceiling, marks the sink
/// unavailable for the rest of the run.
async fn sink_worker(
    mut sink: Box<dyn Sink>,
    mut rx: mpsc::Receiver<Arc<Reading>>,
    metrics: Arc<SinkMetrics>,
    backoff: BackoffPolicy,
    failure_ceiling: Option<u32>,
    name: String,
) {
    let mut consecutive_failures: u32 = 0;
    let mut retry_after: Option<Instant> = None;

    while let Some(reading) = rx.recv().await {
        if metrics.unavailable() {
            metrics.skipped.fetch_add(1, Ordering::Relaxed);
            continue;
        }

        if let Some(at) = retry_after {
            if Instant::now() < at {
                metrics.skipped.fetch_add(1, Ordering::Relaxed);
                debug!(sink = %name, device = %reading.device, "backing off, reading skipped");
                continue;
            }
        }

        match sink.publish(&reading).await {
            Ok(()) => {
                consecutive_failures = 0;
                retry_after = None;
                metrics.delivered.fetch_add(1, Ordering::Relaxed);
            }
            Err(SinkError::Transient(msg)) => {
                consecutive_failures += 1;
                metrics.failed.fetch_add(1, Ordering::Relaxed);

                if failure_ceiling.is_some_and(|c| consecutive_failures >= c) {
                    metrics.unavailable.store(true, Ordering::Relaxed);
                    error!(
                        sink = %name,
                        error = %msg,
                        failures = consecutive_failures,
                        "failure ceiling reached, sink unavailable"
                    );
                    continue;
                }

                let delay = backoff.delay(consecutive_failures);
                retry_after = Some(Instant::now() + delay);
                warn!(
                    sink = %name,
                    error = %msg,
                    failures = consecutive_failures,
                    backoff_ms = delay.as_millis() as u64,
                    "publish failed"
                );
            }
            Err(SinkError::Permanent(msg)) => {
                consecutive_failures += 1;
                metrics.failed.fetch_add(1, Ordering::Relaxed);
                metrics.unavailable.store(true, Ordering::Relaxed);
                error!(
                    sink = %name,
                    error = %msg,
                    "permanent failure, sink unavailable until restart"
                );
            }
        }
    }

    sink.close().await;
    debug!(sink = %name, "sink worker stopped");
}

/// Fans each reading out to every configured sink.
pub struct Dispatcher {
    handles: Vec<SinkHandle>,
    rx: mpsc::Receiver<Arc<Reading>>,
    echo: bool,
}

impl Dispatcher {
    /// `echo` prints each record to stdout (console echo mode).
    pub fn new(handles: Vec<SinkHandle>, rx: mpsc::Receiver<Arc<Reading>>, echo: bool) -> Self {
        Self { handles, rx, echo }
    }

    pub fn sink_count(&self) -> usize {
        self.handles.len()
    }

    /// Run until the reading channel closes, then shut the sinks down and
    /// return their final reports.
    pub async fn run(mut self) -> Vec<SinkReport> {
        info!(sinks = self.handles.len(), "dispatcher started");

        while let Some(reading) = self.rx.recv().await {
            if self.echo {
                if let Ok(line) = reading.to_json_line() {
                    println!("{}", line);
                }
            }
            for handle in &self.handles {
                handle.try_send(Arc::clone(&reading));
            }
        }

        let mut reports = Vec::with_capacity(self.handles.len());
        for handle in self.handles {
            reports.push(handle.shutdown().await);
        }

        info!("dispatcher stopped");
        reports
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use solarlog_common::{FieldMap, FieldValue};
    use std::time::Duration;

    struct MockSink {
        name: String,
        mode: Mode,
    }

    enum Mode {
        Ok,
        Transient,
        Permanent,
    }

    #[async_trait]
    impl Sink for MockSink {
        fn name(&self) -> &str {
            &self.name
        }

        async fn publish(&mut self, _reading: &Reading) -> Result<(), SinkError> {
            match self.mode {
                Mode::Ok => Ok(()),
                Mode::Transient => Err(SinkError::Transient("broker unreachable".to_string())),
                Mode::Permanent => Err(SinkError::Permanent("auth rejected".to_string())),
            }
        }
    }

    fn reading() -> Arc<Reading> {
        let mut fields = FieldMap::new();
        fields.insert("voltage".to_string(), FieldValue::Float(230.1));
        Arc::new(Reading::new("inverter01", fields))
    }

    fn policy() -> BackoffPolicy {
        BackoffPolicy {
            base: Duration::from_secs(60),
            multiplier: 2.0,
            ceiling: Duration::from_secs(300),
        }
    }

    #[tokio::test]
    async fn test_handle_delivers_in_order() {
        let sink = MockSink {
            name: "ok".to_string(),
            mode: Mode::Ok,
        };
        let handle = SinkHandle::spawn(Box::new(sink), 10, policy(), None);

        for _ in 0..5 {
            assert!(handle.try_send(reading()));
        }

        let report = handle.shutdown().await;
        assert_eq!(report.delivered, 5);
        assert_eq!(report.failed, 0);
        assert!(!report.unavailable);
    }

    #[tokio::test]
    async fn test_transient_failure_backs_off_and_skips() {
        let sink = MockSink {
            name: "flaky".to_string(),
            mode: Mode::Transient,
        };
        let handle = SinkHandle::spawn(Box::new(sink), 10, policy(), None);

        // First reading fails and opens a long backoff window; the rest
        // land inside it and are skipped without touching the sink.
        for _ in 0..4 {
            handle.try_send(reading());
        }

        let report = handle.shutdown().await;
        assert_eq!(report.delivered, 0);
        assert_eq!(report.failed, 1);
        assert_eq!(report.skipped, 3);
        assert!(!report.unavailable);
    }

    #[tokio::test]
    async fn test_permanent_failure_marks_unavailable() {
        let sink = MockSink {
            name: "broken".to_string(),
            mode: Mode::Permanent,
        };
        let handle = SinkHandle::spawn(Box::new(sink), 10, policy(), None);

        for _ in 0..3 {
            handle.try_send(reading());
        }

        let report = handle.shutdown().await;
        assert_eq!(report.delivered, 0);
        assert_eq!(report.failed, 1);
        assert_eq!(report.skipped, 2);
        assert!(report.unavailable);
    }

    #[tokio::test]
    async fn test_failure_ceiling() {
        // Zero backoff so every reading reaches the sink until the
        // ceiling trips.
        let no_backoff = BackoffPolicy {
            base: Duration::ZERO,
            multiplier: 2.0,
            ceiling: Duration::ZERO,
        };
        let sink = MockSink {
            name: "collector".to_string(),
            mode: Mode::Transient,
        };
        let handle = SinkHandle::spawn(Box::new(sink), 10, no_backoff, Some(3));

        for _ in 0..6 {
            handle.try_send(reading());
        }

        let report = handle.shutdown().await;
        assert_eq!(report.failed, 3);
        assert_eq!(report.skipped, 3);
        assert!(report.unavailable);
    }

    #[tokio::test]
    async fn test_dispatcher_fanout_isolation() {
        let ok = SinkHandle::spawn(
            Box::new(MockSink {
                name: "ok".to_string(),
                mode: Mode::Ok,
            }),
            10,
            policy(),
            None,
        );
        let broken = SinkHandle::spawn(
            Box::new(MockSink {
                name: "broken".to_string(),
                mode: Mode::Permanent,
            }),
            10,
            policy(),
            None,
        );

        let (tx, rx) = mpsc::channel(10);
        let dispatcher = Dispatcher::new(vec![ok, broken], rx, false);
        let task = tokio::spawn(dispatcher.run());

        for _ in 0..5 {
            tx.send(reading()).await.unwrap();
        }
        drop(tx);

        let reports = task.await.unwrap();
        let ok_report = reports.iter().find(|r| r.name == "ok").unwrap();
        let broken_report = reports.iter().find(|r| r.name == "broken").unwrap();

        assert_eq!(ok_report.delivered, 5);
        assert_eq!(broken_report.delivered, 0);
        assert!(broken_report.unavailable);
    }
}
