//! Process orchestration.
//!
//! Wires scheduler, dispatcher, and sinks together from validated
//! configuration and owns the run/shutdown lifecycle. No process-wide
//! mutable state: everything lives in the [`App`] and is torn down when
//! the run loop returns.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

use solarlog_common::{ConfigError, Reading};
use solarlog_drivers::DriverRegistry;

use crate::config::AppConfig;
use crate::dispatcher::{Dispatcher, SinkHandle, SinkReport};
use crate::scheduler::{Scheduler, SessionSummary};
use crate::session::DeviceSession;
use crate::sinks::{CollectorSink, FileSink, MqttSink};

/// Command-line toggles applied on top of the configuration file.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Run the full pipeline but suppress the file sink's actual writes.
    pub dry_run: bool,
    /// Echo each record to stdout.
    pub verbose: bool,
    /// Skip the MQTT sink even if configured.
    pub disable_mqtt: bool,
    /// Skip the collector sink even if configured.
    pub disable_collector: bool,
}

/// Final state of a completed run.
#[derive(Debug)]
pub struct RunSummary {
    pub sessions: Vec<SessionSummary>,
    pub sinks: Vec<SinkReport>,
}

/// The wired-up datalogger, ready to run.
pub struct App {
    scheduler: Scheduler,
    dispatcher: Dispatcher,
    reading_tx: mpsc::Sender<Arc<Reading>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl App {
    /// Construct scheduler, sessions, and sinks from configuration.
    ///
    /// Fails fast on validation errors, before anything starts polling.
    pub fn build(config: AppConfig, options: RunOptions) -> Result<Self, ConfigError> {
        let registry = DriverRegistry::builtin();
        config.validate(&registry)?;

        let backoff = config.scheduler.backoff();
        let queue_capacity = config.scheduler.sink_queue_capacity;

        let mut scheduler = Scheduler::new(backoff);
        for device in config.devices.iter().filter(|d| d.enabled) {
            let driver = registry.create(device).ok_or_else(|| {
                ConfigError::Validation(format!(
                    "device '{}': unknown driver type '{}'",
                    device.name, device.driver
                ))
            })?;
            info!(
                device = %device.name,
                driver = %device.driver,
                interval_secs = device.poll_interval_secs,
                "device configured"
            );
            scheduler.add_session(
                DeviceSession::new(device.name.clone(), driver),
                device.poll_interval(),
            );
        }

        let mut handles = Vec::new();
        if let Some(file_config) = &config.sinks.file {
            if options.dry_run {
                info!("dry-run: file sink writes suppressed");
            }
            let sink = FileSink::new(file_config, options.dry_run);
            handles.push(SinkHandle::spawn(Box::new(sink), queue_capacity, backoff, None));
        }
        if let Some(mqtt_config) = &config.sinks.mqtt {
            if options.disable_mqtt {
                info!("mqtt sink disabled on the command line");
            } else {
                let sink = MqttSink::new(mqtt_config);
                handles.push(SinkHandle::spawn(Box::new(sink), queue_capacity, backoff, None));
            }
        }
        if let Some(collector_config) = &config.sinks.collector {
            if options.disable_collector {
                info!("collector sink disabled on the command line");
            } else {
                let sink = CollectorSink::new(collector_config);
                handles.push(SinkHandle::spawn(
                    Box::new(sink),
                    queue_capacity,
                    backoff,
                    Some(collector_config.max_attempts),
                ));
            }
        }

        if handles.is_empty() {
            return Err(ConfigError::Validation(
                "every configured sink is disabled".to_string(),
            ));
        }

        let (reading_tx, reading_rx) = mpsc::channel(queue_capacity);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let dispatcher = Dispatcher::new(handles, reading_rx, options.verbose);

        Ok(Self {
            scheduler,
            dispatcher,
            reading_tx,
            shutdown_tx,
            shutdown_rx,
        })
    }

    /// Run until Ctrl+C.
    pub async fn run(self) -> RunSummary {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Run until the given future resolves, then shut down cleanly:
    /// stop admitting poll cycles, let in-flight polls finish at their
    /// timeout boundary, disconnect every device, drain the sinks.
    pub async fn run_until(self, signal: impl Future<Output = ()>) -> RunSummary {
        let App {
            scheduler,
            dispatcher,
            reading_tx,
            shutdown_tx,
            shutdown_rx,
        } = self;

        info!(
            devices = scheduler.len(),
            sinks = dispatcher.sink_count(),
            "datalogger running"
        );

        let dispatcher_task = tokio::spawn(dispatcher.run());
        let scheduler_task = tokio::spawn(scheduler.run(reading_tx, shutdown_rx));

        signal.await;
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);

        let sessions = match scheduler_task.await {
            Ok(sessions) => sessions,
            Err(e) => {
                error!(error = ?e, "scheduler task failed");
                Vec::new()
            }
        };
        // All reading senders are gone once the scheduler returns, so the
        // dispatcher drains its queues and stops.
        let sinks = match dispatcher_task.await {
            Ok(reports) => reports,
            Err(e) => {
                error!(error = ?e, "dispatcher task failed");
                Vec::new()
            }
        };

        let summary = RunSummary { sessions, sinks };
        log_summary(&summary);
        summary
    }
}

fn log_summary(summary: &RunSummary) {
    for session in &summary.sessions {
        if session.consecutive_failures > 0 {
            warn!(
                device = %session.name,
                state = session.state.as_str(),
                readings = session.readings,
                failures = session.consecutive_failures,
                last_error = session.last_error.as_deref().unwrap_or("-"),
                "device summary"
            );
        } else {
            info!(
                device = %session.name,
                state = session.state.as_str(),
                readings = session.readings,
                "device summary"
            );
        }
    }
    for sink in &summary.sinks {
        info!(
            sink = %sink.name,
            delivered = sink.delivered,
            failed = sink.failed,
            skipped = sink.skipped,
            dropped = sink.dropped,
            unavailable = sink.unavailable,
            "sink summary"
        );
    }
}
