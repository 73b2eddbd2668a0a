//! Per-device poll scheduling.
//!
//! One tokio task per device session. Each task sleeps until the session's
//! next-due instant, runs exactly one poll cycle to completion, and
//! recomputes next-due from the poll interval plus the backoff term on
//! failure. Devices never share timers: one device's backoff or timeout
//! cannot delay another device's due poll.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info};

use solarlog_common::{BackoffPolicy, Reading};

use crate::session::{DeviceSession, SessionState};

/// Final per-device state, reported after shutdown.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub name: String,
    pub state: SessionState,
    pub consecutive_failures: u32,
    pub readings: u64,
    pub last_error: Option<String>,
}

/// Owns the device sessions and drives their poll cadences.
pub struct Scheduler {
    sessions: Vec<(DeviceSession, std::time::Duration)>,
    backoff: BackoffPolicy,
}

impl Scheduler {
    pub fn new(backoff: BackoffPolicy) -> Self {
        Self {
            sessions: Vec::new(),
            backoff,
        }
    }

    /// Add a session polled on the given interval.
    pub fn add_session(&mut self, session: DeviceSession, interval: std::time::Duration) {
        self.sessions.push((session, interval));
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Run all sessions until shutdown is signalled.
    ///
    /// Readings flow into `tx`. When `shutdown` flips to true, no new poll
    /// cycles are admitted, in-flight cycles finish at their own timeout
    /// boundary, every session is disconnected, and the final summaries
    /// are returned.
    pub async fn run(
        self,
        tx: mpsc::Sender<Arc<Reading>>,
        shutdown: watch::Receiver<bool>,
    ) -> Vec<SessionSummary> {
        info!(devices = self.sessions.len(), "scheduler started");

        let mut tasks: Vec<JoinHandle<SessionSummary>> = Vec::with_capacity(self.sessions.len());
        for (session, interval) in self.sessions {
            let tx = tx.clone();
            let shutdown = shutdown.clone();
            let backoff = self.backoff;
            tasks.push(tokio::spawn(poll_loop(
                session, interval, backoff, tx, shutdown,
            )));
        }
        drop(tx);

        let mut summaries = Vec::with_capacity(tasks.len());
        for task in tasks {
            match task.await {
                Ok(summary) => summaries.push(summary),
                Err(e) => error!(error = %e, "poll task panicked"),
            }
        }

        info!("scheduler stopped");
        summaries
    }
}

async fn poll_loop(
    mut session: DeviceSession,
    interval: std::time::Duration,
    backoff: BackoffPolicy,
    tx: mpsc::Sender<Arc<Reading>>,
    mut shutdown: watch::Receiver<bool>,
) -> SessionSummary {
    info!(
        device = %session.name(),
        interval_secs = interval.as_secs(),
        "poller started"
    );

    // First poll fires immediately; the cadence anchors on due instants,
    // not on poll completion, so poll duration does not drift it.
    let mut due = Instant::now();

    loop {
        tokio::select! {
            _ = tokio::time::sleep_until(due) => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }
        }

        if *shutdown.borrow() {
            break;
        }

        let reading = session.poll_cycle().await;

        due += interval;
        if reading.is_none() {
            due += backoff.delay(session.consecutive_failures());
        }
        // After a long outage, resume from now instead of replaying a
        // backlog of missed cycles.
        let now = Instant::now();
        if due < now {
            due = now;
        }

        if let Some(reading) = reading {
            if tx.send(Arc::new(reading)).await.is_err() {
                debug!(device = %session.name(), "dispatcher gone, stopping poller");
                break;
            }
        }
    }

    session.shutdown().await;
    info!(
        device = %session.name(),
        readings = session.readings(),
        failures = session.consecutive_failures(),
        "poller stopped"
    );

    SessionSummary {
        name: session.name().to_string(),
        state: session.state(),
        consecutive_failures: session.consecutive_failures(),
        readings: session.readings(),
        last_error: session.last_error().map(String::from),
    }
}
