//! Device session state machine.
//!
//! One session wraps one configured device and its driver, and tracks the
//! connection lifecycle and failure counters across poll cycles. There is
//! no terminal failure state: a device that keeps failing keeps being
//! retried with capped backoff, so a device that comes back online is
//! rediscovered without a restart.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use solarlog_common::Reading;
use solarlog_drivers::Driver;

/// Lifecycle state of a device session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No live connection.
    Disconnected,
    /// Transport establishment in progress.
    Connecting,
    /// Live connection, idle between polls.
    Connected,
    /// Protocol exchange in progress.
    Polling,
    /// Recent consecutive failures; still schedulable with backoff.
    Degraded,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::Connected => "connected",
            SessionState::Polling => "polling",
            SessionState::Degraded => "degraded",
        }
    }
}

/// Runtime state for one configured device.
pub struct DeviceSession {
    name: String,
    driver: Box<dyn Driver>,
    state: SessionState,
    consecutive_failures: u32,
    last_success: Option<DateTime<Utc>>,
    last_error: Option<String>,
    readings: u64,
}

impl DeviceSession {
    pub fn new(name: impl Into<String>, driver: Box<dyn Driver>) -> Self {
        Self {
            name: name.into(),
            driver,
            state: SessionState::Disconnected,
            consecutive_failures: 0,
            last_success: None,
            last_error: None,
            readings: 0,
        }
    }

    /// Run one poll cycle to completion: connect if needed, then read.
    ///
    /// Returns a reading on success. On failure the session enters
    /// `Degraded`, the failure counter increments, and (for read failures)
    /// the connection is torn down — the transport state is not trusted
    /// after a failed exchange.
    pub async fn poll_cycle(&mut self) -> Option<Reading> {
        if !self.driver.connected() {
            self.state = SessionState::Connecting;
            if let Err(e) = self.driver.connect().await {
                self.record_failure(e.to_string());
                warn!(
                    device = %self.name,
                    error = %e,
                    failures = self.consecutive_failures,
                    "connect failed"
                );
                return None;
            }
            self.state = SessionState::Connected;
        }

        self.state = SessionState::Polling;
        match self.driver.read().await {
            Ok(fields) => {
                self.state = SessionState::Connected;
                self.consecutive_failures = 0;
                self.last_error = None;
                self.last_success = Some(Utc::now());
                self.readings += 1;
                debug!(device = %self.name, fields = fields.len(), "poll complete");
                Some(Reading::new(self.name.clone(), fields))
            }
            Err(e) => {
                self.driver.disconnect().await;
                self.record_failure(e.to_string());
                warn!(
                    device = %self.name,
                    error = %e,
                    timeout = e.is_timeout(),
                    failures = self.consecutive_failures,
                    "poll failed, connection torn down"
                );
                None
            }
        }
    }

    fn record_failure(&mut self, error: String) {
        self.state = SessionState::Degraded;
        self.consecutive_failures += 1;
        self.last_error = Some(error);
    }

    /// Release the connection unconditionally and leave the terminal
    /// `Disconnected` state. Invoked on every shutdown path.
    pub async fn shutdown(&mut self) {
        self.driver.disconnect().await;
        self.state = SessionState::Disconnected;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn last_success(&self) -> Option<DateTime<Utc>> {
        self.last_success
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn readings(&self) -> u64 {
        self.readings
    }
}
