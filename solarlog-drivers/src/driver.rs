//! The driver capability contract.

use std::time::Duration;

use async_trait::async_trait;
use solarlog_common::FieldMap;

/// Error type for driver operations.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// Transport could not be established.
    #[error("connection failed: {0}")]
    Connect(String),
    /// Protocol exchange failed or returned garbled data.
    #[error("read failed: {0}")]
    Read(String),
    /// The device did not answer within its configured timeout.
    /// Treated as a read-class failure by the session state machine.
    #[error("device did not answer within {0:?}")]
    Timeout(Duration),
}

impl DriverError {
    /// Whether this error was a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, DriverError::Timeout(_))
    }
}

/// Capability implemented once per device family.
///
/// A driver owns its transport exclusively; the session that holds the
/// driver is the only caller, so no internal locking is required.
#[async_trait]
pub trait Driver: Send {
    /// Driver type key this instance was created under.
    fn driver_type(&self) -> &str;

    /// Establish the transport (serial port open, TCP socket connect).
    ///
    /// Idempotent: calling on an already-connected driver is a no-op.
    async fn connect(&mut self) -> Result<(), DriverError>;

    /// Retrieve one full snapshot of the device's readable fields,
    /// decoded into native values.
    ///
    /// Fails as a unit: a partial or garbled exchange must not yield a
    /// field map. Must complete within the device's configured timeout.
    async fn read(&mut self) -> Result<FieldMap, DriverError>;

    /// Release the transport. Best-effort, idempotent, never fails.
    async fn disconnect(&mut self);

    /// Whether a live connection is held.
    fn connected(&self) -> bool;
}
