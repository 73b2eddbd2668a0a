//! Data destinations.
//!
//! All sink implementations live behind the [`Sink`] trait. A sink owns
//! its connection state exclusively; the dispatcher's per-sink worker is
//! the only caller, so publishes are naturally serialized per sink.

pub mod collector;
pub mod file;
pub mod mqtt;

use async_trait::async_trait;

use solarlog_common::Reading;

pub use collector::CollectorSink;
pub use file::FileSink;
pub use mqtt::MqttSink;

/// Error type for publish operations.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// Recoverable (network drop, broker unreachable); drives backoff and
    /// retry on the next reading.
    #[error("transient sink failure: {0}")]
    Transient(String),
    /// Operator-visible (malformed destination, auth rejected); the sink
    /// is marked unavailable and skipped.
    #[error("permanent sink failure: {0}")]
    Permanent(String),
}

/// Contract every data destination implements.
#[async_trait]
pub trait Sink: Send {
    /// Sink name, used for logging and reports.
    fn name(&self) -> &str;

    /// Deliver one reading. At-most-once: a failed reading is not
    /// replayed.
    async fn publish(&mut self, reading: &Reading) -> Result<(), SinkError>;

    /// Release resources on shutdown. Best-effort.
    async fn close(&mut self) {}
}
