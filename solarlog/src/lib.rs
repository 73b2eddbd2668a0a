//! Solar-fleet Modbus datalogger.
//!
//! Polls a fleet of field devices (inverters, power meters, meteorology
//! sensors) over Modbus TCP/RTU on independent per-device cadences,
//! normalizes each snapshot into a [`solarlog_common::Reading`], and fans
//! readings out to independent sinks (JSON-lines file, MQTT broker, TCP
//! log collector).
//!
//! Failure of any one device or sink degrades only that data path: device
//! failures drive per-session backoff, sink failures drive per-sink
//! backoff, and neither stalls the scheduler or its neighbors.

pub mod app;
pub mod config;
pub mod dispatcher;
pub mod scheduler;
pub mod session;
pub mod sinks;

pub use app::{App, RunOptions};
pub use config::AppConfig;
