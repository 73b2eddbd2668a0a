//! Application configuration schema and validation.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use solarlog_common::{
    BackoffPolicy, ConfigError, ConnectionConfig, DeviceConfig, LoggingConfig, load_config,
};
use solarlog_drivers::DriverRegistry;

/// Complete datalogger configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Devices to poll.
    pub devices: Vec<DeviceConfig>,

    /// Data destinations.
    #[serde(default)]
    pub sinks: SinksConfig,

    /// Scheduler and retry tuning.
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Configured data destinations. Absent sections disable the sink.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SinksConfig {
    /// Append-only JSON-lines file.
    pub file: Option<FileSinkConfig>,

    /// MQTT broker.
    pub mqtt: Option<MqttSinkConfig>,

    /// Centralized log collector.
    pub collector: Option<CollectorSinkConfig>,
}

/// File sink destination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileSinkConfig {
    /// Output file path; one JSON record per line is appended per poll.
    pub path: PathBuf,
}

/// MQTT broker destination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttSinkConfig {
    /// Broker host address.
    pub host: String,

    /// Broker port (default: 1883).
    #[serde(default = "default_mqtt_port")]
    pub port: u16,

    /// Topic prefix; records are published to `<prefix>/<device_name>`.
    #[serde(default = "default_topic_prefix")]
    pub topic_prefix: String,

    /// Client identifier.
    #[serde(default = "default_client_id")]
    pub client_id: String,

    /// Optional credentials.
    pub username: Option<String>,
    pub password: Option<String>,

    /// Keep-alive interval in seconds (default: 15).
    #[serde(default = "default_keepalive_secs")]
    pub keepalive_secs: u64,
}

fn default_mqtt_port() -> u16 {
    1883
}

fn default_topic_prefix() -> String {
    "solarlog".to_string()
}

fn default_client_id() -> String {
    "solarlog".to_string()
}

fn default_keepalive_secs() -> u64 {
    15
}

/// Log collector destination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorSinkConfig {
    /// Collector endpoint, `host:port`.
    pub address: String,

    /// Consecutive failures after which the sink is marked unavailable
    /// (default: 3). Best-effort forwarding must not flood a dead
    /// collector with retries.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_max_attempts() -> u32 {
    3
}

/// Scheduler and retry tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Backoff base delay in milliseconds (default: 1000).
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Backoff growth factor (default: 2.0).
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Backoff ceiling in seconds (default: 300).
    #[serde(default = "default_backoff_ceiling_secs")]
    pub backoff_ceiling_secs: u64,

    /// Per-sink queue capacity (default: 64). A full queue drops the
    /// reading for that sink rather than blocking the pipeline.
    #[serde(default = "default_queue_capacity")]
    pub sink_queue_capacity: usize,
}

fn default_backoff_base_ms() -> u64 {
    1000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_backoff_ceiling_secs() -> u64 {
    300
}

fn default_queue_capacity() -> usize {
    64
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            backoff_base_ms: default_backoff_base_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            backoff_ceiling_secs: default_backoff_ceiling_secs(),
            sink_queue_capacity: default_queue_capacity(),
        }
    }
}

impl SchedulerConfig {
    /// Backoff policy applied to device reconnects and sink retries.
    pub fn backoff(&self) -> BackoffPolicy {
        BackoffPolicy {
            base: std::time::Duration::from_millis(self.backoff_base_ms),
            multiplier: self.backoff_multiplier,
            ceiling: std::time::Duration::from_secs(self.backoff_ceiling_secs),
        }
    }
}

impl AppConfig {
    /// Load configuration from a JSON5 file. Validation happens
    /// separately, once the driver registry exists.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        load_config(path)
    }

    /// Validate the configuration against the driver registry.
    ///
    /// Everything caught here is process-fatal and happens before the
    /// scheduler starts.
    pub fn validate(&self, registry: &DriverRegistry) -> Result<(), ConfigError> {
        let enabled: Vec<_> = self.devices.iter().filter(|d| d.enabled).collect();
        if enabled.is_empty() {
            return Err(ConfigError::Validation(
                "at least one enabled device must be configured".to_string(),
            ));
        }

        let mut names = HashSet::new();
        for device in &self.devices {
            if device.name.is_empty() {
                return Err(ConfigError::Validation(
                    "device name cannot be empty".to_string(),
                ));
            }

            if !names.insert(device.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate device name '{}'",
                    device.name
                )));
            }

            if !registry.contains(&device.driver) {
                return Err(ConfigError::Validation(format!(
                    "device '{}': unknown driver type '{}' (available: {})",
                    device.name,
                    device.driver,
                    registry.types().join(", ")
                )));
            }

            if device.unit_id == 0 {
                return Err(ConfigError::Validation(format!(
                    "device '{}': unit_id must be 1-247",
                    device.name
                )));
            }

            if device.poll_interval_secs == 0 {
                return Err(ConfigError::Validation(format!(
                    "device '{}': poll_interval_secs must be positive",
                    device.name
                )));
            }

            if device.timeout_ms == 0 {
                return Err(ConfigError::Validation(format!(
                    "device '{}': timeout_ms must be positive",
                    device.name
                )));
            }

            if let ConnectionConfig::Rtu { parity, .. } = &device.connection {
                match parity.to_lowercase().as_str() {
                    "none" | "even" | "odd" => {}
                    _ => {
                        return Err(ConfigError::Validation(format!(
                            "device '{}': invalid parity '{}' (use none, even, or odd)",
                            device.name, parity
                        )));
                    }
                }
            }
        }

        if !self.scheduler.backoff_multiplier.is_finite()
            || self.scheduler.backoff_multiplier < 1.0
        {
            return Err(ConfigError::Validation(format!(
                "scheduler.backoff_multiplier must be a finite value >= 1.0, got {}",
                self.scheduler.backoff_multiplier
            )));
        }

        if self.scheduler.sink_queue_capacity == 0 {
            return Err(ConfigError::Validation(
                "scheduler.sink_queue_capacity must be positive".to_string(),
            ));
        }

        if self.sinks.file.is_none() && self.sinks.mqtt.is_none() && self.sinks.collector.is_none()
        {
            return Err(ConfigError::Validation(
                "at least one sink must be configured".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solarlog_common::parse_config;

    fn parse(json: &str) -> AppConfig {
        parse_config(json).unwrap()
    }

    fn minimal() -> String {
        r#"{
            devices: [
                {
                    name: "inverter01",
                    driver: "pvs800",
                    connection: { type: "tcp", host: "192.168.1.10" },
                },
            ],
            sinks: {
                file: { path: "/var/lib/solarlog/readings.jsonl" },
            },
        }"#
        .to_string()
    }

    #[test]
    fn test_minimal_config_valid() {
        let config = parse(&minimal());
        config.validate(&DriverRegistry::builtin()).unwrap();
        assert_eq!(config.scheduler.sink_queue_capacity, 64);
        assert_eq!(config.scheduler.backoff().multiplier, 2.0);
    }

    #[test]
    fn test_no_devices_rejected() {
        let config = parse(r#"{ devices: [], sinks: { file: { path: "out.jsonl" } } }"#);
        assert!(config.validate(&DriverRegistry::builtin()).is_err());
    }

    #[test]
    fn test_all_devices_disabled_rejected() {
        let config = parse(
            r#"{
                devices: [
                    {
                        name: "inverter01",
                        driver: "pvs800",
                        connection: { type: "tcp", host: "10.0.0.1" },
                        enabled: false,
                    },
                ],
                sinks: { file: { path: "out.jsonl" } },
            }"#,
        );
        assert!(config.validate(&DriverRegistry::builtin()).is_err());
    }

    #[test]
    fn test_duplicate_device_names_rejected() {
        let config = parse(
            r#"{
                devices: [
                    {
                        name: "inverter01",
                        driver: "pvs800",
                        connection: { type: "tcp", host: "10.0.0.1" },
                    },
                    {
                        name: "inverter01",
                        driver: "dirisa10",
                        connection: { type: "tcp", host: "10.0.0.2" },
                    },
                ],
                sinks: { file: { path: "out.jsonl" } },
            }"#,
        );
        let err = config
            .validate(&DriverRegistry::builtin())
            .unwrap_err()
            .to_string();
        assert!(err.contains("duplicate device name"));
    }

    #[test]
    fn test_unknown_driver_rejected() {
        let config = parse(
            r#"{
                devices: [
                    {
                        name: "mystery",
                        driver: "inv_mystery_9000",
                        connection: { type: "tcp", host: "10.0.0.1" },
                    },
                ],
                sinks: { file: { path: "out.jsonl" } },
            }"#,
        );
        let err = config
            .validate(&DriverRegistry::builtin())
            .unwrap_err()
            .to_string();
        assert!(err.contains("unknown driver type"));
    }

    #[test]
    fn test_invalid_parity_rejected() {
        let config = parse(
            r#"{
                devices: [
                    {
                        name: "meteo01",
                        driver: "meteo",
                        connection: { type: "rtu", port: "/dev/ttyUSB0", parity: "mark" },
                    },
                ],
                sinks: { file: { path: "out.jsonl" } },
            }"#,
        );
        assert!(config.validate(&DriverRegistry::builtin()).is_err());
    }

    #[test]
    fn test_invalid_backoff_multiplier_rejected() {
        let config = parse(
            r#"{
                devices: [
                    {
                        name: "inverter01",
                        driver: "pvs800",
                        connection: { type: "tcp", host: "10.0.0.1" },
                    },
                ],
                sinks: { file: { path: "out.jsonl" } },
                scheduler: { backoff_multiplier: -2.0 },
            }"#,
        );
        let err = config
            .validate(&DriverRegistry::builtin())
            .unwrap_err()
            .to_string();
        assert!(err.contains("backoff_multiplier"));
    }

    #[test]
    fn test_zero_queue_capacity_rejected() {
        let config = parse(
            r#"{
                devices: [
                    {
                        name: "inverter01",
                        driver: "pvs800",
                        connection: { type: "tcp", host: "10.0.0.1" },
                    },
                ],
                sinks: { file: { path: "out.jsonl" } },
                scheduler: { sink_queue_capacity: 0 },
            }"#,
        );
        assert!(config.validate(&DriverRegistry::builtin()).is_err());
    }

    #[test]
    fn test_no_sinks_rejected() {
        let config = parse(
            r#"{
                devices: [
                    {
                        name: "inverter01",
                        driver: "pvs800",
                        connection: { type: "tcp", host: "10.0.0.1" },
                    },
                ],
            }"#,
        );
        let err = config
            .validate(&DriverRegistry::builtin())
            .unwrap_err()
            .to_string();
        assert!(err.contains("at least one sink"));
    }

    #[test]
    fn test_mqtt_sink_defaults() {
        let config = parse(
            r#"{
                devices: [
                    {
                        name: "inverter01",
                        driver: "pvs800",
                        connection: { type: "tcp", host: "10.0.0.1" },
                    },
                ],
                sinks: { mqtt: { host: "broker.local" } },
            }"#,
        );
        let mqtt = config.sinks.mqtt.unwrap();
        assert_eq!(mqtt.port, 1883);
        assert_eq!(mqtt.topic_prefix, "solarlog");
        assert_eq!(mqtt.keepalive_secs, 15);
        assert!(mqtt.username.is_none());
    }
}
