//! MQTT broker sink.

use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{AsyncClient, MqttOptions, QoS};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use solarlog_common::Reading;

use crate::config::MqttSinkConfig;

use super::{Sink, SinkError};

/// Publishes each reading to `<topic_prefix>/<device_name>`.
///
/// Delivery is at-most-once (QoS 0): no acknowledgement tracking, stale
/// data is not worth blocking the pipeline for.
pub struct MqttSink {
    client: AsyncClient,
    topic_prefix: String,
    event_loop_task: JoinHandle<()>,
}

impl MqttSink {
    /// Create the sink and spawn its event loop task.
    ///
    /// The broker connection is established lazily by the event loop.
    /// Delivery is best-effort: a dead broker does not fail publishes,
    /// it silently drops the queued QoS-0 messages. Only a full or
    /// closed request queue surfaces as a transient failure.
    pub fn new(config: &MqttSinkConfig) -> Self {
        let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
        options.set_keep_alive(Duration::from_secs(config.keepalive_secs));
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            options.set_credentials(username, password);
        }

        let (client, mut event_loop) = AsyncClient::new(options, 16);

        // The event loop owns the broker connection and reconnects on its
        // own; readings queued while the broker is down are dropped.
        let event_loop_task = tokio::spawn(async move {
            loop {
                match event_loop.poll().await {
                    Ok(event) => trace!(?event, "mqtt event"),
                    Err(e) => {
                        debug!(error = %e, "mqtt event loop error");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        });

        Self {
            client,
            topic_prefix: config.topic_prefix.clone(),
            event_loop_task,
        }
    }
}

#[async_trait]
impl Sink for MqttSink {
    fn name(&self) -> &str {
        "mqtt"
    }

    async fn publish(&mut self, reading: &Reading) -> Result<(), SinkError> {
        let topic = format!("{}/{}", self.topic_prefix, reading.device);
        let payload = reading
            .to_json_line()
            .map_err(|e| SinkError::Transient(format!("serialization failed: {}", e)))?;

        // try_publish keeps the worker non-blocking: a stalled event loop
        // shows up as a full request queue, not a hang.
        self.client
            .try_publish(&topic, QoS::AtMostOnce, false, payload)
            .map_err(|e| SinkError::Transient(format!("publish to '{}' failed: {}", topic, e)))
    }

    async fn close(&mut self) {
        let _ = self.client.disconnect().await;
        self.event_loop_task.abort();
    }
}
