//! Centralized log collector sink.
//!
//! Forwards each reading as one structured log event (a JSON line over
//! TCP). Best-effort: the dispatcher gives this sink a small fixed failure
//! ceiling so a dead collector is not flooded with retries.

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::debug;

use solarlog_common::Reading;

use crate::config::CollectorSinkConfig;

use super::{Sink, SinkError};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

pub struct CollectorSink {
    address: String,
    stream: Option<TcpStream>,
}

impl CollectorSink {
    pub fn new(config: &CollectorSinkConfig) -> Self {
        Self {
            address: config.address.clone(),
            stream: None,
        }
    }

    async fn ensure_connected(&mut self) -> Result<&mut TcpStream, SinkError> {
        let stream = match self.stream.take() {
            Some(stream) => stream,
            None => {
                let stream =
                    tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(&self.address))
                        .await
                        .map_err(|_| {
                            SinkError::Transient(format!("connect to '{}' timed out", self.address))
                        })?
                        .map_err(|e| {
                            SinkError::Transient(format!(
                                "connect to '{}' failed: {}",
                                self.address, e
                            ))
                        })?;
                debug!(address = %self.address, "collector connected");
                stream
            }
        };
        Ok(self.stream.insert(stream))
    }
}

#[async_trait]
impl Sink for CollectorSink {
    fn name(&self) -> &str {
        "collector"
    }

    async fn publish(&mut self, reading: &Reading) -> Result<(), SinkError> {
        let mut event = reading
            .to_json_line()
            .map_err(|e| SinkError::Transient(format!("serialization failed: {}", e)))?;
        event.push('\n');

        let stream = self.ensure_connected().await?;
        if let Err(e) = stream.write_all(event.as_bytes()).await {
            // The stream is not trusted after a failed write.
            self.stream = None;
            return Err(SinkError::Transient(format!("forward failed: {}", e)));
        }

        Ok(())
    }

    async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.shutdown().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solarlog_common::{FieldMap, FieldValue};
    use tokio::io::AsyncBufReadExt;
    use tokio::net::TcpListener;

    fn reading() -> Reading {
        let mut fields = FieldMap::new();
        fields.insert("wind_speed".to_string(), FieldValue::Float(3.4));
        Reading::new("meteo01", fields)
    }

    #[tokio::test]
    async fn test_forwards_json_lines() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut lines = tokio::io::BufReader::new(stream).lines();
            lines.next_line().await.unwrap().unwrap()
        });

        let mut sink = CollectorSink::new(&CollectorSinkConfig {
            address,
            max_attempts: 3,
        });
        sink.publish(&reading()).await.unwrap();

        let line = server.await.unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed["device"], "meteo01");

        sink.close().await;
    }

    #[tokio::test]
    async fn test_unreachable_collector_is_transient() {
        // Reserved port with nothing listening
        let mut sink = CollectorSink::new(&CollectorSinkConfig {
            address: "127.0.0.1:1".to_string(),
            max_attempts: 3,
        });

        match sink.publish(&reading()).await {
            Err(SinkError::Transient(_)) => {}
            other => panic!("expected transient failure, got {:?}", other.map(|_| ())),
        }
    }
}
