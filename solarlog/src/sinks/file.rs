//! Append-only JSON-lines file sink.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use solarlog_common::Reading;

use crate::config::FileSinkConfig;

use super::{Sink, SinkError};

/// Appends one structured record per poll, one device+timestamp per line.
///
/// In dry-run mode the sink runs through the full pipeline but the actual
/// write is suppressed.
pub struct FileSink {
    path: PathBuf,
    dry_run: bool,
    file: Option<File>,
}

impl FileSink {
    pub fn new(config: &FileSinkConfig, dry_run: bool) -> Self {
        Self {
            path: config.path.clone(),
            dry_run,
            file: None,
        }
    }

    fn open(&mut self) -> std::io::Result<&mut File> {
        let file = match self.file.take() {
            Some(file) => file,
            None => {
                if let Some(parent) = self.path.parent() {
                    if !parent.as_os_str().is_empty() {
                        std::fs::create_dir_all(parent)?;
                    }
                }
                OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&self.path)?
            }
        };
        Ok(self.file.insert(file))
    }
}

#[async_trait]
impl Sink for FileSink {
    fn name(&self) -> &str {
        "file"
    }

    async fn publish(&mut self, reading: &Reading) -> Result<(), SinkError> {
        if self.dry_run {
            debug!(device = %reading.device, "dry-run, file write suppressed");
            return Ok(());
        }

        let line = reading
            .to_json_line()
            .map_err(|e| SinkError::Transient(format!("serialization failed: {}", e)))?;

        let file = self
            .open()
            .map_err(|e| SinkError::Transient(format!("open failed: {}", e)))?;

        if let Err(e) = writeln!(file, "{}", line) {
            // Reopen on the next attempt; the handle is not trusted after
            // a failed write.
            self.file = None;
            return Err(SinkError::Transient(format!("write failed: {}", e)));
        }

        Ok(())
    }

    async fn close(&mut self) {
        if let Some(mut file) = self.file.take() {
            let _ = file.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solarlog_common::{FieldMap, FieldValue};

    fn temp_path(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("solarlog-file-sink-{}-{}.jsonl", tag, std::process::id()))
    }

    fn reading() -> Reading {
        let mut fields = FieldMap::new();
        fields.insert("voltage".to_string(), FieldValue::Float(230.1));
        Reading::new("inverter01", fields)
    }

    #[tokio::test]
    async fn test_appends_one_line_per_reading() {
        let path = temp_path("append");
        let _ = std::fs::remove_file(&path);

        let mut sink = FileSink::new(&FileSinkConfig { path: path.clone() }, false);
        sink.publish(&reading()).await.unwrap();
        sink.publish(&reading()).await.unwrap();
        sink.close().await;

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let parsed: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed["device"], "inverter01");

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_dry_run_writes_nothing() {
        let path = temp_path("dry-run");
        let _ = std::fs::remove_file(&path);

        let mut sink = FileSink::new(&FileSinkConfig { path: path.clone() }, true);
        sink.publish(&reading()).await.unwrap();
        sink.close().await;

        assert!(!path.exists());
    }
}
