//! Generic register-map driver.

use std::time::Duration;

use async_trait::async_trait;
use tokio_modbus::client::{Context, Reader};
use tracing::debug;

use solarlog_common::{ConnectionConfig, DeviceConfig, FieldMap};

use crate::driver::{Driver, DriverError};
use crate::map::{FieldSpec, RegisterKind};
use crate::transport;

/// Driver for any Modbus device family described by a static register map.
///
/// All built-in families are instances of this driver with different maps.
pub struct MapDriver {
    driver_type: String,
    connection: ConnectionConfig,
    unit_id: u8,
    timeout: Duration,
    map: &'static [FieldSpec],
    ctx: Option<Context>,
}

impl MapDriver {
    /// Create a driver for one configured device.
    pub fn new(config: &DeviceConfig, map: &'static [FieldSpec]) -> Self {
        Self {
            driver_type: config.driver.clone(),
            connection: config.connection.clone(),
            unit_id: config.unit_id,
            timeout: config.timeout(),
            map,
            ctx: None,
        }
    }

    /// Read and decode every field of the map. Any register failure fails
    /// the whole snapshot; partial data is never promoted to a reading.
    async fn read_snapshot(ctx: &mut Context, map: &[FieldSpec]) -> Result<FieldMap, DriverError> {
        let mut fields = FieldMap::new();

        for spec in map {
            let count = spec.format.words();
            let result = match spec.kind {
                RegisterKind::Input => ctx.read_input_registers(spec.address, count).await,
                RegisterKind::Holding => ctx.read_holding_registers(spec.address, count).await,
            };

            let words = result
                .map_err(|e| DriverError::Read(e.to_string()))?
                .map_err(|e| DriverError::Read(format!("exception: {:?}", e)))?;

            fields.insert(spec.name.to_string(), spec.decode(&words)?);
        }

        Ok(fields)
    }
}

#[async_trait]
impl Driver for MapDriver {
    fn driver_type(&self) -> &str {
        &self.driver_type
    }

    async fn connect(&mut self) -> Result<(), DriverError> {
        if self.ctx.is_some() {
            return Ok(());
        }
        let ctx = transport::connect(&self.connection, self.unit_id, self.timeout).await?;
        debug!(driver = %self.driver_type, "transport established");
        self.ctx = Some(ctx);
        Ok(())
    }

    async fn read(&mut self) -> Result<FieldMap, DriverError> {
        let ctx = self
            .ctx
            .as_mut()
            .ok_or_else(|| DriverError::Read("not connected".to_string()))?;

        tokio::time::timeout(self.timeout, Self::read_snapshot(ctx, self.map))
            .await
            .map_err(|_| DriverError::Timeout(self.timeout))?
    }

    async fn disconnect(&mut self) {
        // Dropping the context closes the underlying transport.
        if self.ctx.take().is_some() {
            debug!(driver = %self.driver_type, "transport released");
        }
    }

    fn connected(&self) -> bool {
        self.ctx.is_some()
    }
}
