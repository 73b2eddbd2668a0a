//! Modbus transport establishment (TCP and RTU).

use std::net::SocketAddr;
use std::time::Duration;

use tokio_modbus::client::Context;
use tokio_modbus::prelude::*;

use solarlog_common::ConnectionConfig;

use crate::driver::DriverError;

/// Connect to a Modbus device and address the given unit.
///
/// The TCP dial is bounded by `timeout`; RTU opens the serial port
/// synchronously, so no timeout applies there.
pub async fn connect(
    connection: &ConnectionConfig,
    unit_id: u8,
    timeout: Duration,
) -> Result<Context, DriverError> {
    let slave = Slave(unit_id);

    match connection {
        ConnectionConfig::Tcp { host, port } => {
            let addr: SocketAddr = format!("{}:{}", host, port)
                .parse()
                .map_err(|e| DriverError::Connect(format!("invalid address: {}", e)))?;

            let ctx = tokio::time::timeout(timeout, tcp::connect_slave(addr, slave))
                .await
                .map_err(|_| DriverError::Timeout(timeout))?
                .map_err(|e| DriverError::Connect(e.to_string()))?;

            Ok(ctx)
        }
        ConnectionConfig::Rtu {
            port,
            baud_rate,
            data_bits,
            parity,
            stop_bits,
        } => {
            let parity = match parity.to_lowercase().as_str() {
                "even" => tokio_serial::Parity::Even,
                "odd" => tokio_serial::Parity::Odd,
                _ => tokio_serial::Parity::None,
            };

            let stop_bits = match stop_bits {
                2 => tokio_serial::StopBits::Two,
                _ => tokio_serial::StopBits::One,
            };

            let data_bits = match data_bits {
                5 => tokio_serial::DataBits::Five,
                6 => tokio_serial::DataBits::Six,
                7 => tokio_serial::DataBits::Seven,
                _ => tokio_serial::DataBits::Eight,
            };

            let builder = tokio_serial::new(port, *baud_rate)
                .parity(parity)
                .stop_bits(stop_bits)
                .data_bits(data_bits);

            let serial = tokio_serial::SerialStream::open(&builder)
                .map_err(|e| DriverError::Connect(format!("serial open failed: {}", e)))?;

            let ctx = rtu::attach_slave(serial, slave);
            Ok(ctx)
        }
    }
}
