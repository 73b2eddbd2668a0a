//! Device drivers for the solarlog datalogger.
//!
//! This crate defines the driver capability every device family implements
//! ([`Driver`]: connect / read / disconnect), the shared Modbus transport
//! (TCP and RTU), the register-map decode layer, and the built-in device
//! families (central inverters, power meters, meteorology sensors).
//!
//! Drivers are selected by a string key resolved through the
//! [`DriverRegistry`] built at startup; unknown keys fail at configuration
//! time, never at poll time.

pub mod driver;
pub mod families;
pub mod map;
pub mod map_driver;
pub mod registry;
pub mod transport;

pub use driver::{Driver, DriverError};
pub use map::{FieldSpec, RegisterKind, WordFormat};
pub use map_driver::MapDriver;
pub use registry::{DriverFactory, DriverRegistry};
