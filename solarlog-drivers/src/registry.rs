//! Driver type registry.
//!
//! Maps driver type keys to constructors. Built once at startup; config
//! validation resolves every device's driver key against it, so an unknown
//! key can never surface at poll time.

use std::collections::HashMap;

use solarlog_common::DeviceConfig;

use crate::driver::Driver;
use crate::families;
use crate::map_driver::MapDriver;

/// Constructor for one driver family.
pub type DriverFactory = fn(&DeviceConfig) -> Box<dyn Driver>;

/// Name-to-constructor mapping for the available driver families.
pub struct DriverRegistry {
    factories: HashMap<&'static str, DriverFactory>,
}

impl DriverRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry with every built-in device family.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register("pvs800", |cfg| Box::new(MapDriver::new(cfg, families::PVS800)));
        registry.register("dirisa10", |cfg| {
            Box::new(MapDriver::new(cfg, families::DIRIS_A10))
        });
        registry.register("meteo", |cfg| Box::new(MapDriver::new(cfg, families::METEO)));
        registry
    }

    /// Register a driver family under a type key.
    pub fn register(&mut self, driver_type: &'static str, factory: DriverFactory) {
        self.factories.insert(driver_type, factory);
    }

    /// Whether a driver type key is known.
    pub fn contains(&self, driver_type: &str) -> bool {
        self.factories.contains_key(driver_type)
    }

    /// Instantiate a driver for a configured device.
    ///
    /// Returns `None` for unknown driver types; validated configuration
    /// never hits that path.
    pub fn create(&self, config: &DeviceConfig) -> Option<Box<dyn Driver>> {
        self.factories.get(config.driver.as_str()).map(|f| f(config))
    }

    /// Registered driver type keys, sorted.
    pub fn types(&self) -> Vec<&'static str> {
        let mut types: Vec<_> = self.factories.keys().copied().collect();
        types.sort_unstable();
        types
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
