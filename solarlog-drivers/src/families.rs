//! Built-in device family register maps.
//!
//! Representative field sets for the device families deployed at the
//! installations this logger targets. Addresses are 0-based register
//! offsets within the family's documented block.

use crate::map::{FieldSpec, RegisterKind, WordFormat};

const fn holding(name: &'static str, address: u16, format: WordFormat, scale: f64) -> FieldSpec {
    FieldSpec {
        name,
        kind: RegisterKind::Holding,
        address,
        format,
        scale,
        offset: 0.0,
    }
}

const fn input(name: &'static str, address: u16, format: WordFormat, scale: f64) -> FieldSpec {
    FieldSpec {
        name,
        kind: RegisterKind::Input,
        address,
        format,
        scale,
        offset: 0.0,
    }
}

/// ABB PVS800 central inverter.
pub const PVS800: &[FieldSpec] = &[
    holding("heartbeat", 2496, WordFormat::U16, 1.0),
    holding("main_status_word", 2497, WordFormat::U16, 1.0),
    holding("active_power", 2498, WordFormat::I16, 1.0),
    holding("reactive_power", 2499, WordFormat::I16, 1.0),
    holding("grid_voltage", 2500, WordFormat::U16, 0.1),
    holding("grid_frequency", 2501, WordFormat::U16, 0.01),
    holding("power_factor", 2502, WordFormat::I16, 0.001),
    holding("dc_input_voltage", 2550, WordFormat::U16, 0.1),
    holding("dc_bus_voltage", 2551, WordFormat::U16, 0.1),
    holding("dc_input_current", 2552, WordFormat::U16, 0.1),
    holding("ambient_temperature", 2555, WordFormat::I16, 0.1),
    holding("daily_energy", 2564, WordFormat::U32, 0.1),
    holding("total_energy", 2566, WordFormat::U32, 10.0),
];

/// Socomec Diris A10 power meter. Electrical quantities are 32-bit pairs.
pub const DIRIS_A10: &[FieldSpec] = &[
    holding("voltage_l12", 50514, WordFormat::U32, 0.01),
    holding("voltage_l23", 50516, WordFormat::U32, 0.01),
    holding("voltage_l31", 50518, WordFormat::U32, 0.01),
    holding("voltage_l1", 50520, WordFormat::U32, 0.01),
    holding("voltage_l2", 50522, WordFormat::U32, 0.01),
    holding("voltage_l3", 50524, WordFormat::U32, 0.01),
    holding("frequency", 50526, WordFormat::U32, 0.01),
    holding("current_l1", 50528, WordFormat::U32, 0.001),
    holding("current_l2", 50530, WordFormat::U32, 0.001),
    holding("current_l3", 50532, WordFormat::U32, 0.001),
    holding("active_power", 50536, WordFormat::I32, 10.0),
    holding("reactive_power", 50538, WordFormat::I32, 10.0),
    holding("apparent_power", 50540, WordFormat::U32, 10.0),
    holding("power_factor", 50542, WordFormat::I32, 0.001),
    holding("active_energy", 50780, WordFormat::U32, 1.0),
    holding("reactive_energy", 50782, WordFormat::U32, 1.0),
];

/// Meteorology sensor station (pyranometer + air sensors).
pub const METEO: &[FieldSpec] = &[
    input("relative_humidity", 10, WordFormat::I16, 0.1),
    input("air_pressure", 14, WordFormat::I16, 0.1),
    input("wind_direction", 18, WordFormat::I16, 0.1),
    input("global_irradiance", 27, WordFormat::I16, 0.1),
    input("air_temperature", 31, WordFormat::I16, 0.1),
    input("dew_point", 35, WordFormat::I16, 0.1),
    input("wind_speed", 42, WordFormat::I16, 0.1),
    input("precipitation", 48, WordFormat::I16, 0.01),
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn unique_names(map: &[FieldSpec]) -> bool {
        let names: HashSet<_> = map.iter().map(|f| f.name).collect();
        names.len() == map.len()
    }

    #[test]
    fn test_field_names_unique() {
        assert!(unique_names(PVS800));
        assert!(unique_names(DIRIS_A10));
        assert!(unique_names(METEO));
    }

    #[test]
    fn test_maps_not_empty() {
        assert!(!PVS800.is_empty());
        assert!(!DIRIS_A10.is_empty());
        assert!(!METEO.is_empty());
    }
}
