//! Register-map decode layer.
//!
//! A device family is described by a static table of [`FieldSpec`]s: which
//! register to read, how to combine the 16-bit words, and how to scale the
//! raw value into engineering units.

use solarlog_common::FieldValue;

use crate::driver::DriverError;

/// Modbus register class to read a field from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterKind {
    /// Input registers (read-only, 16-bit).
    Input,
    /// Holding registers (read/write, 16-bit).
    Holding,
}

/// Interpretation of the raw register words, big-endian word order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordFormat {
    /// Unsigned 16-bit integer.
    U16,
    /// Signed 16-bit integer.
    I16,
    /// Unsigned 32-bit integer (2 registers).
    U32,
    /// Signed 32-bit integer (2 registers).
    I32,
    /// IEEE 754 32-bit float (2 registers).
    F32,
}

impl WordFormat {
    /// Number of 16-bit registers this format occupies.
    pub fn words(self) -> u16 {
        match self {
            WordFormat::U16 | WordFormat::I16 => 1,
            WordFormat::U32 | WordFormat::I32 | WordFormat::F32 => 2,
        }
    }

    /// Decode raw register words into a number.
    ///
    /// Fails if the exchange returned fewer words than the format needs.
    pub fn decode(self, words: &[u16]) -> Result<f64, DriverError> {
        if words.len() < self.words() as usize {
            return Err(DriverError::Read(format!(
                "short read: got {} words, need {}",
                words.len(),
                self.words()
            )));
        }
        let value = match self {
            WordFormat::U16 => words[0] as f64,
            WordFormat::I16 => words[0] as i16 as f64,
            WordFormat::U32 => (((words[0] as u32) << 16) | (words[1] as u32)) as f64,
            WordFormat::I32 => (((words[0] as u32) << 16) | (words[1] as u32)) as i32 as f64,
            WordFormat::F32 => {
                let bits = ((words[0] as u32) << 16) | (words[1] as u32);
                f32::from_bits(bits) as f64
            }
        };
        Ok(value)
    }
}

/// One readable field of a device family.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    /// Field name in the produced reading.
    pub name: &'static str,
    /// Register class.
    pub kind: RegisterKind,
    /// Starting register address (0-based).
    pub address: u16,
    /// Raw word interpretation.
    pub format: WordFormat,
    /// Scaling factor (value * scale + offset).
    pub scale: f64,
    /// Offset applied after scaling.
    pub offset: f64,
}

impl FieldSpec {
    /// Decode raw words into the final field value.
    pub fn decode(&self, words: &[u16]) -> Result<FieldValue, DriverError> {
        let raw = self.format.decode(words)?;
        Ok(FieldValue::Float(raw * self.scale + self.offset))
    }
}
