//! Telemetry variable type definitions

use serde::{Deserialize, Serialize};

/// Element type of a telemetry variable, as declared in its catalog record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VariableType {
    /// 8-bit character (`irsdk_char`)
    Char,
    /// 8-bit boolean (`irsdk_bool`)
    Bool,
    /// 32-bit signed integer (`irsdk_int`)
    Int32,
    /// 32-bit bitmask (`irsdk_bitField`)
    Bitmask32,
    /// 32-bit floating point (`irsdk_float`)
    Float32,
    /// 64-bit floating point (`irsdk_double`)
    Float64,
}

impl VariableType {
    /// Map the on-the-wire type code to a variable type.
    pub const fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(VariableType::Char),
            1 => Some(VariableType::Bool),
            2 => Some(VariableType::Int32),
            3 => Some(VariableType::Bitmask32),
            4 => Some(VariableType::Float32),
            5 => Some(VariableType::Float64),
            _ => None,
        }
    }

    /// The on-the-wire type code.
    pub const fn code(&self) -> i32 {
        match self {
            VariableType::Char => 0,
            VariableType::Bool => 1,
            VariableType::Int32 => 2,
            VariableType::Bitmask32 => 3,
            VariableType::Float32 => 4,
            VariableType::Float64 => 5,
        }
    }

    /// Size in bytes of one element.
    pub const fn size(&self) -> usize {
        match self {
            VariableType::Char | VariableType::Bool => 1,
            VariableType::Int32 | VariableType::Bitmask32 | VariableType::Float32 => 4,
            VariableType::Float64 => 8,
        }
    }
}

/// A single decoded element, tagged with its declared type.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Char(u8),
    Bool(bool),
    Int32(i32),
    Bitmask(u32),
    Float32(f32),
    Float64(f64),
}

impl Value {
    /// Decode one element of `var_type` from exactly `var_type.size()` bytes.
    pub(crate) fn decode(var_type: VariableType, bytes: &[u8]) -> Option<Self> {
        let value = match var_type {
            VariableType::Char => Value::Char(*bytes.first()?),
            VariableType::Bool => Value::Bool(*bytes.first()? != 0),
            VariableType::Int32 => Value::Int32(i32::from_le_bytes(bytes.get(..4)?.try_into().ok()?)),
            VariableType::Bitmask32 => {
                Value::Bitmask(u32::from_le_bytes(bytes.get(..4)?.try_into().ok()?))
            }
            VariableType::Float32 => {
                Value::Float32(f32::from_le_bytes(bytes.get(..4)?.try_into().ok()?))
            }
            VariableType::Float64 => {
                Value::Float64(f64::from_le_bytes(bytes.get(..8)?.try_into().ok()?))
            }
        };
        Some(value)
    }

    /// Boolean view: integers are true when non-zero, floats when `>= 1.0`.
    pub fn as_bool(&self) -> bool {
        match *self {
            Value::Char(v) => v != 0,
            Value::Bool(v) => v,
            Value::Int32(v) => v != 0,
            Value::Bitmask(v) => v != 0,
            Value::Float32(v) => v >= 1.0,
            Value::Float64(v) => v >= 1.0,
        }
    }

    /// Integer view: bytes widen, floats truncate toward zero (saturating).
    pub fn as_i32(&self) -> i32 {
        match *self {
            Value::Char(v) => v as i32,
            Value::Bool(v) => v as i32,
            Value::Int32(v) => v,
            Value::Bitmask(v) => v as i32,
            Value::Float32(v) => v as i32,
            Value::Float64(v) => v as i32,
        }
    }

    /// Single precision view: doubles narrow.
    pub fn as_f32(&self) -> f32 {
        match *self {
            Value::Char(v) => v as f32,
            Value::Bool(v) => u8::from(v) as f32,
            Value::Int32(v) => v as f32,
            Value::Bitmask(v) => v as i32 as f32,
            Value::Float32(v) => v,
            Value::Float64(v) => v as f32,
        }
    }

    /// Double precision view: everything widens.
    pub fn as_f64(&self) -> f64 {
        match *self {
            Value::Char(v) => v as f64,
            Value::Bool(v) => u8::from(v) as f64,
            Value::Int32(v) => v as f64,
            Value::Bitmask(v) => v as i32 as f64,
            Value::Float32(v) => v as f64,
            Value::Float64(v) => v,
        }
    }
}
