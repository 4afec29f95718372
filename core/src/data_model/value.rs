//! The type-erased scalar held by a characteristic.

use core::fmt;

use num::FromPrimitive;
use num_traits::{NumCast, ToPrimitive};
use serde_json::Value as Json;

use crate::{storage::StorageError, Error};

/// Characteristic value formats (HAP Table 6-5).
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
pub enum Format {
    Bool = 0,
    Int = 1,
    U8 = 2,
    U16 = 3,
    U32 = 4,
    U64 = 5,
    Float = 6,
    String = 7,
}

impl Format {
    pub const fn name(self) -> &'static str {
        match self {
            Format::Bool => "bool",
            Format::Int => "int",
            Format::U8 => "uint8",
            Format::U16 => "uint16",
            Format::U32 => "uint32",
            Format::U64 => "uint64",
            Format::Float => "float",
            Format::String => "string",
        }
    }

    /// Formats that carry min/max/step bounds.
    pub const fn is_numeric(self) -> bool {
        !matches!(self, Format::Bool | Format::String)
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i32),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    Float(f64),
    String(String),
}

impl Value {
    pub fn format(&self) -> Format {
        match self {
            Value::Bool(_) => Format::Bool,
            Value::Int(_) => Format::Int,
            Value::U8(_) => Format::U8,
            Value::U16(_) => Format::U16,
            Value::U32(_) => Format::U32,
            Value::U64(_) => Format::U64,
            Value::Float(_) => Format::Float,
            Value::String(_) => Format::String,
        }
    }

    /// The zero value of a format.
    pub fn zero(format: Format) -> Self {
        match format {
            Format::Bool => Value::Bool(false),
            Format::Int => Value::Int(0),
            Format::U8 => Value::U8(0),
            Format::U16 => Value::U16(0),
            Format::U32 => Value::U32(0),
            Format::U64 => Value::U64(0),
            Format::Float => Value::Float(0.0),
            Format::String => Value::String(String::new()),
        }
    }

    /// Checked narrowing of any number into the representation of `format`.
    pub fn from_number<T: ToPrimitive>(format: Format, n: T) -> crate::Result<Self> {
        let value = match format {
            Format::Bool => n.to_f64().map(|v| Value::Bool(v != 0.0)),
            Format::Int => n.to_i32().map(Value::Int),
            Format::U8 => n.to_u8().map(Value::U8),
            Format::U16 => n.to_u16().map(Value::U16),
            Format::U32 => n.to_u32().map(Value::U32),
            Format::U64 => n.to_u64().map(Value::U64),
            Format::Float => n.to_f64().map(Value::Float),
            Format::String => None,
        };
        value.ok_or(Error::Conversion { format })
    }

    /// Converts `self` into the representation of `format`.
    /// Strings only convert into strings.
    pub fn coerce(self, format: Format) -> crate::Result<Self> {
        if self.format() == format {
            return Ok(self);
        }
        match self {
            Value::Bool(b) => Self::from_number(format, b as u8),
            Value::Int(v) => Self::from_number(format, v),
            Value::U8(v) => Self::from_number(format, v),
            Value::U16(v) => Self::from_number(format, v),
            Value::U32(v) => Self::from_number(format, v),
            Value::U64(v) => Self::from_number(format, v),
            Value::Float(v) => Self::from_number(format, v),
            Value::String(_) => Err(Error::Conversion { format }),
        }
    }

    /// Reads the cell as a number. String cells have no numeric reading.
    pub fn get<T: NumCast>(&self) -> Option<T> {
        match self {
            Value::Bool(b) => T::from(*b as u8),
            Value::Int(v) => T::from(*v),
            Value::U8(v) => T::from(*v),
            Value::U16(v) => T::from(*v),
            Value::U32(v) => T::from(*v),
            Value::U64(v) => T::from(*v),
            Value::Float(v) => T::from(*v),
            Value::String(s) => {
                log::warn!("numeric read of string value \"{s}\" ignored");
                None
            }
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            other => other.get::<f64>().map(|v| v != 0.0),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::String(_) => None,
            other => other.get::<f64>(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Parses a value received on the wire into the representation of `format`.
    pub fn from_json(format: Format, json: &Json) -> Option<Self> {
        match format {
            Format::Bool => match json {
                Json::Bool(b) => Some(Value::Bool(*b)),
                Json::Number(n) => match n.as_u64() {
                    Some(0) => Some(Value::Bool(false)),
                    Some(1) => Some(Value::Bool(true)),
                    _ => None,
                },
                Json::String(s) => match s.trim() {
                    "true" | "1" => Some(Value::Bool(true)),
                    "false" | "0" => Some(Value::Bool(false)),
                    _ => None,
                },
                _ => None,
            },
            Format::Float => match json {
                Json::Number(n) => n.as_f64().map(Value::Float),
                Json::String(s) => s
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .map(Value::Float),
                _ => None,
            },
            Format::String => match json {
                Json::String(s) => Some(Value::String(s.clone())),
                _ => None,
            },
            _ => match json {
                Json::Number(n) => {
                    if let Some(v) = n.as_i64() {
                        Self::from_number(format, v).ok()
                    } else if let Some(v) = n.as_u64() {
                        Self::from_number(format, v).ok()
                    } else {
                        Self::from_integral(format, n.as_f64()?)
                    }
                }
                Json::Bool(b) => Self::from_number(format, *b as u8).ok(),
                Json::String(s) => {
                    let s = s.trim();
                    if let Ok(v) = s.parse::<i64>() {
                        Self::from_number(format, v).ok()
                    } else if let Ok(v) = s.parse::<u64>() {
                        Self::from_number(format, v).ok()
                    } else {
                        Self::from_integral(format, s.parse::<f64>().ok()?)
                    }
                }
                _ => None,
            },
        }
    }

    /// Integer formats take floats only when they hold a whole number.
    fn from_integral(format: Format, n: f64) -> Option<Self> {
        if !n.is_finite() || n.fract() != 0.0 {
            return None;
        }
        Self::from_number(format, n).ok()
    }

    /// Encodes the value for the persistent store: a format tag followed by
    /// eight little-endian bytes, or by the UTF-8 bytes of a string.
    pub fn to_blob(&self) -> Vec<u8> {
        let mut blob = Vec::with_capacity(9);
        blob.push(self.format() as u8);
        match self {
            Value::Bool(b) => blob.extend_from_slice(&(*b as u64).to_le_bytes()),
            Value::Int(v) => blob.extend_from_slice(&(*v as i64).to_le_bytes()),
            Value::U8(v) => blob.extend_from_slice(&(*v as u64).to_le_bytes()),
            Value::U16(v) => blob.extend_from_slice(&(*v as u64).to_le_bytes()),
            Value::U32(v) => blob.extend_from_slice(&(*v as u64).to_le_bytes()),
            Value::U64(v) => blob.extend_from_slice(&v.to_le_bytes()),
            Value::Float(v) => blob.extend_from_slice(&v.to_le_bytes()),
            Value::String(s) => blob.extend_from_slice(s.as_bytes()),
        }
        blob
    }

    pub fn from_blob(format: Format, blob: &[u8]) -> Result<Self, StorageError> {
        let (&tag, payload) = blob
            .split_first()
            .ok_or_else(|| StorageError::corrupt("empty value record"))?;
        let stored = Format::from_u8(tag)
            .ok_or_else(|| StorageError::corrupt(format!("unknown format tag {tag}")))?;
        if stored != format {
            return Err(StorageError::corrupt(format!(
                "stored {stored} value where {format} expected"
            )));
        }
        if format == Format::String {
            let s = core::str::from_utf8(payload)
                .map_err(|_| StorageError::corrupt("string value is not UTF-8"))?;
            return Ok(Value::String(s.to_string()));
        }
        let bytes: [u8; 8] = payload
            .try_into()
            .map_err(|_| StorageError::corrupt("scalar value record is not 9 bytes"))?;
        let value = match format {
            Format::Float => Ok(Value::Float(f64::from_le_bytes(bytes))),
            Format::Int => Self::from_number(format, i64::from_le_bytes(bytes)),
            _ => Self::from_number(format, u64::from_le_bytes(bytes)),
        }
        .map_err(|_| StorageError::corrupt("scalar value out of range"))?;
        Ok(value)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", *b as u8),
            Value::Int(v) => write!(f, "{v}"),
            Value::U8(v) => write!(f, "{v}"),
            Value::U16(v) => write!(f, "{v}"),
            Value::U32(v) => write!(f, "{v}"),
            Value::U64(v) => write!(f, "{v}"),
            Value::Float(v) if v.is_finite() => write!(f, "{v}"),
            Value::Float(_) => f.write_str("null"),
            Value::String(s) => {
                let quoted = serde_json::to_string(s).map_err(|_| fmt::Error)?;
                f.write_str(&quoted)
            }
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value)
    }
}

impl From<u8> for Value {
    fn from(value: u8) -> Self {
        Value::U8(value)
    }
}

impl From<u16> for Value {
    fn from(value: u16) -> Self {
        Value::U16(value)
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::U32(value)
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Value::U64(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn renders_canonical_text() {
        assert_eq!(Value::Bool(true).to_string(), "1");
        assert_eq!(Value::Bool(false).to_string(), "0");
        assert_eq!(Value::Int(-40).to_string(), "-40");
        assert_eq!(Value::U64(u64::MAX).to_string(), "18446744073709551615");
        assert_eq!(Value::Float(21.5).to_string(), "21.5");
        assert_eq!(Value::Float(f64::NAN).to_string(), "null");
        assert_eq!(Value::from("say \"hi\"").to_string(), r#""say \"hi\"""#);
    }

    #[test]
    fn narrows_with_checks() {
        assert_eq!(Value::from_number(Format::U8, 200).unwrap(), Value::U8(200));
        assert!(Value::from_number(Format::U8, 300).is_err());
        assert!(Value::from_number(Format::U32, -1).is_err());
        assert_eq!(Value::from_number(Format::Int, 7.9).unwrap(), Value::Int(7));
        assert_eq!(Value::from_number(Format::Bool, 5).unwrap(), Value::Bool(true));
        assert!(Value::from_number(Format::String, 1).is_err());
        assert_eq!(Value::U16(9).coerce(Format::Float).unwrap(), Value::Float(9.0));
    }

    #[test]
    fn numeric_read_of_string_fails() {
        assert_eq!(Value::from("x").get::<i32>(), None);
        assert_eq!(Value::U16(300).get::<u8>(), None);
        assert_eq!(Value::U16(30).get::<u8>(), Some(30));
        assert_eq!(Value::Bool(true).get::<i32>(), Some(1));
    }

    #[test]
    fn parses_wire_values() {
        assert_eq!(
            Value::from_json(Format::Bool, &json!("true")),
            Some(Value::Bool(true))
        );
        assert_eq!(
            Value::from_json(Format::Bool, &json!(0)),
            Some(Value::Bool(false))
        );
        assert_eq!(Value::from_json(Format::Bool, &json!(2)), None);
        assert_eq!(
            Value::from_json(Format::Int, &json!(50.0)),
            Some(Value::Int(50))
        );
        assert_eq!(Value::from_json(Format::Int, &json!(50.5)), None);
        assert_eq!(Value::from_json(Format::U8, &json!(256)), None);
        assert_eq!(
            Value::from_json(Format::U64, &json!(u64::MAX)),
            Some(Value::U64(u64::MAX))
        );
        assert_eq!(
            Value::from_json(Format::Float, &json!("1.25")),
            Some(Value::Float(1.25))
        );
        assert_eq!(Value::from_json(Format::String, &json!(5)), None);
    }

    #[test]
    fn rejects_non_finite_floats() {
        for text in ["NaN", "inf", "-inf", "infinity"] {
            assert_eq!(Value::from_json(Format::Float, &json!(text)), None, "{text}");
            assert_eq!(Value::from_json(Format::Int, &json!(text)), None, "{text}");
        }
        assert_eq!(
            Value::from_json(Format::Float, &json!("-0.5")),
            Some(Value::Float(-0.5))
        );
    }

    #[test]
    fn large_integers_keep_every_digit() {
        let big = 9_007_199_254_740_993u64;
        assert_eq!(
            Value::from_json(Format::U64, &json!(big)),
            Some(Value::U64(big))
        );
        assert_eq!(
            Value::from_json(Format::U64, &json!(big.to_string())),
            Some(Value::U64(big))
        );
        assert_eq!(Value::from_json(Format::U32, &json!(big)), None);
        assert_eq!(Value::from_json(Format::U8, &json!(-1)), None);
        assert_eq!(
            Value::from_json(Format::Int, &json!("-40")),
            Some(Value::Int(-40))
        );
    }

    #[test]
    fn blob_codec_checks_format() {
        let blob = Value::Int(-3).to_blob();
        assert_eq!(blob.len(), 9);
        assert_eq!(Value::from_blob(Format::Int, &blob).unwrap(), Value::Int(-3));
        assert!(Value::from_blob(Format::U8, &blob).is_err());
        assert!(Value::from_blob(Format::Int, &[]).is_err());

        let blob = Value::from("kitchen").to_blob();
        assert_eq!(
            Value::from_blob(Format::String, &blob).unwrap(),
            Value::from("kitchen")
        );
    }
}
