//! # Field Values
//!
//! The typed form of a field between extraction and record assignment, and the
//! coercions from it into record field types.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use thiserror::Error;

use super::reader::RawValue;
use crate::common::{AccessPoint, ResetCause, RotationStatus};

/// A decoded field value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Uint(u64),
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    Time(DateTime<Utc>),
    Duration(Duration),
    AccessPoints(Vec<AccessPoint>),
}

impl From<RawValue> for Value {
    fn from(raw: RawValue) -> Self {
        match raw {
            RawValue::Uint(v) => Value::Uint(v),
            RawValue::Hex(s) => Value::Str(s),
        }
    }
}

impl Value {
    fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Uint(_) => "unsigned integer",
            Value::Int(_) => "signed integer",
            Value::Float(_) => "float",
            Value::Bool(_) => "bool",
            Value::Str(_) => "string",
            Value::Time(_) => "instant",
            Value::Duration(_) => "duration",
            Value::AccessPoints(_) => "access points",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Uint(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Str(v) => f.write_str(v),
            Value::Time(v) => write!(f, "{}", v.to_rfc3339()),
            Value::Duration(v) => write!(f, "{v:?}"),
            Value::AccessPoints(v) => write!(f, "{} access points", v.len()),
        }
    }
}

/// A value that does not fit the targeted field type
#[derive(Debug, Clone, PartialEq, Error)]
#[error("cannot coerce {kind} {value} into {target}")]
pub struct CoerceError {
    pub kind: &'static str,
    pub value: String,
    pub target: &'static str,
}

impl CoerceError {
    pub fn new(value: &Value, target: &'static str) -> Self {
        Self {
            kind: value.kind(),
            value: value.to_string(),
            target,
        }
    }
}

/// Conversion from a decoded [`Value`] into a record field type
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self, CoerceError>;
}

/// Conversion from a record field back into a [`Value`] for encoding
pub trait IntoValue {
    fn to_value(&self) -> Value;
}

// Integer targets truncate to their width; signed targets reinterpret the
// low bits as two's complement.
macro_rules! integer_value {
    ($($t:ty => $variant:ident as $wide:ty),* $(,)?) => {
        $(
            impl FromValue for $t {
                fn from_value(value: Value) -> Result<Self, CoerceError> {
                    match value {
                        Value::Uint(v) => Ok(v as $t),
                        Value::Int(v) => Ok(v as $t),
                        Value::Bool(v) => Ok(v as $t),
                        Value::Float(v) => Ok(v as $t),
                        other => Err(CoerceError::new(&other, stringify!($t))),
                    }
                }
            }

            impl IntoValue for $t {
                fn to_value(&self) -> Value {
                    Value::$variant(*self as $wide)
                }
            }
        )*
    };
}

integer_value! {
    u8 => Uint as u64,
    u16 => Uint as u64,
    u32 => Uint as u64,
    u64 => Uint as u64,
    i8 => Int as i64,
    i16 => Int as i64,
    i32 => Int as i64,
    i64 => Int as i64,
}

macro_rules! float_value {
    ($($t:ty),*) => {
        $(
            impl FromValue for $t {
                fn from_value(value: Value) -> Result<Self, CoerceError> {
                    match value {
                        Value::Uint(v) => Ok(v as $t),
                        Value::Int(v) => Ok(v as $t),
                        Value::Float(v) => Ok(v as $t),
                        other => Err(CoerceError::new(&other, stringify!($t))),
                    }
                }
            }

            impl IntoValue for $t {
                fn to_value(&self) -> Value {
                    Value::Float(f64::from(*self))
                }
            }
        )*
    };
}

float_value!(f32, f64);

impl FromValue for bool {
    fn from_value(value: Value) -> Result<Self, CoerceError> {
        match value {
            Value::Bool(v) => Ok(v),
            Value::Uint(v) => Ok(v & 1 == 1),
            Value::Int(v) => Ok(v & 1 == 1),
            other => Err(CoerceError::new(&other, "bool")),
        }
    }
}

impl IntoValue for bool {
    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self, CoerceError> {
        match value {
            Value::Str(v) => Ok(v),
            Value::Uint(v) => Ok(v.to_string()),
            Value::Int(v) => Ok(v.to_string()),
            Value::Float(v) => Ok(v.to_string()),
            other => Err(CoerceError::new(&other, "string")),
        }
    }
}

impl IntoValue for String {
    fn to_value(&self) -> Value {
        Value::Str(self.clone())
    }
}

impl FromValue for DateTime<Utc> {
    fn from_value(value: Value) -> Result<Self, CoerceError> {
        let seconds = match value {
            Value::Time(v) => return Ok(v),
            Value::Uint(v) => i64::try_from(v).ok(),
            Value::Int(v) => Some(v),
            ref other => return Err(CoerceError::new(other, "instant")),
        };
        seconds
            .and_then(|s| Utc.timestamp_opt(s, 0).single())
            .ok_or_else(|| CoerceError::new(&value, "instant"))
    }
}

impl IntoValue for DateTime<Utc> {
    fn to_value(&self) -> Value {
        Value::Time(*self)
    }
}

impl FromValue for Duration {
    fn from_value(value: Value) -> Result<Self, CoerceError> {
        match value {
            Value::Duration(v) => Ok(v),
            Value::Uint(v) => Ok(Duration::from_nanos(v)),
            other => Err(CoerceError::new(&other, "duration")),
        }
    }
}

impl IntoValue for Duration {
    fn to_value(&self) -> Value {
        Value::Duration(*self)
    }
}

impl FromValue for Vec<AccessPoint> {
    fn from_value(value: Value) -> Result<Self, CoerceError> {
        match value {
            Value::AccessPoints(v) => Ok(v),
            other => Err(CoerceError::new(&other, "access points")),
        }
    }
}

impl IntoValue for Vec<AccessPoint> {
    fn to_value(&self) -> Value {
        Value::AccessPoints(self.clone())
    }
}

impl FromValue for RotationStatus {
    fn from_value(value: Value) -> Result<Self, CoerceError> {
        u8::from_value(value).map(RotationStatus::from_code)
    }
}

impl IntoValue for RotationStatus {
    fn to_value(&self) -> Value {
        Value::Uint(u64::from(self.code()))
    }
}

impl FromValue for ResetCause {
    fn from_value(value: Value) -> Result<Self, CoerceError> {
        u8::from_value(value).map(ResetCause::from_code)
    }
}

impl IntoValue for ResetCause {
    fn to_value(&self) -> Value {
        Value::Uint(u64::from(self.code()))
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self, CoerceError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: IntoValue> IntoValue for Option<T> {
    fn to_value(&self) -> Value {
        match self {
            Some(v) => v.to_value(),
            None => Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signed_targets_reinterpret_low_bits() {
        assert_eq!(i8::from_value(Value::Uint(0xf0)).unwrap(), -16);
        assert_eq!(i16::from_value(Value::Uint(0xfc18)).unwrap(), -1000);
        assert_eq!(i32::from_value(Value::Uint(0x02cd_cd13)).unwrap(), 47_041_811);
    }

    #[test]
    fn test_bool_takes_low_bit() {
        assert!(!bool::from_value(Value::Uint(0x80)).unwrap());
        assert!(bool::from_value(Value::Uint(0x81)).unwrap());
    }

    #[test]
    fn test_string_from_integer_is_decimal() {
        assert_eq!(String::from_value(Value::Uint(255)).unwrap(), "255");
    }

    #[test]
    fn test_instant_from_unix_seconds() {
        let t = DateTime::<Utc>::from_value(Value::Uint(1_722_596_876)).unwrap();
        assert_eq!(t.to_rfc3339(), "2024-08-02T11:07:56+00:00");
    }

    #[test]
    fn test_duration_from_integer_is_nanoseconds() {
        assert_eq!(Duration::from_value(Value::Uint(1_500)).unwrap(), Duration::from_nanos(1_500));
    }

    #[test]
    fn test_option_from_null() {
        assert_eq!(Option::<u16>::from_value(Value::Null).unwrap(), None);
        assert_eq!(Option::<u16>::from_value(Value::Uint(7)).unwrap(), Some(7));
        assert_eq!(Some(7u16).to_value(), Value::Uint(7));
        assert_eq!(None::<u16>.to_value(), Value::Null);
    }

    #[test]
    fn test_mismatched_coercion_fails() {
        let err = u8::from_value(Value::Str("ff".to_string())).unwrap_err();
        assert_eq!(err.target, "u8");
        assert_eq!(err.kind, "string");
    }

    #[test]
    fn test_rotation_status_unknown_code_is_undefined() {
        assert_eq!(RotationStatus::from_value(Value::Uint(0x0b)).unwrap(), RotationStatus::Undefined);
        assert_eq!(RotationStatus::from_value(Value::Uint(2)).unwrap(), RotationStatus::Mixing);
    }
}
