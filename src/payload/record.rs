//! # Records
//!
//! A record is a plain struct plus a field selector enum. The [`record!`]
//! macro generates both, together with the assignment, read-back and
//! validation functions the parser and encoder drive by selector.

use std::fmt;

use super::value::{CoerceError, Value};
use crate::common::{AccessPoint, ResetCause, RotationStatus, RSSI_MAX, RSSI_MIN};
use crate::error::ValidationFailed;

/// A decoded record with selector-keyed field access
pub trait Record: Default + Send + Sync + 'static {
    /// Selector naming one field of the record
    type Field: Copy + Eq + fmt::Debug + Send + Sync + 'static;

    /// Name of the field, as used in errors and JSON
    fn field_name(field: Self::Field) -> &'static str;

    /// Coerce `value` into the field's type and store it
    fn assign(&mut self, field: Self::Field, value: Value) -> Result<(), CoerceError>;

    /// Current value of the field
    fn value_of(&self, field: Self::Field) -> Value;

    /// Evaluate the field's declared checks
    fn check(&self, field: Self::Field) -> Option<ValidationFailed>;
}

/// A validation predicate attached to a record field
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Check {
    /// Inclusive numeric bounds
    Range(f64, f64),
    /// Inclusive string length bounds
    Length(usize, usize),
    /// Every reported access-point RSSI within the receivable range
    Rssi,
}

impl Check {
    pub const LATITUDE: Check = Check::Range(-90.0, 90.0);
    pub const LONGITUDE: Check = Check::Range(-180.0, 180.0);
    pub const MONTH: Check = Check::Range(1.0, 12.0);
    pub const DAY: Check = Check::Range(1.0, 31.0);
    pub const HOUR: Check = Check::Range(0.0, 23.0);
    pub const MINUTE: Check = Check::Range(0.0, 59.0);
    pub const SECOND: Check = Check::Range(0.0, 59.0);
    pub const RSSI: Check = Check::Range(RSSI_MIN as f64, RSSI_MAX as f64);
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Check::Range(min, max) => write!(f, "outside [{min}, {max}]"),
            Check::Length(min, max) => write!(f, "length outside [{min}, {max}]"),
            Check::Rssi => write!(f, "rssi outside [{RSSI_MIN}, {RSSI_MAX}]"),
        }
    }
}

/// Field types that can be checked against a [`Check`]
pub trait Checked {
    /// The offending value rendered for the error, `None` when the check passes
    fn violation(&self, check: &Check) -> Option<String>;
}

macro_rules! numeric_checked {
    ($($t:ty),*) => {
        $(
            impl Checked for $t {
                fn violation(&self, check: &Check) -> Option<String> {
                    match *check {
                        Check::Range(min, max) => {
                            let v = *self as f64;
                            (v < min || v > max).then(|| self.to_string())
                        }
                        _ => None,
                    }
                }
            }
        )*
    };
}

numeric_checked!(u8, u16, u32, u64, i8, i16, i32, i64, f32, f64);

impl Checked for String {
    fn violation(&self, check: &Check) -> Option<String> {
        match *check {
            Check::Length(min, max) => {
                (self.len() < min || self.len() > max).then(|| self.clone())
            }
            _ => None,
        }
    }
}

impl Checked for Vec<AccessPoint> {
    fn violation(&self, check: &Check) -> Option<String> {
        match *check {
            Check::Rssi => self
                .iter()
                .filter_map(|ap| ap.rssi)
                .find(|&r| !(RSSI_MIN..=RSSI_MAX).contains(&r))
                .map(|r| r.to_string()),
            _ => None,
        }
    }
}

impl<T: Checked> Checked for Option<T> {
    fn violation(&self, check: &Check) -> Option<String> {
        self.as_ref().and_then(|v| v.violation(check))
    }
}

// Types that never carry checks still need to satisfy the generated code.
macro_rules! unchecked {
    ($($t:ty),*) => {
        $(
            impl Checked for $t {
                fn violation(&self, _check: &Check) -> Option<String> {
                    None
                }
            }
        )*
    };
}

unchecked!(
    bool,
    chrono::DateTime<chrono::Utc>,
    std::time::Duration,
    RotationStatus,
    ResetCause
);

/// Run every check of one field, returning the first failure
pub fn run_checks<T: Checked>(field: &'static str, value: &T, checks: &[Check]) -> Option<ValidationFailed> {
    checks.iter().find_map(|check| {
        value.violation(check).map(|value| ValidationFailed {
            field,
            value,
            check: *check,
        })
    })
}

/// Declare a record struct and its field selector enum
///
/// ```ignore
/// record! {
///     /// Battery report
///     pub struct Battery : BatteryField {
///         low_battery: bool => LowBattery,
///         battery_voltage: f64 => BatteryVoltage [Check::Range(0.0, 5.0)],
///     }
/// }
/// ```
macro_rules! record {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident : $fields:ident {
            $(
                $(#[$fmeta:meta])*
                $field:ident : $ty:ty => $variant:ident $([$($check:expr),+ $(,)?])?
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
        $vis struct $name {
            $(
                $(#[$fmeta])*
                pub $field: $ty,
            )*
        }

        #[doc = concat!("Field selector for [`", stringify!($name), "`]")]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $fields {
            $($variant,)*
        }

        impl $crate::payload::Record for $name {
            type Field = $fields;

            fn field_name(field: $fields) -> &'static str {
                match field {
                    $($fields::$variant => stringify!($field),)*
                }
            }

            fn assign(
                &mut self,
                field: $fields,
                value: $crate::payload::Value,
            ) -> ::std::result::Result<(), $crate::payload::CoerceError> {
                match field {
                    $(
                        $fields::$variant => {
                            self.$field = <$ty as $crate::payload::FromValue>::from_value(value)?;
                        }
                    )*
                }
                Ok(())
            }

            fn value_of(&self, field: $fields) -> $crate::payload::Value {
                match field {
                    $($fields::$variant => $crate::payload::IntoValue::to_value(&self.$field),)*
                }
            }

            fn check(&self, field: $fields) -> Option<$crate::error::ValidationFailed> {
                match field {
                    $(
                        $fields::$variant => {
                            let checks: &[$crate::payload::Check] = &[$($($check),+)?];
                            $crate::payload::run_checks(stringify!($field), &self.$field, checks)
                        }
                    )*
                }
            }
        }
    };
}

pub(crate) use record;
