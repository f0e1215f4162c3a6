//! # Common Types
//!
//! Value types shared across devices.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

/// Lowest receivable access-point RSSI in dBm
pub const RSSI_MIN: i8 = -120;

/// Highest plausible access-point RSSI in dBm
pub const RSSI_MAX: i8 = -20;

/// One scanned Wi-Fi access point
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessPoint {
    /// 12 lowercase hex characters
    pub mac: String,
    /// `None` when the device did not report a signal strength
    pub rssi: Option<i8>,
}

/// State of a rotating drum as reported by the tag-XL rotation sensor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RotationStatus {
    #[default]
    Undefined,
    Pouring,
    Mixing,
    Error,
}

impl RotationStatus {
    /// Map a wire code, unknown codes become [`RotationStatus::Undefined`]
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => RotationStatus::Pouring,
            2 => RotationStatus::Mixing,
            3 => RotationStatus::Error,
            _ => RotationStatus::Undefined,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            RotationStatus::Undefined => 0,
            RotationStatus::Pouring => 1,
            RotationStatus::Mixing => 2,
            RotationStatus::Error => 3,
        }
    }
}

/// Cause of the last device reset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetCause {
    #[default]
    Unknown,
    PowerOn,
    Brownout,
    Watchdog,
    Software,
    External,
    Lockup,
    Debug,
}

impl ResetCause {
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => ResetCause::PowerOn,
            2 => ResetCause::Brownout,
            3 => ResetCause::Watchdog,
            4 => ResetCause::Software,
            5 => ResetCause::External,
            6 => ResetCause::Lockup,
            7 => ResetCause::Debug,
            _ => ResetCause::Unknown,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            ResetCause::Unknown => 0,
            ResetCause::PowerOn => 1,
            ResetCause::Brownout => 2,
            ResetCause::Watchdog => 3,
            ResetCause::Software => 4,
            ResetCause::External => 5,
            ResetCause::Lockup => 6,
            ResetCause::Debug => 7,
        }
    }
}

/// Combine six time-of-fix bytes into an instant
///
/// `year` counts from 2000. Returns `None` when any component is out of range.
pub fn time_of_fix(year: u8, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> Option<DateTime<Utc>> {
    NaiveDate::from_ymd_opt(2000 + i32::from(year), u32::from(month), u32::from(day))?
        .and_hms_opt(u32::from(hour), u32::from(minute), u32::from(second))
        .map(|t| t.and_utc())
}
