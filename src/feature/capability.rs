//! Capability traits, one per [`Feature`](super::Feature)

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::common::{AccessPoint, ResetCause, RotationStatus};

/// Position fix
pub trait Gnss {
    /// Degrees, WGS84
    fn latitude(&self) -> f64;

    /// Degrees, WGS84
    fn longitude(&self) -> f64;

    /// Meters above sea level
    fn altitude(&self) -> f64;

    /// Horizontal accuracy in meters
    fn accuracy(&self) -> Option<f64> {
        None
    }

    /// Time to fix
    fn ttf(&self) -> Option<Duration> {
        None
    }

    fn pdop(&self) -> Option<f64> {
        None
    }

    fn satellites(&self) -> Option<u8> {
        None
    }
}

pub trait Timestamp {
    /// Capture instant, `None` when the device reported an invalid time
    fn timestamp(&self) -> Option<DateTime<Utc>>;
}

/// A historical reading delivered after the fact
pub trait Buffered {
    /// Entries still waiting in the device buffer
    fn buffer_level(&self) -> Option<u16> {
        None
    }

    fn is_buffered(&self) -> bool;
}

pub trait Battery {
    /// Volts
    fn battery_voltage(&self) -> f64;

    fn low_battery(&self) -> Option<bool> {
        None
    }
}

pub trait Photovoltaic {
    /// Volts
    fn photovoltaic_voltage(&self) -> f64;
}

pub trait Temperature {
    /// Degrees Celsius
    fn temperature(&self) -> f64;
}

pub trait Humidity {
    /// Percent relative humidity
    fn humidity(&self) -> f64;
}

pub trait Pressure {
    /// Hectopascal
    fn pressure(&self) -> f64;
}

pub trait WiFi {
    fn access_points(&self) -> &[AccessPoint];
}

pub trait Moving {
    fn is_moving(&self) -> bool;
}

pub trait DutyCycle {
    fn is_duty_cycle(&self) -> bool;
}

/// Device configuration snapshot; intervals are seconds
pub trait Config {
    fn moving_interval(&self) -> Option<u32> {
        None
    }

    fn steady_interval(&self) -> Option<u32> {
        None
    }

    fn heartbeat_interval(&self) -> Option<u32> {
        None
    }

    fn gnss_timeout(&self) -> Option<u16> {
        None
    }

    fn batch_size(&self) -> Option<u16> {
        None
    }

    fn buffer_size(&self) -> Option<u16> {
        None
    }
}

pub trait ConfigChange {
    fn config_id(&self) -> Option<u8>;

    /// Whether the last configuration change was applied
    fn config_change(&self) -> bool;
}

pub trait FirmwareVersion {
    /// `major.minor.patch`
    fn firmware_version(&self) -> String;

    fn firmware_hash(&self) -> Option<String> {
        None
    }
}

pub trait HardwareVersion {
    /// `type.revision`
    fn hardware_version(&self) -> String;
}

pub trait Button {
    fn button_pressed(&self) -> bool;
}

pub trait ResetReason {
    fn reset_reason(&self) -> ResetCause;
}

pub trait RotationState {
    fn old_rotation_state(&self) -> RotationStatus;

    fn new_rotation_state(&self) -> RotationStatus;

    fn number_of_rotations(&self) -> f64;

    fn elapsed_seconds(&self) -> Duration;
}

pub trait SequenceNumber {
    fn sequence_number(&self) -> u16;
}
