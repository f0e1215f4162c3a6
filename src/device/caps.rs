//! Capability implementations for records following the shared field naming

macro_rules! moving {
    ($($t:ty),* $(,)?) => {
        $(impl $crate::feature::Moving for $t {
            fn is_moving(&self) -> bool {
                self.moving
            }
        })*
    };
}

macro_rules! duty_cycle {
    ($($t:ty),* $(,)?) => {
        $(impl $crate::feature::DutyCycle for $t {
            fn is_duty_cycle(&self) -> bool {
                self.duty_cycle
            }
        })*
    };
}

macro_rules! config_change {
    ($($t:ty),* $(,)?) => {
        $(impl $crate::feature::ConfigChange for $t {
            fn config_id(&self) -> Option<u8> {
                Some(self.config_id)
            }

            fn config_change(&self) -> bool {
                self.config_change
            }
        })*
    };
}

/// `latitude`, `longitude`, `altitude`, plus `ttf`, `pdop`, `satellites`
/// (plain or optional) with `+quality`
macro_rules! gnss {
    ($t:ty) => {
        impl $crate::feature::Gnss for $t {
            fn latitude(&self) -> f64 {
                self.latitude
            }

            fn longitude(&self) -> f64 {
                self.longitude
            }

            fn altitude(&self) -> f64 {
                self.altitude
            }
        }
    };
    ($t:ty, +quality) => {
        impl $crate::feature::Gnss for $t {
            fn latitude(&self) -> f64 {
                self.latitude
            }

            fn longitude(&self) -> f64 {
                self.longitude
            }

            fn altitude(&self) -> f64 {
                self.altitude
            }

            fn ttf(&self) -> Option<::std::time::Duration> {
                self.ttf.into()
            }

            fn pdop(&self) -> Option<f64> {
                self.pdop.into()
            }

            fn satellites(&self) -> Option<u8> {
                self.satellites.into()
            }
        }
    };
}

/// `timestamp`, or the six time-of-fix fields with `+time_of_fix`
macro_rules! timestamp {
    ($t:ty) => {
        impl $crate::feature::Timestamp for $t {
            fn timestamp(&self) -> Option<::chrono::DateTime<::chrono::Utc>> {
                self.timestamp.into()
            }
        }
    };
    ($t:ty, +time_of_fix) => {
        impl $crate::feature::Timestamp for $t {
            fn timestamp(&self) -> Option<::chrono::DateTime<::chrono::Utc>> {
                $crate::common::time_of_fix(self.year, self.month, self.day, self.hour, self.minute, self.second)
            }
        }
    };
}

/// `battery_voltage`, plus `low_battery` with `+low_battery`
macro_rules! battery {
    ($t:ty) => {
        impl $crate::feature::Battery for $t {
            fn battery_voltage(&self) -> f64 {
                self.battery_voltage
            }
        }
    };
    ($t:ty, +low_battery) => {
        impl $crate::feature::Battery for $t {
            fn battery_voltage(&self) -> f64 {
                self.battery_voltage
            }

            fn low_battery(&self) -> Option<bool> {
                self.low_battery.into()
            }
        }
    };
}

macro_rules! temperature {
    ($($t:ty),* $(,)?) => {
        $(impl $crate::feature::Temperature for $t {
            fn temperature(&self) -> f64 {
                self.temperature
            }
        })*
    };
}

macro_rules! humidity {
    ($($t:ty),* $(,)?) => {
        $(impl $crate::feature::Humidity for $t {
            fn humidity(&self) -> f64 {
                self.humidity
            }
        })*
    };
}

macro_rules! pressure {
    ($($t:ty),* $(,)?) => {
        $(impl $crate::feature::Pressure for $t {
            fn pressure(&self) -> f64 {
                self.pressure
            }
        })*
    };
}

macro_rules! wifi {
    ($($t:ty),* $(,)?) => {
        $(impl $crate::feature::WiFi for $t {
            fn access_points(&self) -> &[$crate::common::AccessPoint] {
                &self.access_points
            }
        })*
    };
}

macro_rules! sequence_number {
    ($($t:ty),* $(,)?) => {
        $(impl $crate::feature::SequenceNumber for $t {
            fn sequence_number(&self) -> u16 {
                self.sequence_number.into()
            }
        })*
    };
}

/// `firmware_version`, plus `firmware_hash` with `+hash`
macro_rules! firmware_version {
    ($t:ty) => {
        impl $crate::feature::FirmwareVersion for $t {
            fn firmware_version(&self) -> String {
                self.firmware_version.clone()
            }
        }
    };
    ($t:ty, +hash) => {
        impl $crate::feature::FirmwareVersion for $t {
            fn firmware_version(&self) -> String {
                self.firmware_version.clone()
            }

            fn firmware_hash(&self) -> Option<String> {
                Some(self.firmware_hash.clone())
            }
        }
    };
}

macro_rules! hardware_version {
    ($($t:ty),* $(,)?) => {
        $(impl $crate::feature::HardwareVersion for $t {
            fn hardware_version(&self) -> String {
                self.hardware_version.clone()
            }
        })*
    };
}

macro_rules! reset_reason {
    ($($t:ty),* $(,)?) => {
        $(impl $crate::feature::ResetReason for $t {
            fn reset_reason(&self) -> $crate::common::ResetCause {
                self.reset_reason
            }
        })*
    };
}

/// History entries read back from the device buffer
macro_rules! buffered {
    ($($t:ty),* $(,)?) => {
        $(impl $crate::feature::Buffered for $t {
            fn buffer_level(&self) -> Option<u16> {
                Some(self.buffer_level)
            }

            fn is_buffered(&self) -> bool {
                true
            }
        })*
    };
}

pub(crate) use {
    battery, buffered, config_change, duty_cycle, firmware_version, gnss, hardware_version, humidity, moving,
    pressure, reset_reason, sequence_number, temperature, timestamp, wifi,
};
