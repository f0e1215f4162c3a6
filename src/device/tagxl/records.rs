//! Tag-XL local port records

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::common::RotationStatus;
use crate::device::caps::{firmware_version, hardware_version, sequence_number, timestamp};
use crate::feature::{uplink_data, Config, RotationState};
use crate::payload::record;

record! {
    /// TLV device settings
    pub struct Settings : SettingsField {
        firmware_version: String => FirmwareVersion,
        hardware_version: String => HardwareVersion,
        moving_interval: Option<u32> => MovingInterval,
        steady_interval: Option<u32> => SteadyInterval,
        heartbeat_interval: Option<u32> => HeartbeatInterval,
        gnss_timeout: Option<u16> => GnssTimeout,
        battery_keep_alive: Option<u32> => BatteryKeepAlive,
    }
}

impl Config for Settings {
    fn moving_interval(&self) -> Option<u32> {
        self.moving_interval
    }

    fn steady_interval(&self) -> Option<u32> {
        self.steady_interval
    }

    fn heartbeat_interval(&self) -> Option<u32> {
        self.heartbeat_interval
    }

    fn gnss_timeout(&self) -> Option<u16> {
        self.gnss_timeout
    }
}

firmware_version!(Settings);
hardware_version!(Settings);
uplink_data!(Settings, Config, FirmwareVersion, HardwareVersion);

record! {
    /// Drum rotation state change
    pub struct Rotation : RotationField {
        version: u8 => Version,
        sequence_number: u8 => SequenceNumber,
        old_rotation_state: RotationStatus => OldRotationState,
        new_rotation_state: RotationStatus => NewRotationState,
        timestamp: DateTime<Utc> => Timestamp,
        /// Tenths of a turn on the wire
        number_of_rotations: f64 => NumberOfRotations,
        elapsed_seconds: Duration => ElapsedSeconds,
    }
}

impl RotationState for Rotation {
    fn old_rotation_state(&self) -> RotationStatus {
        self.old_rotation_state
    }

    fn new_rotation_state(&self) -> RotationStatus {
        self.new_rotation_state
    }

    fn number_of_rotations(&self) -> f64 {
        self.number_of_rotations
    }

    fn elapsed_seconds(&self) -> Duration {
        self.elapsed_seconds
    }
}

timestamp!(Rotation);
sequence_number!(Rotation);
uplink_data!(Rotation, RotationState, Timestamp, SequenceNumber);
