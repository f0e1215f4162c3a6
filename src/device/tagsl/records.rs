//! Tag-S/L port records

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::common::{AccessPoint, ResetCause};
use crate::device::caps::{
    battery, buffered, config_change, duty_cycle, firmware_version, gnss, hardware_version, moving,
    reset_reason, sequence_number, temperature, timestamp, wifi,
};
use crate::feature::{uplink_data, Button, Config};
use crate::payload::{record, Check};

record! {
    /// GNSS fix with time of fix
    pub struct Port1 : Port1Field {
        duty_cycle: bool => DutyCycle,
        config_id: u8 => ConfigId,
        config_change: bool => ConfigChange,
        moving: bool => Moving,
        latitude: f64 => Latitude [Check::LATITUDE],
        longitude: f64 => Longitude [Check::LONGITUDE],
        /// Meters
        altitude: f64 => Altitude,
        year: u8 => Year,
        month: u8 => Month [Check::MONTH],
        day: u8 => Day [Check::DAY],
        hour: u8 => Hour [Check::HOUR],
        minute: u8 => Minute [Check::MINUTE],
        second: u8 => Second [Check::SECOND],
    }
}

gnss!(Port1);
timestamp!(Port1, +time_of_fix);
moving!(Port1);
duty_cycle!(Port1);
config_change!(Port1);
uplink_data!(Port1, Gnss, Timestamp, Moving, DutyCycle, ConfigChange);

record! {
    /// GNSS fix without time
    pub struct Port2 : Port2Field {
        duty_cycle: bool => DutyCycle,
        moving: bool => Moving,
        latitude: f64 => Latitude [Check::LATITUDE],
        longitude: f64 => Longitude [Check::LONGITUDE],
        altitude: f64 => Altitude,
    }
}

gnss!(Port2);
moving!(Port2);
duty_cycle!(Port2);
uplink_data!(Port2, Gnss, Moving, DutyCycle);

record! {
    /// Heartbeat with battery and temperature
    pub struct Port3 : Port3Field {
        duty_cycle: bool => DutyCycle,
        moving: bool => Moving,
        battery_voltage: f64 => BatteryVoltage,
        temperature: f64 => Temperature,
    }
}

battery!(Port3);
temperature!(Port3);
moving!(Port3);
duty_cycle!(Port3);
uplink_data!(Port3, Battery, Temperature, Moving, DutyCycle);

record! {
    /// Wi-Fi scan
    pub struct Port5 : Port5Field {
        duty_cycle: bool => DutyCycle,
        moving: bool => Moving,
        access_points: Vec<AccessPoint> => AccessPoints [Check::Rssi],
    }
}

wifi!(Port5);
moving!(Port5);
duty_cycle!(Port5);
uplink_data!(Port5, WiFi, Moving, DutyCycle);

record! {
    /// Button press
    pub struct Port6 : Port6Field {
        button_pressed: bool => ButtonPressed,
    }
}

impl Button for Port6 {
    fn button_pressed(&self) -> bool {
        self.button_pressed
    }
}

uplink_data!(Port6, Button);

record! {
    /// Timestamped Wi-Fi scan
    pub struct Port7 : Port7Field {
        timestamp: DateTime<Utc> => Timestamp,
        duty_cycle: bool => DutyCycle,
        moving: bool => Moving,
        access_points: Vec<AccessPoint> => AccessPoints [Check::Rssi],
    }
}

timestamp!(Port7);
wifi!(Port7);
moving!(Port7);
duty_cycle!(Port7);
uplink_data!(Port7, Timestamp, WiFi, Moving, DutyCycle);

record! {
    /// BLE scan settings
    pub struct Port8 : Port8Field {
        scan_interval: u16 => ScanInterval,
        scan_time: u8 => ScanTime,
        max_beacons: u8 => MaxBeacons,
        min_rssi: i8 => MinRssi [Check::RSSI],
        advertising_filter: String => AdvertisingFilter [Check::Length(20, 20)],
        acceleration_hold: u16 => AccelerationHold,
        acceleration_threshold: u16 => AccelerationThreshold,
        scan_mode: u8 => ScanMode,
        ble_uplink_interval: u16 => BleUplinkInterval,
    }
}

uplink_data!(Port8);

record! {
    /// GNSS fix with battery and optional fix quality
    pub struct Port10 : Port10Field {
        duty_cycle: bool => DutyCycle,
        config_id: u8 => ConfigId,
        config_change: bool => ConfigChange,
        moving: bool => Moving,
        latitude: f64 => Latitude [Check::LATITUDE],
        longitude: f64 => Longitude [Check::LONGITUDE],
        altitude: f64 => Altitude,
        timestamp: DateTime<Utc> => Timestamp,
        battery_voltage: f64 => BatteryVoltage,
        ttf: Option<Duration> => Ttf,
        pdop: Option<f64> => Pdop,
        satellites: Option<u8> => Satellites,
    }
}

gnss!(Port10, +quality);
timestamp!(Port10);
battery!(Port10);
moving!(Port10);
duty_cycle!(Port10);
config_change!(Port10);
uplink_data!(Port10, Gnss, Timestamp, Battery, Moving, DutyCycle, ConfigChange);

record! {
    /// GNSS fix with fix quality and battery
    pub struct Port50 : Port50Field {
        duty_cycle: bool => DutyCycle,
        moving: bool => Moving,
        latitude: f64 => Latitude [Check::LATITUDE],
        longitude: f64 => Longitude [Check::LONGITUDE],
        altitude: f64 => Altitude,
        timestamp: DateTime<Utc> => Timestamp,
        ttf: Duration => Ttf,
        pdop: f64 => Pdop,
        satellites: u8 => Satellites,
        battery_voltage: f64 => BatteryVoltage,
    }
}

gnss!(Port50, +quality);
timestamp!(Port50);
battery!(Port50);
moving!(Port50);
duty_cycle!(Port50);
uplink_data!(Port50, Gnss, Timestamp, Battery, Moving, DutyCycle);

record! {
    /// Port 50 fix carrying a sequence number
    pub struct Port51 : Port51Field {
        duty_cycle: bool => DutyCycle,
        moving: bool => Moving,
        latitude: f64 => Latitude [Check::LATITUDE],
        longitude: f64 => Longitude [Check::LONGITUDE],
        altitude: f64 => Altitude,
        timestamp: DateTime<Utc> => Timestamp,
        ttf: Duration => Ttf,
        pdop: f64 => Pdop,
        satellites: u8 => Satellites,
        battery_voltage: f64 => BatteryVoltage,
        sequence_number: u16 => SequenceNumber,
    }
}

gnss!(Port51, +quality);
timestamp!(Port51);
battery!(Port51);
moving!(Port51);
duty_cycle!(Port51);
sequence_number!(Port51);
uplink_data!(Port51, Gnss, Timestamp, Battery, Moving, DutyCycle, SequenceNumber);

record! {
    /// Buffered Wi-Fi scan
    pub struct Port105 : Port105Field {
        buffer_level: u16 => BufferLevel,
        timestamp: DateTime<Utc> => Timestamp,
        duty_cycle: bool => DutyCycle,
        moving: bool => Moving,
        access_points: Vec<AccessPoint> => AccessPoints [Check::Rssi],
    }
}

buffered!(Port105);
timestamp!(Port105);
wifi!(Port105);
moving!(Port105);
duty_cycle!(Port105);
uplink_data!(Port105, Buffered, Timestamp, WiFi, Moving, DutyCycle);

record! {
    /// Buffered GNSS fix
    pub struct Port110 : Port110Field {
        buffer_level: u16 => BufferLevel,
        duty_cycle: bool => DutyCycle,
        moving: bool => Moving,
        latitude: f64 => Latitude [Check::LATITUDE],
        longitude: f64 => Longitude [Check::LONGITUDE],
        altitude: f64 => Altitude,
        timestamp: DateTime<Utc> => Timestamp,
        battery_voltage: f64 => BatteryVoltage,
        ttf: Duration => Ttf,
        pdop: f64 => Pdop,
        satellites: u8 => Satellites,
    }
}

buffered!(Port110);
gnss!(Port110, +quality);
timestamp!(Port110);
battery!(Port110);
moving!(Port110);
duty_cycle!(Port110);
uplink_data!(Port110, Buffered, Gnss, Timestamp, Battery, Moving, DutyCycle);

record! {
    /// Device configuration, second generation
    pub struct Port128 : Port128Field {
        ble_enabled: bool => BleEnabled,
        gnss_enabled: bool => GnssEnabled,
        wifi_enabled: bool => WifiEnabled,
        moving_interval: u32 => MovingInterval,
        steady_interval: u32 => SteadyInterval,
        heartbeat_interval: u32 => HeartbeatInterval,
        gnss_timeout: u16 => GnssTimeout,
        acceleration_threshold: u16 => AccelerationThreshold,
        acceleration_delay: u16 => AccelerationDelay,
        battery_keep_alive: u32 => BatteryKeepAlive,
        batch_size: u16 => BatchSize,
        buffer_size: u16 => BufferSize,
        firmware_version: String => FirmwareVersion,
        hardware_version: String => HardwareVersion,
    }
}

impl Config for Port128 {
    fn moving_interval(&self) -> Option<u32> {
        Some(self.moving_interval)
    }

    fn steady_interval(&self) -> Option<u32> {
        Some(self.steady_interval)
    }

    fn heartbeat_interval(&self) -> Option<u32> {
        Some(self.heartbeat_interval)
    }

    fn gnss_timeout(&self) -> Option<u16> {
        Some(self.gnss_timeout)
    }

    fn batch_size(&self) -> Option<u16> {
        Some(self.batch_size)
    }

    fn buffer_size(&self) -> Option<u16> {
        Some(self.buffer_size)
    }
}

firmware_version!(Port128);
hardware_version!(Port128);
uplink_data!(Port128, Config, FirmwareVersion, HardwareVersion);

record! {
    /// Configuration change acknowledgement
    pub struct Port134 : Port134Field {
        config_id: u8 => ConfigId,
        config_change: bool => ConfigChange,
    }
}

config_change!(Port134);
uplink_data!(Port134, ConfigChange);

record! {
    /// Firmware and hardware identification
    pub struct Port150 : Port150Field {
        firmware_version: String => FirmwareVersion,
        /// Leading commit hash bytes of the firmware build
        firmware_hash: String => FirmwareHash,
        hardware_version: String => HardwareVersion,
    }
}

firmware_version!(Port150, +hash);
hardware_version!(Port150);
uplink_data!(Port150, FirmwareVersion, HardwareVersion);

record! {
    /// Boot report
    pub struct Port198 : Port198Field {
        reset_reason: ResetCause => ResetReason,
        firmware_version: String => FirmwareVersion,
    }
}

reset_reason!(Port198);
firmware_version!(Port198);
uplink_data!(Port198, ResetReason, FirmwareVersion);

record! {
    /// Debug trace
    pub struct Port199 : Port199Field {
        sequence_number: u16 => SequenceNumber,
        debug_data: String => DebugData,
    }
}

sequence_number!(Port199);
uplink_data!(Port199, SequenceNumber);
