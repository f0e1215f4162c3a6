//! Records and layouts shared by several devices

use crate::common::ResetCause;
use crate::device::caps::{battery, duty_cycle, firmware_version, hardware_version};
use crate::device::fields::{self, CENTI_CELSIUS, MILLIVOLTS};
use crate::feature::{uplink_data, Config, Feature};
use crate::payload::{record, FieldDescriptor, PayloadConfig, TagDescriptor, Transform};

record! {
    /// Device configuration, first generation (Tag-S/L and nomad-XS port 4)
    pub struct ConfigV1 : ConfigV1Field {
        moving_interval: u32 => MovingInterval,
        steady_interval: u32 => SteadyInterval,
        heartbeat_interval: u32 => HeartbeatInterval,
        gnss_timeout: u16 => GnssTimeout,
        acceleration_threshold: u16 => AccelerationThreshold,
        acceleration_delay: u16 => AccelerationDelay,
        device_state: u8 => DeviceState,
        firmware_version: String => FirmwareVersion,
        hardware_version: String => HardwareVersion,
        battery_keep_alive: u32 => BatteryKeepAlive,
        batch_size: Option<u16> => BatchSize,
        buffer_size: Option<u16> => BufferSize,
    }
}

impl Config for ConfigV1 {
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
        self.batch_size
    }

    fn buffer_size(&self) -> Option<u16> {
        self.buffer_size
    }
}

firmware_version!(ConfigV1);
hardware_version!(ConfigV1);
uplink_data!(ConfigV1, Config, FirmwareVersion, HardwareVersion);

pub fn config_v1() -> PayloadConfig<ConfigV1> {
    use ConfigV1Field::*;

    PayloadConfig::new(
        vec![
            FieldDescriptor::new(MovingInterval, 0, 4),
            FieldDescriptor::new(SteadyInterval, 4, 4),
            FieldDescriptor::new(HeartbeatInterval, 8, 4),
            FieldDescriptor::new(GnssTimeout, 12, 2),
            FieldDescriptor::new(AccelerationThreshold, 14, 2),
            FieldDescriptor::new(AccelerationDelay, 16, 2),
            FieldDescriptor::new(DeviceState, 18, 1),
            fields::version(FirmwareVersion, 19, 3),
            fields::version(HardwareVersion, 22, 2),
            FieldDescriptor::new(BatteryKeepAlive, 24, 4),
            FieldDescriptor::new(BatchSize, 28, 2).optional(),
            FieldDescriptor::new(BufferSize, 30, 2).optional(),
        ],
        &[Feature::Config, Feature::FirmwareVersion, Feature::HardwareVersion],
    )
}

record! {
    /// Battery report (Tag-S/L and nomad-XS port 15)
    pub struct BatteryStatus : BatteryStatusField {
        duty_cycle: bool => DutyCycle,
        low_battery: bool => LowBattery,
        battery_voltage: f64 => BatteryVoltage,
    }
}

battery!(BatteryStatus, +low_battery);
duty_cycle!(BatteryStatus);
uplink_data!(BatteryStatus, Battery, DutyCycle);

pub fn battery_status() -> PayloadConfig<BatteryStatus> {
    use BatteryStatusField::*;

    PayloadConfig::new(
        vec![
            fields::duty_cycle(DutyCycle, 0),
            fields::flag(LowBattery, 0),
            fields::millivolts(BatteryVoltage, 1),
        ],
        &[Feature::Battery, Feature::DutyCycle],
    )
    .null_padded()
}

record! {
    /// TLV status report (Tag-S/L and Tag-XL port 151)
    pub struct StatusReport : StatusReportField {
        battery_voltage: f64 => BatteryVoltage,
        low_battery: Option<bool> => LowBattery,
        temperature: Option<f64> => Temperature,
        reset_reason: Option<ResetCause> => ResetReason,
    }
}

battery!(StatusReport, +low_battery);
uplink_data!(StatusReport, Battery);

pub fn status_report() -> PayloadConfig<StatusReport> {
    use StatusReportField::*;

    PayloadConfig::tagged(
        vec![
            TagDescriptor::new(0x40, BatteryVoltage, 2)
                .transform(Transform::Scaled { divisor: MILLIVOLTS, signed: false }),
            TagDescriptor::new(0x41, LowBattery, 1).optional(),
            TagDescriptor::new(0x42, Temperature, 2)
                .optional()
                .transform(Transform::Scaled { divisor: CENTI_CELSIUS, signed: true }),
            TagDescriptor::new(0x43, ResetReason, 1).optional(),
        ],
        &[Feature::Battery],
    )
}
