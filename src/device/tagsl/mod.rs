//! # Tag-S/L
//!
//! GNSS and Wi-Fi tracker. Every port is parsed locally.

mod records;

pub use records::*;

use async_trait::async_trait;

use crate::device::fields::{self, DECIMETERS};
use crate::device::shared;
use crate::device::{DecodeOptions, PortTable, UplinkContext, UplinkDecoder};
use crate::error::Result;
use crate::feature::{Feature, FeatureSet, UplinkData};
use crate::payload::{FieldDescriptor, PayloadConfig};
use crate::uplink::Decoded;

/// Port table of the Tag-S/L
pub fn port_table(options: DecodeOptions) -> PortTable {
    PortTable::new(options)
        .with(1, port1())
        .with(2, port2())
        .with(3, port3())
        .with(4, shared::config_v1())
        .with(5, port5())
        .with(6, port6())
        .with(7, port7())
        .with(8, port8())
        .with(10, port10())
        .with(15, shared::battery_status())
        .with(50, port50())
        .with(51, port51())
        .with(105, port105())
        .with(110, port110())
        .with(128, port128())
        .with(134, port134())
        .with(150, port150())
        .with(151, shared::status_report())
        .with(198, port198())
        .with(199, port199())
}

fn port1() -> PayloadConfig<Port1> {
    use Port1Field::*;

    PayloadConfig::new(
        vec![
            fields::duty_cycle(DutyCycle, 0),
            fields::config_id(ConfigId, 0),
            fields::config_change(ConfigChange, 0),
            fields::flag(Moving, 0),
            fields::coordinate(Latitude, 1),
            fields::coordinate(Longitude, 5),
            fields::scaled_u16(Altitude, 9, 1.0),
            FieldDescriptor::new(Year, 11, 1),
            FieldDescriptor::new(Month, 12, 1),
            FieldDescriptor::new(Day, 13, 1),
            FieldDescriptor::new(Hour, 14, 1),
            FieldDescriptor::new(Minute, 15, 1),
            FieldDescriptor::new(Second, 16, 1),
        ],
        &[
            Feature::Gnss,
            Feature::Timestamp,
            Feature::Moving,
            Feature::DutyCycle,
            Feature::ConfigChange,
        ],
    )
}

fn port2() -> PayloadConfig<Port2> {
    use Port2Field::*;

    PayloadConfig::new(
        vec![
            fields::duty_cycle(DutyCycle, 0),
            fields::flag(Moving, 0),
            fields::coordinate(Latitude, 1),
            fields::coordinate(Longitude, 5),
            fields::scaled_u16(Altitude, 9, DECIMETERS),
        ],
        &[Feature::Gnss, Feature::Moving, Feature::DutyCycle],
    )
}

fn port3() -> PayloadConfig<Port3> {
    use Port3Field::*;

    PayloadConfig::new(
        vec![
            fields::duty_cycle(DutyCycle, 0),
            fields::flag(Moving, 0),
            fields::millivolts(BatteryVoltage, 1),
            fields::centi_celsius(Temperature, 3),
        ],
        &[Feature::Battery, Feature::Temperature, Feature::Moving, Feature::DutyCycle],
    )
}

fn port5() -> PayloadConfig<Port5> {
    use Port5Field::*;

    PayloadConfig::new(
        vec![
            fields::duty_cycle(DutyCycle, 0),
            fields::flag(Moving, 0),
            fields::access_points(AccessPoints, 1),
        ],
        &[Feature::WiFi, Feature::Moving, Feature::DutyCycle],
    )
}

fn port6() -> PayloadConfig<Port6> {
    PayloadConfig::new(
        vec![FieldDescriptor::new(Port6Field::ButtonPressed, 0, 1)],
        &[Feature::Button],
    )
    .null_padded()
}

fn port7() -> PayloadConfig<Port7> {
    use Port7Field::*;

    PayloadConfig::new(
        vec![
            fields::unix_time(Timestamp, 0),
            fields::duty_cycle(DutyCycle, 4),
            fields::flag(Moving, 4),
            fields::access_points(AccessPoints, 5),
        ],
        &[Feature::Timestamp, Feature::WiFi, Feature::Moving, Feature::DutyCycle],
    )
}

fn port8() -> PayloadConfig<Port8> {
    use crate::payload::Transform;
    use Port8Field::*;

    PayloadConfig::new(
        vec![
            FieldDescriptor::new(ScanInterval, 0, 2),
            FieldDescriptor::new(ScanTime, 2, 1),
            FieldDescriptor::new(MaxBeacons, 3, 1),
            FieldDescriptor::new(MinRssi, 4, 1).transform(Transform::Signed),
            FieldDescriptor::new(AdvertisingFilter, 5, 10).hex(),
            FieldDescriptor::new(AccelerationHold, 15, 2),
            FieldDescriptor::new(AccelerationThreshold, 17, 2),
            FieldDescriptor::new(ScanMode, 19, 1),
            FieldDescriptor::new(BleUplinkInterval, 20, 2),
        ],
        &[],
    )
}

fn port10() -> PayloadConfig<Port10> {
    use Port10Field::*;

    PayloadConfig::new(
        vec![
            fields::duty_cycle(DutyCycle, 0),
            fields::config_id(ConfigId, 0),
            fields::config_change(ConfigChange, 0),
            fields::flag(Moving, 0),
            fields::coordinate(Latitude, 1),
            fields::coordinate(Longitude, 5),
            fields::scaled_u16(Altitude, 9, DECIMETERS),
            fields::unix_time(Timestamp, 11),
            fields::millivolts(BatteryVoltage, 15),
            fields::seconds(Ttf, 17, 1).optional(),
            fields::pdop(Pdop, 18).optional(),
            FieldDescriptor::new(Satellites, 19, 1).optional(),
        ],
        &[
            Feature::Gnss,
            Feature::Timestamp,
            Feature::Battery,
            Feature::Moving,
            Feature::DutyCycle,
            Feature::ConfigChange,
        ],
    )
}

fn port50() -> PayloadConfig<Port50> {
    use Port50Field::*;

    PayloadConfig::new(
        vec![
            fields::duty_cycle(DutyCycle, 0),
            fields::flag(Moving, 0),
            fields::coordinate(Latitude, 1),
            fields::coordinate(Longitude, 5),
            fields::scaled_u16(Altitude, 9, DECIMETERS),
            fields::unix_time(Timestamp, 11),
            fields::seconds(Ttf, 15, 1),
            fields::pdop(Pdop, 16),
            FieldDescriptor::new(Satellites, 17, 1),
            fields::millivolts(BatteryVoltage, 18),
        ],
        &[
            Feature::Gnss,
            Feature::Timestamp,
            Feature::Battery,
            Feature::Moving,
            Feature::DutyCycle,
        ],
    )
}

fn port51() -> PayloadConfig<Port51> {
    use Port51Field::*;

    PayloadConfig::new(
        vec![
            fields::duty_cycle(DutyCycle, 0),
            fields::flag(Moving, 0),
            fields::coordinate(Latitude, 1),
            fields::coordinate(Longitude, 5),
            fields::scaled_u16(Altitude, 9, DECIMETERS),
            fields::unix_time(Timestamp, 11),
            fields::seconds(Ttf, 15, 1),
            fields::pdop(Pdop, 16),
            FieldDescriptor::new(Satellites, 17, 1),
            fields::millivolts(BatteryVoltage, 18),
            FieldDescriptor::new(SequenceNumber, 20, 2),
        ],
        &[
            Feature::Gnss,
            Feature::Timestamp,
            Feature::Battery,
            Feature::Moving,
            Feature::DutyCycle,
            Feature::SequenceNumber,
        ],
    )
}

fn port105() -> PayloadConfig<Port105> {
    use Port105Field::*;

    PayloadConfig::new(
        vec![
            FieldDescriptor::new(BufferLevel, 0, 2),
            fields::unix_time(Timestamp, 2),
            fields::duty_cycle(DutyCycle, 6),
            fields::flag(Moving, 6),
            fields::access_points(AccessPoints, 7),
        ],
        &[
            Feature::Buffered,
            Feature::Timestamp,
            Feature::WiFi,
            Feature::Moving,
            Feature::DutyCycle,
        ],
    )
}

fn port110() -> PayloadConfig<Port110> {
    use Port110Field::*;

    PayloadConfig::new(
        vec![
            FieldDescriptor::new(BufferLevel, 0, 2),
            fields::duty_cycle(DutyCycle, 2),
            fields::flag(Moving, 2),
            fields::coordinate(Latitude, 3),
            fields::coordinate(Longitude, 7),
            fields::scaled_u16(Altitude, 11, DECIMETERS),
            fields::unix_time(Timestamp, 13),
            fields::millivolts(BatteryVoltage, 17),
            fields::seconds(Ttf, 19, 1),
            fields::pdop(Pdop, 20),
            FieldDescriptor::new(Satellites, 21, 1),
        ],
        &[
            Feature::Buffered,
            Feature::Gnss,
            Feature::Timestamp,
            Feature::Battery,
            Feature::Moving,
            Feature::DutyCycle,
        ],
    )
}

fn port128() -> PayloadConfig<Port128> {
    use Port128Field::*;

    PayloadConfig::new(
        vec![
            FieldDescriptor::new(BleEnabled, 0, 1),
            FieldDescriptor::new(GnssEnabled, 1, 1),
            FieldDescriptor::new(WifiEnabled, 2, 1),
            FieldDescriptor::new(MovingInterval, 3, 4),
            FieldDescriptor::new(SteadyInterval, 7, 4),
            FieldDescriptor::new(HeartbeatInterval, 11, 4),
            FieldDescriptor::new(GnssTimeout, 15, 2),
            FieldDescriptor::new(AccelerationThreshold, 17, 2),
            FieldDescriptor::new(AccelerationDelay, 19, 2),
            FieldDescriptor::new(BatteryKeepAlive, 21, 4),
            FieldDescriptor::new(BatchSize, 25, 2),
            FieldDescriptor::new(BufferSize, 27, 2),
            fields::version(FirmwareVersion, 29, 3),
            fields::version(HardwareVersion, 32, 2),
        ],
        &[Feature::Config, Feature::FirmwareVersion, Feature::HardwareVersion],
    )
}

fn port134() -> PayloadConfig<Port134> {
    use Port134Field::*;

    PayloadConfig::new(
        vec![FieldDescriptor::new(ConfigId, 0, 1), FieldDescriptor::new(ConfigChange, 1, 1)],
        &[Feature::ConfigChange],
    )
}

fn port150() -> PayloadConfig<Port150> {
    use Port150Field::*;

    PayloadConfig::new(
        vec![
            fields::version(FirmwareVersion, 0, 3),
            FieldDescriptor::new(FirmwareHash, 3, 4).hex(),
            fields::version(HardwareVersion, 7, 2),
        ],
        &[Feature::FirmwareVersion, Feature::HardwareVersion],
    )
}

fn port198() -> PayloadConfig<Port198> {
    use Port198Field::*;

    PayloadConfig::new(
        vec![FieldDescriptor::new(ResetReason, 0, 1), fields::version(FirmwareVersion, 1, 3)],
        &[Feature::ResetReason, Feature::FirmwareVersion],
    )
}

fn port199() -> PayloadConfig<Port199> {
    use Port199Field::*;

    PayloadConfig::new(
        vec![
            FieldDescriptor::new(SequenceNumber, 0, 2),
            FieldDescriptor::rest(DebugData, 2).hex(),
        ],
        &[Feature::SequenceNumber],
    )
}

/// Tag-S/L decoder
#[derive(Debug)]
pub struct TagSlDecoder {
    table: PortTable,
}

impl TagSlDecoder {
    pub fn new(options: DecodeOptions) -> Self {
        Self {
            table: port_table(options),
        }
    }
}

impl Default for TagSlDecoder {
    fn default() -> Self {
        Self::new(DecodeOptions::default())
    }
}

#[async_trait]
impl UplinkDecoder for TagSlDecoder {
    fn name(&self) -> &'static str {
        "tagsl"
    }

    fn ports(&self) -> Vec<u8> {
        self.table.ports().collect()
    }

    fn port_features(&self, port: u8) -> Option<&FeatureSet> {
        self.table.features(port)
    }

    async fn decode(&self, payload: &str, port: u8, _ctx: &UplinkContext) -> Result<Decoded> {
        self.table.decode(payload, port)
    }

    fn encode(&self, data: &dyn UplinkData, port: u8) -> Result<String> {
        self.table.encode(data, port)
    }
}
