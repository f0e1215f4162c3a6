//! # nomad-XS
//!
//! Outdoor GNSS tracker with an environmental and inertial sensor block.

use std::time::Duration;

use async_trait::async_trait;

use crate::device::caps::{duty_cycle, moving, pressure, temperature, timestamp};
use crate::device::fields::{self, DECIMETERS};
use crate::device::{shared, DecodeOptions, PortTable, UplinkContext, UplinkDecoder};
use crate::error::Result;
use crate::feature::{uplink_data, Feature, FeatureSet, UplinkData};
use crate::payload::{record, Check, FieldDescriptor, PayloadConfig};
use crate::uplink::Decoded;

record! {
    /// GNSS fix with sensor readings
    pub struct NomadXsFix : NomadXsFixField {
        duty_cycle: bool => DutyCycle,
        config_id: u8 => ConfigId,
        config_change: bool => ConfigChange,
        moving: bool => Moving,
        latitude: f64 => Latitude [Check::LATITUDE],
        longitude: f64 => Longitude [Check::LONGITUDE],
        altitude: f64 => Altitude,
        year: u8 => Year,
        month: u8 => Month [Check::MONTH],
        day: u8 => Day [Check::DAY],
        hour: u8 => Hour [Check::HOUR],
        minute: u8 => Minute [Check::MINUTE],
        second: u8 => Second [Check::SECOND],
        ttf: Duration => Ttf,
        ambient_light: u16 => AmbientLight,
        /// Milli-g
        acceleration_x: i16 => AccelerationX,
        acceleration_y: i16 => AccelerationY,
        acceleration_z: i16 => AccelerationZ,
        temperature: f64 => Temperature,
        /// hPa
        pressure: f64 => Pressure,
        /// Degrees per second
        gyroscope_x: Option<f64> => GyroscopeX,
        gyroscope_y: Option<f64> => GyroscopeY,
        gyroscope_z: Option<f64> => GyroscopeZ,
        /// Gauss
        magnetometer_x: Option<f64> => MagnetometerX,
        magnetometer_y: Option<f64> => MagnetometerY,
        magnetometer_z: Option<f64> => MagnetometerZ,
    }
}

impl crate::feature::Gnss for NomadXsFix {
    fn latitude(&self) -> f64 {
        self.latitude
    }

    fn longitude(&self) -> f64 {
        self.longitude
    }

    fn altitude(&self) -> f64 {
        self.altitude
    }

    fn ttf(&self) -> Option<Duration> {
        Some(self.ttf)
    }
}

timestamp!(NomadXsFix, +time_of_fix);
moving!(NomadXsFix);
duty_cycle!(NomadXsFix);
temperature!(NomadXsFix);
pressure!(NomadXsFix);
uplink_data!(NomadXsFix, Gnss, Timestamp, Moving, DutyCycle, Temperature, Pressure);

fn port1() -> PayloadConfig<NomadXsFix> {
    use NomadXsFixField::*;

    PayloadConfig::new(
        vec![
            fields::duty_cycle(DutyCycle, 0),
            fields::config_id(ConfigId, 0),
            fields::config_change(ConfigChange, 0),
            fields::flag(Moving, 0),
            fields::coordinate(Latitude, 1),
            fields::coordinate(Longitude, 5),
            fields::scaled_u16(Altitude, 9, DECIMETERS),
            FieldDescriptor::new(Year, 11, 1),
            FieldDescriptor::new(Month, 12, 1),
            FieldDescriptor::new(Day, 13, 1),
            FieldDescriptor::new(Hour, 14, 1),
            FieldDescriptor::new(Minute, 15, 1),
            FieldDescriptor::new(Second, 16, 1),
            fields::seconds(Ttf, 17, 1),
            FieldDescriptor::new(AmbientLight, 18, 2),
            FieldDescriptor::new(AccelerationX, 20, 2),
            FieldDescriptor::new(AccelerationY, 22, 2),
            FieldDescriptor::new(AccelerationZ, 24, 2),
            fields::centi_celsius(Temperature, 26),
            fields::scaled_u16(Pressure, 28, 10.0),
            fields::scaled_i16(GyroscopeX, 30, 10.0).optional(),
            fields::scaled_i16(GyroscopeY, 32, 10.0).optional(),
            fields::scaled_i16(GyroscopeZ, 34, 10.0).optional(),
            fields::scaled_i16(MagnetometerX, 36, 1000.0).optional(),
            fields::scaled_i16(MagnetometerY, 38, 1000.0).optional(),
            fields::scaled_i16(MagnetometerZ, 40, 1000.0).optional(),
        ],
        &[
            Feature::Gnss,
            Feature::Timestamp,
            Feature::Moving,
            Feature::DutyCycle,
            Feature::Temperature,
            Feature::Pressure,
        ],
    )
}

/// Port table of the nomad-XS
pub fn port_table(options: DecodeOptions) -> PortTable {
    PortTable::new(options)
        .with(1, port1())
        .with(4, shared::config_v1())
        .with(15, shared::battery_status())
}

/// nomad-XS decoder
#[derive(Debug)]
pub struct NomadXsDecoder {
    table: PortTable,
}

impl NomadXsDecoder {
    pub fn new(options: DecodeOptions) -> Self {
        Self {
            table: port_table(options),
        }
    }
}

impl Default for NomadXsDecoder {
    fn default() -> Self {
        Self::new(DecodeOptions::default())
    }
}

#[async_trait]
impl UplinkDecoder for NomadXsDecoder {
    fn name(&self) -> &'static str {
        "nomadxs"
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DecoderError;

    const FIX: &str = "0102cdcd1300744f5e166018040b14341a1e00c803e8fc1800000a2e27a6";

    #[tokio::test]
    async fn test_fix_with_sensor_block() {
        let decoder = NomadXsDecoder::default();
        let ctx = UplinkContext::new("0011223344556677", 1);
        let decoded = decoder.decode(FIX, 1, &ctx).await.unwrap();

        let fix = decoded.uplink.downcast_ref::<NomadXsFix>().unwrap();
        assert!(fix.moving);
        assert_eq!(fix.altitude, 572.8);
        assert_eq!(fix.ttf, Duration::from_secs(30));
        assert_eq!(fix.ambient_light, 200);
        assert_eq!((fix.acceleration_x, fix.acceleration_y, fix.acceleration_z), (1000, -1000, 0));
        assert_eq!(fix.temperature, 26.06);
        assert_eq!(fix.pressure, 1015.0);
        assert_eq!(fix.gyroscope_x, None);
        assert_eq!(fix.magnetometer_z, None);

        assert!(decoded.uplink.is(Feature::Pressure));
        assert_eq!(decoded.uplink.data().as_gnss().unwrap().ttf(), Some(Duration::from_secs(30)));
    }

    #[tokio::test]
    async fn test_fix_with_gyroscope_and_magnetometer() {
        let decoder = NomadXsDecoder::default();
        let ctx = UplinkContext::new("0011223344556677", 1);
        let payload = format!("{FIX}0064ff9c000001f4fe0c0000");
        let decoded = decoder.decode(&payload, 1, &ctx).await.unwrap();

        let fix = decoded.uplink.downcast_ref::<NomadXsFix>().unwrap();
        assert_eq!(fix.gyroscope_x, Some(10.0));
        assert_eq!(fix.gyroscope_y, Some(-10.0));
        assert_eq!(fix.gyroscope_z, Some(0.0));
        assert_eq!(fix.magnetometer_x, Some(0.5));
        assert_eq!(fix.magnetometer_y, Some(-0.5));
    }

    #[tokio::test]
    async fn test_battery_port_shared_with_tagsl() {
        let decoder = NomadXsDecoder::default();
        let ctx = UplinkContext::default();
        let decoded = decoder.decode("800ee5", 15, &ctx).await.unwrap();
        assert_eq!(decoded.uplink.data().as_battery().unwrap().battery_voltage(), 3.813);
    }

    #[tokio::test]
    async fn test_unknown_port() {
        let decoder = NomadXsDecoder::default();
        let err = decoder.decode("00", 5, &UplinkContext::default()).await.unwrap_err();
        assert!(matches!(err, DecoderError::PortNotSupported(5)));
        assert_eq!(decoder.ports(), vec![1, 4, 15]);
    }

    #[test]
    fn test_encode_round_trip() {
        let decoder = NomadXsDecoder::default();
        let decoded = port_table(DecodeOptions::default()).decode(FIX, 1).unwrap();
        assert_eq!(decoder.encode(decoded.uplink.data(), 1).unwrap(), FIX);
    }
}
