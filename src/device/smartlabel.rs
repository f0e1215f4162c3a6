//! # Smart Label
//!
//! Low-cost label tracker with an energy-harvesting cell. GNSS blobs on port
//! 192 are solved remotely; the second hardware generation adds an
//! environmental sensor report and a second Wi-Fi port.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::common::ResetCause;
use crate::device::caps::{battery, firmware_version, hardware_version, humidity, pressure, reset_reason, temperature};
use crate::device::fields::{self, MILLIVOLTS};
use crate::device::wifi::TaggedWifiLayout;
use crate::device::{DecodeOptions, PortTable, UplinkContext, UplinkDecoder};
use crate::error::{DecoderError, Result};
use crate::feature::{uplink_data, Config, Feature, FeatureSet, Photovoltaic, UplinkData};
use crate::payload::{record, FieldDescriptor, PayloadConfig, Transform};
use crate::solver::{PositionSolver, SolverOptions, SOLVER_PORT};
use crate::uplink::Decoded;

/// Hardware generation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmartLabelVersion {
    #[default]
    V1,
    V2,
}

record! {
    /// Battery and harvesting cell voltages
    pub struct Voltages : VoltagesField {
        battery_voltage: f64 => BatteryVoltage,
        photovoltaic_voltage: f64 => PhotovoltaicVoltage,
    }
}

battery!(Voltages);

impl Photovoltaic for Voltages {
    fn photovoltaic_voltage(&self) -> f64 {
        self.photovoltaic_voltage
    }
}

uplink_data!(Voltages, Battery, Photovoltaic);

record! {
    pub struct Climate : ClimateField {
        temperature: f64 => Temperature,
        /// Percent, half-percent resolution
        humidity: f64 => Humidity,
    }
}

temperature!(Climate);
humidity!(Climate);
uplink_data!(Climate, Temperature, Humidity);

record! {
    /// Tracking configuration with firmware identification
    pub struct LabelConfig : LabelConfigField {
        moving_interval: u32 => MovingInterval,
        steady_interval: u32 => SteadyInterval,
        heartbeat_interval: u32 => HeartbeatInterval,
        gnss_timeout: u16 => GnssTimeout,
        firmware_version: String => FirmwareVersion,
        hardware_version: String => HardwareVersion,
    }
}

impl Config for LabelConfig {
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
}

firmware_version!(LabelConfig);
hardware_version!(LabelConfig);
uplink_data!(LabelConfig, Config, FirmwareVersion, HardwareVersion);

record! {
    /// Accelerometer and radio settings
    pub struct RadioConfig : RadioConfigField {
        acceleration_threshold: u16 => AccelerationThreshold,
        acceleration_delay: u16 => AccelerationDelay,
        heartbeat_interval: u16 => HeartbeatInterval,
        uplink_interval: u16 => UplinkInterval,
        /// `SF<n>`
        static_sf: String => StaticSf,
    }
}

impl Config for RadioConfig {
    fn heartbeat_interval(&self) -> Option<u32> {
        Some(u32::from(self.heartbeat_interval))
    }
}

uplink_data!(RadioConfig, Config);

record! {
    pub struct Reset : ResetField {
        reset_reason: ResetCause => ResetReason,
    }
}

reset_reason!(Reset);
uplink_data!(Reset, ResetReason);

record! {
    /// Environmental report of the second generation
    pub struct Environment : EnvironmentField {
        temperature: f64 => Temperature,
        humidity: f64 => Humidity,
        /// hPa
        pressure: f64 => Pressure,
        battery_voltage: f64 => BatteryVoltage,
    }
}

temperature!(Environment);
humidity!(Environment);
pressure!(Environment);
battery!(Environment);
uplink_data!(Environment, Temperature, Humidity, Pressure, Battery);

fn humidity_field<F>(field: F, start: usize) -> FieldDescriptor<F> {
    FieldDescriptor::new(field, start, 1).transform(Transform::Scaled { divisor: 2.0, signed: false })
}

fn port1() -> PayloadConfig<Voltages> {
    use VoltagesField::*;

    PayloadConfig::new(
        vec![
            fields::millivolts(BatteryVoltage, 0),
            fields::scaled_u16(PhotovoltaicVoltage, 2, MILLIVOLTS),
        ],
        &[Feature::Battery, Feature::Photovoltaic],
    )
}

fn port2() -> PayloadConfig<Climate> {
    use ClimateField::*;

    PayloadConfig::new(
        vec![fields::centi_celsius(Temperature, 0), humidity_field(Humidity, 2)],
        &[Feature::Temperature, Feature::Humidity],
    )
}

fn port4() -> PayloadConfig<LabelConfig> {
    use LabelConfigField::*;

    PayloadConfig::new(
        vec![
            FieldDescriptor::new(MovingInterval, 0, 4),
            FieldDescriptor::new(SteadyInterval, 4, 4),
            FieldDescriptor::new(HeartbeatInterval, 8, 4),
            FieldDescriptor::new(GnssTimeout, 12, 2),
            fields::version(FirmwareVersion, 14, 3),
            fields::version(HardwareVersion, 17, 2),
        ],
        &[Feature::Config, Feature::FirmwareVersion, Feature::HardwareVersion],
    )
}

fn port11() -> PayloadConfig<RadioConfig> {
    use RadioConfigField::*;

    PayloadConfig::new(
        vec![
            FieldDescriptor::new(AccelerationThreshold, 0, 2),
            FieldDescriptor::new(AccelerationDelay, 2, 2),
            FieldDescriptor::new(HeartbeatInterval, 4, 2),
            FieldDescriptor::new(UplinkInterval, 6, 2),
            FieldDescriptor::new(StaticSf, 8, 1).transform(Transform::SpreadingFactor),
        ],
        &[Feature::Config],
    )
}

fn port150() -> PayloadConfig<Reset> {
    PayloadConfig::new(
        vec![FieldDescriptor::new(ResetField::ResetReason, 0, 1)],
        &[Feature::ResetReason],
    )
}

fn port180() -> PayloadConfig<Environment> {
    use EnvironmentField::*;

    PayloadConfig::new(
        vec![
            fields::centi_celsius(Temperature, 0),
            humidity_field(Humidity, 2),
            fields::scaled_u16(Pressure, 3, 10.0),
            fields::millivolts(BatteryVoltage, 5),
        ],
        &[Feature::Temperature, Feature::Humidity, Feature::Pressure, Feature::Battery],
    )
}

/// Locally parsed ports of a hardware generation
pub fn port_table(version: SmartLabelVersion, options: DecodeOptions) -> PortTable {
    let mut table = PortTable::new(options)
        .with(1, port1())
        .with(2, port2())
        .with(4, port4())
        .with(11, port11())
        .with(150, port150());
    table.insert(197, Box::new(TaggedWifiLayout::new(197)));

    if version == SmartLabelVersion::V2 {
        table = table.with(180, port180());
        table.insert(190, Box::new(TaggedWifiLayout::new(190)));
    }
    table
}

/// Smart-label decoder
pub struct SmartLabelDecoder {
    version: SmartLabelVersion,
    table: PortTable,
    solver: Option<Arc<dyn PositionSolver>>,
}

impl fmt::Debug for SmartLabelDecoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmartLabelDecoder")
            .field("version", &self.version)
            .field("table", &self.table)
            .field("solver", &self.solver.as_ref().map(|s| s.name()))
            .finish()
    }
}

impl SmartLabelDecoder {
    pub fn new(
        version: SmartLabelVersion,
        options: DecodeOptions,
        solver: Option<Arc<dyn PositionSolver>>,
    ) -> Self {
        Self {
            version,
            table: port_table(version, options),
            solver,
        }
    }

    pub fn version(&self) -> SmartLabelVersion {
        self.version
    }
}

#[async_trait]
impl UplinkDecoder for SmartLabelDecoder {
    fn name(&self) -> &'static str {
        match self.version {
            SmartLabelVersion::V1 => "smartlabel",
            SmartLabelVersion::V2 => "smartlabel-v2",
        }
    }

    fn ports(&self) -> Vec<u8> {
        let mut ports: Vec<u8> = self.table.ports().chain([SOLVER_PORT]).collect();
        ports.sort_unstable();
        ports
    }

    fn port_features(&self, port: u8) -> Option<&FeatureSet> {
        self.table.features(port)
    }

    async fn decode(&self, payload: &str, port: u8, ctx: &UplinkContext) -> Result<Decoded> {
        if port != SOLVER_PORT {
            return self.table.decode(payload, port);
        }

        let solver = self.solver.as_ref().ok_or(DecoderError::SolverNotConfigured(port))?;
        let options = SolverOptions::new(ctx.dev_eui.clone(), ctx.f_count, SOLVER_PORT);
        let uplink = solver.solve(payload, &options, &ctx.cancel).await?;
        Ok(Decoded::from(uplink))
    }

    fn encode(&self, data: &dyn UplinkData, port: u8) -> Result<String> {
        self.table.encode(data, port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::mocks::RecordingSolver;

    fn decoder(version: SmartLabelVersion) -> SmartLabelDecoder {
        SmartLabelDecoder::new(version, DecodeOptions::default(), None)
    }

    async fn decode(version: SmartLabelVersion, payload: &str, port: u8) -> Decoded {
        let ctx = UplinkContext::new("0011223344556677", 1);
        decoder(version).decode(payload, port, &ctx).await.unwrap()
    }

    #[tokio::test]
    async fn test_voltages() {
        let decoded = decode(SmartLabelVersion::V1, "0ee50bb8", 1).await;
        let data = decoded.uplink.data();
        assert_eq!(data.as_battery().unwrap().battery_voltage(), 3.813);
        assert_eq!(data.as_photovoltaic().unwrap().photovoltaic_voltage(), 3.0);
        assert_eq!(decoded.uplink.features().as_slice(), &[Feature::Battery, Feature::Photovoltaic]);
    }

    #[tokio::test]
    async fn test_climate() {
        let decoded = decode(SmartLabelVersion::V1, "0a2e5b", 2).await;
        let climate = decoded.uplink.downcast_ref::<Climate>().unwrap();
        assert_eq!(climate.temperature, 26.06);
        assert_eq!(climate.humidity, 45.5);
    }

    #[tokio::test]
    async fn test_label_config() {
        let decoded = decode(SmartLabelVersion::V1, "0000012c00000e1000015180005a0104020301", 4).await;
        let config = decoded.uplink.downcast_ref::<LabelConfig>().unwrap();
        assert_eq!(config.moving_interval, 300);
        assert_eq!(config.heartbeat_interval, 86400);
        assert_eq!(config.gnss_timeout, 90);
        assert_eq!(config.firmware_version, "1.4.2");
        assert_eq!(config.hardware_version, "3.1");
        assert_eq!(decoded.uplink.data().as_config().unwrap().steady_interval(), Some(3600));
    }

    #[tokio::test]
    async fn test_radio_config_spreading_factor() {
        let decoded = decode(SmartLabelVersion::V1, "006403e80e10012c09", 11).await;
        let config = decoded.uplink.downcast_ref::<RadioConfig>().unwrap();
        assert_eq!(config.acceleration_threshold, 100);
        assert_eq!(config.acceleration_delay, 1000);
        assert_eq!(config.uplink_interval, 300);
        assert_eq!(config.static_sf, "SF9");
        assert_eq!(decoded.uplink.data().as_config().unwrap().heartbeat_interval(), Some(3600));
    }

    #[tokio::test]
    async fn test_reset_reason() {
        let decoded = decode(SmartLabelVersion::V1, "03", 150).await;
        assert_eq!(
            decoded.uplink.data().as_reset_reason().unwrap().reset_reason(),
            ResetCause::Watchdog
        );
    }

    #[tokio::test]
    async fn test_wifi_port() {
        let decoded = decode(SmartLabelVersion::V1, "01b5aabbccddeeff", 197).await;
        assert!(decoded.uplink.is(Feature::WiFi));
        assert!(decoded.uplink.data().as_moving().unwrap().is_moving());
    }

    #[tokio::test]
    async fn test_v2_ports() {
        let decoded = decode(SmartLabelVersion::V2, "0a2e5a27a60ee5", 180).await;
        let env = decoded.uplink.downcast_ref::<Environment>().unwrap();
        assert_eq!(env.temperature, 26.06);
        assert_eq!(env.humidity, 45.0);
        assert_eq!(env.pressure, 1015.0);
        assert_eq!(env.battery_voltage, 3.813);

        let decoded = decode(SmartLabelVersion::V2, "02002ab5aabbccddeeff", 190).await;
        assert!(decoded.uplink.is(Feature::SequenceNumber));
    }

    #[tokio::test]
    async fn test_v2_ports_unknown_to_v1() {
        let ctx = UplinkContext::new("0011223344556677", 1);
        let v1 = decoder(SmartLabelVersion::V1);
        for port in [180, 190] {
            let err = v1.decode("00", port, &ctx).await.unwrap_err();
            assert!(matches!(err, DecoderError::PortNotSupported(p) if p == port));
        }
        assert_eq!(v1.ports(), vec![1, 2, 4, 11, 150, 192, 197]);
        assert_eq!(decoder(SmartLabelVersion::V2).ports(), vec![1, 2, 4, 11, 150, 180, 190, 192, 197]);
    }

    #[tokio::test]
    async fn test_gnss_port_without_solver() {
        let ctx = UplinkContext::new("0011223344556677", 1);
        let err = decoder(SmartLabelVersion::V1).decode("80aabb", 192, &ctx).await.unwrap_err();
        assert!(matches!(err, DecoderError::SolverNotConfigured(192)));
    }

    #[tokio::test]
    async fn test_gnss_port_forwards_to_solver() {
        let solver = RecordingSolver::new();
        let decoder = SmartLabelDecoder::new(
            SmartLabelVersion::V1,
            DecodeOptions::default(),
            Some(Arc::new(solver.clone())),
        );
        let ctx = UplinkContext::new("0011223344556677", 9);

        let decoded = decoder.decode("80aabb", 192, &ctx).await.unwrap();
        assert!(decoded.uplink.is(Feature::Gnss));

        let calls = solver.get_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "80aabb");
        assert_eq!(calls[0].1, SolverOptions::new("0011223344556677", 9, SOLVER_PORT));
    }

    #[test]
    fn test_encode_round_trip() {
        let decoder = decoder(SmartLabelVersion::V2);
        for (hex, port) in [
            ("0ee50bb8", 1),
            ("0a2e5b", 2),
            ("006403e80e10012c09", 11),
            ("0a2e5a27a60ee5", 180),
            ("01b5aabbccddeeff", 197),
        ] {
            let decoded = decoder.table.decode(hex, port).unwrap();
            assert_eq!(decoder.encode(decoded.uplink.data(), port).unwrap(), hex, "port {port}");
        }
    }
}
