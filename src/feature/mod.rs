//! # Feature Module
//!
//! Capability tags and the polymorphic data interface of decoded uplinks.
//!
//! A decoded record implements any number of capability traits. The
//! [`UplinkData`] trait exposes each of them through a typed down-cast
//! (`as_gnss()`, `as_battery()`, ...) so consumers holding a
//! `Box<dyn UplinkData>` can reach them without knowing the concrete type.
//! Which capabilities an uplink actually carries is declared by its
//! [`FeatureSet`], which consumers consult first.

mod capability;

use std::any::Any;
use std::fmt;

use serde::ser::{Serialize, SerializeSeq, Serializer};

pub use capability::{
    Battery, Button, Buffered, Config, ConfigChange, DutyCycle, FirmwareVersion, Gnss, HardwareVersion,
    Humidity, Moving, Photovoltaic, Pressure, ResetReason, RotationState, SequenceNumber, Temperature,
    Timestamp, WiFi,
};

/// A capability a decoded uplink may declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Feature {
    Timestamp,
    Gnss,
    Buffered,
    Battery,
    Photovoltaic,
    Temperature,
    Humidity,
    Pressure,
    WiFi,
    Moving,
    DutyCycle,
    Config,
    ConfigChange,
    FirmwareVersion,
    HardwareVersion,
    Button,
    ResetReason,
    RotationState,
    SequenceNumber,
}

impl Feature {
    pub const ALL: [Feature; 19] = [
        Feature::Timestamp,
        Feature::Gnss,
        Feature::Buffered,
        Feature::Battery,
        Feature::Photovoltaic,
        Feature::Temperature,
        Feature::Humidity,
        Feature::Pressure,
        Feature::WiFi,
        Feature::Moving,
        Feature::DutyCycle,
        Feature::Config,
        Feature::ConfigChange,
        Feature::FirmwareVersion,
        Feature::HardwareVersion,
        Feature::Button,
        Feature::ResetReason,
        Feature::RotationState,
        Feature::SequenceNumber,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Feature::Timestamp => "Timestamp",
            Feature::Gnss => "GNSS",
            Feature::Buffered => "Buffered",
            Feature::Battery => "Battery",
            Feature::Photovoltaic => "Photovoltaic",
            Feature::Temperature => "Temperature",
            Feature::Humidity => "Humidity",
            Feature::Pressure => "Pressure",
            Feature::WiFi => "WiFi",
            Feature::Moving => "Moving",
            Feature::DutyCycle => "DutyCycle",
            Feature::Config => "Config",
            Feature::ConfigChange => "ConfigChange",
            Feature::FirmwareVersion => "FirmwareVersion",
            Feature::HardwareVersion => "HardwareVersion",
            Feature::Button => "Button",
            Feature::ResetReason => "ResetReason",
            Feature::RotationState => "RotationState",
            Feature::SequenceNumber => "SequenceNumber",
        }
    }

    fn bit(self) -> u32 {
        1 << (self as u8)
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Feature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Ordered set of features with constant-time membership
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureSet {
    order: Vec<Feature>,
    mask: u32,
}

impl FeatureSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a feature, returning `false` when it was already present
    pub fn insert(&mut self, feature: Feature) -> bool {
        if self.contains(feature) {
            return false;
        }
        self.mask |= feature.bit();
        self.order.push(feature);
        true
    }

    pub fn contains(&self, feature: Feature) -> bool {
        self.mask & feature.bit() != 0
    }

    /// Features in the order they were declared
    pub fn iter(&self) -> impl Iterator<Item = Feature> + '_ {
        self.order.iter().copied()
    }

    pub fn as_slice(&self) -> &[Feature] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl From<&[Feature]> for FeatureSet {
    fn from(features: &[Feature]) -> Self {
        features.iter().copied().collect()
    }
}

impl<const N: usize> From<[Feature; N]> for FeatureSet {
    fn from(features: [Feature; N]) -> Self {
        features.into_iter().collect()
    }
}

impl FromIterator<Feature> for FeatureSet {
    fn from_iter<I: IntoIterator<Item = Feature>>(iter: I) -> Self {
        let mut set = FeatureSet::new();
        for feature in iter {
            set.insert(feature);
        }
        set
    }
}

impl Extend<Feature> for FeatureSet {
    fn extend<I: IntoIterator<Item = Feature>>(&mut self, iter: I) {
        for feature in iter {
            self.insert(feature);
        }
    }
}

impl Serialize for FeatureSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.order.len()))?;
        for feature in &self.order {
            seq.serialize_element(feature)?;
        }
        seq.end()
    }
}

/// Data carried by a decoded uplink
///
/// Every capability accessor defaults to `None`; implementors override the
/// ones they support, normally through [`uplink_data!`].
pub trait UplinkData: Any + Send + Sync + fmt::Debug {
    fn as_any(&self) -> &dyn Any;

    fn to_json(&self) -> serde_json::Value;

    fn as_timestamp(&self) -> Option<&dyn Timestamp> {
        None
    }

    fn as_gnss(&self) -> Option<&dyn Gnss> {
        None
    }

    fn as_buffered(&self) -> Option<&dyn Buffered> {
        None
    }

    fn as_battery(&self) -> Option<&dyn Battery> {
        None
    }

    fn as_photovoltaic(&self) -> Option<&dyn Photovoltaic> {
        None
    }

    fn as_temperature(&self) -> Option<&dyn Temperature> {
        None
    }

    fn as_humidity(&self) -> Option<&dyn Humidity> {
        None
    }

    fn as_pressure(&self) -> Option<&dyn Pressure> {
        None
    }

    fn as_wifi(&self) -> Option<&dyn WiFi> {
        None
    }

    fn as_moving(&self) -> Option<&dyn Moving> {
        None
    }

    fn as_duty_cycle(&self) -> Option<&dyn DutyCycle> {
        None
    }

    fn as_config(&self) -> Option<&dyn Config> {
        None
    }

    fn as_config_change(&self) -> Option<&dyn ConfigChange> {
        None
    }

    fn as_firmware_version(&self) -> Option<&dyn FirmwareVersion> {
        None
    }

    fn as_hardware_version(&self) -> Option<&dyn HardwareVersion> {
        None
    }

    fn as_button(&self) -> Option<&dyn Button> {
        None
    }

    fn as_reset_reason(&self) -> Option<&dyn ResetReason> {
        None
    }

    fn as_rotation_state(&self) -> Option<&dyn RotationState> {
        None
    }

    fn as_sequence_number(&self) -> Option<&dyn SequenceNumber> {
        None
    }
}

/// Whether `data` implements the capability trait behind `feature`
pub fn supports(data: &dyn UplinkData, feature: Feature) -> bool {
    match feature {
        Feature::Timestamp => data.as_timestamp().is_some(),
        Feature::Gnss => data.as_gnss().is_some(),
        Feature::Buffered => data.as_buffered().is_some(),
        Feature::Battery => data.as_battery().is_some(),
        Feature::Photovoltaic => data.as_photovoltaic().is_some(),
        Feature::Temperature => data.as_temperature().is_some(),
        Feature::Humidity => data.as_humidity().is_some(),
        Feature::Pressure => data.as_pressure().is_some(),
        Feature::WiFi => data.as_wifi().is_some(),
        Feature::Moving => data.as_moving().is_some(),
        Feature::DutyCycle => data.as_duty_cycle().is_some(),
        Feature::Config => data.as_config().is_some(),
        Feature::ConfigChange => data.as_config_change().is_some(),
        Feature::FirmwareVersion => data.as_firmware_version().is_some(),
        Feature::HardwareVersion => data.as_hardware_version().is_some(),
        Feature::Button => data.as_button().is_some(),
        Feature::ResetReason => data.as_reset_reason().is_some(),
        Feature::RotationState => data.as_rotation_state().is_some(),
        Feature::SequenceNumber => data.as_sequence_number().is_some(),
    }
}

/// Implement [`UplinkData`] for a serializable type, exposing the listed
/// capability traits
///
/// ```ignore
/// uplink_data!(Port15, Battery, DutyCycle);
/// ```
macro_rules! uplink_data {
    (@cap Timestamp) => {
        fn as_timestamp(&self) -> Option<&dyn $crate::feature::Timestamp> { Some(self) }
    };
    (@cap Gnss) => {
        fn as_gnss(&self) -> Option<&dyn $crate::feature::Gnss> { Some(self) }
    };
    (@cap Buffered) => {
        fn as_buffered(&self) -> Option<&dyn $crate::feature::Buffered> { Some(self) }
    };
    (@cap Battery) => {
        fn as_battery(&self) -> Option<&dyn $crate::feature::Battery> { Some(self) }
    };
    (@cap Photovoltaic) => {
        fn as_photovoltaic(&self) -> Option<&dyn $crate::feature::Photovoltaic> { Some(self) }
    };
    (@cap Temperature) => {
        fn as_temperature(&self) -> Option<&dyn $crate::feature::Temperature> { Some(self) }
    };
    (@cap Humidity) => {
        fn as_humidity(&self) -> Option<&dyn $crate::feature::Humidity> { Some(self) }
    };
    (@cap Pressure) => {
        fn as_pressure(&self) -> Option<&dyn $crate::feature::Pressure> { Some(self) }
    };
    (@cap WiFi) => {
        fn as_wifi(&self) -> Option<&dyn $crate::feature::WiFi> { Some(self) }
    };
    (@cap Moving) => {
        fn as_moving(&self) -> Option<&dyn $crate::feature::Moving> { Some(self) }
    };
    (@cap DutyCycle) => {
        fn as_duty_cycle(&self) -> Option<&dyn $crate::feature::DutyCycle> { Some(self) }
    };
    (@cap Config) => {
        fn as_config(&self) -> Option<&dyn $crate::feature::Config> { Some(self) }
    };
    (@cap ConfigChange) => {
        fn as_config_change(&self) -> Option<&dyn $crate::feature::ConfigChange> { Some(self) }
    };
    (@cap FirmwareVersion) => {
        fn as_firmware_version(&self) -> Option<&dyn $crate::feature::FirmwareVersion> { Some(self) }
    };
    (@cap HardwareVersion) => {
        fn as_hardware_version(&self) -> Option<&dyn $crate::feature::HardwareVersion> { Some(self) }
    };
    (@cap Button) => {
        fn as_button(&self) -> Option<&dyn $crate::feature::Button> { Some(self) }
    };
    (@cap ResetReason) => {
        fn as_reset_reason(&self) -> Option<&dyn $crate::feature::ResetReason> { Some(self) }
    };
    (@cap RotationState) => {
        fn as_rotation_state(&self) -> Option<&dyn $crate::feature::RotationState> { Some(self) }
    };
    (@cap SequenceNumber) => {
        fn as_sequence_number(&self) -> Option<&dyn $crate::feature::SequenceNumber> { Some(self) }
    };
    ($ty:ty $(, $cap:ident)* $(,)?) => {
        impl $crate::feature::UplinkData for $ty {
            fn as_any(&self) -> &dyn ::std::any::Any {
                self
            }

            fn to_json(&self) -> ::serde_json::Value {
                ::serde_json::to_value(self).unwrap_or(::serde_json::Value::Null)
            }

            $($crate::feature::uplink_data!(@cap $cap);)*
        }
    };
}

pub(crate) use uplink_data;

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, serde::Serialize)]
    struct Reading {
        battery: f64,
        moving: bool,
    }

    impl Battery for Reading {
        fn battery_voltage(&self) -> f64 {
            self.battery
        }
    }

    impl Moving for Reading {
        fn is_moving(&self) -> bool {
            self.moving
        }
    }

    uplink_data!(Reading, Battery, Moving);

    #[test]
    fn test_feature_set_keeps_order_and_dedups() {
        let mut set = FeatureSet::from([Feature::Gnss, Feature::Moving]);
        assert!(set.insert(Feature::Timestamp));
        assert!(!set.insert(Feature::Gnss));
        assert_eq!(set.as_slice(), &[Feature::Gnss, Feature::Moving, Feature::Timestamp]);
        assert!(set.contains(Feature::Moving));
        assert!(!set.contains(Feature::Buffered));
    }

    #[test]
    fn test_all_features_have_distinct_bits() {
        let set: FeatureSet = Feature::ALL.into_iter().collect();
        assert_eq!(set.len(), Feature::ALL.len());
    }

    #[test]
    fn test_feature_set_serializes_names() {
        let set = FeatureSet::from([Feature::Gnss, Feature::WiFi]);
        assert_eq!(serde_json::to_string(&set).unwrap(), r#"["GNSS","WiFi"]"#);
    }

    #[test]
    fn test_downcast_accessors() {
        let data: Box<dyn UplinkData> = Box::new(Reading { battery: 3.8, moving: true });
        assert_eq!(data.as_battery().map(|b| b.battery_voltage()), Some(3.8));
        assert!(data.as_moving().unwrap().is_moving());
        assert!(data.as_gnss().is_none());

        assert!(supports(data.as_ref(), Feature::Battery));
        assert!(!supports(data.as_ref(), Feature::WiFi));
        assert!(data.as_any().downcast_ref::<Reading>().is_some());
        assert_eq!(data.to_json()["battery"], 3.8);
    }
}
