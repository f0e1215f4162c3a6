//! Solved position exposed through the capabilities its features declare

use std::any::Any;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::feature::{Buffered, Feature, FeatureSet, Gnss, Moving, Timestamp, UplinkData};
use crate::uplink::DecodedUplink;

/// Position returned by a solver together with the uplink context it was
/// requested with
///
/// A single type covers every combination of GNSS, Timestamp, Buffered and
/// Moving: each capability accessor answers only when its feature was
/// assembled into `features`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SolvedPosition {
    pub dev_eui: String,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    /// Meters
    pub accuracy: Option<f64>,
    pub pdop: Option<f64>,
    /// Capture instant reported by the solver
    pub captured_at: Option<DateTime<Utc>>,
    /// Capture instant the device reported in the uplink
    pub timestamp: Option<DateTime<Utc>>,
    pub moving: Option<bool>,
    pub buffered: bool,
    #[serde(skip)]
    features: FeatureSet,
}

impl SolvedPosition {
    /// Position without any feature assembled yet
    pub fn new(dev_eui: impl Into<String>) -> Self {
        Self {
            dev_eui: dev_eui.into(),
            latitude: 0.0,
            longitude: 0.0,
            altitude: 0.0,
            accuracy: None,
            pdop: None,
            captured_at: None,
            timestamp: None,
            moving: None,
            buffered: false,
            features: FeatureSet::new(),
        }
    }

    /// Attach a valid fix and declare GNSS
    pub fn with_fix(mut self, latitude: f64, longitude: f64, altitude: f64) -> Self {
        self.latitude = latitude;
        self.longitude = longitude;
        self.altitude = altitude;
        self.features.insert(Feature::Gnss);
        self
    }

    /// Declare the device timestamp, and Buffered when `buffered`
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>, buffered: bool) -> Self {
        self.timestamp = Some(timestamp);
        self.features.insert(Feature::Timestamp);
        if buffered {
            self.buffered = true;
            self.features.insert(Feature::Buffered);
        }
        self
    }

    pub fn with_moving(mut self, moving: bool) -> Self {
        self.moving = Some(moving);
        self.features.insert(Feature::Moving);
        self
    }

    pub fn features(&self) -> &FeatureSet {
        &self.features
    }

    pub fn into_uplink(self) -> DecodedUplink {
        DecodedUplink::new(self.features.clone(), Box::new(self))
    }
}

impl Gnss for SolvedPosition {
    fn latitude(&self) -> f64 {
        self.latitude
    }

    fn longitude(&self) -> f64 {
        self.longitude
    }

    fn altitude(&self) -> f64 {
        self.altitude
    }

    fn accuracy(&self) -> Option<f64> {
        self.accuracy
    }

    fn pdop(&self) -> Option<f64> {
        self.pdop
    }
}

impl Timestamp for SolvedPosition {
    fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }
}

impl Buffered for SolvedPosition {
    fn is_buffered(&self) -> bool {
        self.buffered
    }
}

impl Moving for SolvedPosition {
    fn is_moving(&self) -> bool {
        self.moving.unwrap_or_default()
    }
}

impl UplinkData for SolvedPosition {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    fn as_gnss(&self) -> Option<&dyn Gnss> {
        self.features.contains(Feature::Gnss).then_some(self as &dyn Gnss)
    }

    fn as_timestamp(&self) -> Option<&dyn Timestamp> {
        self.features.contains(Feature::Timestamp).then_some(self as &dyn Timestamp)
    }

    fn as_buffered(&self) -> Option<&dyn Buffered> {
        self.features.contains(Feature::Buffered).then_some(self as &dyn Buffered)
    }

    fn as_moving(&self) -> Option<&dyn Moving> {
        self.features.contains(Feature::Moving).then_some(self as &dyn Moving)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capabilities_follow_features() {
        let bare = SolvedPosition::new("0011223344556677");
        assert!(bare.features().is_empty());
        assert!(bare.as_gnss().is_none());
        assert!(bare.as_moving().is_none());

        let at = "2025-09-05T11:30:13Z".parse().unwrap();
        let full = SolvedPosition::new("0011223344556677")
            .with_fix(47.0, 7.6, 500.0)
            .with_timestamp(at, true)
            .with_moving(false);
        assert_eq!(
            full.features().as_slice(),
            &[Feature::Gnss, Feature::Timestamp, Feature::Buffered, Feature::Moving]
        );
        assert_eq!(full.as_gnss().unwrap().latitude(), 47.0);
        assert!(full.as_buffered().unwrap().is_buffered());
        assert!(!full.as_moving().unwrap().is_moving());
        assert_eq!(full.as_timestamp().unwrap().timestamp(), Some(at));
    }

    #[test]
    fn test_timestamp_without_buffered() {
        let at = "2025-09-05T11:30:13Z".parse().unwrap();
        let uplink = SolvedPosition::new("0011223344556677").with_timestamp(at, false).into_uplink();
        assert!(uplink.is(Feature::Timestamp));
        assert!(!uplink.is(Feature::Buffered));
        assert!(uplink.data().as_buffered().is_none());
    }
}
