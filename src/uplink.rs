//! # Decoded Uplink
//!
//! The envelope returned by every decoder: the declared features and the data
//! implementing them.

use std::fmt;

use serde_json::json;

use crate::error::{DecoderError, Result, ValidationErrors};
use crate::feature::{supports, Feature, FeatureSet, UplinkData};

/// An immutable pair of declared features and decoded data
pub struct DecodedUplink {
    features: FeatureSet,
    data: Box<dyn UplinkData>,
}

impl DecodedUplink {
    /// Pair `features` with `data`
    ///
    /// Every declared feature must be implemented by `data`; a mismatch is a
    /// layout bug and trips a debug assertion.
    pub fn new(features: impl Into<FeatureSet>, data: Box<dyn UplinkData>) -> Self {
        let features = features.into();
        debug_assert!(
            features.iter().all(|f| supports(data.as_ref(), f)),
            "declared features {:?} not all implemented by {:?}",
            features,
            data
        );
        Self { features, data }
    }

    /// Whether the uplink declares `feature`
    pub fn is(&self, feature: Feature) -> bool {
        self.features.contains(feature)
    }

    pub fn features(&self) -> &FeatureSet {
        &self.features
    }

    pub fn data(&self) -> &dyn UplinkData {
        self.data.as_ref()
    }

    pub fn into_data(self) -> Box<dyn UplinkData> {
        self.data
    }

    /// Concrete data type, when the caller knows it
    pub fn downcast_ref<T: UplinkData>(&self) -> Option<&T> {
        self.data.as_any().downcast_ref::<T>()
    }

    /// `{"features": [...], "data": {...}}`
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "features": self.features,
            "data": self.data.to_json(),
        })
    }
}

impl fmt::Debug for DecodedUplink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodedUplink")
            .field("features", &self.features.as_slice())
            .field("data", &self.data)
            .finish()
    }
}

/// A decode result: the uplink and any non-fatal validation failures
#[derive(Debug)]
pub struct Decoded {
    pub uplink: DecodedUplink,
    pub validation: Option<ValidationErrors>,
}

impl Decoded {
    pub fn new(uplink: DecodedUplink, validation: Option<ValidationErrors>) -> Self {
        Self { uplink, validation }
    }

    /// Turn validation failures into an error
    pub fn into_strict(self) -> Result<DecodedUplink> {
        match self.validation {
            Some(errors) => Err(DecoderError::Validation(errors)),
            None => Ok(self.uplink),
        }
    }
}

impl From<DecodedUplink> for Decoded {
    fn from(uplink: DecodedUplink) -> Self {
        Self::new(uplink, None)
    }
}
