//! # Tracker Decoder Library
//!
//! Decode LPWAN uplinks from Tag-S/L, Tag-XL, nomad-XS and smart-label asset
//! trackers.
//!
//! A hex payload and its port are dispatched to a per-device layout, parsed
//! into a typed record and returned as a [`DecodedUplink`](uplink::DecodedUplink)
//! whose declared features say which capability views the record offers.
//! Encrypted GNSS blobs are forwarded to a position solver and come back in
//! the same shape.

pub mod common;
pub mod config;
pub mod device;
pub mod error;
pub mod feature;
pub mod gnssng;
pub mod payload;
pub mod solver;
pub mod uplink;

pub use device::{DecodeOptions, UplinkContext, UplinkDecoder};
pub use error::{DecoderError, Result};
pub use feature::{Feature, FeatureSet, UplinkData};
pub use uplink::{Decoded, DecodedUplink};
