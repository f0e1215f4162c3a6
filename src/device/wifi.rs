//! # Tagged Wi-Fi Scans
//!
//! Payload family used by smart-label ports 190/197 and the tag-XL Wi-Fi
//! ports. Byte 0 is a format tag:
//!
//! | Bit | Meaning |
//! |-----|---------|
//! | 0 | moving |
//! | 1 | 16-bit sequence number follows |
//! | 2 | 32-bit Unix timestamp follows |
//! | 7..4 | format version, must be 0 |
//!
//! The rest of the payload is `rssi(1) mac(6)` tuples; an RSSI byte of 0 means
//! the device did not report one.

use chrono::{DateTime, Utc};

use crate::common::AccessPoint;
use crate::device::caps::{moving, wifi};
use crate::error::{DecoderError, PayloadLengthError, Result};
use crate::feature::{uplink_data, Buffered, Feature, FeatureSet, SequenceNumber, Timestamp, UplinkData};
use crate::payload::{
    decode_hex, encode, encode_hex, parse_bytes, record, ApOrder, Check, FieldDescriptor, Parsed, PayloadConfig,
    PortLayout, Transform,
};
use crate::uplink::{Decoded, DecodedUplink};

const MOVING: u8 = 0b001;
const HAS_SEQUENCE: u8 = 0b010;
const HAS_TIMESTAMP: u8 = 0b100;
const VERSION_MASK: u8 = 0xf0;

record! {
    /// Wi-Fi scan introduced by a format tag
    pub struct TaggedWifiScan : TaggedWifiField {
        moving: bool => Moving,
        sequence_number: Option<u16> => SequenceNumber,
        timestamp: Option<DateTime<Utc>> => Timestamp,
        access_points: Vec<AccessPoint> => AccessPoints [Check::Rssi],
        /// Set by the dispatcher, never on the wire
        buffered: bool => Buffered,
    }
}

impl TaggedWifiScan {
    /// Format tag matching the fields present
    pub fn tag(&self) -> u8 {
        let mut tag = 0;
        if self.moving {
            tag |= MOVING;
        }
        if self.sequence_number.is_some() {
            tag |= HAS_SEQUENCE;
        }
        if self.timestamp.is_some() {
            tag |= HAS_TIMESTAMP;
        }
        tag
    }

    /// Features this scan declares
    pub fn features(&self) -> FeatureSet {
        let mut features = FeatureSet::from([Feature::WiFi, Feature::Moving]);
        if self.sequence_number.is_some() {
            features.insert(Feature::SequenceNumber);
        }
        if self.timestamp.is_some() {
            features.insert(Feature::Timestamp);
        }
        if self.buffered {
            features.insert(Feature::Buffered);
        }
        features
    }
}

moving!(TaggedWifiScan);
wifi!(TaggedWifiScan);

impl SequenceNumber for TaggedWifiScan {
    fn sequence_number(&self) -> u16 {
        self.sequence_number.unwrap_or_default()
    }
}

impl Timestamp for TaggedWifiScan {
    fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }
}

impl Buffered for TaggedWifiScan {
    fn is_buffered(&self) -> bool {
        self.buffered
    }
}

uplink_data!(TaggedWifiScan, WiFi, Moving, SequenceNumber, Timestamp, Buffered);

/// Layout selected by the presence bits of a tag
fn layout_for(tag: u8) -> PayloadConfig<TaggedWifiScan> {
    use TaggedWifiField::*;

    let mut fields = vec![FieldDescriptor::new(Moving, 0, 1).transform(Transform::Bit(0))];
    let mut offset = 1;
    if tag & HAS_SEQUENCE != 0 {
        fields.push(FieldDescriptor::new(SequenceNumber, offset, 2));
        offset += 2;
    }
    if tag & HAS_TIMESTAMP != 0 {
        fields.push(FieldDescriptor::new(Timestamp, offset, 4).transform(Transform::UnixSeconds));
        offset += 4;
    }
    fields.push(FieldDescriptor::rest(AccessPoints, offset).hex().transform(Transform::AccessPoints {
        order: ApOrder::RssiFirst,
        nullable_rssi: true,
    }));

    let features: Vec<Feature> = [
        Some(Feature::WiFi),
        Some(Feature::Moving),
        (tag & HAS_SEQUENCE != 0).then_some(Feature::SequenceNumber),
        (tag & HAS_TIMESTAMP != 0).then_some(Feature::Timestamp),
    ]
    .into_iter()
    .flatten()
    .collect();

    PayloadConfig::new(fields, &features)
}

/// Port layout for the tagged Wi-Fi family
#[derive(Debug)]
pub struct TaggedWifiLayout {
    port: u8,
    layouts: Vec<PayloadConfig<TaggedWifiScan>>,
    base: FeatureSet,
}

impl TaggedWifiLayout {
    pub fn new(port: u8) -> Self {
        Self {
            port,
            layouts: (0..8).map(layout_for).collect(),
            base: FeatureSet::from([Feature::WiFi, Feature::Moving]),
        }
    }

    fn select(&self, tag: u8) -> Result<&PayloadConfig<TaggedWifiScan>> {
        if tag & VERSION_MASK != 0 {
            return Err(DecoderError::UnexpectedTag {
                port: self.port,
                tag,
                reason: "unknown format version",
            });
        }
        Ok(&self.layouts[usize::from(tag & 0x07)])
    }

    fn tag_of(bytes: &[u8]) -> Result<u8> {
        bytes.first().copied().ok_or(DecoderError::FieldOutOfBounds {
            field: "tag",
            start: 0,
            end: 1,
            size: 0,
        })
    }

    /// Parse into the concrete scan so callers can adjust it
    pub fn parse_scan(&self, payload: &str) -> Result<Parsed<TaggedWifiScan>> {
        let bytes = decode_hex(payload)?;
        let tag = Self::tag_of(&bytes)?;
        parse_bytes(&bytes, self.select(tag)?)
    }

    pub fn encode_scan(&self, scan: &TaggedWifiScan) -> Result<String> {
        let tag = scan.tag();
        let hex = encode(scan, self.select(tag)?)?;
        let mut bytes = decode_hex(&hex)?;
        if let Some(first) = bytes.first_mut() {
            *first |= tag;
        }
        Ok(encode_hex(&bytes))
    }
}

impl PortLayout for TaggedWifiLayout {
    fn features(&self) -> &FeatureSet {
        &self.base
    }

    fn length_bounds(&self) -> (usize, Option<usize>) {
        (1, None)
    }

    fn validate_length(&self, payload: &str) -> std::result::Result<(), PayloadLengthError> {
        let actual = payload.len() / 2;
        let tag = decode_hex(payload).ok().and_then(|bytes| bytes.first().copied());
        let min = match tag.and_then(|t| self.select(t).ok()) {
            Some(config) => config.length_bounds().0,
            None => 1,
        };
        if actual < min {
            return Err(PayloadLengthError::TooShort { min, actual });
        }
        Ok(())
    }

    fn prepare(&self, payload: &str) -> String {
        payload.to_string()
    }

    fn parse(&self, payload: &str) -> Result<Decoded> {
        let parsed = self.parse_scan(payload)?;
        let features = parsed.record.features();
        Ok(Decoded::new(DecodedUplink::new(features, Box::new(parsed.record)), parsed.validation))
    }

    fn encode(&self, data: &dyn UplinkData) -> Result<String> {
        let scan = data
            .as_any()
            .downcast_ref::<TaggedWifiScan>()
            .ok_or_else(|| DecoderError::Encode("expected a tagged Wi-Fi scan".to_string()))?;
        self.encode_scan(scan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_moving_scan_without_extras() {
        let layout = TaggedWifiLayout::new(197);
        let parsed = layout.parse_scan("01b5aabbccddeeffc4112233445566").unwrap();
        let scan = parsed.record;
        assert!(scan.moving);
        assert_eq!(scan.sequence_number, None);
        assert_eq!(scan.timestamp, None);
        assert_eq!(
            scan.access_points,
            vec![
                AccessPoint { mac: "aabbccddeeff".to_string(), rssi: Some(-75) },
                AccessPoint { mac: "112233445566".to_string(), rssi: Some(-60) },
            ]
        );
        assert!(parsed.validation.is_none());
        assert_eq!(scan.features().as_slice(), &[Feature::WiFi, Feature::Moving]);
    }

    #[test]
    fn test_sequence_and_timestamp() {
        let layout = TaggedWifiLayout::new(197);
        let decoded = layout.parse("060042668f5f0000aabbccddeeff").unwrap();
        let uplink = decoded.uplink;
        assert!(uplink.is(Feature::SequenceNumber));
        assert!(uplink.is(Feature::Timestamp));
        assert!(!uplink.data().as_moving().unwrap().is_moving());
        assert_eq!(uplink.data().as_sequence_number().unwrap().sequence_number(), 0x42);
        assert_eq!(
            uplink.data().as_timestamp().unwrap().timestamp().unwrap().to_rfc3339(),
            "2024-07-11T04:26:40+00:00"
        );
        // unreported rssi
        let wifi = uplink.data().as_wifi().unwrap();
        assert_eq!(wifi.access_points()[0].rssi, None);
    }

    #[test]
    fn test_null_mac_is_omitted() {
        let layout = TaggedWifiLayout::new(197);
        let scan = layout.parse_scan("00b5000000000000c4112233445566").unwrap().record;
        assert_eq!(scan.access_points.len(), 1);
        assert_eq!(scan.access_points[0].mac, "112233445566");
    }

    #[test]
    fn test_out_of_range_rssi_is_flagged_not_fatal() {
        let layout = TaggedWifiLayout::new(197);
        let parsed = layout.parse_scan("00f0aabbccddeeff").unwrap();
        assert_eq!(parsed.record.access_points[0].rssi, Some(-16));
        assert!(parsed.validation.unwrap().contains("access_points"));
    }

    #[test]
    fn test_unknown_format_version() {
        let layout = TaggedWifiLayout::new(190);
        let err = layout.parse_scan("10b5aabbccddeeff").unwrap_err();
        assert!(matches!(err, DecoderError::UnexpectedTag { port: 190, tag: 0x10, .. }));
    }

    #[test]
    fn test_encode_restores_tag() {
        let layout = TaggedWifiLayout::new(197);
        let hex = "070042668f5f00b5aabbccddeeff";
        let scan = layout.parse_scan(hex).unwrap().record;
        assert_eq!(layout.encode_scan(&scan).unwrap(), hex);
    }

    #[test]
    fn test_length_depends_on_tag() {
        let layout = TaggedWifiLayout::new(197);
        assert!(layout.validate_length("06004266").is_err());
        assert!(layout.validate_length("01b5aabbccddeeff").is_ok());
    }
}
