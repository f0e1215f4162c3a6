//! # Field Transforms
//!
//! Declarative conversions from a raw field to its semantic value, each with
//! the inverse the encoder uses. Transforms are plain data so port layouts stay
//! tables.

use std::time::Duration;

use chrono::{DateTime, Utc};

use super::reader::{be_uint, RawValue};
use super::value::{CoerceError, FromValue, Value};
use crate::common::AccessPoint;

/// Order of the two members of an access-point tuple on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApOrder {
    /// `mac(6) rssi(1)`
    MacFirst,
    /// `rssi(1) mac(6)`
    RssiFirst,
}

/// Size of one access-point tuple
pub const ACCESS_POINT_LEN: usize = 7;

/// Conversion applied to a raw field after extraction
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transform {
    /// Two's complement at the field width
    Signed,
    /// Integer divided by `divisor`, optionally sign-extended first
    Scaled { divisor: f64, signed: bool },
    /// A single bit as a bool
    Bit(u8),
    /// `width` bits starting at `shift`
    Bits { shift: u8, width: u8 },
    /// Unix seconds as an instant
    UnixSeconds,
    /// Whole seconds as a duration
    Seconds,
    /// One byte per component, rendered `major.minor.patch`
    DottedVersion,
    /// LoRa spreading factor, rendered `SF<n>`
    SpreadingFactor,
    /// A run of access-point tuples to the end of the field
    AccessPoints { order: ApOrder, nullable_rssi: bool },
}

fn mask(bits: u32) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

fn sign_extend(value: u64, width: usize) -> i64 {
    let bits = (width * 8).min(64) as u32;
    if bits == 0 {
        return 0;
    }
    let shift = 64 - bits;
    ((value << shift) as i64) >> shift
}

fn truncate(value: i64, width: usize) -> u64 {
    (value as u64) & mask((width * 8) as u32)
}

fn expect_uint(raw: &RawValue, target: &'static str) -> Result<u64, CoerceError> {
    match raw {
        RawValue::Uint(v) => Ok(*v),
        RawValue::Hex(s) => Err(CoerceError::new(&Value::Str(s.clone()), target)),
    }
}

fn number(value: &Value, target: &'static str) -> Result<f64, CoerceError> {
    match value {
        Value::Float(v) => Ok(*v),
        Value::Uint(v) => Ok(*v as f64),
        Value::Int(v) => Ok(*v as f64),
        other => Err(CoerceError::new(other, target)),
    }
}

fn integer(value: &Value, target: &'static str) -> Result<i64, CoerceError> {
    match value {
        Value::Uint(v) => Ok(*v as i64),
        Value::Int(v) => Ok(*v),
        Value::Bool(v) => Ok(i64::from(*v)),
        other => Err(CoerceError::new(other, target)),
    }
}

impl Transform {
    /// Convert a raw field of `width` bytes into its semantic value
    pub fn decode(&self, raw: &RawValue, width: usize) -> Result<Value, CoerceError> {
        match *self {
            Transform::Signed => Ok(Value::Int(sign_extend(expect_uint(raw, "signed")?, width))),
            Transform::Scaled { divisor, signed } => {
                let v = expect_uint(raw, "scaled")?;
                let v = if signed { sign_extend(v, width) as f64 } else { v as f64 };
                Ok(Value::Float(v / divisor))
            }
            Transform::Bit(n) => Ok(Value::Bool((expect_uint(raw, "bit")? >> n) & 1 == 1)),
            Transform::Bits { shift, width: bits } => {
                Ok(Value::Uint((expect_uint(raw, "bits")? >> shift) & mask(u32::from(bits))))
            }
            Transform::UnixSeconds => {
                let seconds = Value::Uint(expect_uint(raw, "instant")?);
                DateTime::<Utc>::from_value(seconds).map(Value::Time)
            }
            Transform::Seconds => Ok(Value::Duration(Duration::from_secs(expect_uint(raw, "duration")?))),
            Transform::DottedVersion => {
                let v = expect_uint(raw, "version")?;
                let parts: Vec<String> = (0..width)
                    .rev()
                    .map(|i| ((v >> (8 * i)) & 0xff).to_string())
                    .collect();
                Ok(Value::Str(parts.join(".")))
            }
            Transform::SpreadingFactor => Ok(Value::Str(format!("SF{}", expect_uint(raw, "spreading factor")?))),
            Transform::AccessPoints { order, nullable_rssi } => {
                let hex = match raw {
                    RawValue::Hex(s) => s,
                    RawValue::Uint(v) => return Err(CoerceError::new(&Value::Uint(*v), "access points")),
                };
                let bytes = hex::decode(hex)
                    .map_err(|_| CoerceError::new(&Value::Str(hex.clone()), "access points"))?;
                Ok(Value::AccessPoints(decode_access_points(&bytes, order, nullable_rssi)))
            }
        }
    }

    /// Convert a semantic value back into the raw field of `width` bytes
    ///
    /// Bit transforms return the bits in place so that several descriptors
    /// sharing one byte can be OR-ed together.
    pub fn encode(&self, value: &Value, width: usize) -> Result<RawValue, CoerceError> {
        match *self {
            Transform::Signed => Ok(RawValue::Uint(truncate(integer(value, "signed")?, width))),
            Transform::Scaled { divisor, signed } => {
                let scaled = (number(value, "scaled")? * divisor).round();
                if signed {
                    Ok(RawValue::Uint(truncate(scaled as i64, width)))
                } else {
                    Ok(RawValue::Uint((scaled.max(0.0) as u64) & mask((width * 8) as u32)))
                }
            }
            Transform::Bit(n) => match value {
                Value::Bool(b) => Ok(RawValue::Uint(u64::from(*b) << n)),
                other => Err(CoerceError::new(other, "bit")),
            },
            Transform::Bits { shift, width: bits } => {
                let v = integer(value, "bits")? as u64;
                Ok(RawValue::Uint((v & mask(u32::from(bits))) << shift))
            }
            Transform::UnixSeconds => match value {
                Value::Time(t) => Ok(RawValue::Uint(t.timestamp().max(0) as u64)),
                other => Err(CoerceError::new(other, "instant")),
            },
            Transform::Seconds => match value {
                Value::Duration(d) => Ok(RawValue::Uint(d.as_secs())),
                other => Err(CoerceError::new(other, "duration")),
            },
            Transform::DottedVersion => {
                let Value::Str(s) = value else {
                    return Err(CoerceError::new(value, "version"));
                };
                let parts = s
                    .split('.')
                    .map(|p| p.parse::<u8>())
                    .collect::<Result<Vec<u8>, _>>()
                    .map_err(|_| CoerceError::new(value, "version"))?;
                if parts.len() != width {
                    return Err(CoerceError::new(value, "version"));
                }
                Ok(RawValue::Uint(be_uint(&parts)))
            }
            Transform::SpreadingFactor => {
                let Value::Str(s) = value else {
                    return Err(CoerceError::new(value, "spreading factor"));
                };
                s.strip_prefix("SF")
                    .and_then(|n| n.parse::<u64>().ok())
                    .map(RawValue::Uint)
                    .ok_or_else(|| CoerceError::new(value, "spreading factor"))
            }
            Transform::AccessPoints { order, .. } => match value {
                Value::AccessPoints(aps) => {
                    Ok(RawValue::Hex(hex::encode(encode_access_points(aps, order))))
                }
                other => Err(CoerceError::new(other, "access points")),
            },
        }
    }
}

/// Split a tuple run into access points, dropping null MACs
///
/// A trailing tuple that lacks its RSSI byte is kept when the MAC is complete.
pub fn decode_access_points(bytes: &[u8], order: ApOrder, nullable_rssi: bool) -> Vec<AccessPoint> {
    let rssi_of = |byte: Option<u8>| -> Option<i8> {
        match byte {
            Some(0) | None if nullable_rssi => None,
            Some(b) => Some(b as i8),
            None => Some(0),
        }
    };

    bytes
        .chunks(ACCESS_POINT_LEN)
        .filter_map(|chunk| {
            let (mac, rssi) = match order {
                ApOrder::MacFirst if chunk.len() >= 6 => (&chunk[..6], chunk.get(6).copied()),
                ApOrder::RssiFirst if chunk.len() == ACCESS_POINT_LEN => (&chunk[1..], Some(chunk[0])),
                _ => return None,
            };
            if mac.iter().all(|&b| b == 0) {
                return None;
            }
            Some(AccessPoint {
                mac: hex::encode(mac),
                rssi: rssi_of(rssi),
            })
        })
        .collect()
}

fn encode_access_points(aps: &[AccessPoint], order: ApOrder) -> Vec<u8> {
    let mut out = Vec::with_capacity(aps.len() * ACCESS_POINT_LEN);
    for ap in aps {
        let mac = hex::decode(&ap.mac).unwrap_or_else(|_| vec![0; 6]);
        let rssi = match ap.rssi {
            Some(r) => r as u8,
            None => 0,
        };
        match order {
            ApOrder::MacFirst => {
                out.extend_from_slice(&mac);
                out.push(rssi);
            }
            ApOrder::RssiFirst => {
                out.push(rssi);
                out.extend_from_slice(&mac);
            }
        }
    }
    out
}
