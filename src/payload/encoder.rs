//! # Payload Encoder
//!
//! Inverse of the parser: writes a record back into a payload using the same
//! layout. Descriptors sharing a byte are OR-ed together.

use bytes::BufMut;

use super::layout::PayloadConfig;
use super::reader::{encode_hex, Length, RawValue};
use super::record::Record;
use super::transform::Transform;
use super::value::{CoerceError, Value};
use crate::error::{DecoderError, Result};

/// Encode `record` with `config` into a lowercase hex payload
///
/// # Errors
///
/// Returns error if a mandatory field is null or a value cannot be converted
/// back into its raw form.
pub fn encode<R: Record>(record: &R, config: &PayloadConfig<R>) -> Result<String> {
    let mut buf: Vec<u8> = Vec::new();

    for descriptor in &config.fields {
        let name = R::field_name(descriptor.field);
        let value = record.value_of(descriptor.field);
        if value == Value::Null {
            if descriptor.optional {
                continue;
            }
            return Err(DecoderError::Encode(format!("{name} is mandatory")));
        }

        let bytes = raw_bytes(name, &value, descriptor.length, descriptor.hex, descriptor.transform)?;
        write_or(&mut buf, descriptor.start, &bytes);
    }

    let tag_start = config.tag_start();
    if buf.len() < tag_start {
        buf.resize(tag_start, 0);
    }
    for descriptor in &config.tags {
        let name = R::field_name(descriptor.field);
        let value = record.value_of(descriptor.field);
        if value == Value::Null {
            if descriptor.optional {
                continue;
            }
            return Err(DecoderError::Encode(format!("{name} is mandatory")));
        }

        let bytes = raw_bytes(
            name,
            &value,
            Length::Fixed(descriptor.length),
            descriptor.hex,
            descriptor.transform,
        )?;
        let len = u8::try_from(bytes.len())
            .map_err(|_| DecoderError::Encode(format!("{name} exceeds 255 bytes")))?;
        buf.put_u8(descriptor.tag);
        buf.put_u8(len);
        buf.put_slice(&bytes);
    }

    Ok(encode_hex(&buf))
}

fn raw_bytes(
    name: &'static str,
    value: &Value,
    length: Length,
    hex: bool,
    transform: Option<Transform>,
) -> Result<Vec<u8>> {
    let coerce = |source| DecoderError::Coercion { field: name, source };

    let raw = match transform {
        Some(t) => t.encode(value, length.fixed().unwrap_or(0)).map_err(coerce)?,
        None => default_raw(value, hex).map_err(coerce)?,
    };

    match (raw, length) {
        (RawValue::Hex(s), _) => Ok(hex::decode(s)?),
        (RawValue::Uint(v), Length::Fixed(n)) => {
            let be = v.to_be_bytes();
            let n = n.min(be.len());
            Ok(be[be.len() - n..].to_vec())
        }
        (RawValue::Uint(_), Length::Rest) => Err(DecoderError::Encode(format!(
            "{name} reads to the end of the payload and must be hex"
        ))),
    }
}

fn default_raw(value: &Value, hex: bool) -> std::result::Result<RawValue, CoerceError> {
    match value {
        Value::Str(s) if hex => Ok(RawValue::Hex(s.to_lowercase())),
        Value::Str(s) => s
            .parse::<u64>()
            .map(RawValue::Uint)
            .map_err(|_| CoerceError::new(value, "integer")),
        Value::Uint(v) => Ok(RawValue::Uint(*v)),
        Value::Int(v) => Ok(RawValue::Uint(*v as u64)),
        Value::Bool(v) => Ok(RawValue::Uint(u64::from(*v))),
        Value::Float(v) => Ok(RawValue::Uint(v.round().max(0.0) as u64)),
        Value::Time(t) => Ok(RawValue::Uint(t.timestamp().max(0) as u64)),
        Value::Duration(d) => Ok(RawValue::Uint(d.as_nanos() as u64)),
        other => Err(CoerceError::new(other, "raw field")),
    }
}

fn write_or(buf: &mut Vec<u8>, start: usize, bytes: &[u8]) {
    let end = start + bytes.len();
    if buf.len() < end {
        buf.resize(end, 0);
    }
    for (slot, b) in buf[start..end].iter_mut().zip(bytes) {
        *slot |= *b;
    }
}
