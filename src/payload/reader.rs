//! # Binary Reader
//!
//! Hex decoding and bounded big-endian field extraction.

use crate::error::{DecoderError, Result};

/// Byte count of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Length {
    /// Exactly this many bytes
    Fixed(usize),
    /// Everything from the start offset to the end of the buffer
    Rest,
}

impl Length {
    /// Fixed byte count, `None` for [`Length::Rest`]
    pub fn fixed(self) -> Option<usize> {
        match self {
            Length::Fixed(n) => Some(n),
            Length::Rest => None,
        }
    }
}

/// A field as extracted from the buffer, before coercion
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawValue {
    /// Big-endian unsigned integer of up to 8 bytes
    Uint(u64),
    /// Lowercase hex of the extracted bytes
    Hex(String),
}

/// Decode a hex payload (case-insensitive, even length)
pub fn decode_hex(payload: &str) -> Result<Vec<u8>> {
    Ok(hex::decode(payload)?)
}

/// Encode bytes as lowercase hex
pub fn encode_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

/// Big-endian unsigned integer of `bytes` (at most 8)
pub fn be_uint(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b))
}

/// Extract one field from `bytes`
///
/// # Arguments
///
/// * `bytes` - Decoded payload
/// * `field` - Field name, used in error messages
/// * `start` - Byte offset of the field
/// * `length` - Byte count, or [`Length::Rest`] to read to the end
/// * `optional` - Whether a short buffer yields `None` instead of an error
/// * `hex` - Surface the bytes as a hex string instead of an integer
///
/// # Returns
///
/// * `Ok(Some(value))` - The extracted field
/// * `Ok(None)` - The buffer ends before an optional field
///
/// # Errors
///
/// - [`DecoderError::FieldStartOutOfBounds`] when a read-to-end field starts past the buffer
/// - [`DecoderError::FieldOutOfBounds`] when a mandatory field does not fit
/// - [`DecoderError::FieldTooWide`] when an integer field spans more than 8 bytes
pub fn read_field(
    bytes: &[u8],
    field: &'static str,
    start: usize,
    length: Length,
    optional: bool,
    hex: bool,
) -> Result<Option<RawValue>> {
    let length = match length {
        Length::Rest => {
            if start >= bytes.len() {
                return Err(DecoderError::FieldStartOutOfBounds {
                    field,
                    start,
                    size: bytes.len(),
                });
            }
            bytes.len() - start
        }
        Length::Fixed(n) => n,
    };

    let end = start + length;
    if end > bytes.len() {
        if optional {
            return Ok(None);
        }
        return Err(DecoderError::FieldOutOfBounds {
            field,
            start,
            end,
            size: bytes.len(),
        });
    }

    let slice = &bytes[start..end];
    if hex {
        return Ok(Some(RawValue::Hex(encode_hex(slice))));
    }

    if length > 8 {
        return Err(DecoderError::FieldTooWide { field, length });
    }

    Ok(Some(RawValue::Uint(be_uint(slice))))
}
