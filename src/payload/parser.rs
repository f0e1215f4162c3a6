//! # Payload Parser
//!
//! Applies a [`PayloadConfig`] to a payload, producing the typed record and
//! the joined validation failures.

use tracing::debug;

use super::layout::PayloadConfig;
use super::reader::{decode_hex, read_field, Length, RawValue};
use super::record::Record;
use super::transform::Transform;
use super::value::Value;
use crate::error::{DecoderError, PayloadLengthError, Result, ValidationErrors, ValidationFailed};

/// A parsed record and the validation failures found while filling it
#[derive(Debug, Clone, PartialEq)]
pub struct Parsed<R> {
    pub record: R,
    pub validation: Option<ValidationErrors>,
}

/// Parse a hex payload with `config`
///
/// Fields are assigned in declaration order; a later descriptor targeting the
/// same field overwrites the earlier value. Validation failures are collected
/// and returned next to the record rather than aborting.
///
/// # Errors
///
/// Returns error if the payload is not valid hex, a mandatory field or tag is
/// missing, or a value cannot be coerced into its record field.
pub fn parse<R: Record>(payload: &str, config: &PayloadConfig<R>) -> Result<Parsed<R>> {
    let bytes = decode_hex(payload)?;
    parse_bytes(&bytes, config)
}

/// Parse an already decoded payload with `config`
pub fn parse_bytes<R: Record>(bytes: &[u8], config: &PayloadConfig<R>) -> Result<Parsed<R>> {
    let mut record = R::default();
    let mut failures = Vec::new();

    for descriptor in &config.fields {
        let name = R::field_name(descriptor.field);
        let Some(raw) = read_field(
            bytes,
            name,
            descriptor.start,
            descriptor.length,
            descriptor.optional,
            descriptor.hex,
        )?
        else {
            continue;
        };

        let width = match descriptor.length {
            Length::Fixed(n) => n,
            Length::Rest => bytes.len() - descriptor.start,
        };
        assign(&mut record, descriptor.field, raw, width, descriptor.transform, &mut failures)?;
    }

    if !config.tags.is_empty() {
        parse_tags(bytes, config, &mut record, &mut failures)?;
    }

    Ok(Parsed {
        record,
        validation: ValidationErrors::join(failures),
    })
}

fn assign<R: Record>(
    record: &mut R,
    field: R::Field,
    raw: RawValue,
    width: usize,
    transform: Option<Transform>,
    failures: &mut Vec<ValidationFailed>,
) -> Result<()> {
    let name = R::field_name(field);
    match transform {
        Some(t) => t.decode(&raw, width),
        None => Ok(Value::from(raw)),
    }
    .and_then(|value| record.assign(field, value))
    .map_err(|source| DecoderError::Coercion { field: name, source })?;

    if let Some(failure) = record.check(field) {
        failures.push(failure);
    }
    Ok(())
}

fn parse_tags<R: Record>(
    bytes: &[u8],
    config: &PayloadConfig<R>,
    record: &mut R,
    failures: &mut Vec<ValidationFailed>,
) -> Result<()> {
    let mut seen = vec![false; config.tags.len()];
    let mut offset = config.tag_start();

    while offset < bytes.len() {
        let tag = bytes[offset];
        let Some(&len) = bytes.get(offset + 1) else {
            return Err(DecoderError::FieldOutOfBounds {
                field: "tag length",
                start: offset + 1,
                end: offset + 2,
                size: bytes.len(),
            });
        };
        let len = usize::from(len);
        let value_start = offset + 2;

        match config.tags.iter().position(|t| t.tag == tag) {
            Some(index) => {
                let descriptor = &config.tags[index];
                let name = R::field_name(descriptor.field);
                let raw = read_field(bytes, name, value_start, Length::Fixed(len), false, descriptor.hex)?
                    .ok_or(DecoderError::FieldOutOfBounds {
                        field: name,
                        start: value_start,
                        end: value_start + len,
                        size: bytes.len(),
                    })?;
                assign(record, descriptor.field, raw, len, descriptor.transform, failures)?;
                seen[index] = true;
            }
            None => {
                debug!("Skipping unknown tag 0x{:02x} ({} bytes) at offset {}", tag, len, offset);
            }
        }

        offset = value_start + len;
    }

    if let Some(missing) = config
        .tags
        .iter()
        .zip(&seen)
        .find(|(t, seen)| !t.optional && !**seen)
    {
        return Err(DecoderError::MissingTag(R::field_name(missing.0.field)));
    }

    Ok(())
}

/// Check a hex payload's byte length against the layout's bounds
///
/// # Errors
///
/// Returns [`PayloadLengthError::TooShort`] below the minimum of the mandatory
/// fields and [`PayloadLengthError::TooLong`] above the furthest field end.
pub fn validate_length<R: Record>(
    payload: &str,
    config: &PayloadConfig<R>,
) -> std::result::Result<(), PayloadLengthError> {
    let actual = payload.len() / 2;
    let (min, max) = config.length_bounds();

    if actual < min {
        return Err(PayloadLengthError::TooShort { min, actual });
    }
    if let Some(max) = max {
        if actual > max {
            return Err(PayloadLengthError::TooLong { max, actual });
        }
    }
    Ok(())
}

/// Left-pad a payload with zero nibbles up to the mandatory length
///
/// Devices may transmit minimum-width integers; padding restores the layout's
/// alignment. Odd-length payloads gain one nibble first.
pub fn hex_null_pad<R: Record>(payload: &str, config: &PayloadConfig<R>) -> String {
    let (min, _) = config.length_bounds();
    let mut target = min * 2;
    if payload.len() > target {
        target = payload.len() + payload.len() % 2;
    }
    format!("{:0>width$}", payload, width = target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::Feature;
    use crate::payload::{record, Check, FieldDescriptor, TagDescriptor};

    record! {
        struct Fix : FixField {
            duty_cycle: bool => DutyCycle,
            moving: bool => Moving,
            latitude: f64 => Latitude [Check::LATITUDE],
            month: u8 => Month [Check::MONTH],
            batch_size: Option<u16> => BatchSize,
        }
    }

    fn fix_config() -> PayloadConfig<Fix> {
        PayloadConfig::new(
            vec![
                FieldDescriptor::new(FixField::DutyCycle, 0, 1).transform(Transform::Bit(7)),
                FieldDescriptor::new(FixField::Moving, 0, 1),
                FieldDescriptor::new(FixField::Latitude, 1, 4)
                    .transform(Transform::Scaled { divisor: 1_000_000.0, signed: true }),
                FieldDescriptor::new(FixField::Month, 5, 1),
                FieldDescriptor::new(FixField::BatchSize, 6, 2).optional(),
            ],
            &[Feature::Gnss, Feature::Moving, Feature::DutyCycle],
        )
    }

    record! {
        struct Status : StatusField {
            battery: f64 => Battery,
            low_battery: Option<bool> => LowBattery,
        }
    }

    fn status_config() -> PayloadConfig<Status> {
        PayloadConfig::tagged(
            vec![
                TagDescriptor::new(0x40, StatusField::Battery, 2)
                    .transform(Transform::Scaled { divisor: 1000.0, signed: false }),
                TagDescriptor::new(0x41, StatusField::LowBattery, 1).optional(),
            ],
            &[Feature::Battery],
        )
    }

    #[test]
    fn test_parse_in_declaration_order() {
        let parsed = parse("8102cdcd1304", &fix_config()).unwrap();
        assert!(parsed.record.duty_cycle);
        assert!(parsed.record.moving);
        assert_eq!(parsed.record.latitude, 47.041811);
        assert_eq!(parsed.record.month, 4);
        assert_eq!(parsed.record.batch_size, None);
        assert!(parsed.validation.is_none());
    }

    #[test]
    fn test_optional_field_present() {
        let parsed = parse("8002cdcd13040010", &fix_config()).unwrap();
        assert_eq!(parsed.record.batch_size, Some(16));
    }

    #[test]
    fn test_validation_failures_do_not_abort() {
        let parsed = parse("0002cdcd130d", &fix_config()).unwrap();
        assert_eq!(parsed.record.month, 13);
        let validation = parsed.validation.unwrap();
        assert!(validation.contains("month"));
        assert_eq!(validation.len(), 1);
    }

    #[test]
    fn test_missing_mandatory_field_is_fatal() {
        let err = parse("8002cdcd", &fix_config()).unwrap_err();
        assert!(matches!(err, DecoderError::FieldOutOfBounds { field: "month", .. }));
    }

    #[test]
    fn test_invalid_hex_is_fatal() {
        assert!(matches!(parse("8002cdcd1", &fix_config()), Err(DecoderError::InvalidHex(_))));
    }

    #[test]
    fn test_validate_length_bounds() {
        let config = fix_config();
        assert_eq!(config.length_bounds(), (6, Some(8)));
        assert_eq!(
            validate_length("8002", &config),
            Err(PayloadLengthError::TooShort { min: 6, actual: 2 })
        );
        assert_eq!(
            validate_length("8002cdcd1304001000", &config),
            Err(PayloadLengthError::TooLong { max: 8, actual: 9 })
        );
        assert!(validate_length("8002cdcd1304", &config).is_ok());
        // pure: same outcome twice
        assert_eq!(validate_length("8002", &config), validate_length("8002", &config));
    }

    #[test]
    fn test_hex_null_pad() {
        let config = fix_config();
        assert_eq!(hex_null_pad("cdcd1304", &config), "0000cdcd1304");
        assert_eq!(hex_null_pad("8002cdcd1304", &config), "8002cdcd1304");
        assert_eq!(hex_null_pad("8002cdcd1304001", &config), "08002cdcd1304001");
    }

    #[test]
    fn test_parse_tags() {
        let parsed = parse("40020ee5410101", &status_config()).unwrap();
        assert_eq!(parsed.record.battery, 3.813);
        assert_eq!(parsed.record.low_battery, Some(true));
    }

    #[test]
    fn test_parse_tags_skips_unknown_and_optional() {
        let parsed = parse("7701ff40020ee5", &status_config()).unwrap();
        assert_eq!(parsed.record.battery, 3.813);
        assert_eq!(parsed.record.low_battery, None);
    }

    #[test]
    fn test_parse_tags_missing_mandatory() {
        let err = parse("410101", &status_config()).unwrap_err();
        assert!(matches!(err, DecoderError::MissingTag("battery")));
    }

    #[test]
    fn test_tag_length_bounds() {
        assert_eq!(status_config().length_bounds(), (4, Some(7)));
    }
}
