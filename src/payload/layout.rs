//! # Payload Layouts
//!
//! Declarative description of one port: ordered field descriptors, an optional
//! TLV tag table, the target record type and the features it declares.

use std::marker::PhantomData;

use super::encoder::encode;
use super::parser::{hex_null_pad, parse, validate_length};
use super::reader::Length;
use super::record::Record;
use super::transform::Transform;
use crate::error::{DecoderError, PayloadLengthError, Result};
use crate::feature::{Feature, FeatureSet, UplinkData};
use crate::uplink::{Decoded, DecodedUplink};

/// One row of a payload layout
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldDescriptor<F> {
    pub field: F,
    pub start: usize,
    pub length: Length,
    pub optional: bool,
    pub hex: bool,
    pub transform: Option<Transform>,
}

impl<F> FieldDescriptor<F> {
    /// Mandatory integer field of `length` bytes at `start`
    pub fn new(field: F, start: usize, length: usize) -> Self {
        Self {
            field,
            start,
            length: Length::Fixed(length),
            optional: false,
            hex: false,
            transform: None,
        }
    }

    /// Field reading from `start` to the end of the payload
    pub fn rest(field: F, start: usize) -> Self {
        Self {
            length: Length::Rest,
            ..Self::new(field, start, 0)
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn hex(mut self) -> Self {
        self.hex = true;
        self
    }

    pub fn transform(mut self, transform: Transform) -> Self {
        self.transform = Some(transform);
        self
    }

    /// Exclusive end offset, `None` for read-to-end fields
    pub fn end(&self) -> Option<usize> {
        self.length.fixed().map(|n| self.start + n)
    }
}

/// One entry of a TLV tag table: `tag(1) len(1) value(len)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TagDescriptor<F> {
    pub tag: u8,
    pub field: F,
    pub length: usize,
    pub optional: bool,
    pub hex: bool,
    pub transform: Option<Transform>,
}

impl<F> TagDescriptor<F> {
    pub fn new(tag: u8, field: F, length: usize) -> Self {
        Self {
            tag,
            field,
            length,
            optional: false,
            hex: false,
            transform: None,
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn hex(mut self) -> Self {
        self.hex = true;
        self
    }

    pub fn transform(mut self, transform: Transform) -> Self {
        self.transform = Some(transform);
        self
    }

    /// Bytes the entry occupies including its tag and length bytes
    pub fn encoded_len(&self) -> usize {
        2 + self.length
    }
}

/// Layout of one port decoding into record type `R`
pub struct PayloadConfig<R: Record> {
    pub fields: Vec<FieldDescriptor<R::Field>>,
    pub tags: Vec<TagDescriptor<R::Field>>,
    pub features: FeatureSet,
    /// Left-pad short payloads with zero nibbles before decoding
    pub null_pad: bool,
    record: PhantomData<fn() -> R>,
}

impl<R: Record> std::fmt::Debug for PayloadConfig<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayloadConfig")
            .field("record", &std::any::type_name::<R>())
            .field("fields", &self.fields.len())
            .field("tags", &self.tags.len())
            .field("features", &self.features)
            .finish()
    }
}

impl<R: Record> PayloadConfig<R> {
    pub fn new(fields: Vec<FieldDescriptor<R::Field>>, features: &[Feature]) -> Self {
        Self {
            fields,
            tags: Vec::new(),
            features: FeatureSet::from(features),
            null_pad: false,
            record: PhantomData,
        }
    }

    /// Layout made of a TLV tag table only
    pub fn tagged(tags: Vec<TagDescriptor<R::Field>>, features: &[Feature]) -> Self {
        Self {
            tags,
            ..Self::new(Vec::new(), features)
        }
    }

    pub fn null_padded(mut self) -> Self {
        self.null_pad = true;
        self
    }

    /// Offset where the TLV section begins: right after the fixed fields
    pub fn tag_start(&self) -> usize {
        self.fields.iter().filter_map(|f| f.end()).max().unwrap_or(0)
    }

    /// Minimum and maximum payload length in bytes
    ///
    /// The maximum is `None` when a field reads to the end of the payload.
    pub fn length_bounds(&self) -> (usize, Option<usize>) {
        let fixed_min = self
            .fields
            .iter()
            .filter(|f| !f.optional)
            .map(|f| f.end().unwrap_or(f.start + 1))
            .max()
            .unwrap_or(0);
        let fixed_max = self.fields.iter().map(|f| f.end()).try_fold(0usize, |acc, end| end.map(|e| acc.max(e)));

        let tag_start = self.tag_start();
        let tags_min: usize = self.tags.iter().filter(|t| !t.optional).map(|t| t.encoded_len()).sum();
        let tags_max: usize = self.tags.iter().map(|t| t.encoded_len()).sum();

        if self.tags.is_empty() {
            (fixed_min, fixed_max)
        } else {
            (
                fixed_min.max(tag_start + tags_min),
                fixed_max.map(|m| m.max(tag_start + tags_max)),
            )
        }
    }
}

/// Port layout with its record type erased, as held by device port tables
pub trait PortLayout: Send + Sync {
    /// Features every uplink decoded on this port declares
    fn features(&self) -> &FeatureSet;

    fn length_bounds(&self) -> (usize, Option<usize>);

    fn validate_length(&self, payload: &str) -> std::result::Result<(), PayloadLengthError>;

    /// Apply the layout's payload preparation (null padding when declared)
    fn prepare(&self, payload: &str) -> String;

    fn parse(&self, payload: &str) -> Result<Decoded>;

    fn encode(&self, data: &dyn UplinkData) -> Result<String>;
}

impl<R> PortLayout for PayloadConfig<R>
where
    R: Record + UplinkData,
{
    fn features(&self) -> &FeatureSet {
        &self.features
    }

    fn length_bounds(&self) -> (usize, Option<usize>) {
        PayloadConfig::length_bounds(self)
    }

    fn validate_length(&self, payload: &str) -> std::result::Result<(), PayloadLengthError> {
        validate_length(payload, self)
    }

    fn prepare(&self, payload: &str) -> String {
        if self.null_pad {
            hex_null_pad(payload, self)
        } else {
            payload.to_string()
        }
    }

    fn parse(&self, payload: &str) -> Result<Decoded> {
        let parsed = parse(payload, self)?;
        let uplink = DecodedUplink::new(self.features.clone(), Box::new(parsed.record));
        Ok(Decoded::new(uplink, parsed.validation))
    }

    fn encode(&self, data: &dyn UplinkData) -> Result<String> {
        let record = data.as_any().downcast_ref::<R>().ok_or_else(|| {
            DecoderError::Encode(format!(
                "expected {} for this port",
                std::any::type_name::<R>()
            ))
        })?;
        encode(record, self)
    }
}
