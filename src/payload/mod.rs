//! # Payload Module
//!
//! Declarative framed binary parsing shared by every device.
//!
//! A port is described by a [`PayloadConfig`]: an ordered list of
//! [`FieldDescriptor`]s (offset, length, optional, hex, transform) and an
//! optional TLV table of [`TagDescriptor`]s. The parser applies the layout to a
//! hex payload and fills a [`Record`]; the encoder runs it backwards.

pub mod encoder;
pub mod layout;
pub mod parser;
pub mod reader;
pub mod record;
pub mod transform;
pub mod value;

pub use encoder::encode;
pub use layout::{FieldDescriptor, PayloadConfig, PortLayout, TagDescriptor};
pub use parser::{hex_null_pad, parse, parse_bytes, validate_length, Parsed};
pub use reader::{decode_hex, encode_hex, read_field, Length, RawValue};
pub(crate) use record::record;
pub use record::{run_checks, Check, Checked, Record};
pub use transform::{decode_access_points, ApOrder, Transform};
pub use value::{CoerceError, FromValue, IntoValue, Value};
