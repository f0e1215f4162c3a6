//! # Device Module
//!
//! Per-device port dispatch.
//!
//! Every device exposes an [`UplinkDecoder`]. Locally parsed ports live in a
//! [`PortTable`]; ports carrying encrypted GNSS blobs are handed to a
//! [`PositionSolver`](crate::solver::PositionSolver).

pub(crate) mod caps;
pub(crate) mod fields;
pub mod nomadxs;
pub mod shared;
pub mod smartlabel;
pub mod tagsl;
pub mod tagxl;
pub mod wifi;

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{DecoderError, Result};
use crate::feature::{FeatureSet, UplinkData};
use crate::payload::{PayloadConfig, PortLayout, Record};
use crate::uplink::Decoded;

pub use nomadxs::NomadXsDecoder;
pub use smartlabel::{SmartLabelDecoder, SmartLabelVersion};
pub use tagsl::TagSlDecoder;
pub use tagxl::TagXlDecoder;

/// Decode behavior shared by all devices
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Skip the payload length check before parsing
    pub skip_validation: bool,
    /// Fail the decode when any field validation fails
    pub strict: bool,
}

impl DecodeOptions {
    pub(crate) fn finish(&self, decoded: Decoded) -> Result<Decoded> {
        if self.strict {
            decoded.into_strict().map(Decoded::from)
        } else {
            Ok(decoded)
        }
    }
}

/// Per-uplink values that do not travel in the payload
#[derive(Debug, Clone, Default)]
pub struct UplinkContext {
    /// 16 hex characters
    pub dev_eui: String,
    /// LoRaWAN uplink frame counter
    pub f_count: u32,
    /// Network reception time, the local clock when absent
    pub received_at: Option<DateTime<Utc>>,
    /// Aborts an in-flight solver request
    pub cancel: CancellationToken,
}

impl UplinkContext {
    pub fn new(dev_eui: impl Into<String>, f_count: u32) -> Self {
        Self {
            dev_eui: dev_eui.into(),
            f_count,
            ..Self::default()
        }
    }

    pub fn received_at(mut self, at: DateTime<Utc>) -> Self {
        self.received_at = Some(at);
        self
    }

    pub fn reference_time(&self) -> DateTime<Utc> {
        self.received_at.unwrap_or_else(Utc::now)
    }
}

/// Decoder for one device family
#[async_trait]
pub trait UplinkDecoder: Send + Sync {
    fn name(&self) -> &'static str;

    /// Every port the decoder accepts, ascending
    fn ports(&self) -> Vec<u8>;

    /// Declared features of a locally parsed port
    fn port_features(&self, port: u8) -> Option<&FeatureSet>;

    async fn decode(&self, payload: &str, port: u8, ctx: &UplinkContext) -> Result<Decoded>;

    /// Encode data back into the payload of a locally parsed port
    fn encode(&self, data: &dyn UplinkData, port: u8) -> Result<String>;
}

/// Locally parsed ports of one device
#[derive(Default)]
pub struct PortTable {
    layouts: BTreeMap<u8, Box<dyn PortLayout>>,
    options: DecodeOptions,
}

impl fmt::Debug for PortTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PortTable")
            .field("ports", &self.layouts.keys().collect::<Vec<_>>())
            .field("options", &self.options)
            .finish()
    }
}

impl PortTable {
    pub fn new(options: DecodeOptions) -> Self {
        Self {
            layouts: BTreeMap::new(),
            options,
        }
    }

    /// Add a port laid out by `config`
    pub fn with<R>(mut self, port: u8, config: PayloadConfig<R>) -> Self
    where
        R: Record + UplinkData,
    {
        self.insert(port, Box::new(config));
        self
    }

    pub fn insert(&mut self, port: u8, layout: Box<dyn PortLayout>) {
        self.layouts.insert(port, layout);
    }

    pub fn options(&self) -> DecodeOptions {
        self.options
    }

    /// # Errors
    ///
    /// Returns [`DecoderError::PortNotSupported`] for ports without a layout.
    pub fn get(&self, port: u8) -> Result<&dyn PortLayout> {
        self.layouts
            .get(&port)
            .map(|layout| layout.as_ref())
            .ok_or(DecoderError::PortNotSupported(port))
    }

    pub fn contains(&self, port: u8) -> bool {
        self.layouts.contains_key(&port)
    }

    pub fn ports(&self) -> impl Iterator<Item = u8> + '_ {
        self.layouts.keys().copied()
    }

    pub fn features(&self, port: u8) -> Option<&FeatureSet> {
        self.layouts.get(&port).map(|layout| layout.features())
    }

    /// Look up the layout, check the length, then parse
    ///
    /// # Errors
    ///
    /// Returns error if the port is unknown, the payload length falls outside
    /// the layout's bounds (unless skipped), parsing fails, or strict mode is
    /// on and a field failed validation.
    pub fn decode(&self, payload: &str, port: u8) -> Result<Decoded> {
        let layout = self.get(port)?;
        let payload = layout.prepare(payload);

        if !self.options.skip_validation {
            layout.validate_length(&payload)?;
        }

        let decoded = layout.parse(&payload)?;
        if let Some(validation) = &decoded.validation {
            debug!("Port {} decoded with validation failures: {}", port, validation);
        }
        self.options.finish(decoded)
    }

    pub fn encode(&self, data: &dyn UplinkData, port: u8) -> Result<String> {
        self.get(port)?.encode(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::{supports, Feature};

    #[test]
    fn test_unknown_port_is_not_supported() {
        let table = tagsl::port_table(DecodeOptions::default());
        assert!(matches!(table.decode("00", 42), Err(DecoderError::PortNotSupported(42))));
    }

    #[test]
    fn test_length_check_can_be_skipped() {
        let strict_length = tagsl::port_table(DecodeOptions::default());
        assert!(matches!(
            strict_length.decode("8002cdcd1300744f5e166018040b14341aff", 1),
            Err(DecoderError::InvalidPayloadLength(_))
        ));

        let lenient = tagsl::port_table(DecodeOptions { skip_validation: true, strict: false });
        let decoded = lenient.decode("8002cdcd1300744f5e166018040b14341aff", 1).unwrap();
        assert!(decoded.uplink.is(Feature::Gnss));
    }

    #[test]
    fn test_strict_mode_fails_on_validation() {
        let payload = "001f3fd57cecb4f0b0140c96bbb2e0286d8a9478b8";
        let lenient = tagsl::port_table(DecodeOptions::default());
        assert!(lenient.decode(payload, 5).unwrap().validation.is_some());

        let strict = tagsl::port_table(DecodeOptions { skip_validation: false, strict: true });
        assert!(matches!(strict.decode(payload, 5), Err(DecoderError::Validation(_))));
    }

    /// Known TLV payloads: a zero fill carries none of the mandatory tags
    fn tagged_payloads(name: &str, port: u8) -> Option<[&'static str; 2]> {
        match (name, port) {
            ("tagsl" | "tagxl", 151) => Some(["40020ee5", "40020ee5410101420209c4430101"]),
            ("tagxl", 150) => Some([
                "010301040202020301",
                "010301040202020301030400000e10040400015180050400015180060200b4070400093a80",
            ]),
            _ => None,
        }
    }

    /// Payloads at the layout's length bounds, filled with `fill`
    fn bound_payloads(bounds: (usize, Option<usize>), fill: u8) -> [String; 2] {
        let (min, max) = bounds;
        let max = max.unwrap_or(min + 14);
        [hex::encode(vec![fill; min]), hex::encode(vec![fill; max])]
    }

    async fn assert_declared_features(decoder: &dyn UplinkDecoder, table: &PortTable) {
        let ctx = UplinkContext::new("0011223344556677", 1)
            .received_at("2025-09-05T12:10:13Z".parse::<DateTime<Utc>>().unwrap());

        for port in decoder.ports() {
            let Some(declared) = decoder.port_features(port) else {
                continue;
            };
            let payloads: Vec<String> = match tagged_payloads(decoder.name(), port) {
                Some(known) => known.iter().map(|p| p.to_string()).collect(),
                None => {
                    let bounds = match table.get(port).map(|l| l.length_bounds()) {
                        // tagged Wi-Fi: the shortest scan is its tag byte plus one
                        Ok((1, None)) | Err(_) => (2, None),
                        Ok(bounds) => bounds,
                    };
                    [0x00, 0x01].into_iter().flat_map(|fill| bound_payloads(bounds, fill)).collect()
                }
            };
            let tagged_scan = table.get(port).map_or(true, |l| l.length_bounds() == (1, None));

            for payload in payloads {
                let decoded = decoder
                    .decode(&payload, port, &ctx)
                    .await
                    .unwrap_or_else(|e| panic!("{} port {} {}: {}", decoder.name(), port, payload, e));
                let features = decoded.uplink.features();
                for feature in declared.iter() {
                    assert!(
                        features.contains(feature),
                        "{} port {} lacks declared {}",
                        decoder.name(),
                        port,
                        feature
                    );
                }
                for feature in features.iter() {
                    assert!(
                        supports(decoded.uplink.data(), feature),
                        "{} port {} does not implement {}",
                        decoder.name(),
                        port,
                        feature
                    );
                }
                // only tagged Wi-Fi scans add features per tag byte
                if !tagged_scan {
                    assert_eq!(features.len(), declared.len(), "{} port {}", decoder.name(), port);
                }
            }
        }
    }

    #[tokio::test]
    async fn test_every_port_decodes_its_declared_features() {
        let options = DecodeOptions::default();

        assert_declared_features(&TagSlDecoder::new(options), &tagsl::port_table(options)).await;
        assert_declared_features(&NomadXsDecoder::new(options), &nomadxs::port_table(options)).await;
        for version in [SmartLabelVersion::V1, SmartLabelVersion::V2] {
            assert_declared_features(
                &SmartLabelDecoder::new(version, options, None),
                &smartlabel::port_table(version, options),
            )
            .await;
        }
        assert_declared_features(&TagXlDecoder::new(options, None), &tagxl::port_table(options)).await;
    }

    #[test]
    fn test_context_reference_time() {
        let at = "2025-09-05T11:30:13Z".parse::<DateTime<Utc>>().unwrap();
        let ctx = UplinkContext::new("0011223344556677", 7).received_at(at);
        assert_eq!(ctx.reference_time(), at);
        assert_eq!(ctx.f_count, 7);
    }
}
