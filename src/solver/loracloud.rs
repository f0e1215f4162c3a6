//! LoRaCloud device API client
//!
//! Posts one uplink to `<base>/api/v1/device/send` and turns the position
//! solution of the reply into a [`SolvedPosition`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::error::{InvalidOptions, ResponseInvalid, SolverError};
use super::http::{HttpRequest, HttpTransport};
use super::metrics::{NoopMetrics, SolverMetrics};
use super::position::SolvedPosition;
use super::{format_dev_eui, is_buffered, with_deadline, PositionSolver, SolverOptions};
use crate::gnssng::GnssNgHeader;
use crate::uplink::DecodedUplink;

/// Host of the sunset Semtech service
pub const LEGACY_HOST: &str = "mgs.loracloud.com";

/// 2025-07-31T00:00:00Z
const LEGACY_SUNSET_UNIX: i64 = 1_753_920_000;

const SEND_PATH: &str = "/api/v1/device/send";
const GNSS_NG_ALGORITHM: &str = "gnssng";

/// What to do when the client is pointed at [`LEGACY_HOST`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LegacyHostPolicy {
    #[default]
    Warn,
    /// Refuse the host once the service has been shut down
    Reject,
}

/// Client configuration
#[derive(Debug, Clone, PartialEq)]
pub struct LoraCloudSettings {
    pub base_url: String,
    pub access_token: String,
    /// Device timestamps older than this are Buffered
    pub buffered_threshold: chrono::Duration,
    /// Client-side deadline on top of the caller's cancellation, none by
    /// default
    pub request_timeout: Option<Duration>,
    pub legacy_host_policy: LegacyHostPolicy,
    /// Fail instead of omitting GNSS when the reply has no usable position
    pub require_position: bool,
}

impl Default for LoraCloudSettings {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            access_token: String::new(),
            buffered_threshold: chrono::Duration::minutes(1),
            request_timeout: None,
            legacy_host_policy: LegacyHostPolicy::Warn,
            require_position: false,
        }
    }
}

/// Host part of an `http(s)://host[:port]/...` URL
fn host_of(url: &str) -> Option<&str> {
    let rest = url.strip_prefix("https://").or_else(|| url.strip_prefix("http://"))?;
    let host = rest.split(['/', ':', '?']).next()?;
    (!host.is_empty()).then_some(host)
}

/// Apply the legacy host policy at instant `now`
///
/// # Errors
///
/// Returns [`InvalidOptions::LegacyHostRejected`] when `url` points at the
/// legacy host, the policy is reject and `now` is past the sunset.
pub fn check_legacy_host(url: &str, policy: LegacyHostPolicy, now: DateTime<Utc>) -> Result<(), InvalidOptions> {
    let Some(host) = host_of(url).filter(|h| h.eq_ignore_ascii_case(LEGACY_HOST)) else {
        return Ok(());
    };

    let sunset = Utc.timestamp_opt(LEGACY_SUNSET_UNIX, 0).single();
    let past_sunset = sunset.map_or(true, |s| now >= s);
    if policy == LegacyHostPolicy::Reject && past_sunset {
        return Err(InvalidOptions::LegacyHostRejected(host.to_string()));
    }
    warn!("Solver points at legacy LoRaCloud host {}, which is shut down on 2025-07-31", host);
    Ok(())
}

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    deveui: &'a str,
    uplink: Uplink<'a>,
}

#[derive(Debug, Serialize)]
struct Uplink<'a> {
    msgtype: &'static str,
    fcnt: u32,
    port: u8,
    payload: &'a str,
    timestamp: i64,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    result: Option<serde_json::Value>,
}

/// Per-device result of a send request
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UplinkResponse {
    #[serde(default)]
    pub deveui: String,
    #[serde(default)]
    pub position_solution: Option<PositionSolution>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PositionSolution {
    /// Latitude, longitude, altitude
    #[serde(default)]
    pub llh: Vec<f64>,
    pub accuracy: Option<f64>,
    pub gdop: Option<f64>,
    #[serde(default)]
    pub capture_time_utc: Option<f64>,
    #[serde(default)]
    pub capture_times_utc: Vec<f64>,
    #[serde(default)]
    pub algorithm_type: Option<String>,
}

impl PositionSolution {
    /// Capture instant in Unix seconds, `0.0` when unknown
    ///
    /// GNSS-NG solutions fall back to the last non-zero per-frame capture
    /// time.
    pub fn capture_utc(&self) -> f64 {
        let direct = self.capture_time_utc.unwrap_or_default();
        if self.algorithm_type.as_deref() != Some(GNSS_NG_ALGORITHM) || direct != 0.0 {
            return direct;
        }
        self.capture_times_utc
            .iter()
            .rev()
            .copied()
            .find(|t| *t != 0.0)
            .unwrap_or_default()
    }

    pub fn has_valid_coordinates(&self) -> bool {
        matches!(self.llh.as_slice(), [lat, lon, ..] if *lat != 0.0 && *lon != 0.0)
    }

    pub fn has_valid_position_resolution(&self) -> bool {
        self.has_valid_coordinates() && self.capture_utc() != 0.0
    }

    /// Why the solution cannot be used as a fix, `None` when it can
    fn defect(&self) -> Option<ResponseInvalid> {
        if self.llh.len() < 2 {
            Some(ResponseInvalid::PositionInvalid)
        } else if !self.has_valid_coordinates() {
            Some(ResponseInvalid::ZeroCoordinates)
        } else if self.capture_utc() == 0.0 {
            Some(ResponseInvalid::MissingCapturedAt)
        } else {
            None
        }
    }
}

/// Members of a direct per-device result; a `result` object carrying none
/// of them is keyed by device EUI
const UPLINK_RESPONSE_KEYS: [&str; 9] = [
    "deveui",
    "position_solution",
    "operation",
    "info_fields",
    "log_messages",
    "fulfilled_requests",
    "pending_requests",
    "stream_records",
    "dnlink",
];

/// Select the device's entry from a direct or nested `result`
fn device_response(result: serde_json::Value, formatted_eui: &str) -> Result<UplinkResponse, SolverError> {
    let nested = match result {
        serde_json::Value::Object(ref map) => !UPLINK_RESPONSE_KEYS.iter().any(|k| map.contains_key(*k)),
        _ => false,
    };
    if !nested {
        return serde_json::from_value(result).map_err(SolverError::DecodeFailed);
    }

    let mut devices: HashMap<String, UplinkResponse> =
        serde_json::from_value(result).map_err(SolverError::DecodeFailed)?;
    if devices.len() != 1 {
        return Err(ResponseInvalid::MultipleDevicesInResponse(devices.len()).into());
    }
    devices
        .remove(formatted_eui)
        .ok_or_else(|| ResponseInvalid::DeviceEuiNotInResponse(formatted_eui.to_string()).into())
}

fn seconds_to_utc(seconds: f64) -> Option<DateTime<Utc>> {
    let millis = (seconds * 1000.0).round() as i64;
    Utc.timestamp_millis_opt(millis).single()
}

/// LoRaCloud device API client
pub struct LoraCloudClient {
    settings: LoraCloudSettings,
    transport: Arc<dyn HttpTransport>,
    metrics: Arc<dyn SolverMetrics>,
}

impl std::fmt::Debug for LoraCloudClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoraCloudClient")
            .field("base_url", &self.settings.base_url)
            .field("buffered_threshold", &self.settings.buffered_threshold)
            .field("request_timeout", &self.settings.request_timeout)
            .finish()
    }
}

impl LoraCloudClient {
    /// # Errors
    ///
    /// Returns [`InvalidOptions::InvalidBaseUrl`] for a URL without an
    /// `http(s)` scheme and host, and [`InvalidOptions::LegacyHostRejected`]
    /// per the legacy host policy.
    pub fn new(settings: LoraCloudSettings, transport: Arc<dyn HttpTransport>) -> Result<Self, SolverError> {
        if host_of(&settings.base_url).is_none() {
            return Err(InvalidOptions::InvalidBaseUrl(settings.base_url.clone()).into());
        }
        check_legacy_host(&settings.base_url, settings.legacy_host_policy, Utc::now())?;

        Ok(Self {
            settings,
            transport,
            metrics: Arc::new(NoopMetrics),
        })
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn SolverMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn settings(&self) -> &LoraCloudSettings {
        &self.settings
    }

    fn send_url(&self) -> String {
        format!("{}{}", self.settings.base_url.trim_end_matches('/'), SEND_PATH)
    }

    async fn request(
        &self,
        payload: &str,
        options: &SolverOptions,
        cancel: &CancellationToken,
    ) -> Result<DecodedUplink, SolverError> {
        let eui = options.validate(payload)?;
        let formatted = format_dev_eui(&eui);
        let now = Utc::now();
        let timestamp = options.timestamp.unwrap_or(now).timestamp();

        let body = serde_json::to_string(&SendRequest {
            deveui: &formatted,
            uplink: Uplink {
                msgtype: "updf",
                fcnt: options.uplink_counter,
                port: options.port,
                payload,
                timestamp,
            },
        })
        .map_err(SolverError::BuildRequest)?;

        let request = HttpRequest {
            url: self.send_url(),
            headers: vec![
                ("Authorization".to_string(), self.settings.access_token.clone()),
                ("Content-Type".to_string(), "application/json".to_string()),
            ],
            body,
        };

        debug!(
            "Posting uplink of {} (fcnt {}, port {}) to {}",
            formatted, options.uplink_counter, options.port, request.url
        );
        let response = with_deadline(
            self.transport.post_json(request),
            self.settings.request_timeout,
            cancel,
        )
        .await?;
        debug!("Solver answered {} with {} bytes", response.status, response.body.len());

        if response.status != 200 {
            return Err(SolverError::UnexpectedStatus {
                code: response.status,
                body: (!response.body.is_empty()).then_some(response.body),
            });
        }

        let envelope: Envelope = serde_json::from_str(&response.body).map_err(SolverError::DecodeFailed)?;
        let result = envelope.result.ok_or(ResponseInvalid::NoPosition)?;
        let device = device_response(result, &formatted)?;

        let dev_eui = if device.deveui.is_empty() {
            options.dev_eui.clone()
        } else {
            device.deveui.replace('-', "")
        };
        let mut position = SolvedPosition::new(dev_eui);

        let defect = match &device.position_solution {
            None => Some(ResponseInvalid::NoPosition),
            Some(solution) => solution.defect(),
        };
        match (defect, device.position_solution) {
            (None, Some(solution)) => {
                position = position.with_fix(
                    solution.llh[0],
                    solution.llh[1],
                    solution.llh.get(2).copied().unwrap_or_default(),
                );
                position.accuracy = solution.accuracy;
                position.pdop = solution.gdop;
                position.captured_at = seconds_to_utc(solution.capture_utc());
            }
            (Some(defect), _) if self.settings.require_position => return Err(defect.into()),
            (Some(defect), _) => {
                let end_of_group = GnssNgHeader::from_hex(payload).map_or(true, |h| h.end_of_group);
                if end_of_group {
                    warn!("No usable position for {}: {}", formatted, defect);
                } else {
                    debug!("No position for {} before end of group: {}", formatted, defect);
                }
            }
            (None, None) => {}
        }

        if let Some(ts) = options.timestamp {
            let buffered =
                !options.suppress_buffered && is_buffered(ts, now, self.settings.buffered_threshold);
            if buffered {
                self.metrics.buffered();
            }
            position = position.with_timestamp(ts, buffered);
        }
        if let Some(moving) = options.moving {
            position = position.with_moving(moving);
        }

        Ok(position.into_uplink())
    }
}

#[async_trait]
impl PositionSolver for LoraCloudClient {
    fn name(&self) -> &'static str {
        "loracloud"
    }

    async fn solve(
        &self,
        payload: &str,
        options: &SolverOptions,
        cancel: &CancellationToken,
    ) -> Result<DecodedUplink, SolverError> {
        self.metrics.request();
        let result = self.request(payload, options, cancel).await;
        match &result {
            Ok(_) => self.metrics.success(),
            Err(e) => {
                debug!("Solver request failed: {}", e);
                self.metrics.failure();
            }
        }
        result
    }
}
