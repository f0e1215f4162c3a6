//! # Solver Module
//!
//! Position solvers for encrypted GNSS blobs that cannot be decoded locally.
//!
//! Two implementations share the [`PositionSolver`] trait:
//! - [`LoraCloudClient`] posts the uplink to a LoRaCloud compatible endpoint
//! - [`AwsSolver`] forwards the blob to a [`PositionEstimator`] collaborator
//!   and reads back a GeoJSON point
//!
//! Both hold only immutable configuration and are shared between tasks
//! behind an `Arc`.

pub mod aws;
pub mod error;
pub mod http;
pub mod loracloud;
pub mod metrics;
mod position;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::uplink::DecodedUplink;

pub use aws::{AwsSolver, EstimateRequest, PositionEstimator};
pub use error::{InvalidOptions, ResponseInvalid, SolverError, TransportError};
pub use http::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
pub use loracloud::{LegacyHostPolicy, LoraCloudClient, LoraCloudSettings};
pub use metrics::{CountingMetrics, NoopMetrics, SolverMetrics};
pub use position::SolvedPosition;

/// Port every GNSS blob is forwarded with
pub const SOLVER_PORT: u8 = 192;

/// Which solver backend handles GNSS ports
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SolverVersion {
    /// GeoJSON position estimate collaborator
    V1,
    /// LoRaCloud device API
    #[default]
    V2,
}

/// Per-request solver inputs
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SolverOptions {
    /// 16 hex characters
    pub dev_eui: String,
    pub uplink_counter: u32,
    pub port: u8,
    /// Capture time the device sent along with the blob
    pub timestamp: Option<DateTime<Utc>>,
    pub moving: Option<bool>,
    /// Never declare the result Buffered
    pub suppress_buffered: bool,
}

impl SolverOptions {
    pub fn new(dev_eui: impl Into<String>, uplink_counter: u32, port: u8) -> Self {
        Self {
            dev_eui: dev_eui.into(),
            uplink_counter,
            port,
            ..Self::default()
        }
    }

    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn moving(mut self, moving: bool) -> Self {
        self.moving = Some(moving);
        self
    }

    pub fn suppress_buffered(mut self) -> Self {
        self.suppress_buffered = true;
        self
    }

    /// Check the DevEUI and payload, returning the DevEUI bytes
    ///
    /// # Errors
    ///
    /// Returns [`InvalidOptions::InvalidDevEui`] unless the DevEUI is 16 hex
    /// characters and [`InvalidOptions::EmptyPayload`] for an empty payload.
    pub fn validate(&self, payload: &str) -> Result<[u8; 8], InvalidOptions> {
        let invalid = || InvalidOptions::InvalidDevEui(self.dev_eui.clone());
        if self.dev_eui.len() != 16 {
            return Err(invalid());
        }
        let bytes = hex::decode(&self.dev_eui).map_err(|_| invalid())?;
        let eui: [u8; 8] = bytes.try_into().map_err(|_| invalid())?;

        if payload.is_empty() {
            return Err(InvalidOptions::EmptyPayload);
        }
        Ok(eui)
    }
}

/// Resolves a GNSS blob into a position
#[async_trait]
pub trait PositionSolver: Send + Sync {
    fn name(&self) -> &'static str;

    /// # Errors
    ///
    /// Returns the [`SolverError`] taxonomy; cancellation surfaces as
    /// [`TransportError::Cancelled`] inside `RequestFailed`.
    async fn solve(
        &self,
        payload: &str,
        options: &SolverOptions,
        cancel: &CancellationToken,
    ) -> Result<DecodedUplink, SolverError>;
}

/// `AA-BB-CC-DD-EE-FF-00-11`
pub fn format_dev_eui(eui: &[u8; 8]) -> String {
    eui.iter().map(|b| format!("{b:02X}")).collect::<Vec<_>>().join("-")
}

/// Whether `timestamp` lies further back than `threshold` from `now`
pub fn is_buffered(timestamp: DateTime<Utc>, now: DateTime<Utc>, threshold: chrono::Duration) -> bool {
    timestamp < now - threshold
}

/// Drive `request` until it completes, `timeout` elapses or `cancel` fires
///
/// Without a timeout only `cancel` bounds the request.
pub(crate) async fn with_deadline<T, F>(
    request: F,
    timeout: Option<Duration>,
    cancel: &CancellationToken,
) -> Result<T, TransportError>
where
    F: Future<Output = Result<T, TransportError>>,
{
    let bounded = async {
        match timeout {
            Some(timeout) => tokio::time::timeout(timeout, request)
                .await
                .unwrap_or(Err(TransportError::Timeout(timeout))),
            None => request.await,
        }
    };
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(TransportError::Cancelled),
        result = bounded => result,
    }
}
