//! AWS-shaped position solver
//!
//! The blob, minus its leading tag byte, is handed to a [`PositionEstimator`]
//! together with the capture time in GPS seconds. The estimator answers with a
//! GeoJSON `Feature` holding a WGS84 `Point`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::error::{InvalidOptions, ResponseInvalid, SolverError, TransportError};
use super::metrics::{NoopMetrics, SolverMetrics};
use super::position::SolvedPosition;
use super::{is_buffered, with_deadline, PositionSolver, SolverOptions};
use crate::gnssng::DEFAULT_LEAP_SECONDS;
use crate::uplink::DecodedUplink;

/// 1980-01-06T00:00:00Z
const GPS_EPOCH_UNIX: i64 = 315_964_800;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_ESTIMATE_TIMEOUT: Duration = Duration::from_secs(2);

/// What the estimator is asked to solve
#[derive(Debug, Clone, PartialEq)]
pub struct EstimateRequest {
    /// Hex blob without the tag byte
    pub payload: String,
    /// Seconds since the GPS epoch, leap seconds included
    pub capture_time_gps: Option<f64>,
}

/// Collaborator resolving a blob into a GeoJSON position
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PositionEstimator: Send + Sync {
    async fn estimate(&self, request: EstimateRequest) -> Result<String, TransportError>;
}

#[derive(Debug, Deserialize)]
struct GeoJsonFeature {
    geometry: Option<Geometry>,
    #[serde(default)]
    properties: Properties,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    #[serde(default)]
    coordinates: Vec<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Properties {
    horizontal_accuracy: Option<f64>,
    timestamp: Option<DateTime<Utc>>,
}

/// Seconds since the GPS epoch for a UTC instant
pub fn gps_seconds(at: DateTime<Utc>, leap_seconds: i64) -> f64 {
    let seconds = at.timestamp() - GPS_EPOCH_UNIX + leap_seconds;
    seconds as f64 + f64::from(at.timestamp_subsec_millis()) / 1000.0
}

/// Solver backed by a [`PositionEstimator`]
pub struct AwsSolver {
    estimator: Arc<dyn PositionEstimator>,
    leap_seconds: i64,
    /// Whole solve
    timeout: Duration,
    /// One estimator call
    estimate_timeout: Duration,
    buffered_threshold: chrono::Duration,
    metrics: Arc<dyn SolverMetrics>,
}

impl std::fmt::Debug for AwsSolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsSolver")
            .field("leap_seconds", &self.leap_seconds)
            .field("timeout", &self.timeout)
            .field("estimate_timeout", &self.estimate_timeout)
            .field("buffered_threshold", &self.buffered_threshold)
            .finish()
    }
}

impl AwsSolver {
    pub fn new(estimator: Arc<dyn PositionEstimator>) -> Self {
        Self {
            estimator,
            leap_seconds: DEFAULT_LEAP_SECONDS,
            timeout: DEFAULT_TIMEOUT,
            estimate_timeout: DEFAULT_ESTIMATE_TIMEOUT,
            buffered_threshold: chrono::Duration::minutes(1),
            metrics: Arc::new(NoopMetrics),
        }
    }

    pub fn with_leap_seconds(mut self, leap_seconds: i64) -> Self {
        self.leap_seconds = leap_seconds;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Deadline of the estimator call, bounded by the solve deadline
    pub fn with_estimate_timeout(mut self, timeout: Duration) -> Self {
        self.estimate_timeout = timeout;
        self
    }

    pub fn with_buffered_threshold(mut self, threshold: chrono::Duration) -> Self {
        self.buffered_threshold = threshold;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn SolverMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    async fn request(
        &self,
        payload: &str,
        options: &SolverOptions,
        cancel: &CancellationToken,
    ) -> Result<DecodedUplink, SolverError> {
        options.validate(payload)?;
        let bytes = hex::decode(payload).map_err(|e| InvalidOptions::InvalidPayload(e.to_string()))?;
        let blob = bytes.get(1..).filter(|b| !b.is_empty()).ok_or(InvalidOptions::EmptyPayload)?;

        let request = EstimateRequest {
            payload: hex::encode(blob),
            capture_time_gps: options.timestamp.map(|ts| gps_seconds(ts, self.leap_seconds)),
        };
        debug!(
            "Estimating {} bytes for {} (capture gps {:?})",
            blob.len(),
            options.dev_eui,
            request.capture_time_gps
        );

        let body = with_deadline(self.estimator.estimate(request), Some(self.estimate_timeout), cancel).await?;
        let feature: GeoJsonFeature = serde_json::from_str(&body).map_err(SolverError::DecodeFailed)?;

        let coordinates = feature.geometry.map(|g| g.coordinates).unwrap_or_default();
        let (longitude, latitude, altitude) = match coordinates.as_slice() {
            [lon, lat, rest @ ..] => (*lon, *lat, rest.first().copied().unwrap_or_default()),
            _ => return Err(ResponseInvalid::NoPosition.into()),
        };
        if latitude == 0.0 && longitude == 0.0 {
            return Err(ResponseInvalid::ZeroCoordinates.into());
        }

        let mut position = SolvedPosition::new(options.dev_eui.to_uppercase()).with_fix(latitude, longitude, altitude);
        position.accuracy = feature.properties.horizontal_accuracy;
        position.captured_at = feature.properties.timestamp;

        if let Some(ts) = options.timestamp {
            let buffered = !options.suppress_buffered && is_buffered(ts, Utc::now(), self.buffered_threshold);
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
impl PositionSolver for AwsSolver {
    fn name(&self) -> &'static str {
        "aws"
    }

    async fn solve(
        &self,
        payload: &str,
        options: &SolverOptions,
        cancel: &CancellationToken,
    ) -> Result<DecodedUplink, SolverError> {
        self.metrics.request();
        let result = match tokio::time::timeout(self.timeout, self.request(payload, options, cancel)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(self.timeout).into()),
        };
        match &result {
            Ok(_) => self.metrics.success(),
            Err(e) => {
                debug!("Position estimate failed: {}", e);
                self.metrics.failure();
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::Feature;
    use crate::solver::SOLVER_PORT;
    use mockall::predicate::eq;

    const EUI: &str = "0011223344556677";

    const POINT: &str = r#"{"type":"Feature","geometry":{"type":"Point","coordinates":[7.622494,47.041811,512.5]},
        "properties":{"horizontalAccuracy":20.0,"horizontalConfidenceLevel":0.68,"timestamp":"2025-09-05T12:10:13Z"}}"#;

    #[test]
    fn test_gps_seconds() {
        let epoch: DateTime<Utc> = "1980-01-06T00:00:00Z".parse().unwrap();
        assert_eq!(gps_seconds(epoch, 0), 0.0);

        let at: DateTime<Utc> = "2025-09-05T12:10:13.250Z".parse().unwrap();
        assert_eq!(gps_seconds(at, 18), (1_757_074_213 - 315_964_800 + 18) as f64 + 0.25);
    }

    #[tokio::test]
    async fn test_strips_tag_byte_and_parses_point() {
        let at: DateTime<Utc> = "2025-09-05T12:10:13Z".parse().unwrap();
        let mut estimator = MockPositionEstimator::new();
        estimator
            .expect_estimate()
            .with(eq(EstimateRequest {
                payload: "a1b2c3".to_string(),
                capture_time_gps: Some(gps_seconds(at, 18)),
            }))
            .times(1)
            .returning(|_| Ok(POINT.to_string()));

        let solver = AwsSolver::new(Arc::new(estimator));
        let options = SolverOptions::new(EUI, 7, SOLVER_PORT).timestamp(at).moving(true);
        let uplink = solver.solve("80a1b2c3", &options, &CancellationToken::new()).await.unwrap();

        for feature in [Feature::Gnss, Feature::Timestamp, Feature::Buffered, Feature::Moving] {
            assert!(uplink.is(feature), "{feature:?}");
        }
        let gnss = uplink.data().as_gnss().unwrap();
        assert_eq!(gnss.latitude(), 47.041811);
        assert_eq!(gnss.longitude(), 7.622494);
        assert_eq!(gnss.altitude(), 512.5);
        assert_eq!(gnss.accuracy(), Some(20.0));
        assert_eq!(
            uplink.downcast_ref::<SolvedPosition>().unwrap().captured_at,
            Some(at)
        );
    }

    #[tokio::test]
    async fn test_without_timestamp() {
        let mut estimator = MockPositionEstimator::new();
        estimator
            .expect_estimate()
            .withf(|request| request.capture_time_gps.is_none())
            .returning(|_| Ok(r#"{"geometry":{"coordinates":[1.5,2.5]}}"#.to_string()));

        let solver = AwsSolver::new(Arc::new(estimator));
        let uplink = solver
            .solve("0001", &SolverOptions::new(EUI, 1, SOLVER_PORT), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(uplink.features().as_slice(), &[Feature::Gnss]);
        assert_eq!(uplink.data().as_gnss().unwrap().altitude(), 0.0);
    }

    #[tokio::test]
    async fn test_invalid_responses() {
        let cancel = CancellationToken::new();
        let options = SolverOptions::new(EUI, 1, SOLVER_PORT);

        let mut estimator = MockPositionEstimator::new();
        estimator
            .expect_estimate()
            .returning(|_| Ok(r#"{"geometry":{"coordinates":[0,0,0]}}"#.to_string()));
        let err = AwsSolver::new(Arc::new(estimator)).solve("0001", &options, &cancel).await.unwrap_err();
        assert!(matches!(err, SolverError::ResponseInvalid(ResponseInvalid::ZeroCoordinates)));

        let mut estimator = MockPositionEstimator::new();
        estimator.expect_estimate().returning(|_| Ok("{}".to_string()));
        let err = AwsSolver::new(Arc::new(estimator)).solve("0001", &options, &cancel).await.unwrap_err();
        assert!(matches!(err, SolverError::ResponseInvalid(ResponseInvalid::NoPosition)));

        let mut estimator = MockPositionEstimator::new();
        estimator.expect_estimate().returning(|_| Ok("<html>".to_string()));
        let err = AwsSolver::new(Arc::new(estimator)).solve("0001", &options, &cancel).await.unwrap_err();
        assert!(matches!(err, SolverError::DecodeFailed(_)));

        let mut estimator = MockPositionEstimator::new();
        estimator
            .expect_estimate()
            .returning(|_| Err(TransportError::Connection("reset".to_string())));
        let err = AwsSolver::new(Arc::new(estimator)).solve("0001", &options, &cancel).await.unwrap_err();
        assert!(matches!(err, SolverError::RequestFailed(TransportError::Connection(_))));
    }

    #[tokio::test]
    async fn test_invalid_payload_skips_estimator() {
        let mut estimator = MockPositionEstimator::new();
        estimator.expect_estimate().times(0);
        let solver = AwsSolver::new(Arc::new(estimator));
        let cancel = CancellationToken::new();
        let options = SolverOptions::new(EUI, 1, SOLVER_PORT);

        let err = solver.solve("zz", &options, &cancel).await.unwrap_err();
        assert!(matches!(err, SolverError::InvalidOptions(InvalidOptions::InvalidPayload(_))));

        let err = solver.solve("80", &options, &cancel).await.unwrap_err();
        assert!(matches!(err, SolverError::InvalidOptions(InvalidOptions::EmptyPayload)));
    }

    #[tokio::test]
    async fn test_cancelled_before_estimate() {
        let mut estimator = MockPositionEstimator::new();
        estimator.expect_estimate().returning(|_| Ok(POINT.to_string()));
        let solver = AwsSolver::new(Arc::new(estimator));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = solver
            .solve("0001", &SolverOptions::new(EUI, 1, SOLVER_PORT), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, SolverError::RequestFailed(TransportError::Cancelled)));
    }

    /// Answers with a point after `delay`
    struct SlowEstimator {
        delay: Duration,
    }

    #[async_trait]
    impl PositionEstimator for SlowEstimator {
        async fn estimate(&self, _request: EstimateRequest) -> Result<String, TransportError> {
            tokio::time::sleep(self.delay).await;
            Ok(POINT.to_string())
        }
    }

    #[test]
    fn test_default_deadlines() {
        let solver = AwsSolver::new(Arc::new(MockPositionEstimator::new()));
        assert_eq!(solver.timeout, Duration::from_secs(5));
        assert_eq!(solver.estimate_timeout, Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_estimate_deadline() {
        let estimator = SlowEstimator { delay: Duration::from_millis(500) };
        let solver = AwsSolver::new(Arc::new(estimator)).with_estimate_timeout(Duration::from_millis(20));

        let err = solver
            .solve("0001", &SolverOptions::new(EUI, 1, SOLVER_PORT), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SolverError::RequestFailed(TransportError::Timeout(t)) if t == Duration::from_millis(20)
        ));
    }

    #[tokio::test]
    async fn test_solve_deadline_bounds_estimate() {
        let estimator = SlowEstimator { delay: Duration::from_millis(500) };
        let solver = AwsSolver::new(Arc::new(estimator)).with_timeout(Duration::from_millis(20));

        let err = solver
            .solve("0001", &SolverOptions::new(EUI, 1, SOLVER_PORT), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SolverError::RequestFailed(TransportError::Timeout(t)) if t == Duration::from_millis(20)
        ));
    }
}
