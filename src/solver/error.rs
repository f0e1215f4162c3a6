//! Solver error taxonomy

use std::time::Duration;

use thiserror::Error;

/// Errors of a position solver call
#[derive(Debug, Error)]
pub enum SolverError {
    #[error("invalid options: {0}")]
    InvalidOptions(#[from] InvalidOptions),

    #[error("build request: {0}")]
    BuildRequest(#[source] serde_json::Error),

    #[error("request failed: {0}")]
    RequestFailed(#[from] TransportError),

    #[error("unexpected status: {code}")]
    UnexpectedStatus { code: u16, body: Option<String> },

    #[error("decode failed: {0}")]
    DecodeFailed(#[source] serde_json::Error),

    #[error("response invalid: {0}")]
    ResponseInvalid(#[from] ResponseInvalid),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidOptions {
    #[error("invalid DevEUI {0:?}: expected 16 hex characters")]
    InvalidDevEui(String),

    #[error("empty payload")]
    EmptyPayload,

    #[error("invalid payload hex: {0}")]
    InvalidPayload(String),

    #[error("invalid base URL {0:?}")]
    InvalidBaseUrl(String),

    #[error("legacy LoRaCloud host {0} was shut down")]
    LegacyHostRejected(String),
}

/// Failure to complete the HTTP exchange
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("context cancelled")]
    Cancelled,

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("http: {0}")]
    Http(#[from] reqwest::Error),

    #[error("connection: {0}")]
    Connection(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResponseInvalid {
    #[error("multiple devices in response: {0}")]
    MultipleDevicesInResponse(usize),

    #[error("device EUI {0} not in response")]
    DeviceEuiNotInResponse(String),

    #[error("position invalid")]
    PositionInvalid,

    #[error("no position")]
    NoPosition,

    #[error("zero coordinates")]
    ZeroCoordinates,

    #[error("missing captured-at time")]
    MissingCapturedAt,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_nest_causes_on_one_line() {
        let err = SolverError::from(InvalidOptions::InvalidDevEui("00".to_string()));
        assert_eq!(
            err.to_string(),
            "invalid options: invalid DevEUI \"00\": expected 16 hex characters"
        );

        let err = SolverError::from(TransportError::Cancelled);
        assert_eq!(err.to_string(), "request failed: context cancelled");
        assert!(std::error::Error::source(&err).is_some());

        let err = SolverError::from(ResponseInvalid::MultipleDevicesInResponse(2));
        assert_eq!(err.to_string(), "response invalid: multiple devices in response: 2");
    }
}
