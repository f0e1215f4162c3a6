//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! Every section and field is optional; missing values take the defaults
//! below, so `Config::default()` and an empty file are equivalent.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::device::DecodeOptions;
use crate::error::{DecoderError, Result};
use crate::gnssng::{CaptureTimeSolver, DEFAULT_LEAP_SECONDS, DEFAULT_MAX_CAPTURE_AGE_SECS};
use crate::solver::{LegacyHostPolicy, LoraCloudSettings, SolverVersion};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub decoder: DecoderConfig,
    pub solver: SolverConfig,
    pub gnss_ng: GnssNgConfig,
    pub tagxl: TagXlConfig,
    pub logging: LoggingConfig,
}

/// Local parsing behavior
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct DecoderConfig {
    /// Skip the payload length check before parsing
    #[serde(default)]
    pub skip_validation: bool,

    /// Fail decodes whose fields fail validation
    #[serde(default)]
    pub strict: bool,
}

/// Position solver configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SolverConfig {
    #[serde(default)]
    pub version: SolverVersion,

    #[serde(default)]
    pub base_url: String,

    #[serde(default)]
    pub access_token: String,

    #[serde(default = "default_buffered_threshold_secs")]
    pub buffered_threshold_secs: u64,

    /// Client-side deadline; unset leaves the request to the caller's
    /// cancellation
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,

    #[serde(default)]
    pub legacy_host_policy: LegacyHostPolicy,

    /// Fail instead of omitting GNSS when the solver has no usable position
    #[serde(default)]
    pub require_position: bool,
}

/// GNSS-NG capture-time inference
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct GnssNgConfig {
    #[serde(default = "default_leap_seconds")]
    pub leap_seconds: i64,

    #[serde(default = "default_max_capture_age_secs")]
    pub max_capture_age_secs: i64,
}

/// Tag-XL local routing
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct TagXlConfig {
    /// Age past which timestamped Wi-Fi scans are Buffered
    #[serde(default = "default_buffered_age_secs")]
    pub buffered_age_secs: u64,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LoggingConfig {
    /// Used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default value functions
fn default_buffered_threshold_secs() -> u64 { 60 }

fn default_leap_seconds() -> i64 { DEFAULT_LEAP_SECONDS }
fn default_max_capture_age_secs() -> i64 { DEFAULT_MAX_CAPTURE_AGE_SECS }

fn default_buffered_age_secs() -> u64 { 300 }

fn default_log_level() -> String { "info".to_string() }

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            version: SolverVersion::default(),
            base_url: String::new(),
            access_token: String::new(),
            buffered_threshold_secs: default_buffered_threshold_secs(),
            request_timeout_ms: None,
            legacy_host_policy: LegacyHostPolicy::default(),
            require_position: false,
        }
    }
}

impl Default for GnssNgConfig {
    fn default() -> Self {
        Self {
            leap_seconds: default_leap_seconds(),
            max_capture_age_secs: default_max_capture_age_secs(),
        }
    }
}

impl Default for TagXlConfig {
    fn default() -> Self {
        Self {
            buffered_age_secs: default_buffered_age_secs(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn invalid(message: impl std::fmt::Display) -> DecoderError {
    DecoderError::Config(toml::de::Error::custom(message))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use tracker_decoder::config::Config;
    ///
    /// let config = Config::load("decoder.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration text
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        let solver = &self.solver;
        if !solver.base_url.is_empty()
            && !(solver.base_url.starts_with("https://") || solver.base_url.starts_with("http://"))
        {
            return Err(invalid(format!(
                "solver base_url must start with http:// or https://, got {:?}",
                solver.base_url
            )));
        }

        if let Some(ms) = solver.request_timeout_ms {
            if ms == 0 || ms > 60_000 {
                return Err(invalid("request_timeout_ms must be between 1 and 60000"));
            }
        }

        if solver.buffered_threshold_secs == 0 {
            return Err(invalid("buffered_threshold_secs must be greater than 0"));
        }

        if !(0..=60).contains(&self.gnss_ng.leap_seconds) {
            return Err(invalid("leap_seconds must be between 0 and 60"));
        }

        if self.gnss_ng.max_capture_age_secs <= 0 {
            return Err(invalid("max_capture_age_secs must be greater than 0"));
        }

        if self.tagxl.buffered_age_secs == 0 {
            return Err(invalid("tagxl buffered_age_secs must be greater than 0"));
        }

        if !["trace", "debug", "info", "warn", "error"].contains(&self.logging.level.as_str()) {
            return Err(invalid("logging level must be one of: trace, debug, info, warn, error"));
        }

        Ok(())
    }

    pub fn decode_options(&self) -> DecodeOptions {
        DecodeOptions {
            skip_validation: self.decoder.skip_validation,
            strict: self.decoder.strict,
        }
    }

    /// Settings of a LoRaCloud client built from the `[solver]` section
    pub fn loracloud_settings(&self) -> LoraCloudSettings {
        LoraCloudSettings {
            base_url: self.solver.base_url.clone(),
            access_token: self.solver.access_token.clone(),
            buffered_threshold: seconds(self.solver.buffered_threshold_secs),
            request_timeout: self.solver.request_timeout_ms.map(Duration::from_millis),
            legacy_host_policy: self.solver.legacy_host_policy,
            require_position: self.solver.require_position,
        }
    }

    pub fn capture_time_solver(&self) -> CaptureTimeSolver {
        CaptureTimeSolver::new(
            self.gnss_ng.leap_seconds,
            chrono::Duration::seconds(self.gnss_ng.max_capture_age_secs),
        )
    }

    pub fn tagxl_buffered_age(&self) -> chrono::Duration {
        seconds(self.tagxl.buffered_age_secs)
    }
}

fn seconds(secs: u64) -> chrono::Duration {
    chrono::Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX / 1000))
}
