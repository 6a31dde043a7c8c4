//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::{Result, SonarLinkError};
use crate::protocol::erchang::constants::{NOISE_MAX, RANGE_MAX, SENSITIVITY_MAX, SENSITIVITY_MIN};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub sonar: LinkConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub simulator: SimulatorConfig,
}

/// Link configuration
///
/// The first three fields are sent to the device, the rest tune this side of the link.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LinkConfig {
    /// Receiver sensitivity (1-10)
    #[serde(default = "default_sensitivity")]
    pub sensitivity: u8,

    /// Noise filter level (0-4: off, low, medium, high, max)
    #[serde(default = "default_noise")]
    pub noise: u8,

    /// Range selector (0-6: 3, 6, 9, 18, 24, 36, auto)
    #[serde(default = "default_range")]
    pub range: u8,

    /// Minimum depth change, in metres, before a sample is logged
    #[serde(default = "default_min_delta_depth")]
    pub min_delta_depth: f32,

    /// Minimum movement, in metres, before a sample is logged
    #[serde(default = "default_min_delta_pos")]
    pub min_delta_pos: f64,

    /// Disconnect if no sample arrives within this many ms (0 = never)
    #[serde(default)]
    pub sample_timeout_ms: u64,
}

/// Transport connection configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TransportConfig {
    /// Device to connect to
    #[serde(default = "default_device")]
    pub device: String,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    #[serde(default = "default_auto_connect")]
    pub auto_connect: bool,
}

/// Sample log configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TelemetryConfig {
    #[serde(default = "default_telemetry_enabled")]
    pub enabled: bool,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default = "default_max_records_per_file")]
    pub max_records_per_file: usize,

    #[serde(default = "default_max_files_to_keep")]
    pub max_files_to_keep: usize,

    #[serde(default = "default_log_format")]
    pub format: String,
}

/// Bench simulator configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SimulatorConfig {
    #[serde(default = "default_sample_interval_ms")]
    pub sample_interval_ms: u64,

    /// Also send location fixes on the test characteristic
    #[serde(default = "default_send_locations")]
    pub send_locations: bool,

    #[serde(default = "default_start_latitude")]
    pub start_latitude: f64,

    #[serde(default = "default_start_longitude")]
    pub start_longitude: f64,

    /// Go silent after this many frames (0 = never)
    #[serde(default)]
    pub stall_after_samples: u64,
}

// Default value functions
fn default_sensitivity() -> u8 { 5 }
fn default_noise() -> u8 { 0 }
fn default_range() -> u8 { RANGE_MAX }
fn default_min_delta_depth() -> f32 { 0.5 }
fn default_min_delta_pos() -> f64 { 1.0 }

fn default_device() -> String { "simulator".to_string() }
fn default_connect_timeout_ms() -> u64 { 100_000 }
fn default_retry_count() -> u32 { 3 }
fn default_retry_delay_ms() -> u64 { 100 }
fn default_auto_connect() -> bool { true }

fn default_telemetry_enabled() -> bool { true }
fn default_log_dir() -> String { "./logs".to_string() }
fn default_max_records_per_file() -> usize { 10000 }
fn default_max_files_to_keep() -> usize { 10 }
fn default_log_format() -> String { "jsonl".to_string() }

fn default_sample_interval_ms() -> u64 { 500 }
fn default_send_locations() -> bool { true }
fn default_start_latitude() -> f64 { 53.4184 }
fn default_start_longitude() -> f64 { -3.0018 }

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            sensitivity: default_sensitivity(),
            noise: default_noise(),
            range: default_range(),
            min_delta_depth: default_min_delta_depth(),
            min_delta_pos: default_min_delta_pos(),
            sample_timeout_ms: 0,
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            device: default_device(),
            connect_timeout_ms: default_connect_timeout_ms(),
            retry_count: default_retry_count(),
            retry_delay_ms: default_retry_delay_ms(),
            auto_connect: default_auto_connect(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: default_telemetry_enabled(),
            log_dir: default_log_dir(),
            max_records_per_file: default_max_records_per_file(),
            max_files_to_keep: default_max_files_to_keep(),
            format: default_log_format(),
        }
    }
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            sample_interval_ms: default_sample_interval_ms(),
            send_locations: default_send_locations(),
            start_latitude: default_start_latitude(),
            start_longitude: default_start_longitude(),
            stall_after_samples: 0,
        }
    }
}

pub(crate) fn invalid(message: impl std::fmt::Display) -> SonarLinkError {
    SonarLinkError::Config(toml::de::Error::custom(message))
}

impl LinkConfig {
    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any value is outside the range the device accepts
    pub fn validate(&self) -> Result<()> {
        if self.sensitivity < SENSITIVITY_MIN || self.sensitivity > SENSITIVITY_MAX {
            return Err(invalid(format!(
                "sensitivity must be between {} and {}",
                SENSITIVITY_MIN, SENSITIVITY_MAX
            )));
        }

        if self.noise > NOISE_MAX {
            return Err(invalid(format!("noise must be between 0 and {}", NOISE_MAX)));
        }

        if self.range > RANGE_MAX {
            return Err(invalid(format!("range must be between 0 and {}", RANGE_MAX)));
        }

        if self.min_delta_depth.is_nan() || self.min_delta_depth < 0.0 {
            return Err(invalid("min_delta_depth must be 0 or greater"));
        }

        if self.min_delta_pos.is_nan() || self.min_delta_pos < 0.0 {
            return Err(invalid("min_delta_pos must be 0 or greater"));
        }

        Ok(())
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
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
    /// use sonar_link::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from TOML text
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
        self.sonar.validate()?;

        if self.transport.device.is_empty() {
            return Err(invalid("transport device cannot be empty"));
        }

        if self.transport.connect_timeout_ms == 0 {
            return Err(invalid("connect_timeout_ms must be greater than 0"));
        }

        if self.transport.retry_delay_ms > 60000 {
            return Err(invalid("retry_delay_ms must be between 0 and 60000"));
        }

        if self.telemetry.enabled && self.telemetry.log_dir.is_empty() {
            return Err(invalid("telemetry log_dir cannot be empty when enabled"));
        }

        if self.telemetry.max_records_per_file == 0 {
            return Err(invalid("max_records_per_file must be greater than 0"));
        }

        if self.telemetry.max_files_to_keep == 0 {
            return Err(invalid("max_files_to_keep must be greater than 0"));
        }

        if !["jsonl", "binary"].contains(&self.telemetry.format.as_str()) {
            return Err(invalid("log format must be 'jsonl' or 'binary'"));
        }

        if self.simulator.sample_interval_ms == 0 || self.simulator.sample_interval_ms > 60000 {
            return Err(invalid("sample_interval_ms must be between 1 and 60000"));
        }

        Ok(())
    }
}
