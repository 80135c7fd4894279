//! Configuration for the packet server
//!
//! Two inputs:
//! - [`AppConfig`]: daemon settings from an optional TOML file (all fields defaulted)
//! - [`concentrator::ConcentratorConfig`]: radio configuration from the gateway's JSON files

pub mod concentrator;
pub mod document;

pub use concentrator::ConcentratorConfig;

use crate::core::types::{Bandwidth, CodeRate, DataRate};
use crate::error::{Error, Result};
use crate::pipeline::AcceptancePolicy;
use crate::spotter::PayloadLayout;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default settings file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "lora-pkt-server.toml";

/// Top-level application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub concentrator: DeviceConfig,
    pub payload: PayloadConfig,
    pub filter: FilterConfig,
    pub logging: LoggingConfig,
}

/// TCP server settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// TCP bind address
    ///
    /// Examples:
    /// - `0.0.0.0:2600` - All interfaces on port 2600
    /// - `127.0.0.1:2600` - Localhost only
    pub bind_address: String,

    /// Line sent to every client right after it connects
    pub greeting: String,

    /// Upper bound on a single record write (0 = no limit)
    pub write_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:2600".to_string(),
            greeting: "Connected...\n".to_string(),
            write_timeout_ms: 500,
        }
    }
}

impl ServerConfig {
    pub fn write_timeout(&self) -> Option<Duration> {
        (self.write_timeout_ms > 0).then(|| Duration::from_millis(self.write_timeout_ms))
    }
}

/// Concentrator device settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Driver to use (`"mock"`)
    pub device: String,

    /// Radio configuration candidates, checked in order, first found wins
    pub config_files: Vec<PathBuf>,

    /// Packets fetched from the driver per poll
    pub max_packets_per_poll: usize,

    /// Sleep when a poll returns nothing
    pub idle_sleep_ms: u64,

    /// Statistics log period in seconds (0 = off)
    pub stats_interval_s: u64,

    pub mock: MockDeviceConfig,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            device: "mock".to_string(),
            config_files: vec![
                PathBuf::from("global_conf.json"),
                PathBuf::from("local_conf.json"),
            ],
            max_packets_per_poll: 16,
            idle_sleep_ms: 10,
            stats_interval_s: 10,
            mock: MockDeviceConfig::default(),
        }
    }
}

/// Mock concentrator settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MockDeviceConfig {
    /// Period of synthetic spotter packets per enabled channel (0 = none)
    pub spotter_interval_ms: u64,
}

impl Default for MockDeviceConfig {
    fn default() -> Self {
        Self {
            spotter_interval_ms: 1000,
        }
    }
}

/// Spotter payload settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct PayloadConfig {
    pub layout: PayloadLayout,
}

/// Packet acceptance settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Drop packets whose CRC is not OK
    pub require_crc: bool,
    /// Required LoRa bandwidth in Hz
    pub bandwidth_hz: u32,
    /// Required LoRa spreading factor
    pub spreading_factor: u8,
    /// Required coding rate (`"4/5"` .. `"4/8"`)
    pub coding_rate: String,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            require_crc: true,
            bandwidth_hz: 125_000,
            spreading_factor: 7,
            coding_rate: "4/5".to_string(),
        }
    }
}

impl FilterConfig {
    /// Validate and convert to the pipeline's policy
    pub fn to_policy(&self) -> Result<AcceptancePolicy> {
        let bandwidth = Bandwidth::from_lora_hz(self.bandwidth_hz);
        if bandwidth == Bandwidth::Undefined {
            return Err(Error::Config(format!(
                "filter.bandwidth_hz {} is not a LoRa bandwidth",
                self.bandwidth_hz
            )));
        }
        let datarate = DataRate::lora(self.spreading_factor);
        if datarate == DataRate::Undefined {
            return Err(Error::Config(format!(
                "filter.spreading_factor {} is outside SF7..SF12",
                self.spreading_factor
            )));
        }
        let coderate = CodeRate::from_name(&self.coding_rate).ok_or_else(|| {
            Error::Config(format!(
                "filter.coding_rate {:?} is not one of 4/5, 4/6, 4/7, 4/8",
                self.coding_rate
            ))
        })?;

        Ok(AcceptancePolicy {
            require_crc: self.require_crc,
            bandwidth,
            datarate,
            coderate,
        })
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file
    ///
    /// # Example
    /// ```no_run
    /// use lora_pkt_server::config::AppConfig;
    ///
    /// let config = AppConfig::from_file("lora-pkt-server.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Explicit path, else the default file if present, else built-in defaults
    ///
    /// Runs before the logger exists; the caller logs the returned source.
    pub fn load(explicit: Option<&Path>) -> Result<(Self, SettingsSource)> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => PathBuf::from(DEFAULT_CONFIG_FILE),
            None => return Ok((Self::default(), SettingsSource::Defaults)),
        };
        let config = Self::from_file(&path)?;
        Ok((config, SettingsSource::File(path)))
    }
}

/// Where the daemon settings came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsSource {
    File(PathBuf),
    Defaults,
}

impl std::fmt::Display for SettingsSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettingsSource::File(path) => write!(f, "settings from {}", path.display()),
            SettingsSource::Defaults => write!(f, "default settings"),
        }
    }
}
