//! Configuration management.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::sensors::gpu::NvidiaSmi;

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Display refresh interval in milliseconds
    #[serde(default = "default_refresh_delay")]
    pub refresh_delay: u64,

    /// Enable debug logging
    #[serde(default)]
    pub debug: bool,

    /// Display mode selector sent to HWCX controllers
    #[serde(default)]
    pub display_mode: u8,

    /// GPU configuration
    #[serde(default)]
    pub gpu: GpuConfig,

    /// Disk configuration
    #[serde(default)]
    pub disk: DiskConfig,

    /// Network configuration
    #[serde(default)]
    pub network: NetworkConfig,
}

/// GPU query configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GpuConfig {
    /// NVIDIA query tool
    #[serde(default = "default_nvidia_smi")]
    pub nvidia_smi: String,

    /// Timeout for one query in milliseconds
    #[serde(default = "default_query_timeout")]
    pub query_timeout: u64,
}

impl GpuConfig {
    pub fn nvidia_smi(&self) -> NvidiaSmi {
        NvidiaSmi::new(
            self.nvidia_smi.clone(),
            Duration::from_millis(self.query_timeout),
        )
    }
}

impl Default for GpuConfig {
    fn default() -> Self {
        Self {
            nvidia_smi: default_nvidia_smi(),
            query_timeout: default_query_timeout(),
        }
    }
}

/// Disk configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiskConfig {
    /// Mount point whose usage is reported
    #[serde(default = "default_mount")]
    pub mount: String,
}

impl Default for DiskConfig {
    fn default() -> Self {
        Self {
            mount: default_mount(),
        }
    }
}

/// Network configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Interface name or "auto" for the default route
    #[serde(default = "default_interface")]
    pub interface: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            interface: default_interface(),
        }
    }
}

// Default value functions
fn default_refresh_delay() -> u64 {
    500
}

fn default_nvidia_smi() -> String {
    "nvidia-smi".to_string()
}

fn default_query_timeout() -> u64 {
    5000
}

fn default_mount() -> String {
    "/".to_string()
}

fn default_interface() -> String {
    "auto".to_string()
}

impl Config {
    /// Loads configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content =
            std::fs::read_to_string(path.as_ref()).context("Failed to read configuration file")?;
        let config: Config = toml::from_str(&content).context("Failed to parse configuration")?;
        Ok(config)
    }

    /// Loads `path` if it exists, otherwise returns defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<(Self, bool)> {
        if path.as_ref().exists() {
            Ok((Self::load(path)?, true))
        } else {
            Ok((Self::default(), false))
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            refresh_delay: default_refresh_delay(),
            debug: false,
            display_mode: 0,
            gpu: GpuConfig::default(),
            disk: DiskConfig::default(),
            network: NetworkConfig::default(),
        }
    }
}
