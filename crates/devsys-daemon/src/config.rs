//! Configuration loading

use anyhow::Result;
use devsys_core::{
    DeviceDescriptor, DeviceFlags, DeviceHandle, RegisterDeviceParams, DEFAULT_NAMESPACE,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub registry: RegistryConfig,
    /// Devices registered at startup on behalf of this host
    #[serde(default, rename = "device")]
    pub devices: Vec<DeviceConfig>,
    /// Suitability queries resolved and reported at startup
    #[serde(default, rename = "query")]
    pub queries: Vec<QueryConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Prefix of every published device list name
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Capacity of the snapshot broadcast channel
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            event_capacity: default_event_capacity(),
        }
    }
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

fn default_event_capacity() -> usize {
    100
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub vendor: String,
    pub model: String,
    #[serde(default)]
    pub topological_id: u64,
    #[serde(default)]
    pub serial_number: String,
    /// Capability flags, e.g. "PCI | GRAPHICS"
    #[serde(default)]
    pub flags: DeviceFlags,
    /// Defaults to "<model> (<serial>)"
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub handle: u64,
}

impl DeviceConfig {
    pub fn to_params(&self) -> RegisterDeviceParams {
        let display_name = self
            .display_name
            .clone()
            .unwrap_or_else(|| format!("{} ({})", self.model, self.serial_number));
        let device = DeviceDescriptor::new(&self.vendor, &self.model)
            .with_topological_id(self.topological_id)
            .with_serial_number(&self.serial_number)
            .with_flags(self.flags);
        RegisterDeviceParams::new(device, display_name, DeviceHandle(self.handle))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Label used when reporting the result
    pub name: String,
    pub vendor: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub topological_id: u64,
    #[serde(default)]
    pub serial_number: String,
    /// Capabilities the resolved device must carry
    #[serde(default)]
    pub flags: DeviceFlags,
}

impl QueryConfig {
    pub fn to_descriptor(&self) -> DeviceDescriptor {
        DeviceDescriptor::new(&self.vendor, &self.model)
            .with_topological_id(self.topological_id)
            .with_serial_number(&self.serial_number)
            .with_flags(self.flags)
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        info!(
            path = %path.display(),
            devices = config.devices.len(),
            queries = config.queries.len(),
            "Loaded configuration"
        );
        Ok(config)
    } else {
        info!(
            path = %path.display(),
            "Configuration file not found, using defaults"
        );
        Ok(Config::default())
    }
}
