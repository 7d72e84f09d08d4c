//! Error taxonomy for registry operations

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::device::{DeviceFlags, DeviceId};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Device not found: {0}")]
    DeviceNotFound(DeviceId),
    #[error("No suitable device for vendor {vendor} with flags {flags:?}")]
    NoSuitableDevice { vendor: String, flags: DeviceFlags },
}

impl RegistryError {
    /// Result code reported to module callers
    pub fn code(&self) -> ResultCode {
        match self {
            Self::InvalidArgument(_) => ResultCode::InvalidArgument,
            Self::DeviceNotFound(_) | Self::NoSuitableDevice { .. } => ResultCode::NotFound,
        }
    }
}

/// Failure reported by a collaborator while publishing registry state
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("Publisher unavailable: {0}")]
    Unavailable(String),
}

/// Flat outcome of a registry call, as seen across a module boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultCode {
    Success,
    InvalidArgument,
    NotFound,
}

impl<T> From<&Result<T, RegistryError>> for ResultCode {
    fn from(result: &Result<T, RegistryError>) -> Self {
        match result {
            Ok(_) => ResultCode::Success,
            Err(e) => e.code(),
        }
    }
}

pub type Result<T, E = RegistryError> = std::result::Result<T, E>;
