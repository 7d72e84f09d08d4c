//! Collaborator interfaces the registry pushes its projections through
//!
//! The registry calls both publishers after every successful mutation,
//! outside its lock. Neither call is batched, so implementations must be
//! cheap enough to run once per register/unregister.

use crate::device::DeviceRecord;
use crate::error::PublishError;
use crate::options::NamedOption;

/// Receives the full device set after every change
pub trait SnapshotPublisher: Send + Sync {
    fn publish(&self, devices: &[DeviceRecord]) -> Result<(), PublishError>;
}

/// Receives per-vendor option lists, each replacing the previous list of the same name
pub trait OptionListPublisher: Send + Sync {
    fn update(&self, list_name: &str, entries: &[NamedOption]) -> Result<(), PublishError>;
}

/// Publisher that drops everything, for hosts without observers
#[derive(Debug, Clone, Copy, Default)]
pub struct NullPublisher;

impl SnapshotPublisher for NullPublisher {
    fn publish(&self, _devices: &[DeviceRecord]) -> Result<(), PublishError> {
        Ok(())
    }
}

impl OptionListPublisher for NullPublisher {
    fn update(&self, _list_name: &str, _entries: &[NamedOption]) -> Result<(), PublishError> {
        Ok(())
    }
}
