//! Host-side publishers the registry notifies
//!
//! Snapshots are encoded as tagged JSON events and fanned out on a broadcast
//! channel. Option lists are kept in memory, latest list per name.

use devsys_core::{
    DeviceDescriptor, DeviceRecord, NamedOption, OptionListPublisher, PublishError,
    SnapshotPublisher,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};
use tokio::sync::broadcast;
use tracing::debug;

/// Event sent to observers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum SubsystemEvent {
    #[serde(rename = "device_list")]
    DeviceList(Vec<DeviceDescriptor>),
}

/// Broadcasts every snapshot as an encoded `SubsystemEvent`
pub struct BroadcastSnapshotPublisher {
    event_tx: broadcast::Sender<String>,
}

impl BroadcastSnapshotPublisher {
    pub fn new(capacity: usize) -> Self {
        let (event_tx, _) = broadcast::channel(capacity.max(1));
        Self { event_tx }
    }

    /// Subscribe to encoded snapshot events
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.event_tx.subscribe()
    }
}

impl SnapshotPublisher for BroadcastSnapshotPublisher {
    fn publish(&self, devices: &[DeviceRecord]) -> Result<(), PublishError> {
        let event = SubsystemEvent::DeviceList(devices.iter().map(|r| r.device.clone()).collect());
        let json = serde_json::to_string(&event)?;

        // No subscribers is not a failure
        if self.event_tx.send(json).is_err() {
            debug!(devices = devices.len(), "No snapshot subscribers");
        }
        Ok(())
    }
}

/// Latest option list per list name
#[derive(Default)]
pub struct OptionListStore {
    lists: RwLock<BTreeMap<String, Vec<NamedOption>>>,
}

impl OptionListStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a list by name
    pub fn get(&self, list_name: &str) -> Option<Vec<NamedOption>> {
        self.lists
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(list_name)
            .cloned()
    }

    /// Names of all lists published so far
    pub fn names(&self) -> Vec<String> {
        self.lists
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }
}

impl OptionListPublisher for OptionListStore {
    fn update(&self, list_name: &str, entries: &[NamedOption]) -> Result<(), PublishError> {
        self.lists
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(list_name.to_string(), entries.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use devsys_core::{DeviceFlags, DeviceHandle, DeviceRegistry, RegisterDeviceParams};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_snapshot_broadcast() {
        let snapshots = Arc::new(BroadcastSnapshotPublisher::new(16));
        let options = Arc::new(OptionListStore::new());
        let registry = DeviceRegistry::new("test", snapshots.clone(), options.clone());
        let mut rx = snapshots.subscribe();

        registry.register_device(RegisterDeviceParams::new(
            DeviceDescriptor::new("acme", "x100").with_flags(DeviceFlags::PCI),
            "x100",
            DeviceHandle(1),
        ));

        let json = rx.recv().await.unwrap();
        let event: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(event["type"], "device_list");
        assert_eq!(event["data"][0]["vendor_name"], "acme");
        assert_eq!(event["data"][0]["flags"], "PCI");
    }

    #[test]
    fn test_publish_without_subscribers() {
        let snapshots = BroadcastSnapshotPublisher::new(4);
        assert!(snapshots.publish(&[]).is_ok());
    }

    #[test]
    fn test_option_store_replaces_lists() {
        let store = OptionListStore::new();
        store
            .update("ns.DeviceList.acme", &[NamedOption::unknown()])
            .unwrap();
        store
            .update("ns.DeviceList.acme", &[NamedOption::none().unwrap(), NamedOption::unknown()])
            .unwrap();

        assert_eq!(store.get("ns.DeviceList.acme").unwrap().len(), 2);
        assert_eq!(store.names(), vec!["ns.DeviceList.acme".to_string()]);
        assert!(store.get("ns.DeviceList.globex").is_none());
    }
}
