//! Application state management

use devsys_core::{DeviceId, DeviceRecord, DeviceRegistry, RegistryError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::config::Config;
use crate::publisher::{BroadcastSnapshotPublisher, OptionListStore};

/// Outcome of one configured suitability query
#[derive(Debug)]
pub struct QueryOutcome {
    pub name: String,
    pub result: Result<DeviceRecord, RegistryError>,
}

/// Shared application state
pub struct AppState {
    /// The device registry, shared by every module of the host
    pub registry: Arc<DeviceRegistry>,
    /// Snapshot broadcaster
    pub snapshots: Arc<BroadcastSnapshotPublisher>,
    /// Published option lists
    pub options: Arc<OptionListStore>,
    /// Configuration
    pub config: Config,
    /// Devices this host registered on its own behalf
    owned: Mutex<Vec<DeviceId>>,
}

impl AppState {
    /// Create new application state
    pub fn new(config: Config) -> Arc<Self> {
        let snapshots = Arc::new(BroadcastSnapshotPublisher::new(config.registry.event_capacity));
        let options = Arc::new(OptionListStore::new());
        let registry = Arc::new(DeviceRegistry::new(
            config.registry.namespace.clone(),
            snapshots.clone(),
            options.clone(),
        ));

        Arc::new(Self {
            registry,
            snapshots,
            options,
            config,
            owned: Mutex::new(Vec::new()),
        })
    }

    /// Register every device listed in the configuration
    pub fn register_configured_devices(&self) -> Vec<DeviceId> {
        let ids: Vec<DeviceId> = self
            .config
            .devices
            .iter()
            .map(|device| self.registry.register_device(device.to_params()))
            .collect();

        self.owned_ids().extend(ids.iter().copied());
        info!(count = ids.len(), "Registered configured devices");
        ids
    }

    /// Unregister the devices this host registered
    pub fn unregister_owned_devices(&self) {
        let ids: Vec<DeviceId> = self.owned_ids().drain(..).collect();
        for id in ids {
            if let Err(e) = self.registry.unregister_device(id) {
                warn!(device = %id, error = %e, "Failed to unregister device");
            }
        }
    }

    /// Resolve every configured query against the current registry
    pub fn resolve_queries(&self) -> Vec<QueryOutcome> {
        self.config
            .queries
            .iter()
            .map(|query| QueryOutcome {
                name: query.name.clone(),
                result: self
                    .registry
                    .get_suitable_device(&query.to_descriptor())
                    .and_then(|id| self.registry.get_device(id)),
            })
            .collect()
    }

    /// Subscribe to encoded snapshot events
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.snapshots.subscribe()
    }

    fn owned_ids(&self) -> MutexGuard<'_, Vec<DeviceId>> {
        self.owned.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DeviceConfig, QueryConfig};
    use devsys_core::{DeviceFlags, ResultCode};

    fn device(model: &str, topo: u64, serial: &str, flags: DeviceFlags) -> DeviceConfig {
        DeviceConfig {
            vendor: "acme".to_string(),
            model: model.to_string(),
            topological_id: topo,
            serial_number: serial.to_string(),
            flags,
            display_name: None,
            handle: topo,
        }
    }

    fn query(name: &str, vendor: &str, flags: DeviceFlags) -> QueryConfig {
        QueryConfig {
            name: name.to_string(),
            vendor: vendor.to_string(),
            model: "x100".to_string(),
            topological_id: 9,
            serial_number: String::new(),
            flags,
        }
    }

    fn state() -> Arc<AppState> {
        AppState::new(Config {
            devices: vec![
                device("x100", 1, "S1", DeviceFlags::PCI),
                device("x100", 2, "S2", DeviceFlags::PCI | DeviceFlags::GRAPHICS),
            ],
            queries: vec![
                query("graphics", "acme", DeviceFlags::GRAPHICS),
                query("video", "acme", DeviceFlags::VIDEO_IO),
                query("other vendor", "globex", DeviceFlags::empty()),
            ],
            ..Default::default()
        })
    }

    #[test]
    fn test_configured_devices_and_queries() {
        let state = state();
        let ids = state.register_configured_devices();
        assert_eq!(ids.len(), 2);

        let outcomes = state.resolve_queries();
        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[0].result.as_ref().unwrap().id, ids[1]);
        assert_eq!(ResultCode::from(&outcomes[1].result), ResultCode::NotFound);
        assert_eq!(ResultCode::from(&outcomes[2].result), ResultCode::NotFound);
    }

    #[test]
    fn test_vendor_options_follow_registry() {
        let state = state();
        state.register_configured_devices();

        let list_name = state.registry.device_list_name_for_vendor("acme");
        assert_eq!(list_name, "nos.sys.device.DeviceList.acme");

        let options = state.options.get(&list_name).unwrap();
        let labels: Vec<&str> = options.iter().map(|o| o.label.as_str()).collect();
        assert_eq!(labels, vec!["x100 - 1", "x100 - 2", "None", "Unknown"]);

        state.unregister_owned_devices();
        assert!(state.registry.is_empty());
        let options = state.options.get(&list_name).unwrap();
        assert_eq!(options.len(), 2);
    }
}
