//! Device registry and suitable-device resolution
//!
//! Owning modules register the devices they control and later unregister
//! them. Querying modules ask for "a device like this one" and get back the
//! best match under a fixed preference order:
//!
//! 1. Same model in the same physical slot (model name + topological id)
//! 2. Same physical unit, possibly moved (serial number)
//! 3. Same model anywhere
//! 4. Any device of the vendor
//!
//! Only devices of the queried vendor that carry every requested capability
//! flag are considered. Devices are enumerated in ascending id order, so
//! "first match" means "oldest registration".
//!
//! After every successful register/unregister the registry pushes a full
//! snapshot and the per-vendor option lists to its publishers. Publishing
//! happens after every lock is released, so a reader may briefly see
//! registry state that is newer than the last published projection.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

use crate::device::{DeviceDescriptor, DeviceHandle, DeviceId, DeviceRecord, RegisterDeviceParams};
use crate::error::{RegistryError, Result};
use crate::options::{build_vendor_options, sentinel_options};
use crate::publish::{NullPublisher, OptionListPublisher, SnapshotPublisher};

/// Namespace used when the host does not pick one
pub const DEFAULT_NAMESPACE: &str = "nos.sys.device";

/// Name of the option list published for a vendor
pub fn device_list_name(namespace: &str, vendor_name: &str) -> String {
    format!("{}.DeviceList.{}", namespace, vendor_name)
}

#[derive(Debug, Default)]
struct RegistryState {
    devices: BTreeMap<DeviceId, DeviceRecord>,
    /// Last id handed out; ids start at 1
    next_device_id: u64,
    /// Bumped on every mutation
    generation: u64,
}

/// What the last computed projection covered
#[derive(Debug, Default)]
struct PublishedState {
    generation: u64,
    /// Vendors that currently have a published list
    vendors: BTreeSet<String>,
}

/// Registry of devices registered by owning modules
pub struct DeviceRegistry {
    namespace: String,
    state: RwLock<RegistryState>,
    snapshot_publisher: Arc<dyn SnapshotPublisher>,
    option_publisher: Arc<dyn OptionListPublisher>,
    /// Guards projection bookkeeping, never held while publishing
    published: Mutex<PublishedState>,
}

impl DeviceRegistry {
    /// Create a registry publishing through the given collaborators
    pub fn new(
        namespace: impl Into<String>,
        snapshot_publisher: Arc<dyn SnapshotPublisher>,
        option_publisher: Arc<dyn OptionListPublisher>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            state: RwLock::new(RegistryState::default()),
            snapshot_publisher,
            option_publisher,
            published: Mutex::new(PublishedState::default()),
        }
    }

    /// Create a registry with no observers
    pub fn unobserved(namespace: impl Into<String>) -> Self {
        Self::new(namespace, Arc::new(NullPublisher), Arc::new(NullPublisher))
    }

    /// Prefix of every published device list name
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Register a device and return its freshly minted id
    ///
    /// Registration is trusted: descriptors are not validated and duplicates
    /// are not detected.
    pub fn register_device(&self, params: RegisterDeviceParams) -> DeviceId {
        let id = {
            let mut state = self.write();
            state.next_device_id += 1;
            state.generation += 1;
            let id = DeviceId(state.next_device_id);
            info!(
                device = %id,
                vendor = %params.device.vendor_name,
                model = %params.device.model_name,
                topology = params.device.topological_id,
                "Device registered"
            );
            state.devices.insert(id, DeviceRecord::new(id, params));
            id
        };

        self.notify_changed();
        id
    }

    /// Remove a device; a second call for the same id fails with not-found
    pub fn unregister_device(&self, id: DeviceId) -> Result<()> {
        check_id(id)?;
        {
            let mut state = self.write();
            let record = state
                .devices
                .remove(&id)
                .ok_or(RegistryError::DeviceNotFound(id))?;
            state.generation += 1;
            info!(
                device = %id,
                vendor = %record.device.vendor_name,
                model = %record.device.model_name,
                "Device unregistered"
            );
        }

        self.notify_changed();
        Ok(())
    }

    /// Find the device best matching `query`
    pub fn get_suitable_device(&self, query: &DeviceDescriptor) -> Result<DeviceId> {
        let state = self.read();

        let suitable: Vec<&DeviceRecord> = state
            .devices
            .values()
            .filter(|r| r.device.vendor_name == query.vendor_name)
            .filter(|r| r.device.flags.satisfies(query.flags))
            .collect();

        let Some(first) = suitable.first() else {
            debug!(vendor = %query.vendor_name, flags = ?query.flags, "No suitable device");
            return Err(RegistryError::NoSuitableDevice {
                vendor: query.vendor_name.clone(),
                flags: query.flags,
            });
        };

        let (record, reason) = if let Some(r) = suitable.iter().find(|r| {
            r.device.model_name == query.model_name && r.device.topological_id == query.topological_id
        }) {
            (r, "model and topology")
        } else if let Some(r) = suitable
            .iter()
            .find(|r| r.device.serial_number == query.serial_number)
        {
            (r, "serial number")
        } else if let Some(r) = suitable
            .iter()
            .find(|r| r.device.model_name == query.model_name)
        {
            (r, "model")
        } else {
            (first, "vendor")
        };

        debug!(
            device = %record.id,
            vendor = %query.vendor_name,
            candidates = suitable.len(),
            matched_by = reason,
            "Resolved suitable device"
        );
        Ok(record.id)
    }

    /// Handle the owning module registered the device with
    pub fn get_device_handle(&self, id: DeviceId) -> Result<DeviceHandle> {
        self.with_record(id, |r| r.handle)
    }

    /// Descriptor the device was registered with
    pub fn get_device_info(&self, id: DeviceId) -> Result<DeviceDescriptor> {
        self.with_record(id, |r| r.device.clone())
    }

    /// Full record of a registered device
    pub fn get_device(&self, id: DeviceId) -> Result<DeviceRecord> {
        self.with_record(id, DeviceRecord::clone)
    }

    /// Count-then-fill lookup of the devices of a vendor
    ///
    /// Returns the number of devices currently matching. When `out` is given,
    /// the first `min(out.len(), count)` ids are written to it. The set may
    /// change between a counting call and a filling call, so callers compare
    /// the returned count with their buffer size and retry on mismatch.
    pub fn get_devices_with_vendor(&self, vendor_name: &str, out: Option<&mut [DeviceId]>) -> usize {
        let state = self.read();
        let matching = state
            .devices
            .values()
            .filter(|r| r.device.vendor_name == vendor_name)
            .map(|r| r.id);

        match out {
            None => matching.count(),
            Some(buffer) => {
                let mut count = 0;
                for id in matching {
                    if let Some(slot) = buffer.get_mut(count) {
                        *slot = id;
                    }
                    count += 1;
                }
                count
            }
        }
    }

    /// Ids of all devices of a vendor, in ascending order
    pub fn devices_with_vendor(&self, vendor_name: &str) -> Vec<DeviceId> {
        self.read()
            .devices
            .values()
            .filter(|r| r.device.vendor_name == vendor_name)
            .map(|r| r.id)
            .collect()
    }

    /// Name of the option list published for `vendor_name`
    pub fn device_list_name_for_vendor(&self, vendor_name: &str) -> String {
        device_list_name(&self.namespace, vendor_name)
    }

    /// Snapshot of every registered device
    pub fn devices(&self) -> Vec<DeviceRecord> {
        self.read().devices.values().cloned().collect()
    }

    /// Number of registered devices
    pub fn len(&self) -> usize {
        self.read().devices.len()
    }

    /// True when no device is registered
    pub fn is_empty(&self) -> bool {
        self.read().devices.is_empty()
    }

    fn with_record<T>(&self, id: DeviceId, f: impl FnOnce(&DeviceRecord) -> T) -> Result<T> {
        check_id(id)?;
        self.read()
            .devices
            .get(&id)
            .map(f)
            .ok_or(RegistryError::DeviceNotFound(id))
    }

    fn read(&self) -> RwLockReadGuard<'_, RegistryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Push the snapshot and option lists to the publishers
    ///
    /// Projections are computed under the publication lock and pushed after
    /// it is released, so publishers may call back into the registry. A
    /// snapshot older than one already computed is dropped.
    fn notify_changed(&self) {
        let (devices, lists, vanished) = {
            let mut published = self
                .published
                .lock()
                .unwrap_or_else(PoisonError::into_inner);

            let (generation, devices) = {
                let state = self.read();
                (state.generation, state.devices.values().cloned().collect::<Vec<_>>())
            };
            if generation <= published.generation {
                debug!(generation, "Skipping stale device snapshot");
                return;
            }

            let lists = match build_vendor_options(&devices) {
                Ok(lists) => lists,
                Err(e) => {
                    warn!(error = %e, "Failed to build device option lists");
                    BTreeMap::new()
                }
            };

            // Vendors whose last device went away get a sentinel-only list
            let vanished: Vec<String> = published
                .vendors
                .iter()
                .filter(|v| !lists.contains_key(*v))
                .cloned()
                .collect();

            published.generation = generation;
            published.vendors = lists.keys().cloned().collect();
            (devices, lists, vanished)
        };

        if let Err(e) = self.snapshot_publisher.publish(&devices) {
            warn!(error = %e, "Failed to publish device snapshot");
        }

        for (vendor, entries) in &lists {
            let list_name = self.device_list_name_for_vendor(vendor);
            match self.option_publisher.update(&list_name, entries) {
                Ok(()) => debug!(list = %list_name, entries = entries.len(), "Published device list"),
                Err(e) => warn!(list = %list_name, error = %e, "Failed to publish device list"),
            }
        }

        for vendor in vanished {
            let list_name = self.device_list_name_for_vendor(&vendor);
            let result = sentinel_options().and_then(|entries| self.option_publisher.update(&list_name, &entries));
            if let Err(e) = result {
                warn!(list = %list_name, error = %e, "Failed to clear device list");
            }
        }
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::unobserved(DEFAULT_NAMESPACE)
    }
}

fn check_id(id: DeviceId) -> Result<()> {
    if id.is_none() {
        return Err(RegistryError::InvalidArgument("device id 0 is reserved".to_string()));
    }
    Ok(())
}
