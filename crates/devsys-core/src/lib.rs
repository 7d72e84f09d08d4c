//! Devsys Core - Device registry and suitable-device resolution
//!
//! This crate provides the in-process device registry:
//! - Device descriptors, capability flags, and registry-owned records
//! - The registry itself, with its tie-broken suitable-device resolution
//! - Per-vendor named-option lists for external selection UIs
//! - Publisher traits the registry notifies after every change

pub mod device;
pub mod error;
pub mod options;
pub mod publish;
pub mod registry;

pub use device::{
    DeviceDescriptor, DeviceFlags, DeviceHandle, DeviceId, DeviceRecord, RegisterDeviceParams,
};
pub use error::{PublishError, RegistryError, ResultCode};
pub use options::{build_vendor_options, NamedOption, DEVICE_INFO_TYPE};
pub use publish::{NullPublisher, OptionListPublisher, SnapshotPublisher};
pub use registry::{device_list_name, DeviceRegistry, DEFAULT_NAMESPACE};
