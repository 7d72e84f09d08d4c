//! Device types shared by the registry, its callers, and its publishers

use bitflags::bitflags;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Registry-assigned identifier for a registered device instance
///
/// Ids are minted from a strictly increasing counter and never reused.
/// Zero is reserved to mean "no device".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(pub u64);

impl DeviceId {
    /// The reserved "no id" value
    pub const NONE: DeviceId = DeviceId(0);

    pub fn is_none(&self) -> bool {
        self.0 == 0
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque caller-owned reference stored alongside a device
///
/// Only the owning module knows what the value means (pointer, index, ...).
/// The registry hands it back untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceHandle(pub u64);

bitflags! {
    /// Device capability bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct DeviceFlags: u64 {
        const PCI = 1 << 0;
        const GRAPHICS = 1 << 1;
        const VIDEO_IO = 1 << 2;

        // Owning modules may define their own bits
        const _ = !0;
    }
}

impl Default for DeviceFlags {
    fn default() -> Self {
        Self::empty()
    }
}

impl DeviceFlags {
    /// True when every bit of `required` is present on `self`
    pub fn satisfies(&self, required: DeviceFlags) -> bool {
        *self & required == required
    }
}

/// Caller-supplied description of a device
///
/// Used both to register a device and to express a suitability query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    /// Vendor namespace the device belongs to
    #[serde(default)]
    pub vendor_name: String,
    /// Model name within the vendor
    #[serde(default)]
    pub model_name: String,
    /// Physical placement (slot, bus address, ...)
    #[serde(default)]
    pub topological_id: u64,
    /// Serial number, the identity of the physical unit
    #[serde(default)]
    pub serial_number: String,
    /// Capability bits
    #[serde(default)]
    pub flags: DeviceFlags,
}

impl DeviceDescriptor {
    pub fn new(vendor_name: impl Into<String>, model_name: impl Into<String>) -> Self {
        Self {
            vendor_name: vendor_name.into(),
            model_name: model_name.into(),
            ..Default::default()
        }
    }

    pub fn with_topological_id(mut self, topological_id: u64) -> Self {
        self.topological_id = topological_id;
        self
    }

    pub fn with_serial_number(mut self, serial_number: impl Into<String>) -> Self {
        self.serial_number = serial_number.into();
        self
    }

    pub fn with_flags(mut self, flags: DeviceFlags) -> Self {
        self.flags = flags;
        self
    }
}

/// Parameters for registering a device
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegisterDeviceParams {
    pub device: DeviceDescriptor,
    /// Name shown in user interfaces
    pub display_name: String,
    pub handle: DeviceHandle,
}

impl RegisterDeviceParams {
    pub fn new(device: DeviceDescriptor, display_name: impl Into<String>, handle: DeviceHandle) -> Self {
        Self {
            device,
            display_name: display_name.into(),
            handle,
        }
    }
}

/// A device as stored by the registry
///
/// Records are immutable once registered; changing a descriptor means
/// unregistering and registering again under a new id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub id: DeviceId,
    pub device: DeviceDescriptor,
    pub handle: DeviceHandle,
    pub display_name: String,
    /// When the device was registered
    pub registered_at: DateTime<Utc>,
}

impl DeviceRecord {
    pub(crate) fn new(id: DeviceId, params: RegisterDeviceParams) -> Self {
        Self {
            id,
            device: params.device,
            handle: params.handle,
            display_name: params.display_name,
            registered_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_id_none() {
        assert!(DeviceId::NONE.is_none());
        assert!(!DeviceId(7).is_none());
        assert_eq!(DeviceId(7).to_string(), "7");
    }

    #[test]
    fn test_flags_superset() {
        let device = DeviceFlags::PCI | DeviceFlags::GRAPHICS;
        assert!(device.satisfies(DeviceFlags::GRAPHICS));
        assert!(device.satisfies(DeviceFlags::PCI | DeviceFlags::GRAPHICS));
        assert!(device.satisfies(DeviceFlags::empty()));
        assert!(!device.satisfies(DeviceFlags::VIDEO_IO));
        assert!(!DeviceFlags::PCI.satisfies(DeviceFlags::PCI | DeviceFlags::GRAPHICS));
    }

    #[test]
    fn test_flags_retain_foreign_bits() {
        let flags = DeviceFlags::from_bits_retain(1 << 10) | DeviceFlags::PCI;
        assert_eq!(flags.bits(), (1 << 10) | 1);
        assert!(flags.satisfies(DeviceFlags::from_bits_retain(1 << 10)));
    }

    #[test]
    fn test_descriptor_json() {
        let device = DeviceDescriptor::new("acme", "x100")
            .with_topological_id(3)
            .with_serial_number("SN-1")
            .with_flags(DeviceFlags::PCI | DeviceFlags::VIDEO_IO);

        let json = serde_json::to_value(&device).unwrap();
        assert_eq!(json["vendor_name"], "acme");
        assert_eq!(json["flags"], "PCI | VIDEO_IO");

        let parsed: DeviceDescriptor = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, device);
    }

    #[test]
    fn test_descriptor_defaults_when_fields_missing() {
        let parsed: DeviceDescriptor = serde_json::from_str(r#"{"vendor_name":"acme"}"#).unwrap();
        assert_eq!(parsed.model_name, "");
        assert_eq!(parsed.topological_id, 0);
        assert!(parsed.flags.is_empty());
    }
}
