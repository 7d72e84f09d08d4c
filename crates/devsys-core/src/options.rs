//! Per-vendor named-option lists for external selection UIs
//!
//! Every vendor gets one list holding its registered devices followed by
//! two sentinels:
//! - `None`: an explicit "no device selected" entry carrying an empty descriptor
//! - `Unknown`: an entry with no payload at all
//!
//! Devices of the same model are told apart by a 1-based counter appended to
//! the model name (`"x100 - 1"`, `"x100 - 2"`). Counters are recomputed from
//! scratch on every rebuild, visiting records in ascending id order.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::device::{DeviceDescriptor, DeviceRecord};
use crate::error::PublishError;

/// Type tag attached to every option entry
pub const DEVICE_INFO_TYPE: &str = "nos.sys.device.DeviceInfo";

pub const NONE_LABEL: &str = "None";
pub const UNKNOWN_LABEL: &str = "Unknown";

/// A single labelled entry of a named-option list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedOption {
    /// Human-readable label
    pub label: String,
    pub type_tag: String,
    /// Serialized descriptor, absent for the `Unknown` sentinel
    pub payload: Option<Vec<u8>>,
}

impl NamedOption {
    pub fn device(label: impl Into<String>, device: &DeviceDescriptor) -> Result<Self, PublishError> {
        Ok(Self {
            label: label.into(),
            type_tag: DEVICE_INFO_TYPE.to_string(),
            payload: Some(encode_descriptor(device)?),
        })
    }

    pub fn none() -> Result<Self, PublishError> {
        Self::device(NONE_LABEL, &DeviceDescriptor::default())
    }

    pub fn unknown() -> Self {
        Self {
            label: UNKNOWN_LABEL.to_string(),
            type_tag: DEVICE_INFO_TYPE.to_string(),
            payload: None,
        }
    }

    /// Decode the descriptor carried by this entry, if any
    pub fn descriptor(&self) -> Option<DeviceDescriptor> {
        self.payload
            .as_deref()
            .and_then(|bytes| serde_json::from_slice(bytes).ok())
    }
}

/// Serialize a descriptor as an option payload
pub fn encode_descriptor(device: &DeviceDescriptor) -> Result<Vec<u8>, PublishError> {
    Ok(serde_json::to_vec(device)?)
}

/// Sentinel-only list published for a vendor with no devices left
pub fn sentinel_options() -> Result<Vec<NamedOption>, PublishError> {
    Ok(vec![NamedOption::none()?, NamedOption::unknown()])
}

/// Group records by vendor and build each vendor's option list
///
/// Records are visited in ascending id order regardless of the order given,
/// so a fixed device set always produces the same labels.
pub fn build_vendor_options(
    records: &[DeviceRecord],
) -> Result<BTreeMap<String, Vec<NamedOption>>, PublishError> {
    let mut by_vendor: BTreeMap<&str, Vec<&DeviceRecord>> = BTreeMap::new();
    for record in records {
        by_vendor
            .entry(record.device.vendor_name.as_str())
            .or_default()
            .push(record);
    }

    let mut lists = BTreeMap::new();
    for (vendor, mut group) in by_vendor {
        group.sort_by_key(|r| r.id);

        let mut model_counts: HashMap<&str, usize> = HashMap::new();
        let mut entries = Vec::with_capacity(group.len() + 2);
        for record in group {
            let count = model_counts
                .entry(record.device.model_name.as_str())
                .or_insert(0);
            *count += 1;
            let label = format!("{} - {}", record.device.model_name, count);
            entries.push(NamedOption::device(label, &record.device)?);
        }
        entries.extend(sentinel_options()?);

        lists.insert(vendor.to_string(), entries);
    }

    Ok(lists)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{DeviceHandle, DeviceId, RegisterDeviceParams};

    fn record(id: u64, vendor: &str, model: &str) -> DeviceRecord {
        DeviceRecord::new(
            DeviceId(id),
            RegisterDeviceParams::new(
                DeviceDescriptor::new(vendor, model).with_serial_number(format!("SN-{id}")),
                format!("{model} #{id}"),
                DeviceHandle(id),
            ),
        )
    }

    fn labels(entries: &[NamedOption]) -> Vec<&str> {
        entries.iter().map(|e| e.label.as_str()).collect()
    }

    #[test]
    fn test_same_model_disambiguation() {
        let records = vec![
            record(3, "acme", "x100"),
            record(1, "acme", "x100"),
            record(2, "acme", "x100"),
        ];
        let lists = build_vendor_options(&records).unwrap();
        let acme = &lists["acme"];

        assert_eq!(
            labels(acme),
            vec!["x100 - 1", "x100 - 2", "x100 - 3", "None", "Unknown"]
        );
        // Ascending id order decides which device gets which suffix
        assert_eq!(acme[0].descriptor().unwrap().serial_number, "SN-1");
        assert_eq!(acme[2].descriptor().unwrap().serial_number, "SN-3");
    }

    #[test]
    fn test_counters_are_per_model_and_per_vendor() {
        let records = vec![
            record(1, "acme", "x100"),
            record(2, "acme", "x200"),
            record(3, "acme", "x100"),
            record(4, "globex", "x100"),
        ];
        let lists = build_vendor_options(&records).unwrap();

        assert_eq!(lists.len(), 2);
        assert_eq!(
            labels(&lists["acme"]),
            vec!["x100 - 1", "x200 - 1", "x100 - 2", "None", "Unknown"]
        );
        assert_eq!(labels(&lists["globex"]), vec!["x100 - 1", "None", "Unknown"]);
    }

    #[test]
    fn test_sentinels() {
        let none = NamedOption::none().unwrap();
        let descriptor = none.descriptor().unwrap();
        assert_eq!(descriptor.vendor_name, "");
        assert_eq!(descriptor, DeviceDescriptor::default());

        let unknown = NamedOption::unknown();
        assert!(unknown.payload.is_none());
        assert!(unknown.descriptor().is_none());
        assert_eq!(unknown.type_tag, DEVICE_INFO_TYPE);
    }

    #[test]
    fn test_empty_registry_has_no_lists() {
        let lists = build_vendor_options(&[]).unwrap();
        assert!(lists.is_empty());
    }
}
