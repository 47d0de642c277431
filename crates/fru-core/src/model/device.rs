use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::{API_VERSION, Metadata, ResourceKind, SCHEMA_VERSION};

/// Property-bag key holding the Redfish discovery URI.
pub const REDFISH_URI_KEY: &str = "redfish_uri";

/// Open-ended typed attributes reported by the collector.
pub type Properties = BTreeMap<String, Value>;

/// Why a property bag did not yield a discovery URI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum UriError {
    #[error("missing redfish_uri in properties")]
    Missing,
    #[error("redfish_uri is not a string")]
    NotAString,
    #[error("redfish_uri property is an empty string")]
    Empty,
}

/// Extract the discovery URI from a property bag.
///
/// # Errors
///
/// Returns [`UriError`] when the key is absent, not a JSON string, or empty.
pub fn discovery_uri(properties: &Properties) -> Result<&str, UriError> {
    match properties.get(REDFISH_URI_KEY) {
        None => Err(UriError::Missing),
        Some(Value::String(uri)) if uri.is_empty() => Err(UriError::Empty),
        Some(Value::String(uri)) => Ok(uri),
        Some(_) => Err(UriError::NotAString),
    }
}

/// Decode an explicit JSON `null` the same way as an absent field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// One discovered device as decoded from a snapshot payload.
///
/// The collector never assigns identities, so a `parentID` in the payload is
/// ignored: parent identities are only ever written by link resolution.
/// Fields that are absent or `null` decode as empty.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeviceDescriptor {
    #[serde(deserialize_with = "null_as_default")]
    pub device_type: String,
    #[serde(deserialize_with = "null_as_default")]
    pub manufacturer: String,
    #[serde(deserialize_with = "null_as_default")]
    pub part_number: String,
    #[serde(deserialize_with = "null_as_default")]
    pub serial_number: String,
    #[serde(deserialize_with = "null_as_default")]
    pub parent_serial_number: String,
    #[serde(deserialize_with = "null_as_default")]
    pub properties: Properties,
}

impl DeviceDescriptor {
    /// Discovery URI of this descriptor.
    ///
    /// # Errors
    ///
    /// See [`discovery_uri`].
    pub fn uri(&self) -> Result<&str, UriError> {
        discovery_uri(&self.properties)
    }

    /// Convert into a device spec carrying the given resolved parent.
    #[must_use]
    pub fn into_spec(self, parent_id: Option<String>) -> DeviceSpec {
        DeviceSpec {
            device_type: self.device_type,
            manufacturer: self.manufacturer,
            part_number: self.part_number,
            serial_number: self.serial_number,
            parent_id,
            parent_serial_number: self.parent_serial_number,
            properties: self.properties,
        }
    }
}

/// Desired state of a device.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSpec {
    pub device_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub manufacturer: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub part_number: String,
    pub serial_number: String,
    /// Identity of the parent device, populated by link resolution.
    #[serde(rename = "parentID", default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// Serial number of the parent as reported by the collector.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub parent_serial_number: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: Properties,
}

/// Observed state of a device.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStatus {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub phase: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(default)]
    pub ready: bool,
    /// Derived from other devices' `parent_id`; stores never persist it.
    #[serde(rename = "childrenDeviceIds", default, skip_serializing_if = "Vec::is_empty")]
    pub children_device_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub api_version: String,
    pub kind: ResourceKind,
    pub schema_version: String,
    pub metadata: Metadata,
    pub spec: DeviceSpec,
    #[serde(default)]
    pub status: DeviceStatus,
}

impl Device {
    /// Build a new device named after its discovery URI.
    #[must_use]
    pub fn new(uid: impl Into<String>, uri: &str, spec: DeviceSpec, now: DateTime<Utc>) -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: ResourceKind::Device,
            schema_version: SCHEMA_VERSION.to_string(),
            metadata: Metadata::new(uid, uri, now),
            spec,
            status: DeviceStatus::default(),
        }
    }

    #[must_use]
    pub fn uid(&self) -> &str {
        &self.metadata.uid
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Discovery URI recorded in this device's property bag.
    ///
    /// # Errors
    ///
    /// See [`discovery_uri`].
    pub fn uri(&self) -> Result<&str, UriError> {
        discovery_uri(&self.spec.properties)
    }
}
