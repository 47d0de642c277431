//! Store interface consumed by the reconciliation engine.
//!
//! A [`Store`] offers point lookup, full listing, create and update for both
//! resource kinds. Implementations guarantee per-record atomicity only: a
//! single create or update applies fully or not at all, with no isolation
//! across a whole reconciliation run.
//!
//! Implementations:
//! - [`crate::db::SqliteStore`]: the durable `SQLite` adapter
//! - [`memory::MemoryStore`]: in-process store with fault injection
//! - [`deadline::DeadlineStore`]: wraps another store with a wall-clock deadline

pub mod deadline;
pub mod memory;

use std::time::Duration;

use crate::error::ErrorCode;
use crate::model::ResourceKind;
use crate::model::device::Device;
use crate::model::snapshot::DiscoverySnapshot;

/// Errors surfaced by store adapters.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No record of `kind` with this identity.
    #[error("{kind} '{uid}' not found")]
    NotFound { kind: ResourceKind, uid: String },

    /// A record with this identity already exists.
    #[error("{kind} '{uid}' already exists")]
    Conflict { kind: ResourceKind, uid: String },

    /// The backing database rejected the operation.
    #[error("store backend error: {0}")]
    Backend(#[from] rusqlite::Error),

    /// A stored column could not be decoded back into a record.
    #[error("corrupt {kind} record '{uid}': {reason}")]
    Corrupt {
        kind: ResourceKind,
        uid: String,
        reason: String,
    },

    /// The caller-imposed deadline passed before the operation started.
    #[error("store deadline exceeded after {elapsed:?}")]
    DeadlineExceeded { elapsed: Duration },

    /// The store cannot be reached at all.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound {
                kind: ResourceKind::Device,
                ..
            } => ErrorCode::DeviceNotFound,
            Self::NotFound {
                kind: ResourceKind::DiscoverySnapshot,
                ..
            } => ErrorCode::SnapshotNotFound,
            Self::Conflict { .. } => ErrorCode::DuplicateRecord,
            Self::Corrupt { .. } => ErrorCode::CorruptRecord,
            Self::Backend(_) | Self::DeadlineExceeded { .. } | Self::Unavailable(_) => {
                ErrorCode::StoreUnavailable
            }
        }
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Persistent home of devices and snapshots.
pub trait Store {
    /// Fetch one device. `status.children_device_ids` is filled from the
    /// current parent links.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no device has this identity.
    fn get_device(&self, uid: &str) -> Result<Device, StoreError>;

    /// List every device, children filled as in [`Store::get_device`].
    ///
    /// # Errors
    ///
    /// Returns an error if the listing cannot be produced in full.
    fn list_devices(&self) -> Result<Vec<Device>, StoreError>;

    /// Persist a new device.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] if the identity is taken.
    fn create_device(&self, device: &Device) -> Result<(), StoreError>;

    /// Overwrite an existing device. `created_at` is never changed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no device has this identity.
    fn update_device(&self, device: &Device) -> Result<(), StoreError>;

    /// Fetch one snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no snapshot has this identity.
    fn get_snapshot(&self, uid: &str) -> Result<DiscoverySnapshot, StoreError>;

    /// List every snapshot, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the listing cannot be produced in full.
    fn list_snapshots(&self) -> Result<Vec<DiscoverySnapshot>, StoreError>;

    /// Persist a new snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] if the identity is taken.
    fn create_snapshot(&self, snapshot: &DiscoverySnapshot) -> Result<(), StoreError>;

    /// Overwrite an existing snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no snapshot has this identity.
    fn update_snapshot(&self, snapshot: &DiscoverySnapshot) -> Result<(), StoreError>;
}

/// Fill `children_device_ids` on every device from the parent links of the set.
pub(crate) fn attach_children(devices: &mut [Device]) {
    let mut children: std::collections::BTreeMap<String, Vec<String>> =
        std::collections::BTreeMap::new();
    for device in devices.iter() {
        if let Some(parent) = &device.spec.parent_id {
            children
                .entry(parent.clone())
                .or_default()
                .push(device.uid().to_string());
        }
    }
    for device in devices.iter_mut() {
        device.status.children_device_ids = children.remove(device.uid()).unwrap_or_default();
    }
}
