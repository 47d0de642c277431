//! In-process [`Store`] with fault injection and write counters.
//!
//! Used by tests and dry runs. Faults are keyed so a test can break exactly
//! one record's write and observe how the engine isolates it.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashSet};

use super::{Store, StoreError, attach_children};
use crate::model::ResourceKind;
use crate::model::device::Device;
use crate::model::snapshot::DiscoverySnapshot;

#[derive(Debug, Default)]
struct Faults {
    list_devices: bool,
    snapshot_writes: bool,
    create_names: HashSet<String>,
    update_uids: HashSet<String>,
}

/// Counters of successful device writes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteCounts {
    pub device_creates: usize,
    pub device_updates: usize,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    devices: RefCell<BTreeMap<String, Device>>,
    snapshots: RefCell<BTreeMap<String, DiscoverySnapshot>>,
    faults: RefCell<Faults>,
    creates: Cell<usize>,
    updates: Cell<usize>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `list_devices` call fail until cleared.
    pub fn fail_device_listing(&self, fail: bool) {
        self.faults.borrow_mut().list_devices = fail;
    }

    /// Make `create_device` fail for devices with this name (discovery URI).
    pub fn fail_create_named(&self, name: impl Into<String>) {
        self.faults.borrow_mut().create_names.insert(name.into());
    }

    /// Make `update_device` fail for this identity.
    pub fn fail_update_of(&self, uid: impl Into<String>) {
        self.faults.borrow_mut().update_uids.insert(uid.into());
    }

    /// Make every snapshot create/update fail until cleared.
    pub fn fail_snapshot_writes(&self, fail: bool) {
        self.faults.borrow_mut().snapshot_writes = fail;
    }

    /// Drop all injected faults.
    pub fn clear_faults(&self) {
        *self.faults.borrow_mut() = Faults::default();
    }

    #[must_use]
    pub fn write_counts(&self) -> WriteCounts {
        WriteCounts {
            device_creates: self.creates.get(),
            device_updates: self.updates.get(),
        }
    }

    pub fn reset_write_counts(&self) {
        self.creates.set(0);
        self.updates.set(0);
    }

    #[must_use]
    pub fn device_count(&self) -> usize {
        self.devices.borrow().len()
    }

    fn injected(reason: &str) -> StoreError {
        StoreError::Unavailable(format!("injected fault: {reason}"))
    }
}

impl Store for MemoryStore {
    fn get_device(&self, uid: &str) -> Result<Device, StoreError> {
        let devices = self.devices.borrow();
        let mut device = devices.get(uid).cloned().ok_or_else(|| StoreError::NotFound {
            kind: ResourceKind::Device,
            uid: uid.to_string(),
        })?;
        device.status.children_device_ids = devices
            .values()
            .filter(|d| d.spec.parent_id.as_deref() == Some(uid))
            .map(|d| d.uid().to_string())
            .collect();
        Ok(device)
    }

    fn list_devices(&self) -> Result<Vec<Device>, StoreError> {
        if self.faults.borrow().list_devices {
            return Err(Self::injected("list devices"));
        }
        let mut devices: Vec<Device> = self.devices.borrow().values().cloned().collect();
        attach_children(&mut devices);
        Ok(devices)
    }

    fn create_device(&self, device: &Device) -> Result<(), StoreError> {
        if self.faults.borrow().create_names.contains(device.name()) {
            return Err(Self::injected("create device"));
        }
        let mut devices = self.devices.borrow_mut();
        if devices.contains_key(device.uid()) {
            return Err(StoreError::Conflict {
                kind: ResourceKind::Device,
                uid: device.uid().to_string(),
            });
        }
        let mut stored = device.clone();
        stored.status.children_device_ids.clear();
        devices.insert(stored.uid().to_string(), stored);
        self.creates.set(self.creates.get() + 1);
        Ok(())
    }

    fn update_device(&self, device: &Device) -> Result<(), StoreError> {
        if self.faults.borrow().update_uids.contains(device.uid()) {
            return Err(Self::injected("update device"));
        }
        let mut devices = self.devices.borrow_mut();
        let Some(existing) = devices.get_mut(device.uid()) else {
            return Err(StoreError::NotFound {
                kind: ResourceKind::Device,
                uid: device.uid().to_string(),
            });
        };
        let created_at = existing.metadata.created_at;
        *existing = device.clone();
        existing.metadata.created_at = created_at;
        existing.status.children_device_ids.clear();
        self.updates.set(self.updates.get() + 1);
        Ok(())
    }

    fn get_snapshot(&self, uid: &str) -> Result<DiscoverySnapshot, StoreError> {
        self.snapshots
            .borrow()
            .get(uid)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                kind: ResourceKind::DiscoverySnapshot,
                uid: uid.to_string(),
            })
    }

    fn list_snapshots(&self) -> Result<Vec<DiscoverySnapshot>, StoreError> {
        let mut snapshots: Vec<DiscoverySnapshot> =
            self.snapshots.borrow().values().cloned().collect();
        snapshots.sort_by(|a, b| {
            a.metadata
                .created_at
                .cmp(&b.metadata.created_at)
                .then_with(|| a.uid().cmp(b.uid()))
        });
        Ok(snapshots)
    }

    fn create_snapshot(&self, snapshot: &DiscoverySnapshot) -> Result<(), StoreError> {
        if self.faults.borrow().snapshot_writes {
            return Err(Self::injected("create snapshot"));
        }
        let mut snapshots = self.snapshots.borrow_mut();
        if snapshots.contains_key(snapshot.uid()) {
            return Err(StoreError::Conflict {
                kind: ResourceKind::DiscoverySnapshot,
                uid: snapshot.uid().to_string(),
            });
        }
        snapshots.insert(snapshot.uid().to_string(), snapshot.clone());
        Ok(())
    }

    fn update_snapshot(&self, snapshot: &DiscoverySnapshot) -> Result<(), StoreError> {
        if self.faults.borrow().snapshot_writes {
            return Err(Self::injected("update snapshot"));
        }
        let mut snapshots = self.snapshots.borrow_mut();
        let Some(existing) = snapshots.get_mut(snapshot.uid()) else {
            return Err(StoreError::NotFound {
                kind: ResourceKind::DiscoverySnapshot,
                uid: snapshot.uid().to_string(),
            });
        };
        let created_at = existing.metadata.created_at;
        *existing = snapshot.clone();
        existing.metadata.created_at = created_at;
        Ok(())
    }
}
