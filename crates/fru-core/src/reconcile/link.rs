//! Pass-2: resolve parent serial numbers into parent identities.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info};

use super::ItemError;
use super::index::DeviceIndex;
use crate::error::ErrorCode;
use crate::model::device::Device;
use crate::store::Store;

/// Result of resolving one touched device's parent.
#[derive(Debug)]
pub enum LinkOutcome {
    /// The device reports no parent serial.
    NoParent { uri: String },
    Linked {
        uri: String,
        uid: String,
        parent_uid: String,
    },
    /// The parent already points at the resolved identity; nothing written.
    Unchanged { uri: String },
    /// No device with the reported parent serial is known, or the device
    /// names itself as parent. The previous parent is left untouched.
    Unresolved { uri: String, parent_serial: String },
    Failed { uri: String, error: ItemError },
}

/// Link every device touched in Pass-1 to its parent.
///
/// Resolution only sees the serial index as it stood after Pass-1; links
/// written here never feed back into it. Devices are visited in URI order.
pub fn link_parents<S: Store + ?Sized>(
    store: &S,
    index: &DeviceIndex,
    touched: BTreeMap<String, Device>,
    now: DateTime<Utc>,
) -> Vec<LinkOutcome> {
    touched
        .into_iter()
        .map(|(uri, device)| link_one(store, index, uri, device, now))
        .collect()
}

fn link_one<S: Store + ?Sized>(
    store: &S,
    index: &DeviceIndex,
    uri: String,
    mut device: Device,
    now: DateTime<Utc>,
) -> LinkOutcome {
    let parent_serial = device.spec.parent_serial_number.clone();
    if parent_serial.is_empty() {
        return LinkOutcome::NoParent { uri };
    }

    let parent = index
        .by_serial(&parent_serial)
        .filter(|parent| parent.uid() != device.uid());
    let Some(parent) = parent else {
        error!(
            code = %ErrorCode::UnresolvedReference,
            uri = %uri,
            serial = %device.spec.serial_number,
            parent_serial = %parent_serial,
            "parent device not found"
        );
        return LinkOutcome::Unresolved { uri, parent_serial };
    };

    if device.spec.parent_id.as_deref() == Some(parent.uid()) {
        debug!(uri = %uri, parent_uid = %parent.uid(), "parent link unchanged");
        return LinkOutcome::Unchanged { uri };
    }

    let parent_uid = parent.uid().to_string();
    device.spec.parent_id = Some(parent_uid.clone());
    device.metadata.touch(now);

    if let Err(err) = store.update_device(&device) {
        error!(uri = %uri, uid = %device.uid(), error = %err, "failed to update parent link");
        return LinkOutcome::Failed {
            uri,
            error: err.into(),
        };
    }

    info!(
        uri = %uri,
        uid = %device.uid(),
        parent = %parent.name(),
        parent_uid = %parent_uid,
        "linked device to parent"
    );
    LinkOutcome::Linked {
        uri,
        uid: device.uid().to_string(),
        parent_uid,
    }
}

#[cfg(test)]
mod tests {
    use super::{LinkOutcome, link_parents};
    use crate::model::device::{Device, DeviceSpec, Properties, REDFISH_URI_KEY};
    use crate::reconcile::index::DeviceIndex;
    use crate::store::Store;
    use crate::store::memory::MemoryStore;
    use chrono::{Duration, Utc};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn device(uid: &str, uri: &str, serial: &str, parent_serial: &str) -> Device {
        let mut properties = Properties::new();
        properties.insert(REDFISH_URI_KEY.to_string(), json!(uri));
        let spec = DeviceSpec {
            serial_number: serial.to_string(),
            parent_serial_number: parent_serial.to_string(),
            properties,
            ..DeviceSpec::default()
        };
        Device::new(uid, uri, spec, Utc::now())
    }

    fn seeded(devices: &[Device]) -> (MemoryStore, DeviceIndex, BTreeMap<String, Device>) {
        let store = MemoryStore::new();
        let mut touched = BTreeMap::new();
        for device in devices {
            store.create_device(device).expect("seed");
            touched.insert(device.name().to_string(), device.clone());
        }
        let index = DeviceIndex::build(&store).expect("index");
        store.reset_write_counts();
        (store, index, touched)
    }

    #[test]
    fn links_child_to_parent_by_serial() {
        let parent = device("dev-p", "/r1", "S1", "");
        let child = device("dev-c", "/r2", "S2", "S1");
        let (store, index, touched) = seeded(&[parent, child]);

        let now = Utc::now() + Duration::seconds(1);
        let outcomes = link_parents(&store, &index, touched, now);

        assert!(matches!(outcomes[0], LinkOutcome::NoParent { .. }));
        assert!(matches!(
            &outcomes[1],
            LinkOutcome::Linked { parent_uid, .. } if parent_uid == "dev-p"
        ));
        let stored = store.get_device("dev-c").expect("get child");
        assert_eq!(stored.spec.parent_id.as_deref(), Some("dev-p"));
        assert_eq!(stored.metadata.updated_at, now);
        assert_eq!(store.write_counts().device_updates, 1);
    }

    #[test]
    fn existing_link_is_not_rewritten() {
        let parent = device("dev-p", "/r1", "S1", "");
        let mut child = device("dev-c", "/r2", "S2", "S1");
        child.spec.parent_id = Some("dev-p".to_string());
        let (store, index, touched) = seeded(&[parent, child]);

        let outcomes = link_parents(&store, &index, touched, Utc::now());
        assert!(matches!(outcomes[1], LinkOutcome::Unchanged { .. }));
        assert_eq!(store.write_counts().device_updates, 0);
    }

    #[test]
    fn unknown_parent_leaves_previous_link() {
        let mut child = device("dev-c", "/r2", "S2", "S9");
        child.spec.parent_id = Some("dev-old".to_string());
        let (store, index, touched) = seeded(&[child]);

        let outcomes = link_parents(&store, &index, touched, Utc::now());
        assert!(matches!(
            &outcomes[0],
            LinkOutcome::Unresolved { parent_serial, .. } if parent_serial == "S9"
        ));
        let stored = store.get_device("dev-c").expect("get child");
        assert_eq!(stored.spec.parent_id.as_deref(), Some("dev-old"));
    }

    #[test]
    fn self_parent_is_unresolved() {
        let looped = device("dev-l", "/r1", "S1", "S1");
        let (store, index, touched) = seeded(&[looped]);

        let outcomes = link_parents(&store, &index, touched, Utc::now());
        assert!(matches!(outcomes[0], LinkOutcome::Unresolved { .. }));
        assert_eq!(store.write_counts().device_updates, 0);
    }

    #[test]
    fn update_failure_is_isolated() {
        let parent = device("dev-p", "/r1", "S1", "");
        let child_a = device("dev-a", "/r2", "S2", "S1");
        let child_b = device("dev-b", "/r3", "S3", "S1");
        let (store, index, touched) = seeded(&[parent, child_a, child_b]);
        store.fail_update_of("dev-a");

        let outcomes = link_parents(&store, &index, touched, Utc::now());
        assert!(matches!(outcomes[1], LinkOutcome::Failed { .. }));
        assert!(matches!(outcomes[2], LinkOutcome::Linked { .. }));
    }
}
