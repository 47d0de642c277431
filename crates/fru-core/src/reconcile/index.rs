//! Per-run lookup tables over the current device inventory.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::model::device::Device;
use crate::store::{Store, StoreError};

/// Discovery URI → device and serial number → device, built from one full
/// listing at the start of a run.
///
/// Pass-1 adds newly created devices to both tables. The serial table is
/// never updated from Pass-2 link changes.
#[derive(Debug, Default)]
pub struct DeviceIndex {
    by_uri: HashMap<String, Device>,
    by_serial: HashMap<String, Device>,
}

impl DeviceIndex {
    /// List every device and index it.
    ///
    /// Devices without a usable discovery URI are left out of the URI table
    /// with a warning; devices with an empty serial are left out of the
    /// serial table. When two devices share a serial the later one in
    /// listing order wins.
    ///
    /// # Errors
    ///
    /// Returns the listing error unchanged. No partial index is ever built.
    pub fn build<S: Store + ?Sized>(store: &S) -> Result<Self, StoreError> {
        let devices = store.list_devices()?;
        let mut index = Self::default();

        for device in devices {
            if !device.spec.serial_number.is_empty() {
                if let Some(previous) = index
                    .by_serial
                    .insert(device.spec.serial_number.clone(), device.clone())
                {
                    warn!(
                        serial = %device.spec.serial_number,
                        uid = %device.uid(),
                        shadowed = %previous.uid(),
                        "duplicate serial number in inventory"
                    );
                }
            }

            match device.uri() {
                Ok(uri) => {
                    let uri = uri.to_string();
                    index.by_uri.insert(uri, device);
                }
                Err(err) => {
                    warn!(uid = %device.uid(), error = %err, "device has no discovery uri, not indexed");
                }
            }
        }

        debug!(
            by_uri = index.by_uri.len(),
            by_serial = index.by_serial.len(),
            "device index built"
        );
        Ok(index)
    }

    #[must_use]
    pub fn by_uri(&self, uri: &str) -> Option<&Device> {
        self.by_uri.get(uri)
    }

    #[must_use]
    pub fn by_serial(&self, serial: &str) -> Option<&Device> {
        self.by_serial.get(serial)
    }

    /// Record a device created during this run in both tables.
    pub fn insert_created(&mut self, uri: &str, device: &Device) {
        if !device.spec.serial_number.is_empty() {
            self.by_serial
                .insert(device.spec.serial_number.clone(), device.clone());
        }
        self.by_uri.insert(uri.to_string(), device.clone());
    }

    /// Replace the URI-table entry after a successful update.
    pub fn refresh_uri(&mut self, uri: &str, device: &Device) {
        self.by_uri.insert(uri.to_string(), device.clone());
    }

    #[must_use]
    pub fn uri_count(&self) -> usize {
        self.by_uri.len()
    }

    #[must_use]
    pub fn serial_count(&self) -> usize {
        self.by_serial.len()
    }
}
