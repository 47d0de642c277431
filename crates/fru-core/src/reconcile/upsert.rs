//! Pass-1: create or update one device per discovered URI.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use super::ItemError;
use super::index::DeviceIndex;
use crate::error::ErrorCode;
use crate::ident::IdGenerator;
use crate::model::ResourceKind;
use crate::model::device::{Device, DeviceDescriptor, UriError};
use crate::store::Store;

/// Result of upserting a single descriptor.
#[derive(Debug)]
pub enum UpsertOutcome {
    Created { uri: String, uid: String },
    Updated { uri: String, uid: String },
    /// The descriptor had no usable discovery URI. `index` is its position
    /// in the payload.
    Skipped { index: usize, reason: UriError },
    Failed { uri: String, error: ItemError },
}

impl UpsertOutcome {
    /// `true` for outcomes that count as processed devices.
    #[must_use]
    pub const fn is_processed(&self) -> bool {
        matches!(self, Self::Created { .. } | Self::Updated { .. })
    }
}

/// Everything Pass-1 hands to Pass-2.
#[derive(Debug, Default)]
pub struct UpsertReport {
    /// One outcome per descriptor, in payload order.
    pub outcomes: Vec<UpsertOutcome>,
    /// URI → device as last written during this run.
    pub touched: BTreeMap<String, Device>,
}

/// Upsert every descriptor in payload order.
///
/// Existing devices keep their resolved parent; every other spec field is
/// overwritten from the descriptor. Newly created devices are added to
/// `index` so later descriptors in the same batch, and Pass-2, can find
/// them. A store failure on one item is logged and recorded; the batch
/// continues.
pub fn upsert_all<S: Store + ?Sized>(
    store: &S,
    ids: &IdGenerator,
    index: &mut DeviceIndex,
    descriptors: Vec<DeviceDescriptor>,
    now: DateTime<Utc>,
) -> UpsertReport {
    let mut report = UpsertReport::default();

    for (position, descriptor) in descriptors.into_iter().enumerate() {
        let uri = match descriptor.uri() {
            Ok(uri) => uri.to_string(),
            Err(reason) => {
                warn!(
                    code = %ErrorCode::UnresolvedReference,
                    index = position,
                    error = %reason,
                    "skipping descriptor without discovery uri"
                );
                report.outcomes.push(UpsertOutcome::Skipped {
                    index: position,
                    reason,
                });
                continue;
            }
        };

        let outcome = match index.by_uri(&uri).cloned() {
            None => create(store, ids, index, &uri, descriptor, now, &mut report.touched),
            Some(existing) => update(store, index, &uri, existing, descriptor, now, &mut report.touched),
        };
        report.outcomes.push(outcome);
    }

    report
}

fn create<S: Store + ?Sized>(
    store: &S,
    ids: &IdGenerator,
    index: &mut DeviceIndex,
    uri: &str,
    descriptor: DeviceDescriptor,
    now: DateTime<Utc>,
    touched: &mut BTreeMap<String, Device>,
) -> UpsertOutcome {
    let uid = match ids.generate(ResourceKind::Device) {
        Ok(uid) => uid,
        Err(err) => {
            error!(uri, error = %err, "cannot mint device identity");
            return UpsertOutcome::Failed {
                uri: uri.to_string(),
                error: err.into(),
            };
        }
    };

    let device = Device::new(uid, uri, descriptor.into_spec(None), now);
    if let Err(err) = store.create_device(&device) {
        error!(uri, uid = %device.uid(), error = %err, "failed to create device");
        return UpsertOutcome::Failed {
            uri: uri.to_string(),
            error: err.into(),
        };
    }

    info!(uri, uid = %device.uid(), "created device");
    index.insert_created(uri, &device);
    let uid = device.uid().to_string();
    touched.insert(uri.to_string(), device);
    UpsertOutcome::Created {
        uri: uri.to_string(),
        uid,
    }
}

fn update<S: Store + ?Sized>(
    store: &S,
    index: &mut DeviceIndex,
    uri: &str,
    mut device: Device,
    descriptor: DeviceDescriptor,
    now: DateTime<Utc>,
    touched: &mut BTreeMap<String, Device>,
) -> UpsertOutcome {
    let parent_id = device.spec.parent_id.take();
    device.spec = descriptor.into_spec(parent_id);
    device.metadata.touch(now);

    if let Err(err) = store.update_device(&device) {
        error!(uri, uid = %device.uid(), error = %err, "failed to update device");
        return UpsertOutcome::Failed {
            uri: uri.to_string(),
            error: err.into(),
        };
    }

    info!(uri, uid = %device.uid(), "updated device");
    index.refresh_uri(uri, &device);
    let uid = device.uid().to_string();
    touched.insert(uri.to_string(), device);
    UpsertOutcome::Updated {
        uri: uri.to_string(),
        uid,
    }
}
