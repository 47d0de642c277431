//! Wall-clock deadline for a whole reconciliation run.
//!
//! The engine has no cancellation contract of its own. Wrapping the store in
//! a [`DeadlineStore`] makes every call after the deadline fail with
//! [`StoreError::DeadlineExceeded`], which the engine treats exactly like an
//! unavailable store: items already written stay valid and the snapshot,
//! not being `Completed`, is picked up again on the next run.

use std::time::{Duration, Instant};

use super::{Store, StoreError};
use crate::model::device::Device;
use crate::model::snapshot::DiscoverySnapshot;

pub struct DeadlineStore<'s, S: Store + ?Sized> {
    inner: &'s S,
    started: Instant,
    deadline: Instant,
}

impl<'s, S: Store + ?Sized> DeadlineStore<'s, S> {
    /// Allow calls through `inner` for `budget` from now.
    #[must_use]
    pub fn new(inner: &'s S, budget: Duration) -> Self {
        let started = Instant::now();
        Self {
            inner,
            started,
            deadline: started + budget,
        }
    }

    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    fn check(&self) -> Result<(), StoreError> {
        let now = Instant::now();
        if now >= self.deadline {
            return Err(StoreError::DeadlineExceeded {
                elapsed: now.duration_since(self.started),
            });
        }
        Ok(())
    }
}

impl<S: Store + ?Sized> Store for DeadlineStore<'_, S> {
    fn get_device(&self, uid: &str) -> Result<Device, StoreError> {
        self.check()?;
        self.inner.get_device(uid)
    }

    fn list_devices(&self) -> Result<Vec<Device>, StoreError> {
        self.check()?;
        self.inner.list_devices()
    }

    fn create_device(&self, device: &Device) -> Result<(), StoreError> {
        self.check()?;
        self.inner.create_device(device)
    }

    fn update_device(&self, device: &Device) -> Result<(), StoreError> {
        self.check()?;
        self.inner.update_device(device)
    }

    fn get_snapshot(&self, uid: &str) -> Result<DiscoverySnapshot, StoreError> {
        self.check()?;
        self.inner.get_snapshot(uid)
    }

    fn list_snapshots(&self) -> Result<Vec<DiscoverySnapshot>, StoreError> {
        self.check()?;
        self.inner.list_snapshots()
    }

    fn create_snapshot(&self, snapshot: &DiscoverySnapshot) -> Result<(), StoreError> {
        self.check()?;
        self.inner.create_snapshot(snapshot)
    }

    fn update_snapshot(&self, snapshot: &DiscoverySnapshot) -> Result<(), StoreError> {
        self.check()?;
        self.inner.update_snapshot(snapshot)
    }
}
