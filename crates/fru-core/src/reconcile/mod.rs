//! Discovery snapshot reconciliation.
//!
//! A run takes one snapshot through `Processing` to `Completed` (or `Error`
//! when its payload does not decode):
//!
//! 1. [`decode::decode_payload`] turns the raw payload into descriptors
//! 2. [`index::DeviceIndex::build`] indexes the current inventory by URI and serial
//! 3. [`upsert::upsert_all`] creates or updates one device per URI
//! 4. [`link::link_parents`] resolves parent serials into parent identities
//!
//! There is no isolation across a run. Writes are per-record, and a run cut
//! short leaves the snapshot un-`Completed` so the next run redoes it from
//! scratch. Runs against the same inventory must be serialized by the caller.

pub mod decode;
pub mod index;
pub mod link;
pub mod status;
pub mod summary;
pub mod upsert;

pub use link::LinkOutcome;
pub use summary::RunSummary;
pub use upsert::UpsertOutcome;

use chrono::Utc;
use tracing::{info, info_span, warn};

use crate::error::ErrorCode;
use crate::ident::{IdError, IdGenerator};
use crate::model::snapshot::{InvalidTransition, SnapshotPhase};
use crate::store::{Store, StoreError};
use index::DeviceIndex;

/// Failure of a single device write inside a run. Never aborts the run.
#[derive(Debug, thiserror::Error)]
pub enum ItemError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Identity(#[from] IdError),
}

impl ItemError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Store(err) => err.code(),
            Self::Identity(err) => err.code(),
        }
    }
}

/// Errors that abort a reconciliation run.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("discovery snapshot '{uid}' not found")]
    SnapshotNotFound { uid: String },

    /// The store could not list devices or persist snapshot status.
    #[error("device store unavailable: {0}")]
    StoreUnavailable(#[source] StoreError),

    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),

    /// Only produced by [`ReconcileOutcome::into_strict`]; a run itself
    /// reports a bad payload as [`ReconcileOutcome::Rejected`].
    #[error("malformed payload in snapshot '{uid}': {message}")]
    MalformedPayload { uid: String, message: String },
}

impl ReconcileError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::SnapshotNotFound { .. } => ErrorCode::SnapshotNotFound,
            Self::StoreUnavailable(_) => ErrorCode::StoreUnavailable,
            Self::InvalidTransition(_) => ErrorCode::InvalidStateTransition,
            Self::MalformedPayload { .. } => ErrorCode::MalformedPayload,
        }
    }
}

/// What a successful call to [`Reconciler::reconcile`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The snapshot was already `Completed`; nothing was read or written.
    AlreadyCompleted,
    Completed(RunSummary),
    /// The payload did not decode. The snapshot is now in phase `Error`
    /// with `message` as its status message.
    Rejected { message: String },
}

impl ReconcileOutcome {
    /// `true` when the snapshot ended in phase `Error`.
    ///
    /// A rejected payload is still a successful call; this is the signal
    /// callers use to tell it apart from a completed run.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }

    /// Turn a rejected payload into an error, for callers that treat it as one.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::MalformedPayload`] for
    /// [`ReconcileOutcome::Rejected`].
    pub fn into_strict(self, uid: &str) -> Result<Option<RunSummary>, ReconcileError> {
        match self {
            Self::AlreadyCompleted => Ok(None),
            Self::Completed(summary) => Ok(Some(summary)),
            Self::Rejected { message } => Err(ReconcileError::MalformedPayload {
                uid: uid.to_string(),
                message,
            }),
        }
    }
}

/// Result of one run inside [`Reconciler::reconcile_pending`].
#[derive(Debug)]
pub struct PendingRun {
    pub uid: String,
    pub result: Result<ReconcileOutcome, ReconcileError>,
}

/// Reconciles discovery snapshots into the device inventory of `store`.
pub struct Reconciler<'a, S: Store + ?Sized> {
    store: &'a S,
    ids: &'a IdGenerator,
}

impl<'a, S: Store + ?Sized> Reconciler<'a, S> {
    #[must_use]
    pub const fn new(store: &'a S, ids: &'a IdGenerator) -> Self {
        Self { store, ids }
    }

    /// Reconcile the snapshot with identity `uid`.
    ///
    /// # Errors
    ///
    /// - [`ReconcileError::SnapshotNotFound`] if no such snapshot exists
    /// - [`ReconcileError::StoreUnavailable`] if the device listing or a
    ///   snapshot status write fails; the snapshot stays un-`Completed`
    ///
    /// Individual device write failures are not errors: they are logged and
    /// counted in the returned [`RunSummary`].
    pub fn reconcile(&self, uid: &str) -> Result<ReconcileOutcome, ReconcileError> {
        let span = info_span!("reconcile", snapshot = %uid);
        let _entered = span.enter();

        let mut snapshot = self.store.get_snapshot(uid).map_err(|err| {
            if err.is_not_found() {
                ReconcileError::SnapshotNotFound {
                    uid: uid.to_string(),
                }
            } else {
                ReconcileError::StoreUnavailable(err)
            }
        })?;

        if snapshot.is_completed() {
            info!("snapshot already completed, skipping");
            return Ok(ReconcileOutcome::AlreadyCompleted);
        }

        info!(name = %snapshot.name(), "reconciling snapshot");
        status::transition(
            self.store,
            &mut snapshot,
            SnapshotPhase::Processing,
            status::PROCESSING_MESSAGE,
        )?;

        let descriptors = match decode::decode_payload(&snapshot.spec.raw_data) {
            Ok(descriptors) => descriptors,
            Err(err) => {
                let message = status::decode_failure_message(&err);
                warn!(error = %err, "snapshot payload rejected");
                status::transition(self.store, &mut snapshot, SnapshotPhase::Error, &*message)?;
                return Ok(ReconcileOutcome::Rejected { message });
            }
        };

        let mut index = DeviceIndex::build(self.store).map_err(ReconcileError::StoreUnavailable)?;
        info!(
            descriptors = descriptors.len(),
            by_uri = index.uri_count(),
            by_serial = index.serial_count(),
            "device index loaded"
        );

        let report = upsert::upsert_all(self.store, self.ids, &mut index, descriptors, Utc::now());
        let links = link::link_parents(self.store, &index, report.touched, Utc::now());
        let summary = RunSummary::from_outcomes(&report.outcomes, &links);

        status::transition(
            self.store,
            &mut snapshot,
            SnapshotPhase::Completed,
            summary.completion_message(),
        )?;
        info!(
            created = summary.created,
            updated = summary.updated,
            skipped = summary.skipped,
            failed = summary.failed,
            links_updated = summary.links_updated,
            links_unresolved = summary.links_unresolved,
            "snapshot reconciled"
        );

        Ok(ReconcileOutcome::Completed(summary))
    }

    /// Reconcile every snapshot not yet `Completed`, oldest first, one at a
    /// time. A failed run does not stop the ones after it.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::StoreUnavailable`] if snapshots cannot be
    /// listed.
    pub fn reconcile_pending(&self) -> Result<Vec<PendingRun>, ReconcileError> {
        let pending: Vec<String> = self
            .store
            .list_snapshots()
            .map_err(ReconcileError::StoreUnavailable)?
            .into_iter()
            .filter(|snapshot| !snapshot.is_completed())
            .map(|snapshot| snapshot.metadata.uid)
            .collect();

        Ok(pending
            .into_iter()
            .map(|uid| {
                let result = self.reconcile(&uid);
                PendingRun { uid, result }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::{ItemError, ReconcileError, ReconcileOutcome, RunSummary};
    use crate::error::ErrorCode;
    use crate::ident::IdError;
    use crate::model::ResourceKind;

    #[test]
    fn only_rejected_is_a_failure() {
        assert!(!ReconcileOutcome::AlreadyCompleted.is_failure());
        assert!(!ReconcileOutcome::Completed(RunSummary::default()).is_failure());
        assert!(
            ReconcileOutcome::Rejected {
                message: "Failed to parse rawData: x".into()
            }
            .is_failure()
        );
    }

    #[test]
    fn strict_mode_turns_rejection_into_error() {
        let summary = RunSummary {
            created: 2,
            ..RunSummary::default()
        };
        assert_eq!(
            ReconcileOutcome::Completed(summary).into_strict("dis-1").expect("ok"),
            Some(summary)
        );
        assert_eq!(
            ReconcileOutcome::AlreadyCompleted.into_strict("dis-1").expect("ok"),
            None
        );

        let err = ReconcileOutcome::Rejected {
            message: "bad".into(),
        }
        .into_strict("dis-1")
        .expect_err("rejected");
        assert_eq!(err.code(), ErrorCode::MalformedPayload);
        assert!(err.to_string().contains("dis-1"));
    }

    #[test]
    fn item_error_codes_follow_source() {
        let err = ItemError::from(IdError::UnknownKind(ResourceKind::Device));
        assert_eq!(err.code(), ErrorCode::UnknownResourceKind);

        let err = ReconcileError::SnapshotNotFound { uid: "dis-x".into() };
        assert_eq!(err.code(), ErrorCode::SnapshotNotFound);
    }
}
