//! Snapshot phase transitions and the status messages that go with them.

use chrono::Utc;

use super::ReconcileError;
use crate::model::snapshot::{DiscoverySnapshot, SnapshotPhase};
use crate::store::Store;

pub const PROCESSING_MESSAGE: &str = "Reconciler has started processing the snapshot.";

/// Diagnostic recorded on a snapshot whose payload failed to decode.
#[must_use]
pub fn decode_failure_message(err: &impl std::fmt::Display) -> String {
    format!("Failed to parse rawData: {err}")
}

/// Move `snapshot` to `phase`, set its message and readiness, and persist it.
///
/// # Errors
///
/// Returns [`ReconcileError::InvalidTransition`] for a transition the phase
/// machine forbids, or [`ReconcileError::StoreUnavailable`] if the write
/// fails.
pub fn transition<S: Store + ?Sized>(
    store: &S,
    snapshot: &mut DiscoverySnapshot,
    phase: SnapshotPhase,
    message: impl Into<String>,
) -> Result<(), ReconcileError> {
    snapshot.status.phase.can_transition_to(phase)?;

    snapshot.status.phase = phase;
    snapshot.status.message = message.into();
    snapshot.status.ready = phase == SnapshotPhase::Completed;
    snapshot.metadata.touch(Utc::now());

    store
        .update_snapshot(snapshot)
        .map_err(ReconcileError::StoreUnavailable)
}
