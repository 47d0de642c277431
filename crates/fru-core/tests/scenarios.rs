//! End-to-end reconciliation scenarios against the in-memory store.
//!
//! Covers:
//! - first run on an empty inventory, re-run, and short-circuit of a
//!   completed snapshot
//! - unresolved parent serials
//! - parent preservation across re-discovery
//! - per-item store failures and whole-run store failures
//! - rejected payloads and `null` descriptor fields
//! - children left unlinked when their parent only appears in a later run
//! - multi-level hierarchies converging over successive runs

use std::time::Duration;

use chrono::Utc;
use fru_core::ident::IdGenerator;
use fru_core::model::device::Device;
use fru_core::model::snapshot::{DiscoverySnapshot, SnapshotPhase};
use fru_core::reconcile::{ReconcileError, ReconcileOutcome, Reconciler, RunSummary};
use fru_core::store::Store;
use fru_core::store::deadline::DeadlineStore;
use fru_core::store::memory::MemoryStore;
use serde_json::{Value, json};

fn submit(store: &MemoryStore, uid: &str, raw: Value) {
    let snapshot = DiscoverySnapshot::new(uid, format!("collector-{uid}"), raw, Utc::now());
    store.create_snapshot(&snapshot).expect("submit snapshot");
}

fn reconcile(store: &MemoryStore, uid: &str) -> Result<ReconcileOutcome, ReconcileError> {
    let ids = IdGenerator::default();
    Reconciler::new(store, &ids).reconcile(uid)
}

fn completed(outcome: ReconcileOutcome) -> RunSummary {
    match outcome {
        ReconcileOutcome::Completed(summary) => summary,
        other => panic!("expected a completed run, got {other:?}"),
    }
}

fn device_by_uri(store: &MemoryStore, uri: &str) -> Device {
    store
        .list_devices()
        .expect("list devices")
        .into_iter()
        .find(|d| d.name() == uri)
        .unwrap_or_else(|| panic!("no device named {uri}"))
}

fn two_level_batch() -> Value {
    json!([
        { "deviceType": "Node", "serialNumber": "S1",
          "properties": { "redfish_uri": "/r1" } },
        { "deviceType": "DIMM", "serialNumber": "S2", "parentSerialNumber": "S1",
          "properties": { "redfish_uri": "/r2" } }
    ])
}

#[test]
fn first_run_creates_and_links() {
    let store = MemoryStore::new();
    submit(&store, "dis-a", two_level_batch());

    let summary = completed(reconcile(&store, "dis-a").expect("reconcile"));
    assert_eq!(summary.created, 2);
    assert_eq!(summary.links_updated, 1);

    let parent = device_by_uri(&store, "/r1");
    let child = device_by_uri(&store, "/r2");
    assert_eq!(child.spec.parent_id.as_deref(), Some(parent.uid()));
    assert_eq!(parent.status.children_device_ids, vec![child.uid().to_string()]);
    assert!(parent.uid().starts_with("dev-"));

    let snapshot = store.get_snapshot("dis-a").expect("snapshot");
    assert_eq!(snapshot.status.phase, SnapshotPhase::Completed);
    assert!(snapshot.status.ready);
    assert_eq!(
        snapshot.status.message,
        "Snapshot processed. 2 devices created/updated. 1 parent links updated."
    );
}

#[test]
fn rerun_of_same_batch_changes_nothing_but_timestamps() {
    let store = MemoryStore::new();
    submit(&store, "dis-a", two_level_batch());
    completed(reconcile(&store, "dis-a").expect("first run"));
    let before: Vec<Device> = store.list_devices().expect("list");

    store.reset_write_counts();
    submit(&store, "dis-b", two_level_batch());
    let summary = completed(reconcile(&store, "dis-b").expect("second run"));

    assert_eq!(summary.created, 0);
    assert_eq!(summary.updated, 2);
    assert_eq!(summary.links_updated, 0);
    assert_eq!(summary.links_unchanged, 1);
    assert_eq!(store.write_counts().device_creates, 0);
    assert_eq!(store.write_counts().device_updates, 2);

    let after: Vec<Device> = store.list_devices().expect("list");
    assert_eq!(before.len(), after.len());
    for (old, new) in before.iter().zip(&after) {
        assert_eq!(old.uid(), new.uid());
        assert_eq!(old.spec, new.spec);
        assert_eq!(old.metadata.created_at, new.metadata.created_at);
        assert!(new.metadata.updated_at >= old.metadata.updated_at);
    }
}

#[test]
fn completed_snapshot_short_circuits() {
    let store = MemoryStore::new();
    submit(&store, "dis-a", two_level_batch());
    completed(reconcile(&store, "dis-a").expect("first run"));
    let snapshot_before = store.get_snapshot("dis-a").expect("snapshot");

    store.reset_write_counts();
    store.fail_device_listing(true);
    let outcome = reconcile(&store, "dis-a").expect("short circuit");

    assert_eq!(outcome, ReconcileOutcome::AlreadyCompleted);
    assert_eq!(store.write_counts().device_updates, 0);
    assert_eq!(store.get_snapshot("dis-a").expect("snapshot"), snapshot_before);
}

#[test]
fn unknown_parent_serial_still_completes() {
    let store = MemoryStore::new();
    submit(
        &store,
        "dis-a",
        json!([{ "serialNumber": "S2", "parentSerialNumber": "S9",
                 "properties": { "redfish_uri": "/r2" } }]),
    );

    let summary = completed(reconcile(&store, "dis-a").expect("reconcile"));
    assert_eq!(summary.created, 1);
    assert_eq!(summary.links_unresolved, 1);
    assert_eq!(summary.links_updated, 0);
    assert_eq!(device_by_uri(&store, "/r2").spec.parent_id, None);
    assert!(store.get_snapshot("dis-a").expect("snapshot").is_completed());
}

#[test]
fn rediscovery_without_parent_serial_keeps_link() {
    let store = MemoryStore::new();
    submit(&store, "dis-a", two_level_batch());
    completed(reconcile(&store, "dis-a").expect("first run"));
    let parent_uid = device_by_uri(&store, "/r1").uid().to_string();

    submit(
        &store,
        "dis-b",
        json!([{ "deviceType": "DIMM", "serialNumber": "S2",
                 "properties": { "redfish_uri": "/r2" } }]),
    );
    let summary = completed(reconcile(&store, "dis-b").expect("second run"));
    assert_eq!(summary.updated, 1);

    let child = device_by_uri(&store, "/r2");
    assert_eq!(child.spec.parent_id.as_deref(), Some(parent_uid.as_str()));
    assert_eq!(child.spec.parent_serial_number, "");
}

#[test]
fn descriptors_without_uri_are_skipped() {
    let store = MemoryStore::new();
    submit(
        &store,
        "dis-a",
        json!([
            { "serialNumber": "S1", "properties": {} },
            { "serialNumber": "S2", "properties": { "redfish_uri": "" } },
            { "serialNumber": "S3", "properties": { "redfish_uri": "/r3" } }
        ]),
    );

    let summary = completed(reconcile(&store, "dis-a").expect("reconcile"));
    assert_eq!(summary.skipped, 2);
    assert_eq!(summary.processed(), 1);
    assert_eq!(store.device_count(), 1);
    assert_eq!(
        store.get_snapshot("dis-a").expect("snapshot").status.message,
        "Snapshot processed. 1 devices created/updated. 0 parent links updated."
    );
}

#[test]
fn null_descriptor_fields_are_treated_as_absent() {
    let store = MemoryStore::new();
    submit(
        &store,
        "dis-a",
        json!([
            { "deviceType": "Node", "manufacturer": null, "partNumber": null,
              "serialNumber": "S1", "parentSerialNumber": null,
              "properties": { "redfish_uri": "/r1" } },
            { "deviceType": "DIMM", "serialNumber": "S2", "parentSerialNumber": "S1",
              "properties": { "redfish_uri": "/r2" } },
            { "serialNumber": "S3", "properties": null }
        ]),
    );

    let summary = completed(reconcile(&store, "dis-a").expect("reconcile"));
    assert_eq!(summary.created, 2);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.links_updated, 1);

    let parent = device_by_uri(&store, "/r1");
    assert_eq!(parent.spec.manufacturer, "");
    assert_eq!(parent.spec.parent_serial_number, "");
    let child = device_by_uri(&store, "/r2");
    assert_eq!(child.spec.parent_id.as_deref(), Some(parent.uid()));
}

#[test]
fn untouched_child_is_not_linked_when_parent_arrives_later() {
    let store = MemoryStore::new();
    submit(
        &store,
        "dis-a",
        json!([{ "serialNumber": "S2", "parentSerialNumber": "S1",
                 "properties": { "redfish_uri": "/r2" } }]),
    );
    let first = completed(reconcile(&store, "dis-a").expect("first run"));
    assert_eq!(first.links_unresolved, 1);

    submit(
        &store,
        "dis-b",
        json!([{ "serialNumber": "S1", "properties": { "redfish_uri": "/r1" } }]),
    );
    let second = completed(reconcile(&store, "dis-b").expect("second run"));
    assert_eq!(second.created, 1);
    assert_eq!(second.links_updated, 0);

    assert_eq!(device_by_uri(&store, "/r2").spec.parent_id, None);
    assert!(device_by_uri(&store, "/r1").status.children_device_ids.is_empty());
}

#[test]
fn one_failed_create_does_not_stop_the_batch() {
    let store = MemoryStore::new();
    store.fail_create_named("/r1");
    submit(&store, "dis-a", two_level_batch());

    let summary = completed(reconcile(&store, "dis-a").expect("reconcile"));
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.created, 1);
    assert_eq!(summary.links_unresolved, 1);
    assert_eq!(device_by_uri(&store, "/r2").spec.parent_id, None);

    // the parent shows up on the next snapshot and the link converges
    store.clear_faults();
    submit(&store, "dis-b", two_level_batch());
    let summary = completed(reconcile(&store, "dis-b").expect("retry"));
    assert_eq!(summary.created, 1);
    assert_eq!(summary.links_updated, 1);
}

#[test]
fn listing_failure_aborts_and_leaves_snapshot_retryable() {
    let store = MemoryStore::new();
    submit(&store, "dis-a", two_level_batch());
    store.fail_device_listing(true);

    let err = reconcile(&store, "dis-a").expect_err("listing fails");
    assert!(matches!(err, ReconcileError::StoreUnavailable(_)));
    assert_eq!(store.device_count(), 0);
    assert_eq!(
        store.get_snapshot("dis-a").expect("snapshot").status.phase,
        SnapshotPhase::Processing
    );

    store.clear_faults();
    completed(reconcile(&store, "dis-a").expect("retry"));
    assert_eq!(store.device_count(), 2);
}

#[test]
fn snapshot_status_write_failure_propagates() {
    let store = MemoryStore::new();
    submit(&store, "dis-a", two_level_batch());
    store.fail_snapshot_writes(true);

    let err = reconcile(&store, "dis-a").expect_err("status write fails");
    assert!(matches!(err, ReconcileError::StoreUnavailable(_)));
    assert_eq!(store.device_count(), 0);
}

#[test]
fn malformed_payload_is_rejected_without_device_writes() {
    let store = MemoryStore::new();
    submit(&store, "dis-a", json!({ "devices": [] }));

    let outcome = reconcile(&store, "dis-a").expect("rejection is not an error");
    assert!(outcome.is_failure());

    let snapshot = store.get_snapshot("dis-a").expect("snapshot");
    assert_eq!(snapshot.status.phase, SnapshotPhase::Error);
    assert!(!snapshot.status.ready);
    assert!(snapshot.status.message.starts_with("Failed to parse rawData: "));
    assert_eq!(
        outcome,
        ReconcileOutcome::Rejected {
            message: snapshot.status.message.clone()
        }
    );
    assert_eq!(store.write_counts().device_creates, 0);

    // an errored snapshot is reprocessed, and rejected again
    assert!(reconcile(&store, "dis-a").expect("rerun").is_failure());
}

#[test]
fn unknown_snapshot_is_not_found() {
    let store = MemoryStore::new();
    let err = reconcile(&store, "dis-missing").expect_err("missing");
    assert!(matches!(err, ReconcileError::SnapshotNotFound { uid } if uid == "dis-missing"));
}

#[test]
fn three_level_hierarchy_links_in_one_run() {
    let store = MemoryStore::new();
    submit(
        &store,
        "dis-a",
        json!([
            { "serialNumber": "S3", "parentSerialNumber": "S2",
              "properties": { "redfish_uri": "/rack/1/node/1/cpu/1" } },
            { "serialNumber": "S2", "parentSerialNumber": "S1",
              "properties": { "redfish_uri": "/rack/1/node/1" } },
            { "serialNumber": "S1", "properties": { "redfish_uri": "/rack/1" } }
        ]),
    );

    let summary = completed(reconcile(&store, "dis-a").expect("reconcile"));
    assert_eq!(summary.created, 3);
    assert_eq!(summary.links_updated, 2);

    let rack = device_by_uri(&store, "/rack/1");
    let node = device_by_uri(&store, "/rack/1/node/1");
    let cpu = device_by_uri(&store, "/rack/1/node/1/cpu/1");
    assert_eq!(node.spec.parent_id.as_deref(), Some(rack.uid()));
    assert_eq!(cpu.spec.parent_id.as_deref(), Some(node.uid()));
}

#[test]
fn moved_device_is_relinked() {
    let store = MemoryStore::new();
    submit(
        &store,
        "dis-a",
        json!([
            { "serialNumber": "S1", "properties": { "redfish_uri": "/r1" } },
            { "serialNumber": "S5", "properties": { "redfish_uri": "/r5" } },
            { "serialNumber": "S2", "parentSerialNumber": "S1",
              "properties": { "redfish_uri": "/r2" } }
        ]),
    );
    completed(reconcile(&store, "dis-a").expect("first run"));

    submit(
        &store,
        "dis-b",
        json!([{ "serialNumber": "S2", "parentSerialNumber": "S5",
                 "properties": { "redfish_uri": "/r2" } }]),
    );
    let summary = completed(reconcile(&store, "dis-b").expect("second run"));
    assert_eq!(summary.links_updated, 1);

    let new_parent = device_by_uri(&store, "/r5");
    assert_eq!(
        device_by_uri(&store, "/r2").spec.parent_id.as_deref(),
        Some(new_parent.uid())
    );
    assert!(device_by_uri(&store, "/r1").status.children_device_ids.is_empty());
}

#[test]
fn expired_deadline_behaves_like_unavailable_store() {
    let store = MemoryStore::new();
    submit(&store, "dis-a", two_level_batch());

    let ids = IdGenerator::default();
    let limited = DeadlineStore::new(&store, Duration::ZERO);
    let err = Reconciler::new(&limited, &ids)
        .reconcile("dis-a")
        .expect_err("deadline passed");
    assert!(matches!(err, ReconcileError::StoreUnavailable(_)));

    let outcome = reconcile(&store, "dis-a").expect("rerun without deadline");
    assert_eq!(completed(outcome).created, 2);
}

#[test]
fn pending_runs_skip_completed_snapshots() {
    let store = MemoryStore::new();
    submit(&store, "dis-a", two_level_batch());
    completed(reconcile(&store, "dis-a").expect("first run"));
    submit(&store, "dis-b", json!("not a list"));
    submit(&store, "dis-c", two_level_batch());

    let ids = IdGenerator::default();
    let runs = Reconciler::new(&store, &ids)
        .reconcile_pending()
        .expect("pending runs");

    let uids: Vec<&str> = runs.iter().map(|run| run.uid.as_str()).collect();
    assert_eq!(uids, vec!["dis-b", "dis-c"]);
    assert!(matches!(&runs[0].result, Ok(outcome) if outcome.is_failure()));
    assert!(matches!(&runs[1].result, Ok(ReconcileOutcome::Completed(_))));
}
