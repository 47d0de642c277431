//! `fru snapshots`: list submitted snapshots with their phase and message.

use std::io::Write;
use std::path::Path;

use clap::Args;
use fru_core::config::FruConfig;
use fru_core::model::snapshot::{DiscoverySnapshot, SnapshotPhase};
use fru_core::store::Store;

use crate::cmd::open_existing_store;
use crate::output::{OutputMode, pretty_kv, pretty_rule, render_mode};

#[derive(Args, Debug)]
pub struct SnapshotsArgs {
    /// Only show snapshots in this phase (Pending, Processing, Completed, Error).
    #[arg(long)]
    pub phase: Option<SnapshotPhase>,
}

fn write_text(snapshots: &[DiscoverySnapshot], w: &mut dyn Write) -> std::io::Result<()> {
    for snapshot in snapshots {
        writeln!(
            w,
            "{}\t{}\t{}\t{}",
            snapshot.uid(),
            snapshot.name(),
            snapshot.status.phase,
            snapshot.status.message
        )?;
    }
    Ok(())
}

fn write_pretty(snapshots: &[DiscoverySnapshot], w: &mut dyn Write) -> std::io::Result<()> {
    if snapshots.is_empty() {
        return writeln!(w, "No snapshots.");
    }
    for snapshot in snapshots {
        pretty_kv(w, "snapshot", snapshot.uid())?;
        pretty_kv(w, "name", snapshot.name())?;
        pretty_kv(w, "phase", snapshot.status.phase.as_str())?;
        pretty_kv(w, "submitted", snapshot.metadata.created_at.to_rfc3339())?;
        if !snapshot.status.message.is_empty() {
            pretty_kv(w, "message", &snapshot.status.message)?;
        }
        pretty_rule(w)?;
    }
    Ok(())
}

/// Execute `fru snapshots`.
///
/// # Errors
///
/// Returns an error if the inventory cannot be opened or listed.
pub fn run_snapshots(
    args: &SnapshotsArgs,
    config: &FruConfig,
    output: OutputMode,
    project_root: &Path,
) -> anyhow::Result<()> {
    let store = open_existing_store(config, project_root, output)?;
    let mut snapshots = store.list_snapshots()?;
    if let Some(phase) = args.phase {
        snapshots.retain(|s| s.status.phase == phase);
    }

    render_mode(
        output,
        &snapshots,
        |s, w| write_text(s, w),
        |s, w| write_pretty(s, w),
    )
}

#[cfg(test)]
mod tests {
    use super::write_text;
    use chrono::Utc;
    use fru_core::model::snapshot::{DiscoverySnapshot, SnapshotPhase};
    use serde_json::json;

    #[test]
    fn text_rows_show_phase_and_message() {
        let mut done = DiscoverySnapshot::new("dis-000000000001", "rack-1", json!([]), Utc::now());
        done.status.phase = SnapshotPhase::Completed;
        done.status.message = "Snapshot processed. 0 devices created/updated. 0 parent links updated.".into();
        let pending = DiscoverySnapshot::new("dis-000000000002", "rack-2", json!([]), Utc::now());

        let mut buf = Vec::new();
        write_text(&[done, pending], &mut buf).expect("write");
        let text = String::from_utf8(buf).expect("utf8");
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(
            lines[0],
            "dis-000000000001\track-1\tCompleted\tSnapshot processed. 0 devices created/updated. 0 parent links updated."
        );
        assert_eq!(lines[1], "dis-000000000002\track-2\tPending\t");
    }
}
