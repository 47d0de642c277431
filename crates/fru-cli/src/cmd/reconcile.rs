//! `fru reconcile`: fold submitted snapshots into the device inventory.
//!
//! Runs hold the project's reconcile lock for their whole duration, so two
//! `fru` processes never interleave writes to the same inventory. With
//! `[reconcile] deadline_secs` set, the store is wrapped in a deadline and
//! a run that overruns fails as store-unavailable.

use std::io::Write;
use std::path::Path;

use clap::Args;
use fru_core::config::{FruConfig, lock_path};
use fru_core::error::ErrorCode;
use fru_core::ident::IdGenerator;
use fru_core::lock::ReconcileLock;
use fru_core::reconcile::{PendingRun, ReconcileError, ReconcileOutcome, Reconciler, RunSummary};
use fru_core::store::Store;
use fru_core::store::deadline::DeadlineStore;
use serde::Serialize;
use tracing::warn;

use crate::cmd::open_existing_store;
use crate::output::{CliError, OutputMode, pretty_kv, pretty_rule, render_error, render_mode};

#[derive(Args, Debug)]
pub struct ReconcileArgs {
    /// Snapshot identity to reconcile.
    #[arg(required_unless_present = "pending", conflicts_with = "pending")]
    pub uid: Option<String>,

    /// Reconcile every snapshot that is not yet completed, oldest first.
    #[arg(long)]
    pub pending: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    AlreadyCompleted,
    Rejected,
    Failed,
}

impl RunStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::AlreadyCompleted => "already_completed",
            Self::Rejected => "rejected",
            Self::Failed => "failed",
        }
    }
}

/// Per-snapshot report line.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub snapshot: String,
    pub outcome: RunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<RunSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<&'static str>,
}

impl RunReport {
    fn from_result(snapshot: &str, result: &Result<ReconcileOutcome, ReconcileError>) -> Self {
        let (outcome, summary, message, error_code) = match result {
            Ok(ReconcileOutcome::AlreadyCompleted) => {
                (RunStatus::AlreadyCompleted, None, None, None)
            }
            Ok(ReconcileOutcome::Completed(summary)) => (
                RunStatus::Completed,
                Some(*summary),
                Some(summary.completion_message()),
                None,
            ),
            Ok(ReconcileOutcome::Rejected { message }) => (
                RunStatus::Rejected,
                None,
                Some(message.clone()),
                Some(ErrorCode::MalformedPayload.code()),
            ),
            Err(err) => (
                RunStatus::Failed,
                None,
                Some(err.to_string()),
                Some(err.code().code()),
            ),
        };
        Self {
            snapshot: snapshot.to_string(),
            outcome,
            summary,
            message,
            error_code,
        }
    }

    const fn is_failure(&self) -> bool {
        matches!(self.outcome, RunStatus::Rejected | RunStatus::Failed)
    }
}

fn write_text(reports: &[RunReport], w: &mut dyn Write) -> std::io::Result<()> {
    for report in reports {
        writeln!(
            w,
            "{}\t{}\t{}",
            report.snapshot,
            report.outcome.as_str(),
            report.message.as_deref().unwrap_or("")
        )?;
    }
    Ok(())
}

fn write_pretty(reports: &[RunReport], w: &mut dyn Write) -> std::io::Result<()> {
    if reports.is_empty() {
        return writeln!(w, "No snapshots to reconcile.");
    }
    for report in reports {
        pretty_kv(w, "snapshot", &report.snapshot)?;
        pretty_kv(w, "outcome", report.outcome.as_str())?;
        if let Some(summary) = &report.summary {
            pretty_kv(
                w,
                "devices",
                format!(
                    "{} created, {} updated, {} skipped, {} failed",
                    summary.created, summary.updated, summary.skipped, summary.failed
                ),
            )?;
            pretty_kv(
                w,
                "links",
                format!(
                    "{} updated, {} unchanged, {} unresolved, {} failed",
                    summary.links_updated,
                    summary.links_unchanged,
                    summary.links_unresolved,
                    summary.links_failed
                ),
            )?;
        }
        if let Some(message) = &report.message {
            pretty_kv(w, "message", message)?;
        }
        pretty_rule(w)?;
    }
    Ok(())
}

fn run_all<S: Store + ?Sized>(
    store: &S,
    ids: &IdGenerator,
    args: &ReconcileArgs,
) -> Result<Vec<RunReport>, ReconcileError> {
    let reconciler = Reconciler::new(store, ids);
    let runs = match &args.uid {
        Some(uid) => vec![PendingRun {
            uid: uid.clone(),
            result: reconciler.reconcile(uid),
        }],
        None => reconciler.reconcile_pending()?,
    };

    Ok(runs
        .iter()
        .map(|run| RunReport::from_result(&run.uid, &run.result))
        .collect())
}

/// Execute `fru reconcile <uid>` or `fru reconcile --pending`.
///
/// A rejected payload or a failed run makes the command fail after every
/// report has been printed.
///
/// # Errors
///
/// Returns an error if the lock cannot be taken, the store cannot be opened,
/// or any snapshot was rejected or failed.
pub fn run_reconcile(
    args: &ReconcileArgs,
    config: &FruConfig,
    output: OutputMode,
    project_root: &Path,
) -> anyhow::Result<()> {
    let store = open_existing_store(config, project_root, output)?;

    let _lock = match ReconcileLock::acquire(&lock_path(project_root), config.reconcile.lock_timeout()) {
        Ok(lock) => lock,
        Err(err) => {
            render_error(output, &CliError::from_code(err.code(), err.to_string()))?;
            return Err(err.into());
        }
    };

    let ids = IdGenerator::new(config.identity.prefixes.clone());
    let result = match config.reconcile.deadline() {
        Some(budget) => run_all(&DeadlineStore::new(&store, budget), &ids, args),
        None => run_all(&store, &ids, args),
    };

    let reports = match result {
        Ok(reports) => reports,
        Err(err) => {
            render_error(output, &CliError::from_code(err.code(), err.to_string()))?;
            return Err(err.into());
        }
    };

    render_mode(
        output,
        &reports,
        |r, w| write_text(r, w),
        |r, w| write_pretty(r, w),
    )?;

    let failures = reports.iter().filter(|r| r.is_failure()).count();
    if failures > 0 {
        warn!(failures, "some snapshots did not complete");
        anyhow::bail!("{failures} snapshot(s) rejected or failed");
    }
    Ok(())
}
