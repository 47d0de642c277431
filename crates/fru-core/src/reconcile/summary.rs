use serde::Serialize;

use super::link::LinkOutcome;
use super::upsert::UpsertOutcome;

/// Counters for one completed reconciliation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
    pub links_updated: usize,
    pub links_unchanged: usize,
    pub links_unresolved: usize,
    pub links_failed: usize,
}

impl RunSummary {
    #[must_use]
    pub fn from_outcomes(upserts: &[UpsertOutcome], links: &[LinkOutcome]) -> Self {
        let mut summary = Self::default();
        for outcome in upserts {
            match outcome {
                UpsertOutcome::Created { .. } => summary.created += 1,
                UpsertOutcome::Updated { .. } => summary.updated += 1,
                UpsertOutcome::Skipped { .. } => summary.skipped += 1,
                UpsertOutcome::Failed { .. } => summary.failed += 1,
            }
        }
        for outcome in links {
            match outcome {
                LinkOutcome::NoParent { .. } => {}
                LinkOutcome::Linked { .. } => summary.links_updated += 1,
                LinkOutcome::Unchanged { .. } => summary.links_unchanged += 1,
                LinkOutcome::Unresolved { .. } => summary.links_unresolved += 1,
                LinkOutcome::Failed { .. } => summary.links_failed += 1,
            }
        }
        summary
    }

    /// Devices created or updated.
    #[must_use]
    pub const fn processed(&self) -> usize {
        self.created + self.updated
    }

    /// Status message recorded on the snapshot when the run completes.
    #[must_use]
    pub fn completion_message(&self) -> String {
        format!(
            "Snapshot processed. {} devices created/updated. {} parent links updated.",
            self.processed(),
            self.links_updated
        )
    }
}
