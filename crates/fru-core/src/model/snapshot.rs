use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{fmt, str::FromStr};

use super::{API_VERSION, Metadata, ResourceKind, SCHEMA_VERSION};

/// Processing phase of a discovery snapshot.
///
/// An absent phase deserializes as [`SnapshotPhase::Pending`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SnapshotPhase {
    #[default]
    #[serde(alias = "")]
    Pending,
    Processing,
    Completed,
    Error,
}

impl SnapshotPhase {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Processing => "Processing",
            Self::Completed => "Completed",
            Self::Error => "Error",
        }
    }

    /// Validate whether a transition from self to `target` is allowed.
    ///
    /// Valid transitions:
    /// - `Pending -> Processing`
    /// - `Processing -> Processing` (restart after an aborted run)
    /// - `Error -> Processing` (reprocess from scratch)
    /// - `Processing -> Completed`
    /// - `Processing -> Error`
    ///
    /// `Completed` is terminal.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidTransition`] for any pair not listed above.
    pub const fn can_transition_to(self, target: Self) -> Result<(), InvalidTransition> {
        let allowed = matches!(
            (self, target),
            (Self::Pending | Self::Processing | Self::Error, Self::Processing)
                | (Self::Processing, Self::Completed | Self::Error)
        );

        if allowed {
            Ok(())
        } else {
            Err(InvalidTransition {
                from: self,
                to: target,
            })
        }
    }
}

/// Error returned when a phase transition is invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("snapshot phase cannot move from {from} to {to}")]
pub struct InvalidTransition {
    pub from: SnapshotPhase,
    pub to: SnapshotPhase,
}

impl fmt::Display for SnapshotPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing a phase from text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid snapshot phase: '{0}'")]
pub struct ParsePhaseError(pub String);

impl FromStr for SnapshotPhase {
    type Err = ParsePhaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" | "Pending" => Ok(Self::Pending),
            "Processing" => Ok(Self::Processing),
            "Completed" => Ok(Self::Completed),
            "Error" => Ok(Self::Error),
            _ => Err(ParsePhaseError(s.to_string())),
        }
    }
}

/// Desired state of a snapshot: the raw collector payload, kept opaque.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotSpec {
    pub raw_data: Value,
}

/// Observed state of a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotStatus {
    pub phase: SnapshotPhase,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub message: String,
    pub ready: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoverySnapshot {
    pub api_version: String,
    pub kind: ResourceKind,
    pub schema_version: String,
    pub metadata: Metadata,
    pub spec: SnapshotSpec,
    #[serde(default)]
    pub status: SnapshotStatus,
}

impl DiscoverySnapshot {
    /// Build a new `Pending` snapshot around a raw collector payload.
    #[must_use]
    pub fn new(
        uid: impl Into<String>,
        name: impl Into<String>,
        raw_data: Value,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: ResourceKind::DiscoverySnapshot,
            schema_version: SCHEMA_VERSION.to_string(),
            metadata: Metadata::new(uid, name, now),
            spec: SnapshotSpec { raw_data },
            status: SnapshotStatus::default(),
        }
    }

    #[must_use]
    pub fn uid(&self) -> &str {
        &self.metadata.uid
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status.phase == SnapshotPhase::Completed
    }
}

#[cfg(test)]
mod tests {
    use super::{InvalidTransition, SnapshotPhase, SnapshotStatus};
    use std::str::FromStr;

    #[test]
    fn phase_display_parse_roundtrips() {
        for phase in [
            SnapshotPhase::Pending,
            SnapshotPhase::Processing,
            SnapshotPhase::Completed,
            SnapshotPhase::Error,
        ] {
            assert_eq!(SnapshotPhase::from_str(&phase.to_string()), Ok(phase));
        }
        assert_eq!(SnapshotPhase::from_str(""), Ok(SnapshotPhase::Pending));
        assert!(SnapshotPhase::from_str("Done").is_err());
    }

    #[test]
    fn absent_status_decodes_as_pending() {
        let status: SnapshotStatus = serde_json::from_str("{}").expect("decode status");
        assert_eq!(status.phase, SnapshotPhase::Pending);
        assert!(!status.ready);

        let status: SnapshotStatus =
            serde_json::from_str(r#"{"phase":"","ready":false}"#).expect("decode empty phase");
        assert_eq!(status.phase, SnapshotPhase::Pending);
    }

    #[test]
    fn phase_transition_rules() {
        use SnapshotPhase::{Completed, Error, Pending, Processing};

        assert!(Pending.can_transition_to(Processing).is_ok());
        assert!(Processing.can_transition_to(Processing).is_ok());
        assert!(Error.can_transition_to(Processing).is_ok());
        assert!(Processing.can_transition_to(Completed).is_ok());
        assert!(Processing.can_transition_to(Error).is_ok());

        assert!(matches!(
            Completed.can_transition_to(Processing),
            Err(InvalidTransition {
                from: Completed,
                to: Processing
            })
        ));
        assert!(Pending.can_transition_to(Completed).is_err());
        assert!(Error.can_transition_to(Completed).is_err());
    }
}
