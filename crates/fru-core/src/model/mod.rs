//! Resource types persisted by the inventory store.
//!
//! Both resources share the same envelope: an API version, a kind, resource
//! [`Metadata`], a spec, and a status. Only the reconciler writes the
//! discovery-sourced parts of a [`device::Device`] and the status of a
//! [`snapshot::DiscoverySnapshot`].

pub mod device;
pub mod snapshot;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// API group/version stamped on every resource.
pub const API_VERSION: &str = "example.fabrica.dev/v1";

/// Storage schema version stamped on every resource.
pub const SCHEMA_VERSION: &str = "v1";

/// The two resource kinds the store knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceKind {
    Device,
    DiscoverySnapshot,
}

impl ResourceKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Device => "Device",
            Self::DiscoverySnapshot => "DiscoverySnapshot",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a resource kind name is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown resource kind: '{0}'")]
pub struct UnknownKind(pub String);

impl FromStr for ResourceKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Device" => Ok(Self::Device),
            "DiscoverySnapshot" => Ok(Self::DiscoverySnapshot),
            other => Err(UnknownKind(other.to_string())),
        }
    }
}

/// Identity and bookkeeping fields common to every resource.
///
/// `uid` and `created_at` are assigned once at creation and never change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub uid: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Metadata {
    /// Fresh metadata with both timestamps set to `now`.
    #[must_use]
    pub fn new(uid: impl Into<String>, name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            uid: uid.into(),
            name: name.into(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Bump `updated_at`, never moving it backwards past `created_at`.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now.max(self.created_at);
    }
}
