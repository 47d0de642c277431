//! Resource identity generation.
//!
//! Identities look like `<prefix>-<12 hex digits>`, e.g. `dev-3f9a0c11b2e4`.
//! The kind → prefix table is plain configuration handed to
//! [`IdGenerator::new`]; there is no process-wide registry.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ErrorCode;
use crate::model::ResourceKind;

/// Number of hex digits taken from a v4 UUID for the identity suffix.
pub const SUFFIX_LEN: usize = 12;

/// Errors raised while minting identities.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    #[error("no identity prefix configured for kind {0}")]
    UnknownKind(ResourceKind),
}

impl IdError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::UnknownKind(_) => ErrorCode::UnknownResourceKind,
        }
    }
}

/// Mapping from resource kind name to identity prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KindPrefixes(BTreeMap<String, String>);

impl Default for KindPrefixes {
    fn default() -> Self {
        let mut map = BTreeMap::new();
        map.insert(ResourceKind::Device.as_str().to_string(), "dev".to_string());
        map.insert(
            ResourceKind::DiscoverySnapshot.as_str().to_string(),
            "dis".to_string(),
        );
        Self(map)
    }
}

impl KindPrefixes {
    /// An empty table; every kind must be added with [`KindPrefixes::with`].
    #[must_use]
    pub const fn empty() -> Self {
        Self(BTreeMap::new())
    }

    #[must_use]
    pub fn with(mut self, kind: ResourceKind, prefix: impl Into<String>) -> Self {
        self.0.insert(kind.as_str().to_string(), prefix.into());
        self
    }

    /// Entries of `overrides` replace this table's; unlisted kinds keep theirs.
    #[must_use]
    pub fn overlay(mut self, overrides: Self) -> Self {
        self.0.extend(overrides.0);
        self
    }

    #[must_use]
    pub fn prefix(&self, kind: ResourceKind) -> Option<&str> {
        self.0
            .get(kind.as_str())
            .map(String::as_str)
            .filter(|prefix| !prefix.trim().is_empty())
    }
}

/// Mints identities for resources from an explicit prefix table.
#[derive(Debug, Clone, Default)]
pub struct IdGenerator {
    prefixes: KindPrefixes,
}

impl IdGenerator {
    #[must_use]
    pub const fn new(prefixes: KindPrefixes) -> Self {
        Self { prefixes }
    }

    #[must_use]
    pub const fn prefixes(&self) -> &KindPrefixes {
        &self.prefixes
    }

    /// Generate a fresh identity for a resource of `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`IdError::UnknownKind`] if the table has no prefix for `kind`.
    pub fn generate(&self, kind: ResourceKind) -> Result<String, IdError> {
        let prefix = self
            .prefixes
            .prefix(kind)
            .ok_or(IdError::UnknownKind(kind))?;
        let suffix = Uuid::new_v4().simple().to_string();
        Ok(format!("{prefix}-{}", &suffix[..SUFFIX_LEN]))
    }
}
