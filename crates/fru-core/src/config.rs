use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::ident::KindPrefixes;

/// Directory holding project state, relative to the project root.
pub const FRU_DIR: &str = ".fru";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FruConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub reconcile: ReconcileConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Inventory database path; relative paths resolve against the project root.
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Per-kind overrides laid over the built-in `dev`/`dis` prefixes.
    #[serde(default, deserialize_with = "prefixes_over_defaults")]
    pub prefixes: KindPrefixes,
}

fn prefixes_over_defaults<'de, D>(deserializer: D) -> Result<KindPrefixes, D::Error>
where
    D: Deserializer<'de>,
{
    let overrides = KindPrefixes::deserialize(deserializer)?;
    Ok(KindPrefixes::default().overlay(overrides))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Wall-clock budget for one run. Unset means no deadline.
    #[serde(default)]
    pub deadline_secs: Option<u64>,
    /// How long to wait for another `fru` process to release the run lock.
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            deadline_secs: None,
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

impl ReconcileConfig {
    #[must_use]
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_secs.map(Duration::from_secs)
    }

    #[must_use]
    pub const fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

impl FruConfig {
    /// Absolute inventory database path for a project rooted at `root`.
    #[must_use]
    pub fn store_path(&self, root: &Path) -> PathBuf {
        if self.store.path.is_absolute() {
            self.store.path.clone()
        } else {
            root.join(&self.store.path)
        }
    }
}

/// Lock file serializing reconcile runs for a project rooted at `root`.
#[must_use]
pub fn lock_path(root: &Path) -> PathBuf {
    root.join(FRU_DIR).join("reconcile.lock")
}

/// Load `.fru/config.toml` under `project_root`; a missing file yields defaults.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_config(project_root: &Path) -> Result<FruConfig> {
    let path = project_root.join(FRU_DIR).join("config.toml");
    if !path.exists() {
        return Ok(FruConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<FruConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

fn default_store_path() -> PathBuf {
    PathBuf::from(FRU_DIR).join("inventory.db")
}

const fn default_lock_timeout_ms() -> u64 {
    5_000
}
