pub mod devices;
pub mod reconcile;
pub mod snapshots;
pub mod submit;

use std::path::Path;

use anyhow::Context;
use fru_core::config::FruConfig;
use fru_core::db::SqliteStore;
use fru_core::error::ErrorCode;

use crate::output::{CliError, OutputMode, render_error};

/// Open the inventory for a read or reconcile command.
///
/// Unlike `fru submit`, these commands never create the database: a missing
/// file means nothing was ever submitted.
pub fn open_existing_store(
    config: &FruConfig,
    project_root: &Path,
    output: OutputMode,
) -> anyhow::Result<SqliteStore> {
    let path = config.store_path(project_root);
    if !path.exists() {
        render_error(
            output,
            &CliError::from_code(
                ErrorCode::NotInitialized,
                format!("no inventory database at {}", path.display()),
            ),
        )?;
        anyhow::bail!("inventory not initialized");
    }

    SqliteStore::open(&path).with_context(|| format!("open inventory {}", path.display()))
}
