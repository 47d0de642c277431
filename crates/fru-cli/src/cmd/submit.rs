//! `fru submit`: store a collector payload as a new `Pending` snapshot.
//!
//! The file must hold valid JSON; anything else is refused before a
//! snapshot is created. The parsed value is stored as the snapshot's raw
//! data. Its shape is only checked when the snapshot is reconciled, so a
//! payload that is not a device list still gets a snapshot that ends in
//! phase `Error`.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Utc;
use clap::Args;
use fru_core::config::FruConfig;
use fru_core::db::SqliteStore;
use fru_core::ident::IdGenerator;
use fru_core::model::ResourceKind;
use fru_core::model::snapshot::DiscoverySnapshot;
use fru_core::store::Store;
use serde::Serialize;
use tracing::info;

use crate::output::{CliError, OutputMode, pretty_kv, render_error, render_mode};

#[derive(Args, Debug)]
pub struct SubmitArgs {
    /// JSON file holding the collector's device list.
    pub file: PathBuf,

    /// Snapshot name. Defaults to the file stem.
    #[arg(long)]
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
struct Submitted {
    uid: String,
    name: String,
    phase: String,
}

fn snapshot_name(args: &SubmitArgs) -> String {
    args.name.clone().unwrap_or_else(|| {
        args.file
            .file_stem()
            .map_or_else(|| "snapshot".to_string(), |stem| stem.to_string_lossy().into_owned())
    })
}

/// Execute `fru submit <file>`.
///
/// # Errors
///
/// Returns an error if the file cannot be read, is not JSON, or the
/// snapshot cannot be stored.
pub fn run_submit(
    args: &SubmitArgs,
    config: &FruConfig,
    output: OutputMode,
    project_root: &Path,
) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(&args.file)
        .with_context(|| format!("read payload {}", args.file.display()))?;
    let raw: serde_json::Value = match serde_json::from_str(&text) {
        Ok(raw) => raw,
        Err(err) => {
            render_error(
                output,
                &CliError::new(format!("{} is not valid JSON: {err}", args.file.display())),
            )?;
            anyhow::bail!("payload is not valid JSON");
        }
    };

    let ids = IdGenerator::new(config.identity.prefixes.clone());
    let uid = match ids.generate(ResourceKind::DiscoverySnapshot) {
        Ok(uid) => uid,
        Err(err) => {
            render_error(output, &CliError::from_code(err.code(), err.to_string()))?;
            return Err(err.into());
        }
    };

    let store_path = config.store_path(project_root);
    let store = SqliteStore::open(&store_path)?;
    let snapshot = DiscoverySnapshot::new(uid, snapshot_name(args), raw, Utc::now());
    store
        .create_snapshot(&snapshot)
        .with_context(|| format!("store snapshot {}", snapshot.uid()))?;
    info!(snapshot = %snapshot.uid(), name = %snapshot.name(), "snapshot submitted");

    let submitted = Submitted {
        uid: snapshot.uid().to_string(),
        name: snapshot.name().to_string(),
        phase: snapshot.status.phase.to_string(),
    };
    render_mode(
        output,
        &submitted,
        |s, w| writeln!(w, "{}\t{}\t{}", s.uid, s.name, s.phase),
        |s, w| {
            pretty_kv(w, "snapshot", &s.uid)?;
            pretty_kv(w, "name", &s.name)?;
            pretty_kv(w, "phase", &s.phase)
        },
    )
}
