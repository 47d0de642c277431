#![forbid(unsafe_code)]

mod cmd;
mod output;

use clap::{Parser, Subcommand};
use fru_core::config;
use fru_core::error::ErrorCode;
use output::{CliError, render_error};
use std::env;
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "fru: reconcile hardware discovery snapshots into a device inventory",
    long_about = None
)]
struct Cli {
    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Ingest",
        about = "Submit a collector payload as a new snapshot",
        long_about = "Store a collector's JSON device list as a new Pending discovery snapshot.",
        after_help = "EXAMPLES:\n    # Submit a payload\n    fru submit rack-12.json\n\n    # Give the snapshot an explicit name\n    fru submit rack-12.json --name nightly-rack-12"
    )]
    Submit(cmd::submit::SubmitArgs),

    #[command(
        next_help_heading = "Ingest",
        about = "Reconcile snapshots into the device inventory",
        long_about = "Create or update one device per discovered URI and link devices to their parents.",
        after_help = "EXAMPLES:\n    # Reconcile one snapshot\n    fru reconcile dis-3f9a0c11b2e4\n\n    # Reconcile everything not yet completed\n    fru reconcile --pending\n\n    # Emit machine-readable output\n    fru reconcile --pending --json"
    )]
    Reconcile(cmd::reconcile::ReconcileArgs),

    #[command(
        next_help_heading = "Read",
        about = "List devices",
        long_about = "List every device with its parent and children.",
        after_help = "EXAMPLES:\n    # List devices\n    fru devices\n\n    # Find a device by serial number\n    fru devices --serial SN-0042\n\n    # Emit machine-readable output\n    fru devices --json"
    )]
    Devices(cmd::devices::DevicesArgs),

    #[command(
        next_help_heading = "Read",
        about = "List snapshots",
        long_about = "List submitted snapshots with their phase and status message.",
        after_help = "EXAMPLES:\n    # List snapshots\n    fru snapshots\n\n    # Only snapshots whose payload was rejected\n    fru snapshots --phase Error"
    )]
    Snapshots(cmd::snapshots::SnapshotsArgs),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("FRU_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "fru=debug,info"
        } else {
            "fru=info,warn"
        })
    });

    let format = env::var("FRU_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let project_root = env::current_dir()?;
    let output = output::resolve_output_mode(cli.json);
    let config = match config::load_config(&project_root) {
        Ok(config) => config,
        Err(err) => {
            let code = ErrorCode::ConfigParseError;
            render_error(
                output,
                &CliError::from_code(code, format!("{}: {err:#}", code.message())),
            )?;
            return Err(err);
        }
    };
    debug!(root = %project_root.display(), ?output, "resolved project");

    match cli.command {
        Commands::Submit(ref args) => {
            cmd::submit::run_submit(args, &config, output, &project_root)
        }
        Commands::Reconcile(ref args) => {
            cmd::reconcile::run_reconcile(args, &config, output, &project_root)
        }
        Commands::Devices(ref args) => {
            cmd::devices::run_devices(args, &config, output, &project_root)
        }
        Commands::Snapshots(ref args) => {
            cmd::snapshots::run_snapshots(args, &config, output, &project_root)
        }
    }
}
