//! autopilot — reconciles a declarative manifest set against a HashiCorp
//! Vault server.
//!
//! # Quick start
//!
//! ```bash
//! # Apply a manifest from one or more files
//! autopilot apply -f manifest.yaml
//!
//! # Apply a manifest piped from standard input
//! cat manifest.yaml | autopilot apply
//! ```

mod manifests;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use autopilot_vault::VaultConfig;
use autopilot_workflow::Driver;

#[derive(Parser)]
#[command(name = "autopilot")]
#[command(author)]
#[command(version)]
#[command(about = "Reconciles a declarative manifest set against a Vault server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Apply one or more manifests, creating or updating Vault resources as
    /// needed.
    Apply {
        /// Path to a manifest file. May be repeated. Reads standard input
        /// when omitted.
        #[arg(short = 'f', long = "filename")]
        filename: Vec<PathBuf>,

        /// Maximum number of resources applied concurrently. `0` means
        /// unbounded.
        #[arg(long, default_value_t = 0)]
        max_dispatch: usize,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Apply { filename, max_dispatch } => run_apply(filename, max_dispatch).await,
    }
}

async fn run_apply(filename: Vec<PathBuf>, max_dispatch: usize) -> ExitCode {
    let manifests = match manifests::load(&filename) {
        Ok(manifests) => manifests,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::from(12); // ManifestSyntax, see autopilot_types::AutopilotError::exit_code
        }
    };
    tracing::info!(count = manifests.len(), "loaded manifests");

    let config = match VaultConfig::from_env() {
        Ok(config) => config,
        Err(message) => {
            eprintln!("error: {message}");
            return ExitCode::from(2);
        }
    };

    let driver = match Driver::bootstrap(&config, max_dispatch).await {
        Ok(driver) => driver,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::from(err.exit_code() as u8);
        }
    };

    let report = driver.run(manifests).await;
    match &report.error {
        Some(err) => eprintln!("error: {err}"),
        None if report.reason == autopilot_workflow::ShutdownReason::Aborted => {
            eprintln!("aborted")
        }
        None => println!("done"),
    }

    ExitCode::from(report.exit_code() as u8)
}
