//! Command-line front end for the MDIB store.
//!
//! Replays JSON scripts of description and state batches into a fresh store
//! and reports what the preprocessing chain accepted.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mdib::core::entity::MdibEntity;
use mdib::exit_codes;
use mdib::io::config::{MdibConfig, load_config};
use mdib::logging;
use mdib::replay::{ReplayOutcome, replay_file};

#[derive(Parser)]
#[command(name = "mdib", version, about = "Versioned MDIB tree store")]
struct Cli {
    /// MDIB identity config (TOML). A missing file means defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replay a script and print a one-line summary.
    Validate {
        script: PathBuf,
    },
    /// Replay a script and print every change report as a JSON line.
    Replay {
        script: PathBuf,

        /// Print the final tree as pretty JSON after the reports.
        #[arg(long)]
        dump: bool,
    },
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => MdibConfig::default(),
    };
    match cli.command {
        Command::Validate { script } => cmd_validate(&script, &config),
        Command::Replay { script, dump } => cmd_replay(&script, &config, dump),
    }
}

fn cmd_validate(script: &Path, config: &MdibConfig) -> Result<i32> {
    let (access, outcome) = replay_file(script, config)?;
    if outcome.is_accepted() {
        let view = access.read();
        println!(
            "ok: {} batches applied, {} entities, mdib version {}",
            outcome.reports.len(),
            view.len(),
            view.mdib_version()
        );
    }
    Ok(finish(&outcome))
}

fn cmd_replay(script: &Path, config: &MdibConfig, dump: bool) -> Result<i32> {
    let (access, outcome) = replay_file(script, config)?;
    for report in &outcome.reports {
        let line = serde_json::to_string(report).context("serialize report")?;
        println!("{line}");
    }
    if dump {
        let view = access.read();
        let entities: Vec<&MdibEntity> = view.tree().depth_first();
        let payload = serde_json::to_string_pretty(&entities).context("serialize tree")?;
        println!("{payload}");
    }
    Ok(finish(&outcome))
}

/// Print the rejection (if any) and pick the exit code.
fn finish(outcome: &ReplayOutcome) -> i32 {
    match &outcome.rejection {
        None => exit_codes::OK,
        Some(rejection) => {
            eprintln!(
                "rejected: batch {} ({}): {}",
                rejection.index, rejection.label, rejection.error
            );
            exit_codes::REJECTED
        }
    }
}
