//! CLI argument parsing and command dispatch

use std::str::FromStr;

use anyhow::Result;
use clap::{Parser, Subcommand};
use log::LevelFilter;

use kev::output::{ColorChoice, OutputConfig};

use crate::commands;

/// kev - Keep per-environment compose overrides in step with a base compose file
#[derive(Parser, Debug)]
#[command(name = "kev")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Colorize output (always, never, auto)
    #[arg(long, global = true, value_name = "WHEN", value_enum, default_value = "auto")]
    color: ColorChoice,

    /// Set log level (error, warn, info, debug, trace)
    ///
    /// The per-change reconcile audit trail is logged at `debug`.
    #[arg(long, global = true, value_name = "LEVEL", default_value = "info", env = "KEV_LOG")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create environments next to the base compose file
    Init(commands::init::InitArgs),

    /// Bring every environment's override file in line with the base compose file
    Reconcile(commands::reconcile::ReconcileArgs),

    /// List the environments of a project
    Envs(commands::envs::EnvsArgs),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        init_logging(&self.log_level)?;
        let output = OutputConfig::new(self.color);

        match self.command {
            Commands::Init(args) => commands::init::execute(args, &output),
            Commands::Reconcile(args) => commands::reconcile::execute(args, &output),
            Commands::Envs(args) => commands::envs::execute(args),
        }
    }
}

fn init_logging(level: &str) -> Result<()> {
    let filter = LevelFilter::from_str(level).map_err(|_| {
        anyhow::anyhow!(
            "Invalid log level '{}'\n\n\
             hint: Use one of error, warn, info, debug, trace",
            level
        )
    })?;

    // Another logger may already be installed when running in-process.
    let _ = env_logger::Builder::new()
        .filter_level(filter)
        .format_timestamp(None)
        .format_target(false)
        .try_init();
    Ok(())
}
