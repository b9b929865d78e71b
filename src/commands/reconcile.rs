//! # Reconcile Command Implementation
//!
//! This module implements the `reconcile` subcommand, which brings every
//! environment's override document in line with the base compose file.
//!
//! ## Functionality
//!
//! - **Audit Trail**: one line per applied change, plus "nothing to update"
//!   for environments already in step.
//! - **Persistence**: changed override documents are written back unless
//!   `--dry-run` is given.
//! - **Best Effort**: an environment whose override cannot be read is
//!   reported and skipped; the others are still reconciled and written. The
//!   command then exits with an error naming the failed environments.
//! - **JSON Output**: `--format json` prints the reconciled environments
//!   instead of the audit trail.

use std::io;
use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Args, ValueEnum};

use kev::compose::Project;
use kev::output::{OutputConfig, Status};
use kev::reconcile::{ReconcileRun, Reconciler};
use kev::report::{LogReporter, Reporter, WriterReporter};
use kev::{suggestions, write};

use super::RootArgs;

/// Bring every environment's override file in line with the base compose file
#[derive(Args, Debug)]
pub struct ReconcileArgs {
    #[command(flatten)]
    pub root: RootArgs,

    /// Show what would change without writing any file.
    #[arg(long)]
    pub dry_run: bool,

    /// Output format.
    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// The base compose file as it was at the previous reconciliation.
    ///
    /// Label and variable values that still match it follow upstream changes;
    /// without it every value that differs from the base is kept as a local
    /// override.
    #[arg(long, value_name = "FILE")]
    pub previous_base: Option<PathBuf>,
}

/// Output formats for the `reconcile` command
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Audit trail and per-environment summary
    #[default]
    Text,
    /// Reconciled environments as JSON
    Json,
}

/// Execute the `reconcile` command.
pub fn execute(args: ReconcileArgs, output: &OutputConfig) -> Result<()> {
    let root = &args.root.root;

    let mut reconciler = Reconciler::new(root);
    if let Some(previous) = &args.previous_base {
        let previous = Project::from_file(previous).map_err(|e| {
            anyhow::anyhow!("Failed to load previous base {}: {}", previous.display(), e)
        })?;
        reconciler = reconciler.with_previous_base(previous);
    }

    let run = match args.format {
        OutputFormat::Text => {
            let stdout = io::stdout();
            let mut reporter = WriterReporter::new(stdout.lock());
            reconcile_all(&reconciler, &mut reporter, root)?
        }
        OutputFormat::Json => reconcile_all(&reconciler, &mut LogReporter, root)?,
    };

    if run.manifest.is_empty() && run.failed.is_empty() {
        return Err(suggestions::no_environments(root));
    }

    if !args.dry_run {
        write::execute(&run.manifest, false)?;
    }

    match args.format {
        OutputFormat::Text => print_summary(&run, output, args.dry_run),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&run.manifest)?),
    }

    run.into_result()
        .map(|_| ())
        .map_err(|e| suggestions::with_hints(e, root))
}

fn reconcile_all(
    reconciler: &Reconciler,
    reporter: &mut dyn Reporter,
    root: &Path,
) -> Result<ReconcileRun> {
    reconciler
        .run(reporter)
        .map_err(|e| suggestions::with_hints(e, root))
}

fn print_summary(run: &ReconcileRun, output: &OutputConfig, dry_run: bool) {
    println!();
    for env in run.manifest.environments() {
        if env.changed {
            let action = if dry_run { "would be updated" } else { "updated" };
            println!(
                "{} {}: {} ({} change(s), {} local value(s) kept)",
                output.marker(Status::Changed),
                output.paint(Status::Changed, &env.name),
                action,
                env.applied(),
                env.kept()
            );
        } else {
            println!(
                "{} {}: up to date ({} local value(s) kept)",
                output.marker(Status::Ok),
                output.paint(Status::Ok, &env.name),
                env.kept()
            );
        }
    }
    for failure in &run.failed {
        println!(
            "{} {}: {}",
            output.marker(Status::Failed),
            output.paint(Status::Failed, &failure.name),
            failure.error
        );
    }
    if dry_run {
        println!();
        println!("Dry run: no files were written.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kev::output::ColorChoice;
    use std::fs;
    use tempfile::TempDir;

    fn args(root: &TempDir, dry_run: bool) -> ReconcileArgs {
        ReconcileArgs {
            root: RootArgs {
                root: root.path().to_path_buf(),
            },
            dry_run,
            format: OutputFormat::Text,
            previous_base: None,
        }
    }

    fn project_with_env(env: &str) -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("docker-compose.yaml"), "version: '3.7'\n").unwrap();
        fs::create_dir(temp_dir.path().join(env)).unwrap();
        temp_dir
    }

    #[test]
    fn test_execute_writes_overrides() {
        let temp_dir = project_with_env("dev");
        execute(args(&temp_dir, false), &OutputConfig::new(ColorChoice::Never)).unwrap();
        assert!(temp_dir.path().join("dev/docker-compose.kev.dev.yaml").exists());
    }

    #[test]
    fn test_execute_dry_run_writes_nothing() {
        let temp_dir = project_with_env("dev");
        execute(args(&temp_dir, true), &OutputConfig::new(ColorChoice::Never)).unwrap();
        assert!(!temp_dir.path().join("dev/docker-compose.kev.dev.yaml").exists());
    }

    #[test]
    fn test_execute_without_environments() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("docker-compose.yaml"), "version: '3.7'\n").unwrap();
        let output = OutputConfig::new(ColorChoice::Never);
        let err = execute(args(&temp_dir, false), &output).unwrap_err();
        assert!(err.to_string().contains("No environments found"));
    }

    #[test]
    fn test_execute_missing_previous_base() {
        let temp_dir = project_with_env("dev");
        let mut args = args(&temp_dir, false);
        args.previous_base = Some(temp_dir.path().join("old.yaml"));
        let err = execute(args, &OutputConfig::new(ColorChoice::Never)).unwrap_err();
        assert!(err.to_string().contains("Failed to load previous base"));
    }
}
