//! # Init Command Implementation
//!
//! This module implements the `init` subcommand, which creates one or more
//! environments next to the base compose file.
//!
//! For every environment it writes `<env>/config.yaml` (commented
//! scaffolding for environment settings) and the first override document,
//! `<env>/docker-compose.kev.<env>.yaml`, derived from the base compose file.
//! Existing environments are left alone unless `--force` is given.

use anyhow::Result;
use clap::Args;

use kev::app;
use kev::output::{OutputConfig, Status};
use kev::suggestions;

use super::RootArgs;

/// Create environments next to the base compose file
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Name of an environment to create. Repeat for several environments.
    #[arg(short, long = "env", value_name = "NAME", required = true)]
    pub envs: Vec<String>,

    #[command(flatten)]
    pub root: RootArgs,

    /// Regenerate environments that already exist.
    #[arg(long)]
    pub force: bool,
}

/// Execute the `init` command.
pub fn execute(args: InitArgs, output: &OutputConfig) -> Result<()> {
    let root = &args.root.root;

    for name in &args.envs {
        let created = app::create_environment(root, name, args.force)
            .map_err(|e| suggestions::with_hints(e, root))?;

        println!(
            "{} Created environment {}",
            output.marker(Status::Ok),
            output.paint(Status::Ok, &created.name)
        );
        println!("   {}", created.config_path.display());
        println!("   {}", created.override_path.display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kev::output::ColorChoice;
    use std::fs;
    use tempfile::TempDir;

    fn args(root: &TempDir, envs: &[&str], force: bool) -> InitArgs {
        InitArgs {
            envs: envs.iter().map(|e| e.to_string()).collect(),
            root: RootArgs {
                root: root.path().to_path_buf(),
            },
            force,
        }
    }

    #[test]
    fn test_execute_creates_environments() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("docker-compose.yaml"), "services:\n  db: {}\n").unwrap();
        let output = OutputConfig::new(ColorChoice::Never);

        execute(args(&temp_dir, &["dev", "prod"], false), &output).unwrap();
        assert!(temp_dir.path().join("dev/config.yaml").exists());
        assert!(temp_dir.path().join("prod/docker-compose.kev.prod.yaml").exists());
    }

    #[test]
    fn test_execute_missing_base_has_hint() {
        let temp_dir = TempDir::new().unwrap();
        let output = OutputConfig::new(ColorChoice::Never);

        let err = execute(args(&temp_dir, &["dev"], false), &output).unwrap_err();
        assert!(err.to_string().contains("hint:"));
    }
}
