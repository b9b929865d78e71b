//! # CLI Command Implementations
//!
//! This module contains the implementation for each subcommand of the `kev`
//! command-line tool. Each subcommand is defined in its own file.
//!
//! ## Structure
//!
//! Each command module contains:
//! - An `Args` struct that defines the command-specific arguments and options,
//!   derived using `clap`.
//! - An `execute` function that takes the parsed `Args` and performs the
//!   command's logic by calling into the `kev` library.

use std::path::PathBuf;

use clap::Args;

use kev::defaults::ROOT_ENV_VAR;

pub mod envs;
pub mod init;
pub mod reconcile;

/// Location of the project, shared by every command.
#[derive(Args, Debug, Clone)]
pub struct RootArgs {
    /// Directory holding the base compose file and the environment directories.
    ///
    /// Can also be set with the `KEV_ROOT` environment variable.
    #[arg(long, value_name = "DIR", env = ROOT_ENV_VAR, default_value = ".")]
    pub root: PathBuf,
}
