//! # Error Handling
//!
//! This module defines the centralized error type for `kev`. It uses the
//! `thiserror` library to describe every failure mode of loading compose
//! projects, diffing and patching overlays, and reconciling environments.
//!
//! ## Error classes
//!
//! - **User input** (`InvalidProject`, `NoBaseCompose`, `Io`, `Filesystem`):
//!   a document could not be read or does not have the expected shape. During
//!   reconciliation these abort only the affected environment.
//! - **Internal invariants** (`Diff`, `Patch`): an overlay was not shaped the
//!   way the projector guarantees. These indicate a bug and are propagated.
//! - **Aggregate** (`Reconcile`): one or more environments failed; names the
//!   environments that failed and the ones that were reconciled.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// A single environment that could not be reconciled.
#[derive(Debug)]
pub struct EnvironmentFailure {
    /// Environment name (its directory name).
    pub name: String,
    /// The error that stopped this environment's pass.
    pub error: Box<Error>,
}

impl fmt::Display for EnvironmentFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.error)
    }
}

/// Main error type for kev operations
#[derive(Error, Debug)]
pub enum Error {
    /// A compose document is malformed or misses required identity fields.
    #[error("Invalid project {}: {message}", source_name(file))]
    InvalidProject {
        /// The offending file, when the project was loaded from disk.
        file: Option<PathBuf>,
        message: String,
    },

    /// Two overlays could not be compared.
    #[error("Diff error at '{path}': {message}")]
    Diff { path: String, message: String },

    /// A change could not be applied because its parent is missing in the
    /// destination overlay.
    #[error("Patch error at '{path}': {message}")]
    Patch { path: String, message: String },

    /// One or more environments failed to reconcile.
    #[error(
        "Reconcile failed for {} environment(s): {}{}",
        failed.len(),
        join_failures(failed),
        reconciled_suffix(succeeded)
    )]
    Reconcile {
        failed: Vec<EnvironmentFailure>,
        succeeded: Vec<String>,
    },

    /// The working root does not contain a base compose document.
    #[error("No base compose file found in {}", root.display())]
    NoBaseCompose { root: PathBuf },

    /// An environment with this name already exists.
    #[error("Environment '{name}' already exists")]
    EnvironmentExists { name: String },

    /// An environment name that cannot be used as a directory name.
    #[error("Invalid environment name '{name}'")]
    InvalidEnvironmentName { name: String },

    /// A file or directory under the working root could not be read or
    /// written.
    #[error("Filesystem operation error: {message}")]
    Filesystem { message: String },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An error occurred during serialization.
    #[error("Serialization error: {message}")]
    Serialization { message: String },
}

impl Error {
    /// Whether this error is an implementation bug rather than bad input.
    pub fn is_internal(&self) -> bool {
        matches!(self, Error::Diff { .. } | Error::Patch { .. })
    }
}

fn source_name(file: &Option<PathBuf>) -> String {
    match file {
        Some(path) => path.display().to_string(),
        None => "<inline>".to_string(),
    }
}

fn join_failures(failed: &[EnvironmentFailure]) -> String {
    failed
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn reconciled_suffix(succeeded: &[String]) -> String {
    if succeeded.is_empty() {
        String::new()
    } else {
        format!(" (reconciled: {})", succeeded.join(", "))
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
