//! # Error Suggestions
//!
//! This module provides helper functions for generating helpful error
//! messages with hints and suggestions. Errors should tell users what went
//! wrong AND how to fix it.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use crate::suggestions;
//!
//! // Instead of:
//! anyhow::bail!("No base compose file found in {}", root.display());
//!
//! // Use:
//! return Err(suggestions::base_compose_not_found(root));
//! ```

use std::path::Path;

use crate::defaults::{BASE_COMPOSE_CANDIDATES, ROOT_ENV_VAR};
use crate::error::Error;

/// Generate an error for a working root without a base compose document.
pub fn base_compose_not_found(root: &Path) -> anyhow::Error {
    anyhow::anyhow!(
        "No base compose file found in {root}\n\n\
         hint: Create one of: {candidates}\n\
         hint: Use --root to point at the directory holding it\n\
         hint: Set {env} environment variable",
        root = root.display(),
        candidates = BASE_COMPOSE_CANDIDATES.join(", "),
        env = ROOT_ENV_VAR,
    )
}

/// Generate an error for a working root without environments.
pub fn no_environments(root: &Path) -> anyhow::Error {
    anyhow::anyhow!(
        "No environments found in {root}\n\n\
         hint: Run 'kev init --env dev' to create one\n\
         hint: Every non-hidden subdirectory of the root is an environment",
        root = root.display()
    )
}

/// Generate an error for an environment that already exists.
pub fn environment_exists(name: &str) -> anyhow::Error {
    anyhow::anyhow!(
        "Environment '{name}' already exists\n\n\
         hint: Use --force to regenerate its config.yaml and override document\n\
         hint: Run 'kev reconcile' to bring it up to date instead"
    )
}

/// Generate an error for a name that cannot be an environment directory.
pub fn invalid_environment_name(name: &str) -> anyhow::Error {
    anyhow::anyhow!(
        "Invalid environment name '{name}'\n\n\
         hint: Use letters, digits, '-', '_' or '.'\n\
         hint: Names must not start with '.'"
    )
}

/// Attach hints to library errors that users can fix themselves.
pub fn with_hints(error: Error, root: &Path) -> anyhow::Error {
    match error {
        Error::NoBaseCompose { .. } => base_compose_not_found(root),
        Error::EnvironmentExists { name } => environment_exists(&name),
        Error::InvalidEnvironmentName { name } => invalid_environment_name(&name),
        other => other.into(),
    }
}
