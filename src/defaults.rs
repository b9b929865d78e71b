//! Default file names and locations for kev projects.
//!
//! This module provides the on-disk layout shared by every command, ensuring
//! consistency and avoiding duplication:
//!
//! ```text
//! <root>/
//!   docker-compose.yaml            base compose document
//!   <env>/
//!     config.yaml                  environment settings scaffold
//!     docker-compose.kev.<env>.yaml  environment override document
//! ```

use std::path::{Path, PathBuf};

/// Base compose file names, in lookup order.
pub const BASE_COMPOSE_CANDIDATES: &[&str] = &[
    "docker-compose.yaml",
    "docker-compose.yml",
    "compose.yaml",
    "compose.yml",
];

/// Per-environment settings file.
pub const ENV_CONFIG_FILE: &str = "config.yaml";

/// Environment variable that overrides the working root.
pub const ROOT_ENV_VAR: &str = "KEV_ROOT";

/// Returns the first base compose file that exists under `root`.
pub fn find_base_compose(root: &Path) -> Option<PathBuf> {
    BASE_COMPOSE_CANDIDATES
        .iter()
        .map(|name| root.join(name))
        .find(|path| path.is_file())
}

/// File name of an environment's override document.
pub fn override_file_name(env: &str) -> String {
    format!("docker-compose.kev.{}.yaml", env)
}

/// Path of an environment's override document.
pub fn override_path(root: &Path, env: &str) -> PathBuf {
    root.join(env).join(override_file_name(env))
}

/// Path of an environment's settings file.
pub fn env_config_path(root: &Path, env: &str) -> PathBuf {
    root.join(env).join(ENV_CONFIG_FILE)
}

/// Whether a directory entry name can be an environment.
///
/// Hidden directories such as `.git` are never environments.
pub fn is_environment_name(name: &str) -> bool {
    !name.is_empty() && !name.starts_with('.')
}
