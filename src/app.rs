//! # Environment Creation
//!
//! Scaffolds a new environment directory next to the base compose document:
//!
//! - `config.yaml`, a commented skeleton for environment-specific settings.
//!   It is written once here and never touched by reconciliation.
//! - the first override document, holding the base's default labels and no
//!   environment variables, so the first reconciliation reports nothing but
//!   genuine differences.

use std::path::{Path, PathBuf};

use log::info;

use crate::config::env_config_scaffold;
use crate::defaults;
use crate::error::{Error, Result};
use crate::overlay::{project_base, Overlay};
use crate::reconcile::Reconciler;
use crate::write::write_atomically;

/// Files written for a new environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedEnvironment {
    pub name: String,
    pub config_path: PathBuf,
    pub override_path: PathBuf,
}

/// Create environment `name` under `root`.
///
/// Fails with [`Error::EnvironmentExists`] if the environment already has a
/// config or override document, unless `force` is set.
pub fn create_environment(root: &Path, name: &str, force: bool) -> Result<CreatedEnvironment> {
    validate_name(name)?;

    let config_path = defaults::env_config_path(root, name);
    let override_path = defaults::override_path(root, name);
    if !force && (config_path.exists() || override_path.exists()) {
        return Err(Error::EnvironmentExists {
            name: name.to_string(),
        });
    }

    let base = Reconciler::new(root).load_base()?;
    let overlay = initial_overlay(&project_base(&base)?);

    write_atomically(&config_path, &env_config_scaffold(&base))?;
    write_atomically(&override_path, &overlay.render()?)?;
    info!("Created environment {} in {}", name, root.join(name).display());

    Ok(CreatedEnvironment {
        name: name.to_string(),
        config_path,
        override_path,
    })
}

/// The base projection with every environment variable removed; variables
/// are inherited from the base until an environment overrides them.
fn initial_overlay(base: &Overlay) -> Overlay {
    let mut overlay = base.clone();
    for service in overlay.services.values_mut() {
        service.environment.clear();
    }
    overlay
}

fn validate_name(name: &str) -> Result<()> {
    let valid = defaults::is_environment_name(name)
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.');
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidEnvironmentName {
            name: name.to_string(),
        })
    }
}
