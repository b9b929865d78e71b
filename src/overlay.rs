//! # Overlays
//!
//! An overlay is the reconciliation-relevant projection of a compose
//! project: the schema version, each service's labels and environment
//! variables, and each volume's labels. Build contexts, images, networks and
//! everything else are dropped.
//!
//! Two projections exist:
//!
//! - [`project`] copies labels verbatim. It is used for environment override
//!   documents, whose labels are the environment's current deployment state.
//! - [`project_base`] replaces labels with the defaults derived from each
//!   service's own configuration (see [`crate::config`]). It is used for the
//!   base compose document.
//!
//! Both are deterministic: the same project always yields the same overlay.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::compose::{EnvVars, Labels, Project, ServiceConfig, VolumeConfig};
use crate::config::{service_default_labels, volume_default_labels};
use crate::error::{Error, Result};

/// Reconciliation-scoped projection of a [`Project`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Overlay {
    /// `None` when the projected document did not declare a version.
    pub version: Option<String>,
    pub services: BTreeMap<String, ServiceOverlay>,
    pub volumes: BTreeMap<String, VolumeOverlay>,
}

/// Projection of a single service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ServiceOverlay {
    pub labels: Labels,
    pub environment: EnvVars,
}

/// Projection of a single volume.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VolumeOverlay {
    pub labels: Labels,
}

/// Project an override document, keeping labels as written.
pub fn project(project: &Project) -> Result<Overlay> {
    projection(project, |s| s.labels.clone(), |v| v.labels.clone())
}

/// Project the base compose document, deriving default labels.
pub fn project_base(project: &Project) -> Result<Overlay> {
    projection(project, service_default_labels, volume_default_labels)
}

fn projection(
    project: &Project,
    service_labels: impl Fn(&ServiceConfig) -> Labels,
    volume_labels: impl Fn(&VolumeConfig) -> Labels,
) -> Result<Overlay> {
    let mut services = BTreeMap::new();
    for (key, service) in &project.services {
        check_identity("service", key, &service.name)?;
        services.insert(
            key.clone(),
            ServiceOverlay {
                labels: service_labels(service),
                environment: service.environment.clone(),
            },
        );
    }

    let mut volumes = BTreeMap::new();
    for (key, volume) in &project.volumes {
        check_identity("volume", key, &volume.name)?;
        volumes.insert(
            key.clone(),
            VolumeOverlay {
                labels: volume_labels(volume),
            },
        );
    }

    let version = if project.version.is_empty() {
        None
    } else {
        Some(project.version.clone())
    };

    Ok(Overlay {
        version,
        services,
        volumes,
    })
}

fn check_identity(kind: &str, key: &str, name: &str) -> Result<()> {
    if key.trim().is_empty() {
        return Err(Error::InvalidProject {
            file: None,
            message: format!("{} name must not be empty", kind),
        });
    }
    if key != name {
        return Err(Error::InvalidProject {
            file: None,
            message: format!("{} key '{}' does not match its name '{}'", kind, key, name),
        });
    }
    Ok(())
}

impl Overlay {
    /// Materialise the overlay back into a [`Project`] carrying only
    /// version, labels and environment variables.
    pub fn to_project(&self) -> Project {
        Project {
            version: self.version.clone().unwrap_or_default(),
            services: self
                .services
                .iter()
                .map(|(name, service)| {
                    let config = ServiceConfig {
                        name: name.clone(),
                        labels: service.labels.clone(),
                        environment: service.environment.clone(),
                        ..Default::default()
                    };
                    (name.clone(), config)
                })
                .collect(),
            volumes: self
                .volumes
                .iter()
                .map(|(name, volume)| {
                    let config = VolumeConfig {
                        name: name.clone(),
                        labels: volume.labels.clone(),
                    };
                    (name.clone(), config)
                })
                .collect(),
        }
    }

    /// Render the overlay as an override compose document.
    pub fn render(&self) -> Result<String> {
        let document = OverrideDocument {
            version: self.version.as_deref(),
            services: self
                .services
                .iter()
                .map(|(name, s)| {
                    (
                        name.as_str(),
                        ServiceDocument {
                            labels: &s.labels,
                            environment: &s.environment,
                        },
                    )
                })
                .collect(),
            volumes: self
                .volumes
                .iter()
                .map(|(name, v)| (name.as_str(), VolumeDocument { labels: &v.labels }))
                .collect(),
        };

        serde_yaml::to_string(&document).map_err(|err| Error::Serialization {
            message: format!("Failed to render override document: {}", err),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.version.is_none() && self.services.is_empty() && self.volumes.is_empty()
    }
}

#[derive(Serialize)]
struct OverrideDocument<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<&'a str>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    services: BTreeMap<&'a str, ServiceDocument<'a>>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    volumes: BTreeMap<&'a str, VolumeDocument<'a>>,
}

#[derive(Serialize)]
struct ServiceDocument<'a> {
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    labels: &'a Labels,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    environment: &'a EnvVars,
}

#[derive(Serialize)]
struct VolumeDocument<'a> {
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    labels: &'a Labels,
}
