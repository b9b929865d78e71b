//! # Patch Applier
//!
//! Applies a [`Changeset`] to an environment's overlay. The changeset is
//! computed as `diff(environment, source)`, so every entry describes how the
//! environment differs from the source. Policies run in a fixed order
//! (version, then services, then volumes):
//!
//! | field                     | policy                                           |
//! |---------------------------|--------------------------------------------------|
//! | version                   | always inherited from the source                 |
//! | service / volume presence | always propagated (new entities: default labels) |
//! | label values              | override preserving                              |
//! | env var presence          | removal always propagated                        |
//! | env var values            | override preserving                              |
//!
//! Override preserving means an entry is applied only when the environment's
//! current value equals the *baseline*: the value reconciliation would have
//! produced without local customisation. Anything else is a deliberate local
//! override and is kept, with a "nothing to update" report line.
//!
//! Environment variables declared by the source but missing from the
//! environment are inherited at render time and are never copied into the
//! override.
//!
//! Patching is all or nothing: changes are made on a working copy that
//! replaces the destination only when every entry applied cleanly, and
//! report lines are released only then.

use std::collections::BTreeMap;

use crate::changeset::Changeset;
use crate::compose::EnvVars;
use crate::diff::{ChangeEntry, FieldPath, FieldValue, Operation};
use crate::error::{Error, Result};
use crate::overlay::{Overlay, ServiceOverlay, VolumeOverlay};
use crate::report::{MemoryReporter, Reporter};

/// What happened to each entry of a changeset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchOutcome {
    /// Entries that changed the destination.
    pub applied: Vec<ChangeEntry>,
    /// Entries skipped because the destination holds a local override.
    pub kept: Vec<ChangeEntry>,
    /// Entries with nothing to do: source-only environment variables that
    /// the destination inherits.
    pub inherited: Vec<ChangeEntry>,
}

impl PatchOutcome {
    pub fn is_noop(&self) -> bool {
        self.applied.is_empty()
    }
}

/// Applies changesets for one environment.
#[derive(Debug, Clone, Copy)]
pub struct Patcher<'a> {
    env: &'a str,
    source: &'a Overlay,
    baseline: &'a Overlay,
}

enum Decision {
    Applied,
    Kept,
    Inherited,
}

impl<'a> Patcher<'a> {
    /// `source` is the `to` side of the diff; `baseline` is what the
    /// environment would hold without local customisation.
    pub fn new(env: &'a str, source: &'a Overlay, baseline: &'a Overlay) -> Self {
        Self {
            env,
            source,
            baseline,
        }
    }

    /// Apply `changeset` to `destination`, reporting applied and kept entries.
    ///
    /// On error `destination` is left untouched and nothing is reported.
    pub fn apply(
        &self,
        changeset: &Changeset,
        destination: &mut Overlay,
        reporter: &mut dyn Reporter,
    ) -> Result<PatchOutcome> {
        let mut working = destination.clone();
        let mut lines = MemoryReporter::new();
        let mut outcome = PatchOutcome::default();

        for target in changeset.targets() {
            for entry in changeset.for_target(target) {
                match self.apply_entry(entry, &mut working)? {
                    Decision::Applied => {
                        lines.report(&self.applied_line(entry));
                        outcome.applied.push(entry.clone());
                    }
                    Decision::Kept => {
                        lines.report(&self.kept_line(entry));
                        outcome.kept.push(entry.clone());
                    }
                    Decision::Inherited => outcome.inherited.push(entry.clone()),
                }
            }
        }

        if outcome.is_noop() {
            lines.report(&format!("{}: nothing to update", self.env));
        }

        *destination = working;
        for line in lines.lines() {
            reporter.report(line);
        }
        Ok(outcome)
    }

    fn apply_entry(&self, entry: &ChangeEntry, working: &mut Overlay) -> Result<Decision> {
        Ok(match &entry.path {
            FieldPath::Version => self.apply_version(entry, working),
            FieldPath::Service { name } => self.apply_service(entry, name, working)?,
            FieldPath::ServiceLabel { service, key } => {
                let labels = &mut service_mut(working, service, entry)?.labels;
                let baseline = self
                    .baseline
                    .services
                    .get(service)
                    .and_then(|s| s.labels.get(key))
                    .map(|v| FieldValue::Scalar(v.clone()));
                preserve_override(entry, labels, key, baseline, scalar_of)
            }
            FieldPath::ServiceEnv { service, key } => {
                let environment = &mut service_mut(working, service, entry)?.environment;
                self.apply_env_var(entry, environment, service, key)
            }
            FieldPath::Volume { name } => self.apply_volume(entry, name, working)?,
            FieldPath::VolumeLabel { volume, key } => {
                let labels = &mut volume_mut(working, volume, entry)?.labels;
                let baseline = self
                    .baseline
                    .volumes
                    .get(volume)
                    .and_then(|v| v.labels.get(key))
                    .map(|v| FieldValue::Scalar(v.clone()));
                preserve_override(entry, labels, key, baseline, scalar_of)
            }
        })
    }

    fn apply_version(&self, entry: &ChangeEntry, working: &mut Overlay) -> Decision {
        working.version = entry
            .new
            .as_ref()
            .and_then(FieldValue::as_scalar)
            .map(str::to_string);
        Decision::Applied
    }

    fn apply_service(
        &self,
        entry: &ChangeEntry,
        name: &str,
        working: &mut Overlay,
    ) -> Result<Decision> {
        match entry.operation {
            Operation::Create => {
                let source = self.source.services.get(name).ok_or_else(|| Error::Patch {
                    path: entry.path.to_string(),
                    message: format!("service '{}' is missing from the source overlay", name),
                })?;
                working.services.insert(
                    name.to_string(),
                    ServiceOverlay {
                        labels: source.labels.clone(),
                        environment: Default::default(),
                    },
                );
                Ok(Decision::Applied)
            }
            Operation::Delete => Ok(match working.services.remove(name) {
                Some(_) => Decision::Applied,
                None => Decision::Inherited,
            }),
            Operation::Update => Err(Error::Patch {
                path: entry.path.to_string(),
                message: "services are only ever created or deleted as a whole".to_string(),
            }),
        }
    }

    fn apply_volume(
        &self,
        entry: &ChangeEntry,
        name: &str,
        working: &mut Overlay,
    ) -> Result<Decision> {
        match entry.operation {
            Operation::Create => {
                let source = self.source.volumes.get(name).ok_or_else(|| Error::Patch {
                    path: entry.path.to_string(),
                    message: format!("volume '{}' is missing from the source overlay", name),
                })?;
                working.volumes.insert(
                    name.to_string(),
                    VolumeOverlay {
                        labels: source.labels.clone(),
                    },
                );
                Ok(Decision::Applied)
            }
            Operation::Delete => Ok(match working.volumes.remove(name) {
                Some(_) => Decision::Applied,
                None => Decision::Inherited,
            }),
            Operation::Update => Err(Error::Patch {
                path: entry.path.to_string(),
                message: "volumes are only ever created or deleted as a whole".to_string(),
            }),
        }
    }

    fn apply_env_var(
        &self,
        entry: &ChangeEntry,
        environment: &mut EnvVars,
        service: &str,
        key: &str,
    ) -> Decision {
        match entry.operation {
            // Declared by the source only: inherited, nothing to materialise.
            Operation::Create => Decision::Inherited,
            // Removed at the source: removed everywhere.
            Operation::Delete => {
                environment.remove(key);
                Decision::Applied
            }
            Operation::Update => {
                let baseline = self
                    .baseline
                    .services
                    .get(service)
                    .and_then(|s| s.environment.get(key))
                    .cloned()
                    .map(FieldValue::from);
                preserve_override(entry, environment, key, baseline, env_value_of)
            }
        }
    }

    fn applied_line(&self, entry: &ChangeEntry) -> String {
        let verb = entry.operation.verb();
        match &entry.path {
            FieldPath::Version => match (&entry.previous, &entry.new) {
                (Some(prev), Some(new)) => {
                    format!("{}: {} version {} -> {}", self.env, verb, prev, new)
                }
                (_, Some(new)) => format!("{}: {} version {}", self.env, verb, new),
                (Some(prev), None) => format!("{}: {} version {}", self.env, verb, prev),
                (None, None) => format!("{}: {} version", self.env, verb),
            },
            FieldPath::Service { name } => format!("{}: {} service {}", self.env, verb, name),
            FieldPath::Volume { name } => format!("{}: {} volume {}", self.env, verb, name),
            FieldPath::ServiceLabel { service, key } => {
                format!("{}: {} service {} label {}", self.env, verb, service, key)
            }
            FieldPath::VolumeLabel { volume, key } => {
                format!("{}: {} volume {} label {}", self.env, verb, volume, key)
            }
            FieldPath::ServiceEnv { service, key } => {
                format!("{}: {} service {} env var {}", self.env, verb, service, key)
            }
        }
    }

    fn kept_line(&self, entry: &ChangeEntry) -> String {
        let target = match &entry.path {
            FieldPath::ServiceLabel { service, key } => {
                format!("service {} label {}", service, key)
            }
            FieldPath::VolumeLabel { volume, key } => format!("volume {} label {}", volume, key),
            FieldPath::ServiceEnv { service, key } => {
                format!("service {} env var {}", service, key)
            }
            other => other.to_string(),
        };
        format!("{}: nothing to update for {} (kept local value)", self.env, target)
    }
}

/// Apply a value-level entry only when the destination still holds the
/// baseline value.
fn preserve_override<V>(
    entry: &ChangeEntry,
    map: &mut BTreeMap<String, V>,
    key: &str,
    baseline: Option<FieldValue>,
    convert: impl Fn(&FieldValue) -> V,
) -> Decision
where
    V: Clone + Into<FieldValue>,
{
    let current: Option<FieldValue> = map.get(key).cloned().map(Into::into);
    if current != baseline {
        return Decision::Kept;
    }

    match &entry.new {
        Some(new) => {
            map.insert(key.to_string(), convert(new));
        }
        None => {
            map.remove(key);
        }
    }
    Decision::Applied
}

fn scalar_of(value: &FieldValue) -> String {
    value.as_scalar().unwrap_or_default().to_string()
}

fn env_value_of(value: &FieldValue) -> Option<String> {
    value.as_scalar().map(str::to_string)
}

fn service_mut<'o>(
    working: &'o mut Overlay,
    name: &str,
    entry: &ChangeEntry,
) -> Result<&'o mut ServiceOverlay> {
    working.services.get_mut(name).ok_or_else(|| Error::Patch {
        path: entry.path.to_string(),
        message: format!("service '{}' does not exist in the destination", name),
    })
}

fn volume_mut<'o>(
    working: &'o mut Overlay,
    name: &str,
    entry: &ChangeEntry,
) -> Result<&'o mut VolumeOverlay> {
    working.volumes.get_mut(name).ok_or_else(|| Error::Patch {
        path: entry.path.to_string(),
        message: format!("volume '{}' does not exist in the destination", name),
    })
}
