//! # Structural Differ
//!
//! Computes a path-addressed diff between two [`Overlay`]s. `from` is the
//! reference state and `to` the candidate state; for every addressable field
//! present in either overlay the differ emits:
//!
//! - `Create` when the field exists only in `to`,
//! - `Delete` when it exists only in `from`,
//! - `Update` when both hold different values,
//!
//! and nothing when the values are equal. Values are compared as exact
//! strings with no coercion or case folding.
//!
//! A service or volume present on one side only produces a single entity
//! entry; its labels and environment variables travel with that entry rather
//! than being listed field by field.
//!
//! Entries are emitted in canonical order: version first, then services and
//! volumes in lexicographic key order, each service's labels before its
//! environment variables. Change logs are therefore stable across runs.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::overlay::Overlay;

/// The kind of field an entry targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Category {
    Version,
    Service,
    Volume,
    EnvVar,
    Label,
}

/// What happened to the field between `from` and `to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl Operation {
    /// Past-tense verb used in change reports.
    pub fn verb(&self) -> &'static str {
        match self {
            Operation::Create => "added",
            Operation::Update => "updated",
            Operation::Delete => "deleted",
        }
    }
}

/// Address of a field inside an overlay.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum FieldPath {
    Version,
    Service { name: String },
    ServiceLabel { service: String, key: String },
    ServiceEnv { service: String, key: String },
    Volume { name: String },
    VolumeLabel { volume: String, key: String },
}

impl FieldPath {
    pub fn category(&self) -> Category {
        match self {
            FieldPath::Version => Category::Version,
            FieldPath::Service { .. } => Category::Service,
            FieldPath::Volume { .. } => Category::Volume,
            FieldPath::ServiceEnv { .. } => Category::EnvVar,
            FieldPath::ServiceLabel { .. } | FieldPath::VolumeLabel { .. } => Category::Label,
        }
    }

    /// Name of the service or volume this path belongs to.
    pub fn owner(&self) -> Option<&str> {
        match self {
            FieldPath::Version => None,
            FieldPath::Service { name } | FieldPath::Volume { name } => Some(name),
            FieldPath::ServiceLabel { service, .. } | FieldPath::ServiceEnv { service, .. } => {
                Some(service)
            }
            FieldPath::VolumeLabel { volume, .. } => Some(volume),
        }
    }

    /// Label or environment variable key, for leaf paths.
    pub fn key(&self) -> Option<&str> {
        match self {
            FieldPath::ServiceLabel { key, .. }
            | FieldPath::ServiceEnv { key, .. }
            | FieldPath::VolumeLabel { key, .. } => Some(key),
            _ => None,
        }
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldPath::Version => write!(f, "version"),
            FieldPath::Service { name } => write!(f, "services.{}", name),
            FieldPath::ServiceLabel { service, key } => {
                write!(f, "services.{}.labels.{}", service, key)
            }
            FieldPath::ServiceEnv { service, key } => {
                write!(f, "services.{}.environment.{}", service, key)
            }
            FieldPath::Volume { name } => write!(f, "volumes.{}", name),
            FieldPath::VolumeLabel { volume, key } => {
                write!(f, "volumes.{}.labels.{}", volume, key)
            }
        }
    }
}

/// The value held by a field on one side of a diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum FieldValue {
    /// A label value, version string, or assigned environment variable.
    Scalar(String),
    /// An environment variable declared without a value.
    Unset,
    /// A whole service or volume.
    Entity,
}

impl FieldValue {
    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            FieldValue::Scalar(s) => Some(s),
            _ => None,
        }
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Scalar(value)
    }
}

/// `None` is an environment variable declared without a value.
impl From<Option<String>> for FieldValue {
    fn from(value: Option<String>) -> Self {
        match value {
            Some(v) => FieldValue::Scalar(v),
            None => FieldValue::Unset,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Scalar(s) => write!(f, "{}", s),
            FieldValue::Unset => write!(f, "<unset>"),
            FieldValue::Entity => write!(f, "<entity>"),
        }
    }
}

/// One elementary difference between two overlays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeEntry {
    pub path: FieldPath,
    pub operation: Operation,
    /// Value in `from`; `None` for `Create`.
    pub previous: Option<FieldValue>,
    /// Value in `to`; `None` for `Delete`.
    pub new: Option<FieldValue>,
}

impl ChangeEntry {
    pub fn category(&self) -> Category {
        self.path.category()
    }

    fn between(
        path: FieldPath,
        previous: Option<FieldValue>,
        new: Option<FieldValue>,
    ) -> Option<Self> {
        let operation = match (&previous, &new) {
            (None, Some(_)) => Operation::Create,
            (Some(_), None) => Operation::Delete,
            (Some(a), Some(b)) if a != b => Operation::Update,
            _ => return None,
        };
        Some(Self {
            path,
            operation,
            previous,
            new,
        })
    }
}

impl fmt::Display for ChangeEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.operation {
            Operation::Create => write!(f, "+ {}", self.path)?,
            Operation::Delete => write!(f, "- {}", self.path)?,
            Operation::Update => write!(f, "~ {}", self.path)?,
        }
        match (&self.previous, &self.new) {
            (Some(FieldValue::Entity), _) | (_, Some(FieldValue::Entity)) => Ok(()),
            (Some(prev), Some(new)) => write!(f, ": {} -> {}", prev, new),
            (None, Some(new)) => write!(f, ": {}", new),
            (Some(prev), None) => write!(f, " (was {})", prev),
            (None, None) => Ok(()),
        }
    }
}

/// Compare `to` against `from`. Neither overlay is modified.
pub fn diff(from: &Overlay, to: &Overlay) -> Result<Vec<ChangeEntry>> {
    let scalar_value = |value: &String| FieldValue::Scalar(value.clone());
    let env_value = |value: &Option<String>| FieldValue::from(value.clone());
    let mut entries = Vec::new();

    entries.extend(ChangeEntry::between(
        FieldPath::Version,
        from.version.clone().map(FieldValue::Scalar),
        to.version.clone().map(FieldValue::Scalar),
    ));

    for name in union_keys(&from.services, &to.services) {
        check_key("services", name)?;
        match (from.services.get(name), to.services.get(name)) {
            (Some(a), Some(b)) => {
                let label = |key: &str| FieldPath::ServiceLabel {
                    service: name.to_string(),
                    key: key.to_string(),
                };
                let env_var = |key: &str| FieldPath::ServiceEnv {
                    service: name.to_string(),
                    key: key.to_string(),
                };
                diff_leaves(&a.labels, &b.labels, &mut entries, label, scalar_value)?;
                diff_leaves(&a.environment, &b.environment, &mut entries, env_var, env_value)?;
            }
            (a, b) => entries.extend(ChangeEntry::between(
                FieldPath::Service {
                    name: name.to_string(),
                },
                a.map(|_| FieldValue::Entity),
                b.map(|_| FieldValue::Entity),
            )),
        }
    }

    for name in union_keys(&from.volumes, &to.volumes) {
        check_key("volumes", name)?;
        match (from.volumes.get(name), to.volumes.get(name)) {
            (Some(a), Some(b)) => {
                let label = |key: &str| FieldPath::VolumeLabel {
                    volume: name.to_string(),
                    key: key.to_string(),
                };
                diff_leaves(&a.labels, &b.labels, &mut entries, label, scalar_value)?;
            }
            (a, b) => entries.extend(ChangeEntry::between(
                FieldPath::Volume {
                    name: name.to_string(),
                },
                a.map(|_| FieldValue::Entity),
                b.map(|_| FieldValue::Entity),
            )),
        }
    }

    Ok(entries)
}

fn union_keys<'a, V>(a: &'a BTreeMap<String, V>, b: &'a BTreeMap<String, V>) -> BTreeSet<&'a str> {
    a.keys().chain(b.keys()).map(String::as_str).collect()
}

fn check_key(parent: &str, key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(Error::Diff {
            path: parent.to_string(),
            message: "empty key".to_string(),
        });
    }
    Ok(())
}

fn diff_leaves<V>(
    from: &BTreeMap<String, V>,
    to: &BTreeMap<String, V>,
    entries: &mut Vec<ChangeEntry>,
    path: impl Fn(&str) -> FieldPath,
    value: impl Fn(&V) -> FieldValue,
) -> Result<()> {
    for key in union_keys(from, to) {
        if key.is_empty() {
            return Err(Error::Diff {
                path: path(key).to_string(),
                message: "empty key".to_string(),
            });
        }
        entries.extend(ChangeEntry::between(
            path(key),
            from.get(key).map(&value),
            to.get(key).map(&value),
        ));
    }
    Ok(())
}
