//! # Compose Project Model
//!
//! Typed representation of the subset of a compose document that `kev`
//! cares about: the schema version, services (labels, environment variables,
//! and the deploy/healthcheck/ports blocks that default labels are derived
//! from) and volumes (labels).
//!
//! Services and volumes are kept in `BTreeMap`s keyed by name, so iteration
//! is always lexicographic and never depends on document order.
//!
//! Both the mapping and the list syntax are accepted for `labels` and
//! `environment`:
//!
//! ```yaml
//! environment:
//!   - DB_HOST=db
//!   - DEBUG          # declared but unset
//! ```
//!
//! ```
//! use kev::compose::Project;
//!
//! let project = Project::from_str(
//!     "version: '3.7'\nservices:\n  db:\n    environment:\n      - DEBUG\n",
//! )
//! .unwrap();
//! assert_eq!(project.version, "3.7");
//! assert_eq!(project.services["db"].environment["DEBUG"], None);
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::de::{self, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer};

use crate::error::{Error, Result};

/// Environment variables of a service. `None` means declared without a value.
pub type EnvVars = BTreeMap<String, Option<String>>;

/// Labels of a service or volume.
pub type Labels = BTreeMap<String, String>;

/// A loaded compose project.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Project {
    /// Compose schema version, empty when the document does not declare one.
    pub version: String,
    pub services: BTreeMap<String, ServiceConfig>,
    pub volumes: BTreeMap<String, VolumeConfig>,
}

/// A single service of a compose project.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Service name, always equal to its key in [`Project::services`].
    pub name: String,
    pub image: Option<String>,
    pub labels: Labels,
    pub environment: EnvVars,
    pub deploy: Option<Deploy>,
    pub healthcheck: Option<Healthcheck>,
    pub ports: Vec<Port>,
}

/// A named volume of a compose project.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VolumeConfig {
    pub name: String,
    pub labels: Labels,
}

/// The `deploy` block of a service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Deploy {
    pub replicas: Option<u64>,
    pub limits: Option<Resources>,
    pub reservations: Option<Resources>,
}

/// CPU and memory figures from `deploy.resources.limits|reservations`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resources {
    pub cpus: Option<String>,
    pub memory: Option<String>,
}

/// The `healthcheck` block of a service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Healthcheck {
    /// The probe command, normalised to its list form (`["CMD", ...]`).
    pub test: Vec<String>,
    pub interval: Option<String>,
    pub timeout: Option<String>,
    pub retries: Option<u64>,
    pub start_period: Option<String>,
    pub disable: bool,
}

/// A published or exposed service port.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Port {
    pub target: String,
    pub published: Option<String>,
    pub mode: Option<String>,
}

impl Project {
    /// Parse a project from a YAML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self> {
        parse(content, None)
    }

    /// Load a project from a single compose file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        parse(&content, Some(path.to_path_buf()))
    }

    /// Load a project from several compose files, later files overriding
    /// earlier ones key by key.
    pub fn from_files<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        let mut project = Project::default();
        for path in paths {
            project.merge(Project::from_file(path)?);
        }
        Ok(project)
    }

    /// Merge `other` on top of this project.
    pub fn merge(&mut self, other: Project) {
        if !other.version.is_empty() {
            self.version = other.version;
        }

        for (name, service) in other.services {
            match self.services.get_mut(&name) {
                Some(existing) => existing.merge(service),
                None => {
                    self.services.insert(name, service);
                }
            }
        }

        for (name, volume) in other.volumes {
            self.volumes
                .entry(name.clone())
                .or_insert_with(|| VolumeConfig {
                    name,
                    labels: Labels::new(),
                })
                .labels
                .extend(volume.labels);
        }
    }

    /// Look up a service by name.
    pub fn service(&self, name: &str) -> Option<&ServiceConfig> {
        self.services.get(name)
    }

    /// Look up a volume by name.
    pub fn volume(&self, name: &str) -> Option<&VolumeConfig> {
        self.volumes.get(name)
    }

    /// Service names in canonical (lexicographic) order.
    pub fn service_names(&self) -> Vec<&str> {
        self.services.keys().map(String::as_str).collect()
    }

    /// Volume names in canonical (lexicographic) order.
    pub fn volume_names(&self) -> Vec<&str> {
        self.volumes.keys().map(String::as_str).collect()
    }
}

impl ServiceConfig {
    /// Create an empty service with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    fn merge(&mut self, other: ServiceConfig) {
        if other.image.is_some() {
            self.image = other.image;
        }
        self.labels.extend(other.labels);
        self.environment.extend(other.environment);
        if other.deploy.is_some() {
            self.deploy = other.deploy;
        }
        if other.healthcheck.is_some() {
            self.healthcheck = other.healthcheck;
        }
        if !other.ports.is_empty() {
            self.ports = other.ports;
        }
    }
}

////// RAW DOCUMENT SHAPE //////

// Scalars are read through `String` so that serde_yaml hands over the text
// as written: `3.10` stays "3.10" and `0x1F` stays "0x1F".

#[derive(Debug, Default, Deserialize)]
struct RawProject {
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    services: Option<BTreeMap<String, Option<RawService>>>,
    #[serde(default)]
    volumes: Option<BTreeMap<String, Option<RawVolume>>>,
}

#[derive(Debug, Default, Deserialize)]
struct RawService {
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    labels: Option<ListOrMap>,
    #[serde(default)]
    environment: Option<ListOrMap>,
    #[serde(default)]
    deploy: Option<RawDeploy>,
    #[serde(default)]
    healthcheck: Option<RawHealthcheck>,
    #[serde(default)]
    ports: Option<Vec<RawPort>>,
}

#[derive(Debug, Default, Deserialize)]
struct RawVolume {
    #[serde(default)]
    labels: Option<ListOrMap>,
}

#[derive(Debug, Default, Deserialize)]
struct RawDeploy {
    #[serde(default)]
    replicas: Option<u64>,
    #[serde(default)]
    resources: Option<RawResourcesBlock>,
}

#[derive(Debug, Default, Deserialize)]
struct RawResourcesBlock {
    #[serde(default)]
    limits: Option<RawResources>,
    #[serde(default)]
    reservations: Option<RawResources>,
}

#[derive(Debug, Default, Deserialize)]
struct RawResources {
    #[serde(default)]
    cpus: Option<String>,
    #[serde(default)]
    memory: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawHealthcheck {
    #[serde(default)]
    test: Option<RawTest>,
    #[serde(default)]
    interval: Option<String>,
    #[serde(default)]
    timeout: Option<String>,
    #[serde(default)]
    retries: Option<u64>,
    #[serde(default)]
    start_period: Option<String>,
    #[serde(default)]
    disable: Option<bool>,
}

/// `labels` / `environment` accept either a mapping or a `KEY=value` list.
#[derive(Debug)]
enum ListOrMap {
    Map(BTreeMap<String, Option<String>>),
    List(Vec<String>),
}

impl<'de> Deserialize<'de> for ListOrMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct ListOrMapVisitor;

        impl<'de> Visitor<'de> for ListOrMapVisitor {
            type Value = ListOrMap;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a mapping or a list of KEY=value strings")
            }

            fn visit_map<A>(self, mut map: A) -> std::result::Result<ListOrMap, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries = BTreeMap::new();
                while let Some((key, value)) = map.next_entry::<String, Option<String>>()? {
                    entries.insert(key, value);
                }
                Ok(ListOrMap::Map(entries))
            }

            fn visit_seq<A>(self, mut seq: A) -> std::result::Result<ListOrMap, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let mut items = Vec::new();
                while let Some(item) = seq.next_element::<String>()? {
                    items.push(item);
                }
                Ok(ListOrMap::List(items))
            }
        }

        deserializer.deserialize_any(ListOrMapVisitor)
    }
}

impl ListOrMap {
    fn into_entries(self) -> BTreeMap<String, Option<String>> {
        match self {
            ListOrMap::Map(map) => map,
            ListOrMap::List(items) => items
                .into_iter()
                .map(|item| match item.split_once('=') {
                    Some((key, value)) => (key.to_string(), Some(value.to_string())),
                    None => (item, None),
                })
                .collect(),
        }
    }
}

/// Healthcheck tests come as `[CMD, ...]`, `[CMD-SHELL, "cmd"]` or a plain
/// string (which compose treats like `CMD-SHELL`).
#[derive(Debug)]
enum RawTest {
    Shell(String),
    List(Vec<String>),
}

impl<'de> Deserialize<'de> for RawTest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct RawTestVisitor;

        impl<'de> Visitor<'de> for RawTestVisitor {
            type Value = RawTest;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a command string or a list")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> std::result::Result<RawTest, E> {
                Ok(RawTest::Shell(value.to_string()))
            }

            fn visit_seq<A>(self, mut seq: A) -> std::result::Result<RawTest, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let mut items = Vec::new();
                while let Some(item) = seq.next_element::<String>()? {
                    items.push(item);
                }
                Ok(RawTest::List(items))
            }
        }

        deserializer.deserialize_any(RawTestVisitor)
    }
}

impl RawTest {
    fn into_command(self) -> Vec<String> {
        match self {
            RawTest::Shell(cmd) => vec!["CMD-SHELL".to_string(), cmd],
            RawTest::List(items) => items,
        }
    }
}

/// A port in short (`"8000:80"`) or long (`target:`/`published:`) syntax.
#[derive(Debug)]
enum RawPort {
    Long {
        target: String,
        published: Option<String>,
        mode: Option<String>,
    },
    Short(String),
}

impl<'de> Deserialize<'de> for RawPort {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct RawPortVisitor;

        impl<'de> Visitor<'de> for RawPortVisitor {
            type Value = RawPort;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a port string, a port number or a port mapping")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> std::result::Result<RawPort, E> {
                Ok(RawPort::Short(value.to_string()))
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> std::result::Result<RawPort, E> {
                Ok(RawPort::Short(value.to_string()))
            }

            fn visit_map<A>(self, mut map: A) -> std::result::Result<RawPort, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut target = None;
                let mut published = None;
                let mut mode = None;
                while let Some(key) = map.next_key::<String>()? {
                    match key.as_str() {
                        "target" => target = Some(map.next_value::<String>()?),
                        "published" => published = map.next_value::<Option<String>>()?,
                        "mode" => mode = map.next_value::<Option<String>>()?,
                        _ => {
                            map.next_value::<IgnoredAny>()?;
                        }
                    }
                }
                Ok(RawPort::Long {
                    target: target.ok_or_else(|| de::Error::missing_field("target"))?,
                    published,
                    mode,
                })
            }
        }

        deserializer.deserialize_any(RawPortVisitor)
    }
}

fn parse(content: &str, file: Option<PathBuf>) -> Result<Project> {
    let invalid = |message: String| Error::InvalidProject {
        file: file.clone(),
        message,
    };

    let raw: Option<RawProject> =
        serde_yaml::from_str(content).map_err(|err| invalid(err.to_string()))?;
    // An empty document is an empty project.
    let raw = raw.unwrap_or_default();

    let mut services = BTreeMap::new();
    for (name, raw_service) in raw.services.unwrap_or_default() {
        if name.trim().is_empty() {
            return Err(invalid("service name must not be empty".to_string()));
        }
        let service = convert_service(&name, raw_service.unwrap_or_default());
        services.insert(name, service);
    }

    let mut volumes = BTreeMap::new();
    for (name, raw_volume) in raw.volumes.unwrap_or_default() {
        if name.trim().is_empty() {
            return Err(invalid("volume name must not be empty".to_string()));
        }
        let labels = raw_volume
            .and_then(|v| v.labels)
            .map(labels_from)
            .unwrap_or_default();
        volumes.insert(name.clone(), VolumeConfig { name, labels });
    }

    Ok(Project {
        version: raw.version.unwrap_or_default(),
        services,
        volumes,
    })
}

fn labels_from(raw: ListOrMap) -> Labels {
    raw.into_entries()
        .into_iter()
        .map(|(key, value)| (key, value.unwrap_or_default()))
        .collect()
}

fn convert_service(name: &str, raw: RawService) -> ServiceConfig {
    let deploy = raw.deploy.map(|d| {
        let (limits, reservations) = match d.resources {
            Some(block) => (
                block.limits.map(convert_resources),
                block.reservations.map(convert_resources),
            ),
            None => (None, None),
        };
        Deploy {
            replicas: d.replicas,
            limits,
            reservations,
        }
    });

    let healthcheck = raw.healthcheck.map(|h| Healthcheck {
        test: h.test.map(RawTest::into_command).unwrap_or_default(),
        interval: h.interval,
        timeout: h.timeout,
        retries: h.retries,
        start_period: h.start_period,
        disable: h.disable.unwrap_or(false),
    });

    ServiceConfig {
        name: name.to_string(),
        image: raw.image,
        labels: raw.labels.map(labels_from).unwrap_or_default(),
        environment: raw
            .environment
            .map(ListOrMap::into_entries)
            .unwrap_or_default(),
        deploy,
        healthcheck,
        ports: raw
            .ports
            .unwrap_or_default()
            .into_iter()
            .map(convert_port)
            .collect(),
    }
}

fn convert_resources(raw: RawResources) -> Resources {
    Resources {
        cpus: raw.cpus,
        memory: raw.memory,
    }
}

fn convert_port(raw: RawPort) -> Port {
    match raw {
        RawPort::Long {
            target,
            published,
            mode,
        } => Port {
            target,
            published,
            mode,
        },
        RawPort::Short(spec) => {
            // host_ip:published:target, published:target or target (protocol suffix ignored)
            let spec = spec.split('/').next().unwrap_or_default();
            let mut parts = spec.rsplitn(2, ':');
            let target = parts.next().unwrap_or_default().to_string();
            let published = parts
                .next()
                .map(|rest| rest.rsplit(':').next().unwrap_or(rest).to_string());
            Port {
                target,
                published,
                mode: None,
            }
        }
    }
}
