//! # Label Vocabulary and Defaults
//!
//! Deployment attributes are expressed as labels under the
//! `kev.<category>.<attribute>` namespace. This module holds the closed set
//! of recognised keys, the derivation of default labels from a base service
//! or volume, and the scaffolding written to each environment's
//! `config.yaml`.
//!
//! Unrecognised keys are never rejected: they travel through reconciliation
//! as opaque values under the same policies as recognised ones.

use crate::compose::{Labels, Project, ServiceConfig, VolumeConfig};

/// Prefix shared by every label kev understands.
pub const LABEL_PREFIX: &str = "kev.";

pub const LABEL_WORKLOAD_CPU: &str = "kev.workload.cpu";
pub const LABEL_WORKLOAD_MAX_CPU: &str = "kev.workload.max-cpu";
pub const LABEL_WORKLOAD_MEMORY: &str = "kev.workload.memory";
pub const LABEL_WORKLOAD_MAX_MEMORY: &str = "kev.workload.max-memory";
pub const LABEL_WORKLOAD_REPLICAS: &str = "kev.workload.replicas";
pub const LABEL_WORKLOAD_SERVICE_ACCOUNT_NAME: &str = "kev.workload.service-account-name";
pub const LABEL_WORKLOAD_IMAGE_PULL_POLICY: &str = "kev.workload.image-pull-policy";
pub const LABEL_WORKLOAD_RESTART_POLICY: &str = "kev.workload.restart-policy";
pub const LABEL_WORKLOAD_LIVENESS_PROBE_COMMAND: &str = "kev.workload.liveness-probe-command";
pub const LABEL_WORKLOAD_LIVENESS_PROBE_DISABLED: &str = "kev.workload.liveness-probe-disabled";
pub const LABEL_WORKLOAD_LIVENESS_PROBE_INTERVAL: &str = "kev.workload.liveness-probe-interval";
pub const LABEL_WORKLOAD_LIVENESS_PROBE_TIMEOUT: &str = "kev.workload.liveness-probe-timeout";
pub const LABEL_WORKLOAD_LIVENESS_PROBE_RETRIES: &str = "kev.workload.liveness-probe-retries";
pub const LABEL_WORKLOAD_LIVENESS_PROBE_INITIAL_DELAY: &str =
    "kev.workload.liveness-probe-initial-delay";

pub const LABEL_SERVICE_TYPE: &str = "kev.service.type";
pub const LABEL_SERVICE_NODE_PORT: &str = "kev.service.nodeport.port";
pub const LABEL_SERVICE_EXPOSE: &str = "kev.service.expose";

pub const LABEL_VOLUME_SIZE: &str = "kev.volume.size";
pub const LABEL_VOLUME_CLASS: &str = "kev.volume.class";
pub const LABEL_VOLUME_SELECTOR: &str = "kev.volume.selector";

/// Every label key kev recognises, in lexicographic order.
pub const KNOWN_LABELS: &[&str] = &[
    LABEL_SERVICE_EXPOSE,
    LABEL_SERVICE_NODE_PORT,
    LABEL_SERVICE_TYPE,
    LABEL_VOLUME_CLASS,
    LABEL_VOLUME_SELECTOR,
    LABEL_VOLUME_SIZE,
    LABEL_WORKLOAD_CPU,
    LABEL_WORKLOAD_IMAGE_PULL_POLICY,
    LABEL_WORKLOAD_LIVENESS_PROBE_COMMAND,
    LABEL_WORKLOAD_LIVENESS_PROBE_DISABLED,
    LABEL_WORKLOAD_LIVENESS_PROBE_INITIAL_DELAY,
    LABEL_WORKLOAD_LIVENESS_PROBE_INTERVAL,
    LABEL_WORKLOAD_LIVENESS_PROBE_RETRIES,
    LABEL_WORKLOAD_LIVENESS_PROBE_TIMEOUT,
    LABEL_WORKLOAD_MAX_CPU,
    LABEL_WORKLOAD_MAX_MEMORY,
    LABEL_WORKLOAD_MEMORY,
    LABEL_WORKLOAD_REPLICAS,
    LABEL_WORKLOAD_RESTART_POLICY,
    LABEL_WORKLOAD_SERVICE_ACCOUNT_NAME,
];

pub const DEFAULT_REPLICAS: &str = "1";
pub const DEFAULT_VOLUME_SIZE: &str = "100Mi";
pub const SERVICE_TYPE_CLUSTER_IP: &str = "ClusterIP";
pub const SERVICE_TYPE_NODE_PORT: &str = "NodePort";

/// Whether `key` belongs to the recognised vocabulary.
pub fn is_known_label(key: &str) -> bool {
    KNOWN_LABELS.binary_search(&key).is_ok()
}

/// Default labels for a base service.
///
/// Derived only from the service's own deploy, healthcheck and ports
/// configuration. `kev.*` labels declared directly on the service take
/// precedence over derived values; other labels are not carried.
pub fn service_default_labels(service: &ServiceConfig) -> Labels {
    let mut labels = Labels::new();

    let replicas = service
        .deploy
        .as_ref()
        .and_then(|d| d.replicas)
        .map(|r| r.to_string())
        .unwrap_or_else(|| DEFAULT_REPLICAS.to_string());
    labels.insert(LABEL_WORKLOAD_REPLICAS.to_string(), replicas);

    if let Some(deploy) = &service.deploy {
        if let Some(reservations) = &deploy.reservations {
            insert_some(&mut labels, LABEL_WORKLOAD_CPU, &reservations.cpus);
            insert_some(&mut labels, LABEL_WORKLOAD_MEMORY, &reservations.memory);
        }
        if let Some(limits) = &deploy.limits {
            insert_some(&mut labels, LABEL_WORKLOAD_MAX_CPU, &limits.cpus);
            insert_some(&mut labels, LABEL_WORKLOAD_MAX_MEMORY, &limits.memory);
        }
    }

    match &service.healthcheck {
        Some(hc) if hc.disable => {
            labels.insert(
                LABEL_WORKLOAD_LIVENESS_PROBE_DISABLED.to_string(),
                "true".to_string(),
            );
        }
        Some(hc) => {
            let command = if hc.test.is_empty() {
                placeholder_probe_command(&service.name)
            } else {
                render_probe_command(&hc.test)
            };
            labels.insert(LABEL_WORKLOAD_LIVENESS_PROBE_COMMAND.to_string(), command);
            insert_some(&mut labels, LABEL_WORKLOAD_LIVENESS_PROBE_INTERVAL, &hc.interval);
            insert_some(&mut labels, LABEL_WORKLOAD_LIVENESS_PROBE_TIMEOUT, &hc.timeout);
            insert_some(
                &mut labels,
                LABEL_WORKLOAD_LIVENESS_PROBE_RETRIES,
                &hc.retries.map(|r| r.to_string()),
            );
            insert_some(
                &mut labels,
                LABEL_WORKLOAD_LIVENESS_PROBE_INITIAL_DELAY,
                &hc.start_period,
            );
        }
        None => {
            labels.insert(
                LABEL_WORKLOAD_LIVENESS_PROBE_COMMAND.to_string(),
                placeholder_probe_command(&service.name),
            );
        }
    }

    if !service.ports.is_empty() {
        let host_mode = service
            .ports
            .iter()
            .any(|p| p.mode.as_deref() == Some("host"));
        let kind = if host_mode {
            SERVICE_TYPE_NODE_PORT
        } else {
            SERVICE_TYPE_CLUSTER_IP
        };
        labels.insert(LABEL_SERVICE_TYPE.to_string(), kind.to_string());
    }

    for (key, value) in &service.labels {
        if key.starts_with(LABEL_PREFIX) {
            labels.insert(key.clone(), value.clone());
        }
    }

    labels
}

/// Default labels for a base volume.
pub fn volume_default_labels(volume: &VolumeConfig) -> Labels {
    let mut labels = Labels::new();
    labels.insert(LABEL_VOLUME_SIZE.to_string(), DEFAULT_VOLUME_SIZE.to_string());
    for (key, value) in &volume.labels {
        if key.starts_with(LABEL_PREFIX) {
            labels.insert(key.clone(), value.clone());
        }
    }
    labels
}

/// Render a probe command list as `["CMD", "curl", "localhost"]`.
pub fn render_probe_command(test: &[String]) -> String {
    let quoted: Vec<String> = test
        .iter()
        .map(|part| format!("\"{}\"", part.replace('\\', "\\\\").replace('"', "\\\"")))
        .collect();
    format!("[{}]", quoted.join(", "))
}

fn placeholder_probe_command(service: &str) -> String {
    render_probe_command(&[
        "CMD".to_string(),
        "echo".to_string(),
        format!("Define healthcheck command for service {}", service),
    ])
}

fn insert_some(labels: &mut Labels, key: &str, value: &Option<String>) {
    if let Some(value) = value {
        labels.insert(key.to_string(), value.clone());
    }
}

/// Render the scaffolding for an environment's `config.yaml`.
///
/// Every section is an empty mapping with a comment pointing at what it
/// overrides. One component section is generated per base service.
pub fn env_config_scaffold(base: &Project) -> String {
    let mut out = String::new();
    out.push_str("workload: {} # Override global workload settings here.\n");
    out.push_str("service: {} # Override global service settings here.\n");
    out.push_str("volumes: {} # Override global volumes settings here.\n");
    if base.services.is_empty() {
        out.push_str("components: {}\n");
    } else {
        out.push_str("components:\n");
        for name in base.services.keys() {
            out.push_str(&format!(
                "  {}: {{}} # Override the {} service settings here.\n",
                yaml_key(name),
                name
            ));
        }
    }
    out
}

/// Quote a mapping key when plain YAML would misread it.
fn yaml_key(key: &str) -> String {
    let plain = key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.');
    if plain && !key.is_empty() {
        key.to_string()
    } else {
        format!("\"{}\"", key.replace('"', "\\\""))
    }
}
