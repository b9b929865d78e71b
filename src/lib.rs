//! # kev
//!
//! `kev` keeps per-environment compose override files in step with a single
//! base compose file. Each environment (`dev`, `stage`, `prod`, ...) owns an
//! override document carrying deployment labels and environment variables;
//! when the base changes, reconciliation propagates the structural changes
//! into every environment while keeping values the environment deliberately
//! overrides.
//!
//! ## Quick Example
//!
//! ```
//! use kev::compose::Project;
//! use kev::overlay::{project, project_base};
//! use kev::changeset::Changeset;
//! use kev::patch::Patcher;
//! use kev::report::MemoryReporter;
//!
//! let base = project_base(&Project::from_str(
//!     "version: '3.7'\nservices:\n  db:\n    deploy:\n      replicas: 2\n",
//! ).unwrap()).unwrap();
//! let mut dev = project(&Project::from_str("version: '3.6'\n").unwrap()).unwrap();
//!
//! let changes = Changeset::between(&dev, &base).unwrap();
//! let mut report = MemoryReporter::new();
//! Patcher::new("dev", &base, &base).apply(&changes, &mut dev, &mut report).unwrap();
//!
//! assert_eq!(dev.version.as_deref(), Some("3.7"));
//! assert_eq!(dev.services["db"].labels["kev.workload.replicas"], "2");
//! assert_eq!(report.lines(), ["dev: updated version 3.6 -> 3.7", "dev: added service db"]);
//! ```
//!
//! ## Core Concepts
//!
//! - **Project (`compose`)**: the typed subset of a compose document kev reads.
//! - **Overlay (`overlay`)**: version, labels and environment variables of a
//!   project; the only part reconciliation compares or changes. Default
//!   labels for the base are derived in `config`.
//! - **Diff and Changeset (`diff`, `changeset`)**: path-addressed
//!   Create/Update/Delete entries between two overlays, grouped by category.
//! - **Patch (`patch`)**: applies a changeset with per-field policies, so
//!   versions follow the base, entities mirror the base, and local values
//!   survive.
//! - **Reconcile (`reconcile`, `write`)**: runs the above for every
//!   environment under a root and persists the result.
//!
//! ## Execution Flow
//!
//! 1.  **Discovery**: every non-hidden subdirectory of the root is an environment.
//! 2.  **Projection**: the base is projected with derived default labels, each
//!     override verbatim.
//! 3.  **Diff**: `diff(environment, base)` for every environment.
//! 4.  **Patch**: policies applied in the order version, services, volumes;
//!     every applied change is reported.
//! 5.  **Write**: changed override documents are written back.

pub mod app;
pub mod changeset;
pub mod compose;
pub mod config;
pub mod defaults;
pub mod diff;
pub mod error;
pub mod output;
pub mod overlay;
pub mod patch;
pub mod reconcile;
pub mod report;
pub mod suggestions;
pub mod write;

#[cfg(test)]
mod diff_proptest;
