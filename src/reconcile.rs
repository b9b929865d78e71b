//! # Reconciler
//!
//! Brings every environment under a working root in line with the base
//! compose document.
//!
//! ## Process
//!
//! 1.  **Discover**: every non-hidden subdirectory of the root is an
//!     environment, taken in lexicographic order.
//!
//! 2.  **Load**: the base compose document is projected once with derived
//!     default labels. Each environment's override document is projected
//!     verbatim; a missing override is an empty overlay, so every base entity
//!     becomes a `Create`.
//!
//! 3.  **Patch**: for each environment, `diff(environment, base)` feeds a
//!     [`Changeset`] into the [`Patcher`]. Environments are independent and
//!     run in parallel, each owning its overlay and report buffer; the base
//!     overlay is shared read-only.
//!
//! 4.  **Assemble**: results are joined in directory order into a
//!     [`Manifest`], and report lines are forwarded to the caller's
//!     [`Reporter`] in that same order.
//!
//! A failing environment never stops the others. Invalid documents are
//! collected per environment and surface as [`Error::Reconcile`]; internal
//! errors ([`Error::is_internal`]) propagate as they are.
//!
//! Nothing is written here: persisting a [`Manifest`] is the job of
//! [`crate::write`].

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use rayon::prelude::*;
use serde::Serialize;

use crate::changeset::Changeset;
use crate::compose::Project;
use crate::defaults;
use crate::error::{EnvironmentFailure, Error, Result};
use crate::overlay::{project, project_base, Overlay};
use crate::patch::{PatchOutcome, Patcher};
use crate::report::{LogReporter, MemoryReporter, Reporter};

/// One reconciled environment.
#[derive(Debug, Clone, Serialize)]
pub struct Environment {
    /// Environment name, the name of its directory.
    pub name: String,
    /// Where the override document lives.
    pub override_path: PathBuf,
    /// The reconciled overlay.
    pub overlay: Overlay,
    /// Whether the overlay differs from what was on disk.
    pub changed: bool,
    #[serde(skip)]
    pub outcome: PatchOutcome,
    /// Report lines produced for this environment.
    pub report: Vec<String>,
}

impl Environment {
    /// The reconciled overlay materialised as a compose project.
    pub fn project(&self) -> Project {
        self.overlay.to_project()
    }

    /// Number of applied changes.
    pub fn applied(&self) -> usize {
        self.outcome.applied.len()
    }

    /// Number of changes skipped to keep a local value.
    pub fn kept(&self) -> usize {
        self.outcome.kept.len()
    }
}

/// All reconciled environments of a working root, in directory order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Manifest {
    environments: Vec<Environment>,
}

impl Manifest {
    pub fn new(environments: Vec<Environment>) -> Self {
        Self { environments }
    }

    /// Look up an environment by name.
    pub fn get_environment(&self, name: &str) -> Option<&Environment> {
        self.environments.iter().find(|env| env.name == name)
    }

    pub fn environments(&self) -> &[Environment] {
        &self.environments
    }

    /// Environment names in directory order.
    pub fn names(&self) -> Vec<&str> {
        self.environments.iter().map(|env| env.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.environments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.environments.is_empty()
    }

    /// Environments whose overlay changed.
    pub fn changed(&self) -> impl Iterator<Item = &Environment> {
        self.environments.iter().filter(|env| env.changed)
    }

    /// Every report line, environment by environment.
    pub fn report(&self) -> impl Iterator<Item = &str> {
        self.environments
            .iter()
            .flat_map(|env| env.report.iter().map(String::as_str))
    }
}

impl<'a> IntoIterator for &'a Manifest {
    type Item = &'a Environment;
    type IntoIter = std::slice::Iter<'a, Environment>;

    fn into_iter(self) -> Self::IntoIter {
        self.environments.iter()
    }
}

/// Result of a best-effort run: the environments that reconciled plus the
/// ones that did not.
#[derive(Debug, Default)]
pub struct ReconcileRun {
    pub manifest: Manifest,
    pub failed: Vec<EnvironmentFailure>,
}

impl ReconcileRun {
    /// Fold failures into [`Error::Reconcile`].
    pub fn into_result(self) -> Result<Manifest> {
        if self.failed.is_empty() {
            return Ok(self.manifest);
        }
        Err(Error::Reconcile {
            failed: self.failed,
            succeeded: self
                .manifest
                .names()
                .into_iter()
                .map(str::to_string)
                .collect(),
        })
    }
}

/// Reconciles the environments of one working root.
#[derive(Debug, Clone)]
pub struct Reconciler {
    root: PathBuf,
    previous_base: Option<Project>,
}

impl Reconciler {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            previous_base: None,
        }
    }

    /// Use the base as it was at the previous reconciliation as the
    /// baseline for override detection.
    ///
    /// Without it the baseline is reconstructed from the current base, so
    /// any label or variable value that differs from the base is treated as
    /// a local override.
    pub fn with_previous_base(mut self, previous: Project) -> Self {
        self.previous_base = Some(previous);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Load the base compose document.
    pub fn load_base(&self) -> Result<Project> {
        let path = defaults::find_base_compose(&self.root).ok_or_else(|| Error::NoBaseCompose {
            root: self.root.clone(),
        })?;
        debug!("Loading base compose file {}", path.display());
        Project::from_file(&path)
    }

    /// Environment names under the root.
    pub fn environments(&self) -> Result<Vec<String>> {
        discover_environments(&self.root)
    }

    /// Reconcile every environment, failing if any of them failed.
    pub fn reconcile(&self, reporter: &mut dyn Reporter) -> Result<Manifest> {
        self.run(reporter)?.into_result()
    }

    /// Reconcile every environment, keeping the successful ones when some
    /// fail.
    ///
    /// Errors only when the base cannot be loaded, the root cannot be
    /// listed, or an internal error occurs.
    pub fn run(&self, reporter: &mut dyn Reporter) -> Result<ReconcileRun> {
        let base = self.load_base()?;
        let source = project_base(&base)?;
        let baseline = match &self.previous_base {
            Some(previous) => project_base(previous)?,
            None => source.clone(),
        };

        let names = self.environments()?;
        info!(
            "Reconciling {} environment(s) in {}",
            names.len(),
            self.root.display()
        );

        let results: Vec<(String, Result<Environment>)> = names
            .par_iter()
            .map(|name| {
                let result = self.reconcile_environment(name, &source, &baseline);
                (name.clone(), result)
            })
            .collect();

        let mut run = ReconcileRun::default();
        for (name, result) in results {
            match result {
                Ok(env) => {
                    for line in &env.report {
                        reporter.report(line);
                    }
                    run.manifest.environments.push(env);
                }
                Err(err) if err.is_internal() => return Err(err),
                Err(err) => {
                    warn!("Skipping environment {}: {}", name, err);
                    run.failed.push(EnvironmentFailure {
                        name,
                        error: Box::new(err),
                    });
                }
            }
        }

        Ok(run)
    }

    fn reconcile_environment(
        &self,
        name: &str,
        source: &Overlay,
        baseline: &Overlay,
    ) -> Result<Environment> {
        let override_path = defaults::override_path(&self.root, name);
        let current = if override_path.is_file() {
            project(&Project::from_file(&override_path)?)?
        } else {
            debug!("{}: no override document, starting from scratch", name);
            Overlay::default()
        };

        let changeset = Changeset::between(&current, source)?;
        let mut overlay = current.clone();
        let mut lines = MemoryReporter::new();
        let patcher = Patcher::new(name, source, baseline);
        let outcome = patcher.apply(&changeset, &mut overlay, &mut lines)?;

        Ok(Environment {
            name: name.to_string(),
            override_path,
            changed: overlay != current,
            overlay,
            outcome,
            report: lines.into_lines(),
        })
    }
}

/// Reconcile every environment under `root`, reporting through the `log`
/// facade.
pub fn reconcile(root: &Path) -> Result<Manifest> {
    Reconciler::new(root).reconcile(&mut LogReporter)
}

/// Names of the environment directories under `root`, sorted.
pub fn discover_environments(root: &Path) -> Result<Vec<String>> {
    let entries = fs::read_dir(root).map_err(|e| Error::Filesystem {
        message: format!("Failed to read directory '{}': {}", root.display(), e),
    })?;

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        // Non UTF-8 directory names cannot be environments.
        if let Ok(name) = entry.file_name().into_string() {
            if defaults::is_environment_name(&name) {
                names.push(name);
            }
        }
    }
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LABEL_SERVICE_TYPE, LABEL_WORKLOAD_REPLICAS};
    use crate::report::NullReporter;
    use tempfile::TempDir;

    const BASE: &str = r#"
version: "3.7"
services:
  db:
    image: mysql:5.7
    environment:
      MYSQL_DATABASE: wordpress
  wordpress:
    image: wordpress:latest
    deploy:
      replicas: 2
    ports:
      - "8000:80"
volumes:
  db_data: {}
"#;

    fn workspace(base: &str, envs: &[&str]) -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("docker-compose.yaml"), base).unwrap();
        for env in envs {
            fs::create_dir(temp_dir.path().join(env)).unwrap();
        }
        temp_dir
    }

    fn write_override(root: &Path, env: &str, content: &str) {
        fs::write(defaults::override_path(root, env), content).unwrap();
    }

    #[test]
    fn test_discover_environments_sorted_and_filtered() {
        let temp_dir = workspace(BASE, &["prod", "dev", ".git", "stage"]);
        fs::write(temp_dir.path().join("notes.txt"), "x").unwrap();

        let names = discover_environments(temp_dir.path()).unwrap();
        assert_eq!(names, vec!["dev", "prod", "stage"]);
    }

    #[test]
    fn test_missing_base_compose() {
        let temp_dir = TempDir::new().unwrap();
        let err = Reconciler::new(temp_dir.path())
            .reconcile(&mut NullReporter)
            .unwrap_err();
        assert!(matches!(err, Error::NoBaseCompose { .. }));
    }

    #[test]
    fn test_first_reconciliation_creates_everything() {
        let temp_dir = workspace(BASE, &["dev"]);
        let mut reporter = MemoryReporter::new();
        let manifest = Reconciler::new(temp_dir.path())
            .reconcile(&mut reporter)
            .unwrap();

        let dev = manifest.get_environment("dev").unwrap();
        assert!(dev.changed);
        assert_eq!(dev.overlay.version.as_deref(), Some("3.7"));
        assert_eq!(dev.overlay.services["wordpress"].labels[LABEL_WORKLOAD_REPLICAS], "2");
        assert!(dev.overlay.services["db"].environment.is_empty());
        assert!(dev.overlay.volumes.contains_key("db_data"));
        assert_eq!(
            reporter.lines(),
            [
                "dev: added version 3.7",
                "dev: added service db",
                "dev: added service wordpress",
                "dev: added volume db_data",
            ]
        );
    }

    #[test]
    fn test_manifest_keeps_directory_order() {
        let temp_dir = workspace(BASE, &["stage", "dev", "prod"]);
        let manifest = reconcile(temp_dir.path()).unwrap();
        assert_eq!(manifest.names(), vec!["dev", "prod", "stage"]);
        assert_eq!(manifest.len(), 3);
    }

    #[test]
    fn test_report_lines_follow_directory_order() {
        let temp_dir = workspace("version: '3.7'\n", &["b", "a", "c"]);
        let mut reporter = MemoryReporter::new();
        Reconciler::new(temp_dir.path())
            .reconcile(&mut reporter)
            .unwrap();
        assert_eq!(
            reporter.lines(),
            ["a: added version 3.7", "b: added version 3.7", "c: added version 3.7"]
        );
    }

    #[test]
    fn test_invalid_override_fails_only_that_environment() {
        let temp_dir = workspace(BASE, &["dev", "prod"]);
        write_override(temp_dir.path(), "prod", "services: [not, a, mapping]\n");

        let run = Reconciler::new(temp_dir.path())
            .run(&mut NullReporter)
            .unwrap();
        assert_eq!(run.manifest.names(), vec!["dev"]);
        assert_eq!(run.failed.len(), 1);
        assert_eq!(run.failed[0].name, "prod");

        let err = run.into_result().unwrap_err();
        let display = err.to_string();
        assert!(display.contains("prod"));
        assert!(display.contains("reconciled: dev"));
    }

    #[test]
    fn test_second_run_is_idempotent() {
        let temp_dir = workspace(BASE, &["dev"]);
        let first = reconcile(temp_dir.path()).unwrap();
        let dev = first.get_environment("dev").unwrap();
        fs::write(&dev.override_path, dev.overlay.render().unwrap()).unwrap();

        let mut reporter = MemoryReporter::new();
        let second = Reconciler::new(temp_dir.path())
            .reconcile(&mut reporter)
            .unwrap();
        let dev_again = second.get_environment("dev").unwrap();
        assert!(!dev_again.changed);
        assert_eq!(dev_again.overlay, dev.overlay);
        assert_eq!(reporter.lines(), ["dev: nothing to update"]);
    }

    #[test]
    fn test_customised_label_survives_version_bump() {
        let temp_dir = workspace(&BASE.replace("3.7", "3.8"), &["dev"]);
        let mut customised = project_base(&Project::from_str(BASE).unwrap()).unwrap();
        customised
            .services
            .get_mut("wordpress")
            .unwrap()
            .labels
            .insert(LABEL_SERVICE_TYPE.to_string(), "LoadBalancer".to_string());
        write_override(temp_dir.path(), "dev", &customised.render().unwrap());

        let mut reporter = MemoryReporter::new();
        let manifest = Reconciler::new(temp_dir.path())
            .reconcile(&mut reporter)
            .unwrap();

        let dev = manifest.get_environment("dev").unwrap();
        assert_eq!(dev.overlay.version.as_deref(), Some("3.8"));
        assert_eq!(dev.overlay.services["wordpress"].labels[LABEL_SERVICE_TYPE], "LoadBalancer");
        let text = reporter.text();
        assert!(text.contains("dev: updated version 3.7 -> 3.8"));
        assert!(text.contains("nothing to update for service wordpress label kev.service.type"));
    }

    #[test]
    fn test_previous_base_lets_untouched_defaults_follow_upstream() {
        let previous = Project::from_str(BASE).unwrap();
        let temp_dir = workspace(&BASE.replace("replicas: 2", "replicas: 4"), &["dev", "prod"]);

        let dev = project_base(&previous).unwrap();
        write_override(temp_dir.path(), "dev", &dev.render().unwrap());
        let mut prod = dev.clone();
        prod.services
            .get_mut("wordpress")
            .unwrap()
            .labels
            .insert(LABEL_WORKLOAD_REPLICAS.to_string(), "10".to_string());
        write_override(temp_dir.path(), "prod", &prod.render().unwrap());

        let manifest = Reconciler::new(temp_dir.path())
            .with_previous_base(previous)
            .reconcile(&mut NullReporter)
            .unwrap();

        let replicas = |env: &str| {
            manifest.get_environment(env).unwrap().overlay.services["wordpress"].labels
                [LABEL_WORKLOAD_REPLICAS]
                .clone()
        };
        assert_eq!(replicas("dev"), "4");
        assert_eq!(replicas("prod"), "10");
    }

    #[test]
    fn test_version_text_survives_reconciliation() {
        let temp_dir = workspace(&BASE.replace("\"3.7\"", "3.10"), &["dev"]);
        let manifest = reconcile(temp_dir.path()).unwrap();

        let dev = manifest.get_environment("dev").unwrap();
        assert_eq!(dev.overlay.version.as_deref(), Some("3.10"));
        let rendered = dev.overlay.render().unwrap();
        assert!(rendered.contains("3.10"));
        assert!(!rendered.contains("3.1\n"));
    }

    #[test]
    fn test_environment_materialises_project() {
        let temp_dir = workspace(BASE, &["dev"]);
        let manifest = reconcile(temp_dir.path()).unwrap();
        let project = manifest.get_environment("dev").unwrap().project();
        assert_eq!(project.service_names(), vec!["db", "wordpress"]);
        assert!(project.service("db").unwrap().image.is_none());
    }
}
