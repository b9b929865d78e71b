//! # Changeset
//!
//! Groups differ output by category and indexes it by target: the version,
//! one service or one volume. The patch applier walks the targets in
//! application order (version, services, volumes) and looks up everything
//! that concerns one target without rescanning the whole list.
//!
//! Entries keep the differ's canonical order inside every view.

use std::collections::{BTreeMap, HashMap};

use crate::diff::{diff, Category, ChangeEntry, FieldPath};
use crate::error::Result;
use crate::overlay::Overlay;

/// What a change entry belongs to.
///
/// The derived ordering is the order changes are applied in: the version
/// first, then services, then volumes, each by name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Target {
    Version,
    Service(String),
    Volume(String),
}

impl Target {
    /// The target a path belongs to.
    pub fn of(path: &FieldPath) -> Self {
        match path {
            FieldPath::Version => Target::Version,
            FieldPath::Service { name } => Target::Service(name.clone()),
            FieldPath::ServiceLabel { service, .. } | FieldPath::ServiceEnv { service, .. } => {
                Target::Service(service.clone())
            }
            FieldPath::Volume { name } => Target::Volume(name.clone()),
            FieldPath::VolumeLabel { volume, .. } => Target::Volume(volume.clone()),
        }
    }
}

/// Categorised list of changes between two overlays.
#[derive(Debug, Clone, Default)]
pub struct Changeset {
    entries: Vec<ChangeEntry>,
    by_category: HashMap<Category, Vec<usize>>,
    by_target: BTreeMap<Target, Vec<usize>>,
}

impl Changeset {
    /// Build a changeset from differ output.
    pub fn build(entries: Vec<ChangeEntry>) -> Self {
        let mut by_category: HashMap<Category, Vec<usize>> = HashMap::new();
        let mut by_target: BTreeMap<Target, Vec<usize>> = BTreeMap::new();

        for (idx, entry) in entries.iter().enumerate() {
            by_category.entry(entry.category()).or_default().push(idx);
            by_target.entry(Target::of(&entry.path)).or_default().push(idx);
        }

        Self {
            entries,
            by_category,
            by_target,
        }
    }

    /// Diff two overlays and build the resulting changeset.
    pub fn between(from: &Overlay, to: &Overlay) -> Result<Self> {
        Ok(Self::build(diff(from, to)?))
    }

    /// Every entry in canonical order.
    pub fn entries(&self) -> &[ChangeEntry] {
        &self.entries
    }

    /// Entries of one category, in canonical order.
    pub fn category(&self, category: Category) -> impl Iterator<Item = &ChangeEntry> + '_ {
        self.indexed(self.by_category.get(&category))
    }

    /// Targets with at least one entry, in application order.
    pub fn targets(&self) -> impl Iterator<Item = &Target> + '_ {
        self.by_target.keys()
    }

    /// Entries that concern one target, in canonical order.
    pub fn for_target<'a>(&'a self, target: &Target) -> impl Iterator<Item = &'a ChangeEntry> + 'a {
        self.indexed(self.by_target.get(target))
    }

    /// The version change, if any.
    pub fn version(&self) -> Option<&ChangeEntry> {
        self.for_target(&Target::Version).next()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn indexed<'a>(
        &'a self,
        indices: Option<&'a Vec<usize>>,
    ) -> impl Iterator<Item = &'a ChangeEntry> + 'a {
        indices
            .into_iter()
            .flatten()
            .map(move |&idx| &self.entries[idx])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::Operation;
    use crate::overlay::{ServiceOverlay, VolumeOverlay};

    fn sample() -> (Overlay, Overlay) {
        let mut from = Overlay {
            version: Some("3.6".to_string()),
            ..Default::default()
        };
        let mut db = ServiceOverlay::default();
        db.labels.insert("kev.workload.replicas".to_string(), "1".to_string());
        db.environment.insert("A".to_string(), Some("1".to_string()));
        from.services.insert("db".to_string(), db.clone());
        from.services.insert("wordpress".to_string(), ServiceOverlay::default());
        from.volumes.insert("db_data".to_string(), VolumeOverlay::default());

        let mut to = Overlay {
            version: Some("3.7".to_string()),
            ..Default::default()
        };
        db.labels.insert("kev.workload.replicas".to_string(), "2".to_string());
        db.environment.remove("A");
        to.services.insert("db".to_string(), db);
        to.volumes.insert("mysql_data".to_string(), VolumeOverlay::default());

        (from, to)
    }

    #[test]
    fn test_partition_by_category() {
        let (from, to) = sample();
        let cset = Changeset::between(&from, &to).unwrap();

        assert_eq!(cset.len(), 6);
        assert_eq!(cset.version().unwrap().operation, Operation::Update);
        assert_eq!(cset.category(Category::Label).count(), 1);
        assert_eq!(cset.category(Category::EnvVar).count(), 1);
        assert_eq!(cset.category(Category::Service).count(), 1);
        assert_eq!(cset.category(Category::Volume).count(), 2);
    }

    #[test]
    fn test_targets_in_application_order() {
        let (from, to) = sample();
        let cset = Changeset::between(&from, &to).unwrap();

        let targets: Vec<&Target> = cset.targets().collect();
        assert_eq!(
            targets,
            vec![
                &Target::Version,
                &Target::Service("db".to_string()),
                &Target::Service("wordpress".to_string()),
                &Target::Volume("db_data".to_string()),
                &Target::Volume("mysql_data".to_string()),
            ]
        );
    }

    #[test]
    fn test_lookup_by_target() {
        let (from, to) = sample();
        let cset = Changeset::between(&from, &to).unwrap();

        let db: Vec<String> = cset
            .for_target(&Target::Service("db".to_string()))
            .map(|e| e.path.to_string())
            .collect();
        assert_eq!(
            db,
            vec!["services.db.labels.kev.workload.replicas", "services.db.environment.A"]
        );
        assert_eq!(cset.for_target(&Target::Service("cache".to_string())).count(), 0);
        assert_eq!(cset.for_target(&Target::Version).count(), 1);
    }

    #[test]
    fn test_service_and_volume_with_same_name_stay_apart() {
        let mut from = Overlay::default();
        let mut to = Overlay::default();
        let mut service = ServiceOverlay::default();
        service.labels.insert("kev.workload.replicas".to_string(), "1".to_string());
        let mut volume = VolumeOverlay::default();
        volume.labels.insert("kev.volume.size".to_string(), "1Gi".to_string());
        from.services.insert("data".to_string(), service.clone());
        from.volumes.insert("data".to_string(), volume.clone());
        service.labels.insert("kev.workload.replicas".to_string(), "2".to_string());
        volume.labels.insert("kev.volume.size".to_string(), "2Gi".to_string());
        to.services.insert("data".to_string(), service);
        to.volumes.insert("data".to_string(), volume);

        let cset = Changeset::between(&from, &to).unwrap();
        assert_eq!(cset.for_target(&Target::Service("data".to_string())).count(), 1);
        assert_eq!(cset.for_target(&Target::Volume("data".to_string())).count(), 1);
    }

    #[test]
    fn test_empty_changeset() {
        let (from, _) = sample();
        let cset = Changeset::between(&from, &from).unwrap();
        assert!(cset.is_empty());
        assert!(cset.version().is_none());
    }
}
