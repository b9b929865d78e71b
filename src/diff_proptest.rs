//! Property-based tests for the differ and the patch applier.
//!
//! Overlays are generated from small key alphabets so that generated pairs
//! share services, labels and variables often enough to exercise updates.

#[cfg(test)]
mod proptest_tests {
    use std::collections::BTreeMap;

    use crate::changeset::Changeset;
    use crate::diff::{diff, Operation};
    use crate::overlay::{Overlay, ServiceOverlay, VolumeOverlay};
    use crate::patch::Patcher;
    use crate::report::{MemoryReporter, NullReporter};
    use proptest::prelude::*;

    fn labels() -> impl Strategy<Value = BTreeMap<String, String>> {
        prop::collection::btree_map("k[0-2]", "[xy]", 0..3)
    }

    fn service() -> impl Strategy<Value = ServiceOverlay> {
        (
            labels(),
            prop::collection::btree_map("E[0-2]", prop::option::of("[xy]"), 0..3),
        )
            .prop_map(|(labels, environment)| ServiceOverlay { labels, environment })
    }

    fn overlay() -> impl Strategy<Value = Overlay> {
        (
            prop::option::of("3\\.[6-8]"),
            prop::collection::btree_map("s[a-c]", service(), 0..3),
            prop::collection::btree_map(
                "v[ab]",
                labels().prop_map(|labels| VolumeOverlay { labels }),
                0..2,
            ),
        )
            .prop_map(|(version, services, volumes)| Overlay {
                version,
                services,
                volumes,
            })
    }

    // ============================================================================
    // diff property tests
    // ============================================================================

    proptest! {
        /// Property: an overlay never differs from itself
        #[test]
        fn diff_with_self_is_empty(a in overlay()) {
            prop_assert!(diff(&a, &a).unwrap().is_empty());
        }

        /// Property: diff is deterministic (same inputs = same entries)
        #[test]
        fn diff_is_deterministic(a in overlay(), b in overlay()) {
            prop_assert_eq!(diff(&a, &b).unwrap(), diff(&a, &b).unwrap());
        }

        /// Property: swapping the sides swaps Create and Delete and the values
        #[test]
        fn diff_is_symmetric(a in overlay(), b in overlay()) {
            let forward = diff(&a, &b).unwrap();
            let backward = diff(&b, &a).unwrap();
            prop_assert_eq!(forward.len(), backward.len());

            for (f, r) in forward.iter().zip(backward.iter()) {
                prop_assert_eq!(&f.path, &r.path);
                let expected = match f.operation {
                    Operation::Create => Operation::Delete,
                    Operation::Delete => Operation::Create,
                    Operation::Update => Operation::Update,
                };
                prop_assert_eq!(r.operation, expected);
                prop_assert_eq!(&f.previous, &r.new);
                prop_assert_eq!(&f.new, &r.previous);
            }
        }

        /// Property: no entry is emitted for equal values
        #[test]
        fn diff_updates_always_change_value(a in overlay(), b in overlay()) {
            for entry in diff(&a, &b).unwrap() {
                if entry.operation == Operation::Update {
                    prop_assert_ne!(entry.previous, entry.new);
                }
            }
        }
    }

    // ============================================================================
    // patch property tests
    // ============================================================================

    proptest! {
        /// Property: without local customisation the destination converges on
        /// the source's version, entities and labels
        #[test]
        fn patch_converges_without_customisation(dest in overlay(), source in overlay()) {
            let mut patched = dest.clone();
            let changeset = Changeset::between(&dest, &source).unwrap();
            Patcher::new("env", &source, &dest)
                .apply(&changeset, &mut patched, &mut NullReporter)
                .unwrap();

            prop_assert_eq!(&patched.version, &source.version);
            prop_assert_eq!(
                patched.services.keys().collect::<Vec<_>>(),
                source.services.keys().collect::<Vec<_>>()
            );
            for (name, service) in &patched.services {
                let upstream = &source.services[name];
                prop_assert_eq!(&service.labels, &upstream.labels);
                for (key, value) in &service.environment {
                    prop_assert_eq!(upstream.environment.get(key), Some(value));
                }
            }
            prop_assert_eq!(
                patched.volumes.keys().collect::<Vec<_>>(),
                source.volumes.keys().collect::<Vec<_>>()
            );
        }

        /// Property: a second pass against the same source applies nothing
        #[test]
        fn patch_is_idempotent(dest in overlay(), source in overlay()) {
            let mut patched = dest.clone();
            let first = Changeset::between(&dest, &source).unwrap();
            Patcher::new("env", &source, &source)
                .apply(&first, &mut patched, &mut NullReporter)
                .unwrap();
            let after_first = patched.clone();

            let second = Changeset::between(&patched, &source).unwrap();
            let mut reporter = MemoryReporter::new();
            let outcome = Patcher::new("env", &source, &source)
                .apply(&second, &mut patched, &mut reporter)
                .unwrap();

            prop_assert!(outcome.applied.is_empty());
            prop_assert_eq!(patched, after_first);
            let last = reporter.lines().last().map(String::as_str);
            prop_assert_eq!(last, Some("env: nothing to update"));
        }
    }
}
