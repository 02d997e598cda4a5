//! Property-based tests for pattern lists, leaf ordering and propagation.
//!
//! These tests use proptest to generate random manifests and diffs and check
//! that the invariants hold for all of them.

#[cfg(test)]
mod proptest_tests {
    use crate::diff::{propagate, ChangeKind, DiffSet};
    use crate::manifest::parse;
    use crate::ordered_set::OrderedSet;
    use crate::pattern::{PatternList, Verdict};
    use proptest::prelude::*;

    // ============================================================================
    // Pattern override
    // ============================================================================

    /// (exclusion, kind) where kind 0 = literal, 1 = matching wildcard, 2 = unrelated
    fn raw_pattern(name: &str, negate: bool, kind: u8) -> String {
        let glob = match kind {
            0 => format!("src/{}", name),
            1 => "src/*.js".to_string(),
            _ => "lib/*.js".to_string(),
        };
        if negate {
            format!("!{}", glob)
        } else {
            glob
        }
    }

    proptest! {
        /// Property: the verdict of a path is the verdict of the last pattern matching it
        #[test]
        fn last_matching_pattern_wins(
            name in "[a-z]{1,8}\\.js",
            entries in prop::collection::vec((any::<bool>(), 0u8..3), 0..12),
        ) {
            let raw: Vec<String> = entries
                .iter()
                .map(|(negate, kind)| raw_pattern(&name, *negate, *kind))
                .collect();
            let list = PatternList::from_raw(raw.as_slice());
            let path = format!("src/{}", name);

            let expected = entries
                .iter()
                .rev()
                .find(|(_, kind)| *kind != 2)
                .map(|(negate, _)| if *negate { Verdict::Exclude } else { Verdict::Include });

            prop_assert_eq!(list.verdict(&path), expected);
            prop_assert_eq!(list.includes(&path), expected == Some(Verdict::Include));
        }

        /// Property: an ordered set behaves like a vector without duplicates
        #[test]
        fn ordered_set_matches_model(ops in prop::collection::vec((any::<bool>(), 0u8..6), 0..40)) {
            let mut set = OrderedSet::new();
            let mut model: Vec<u8> = Vec::new();
            for (insert, item) in ops {
                if insert {
                    if !model.contains(&item) {
                        model.push(item);
                    }
                    set.insert(item);
                } else {
                    model.retain(|x| *x != item);
                    set.remove(&item);
                }
            }
            prop_assert_eq!(set.into_vec(), model);
        }
    }

    // ============================================================================
    // Propagation
    // ============================================================================

    /// A manifest with `count` bundles, each optionally nesting the next one.
    fn chain_manifest(count: usize, nests: &[bool]) -> String {
        let entries: Vec<String> = (0..count)
            .map(|i| {
                let mut patterns = vec![format!("\"src/m{}/*.js\"", i)];
                if i + 1 < count && nests[i] {
                    patterns.push(format!("\"b{}.js\"", i + 1));
                }
                format!("\"b{}.js\": [{}]", i, patterns.join(", "))
            })
            .collect();
        format!("{{\"pkg\": {{{}}}}}", entries.join(", "))
    }

    proptest! {
        /// Property: propagation is idempotent and yields no phantom entries
        #[test]
        fn propagation_is_closed_and_idempotent(
            nests in prop::collection::vec(any::<bool>(), 6),
            touched in prop::collection::vec((0usize..6, 0u8..3), 0..8),
        ) {
            let config = parse(&chain_manifest(6, &nests)).unwrap();
            let mut diff = DiffSet::new();
            for (module, kind) in &touched {
                let kind = match *kind {
                    0 => ChangeKind::Added,
                    1 => ChangeKind::Modified,
                    _ => ChangeKind::Deleted,
                };
                diff.insert(format!("src/m{}/f.js", module), kind);
            }

            let raw = diff.clone();
            propagate(&mut diff, &config, None);
            for (path, kind) in diff.iter() {
                match raw.get(path) {
                    // Changed sources keep their own kind
                    Some(original) => prop_assert_eq!(kind, original),
                    None => {
                        prop_assert!(config.is_bundle(path), "phantom bundle {}", path);
                        prop_assert_eq!(kind, ChangeKind::Affected);
                    }
                }
            }
            for path in raw.paths() {
                prop_assert!(diff.contains(path), "matched source {} was dropped", path);
            }

            // Every bundle nesting an affected bundle is affected too
            for i in 1..6 {
                if nests[i - 1] && diff.contains(&format!("b{}.js", i)) {
                    let parent = format!("b{}.js", i - 1);
                    prop_assert!(diff.contains(&parent));
                }
            }

            let once = diff.clone();
            propagate(&mut diff, &config, None);
            prop_assert_eq!(diff, once);
        }
    }
}
