//! Differential property tests against `BTreeSet` as the ordering oracle.

mod common;

use std::collections::BTreeSet;

use proptest::prelude::*;

use common::Harness;
use wbtree::Tree;

#[derive(Debug, Clone, Copy)]
enum Op {
    Insert(i64),
    Delete(i64),
    Search(i64),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    let value = -20i64..20;
    prop_oneof![
        value.clone().prop_map(Op::Insert),
        value.clone().prop_map(Op::Delete),
        value.prop_map(Op::Search),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, ..ProptestConfig::default() })]

    #[test]
    fn matches_an_ordered_set_oracle(ops in prop::collection::vec(op_strategy(), 1..80)) {
        let harness = Harness::new();
        let tree = Tree::new();
        let mut oracle = BTreeSet::new();

        for op in ops {
            match op {
                Op::Insert(value) => {
                    let already = !oracle.insert(value);
                    let done = harness.insert(&tree, value);
                    prop_assert_eq!(done.matched(), already);
                }
                Op::Delete(value) => {
                    let present = oracle.remove(&value);
                    let done = harness.delete(&tree, value);
                    prop_assert_eq!(done.matched(), present);
                }
                Op::Search(value) => {
                    let done = harness.search(&tree, value);
                    prop_assert_eq!(done.matched(), oracle.contains(&value));
                    if oracle.contains(&value) {
                        prop_assert_eq!(harness.resolve(done.outcome().0), value);
                    }
                }
            }
            // Let delegated deletes and rebalances settle so outcomes stay
            // deterministic against the sequential oracle.
            harness.wait_idle();
        }

        prop_assert_eq!(harness.audit(&tree), oracle.len());
        prop_assert_eq!(harness.contents(&tree), oracle.iter().copied().collect::<Vec<_>>());
    }

    #[test]
    fn unique_inserts_scan_ascending(values in prop::collection::btree_set(-1000i64..1000, 0..64)
        .prop_map(|set| set.into_iter().collect::<Vec<_>>())
        .prop_shuffle())
    {
        let harness = Harness::new();
        let tree = Tree::new();

        let mut sorted = values.clone();
        sorted.sort_unstable();

        for value in values {
            let done = harness.insert(&tree, value);
            prop_assert!(!done.matched());
        }
        harness.wait_idle();

        prop_assert_eq!(harness.audit(&tree), sorted.len());
        prop_assert_eq!(harness.contents(&tree), sorted);
    }

    #[test]
    fn insert_delete_all_leaves_an_empty_tree(values in prop::collection::btree_set(0i64..500, 1..48)
        .prop_map(|set| set.into_iter().collect::<Vec<_>>())
        .prop_shuffle())
    {
        let harness = Harness::new();
        let tree = Tree::new();

        for &value in &values {
            harness.insert(&tree, value);
        }
        harness.wait_idle();
        for &value in &values {
            let done = harness.delete(&tree, value);
            prop_assert!(done.matched());
            harness.wait_idle();
        }

        prop_assert_eq!(harness.audit(&tree), 0);
        prop_assert!(harness.contents(&tree).is_empty());
    }
}
