//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check table invariants over random operation sequences.

use proptest::prelude::*;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::time::Duration;

use crate::cache::Table;
use crate::config::TableConfig;
use crate::error::CacheError;
use crate::tasks::ManualTimer;

// == Strategies ==
/// Generates table keys from a small alphabet so operations collide
fn key_strategy() -> impl Strategy<Value = String> {
    "[a-f]{1,2}"
}

fn value_strategy() -> impl Strategy<Value = u32> {
    any::<u32>()
}

#[derive(Debug, Clone)]
enum TableOp {
    Add { key: String, value: u32 },
    NotFoundAdd { key: String, value: u32 },
    Value { key: String },
    Delete { key: String },
    Flush,
}

fn table_op_strategy() -> impl Strategy<Value = TableOp> {
    prop_oneof![
        4 => (key_strategy(), value_strategy()).prop_map(|(key, value)| TableOp::Add { key, value }),
        2 => (key_strategy(), value_strategy())
            .prop_map(|(key, value)| TableOp::NotFoundAdd { key, value }),
        4 => key_strategy().prop_map(|key| TableOp::Value { key }),
        2 => key_strategy().prop_map(|key| TableOp::Delete { key }),
        1 => Just(TableOp::Flush),
    ]
}

fn manual_table() -> Table<String, u32> {
    Table::with_timer(&TableConfig::named("prop"), ManualTimer::new())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // The table agrees with a plain HashMap model for every operation that
    // does not depend on time.
    #[test]
    fn prop_matches_map_model(ops in prop::collection::vec(table_op_strategy(), 1..60)) {
        let table = manual_table();
        let mut model: HashMap<String, u32> = HashMap::new();

        for op in ops {
            match op {
                TableOp::Add { key, value } => {
                    table.add(key.clone(), Duration::ZERO, value);
                    model.insert(key, value);
                }
                TableOp::NotFoundAdd { key, value } => {
                    let inserted = table.not_found_add(key.clone(), Duration::ZERO, value);
                    prop_assert_eq!(inserted, !model.contains_key(&key));
                    model.entry(key).or_insert(value);
                }
                TableOp::Value { key } => match model.get(&key) {
                    Some(expected) => {
                        let item = table.value(&key).unwrap();
                        prop_assert_eq!(*item.value(), *expected);
                    }
                    None => {
                        prop_assert_eq!(table.value(&key).unwrap_err(), CacheError::KeyNotFound);
                    }
                },
                TableOp::Delete { key } => {
                    let result = table.delete(&key);
                    match model.remove(&key) {
                        Some(expected) => {
                            prop_assert_eq!(*result.unwrap().value(), expected);
                        }
                        None => {
                            prop_assert_eq!(result.unwrap_err(), CacheError::KeyNotFound);
                        }
                    }
                }
                TableOp::Flush => {
                    table.flush();
                    model.clear();
                }
            }
            prop_assert_eq!(table.count(), model.len());
        }

        for key in model.keys() {
            prop_assert!(table.exist(key));
        }
    }

    // Keys never inserted are absent and cannot be deleted.
    #[test]
    fn prop_never_inserted_keys_absent(
        inserted in prop::collection::hash_set(key_strategy(), 0..10),
        absent in key_strategy()
    ) {
        prop_assume!(!inserted.contains(&absent));
        let table = manual_table();
        for key in &inserted {
            table.add(key.clone(), Duration::from_secs(60), 0);
        }

        prop_assert!(!table.exist(&absent));
        prop_assert_eq!(table.delete(&absent).unwrap_err(), CacheError::KeyNotFound);
        prop_assert_eq!(table.count(), inserted.len());
    }

    // Ranking is ordered by access count and leaves every count as it was.
    #[test]
    fn prop_most_accessed_ordered_and_read_only(
        reads in prop::collection::vec(key_strategy(), 0..80),
        keys in prop::collection::hash_set(key_strategy(), 1..12),
        n in 0usize..15
    ) {
        let table = manual_table();
        for key in &keys {
            table.add(key.clone(), Duration::ZERO, 0);
        }
        for key in reads.iter().filter(|k| keys.contains(*k)) {
            table.value(key).unwrap();
        }

        let mut before = HashMap::new();
        table.for_each(|key, item| {
            before.insert(key.clone(), item.access_count());
        });

        let top = table.most_accessed(n);
        prop_assert_eq!(top.len(), n.min(keys.len()));
        for pair in top.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            prop_assert!(a.access_count() >= b.access_count());
            if a.access_count() == b.access_count() {
                prop_assert!(a.key() < b.key());
            }
        }

        table.for_each(|key, item| {
            assert_eq!(before[key], item.access_count());
        });
    }

    // Flushing fires neither add nor delete observers for the flushed items.
    #[test]
    fn prop_flush_is_silent(keys in prop::collection::hash_set(key_strategy(), 0..20)) {
        let table = manual_table();
        for key in &keys {
            table.add(key.clone(), Duration::from_secs(30), 0);
        }

        let fired = Arc::new(AtomicUsize::new(0));
        let on_add = fired.clone();
        table.add_added_item_callback(move |_| {
            on_add.fetch_add(1, Ordering::SeqCst);
        });
        let on_delete = fired.clone();
        table.add_deleted_item_callback(move |_| {
            on_delete.fetch_add(1, Ordering::SeqCst);
        });

        table.flush();
        prop_assert_eq!(table.count(), 0);
        prop_assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(20))]

    // Concurrent not_found_add calls on one key: exactly one wins and the
    // item is inserted exactly once.
    #[test]
    fn prop_not_found_add_single_winner(threads in 2usize..10) {
        let table = manual_table();
        let added = Arc::new(AtomicUsize::new(0));
        let counter = added.clone();
        table.add_added_item_callback(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let barrier = Arc::new(Barrier::new(threads));
        let handles: Vec<_> = (0..threads as u32)
            .map(|n| {
                let table = table.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    table.not_found_add("shared".to_string(), Duration::ZERO, n)
                })
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();

        prop_assert_eq!(winners, 1);
        prop_assert_eq!(added.load(Ordering::SeqCst), 1);
        prop_assert_eq!(table.count(), 1);
    }
}
