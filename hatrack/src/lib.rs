//! # `hatrack` — a linearizable, wait-free concurrent hash table
//!
//! `hatrack` is the shared algorithmic core behind a family of concurrent hash tables: bucket
//! records manipulated by compare-and-swap, per-bucket acquisition by linear probing,
//! resize-by-migration with every writer pitching in, record ordering by per-record epoch
//! timestamps, and a helping protocol that bounds a stuck writer's tail latency. It is built
//! directly on top of the [`smr`] crate's epoch-based reclamation.
//!
//! This crate implements the *flat*, wait-free-writer variant: a bucket holds exactly one record
//! at a time (no history chain — a delete installs a tombstone record in place, an insert
//! following one starts a fresh lineage), and `put`/`add`/`remove` make a single
//! compare-and-swap attempt rather than spinning, reporting a losing race as "someone else already
//! got there" instead of retrying. `replace` and `get` follow the same shape. Only `view`
//! (snapshotting) is merely lock-free, not wait-free.
//!
//! ## Usage sketch
//!
//! ```ignore
//! use hatrack::{Hash128, Table};
//!
//! let table: Table<String> = Table::new();
//! table.put(Hash128::new(1, 0), "one".to_string());
//! assert_eq!(table.get(Hash128::new(1, 0)), Some("one".to_string()));
//! ```
//!
//! Hashing keys down to a [`Hash128`] and mapping user key types to entries is left to the
//! caller — this crate never inspects an item beyond cloning it back out to a reader.

pub mod bucket;
pub mod config;
pub mod hash;
mod kernel;
mod migrate;
pub mod record;
pub mod snapshot;
pub mod store;
mod table;
pub mod tagged;

pub use hash::Hash128;
pub use snapshot::Entry;
pub use table::Table;

#[cfg(test)]
mod tests {
    use super::*;

    fn hv(n: u64) -> Hash128 {
        Hash128::new(n, n)
    }

    #[test]
    fn put_then_get_roundtrips() {
        let table: Table<u64> = Table::new();
        let (prev, found) = table.put(hv(1), 100);
        assert_eq!(prev, None);
        assert!(!found);
        assert_eq!(table.get(hv(1)), Some(100));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn put_overwrites_and_reports_previous() {
        let table: Table<u64> = Table::new();
        table.put(hv(1), 100);
        let (prev, found) = table.put(hv(1), 200);
        assert_eq!(prev, Some(100));
        assert!(found);
        assert_eq!(table.get(hv(1)), Some(200));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn replace_fails_on_missing_key() {
        let table: Table<u64> = Table::new();
        let (prev, found) = table.replace(hv(1), 100);
        assert_eq!(prev, None);
        assert!(!found);
        assert_eq!(table.get(hv(1)), None);
    }

    #[test]
    fn replace_succeeds_on_present_key() {
        let table: Table<u64> = Table::new();
        table.put(hv(1), 100);
        let (prev, found) = table.replace(hv(1), 200);
        assert_eq!(prev, Some(100));
        assert!(found);
        assert_eq!(table.get(hv(1)), Some(200));
    }

    #[test]
    fn add_succeeds_once_then_fails() {
        let table: Table<u64> = Table::new();
        assert!(table.add(hv(1), 100));
        assert!(!table.add(hv(1), 200));
        assert_eq!(table.get(hv(1)), Some(100));
    }

    #[test]
    fn add_succeeds_again_after_remove() {
        let table: Table<u64> = Table::new();
        assert!(table.add(hv(1), 100));
        table.remove(hv(1));
        assert!(table.add(hv(1), 200));
        assert_eq!(table.get(hv(1)), Some(200));
    }

    #[test]
    fn remove_then_get_reports_absent() {
        let table: Table<u64> = Table::new();
        table.put(hv(1), 100);
        let (prev, found) = table.remove(hv(1));
        assert_eq!(prev, Some(100));
        assert!(found);
        assert_eq!(table.get(hv(1)), None);
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn remove_of_absent_key_reports_not_found() {
        let table: Table<u64> = Table::new();
        let (prev, found) = table.remove(hv(1));
        assert_eq!(prev, None);
        assert!(!found);
    }

    #[test]
    fn migration_survives_fill_past_threshold() {
        let table: Table<u64> = Table::new();
        for k in 0..64 {
            table.put(hv(k), k * 10);
        }
        for k in 0..64 {
            assert_eq!(table.get(hv(k)), Some(k * 10));
        }
        assert_eq!(table.len(), 64);
    }

    #[test]
    fn view_reflects_live_keys_sorted_by_create_epoch() {
        let table: Table<u64> = Table::new();
        table.put(hv(1), 10);
        table.put(hv(2), 20);
        table.put(hv(1), 11);
        table.remove(hv(2));

        let view = table.view(true);
        let items: Vec<_> = view.iter().map(|e| e.item).collect();
        assert_eq!(items, vec![11]);
    }

    #[test]
    fn s1_single_thread_scenario() {
        let table: Table<u64> = Table::new();
        table.put(hv(1), 10);
        table.put(hv(2), 20);
        table.put(hv(1), 11);
        table.remove(hv(2));

        assert_eq!(table.len(), 1);
        assert_eq!(table.get(hv(1)), Some(11));
        assert_eq!(table.get(hv(2)), None);

        let view = table.view(true);
        assert_eq!(view.len(), 1);
        assert_eq!(view[0].item, 11);
    }

    #[test]
    fn s2_two_threads_put_disjoint_value_per_key() {
        use rand::seq::SliceRandom;
        use std::sync::Arc;
        use std::thread;

        let table = Arc::new(Table::<u64>::new());
        let mut handles = Vec::new();

        // Each thread visits the same keys in its own random order, so the two threads race on
        // buckets in different sequences from run to run rather than always lockstepping.
        for _ in 0..2 {
            let table = table.clone();
            handles.push(thread::spawn(move || {
                let mut keys: Vec<u64> = (1..=1000u64).collect();
                keys.shuffle(&mut rand::thread_rng());
                for k in keys {
                    table.put(hv(k), k);
                }
            }));
        }

        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(table.len(), 1000);
        for k in 1..=1000u64 {
            assert_eq!(table.get(hv(k)), Some(k));
        }
    }
}
