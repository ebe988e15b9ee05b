//! Consistent point-in-time views of a table.
//!
//! `view` is lock-free, not wait-free — it does not participate in the helping protocol and can
//! in principle be delayed by a concurrent migration, but it always terminates in one pass over
//! whatever store it lands on.

use std::sync::atomic::Ordering;

use crate::config::QSORT_THRESHOLD;
use crate::table::Table;

/// One live entry in a snapshot: the item, and the epoch at which its key's current lineage was
/// first created (used to order the snapshot, not the epoch of this particular write).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry<T> {
    pub item: T,
    pub create_epoch: u64,
}

/// `view(table, sort) -> (array of (item, create_epoch), count)`.
///
/// Requests a linearization epoch `L`, then walks the current store once. A record is included
/// if it is live and its `write_epoch` is committed at or before `L`; `help_commit` is called on
/// every record visited so an in-flight write's epoch is resolved before the comparison, per the
/// `start_linearized_op` contract.
pub fn view<T: Clone>(table: &Table<T>, sort: bool) -> Vec<Entry<T>> {
    let (_guard, linearization) = smr::begin_linearized_op();
    let store = table.current();
    let body = unsafe { &(*store).value };

    let mut entries = Vec::new();
    for bucket in body.buckets.iter() {
        let current = bucket.load_record();
        if current.ptr.is_null() {
            continue;
        }

        let record = unsafe { &*current.ptr };
        record.header.help_commit();
        let write_epoch = record.header.write_epoch.load(Ordering::SeqCst);

        // `write_epoch == 0` can't actually survive `help_commit`, but a record freshly installed
        // by a writer we raced with and haven't yet `help_commit`-ed may still show a later epoch
        // than `linearization` — that write simply hasn't happened yet, from our point of view.
        if write_epoch > linearization {
            continue;
        }

        if !record.value.is_live() {
            continue;
        }

        if let Some(item) = record.value.item.clone() {
            entries.push(Entry {
                item,
                create_epoch: record.header.create_epoch.load(Ordering::SeqCst),
            });
        }
    }

    if sort {
        if entries.len() > QSORT_THRESHOLD {
            entries.sort_unstable_by_key(|e| e.create_epoch);
        } else {
            insertion_sort(&mut entries);
        }
    }

    entries
}

fn insertion_sort<T>(entries: &mut [Entry<T>]) {
    for i in 1..entries.len() {
        let mut j = i;
        while j > 0 && entries[j - 1].create_epoch > entries[j].create_epoch {
            entries.swap(j - 1, j);
            j -= 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insertion_sort_orders_by_create_epoch() {
        let mut entries = vec![
            Entry { item: "c", create_epoch: 30 },
            Entry { item: "a", create_epoch: 10 },
            Entry { item: "b", create_epoch: 20 },
        ];
        insertion_sort(&mut entries);
        let epochs: Vec<_> = entries.iter().map(|e| e.create_epoch).collect();
        assert_eq!(epochs, vec![10, 20, 30]);
    }
}
