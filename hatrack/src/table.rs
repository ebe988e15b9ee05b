//! The public table handle.
//!
//! Holds the current store pointer, the approximate item count, a table-local epoch counter used
//! only for `create_epoch` stamping (kept separate from the global SMR clock so a burst of
//! activity elsewhere in the process can't perturb this table's sort order), and the `help_needed`
//! counter that drives the wait-free helping protocol.

use std::sync::atomic::{AtomicIsize, AtomicPtr, AtomicU64, AtomicUsize, Ordering};

use crate::config::MIN_SIZE;
use crate::hash::Hash128;
use crate::kernel;
use crate::snapshot::Entry;
use crate::store::{self, Store};

pub struct Table<T> {
    pub(crate) store_current: AtomicPtr<Store<T>>,
    pub(crate) item_count: AtomicIsize,
    pub(crate) next_epoch: AtomicU64,
    pub(crate) help_needed: AtomicUsize,
}

impl<T: Clone> Table<T> {
    /// `new()`: a fresh, empty table with the smallest store size.
    pub fn new() -> Table<T> {
        let store = store::new_store(1, MIN_SIZE);
        Table {
            store_current: AtomicPtr::new(store),
            item_count: AtomicIsize::new(0),
            next_epoch: AtomicU64::new(1),
            help_needed: AtomicUsize::new(0),
        }
    }

    pub(crate) fn current(&self) -> *mut Store<T> {
        self.store_current.load(Ordering::SeqCst)
    }

    pub(crate) fn next_epoch(&self) -> u64 {
        self.next_epoch.fetch_add(1, Ordering::SeqCst)
    }

    /// `get(table, hash) -> (item?, found)`.
    pub fn get(&self, hash: Hash128) -> Option<T> {
        kernel::get(self, hash)
    }

    /// `put(table, hash, item) -> (prev_item?, found)`. Overwrite semantics.
    pub fn put(&self, hash: Hash128, item: T) -> (Option<T>, bool) {
        kernel::put(self, hash, item)
    }

    /// `replace(table, hash, item) -> (prev_item?, found)`. Fails if the key is missing.
    pub fn replace(&self, hash: Hash128, item: T) -> (Option<T>, bool) {
        kernel::replace(self, hash, item)
    }

    /// `add(table, hash, item) -> bool`. Fails if the key is already present.
    pub fn add(&self, hash: Hash128, item: T) -> bool {
        kernel::add(self, hash, item)
    }

    /// `remove(table, hash) -> (prev_item?, found)`.
    pub fn remove(&self, hash: Hash128) -> (Option<T>, bool) {
        kernel::remove(self, hash)
    }

    /// `len(table) -> u64`. Approximate.
    pub fn len(&self) -> u64 {
        self.item_count.load(Ordering::SeqCst).max(0) as u64
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `view(table, sort) -> (array of (item, create_epoch), count)`.
    pub fn view(&self, sort: bool) -> Vec<Entry<T>> {
        crate::snapshot::view(self, sort)
    }
}

impl<T: Clone> Default for Table<T> {
    fn default() -> Table<T> {
        Table::new()
    }
}

impl<T> Drop for Table<T> {
    fn drop(&mut self) {
        // No other reference to this table can exist once `drop` runs, so the current store's
        // records can be freed directly instead of going through retirement. We do not chase
        // `next_store`: a migration always moves (never copies) a record's pointer into its
        // successor's bucket, so a leftover predecessor generation shares record pointers with
        // the current store and must not be walked here, or they would be freed twice. Any such
        // predecessor is already on some thread's retire list and will be reclaimed on its own.
        let store = self.store_current.load(Ordering::SeqCst);
        let body = unsafe { &(*store).value };
        for bucket in body.buckets.iter() {
            let rec = bucket.load_record();
            if !rec.ptr.is_null() {
                unsafe { drop(Box::from_raw(rec.ptr)) };
            }
        }
        unsafe { drop(Box::from_raw(store)) };
    }
}
