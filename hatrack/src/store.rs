//! A store: one generation's worth of bucket array, plus the bookkeeping that decides when it's
//! time to migrate and how big the successor should be.
//!
//! A store is itself SMR-managed — allocated through `smr::alloc` and retired through
//! `smr::retire` just like a record — so the migration engine can swing `Table::store_current`
//! to a new one and let reclamation take care of the old array once every reader has moved on.

use std::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};

use smr::Allocated;

use crate::bucket::Bucket;
use crate::config::{LOAD_FACTOR_PERCENT, MIN_SIZE};

/// The payload half of a store allocation: the bucket array and its resize counters.
pub struct StoreBody<T> {
    pub buckets: Box<[Bucket<T>]>,
    /// `size - 1`. Masking a hash's high half against this gives the starting probe index.
    pub last_slot: usize,
    /// ~75% of `size`; once `used_count` reaches this, migration is triggered.
    pub threshold: usize,
    /// Buckets acquired so far, live or tombstoned.
    pub used_count: AtomicUsize,
    /// Acquired buckets that are currently tombstones, subtracted from `used_count` to estimate
    /// live occupancy.
    pub del_count: AtomicUsize,
    /// Set once, by the migration phase that wins the race to allocate the successor.
    pub next_store: AtomicPtr<Store<T>>,
}

/// A store is an SMR allocation: `Header` plus `StoreBody<T>`.
pub type Store<T> = Allocated<StoreBody<T>>;

/// Allocate a fresh, empty store of `size` buckets (must be a power of two, at least
/// [`MIN_SIZE`]), committing it immediately — a store has no meaningful "uncommitted" window,
/// unlike a record, since nothing but the allocating thread can see it before it's linked in.
pub fn new_store<T>(create_epoch: u64, size: usize) -> *mut Store<T> {
    debug_assert!(size.is_power_of_two());
    debug_assert!(size >= MIN_SIZE);

    let mut buckets = Vec::with_capacity(size);
    buckets.resize_with(size, Bucket::empty);

    let body = StoreBody {
        buckets: buckets.into_boxed_slice(),
        last_slot: size - 1,
        threshold: size * LOAD_FACTOR_PERCENT / 100,
        used_count: AtomicUsize::new(0),
        del_count: AtomicUsize::new(0),
        next_store: AtomicPtr::new(std::ptr::null_mut()),
    };

    let store = smr::alloc(create_epoch, body);
    unsafe { (*store).header.commit_write() };
    store
}

impl<T> StoreBody<T> {
    pub fn size(&self) -> usize {
        self.last_slot + 1
    }

    pub fn bucket(&self, index: usize) -> &Bucket<T> {
        &self.buckets[index]
    }

    /// Estimated live (non-tombstone) occupancy.
    pub fn live_count(&self) -> usize {
        let used = self.used_count.load(Ordering::SeqCst);
        let del = self.del_count.load(Ordering::SeqCst);
        used.saturating_sub(del)
    }

    pub fn over_threshold(&self) -> bool {
        self.used_count.load(Ordering::SeqCst) >= self.threshold
    }

    /// `hatrack_new_size`: the successor's bucket count, decided from how full this store
    /// actually ended up (not just how many buckets were acquired, tombstones included).
    pub fn next_size(&self) -> usize {
        let size = self.size();
        let live = self.live_count();

        if live * 2 >= size {
            size * 2
        } else if live * 4 <= size {
            (size / 2).max(MIN_SIZE)
        } else {
            size
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_store_has_expected_shape() {
        let s = new_store::<u32>(1, 8);
        unsafe {
            assert_eq!((*s).value.size(), 8);
            assert_eq!((*s).value.last_slot, 7);
            assert_eq!((*s).value.threshold, 6);
            smr::retire_unused(s);
        }
    }

    #[test]
    fn next_size_doubles_when_mostly_full() {
        let s = new_store::<u32>(1, 8);
        unsafe {
            (*s).value.used_count.store(8, Ordering::SeqCst);
            assert_eq!((*s).value.next_size(), 16);
            smr::retire_unused(s);
        }
    }

    #[test]
    fn next_size_halves_when_mostly_empty_but_not_below_floor() {
        let s = new_store::<u32>(1, 8);
        unsafe {
            (*s).value.used_count.store(1, Ordering::SeqCst);
            assert_eq!((*s).value.next_size(), MIN_SIZE);
            smr::retire_unused(s);
        }
    }
}
