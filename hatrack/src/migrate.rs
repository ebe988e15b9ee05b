//! The migration engine: freeze a store, allocate its successor, copy live records across, then
//! swing `Table::store_current`.
//!
//! Every writer is a potential migrator — there is no dedicated background thread. Whoever first
//! notices a store needs to grow (or shrink) drives it through these four phases; anyone else who
//! shows up partway through helps finish whichever phase is in flight rather than blocking on it.

use std::sync::atomic::Ordering;

use smr::epoch;

use crate::bucket::Acquire;
use crate::hash::Hash128;
use crate::record::Record;
use crate::store::{self, Store, StoreBody};
use crate::table::Table;
use crate::tagged::{Unpacked, MOVED, MOVING};

/// Freeze `old`, allocate and populate its successor, publish it as `table.store_current`, and
/// return the successor. If another thread has already finished this migration by the time we
/// get here, we simply help verify that and hand back whatever is current.
pub fn migrate<T>(table: &Table<T>, old: *mut Store<T>) -> *mut Store<T> {
    let current = table.store_current.load(Ordering::SeqCst);
    if current != old {
        // Someone already published a successor (possibly several generations ahead); nothing
        // for us to do but report it.
        return current;
    }

    let old_body = unsafe { &(*old).value };

    log::trace!("migrating store of size {} ({} live)", old_body.size(), old_body.live_count());
    freeze(old_body);
    let next = allocate_next(old_body);
    copy(old_body, unsafe { &(*next).value });
    publish(table, old, next)
}

/// Phase 1: set `MOVING` on every bucket's record pointer, counting live records as we go. A
/// bucket with no live content (empty, or a tombstone) also gets `MOVED` here — there is nothing
/// to copy, so phase 3 can skip it outright.
fn freeze<T>(store: &StoreBody<T>) {
    for bucket in store.buckets.iter() {
        loop {
            let current = bucket.load_record();
            if current.is_moving() {
                break;
            }

            let is_live = !current.ptr.is_null() && unsafe { (*current.ptr).value.is_live() };
            let frozen = Unpacked {
                ptr: current.ptr,
                tag: current.tag | MOVING,
            };

            match bucket
                .record
                .compare_exchange(current, frozen, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => {
                    if !is_live {
                        bucket.record.fetch_or_tag(MOVED, Ordering::SeqCst);
                    }
                    break;
                }
                Err(_) => continue,
            }
        }
    }
}

/// Phase 2: allocate the successor store exactly once, via `next_store`. Losers of the
/// installation race free their candidate immediately — nobody else could have observed it.
fn allocate_next<T>(store: &StoreBody<T>) -> *mut Store<T> {
    let existing = store.next_store.load(Ordering::SeqCst);
    if !existing.is_null() {
        return existing;
    }

    let size = store.next_size();
    let candidate = store::new_store(epoch::current(), size);

    match store.next_store.compare_exchange(
        std::ptr::null_mut(),
        candidate,
        Ordering::SeqCst,
        Ordering::SeqCst,
    ) {
        Ok(_) => candidate,
        Err(actual) => {
            unsafe { smr::retire_unused(candidate) };
            actual
        }
    }
}

/// Phase 3: copy every not-yet-`MOVED` (i.e. live) bucket's record into the successor, then mark
/// the source bucket `MOVED`.
fn copy<T>(old: &StoreBody<T>, next: &StoreBody<T>) {
    for bucket in old.buckets.iter() {
        let current = bucket.load_record();
        if current.is_moved() {
            continue;
        }

        debug_assert!(!current.ptr.is_null(), "a frozen live bucket always has a record");
        let hv = bucket.hash();
        install(next, hv, current.ptr);
        bucket.record.fetch_or_tag(MOVED, Ordering::SeqCst);
    }
}

/// Probe into `next` exactly like a `put` would, acquiring the bucket by hash if necessary, then
/// CAS the migrated record in from null. Losing that CAS means another helper already finished
/// this bucket — fine, we just move on.
fn install<T>(next: &StoreBody<T>, hv: Hash128, record: *mut Record<T>) {
    let mut index = hv.bucket_index(next.size());

    loop {
        let bucket = next.bucket(index);
        match bucket.try_acquire(hv) {
            Acquire::Won => {
                next.used_count.fetch_add(1, Ordering::SeqCst);
            }
            Acquire::AlreadyOurs => {}
            Acquire::Occupied => {
                index = (index + 1) & next.last_slot;
                continue;
            }
        }

        let slot = bucket.load_record();
        if !slot.ptr.is_null() {
            // Another helper already installed this key's record here.
            return;
        }

        let clean = Unpacked { ptr: record, tag: 0 };
        let _ = bucket
            .record
            .compare_exchange(slot, clean, Ordering::SeqCst, Ordering::SeqCst);
        return;
    }
}

/// Phase 4: stamp the successor's `used_count` with the live count frozen in phase 1, then swing
/// `table.store_current` from `old` to `next`. The winner retires `old`; a loser (someone else
/// already published `next` or a later store) just hands back whatever is current.
fn publish<T>(table: &Table<T>, old: *mut Store<T>, next: *mut Store<T>) -> *mut Store<T> {
    let old_body = unsafe { &(*old).value };
    let new_used = old_body.live_count();
    let next_body = unsafe { &(*next).value };
    let _ = next_body
        .used_count
        .compare_exchange(0, new_used, Ordering::SeqCst, Ordering::SeqCst);

    match table
        .store_current
        .compare_exchange(old, next, Ordering::SeqCst, Ordering::SeqCst)
    {
        Ok(_) => {
            // Whatever stuck operation asked for help got its migration round; clear the flag so
            // later writers stop being forced through the slow path once this one is resolved.
            table.help_needed.store(0, Ordering::SeqCst);
            unsafe { smr::retire(old) };
            next
        }
        Err(actual) => actual,
    }
}
