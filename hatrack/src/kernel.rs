//! Point operations: probe, acquire, install, retry-through-migration.
//!
//! Every operation here wraps itself in an `smr::OpGuard` for the duration of the call, which is
//! what makes dereferencing a record loaded from a bucket safe even though some other thread may
//! retire it a moment later (P7). Writers that lose a compare-and-swap to migration help the
//! migration along and restart against whatever store comes out of it; writers that lose a
//! compare-and-swap to another writer do not retry at all — they report the winner's outcome,
//! which is what makes `put`/`add`/`remove` wait-free rather than lock-free.

use std::sync::atomic::Ordering;

use crate::bucket::{Acquire, Bucket};
use crate::config::RETRY_THRESHOLD;
use crate::hash::Hash128;
use crate::migrate;
use crate::record::{self, Record};
use crate::store::{Store, StoreBody};
use crate::table::Table;
use crate::tagged::Unpacked;

/// The result of scanning a store for `hv`.
enum Located<'s, T> {
    /// A usable bucket: either an existing match, or one freshly acquired for `hv`.
    Bucket(&'s Bucket<T>, bool),
    /// The probe ran into an empty, unacquired bucket before finding a match — `hv` is not in
    /// this store, and the caller did not ask to acquire one.
    NotFound,
    /// The probe visited every slot in the store without finding an empty bucket or a match.
    Full,
}

/// Scan `store` for `hv`, starting at its indexed bucket and probing linearly. If `acquire` is
/// set and the probe reaches an empty bucket, claim it for `hv` instead of reporting "not found".
fn locate<T>(store: &StoreBody<T>, hv: Hash128, acquire: bool) -> Located<'_, T> {
    let mut index = hv.bucket_index(store.size());

    for _ in 0..=store.last_slot {
        let bucket = store.bucket(index);
        let current_hash = bucket.hash();

        if current_hash.is_empty() {
            if !acquire {
                return Located::NotFound;
            }

            return match bucket.try_acquire(hv) {
                Acquire::Won => {
                    store.used_count.fetch_add(1, Ordering::SeqCst);
                    Located::Bucket(bucket, true)
                }
                Acquire::AlreadyOurs => Located::Bucket(bucket, false),
                Acquire::Occupied => {
                    index = (index + 1) & store.last_slot;
                    continue;
                }
            };
        }

        if current_hash == hv {
            return Located::Bucket(bucket, false);
        }

        index = (index + 1) & store.last_slot;
    }

    Located::Full
}

fn help_needed<T>(table: &Table<T>) -> bool {
    table.help_needed.load(Ordering::SeqCst) > 0
}

fn request_help<T>(table: &Table<T>) {
    log::trace!("put exceeded retry threshold; requesting help from other writers");
    table.help_needed.fetch_add(1, Ordering::SeqCst);
}

/// `get(table, hash) -> (item?, found)`.
///
/// Readers never wait on a migration in progress: a bucket's `MOVING`/`MOVED` tag bits are
/// irrelevant to a reader, which simply strips them via `load_record` and dereferences whatever
/// record is underneath. The record is still live until `end_op` because of the `OpGuard`.
pub fn get<T: Clone>(table: &Table<T>, hv: Hash128) -> Option<T> {
    let _guard = smr::begin_op();
    let store = table.current();
    let body = unsafe { &(*store).value };

    match locate(body, hv, false) {
        Located::Bucket(bucket, _) => {
            let current = bucket.load_record();
            if current.ptr.is_null() {
                return None;
            }
            let record = unsafe { &*current.ptr };
            record.header.help_commit();
            record.value.item.clone()
        }
        Located::NotFound | Located::Full => None,
    }
}

/// `put(table, hash, item) -> (prev_item?, found)`.
pub fn put<T: Clone>(table: &Table<T>, hv: Hash128, item: T) -> (Option<T>, bool) {
    let _guard = smr::begin_op();
    let mut store = table.current();
    let mut retries = 0usize;
    let mut item = item;

    loop {
        if help_needed(table) {
            store = migrate::migrate(table, store);
            continue;
        }

        let body = unsafe { &(*store).value };
        let bucket = match locate(body, hv, true) {
            Located::Bucket(bucket, just_acquired) => {
                if just_acquired && body.over_threshold() {
                    store = migrate::migrate(table, store);
                    continue;
                }
                bucket
            }
            Located::Full => {
                store = migrate::migrate(table, store);
                continue;
            }
            Located::NotFound => unreachable!("locate with acquire=true never reports NotFound"),
        };

        let current = bucket.load_record();
        if current.is_moving() {
            store = migrate::migrate(table, store);
            continue;
        }

        let create_epoch = match unsafe { current.ptr.as_ref() } {
            Some(existing) if existing.value.is_live() => {
                existing.header.create_epoch.load(Ordering::SeqCst)
            }
            // Empty bucket, or a tombstone: any live record installed here starts a fresh
            // lineage rather than inheriting the tombstone's create_epoch.
            Some(_) | None => table.next_epoch(),
        };

        let candidate = record::new_live(create_epoch, item);
        let desired = Unpacked { ptr: candidate, tag: 0 };

        match bucket
            .record
            .compare_exchange(current, desired, Ordering::SeqCst, Ordering::SeqCst)
        {
            Ok(prev) => {
                unsafe { (*candidate).header.commit_write() };
                let prev_item = read_item(prev.ptr);
                let found = prev_item.is_some();
                if !found {
                    table.item_count.fetch_add(1, Ordering::SeqCst);
                }
                if !prev.ptr.is_null() {
                    unsafe { smr::retire(prev.ptr) };
                }
                return (prev_item, found);
            }
            Err(actual) => {
                // SAFETY: `candidate` was never published to any bucket another thread can
                // reach, so nothing has observed it.
                item = take_item(candidate);
                unsafe { smr::retire_unused(candidate) };

                if actual.is_moving() {
                    retries += 1;
                    if retries > RETRY_THRESHOLD {
                        request_help(table);
                    }
                    store = migrate::migrate(table, store);
                    continue;
                }

                // Another writer won the race: per convention, this counts as our put having
                // been immediately overwritten. Report the winner's value rather than retrying.
                let winner = unsafe { &*actual.ptr };
                winner.header.help_commit();
                return (winner.value.item.clone(), true);
            }
        }
    }
}

/// `replace(table, hash, item) -> (prev_item?, found)`. Fails if the key is missing or its most
/// recent record is a tombstone. Otherwise behaves exactly like `put`'s single CAS attempt.
pub fn replace<T: Clone>(table: &Table<T>, hv: Hash128, item: T) -> (Option<T>, bool) {
    let _guard = smr::begin_op();
    let mut store = table.current();
    let mut item = item;

    loop {
        if help_needed(table) {
            store = migrate::migrate(table, store);
            continue;
        }

        let body = unsafe { &(*store).value };
        let bucket = match locate(body, hv, false) {
            Located::Bucket(bucket, _) => bucket,
            Located::NotFound => return (None, false),
            Located::Full => {
                store = migrate::migrate(table, store);
                continue;
            }
        };

        let current = bucket.load_record();
        if current.is_moving() {
            store = migrate::migrate(table, store);
            continue;
        }
        if current.ptr.is_null() {
            return (None, false);
        }
        let existing = unsafe { &*current.ptr };
        if !existing.value.is_live() {
            return (None, false);
        }

        let create_epoch = existing.header.create_epoch.load(Ordering::SeqCst);
        let candidate = record::new_live(create_epoch, item);
        let desired = Unpacked { ptr: candidate, tag: 0 };

        match bucket
            .record
            .compare_exchange(current, desired, Ordering::SeqCst, Ordering::SeqCst)
        {
            Ok(prev) => {
                unsafe { (*candidate).header.commit_write() };
                let prev_item = read_item(prev.ptr);
                unsafe { smr::retire(prev.ptr) };
                return (prev_item, true);
            }
            Err(actual) => {
                item = take_item(candidate);
                unsafe { smr::retire_unused(candidate) };

                if actual.is_moving() {
                    store = migrate::migrate(table, store);
                    continue;
                }

                let winner = unsafe { &*actual.ptr };
                winner.header.help_commit();
                return (winner.value.item.clone(), true);
            }
        }
    }
}

/// `add(table, hash, item) -> bool`. Fails if a live value is already present.
pub fn add<T: Clone>(table: &Table<T>, hv: Hash128, item: T) -> bool {
    let _guard = smr::begin_op();
    let mut store = table.current();
    let mut item = item;

    loop {
        if help_needed(table) {
            store = migrate::migrate(table, store);
            continue;
        }

        let body = unsafe { &(*store).value };
        let bucket = match locate(body, hv, true) {
            Located::Bucket(bucket, just_acquired) => {
                if just_acquired && body.over_threshold() {
                    store = migrate::migrate(table, store);
                    continue;
                }
                bucket
            }
            Located::Full => {
                store = migrate::migrate(table, store);
                continue;
            }
            Located::NotFound => unreachable!("locate with acquire=true never reports NotFound"),
        };

        let current = bucket.load_record();
        if current.is_moving() {
            store = migrate::migrate(table, store);
            continue;
        }

        let create_epoch = match unsafe { current.ptr.as_ref() } {
            Some(existing) if existing.value.is_live() => return false,
            // A tombstone, or no existing record at all: either way this starts a fresh lineage.
            Some(_) | None => table.next_epoch(),
        };

        let candidate = record::new_live(create_epoch, item);
        let desired = Unpacked { ptr: candidate, tag: 0 };

        match bucket
            .record
            .compare_exchange(current, desired, Ordering::SeqCst, Ordering::SeqCst)
        {
            Ok(prev) => {
                unsafe { (*candidate).header.commit_write() };
                table.item_count.fetch_add(1, Ordering::SeqCst);
                if !prev.ptr.is_null() {
                    unsafe { smr::retire(prev.ptr) };
                }
                return true;
            }
            Err(actual) => {
                item = take_item(candidate);
                unsafe { smr::retire_unused(candidate) };

                if actual.is_moving() {
                    store = migrate::migrate(table, store);
                    continue;
                }

                // Someone else changed the bucket concurrently; whatever landed, our add did
                // not win, so it fails rather than retrying (one-shot, wait-free).
                return false;
            }
        }
    }
}

/// `remove(table, hash) -> (prev_item?, found)`.
pub fn remove<T: Clone>(table: &Table<T>, hv: Hash128) -> (Option<T>, bool) {
    let _guard = smr::begin_op();
    let mut store = table.current();

    loop {
        if help_needed(table) {
            store = migrate::migrate(table, store);
            continue;
        }

        let body = unsafe { &(*store).value };
        let bucket = match locate(body, hv, false) {
            Located::Bucket(bucket, _) => bucket,
            Located::NotFound => return (None, false),
            Located::Full => {
                store = migrate::migrate(table, store);
                continue;
            }
        };

        let current = bucket.load_record();
        if current.is_moving() {
            store = migrate::migrate(table, store);
            continue;
        }
        if current.ptr.is_null() {
            return (None, false);
        }
        let existing = unsafe { &*current.ptr };
        if !existing.value.is_live() {
            return (None, false);
        }

        let create_epoch = existing.header.create_epoch.load(Ordering::SeqCst);
        let tombstone = record::new_tombstone(create_epoch);
        let desired = Unpacked { ptr: tombstone, tag: 0 };

        match bucket
            .record
            .compare_exchange(current, desired, Ordering::SeqCst, Ordering::SeqCst)
        {
            Ok(prev) => {
                unsafe { (*tombstone).header.commit_write() };
                let prev_item = read_item(prev.ptr);
                body.del_count.fetch_add(1, Ordering::SeqCst);
                table.item_count.fetch_sub(1, Ordering::SeqCst);
                unsafe { smr::retire(prev.ptr) };
                return (prev_item, true);
            }
            Err(actual) => {
                unsafe { smr::retire_unused(tombstone) };

                if actual.is_moving() {
                    store = migrate::migrate(table, store);
                    continue;
                }

                // A concurrent writer changed the bucket before our tombstone landed. Per the
                // same overwrite convention, treat this remove as having taken effect through
                // that other operation rather than retrying.
                return (read_item(current.ptr), true);
            }
        }
    }
}

fn read_item<T: Clone>(ptr: *mut Record<T>) -> Option<T> {
    if ptr.is_null() {
        return None;
    }
    unsafe { (*ptr).value.item.clone() }
}

/// Reclaim the item out of a candidate record this thread owns exclusively (never published),
/// so a losing CAS doesn't just drop it on the floor when the caller wants to retry with it.
fn take_item<T>(candidate: *mut Record<T>) -> T {
    unsafe { (*candidate).value.item.take().expect("candidate records are always live") }
}
