//! The flat record variant: an item plus liveness, wrapped in an `smr::Allocated` so the hidden
//! `create_epoch` / `write_epoch` / `retire_epoch` header rides along for free.
//!
//! This is the "flat" axis from the design notes — no link to a prior record. A delete doesn't
//! keep the old value reachable; it installs a fresh tombstone record (`item: None`) so readers
//! can still distinguish "deleted at epoch E" from "never present", without paying for a history
//! chain. An insert following a tombstone starts a new lineage with a fresh `create_epoch` (see
//! the Open Question in `DESIGN.md`).

use smr::Allocated;

/// The payload carried by every record in a bucket. `None` marks a tombstone.
pub struct FlatBody<T> {
    pub item: Option<T>,
}

impl<T> FlatBody<T> {
    pub fn is_live(&self) -> bool {
        self.item.is_some()
    }
}

/// A fully-allocated record: SMR header plus flat body.
pub type Record<T> = Allocated<FlatBody<T>>;

/// Allocate a live record for `item`, carrying `create_epoch` forward from whatever lineage this
/// key belongs to (or freshly drawn, for a new lineage).
pub fn new_live<T>(create_epoch: u64, item: T) -> *mut Record<T> {
    smr::alloc(create_epoch, FlatBody { item: Some(item) })
}

/// Allocate a tombstone record: no item, `create_epoch` carried forward so a concurrent reader
/// who already saw the live value can still make sense of ordering, though the create_epoch of a
/// tombstone is never surfaced to callers.
pub fn new_tombstone<T>(create_epoch: u64) -> *mut Record<T> {
    smr::alloc(create_epoch, FlatBody { item: None })
}
