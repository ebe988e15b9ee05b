//! The reservation array.
//!
//! Every registered thread owns exactly one slot. A slot holds either the sentinel `UNRESERVED`
//! (`0`, which doubles as the "uncommitted" epoch sentinel — a thread can never legitimately
//! reserve epoch `0`) or the oldest epoch the owning thread may still be observing.
//!
//! Scanning every slot and taking the minimum reserved value tells the allocator which epochs are
//! still possibly visible to a reader; anything retired strictly before that minimum is safe to
//! free.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::config;

/// Sentinel stored in a slot that is not currently reserving anything.
const UNRESERVED: u64 = 0;

/// The fixed-width reservation array plus the thread-slot bookkeeping around it.
pub struct Reservations {
    slots: Box<[AtomicU64]>,
    next_tid: AtomicUsize,
    free_list: Mutex<Vec<usize>>,
}

impl Reservations {
    fn new() -> Reservations {
        let mut slots = Vec::with_capacity(config::THREADS_MAX);
        slots.resize_with(config::THREADS_MAX, || AtomicU64::new(UNRESERVED));

        Reservations {
            slots: slots.into_boxed_slice(),
            next_tid: AtomicUsize::new(0),
            free_list: Mutex::new(Vec::new()),
        }
    }

    /// Obtain a slot id for a newly-registering thread.
    ///
    /// This is a fatal, deterministic-abort condition if the thread-slot table is exhausted:
    /// per the error-handling policy, resource exhaustion here is a programming error, not a
    /// recoverable one.
    pub fn register(&self) -> usize {
        if let Some(slot) = self.free_list.lock().pop() {
            return slot;
        }

        let tid = self.next_tid.fetch_add(1, Ordering::Relaxed);
        if tid >= config::THREADS_MAX {
            log::error!(
                "exhausted {} reservation slots; aborting (see HATRACK_THREADS_MAX)",
                config::THREADS_MAX
            );
            std::process::abort();
        }
        tid
    }

    /// Return a slot to the free list for reuse by a later thread.
    ///
    /// Only valid once the owning thread has called `end_op` for the last time — i.e. the slot
    /// must already read `UNRESERVED`.
    pub fn deregister(&self, slot: usize) {
        debug_assert_eq!(
            self.slots[slot].load(Ordering::SeqCst),
            UNRESERVED,
            "deregistering a slot that is still reserving an epoch"
        );
        self.free_list.lock().push(slot);
    }

    /// `start_basic_op`: announce that this slot may observe anything live as of `epoch`.
    pub fn start_basic(&self, slot: usize, epoch: u64) {
        self.slots[slot].store(epoch, Ordering::SeqCst);
    }

    /// `end_op`: withdraw the reservation.
    pub fn end(&self, slot: usize) {
        self.slots[slot].store(UNRESERVED, Ordering::SeqCst);
    }

    /// The minimum epoch reserved by any slot, or `None` if nothing is reserved.
    ///
    /// Records retired strictly before this epoch cannot be observed by any in-flight reader and
    /// are safe to free.
    pub fn min_reserved(&self) -> Option<u64> {
        let mut min = None;
        for slot in self.slots.iter() {
            let epoch = slot.load(Ordering::SeqCst);
            if epoch != UNRESERVED {
                min = Some(min.map_or(epoch, |m: u64| m.min(epoch)));
            }
        }
        min
    }
}

lazy_static::lazy_static! {
    /// The global, process-wide reservation array.
    pub static ref RESERVATIONS: Reservations = Reservations::new();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_deregister_reuses_slot() {
        let tid = RESERVATIONS.register();
        RESERVATIONS.start_basic(tid, 5);
        RESERVATIONS.end(tid);
        RESERVATIONS.deregister(tid);

        let tid2 = RESERVATIONS.register();
        // Not a strict guarantee in general (another thread could grab it first), but with no
        // concurrent registration here it must be the same slot we just freed.
        assert_eq!(tid, tid2);
        RESERVATIONS.deregister(tid2);
    }

    #[test]
    fn min_reserved_tracks_slots() {
        let a = RESERVATIONS.register();
        let b = RESERVATIONS.register();

        RESERVATIONS.start_basic(a, 10);
        RESERVATIONS.start_basic(b, 7);
        assert_eq!(RESERVATIONS.min_reserved(), Some(7));

        RESERVATIONS.end(b);
        assert_eq!(RESERVATIONS.min_reserved(), Some(10));

        RESERVATIONS.end(a);
        assert_eq!(RESERVATIONS.min_reserved(), None);

        RESERVATIONS.deregister(a);
        RESERVATIONS.deregister(b);
    }
}
