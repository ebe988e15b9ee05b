//! # `smr` — epoch-based safe memory reclamation
//!
//! `smr` lets lock-free readers and writers publish new versions of objects and retire old ones
//! without ever blocking on each other, and additionally exposes a *linearizable read epoch* so
//! that snapshots spanning many otherwise-independent objects (e.g. every bucket of a hash table)
//! can still agree on one consistent point in time.
//!
//! ## Model
//!
//! - A single, process-wide [`epoch`] counter `E` timestamps every committed write.
//! - Every registered thread owns a slot in the [`reservation`] array, announcing (via
//!   [`guard::begin_op`] / [`guard::begin_linearized_op`]) the oldest epoch it may still be
//!   reading. Dropping the returned [`guard::OpGuard`] withdraws the reservation.
//! - [`allocator::alloc`] allocates a value with a hidden [`header::Header`] carrying
//!   `create_epoch` / `write_epoch` / `retire_epoch`. [`allocator::retire`] logically removes a
//!   value; it is only physically freed once no reservation could still observe it.
//!
//! ## Usage sketch
//!
//! ```ignore
//! let ptr = smr::allocator::alloc(create_epoch, my_value);
//! // ... CAS `ptr` into a shared atomic slot ...
//! unsafe { (*ptr).header.commit_write(); }
//!
//! let guard = smr::guard::begin_op();
//! // ... load the atomic slot, dereference, read the value ...
//! drop(guard);
//!
//! // once the old value is unreachable:
//! unsafe { smr::allocator::retire(old_ptr); }
//! ```
//!
//! This crate does not provide an `Atomic<T>`-style high-level wrapper: the table kernel built on
//! top of it (see the `hatrack` crate) needs to tag its record pointers with migration-state
//! bits, which doesn't fit a one-size-fits-all atomic cell. What it provides instead is the
//! allocation, reservation, and retirement primitives a table-specific atomic cell is built from.

pub mod allocator;
pub mod config;
mod debug;
pub mod epoch;
pub mod guard;
pub mod header;
mod local;
pub mod reservation;

pub use allocator::{alloc, retire, retire_unused};
pub use guard::{begin_linearized_op, begin_op, OpGuard};
pub use header::{Allocated, Header};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn end_to_end_publish_read_retire() {
        let drops = Arc::new(AtomicUsize::new(0));

        struct Counted(Arc<AtomicUsize>);
        impl Drop for Counted {
            fn drop(&mut self) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let e0 = epoch::next();
        let ptr = alloc(e0, Counted(drops.clone()));
        unsafe {
            (*ptr).header.commit_write();
        }

        // A reader protects it for the duration of a guard...
        let guard = begin_op();
        let value_ref: &Counted = unsafe { &(*ptr).value };
        assert_eq!(Arc::strong_count(&value_ref.0), 2);
        drop(guard);

        unsafe { retire(ptr) };
        local::force_sweep();

        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn many_threads_publish_and_retire_without_crashing() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::new();

        for _ in 0..8 {
            let counter = counter.clone();
            handles.push(thread::spawn(move || {
                for _ in 0..200 {
                    let _g = begin_op();
                    let ptr = alloc(epoch::next(), 7u64);
                    unsafe {
                        (*ptr).header.commit_write();
                        retire(ptr);
                    }
                    counter.fetch_add(1, Ordering::Relaxed);
                }
            }));
        }

        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(counter.load(Ordering::Relaxed), 1600);
    }

    #[test]
    fn linearized_op_epoch_is_never_behind_a_concurrent_commit() {
        // Not a full race-detector-grade test, but it exercises the re-read path.
        let (_guard, l) = begin_linearized_op();
        let committed = epoch::next();
        assert!(l <= committed);
    }
}
