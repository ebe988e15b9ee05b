//! The public allocation and retirement API.
//!
//! This is the thin, type-aware layer above `header` and `local`: it knows how to turn an
//! `Allocated<T>` back into a `Box<Allocated<T>>` for the one legitimate reason to do so —
//! freeing it — and nothing else. Everywhere else in the crate (and in callers), `Allocated<T>`
//! is only ever touched through `&Header` and `&T`/`*const T`.

use crate::header::Allocated;
use crate::local;

/// Allocate a new record. Its `write_epoch` starts at `0` ("uncommitted"); call
/// `commit_write`/`help_commit` on `.header` to publish it, or rely on the caller's own CAS
/// protocol to do so implicitly by never reading an uncommitted record.
pub fn alloc<T>(create_epoch: u64, value: T) -> *mut Allocated<T> {
    Box::into_raw(Allocated::new_uncommitted(create_epoch, value))
}

/// Declare `ptr` retired: logically removed from whatever structure held it, but not yet safe to
/// free because some in-flight reader might still be dereferencing it.
///
/// This stamps `retire_epoch`, registers a type-correct cleanup hook, and pushes the record onto
/// the calling thread's retire list (see `local::retire`).
///
/// # Safety
///
/// `ptr` must have been obtained from `alloc` (or otherwise be a valid, uniquely-owned
/// `Box<Allocated<T>>` turned into a raw pointer), and must not be reachable by any path that
/// could hand out a *new* reference to it from this point on — the one in the caller's hand is
/// the last.
pub unsafe fn retire<T>(ptr: *mut Allocated<T>) {
    (*ptr).set_cleanup(free::<T>);
    (*ptr).header.mark_retired();
    local::retire(&mut (*ptr).header as *mut _);
}

/// Free `ptr` immediately, with no deferral.
///
/// Use this only when the caller is certain no other thread has ever observed `ptr` — the
/// canonical case is a CAS loser freeing the candidate record it lost with.
///
/// # Safety
///
/// Same contract as `Box::from_raw`: `ptr` must be a unique, valid `Allocated<T>` that nothing
/// else references.
pub unsafe fn retire_unused<T>(ptr: *mut Allocated<T>) {
    drop(Box::from_raw(ptr));
}

/// Type-erased free function stashed in the header's cleanup hook. Reassembles the `Box` and
/// lets its destructor run.
fn free<T>(header_ptr: *mut u8) {
    // SAFETY: `header_ptr` is always the address of the `Header` field of an `Allocated<T>`,
    // which is `#[repr(C)]` with `header` first, so the two pointers coincide.
    unsafe { drop(Box::from_raw(header_ptr as *mut Allocated<T>)) };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn retire_unused_frees_without_reclamation_delay() {
        let counter = Arc::new(AtomicUsize::new(0));

        struct Payload(Arc<AtomicUsize>);
        impl Drop for Payload {
            fn drop(&mut self) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let ptr = alloc(1, Payload(counter.clone()));
        unsafe { retire_unused(ptr) };
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn retire_defers_until_sweep() {
        let counter = Arc::new(AtomicUsize::new(0));

        struct Payload(Arc<AtomicUsize>);
        impl Drop for Payload {
            fn drop(&mut self) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let ptr = alloc(1, Payload(counter.clone()));
        unsafe { retire(ptr) };
        crate::local::force_sweep();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
