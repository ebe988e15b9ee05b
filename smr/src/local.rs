//! Per-thread state: the reservation slot and the intrusive retire list.
//!
//! Auto-registration on first use means a caller never has to explicitly join the SMR context —
//! the first call to `begin_op` (or `retire`) on a new thread transparently claims a slot. Per
//! the error-handling policy this is not a usage error worth surfacing.

use std::cell::Cell;

use crate::config;
use crate::header::Header;
use crate::reservation::RESERVATIONS;

thread_local! {
    static STATE: Thread = Thread::new();
}

struct Thread {
    slot: usize,
    retire_head: Cell<*mut Header>,
    retire_count: Cell<u64>,
}

impl Thread {
    fn new() -> Thread {
        Thread {
            slot: RESERVATIONS.register(),
            retire_head: Cell::new(std::ptr::null_mut()),
            retire_count: Cell::new(0),
        }
    }
}

impl Drop for Thread {
    fn drop(&mut self) {
        // A departing thread cannot leave garbage stranded forever: sweep unconditionally, then
        // hand anything still unreclaimable off is not possible without a global queue, so we
        // spin until our own list is empty. Every other live thread still advances the epoch and
        // retires its own records independently of us, so this converges quickly in practice.
        loop {
            sweep(self);
            if self.retire_head.get().is_null() {
                break;
            }
            std::thread::yield_now();
        }

        RESERVATIONS.end(self.slot);
        RESERVATIONS.deregister(self.slot);
    }
}

/// This thread's reservation slot id, registering it first if necessary.
pub fn slot() -> usize {
    STATE.with(|t| t.slot)
}

/// Push a retired record onto this thread's retire list, sweeping every `RETIRE_FREQ`
/// retirements.
///
/// # Safety
///
/// `header` must point at a live `Header` embedded in an `Allocated<T>` that has been made
/// logically unreachable — no new guard may be created for it from this point on.
pub unsafe fn retire(header: *mut Header) {
    STATE.with(|t| {
        (*header).set_next_retired(t.retire_head.get());
        t.retire_head.set(header);

        let count = t.retire_count.get() + 1;
        t.retire_count.set(count);
        if count & (config::RETIRE_FREQ - 1) == 0 {
            sweep(t);
        }
    });
}

/// Walk this thread's retire list and free everything whose `retire_epoch` predates every live
/// reservation.
fn sweep(t: &Thread) {
    let min = RESERVATIONS.min_reserved();
    crate::debug::trace(|| log::trace!("sweeping retire list, min reserved epoch = {:?}", min));

    let mut still_pending: *mut Header = std::ptr::null_mut();
    let mut node = t.retire_head.get();

    while !node.is_null() {
        // SAFETY: every node on this list was pushed by `retire` with a pointer into a live
        // `Allocated<T>` that this thread (and only this thread) owns until freed here.
        let header = unsafe { &*node };
        let next = header.next_retired();

        let safe_to_free = match min {
            Some(m) => header.retire_epoch() < m,
            None => true,
        };

        if safe_to_free {
            header.run_cleanup(node as *mut u8);
        } else {
            header.set_next_retired(still_pending);
            still_pending = node;
        }

        node = next;
    }

    t.retire_head.set(still_pending);
}

/// Force a sweep of this thread's retire list right now, regardless of the retire-frequency
/// counter. Intended for tests and for callers that just freed something unusually large and
/// want a chance at prompt reclamation.
pub fn force_sweep() {
    STATE.with(sweep);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::Allocated;

    #[test]
    fn retire_and_sweep_frees_when_unreserved() {
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::sync::Arc;

        let freed = Arc::new(AtomicBool::new(false));
        let freed2 = freed.clone();

        struct Payload(Arc<AtomicBool>);
        impl Drop for Payload {
            fn drop(&mut self) {
                self.0.store(true, Ordering::SeqCst);
            }
        }

        let boxed = Allocated::new_uncommitted(1, Payload(freed2));
        let raw = Box::into_raw(boxed);

        unsafe {
            crate::allocator::retire(raw);
        }
        force_sweep();

        assert!(freed.load(Ordering::SeqCst));
    }
}
