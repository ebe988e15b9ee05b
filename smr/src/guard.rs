//! RAII reservations bracketing a single operation.
//!
//! `OpGuard` is the Rust translation of `start_basic_op()` / `end_op()`: creating one reserves
//! the calling thread's current epoch (or, for `LinearizedGuard`, a linearization epoch), and
//! dropping it withdraws the reservation. Holding the guard for the lifetime of an operation is
//! what makes every load of a record pointer taken while it's alive safe against concurrent
//! reclamation (P7).

use crate::{epoch, local, reservation::RESERVATIONS};

/// A guard covering one `start_basic_op` / `end_op` span.
///
/// Not `Send`: a reservation is meaningless outside the thread that announced it.
#[must_use = "an OpGuard that is immediately dropped reserves nothing for the duration of the op"]
pub struct OpGuard {
    slot: usize,
    epoch: u64,
    _not_send: std::marker::PhantomData<*const ()>,
}

impl OpGuard {
    /// The epoch this guard reserved. Any record retired at or after this epoch is guaranteed
    /// still visible to the holder.
    ///
    /// Cached at construction: the global clock keeps advancing for the lifetime of the guard, so
    /// re-reading `epoch::current()` here would return whatever epoch is live *now*, not the one
    /// actually written into this thread's reservation slot.
    pub fn reserved_epoch(&self) -> u64 {
        self.epoch
    }
}

impl Drop for OpGuard {
    fn drop(&mut self) {
        RESERVATIONS.end(self.slot);
    }
}

/// `start_basic_op()`.
pub fn begin_op() -> OpGuard {
    let slot = local::slot();
    let e = epoch::current();
    RESERVATIONS.start_basic(slot, e);
    OpGuard {
        slot,
        epoch: e,
        _not_send: std::marker::PhantomData,
    }
}

/// `start_linearized_op()`.
///
/// Returns the guard together with the linearization epoch `L`. If the epoch clock advanced
/// between the reservation write and the re-read, `L` is the *later* value, and the caller must
/// `help_commit` any record it encounters with a zero `write_epoch` so that no retirer can free a
/// record "from during" `L` before this reservation became visible.
pub fn begin_linearized_op() -> (OpGuard, u64) {
    let slot = local::slot();
    let first = epoch::current();
    RESERVATIONS.start_basic(slot, first);
    let second = epoch::current();

    let linearization = if second == first {
        first
    } else {
        // The clock moved; re-announce the later epoch so our reservation actually covers it.
        RESERVATIONS.start_basic(slot, second);
        second
    };

    (
        OpGuard {
            slot,
            epoch: linearization,
            _not_send: std::marker::PhantomData,
        },
        linearization,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_guard_reserves_and_releases() {
        let g = begin_op();
        assert!(g.reserved_epoch() > 0);
        drop(g);
        // No direct way to observe "unreserved" from outside without a slot id, but this at
        // least exercises the full begin/drop path without panicking.
    }

    #[test]
    fn linearized_guard_returns_sane_epoch() {
        let (_g, l) = begin_linearized_op();
        assert!(l > 0);
    }
}
