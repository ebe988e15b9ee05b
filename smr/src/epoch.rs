//! The global epoch clock.
//!
//! `E` is a single, process-wide counter. Every committed write and every reservation is
//! timestamped from it. The value `0` is reserved and means "uncommitted" — it is never handed
//! out by `next()`.

use std::sync::atomic::{AtomicU64, Ordering};

/// The process-wide epoch counter.
///
/// Starts at `1`, since `0` is the sentinel for "not yet committed".
static EPOCH: AtomicU64 = AtomicU64::new(1);

/// Read the current value of the epoch clock without advancing it.
///
/// Used by `start_linearized_op` to check whether the clock moved between the reservation write
/// and the re-read.
pub fn current() -> u64 {
    EPOCH.load(Ordering::SeqCst)
}

/// Draw a fresh epoch and advance the clock.
///
/// Every caller gets a distinct value; two concurrent writers committing at the "same time" are
/// still strictly ordered by the `fetch_add`.
pub fn next() -> u64 {
    // `fetch_add` returns the previous value, so add one to get the epoch we actually reserved.
    EPOCH.fetch_add(1, Ordering::SeqCst) + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monotonic() {
        let a = next();
        let b = next();
        assert!(b > a);
        assert!(current() > b);
    }

    #[test]
    fn never_zero() {
        for _ in 0..1000 {
            assert_ne!(next(), 0);
        }
    }
}
