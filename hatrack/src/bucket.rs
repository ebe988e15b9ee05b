//! A single slot in a store: an atomic 128-bit hash plus a tagged atomic record pointer.
//!
//! Per the memory-model floor, every atomic access here uses `SeqCst`; the spec allows relaxed
//! orderings in a couple of spots (e.g. the existence check in `get`) as an optional
//! optimization, which this implementation forgoes for clarity.

use portable_atomic::{AtomicU128, Ordering};

use crate::hash::Hash128;
use crate::record::Record;
use crate::tagged::{TaggedPtr, Unpacked};

/// One bucket. `hash`, once non-zero, never changes for the lifetime of this store (invariant
/// 1). It's a genuine 128-bit compare-and-swappable word — not a pair of independent 64-bit
/// halves — because a hash value's high half can legitimately be `0` on its own (only the fully
/// zero 128-bit value is reserved), so a split hi/lo acquire could hand two different keys the
/// same bucket, or have the acquiring thread's CAS win "for free" without actually claiming
/// anything.
pub struct Bucket<T> {
    hash: AtomicU128,
    pub record: TaggedPtr<Record<T>>,
}

/// Outcome of trying to acquire a bucket's hash slot for `hv`.
pub enum Acquire {
    /// We won: this bucket is now reserved for `hv`.
    Won,
    /// Someone already reserved this bucket for `hv` (a genuine match, not a race we lost).
    AlreadyOurs,
    /// The bucket holds a different hash; the caller should advance the probe.
    Occupied,
}

impl<T> Bucket<T> {
    pub fn empty() -> Bucket<T> {
        Bucket {
            hash: AtomicU128::new(0),
            record: TaggedPtr::null(),
        }
    }

    /// Read the current hash value.
    pub fn hash(&self) -> Hash128 {
        Hash128::from_u128(self.hash.load(Ordering::SeqCst))
    }

    /// Try to claim this bucket for `hv`, or discover it's already claimed.
    pub fn try_acquire(&self, hv: Hash128) -> Acquire {
        debug_assert!(!hv.is_empty(), "acquiring a bucket for the reserved empty hash");

        match self
            .hash
            .compare_exchange(0, hv.to_u128(), Ordering::SeqCst, Ordering::SeqCst)
        {
            Ok(_) => Acquire::Won,
            Err(existing) => {
                if existing == hv.to_u128() {
                    Acquire::AlreadyOurs
                } else {
                    Acquire::Occupied
                }
            }
        }
    }

    pub fn load_record(&self) -> Unpacked<Record<T>> {
        self.record.load(std::sync::atomic::Ordering::SeqCst)
    }
}
