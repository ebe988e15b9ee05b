//! Compile-time tuning constants for the table kernel.
//!
//! These mirror the C reference implementation's `HATRACK_*` preprocessor knobs. They are kept as
//! compile-time constants rather than a runtime `Settings` struct (contrast `smr`'s reservation
//! sizing, or `conc`'s `settings` module) because `MIN_SIZE` fixes the smallest store allocation
//! and `RETRY_THRESHOLD` gates a branch evaluated on every probe restart — both are meant to be
//! chosen once, for a build, not flipped per-thread at runtime.

/// `HATRACK_MIN_SIZE_LOG`: log2 of the smallest store a table or migration will ever allocate.
pub const MIN_SIZE_LOG: u32 = 3;

/// The smallest store size, derived from `MIN_SIZE_LOG`.
pub const MIN_SIZE: usize = 1 << MIN_SIZE_LOG;

/// `HATRACK_RETRY_THRESHOLD`: number of CAS retries an operation tolerates before it bumps
/// `help_needed` and asks the rest of the table's writers to migrate on its behalf.
pub const RETRY_THRESHOLD: usize = 6;

/// `HATRACK_QSORT_THRESHOLD`: snapshot size above which `view(..., sort: true)` uses quicksort
/// instead of insertion sort.
pub const QSORT_THRESHOLD: usize = 48;

/// Store load factor, expressed as parts per 100, above which migration is triggered. ~75%, per
/// the design notes.
pub const LOAD_FACTOR_PERCENT: usize = 75;
