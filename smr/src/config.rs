//! Compile-time tuning constants.
//!
//! Unlike `conc`'s runtime-adjustable `Settings`, these knobs are deliberately compile-time: the
//! reservation array is a fixed-size allocation sized from `THREADS_MAX`, and `RETIRE_FREQ_LOG`
//! governs a shift (`& ((1 << RETIRE_FREQ_LOG) - 1)`) checked on every retire. Making either one a
//! runtime value would add a branch-predictable but non-zero cost to the hottest path in the
//! allocator for no benefit this library's callers have asked for.

/// `HATRACK_THREADS_MAX`: maximum number of simultaneously registered thread slots.
pub const THREADS_MAX: usize = 8192;

/// `HATRACK_RETIRE_FREQ_LOG`: log2 of how often (in retirements) a thread sweeps its own retire
/// list.
pub const RETIRE_FREQ_LOG: u32 = 5;

/// Number of retirements between sweeps, derived from `RETIRE_FREQ_LOG`.
pub const RETIRE_FREQ: u64 = 1 << RETIRE_FREQ_LOG;
