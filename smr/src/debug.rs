//! Runtime debugging helpers.
//!
//! The hot paths in this crate (reservation, CAS, retire) never log — logging is only wired up
//! for the cold paths (sweeps, thread registration, resource exhaustion) through the `log` facade
//! so callers can route it through whatever subscriber they already use.
//!
//! `trace(f)` additionally runs `f` only when a verbose trace is actually useful to collect,
//! which under the `debug-tools` feature also captures a backtrace for anything printed at
//! `trace` level.

/// Run `f` if trace-level tracing for this crate is active.
///
/// This exists (rather than calling `log::trace!` directly at call sites) so the few call sites
/// that build an expensive message (e.g. formatting a whole retire list) don't pay for it when
/// tracing is compiled in but disabled at runtime.
#[inline]
pub fn trace<F: FnOnce()>(f: F) {
    if log::log_enabled!(log::Level::Trace) {
        f();
        capture_backtrace();
    }
}

#[cfg(feature = "debug-tools")]
fn capture_backtrace() {
    log::trace!("{:?}", backtrace::Backtrace::new());
}

#[cfg(not(feature = "debug-tools"))]
fn capture_backtrace() {}
