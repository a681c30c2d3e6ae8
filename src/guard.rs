//! Scoped check that only one execution flow is inside the driver.

use core::sync::atomic::{AtomicU32, Ordering};

static FLOW_COUNT: AtomicU32 = AtomicU32::new(0);

/// Holds a process-wide entry count for the driver's public operations.
///
/// Construction increments the count and traps (debug builds) if another
/// flow is already inside; dropping decrements it. The driver's contract is
/// strictly one flow at a time, so a trip here means the host forgot to
/// serialize externally.
pub struct SingleThreadedCheck {
    _not_send: core::marker::PhantomData<*const ()>,
}

impl SingleThreadedCheck {
    pub fn new() -> Self {
        let flows = FLOW_COUNT.fetch_add(1, Ordering::AcqRel) + 1;
        debug_assert_eq!(flows, 1, "concurrent entry into single-flow SD driver");
        Self { _not_send: core::marker::PhantomData }
    }
}

impl Default for SingleThreadedCheck {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SingleThreadedCheck {
    fn drop(&mut self) {
        FLOW_COUNT.fetch_sub(1, Ordering::AcqRel);
    }
}
