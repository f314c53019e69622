//! Exclusive-execution guard for operations that must not overlap.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

/// Guards one named operation against concurrent execution anywhere in
/// the process.
///
/// Contention is not an error: a caller that fails to acquire returns an
/// empty result to the protocol caller, with no queueing or retry.
pub struct SingleFlight {
    name: &'static str,
    busy: AtomicBool,
}

impl SingleFlight {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            busy: AtomicBool::new(false),
        }
    }

    /// Test-and-set the busy flag. `None` means another execution is in
    /// progress; the returned permit releases the flag when dropped, on
    /// every exit path.
    pub fn try_acquire(&self) -> Option<FlightPermit<'_>> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            Some(FlightPermit { flight: self })
        } else {
            debug!(operation = self.name, "already in flight; skipping");
            None
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

pub struct FlightPermit<'a> {
    flight: &'a SingleFlight,
}

impl Drop for FlightPermit<'_> {
    fn drop(&mut self) {
        self.flight.busy.store(false, Ordering::Release);
    }
}
