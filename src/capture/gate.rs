use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Admits at most one analysis request at a time.
///
/// A single-permit semaphore. [`DispatchGate::try_dispatch`] never waits:
/// when the permit is out the attempt is dropped. The permit returns when the
/// [`DispatchPermit`] is dropped, so every exit path of a request (success,
/// error, timeout, task abort) releases it exactly once.
#[derive(Clone)]
pub struct DispatchGate {
    limit: Arc<Semaphore>,
}

impl Default for DispatchGate {
    fn default() -> Self {
        Self {
            limit: Arc::new(Semaphore::new(1)),
        }
    }
}

impl DispatchGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_busy(&self) -> bool {
        self.limit.available_permits() == 0
    }

    /// Returns `None` when a request is already outstanding; the caller drops
    /// its attempt.
    pub fn try_dispatch(&self) -> Option<DispatchPermit> {
        self.limit
            .clone()
            .try_acquire_owned()
            .ok()
            .map(|permit| DispatchPermit { _permit: permit })
    }
}

#[must_use = "dropping the permit releases the gate immediately"]
pub struct DispatchPermit {
    _permit: OwnedSemaphorePermit,
}

impl DispatchPermit {
    /// Releases the gate now. Equivalent to dropping the permit.
    pub fn release(self) {}
}
