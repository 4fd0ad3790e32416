//! Admission control for pipeline jobs.
//!
//! A fixed number of slots exists for the lifetime of the process. A job must
//! hold a [`Slot`] while it runs; when none is free the request is shed
//! immediately instead of queued.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, warn};

use crate::{Error, Result};

/// Snapshot of admission load for status reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AdmissionLoad {
    /// Slots currently held by running jobs.
    pub active: usize,
    /// Configured number of slots.
    pub max: usize,
}

/// Bounded, non-queuing admission gate.
///
/// The semaphore is the only state shared between jobs; the outstanding count
/// is derived from it rather than tracked separately.
#[derive(Debug, Clone)]
pub struct AdmissionController {
    semaphore: Arc<Semaphore>,
    max: usize,
}

impl AdmissionController {
    /// Create a controller with `max_concurrency` slots.
    pub fn new(max_concurrency: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrency)),
            max: max_concurrency,
        }
    }

    /// Take a slot if one is free right now.
    ///
    /// Never waits. Returns [`Error::Busy`] when every slot is held.
    pub fn try_acquire(&self) -> Result<Slot> {
        match self.semaphore.clone().try_acquire_owned() {
            Ok(permit) => {
                debug!(active = self.active(), max = self.max, "Slot acquired");
                Ok(Slot { _permit: permit })
            }
            Err(_) => {
                let load = self.load();
                warn!(active = load.active, max = load.max, "Rejecting job, no free slot");
                Err(Error::Busy {
                    active: load.active,
                    max: load.max,
                })
            }
        }
    }

    /// Return a slot to the pool.
    ///
    /// Equivalent to dropping it; the slot is consumed so it cannot be
    /// released twice.
    pub fn release(&self, slot: Slot) {
        drop(slot);
        debug!(active = self.active(), max = self.max, "Slot released");
    }

    /// Number of slots currently held.
    pub fn active(&self) -> usize {
        self.max - self.semaphore.available_permits()
    }

    /// Configured slot count.
    pub fn max(&self) -> usize {
        self.max
    }

    pub fn load(&self) -> AdmissionLoad {
        AdmissionLoad {
            active: self.active(),
            max: self.max,
        }
    }
}

/// An admission ticket. Dropping it frees the slot.
#[derive(Debug)]
#[must_use = "dropping a slot releases it immediately"]
pub struct Slot {
    _permit: OwnedSemaphorePermit,
}
