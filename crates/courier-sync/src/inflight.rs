//! In-flight submission tracking.
//!
//! A guard is taken before a non-idempotent request and released when it is
//! dropped, so the flag clears on success, error and cancellation alike.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use courier_core::Id;

#[derive(Debug, Clone, Default)]
pub struct InFlightSet {
    ids: Arc<Mutex<HashSet<Id>>>,
}

impl InFlightSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `id`, or `None` when a submission for it is already running.
    pub fn try_acquire(&self, id: Id) -> Option<InFlightGuard> {
        let mut ids = self.ids.lock().unwrap_or_else(|p| p.into_inner());
        if ids.insert(id) {
            Some(InFlightGuard {
                ids: Arc::clone(&self.ids),
                id,
            })
        } else {
            None
        }
    }

    pub fn contains(&self, id: Id) -> bool {
        self.ids.lock().unwrap_or_else(|p| p.into_inner()).contains(&id)
    }
}

#[derive(Debug)]
pub struct InFlightGuard {
    ids: Arc<Mutex<HashSet<Id>>>,
    id: Id,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.ids
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .remove(&self.id);
    }
}
