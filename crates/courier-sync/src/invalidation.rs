//! # Invalidation Registry
//!
//! Connects writes to the cached views they make stale.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Resource<T>::mount("/orders/store/8") ──register──┐                    │
//! │                                                    ▼                    │
//! │                         ┌──────────────────────────────────────┐       │
//! │                         │ "/orders/store/8"  → [weak, weak]    │       │
//! │                         │ "/users/profile/7" → [weak]          │       │
//! │                         └──────────────────────────────────────┘       │
//! │                                    ▲                   ▲               │
//! │  settle(&Mutation::AcceptOrder{..}, Ok(order)) ────────┘               │
//! │  NotificationChannel on "new_order" ───────────┘                       │
//! │                                                                         │
//! │  Each live target gets exactly one refetch per invalidation.           │
//! │  Dropped resources unregister through their Registration guard.       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tracing::{debug, info};

use courier_core::{Mutation, QueryKey};

use crate::error::ClientResult;

/// Something that can be told its data is stale.
pub trait Invalidate: Send + Sync {
    /// Starts a refetch. Must not block.
    fn invalidate(self: Arc<Self>);
}

#[derive(Default)]
struct RegistryInner {
    next_id: u64,
    entries: HashMap<String, Vec<(u64, Weak<dyn Invalidate>)>>,
}

/// Shared registry. Cloning shares the same table.
#[derive(Clone, Default)]
pub struct InvalidationRegistry {
    inner: Arc<Mutex<RegistryInner>>,
}

impl std::fmt::Debug for InvalidationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("InvalidationRegistry")
            .field("keys", &inner.entries.len())
            .finish()
    }
}

impl InvalidationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        // A panic while holding the lock cannot leave the map inconsistent
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Registers `target` under a path. Dropping the returned guard removes it.
    pub fn register(&self, path: &str, target: Weak<dyn Invalidate>) -> Registration {
        let mut inner = self.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner
            .entries
            .entry(path.to_string())
            .or_default()
            .push((id, target));
        debug!(path = %path, id, "Registered for invalidation");

        Registration {
            registry: Arc::downgrade(&self.inner),
            path: path.to_string(),
            id,
        }
    }

    /// Number of live targets under a path.
    pub fn listeners(&self, key: &QueryKey) -> usize {
        self.lock()
            .entries
            .get(&key.path())
            .map(|targets| targets.iter().filter(|(_, t)| t.strong_count() > 0).count())
            .unwrap_or(0)
    }

    /// Triggers a refetch on every live target for `key`. Returns how many.
    pub fn invalidate(&self, key: &QueryKey) -> usize {
        self.invalidate_path(&key.path())
    }

    pub fn invalidate_path(&self, path: &str) -> usize {
        let targets: Vec<Arc<dyn Invalidate>> = {
            let mut inner = self.lock();
            match inner.entries.get_mut(path) {
                Some(list) => {
                    list.retain(|(_, t)| t.strong_count() > 0);
                    list.iter().filter_map(|(_, t)| t.upgrade()).collect()
                }
                None => Vec::new(),
            }
        };

        let count = targets.len();
        for target in targets {
            target.invalidate();
        }
        debug!(path = %path, count, "Invalidated");
        count
    }

    /// Applies the invalidation table for `mutation` when `result` is `Ok`,
    /// then hands the result back.
    ///
    /// ```rust,ignore
    /// let category = registry.settle(
    ///     &Mutation::CreateCategory { store_id },
    ///     categories.create(store_id, &input).await,
    /// )?;
    /// ```
    pub fn settle<T>(&self, mutation: &Mutation, result: ClientResult<T>) -> ClientResult<T> {
        if result.is_ok() {
            let refetched: usize = mutation
                .invalidates()
                .iter()
                .map(|key| self.invalidate(key))
                .sum();
            info!(mutation = mutation.name(), refetched, "Mutation settled");
        } else {
            debug!(mutation = mutation.name(), "Mutation failed, nothing invalidated");
        }
        result
    }
}

/// Keeps a registration alive. Dropping it unregisters.
#[derive(Debug)]
pub struct Registration {
    registry: Weak<Mutex<RegistryInner>>,
    path: String,
    id: u64,
}

impl Registration {
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        let Some(inner) = self.registry.upgrade() else {
            return;
        };
        let mut inner = inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(list) = inner.entries.get_mut(&self.path) {
            list.retain(|(id, _)| *id != self.id);
            if list.is_empty() {
                inner.entries.remove(&self.path);
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
