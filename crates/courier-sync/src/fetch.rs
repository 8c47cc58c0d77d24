//! # Resource Fetch Cache
//!
//! A mounted view of one GET endpoint exposing `{data, loading, error}`.
//!
//! ## Request Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  mount(path) ──► path empty? ──yes──► { data: None, loading: false }   │
//! │       │              │                 no request, ever                 │
//! │       │              no                                                 │
//! │       ▼              ▼                                                  │
//! │  register(path)   fetch ──► GET path ──┬── Ok(T)  ─► data = T           │
//! │                     ▲                  │            error = None        │
//! │                     │                  └── Err(e) ─► error = e          │
//! │  refetch()  ────────┤                               data kept           │
//! │  invalidate() ──────┘                                                   │
//! │                                                                         │
//! │  A response is dropped when:                                           │
//! │    - the resource was unmounted while the request was in flight        │
//! │    - set_path() moved the resource to another path meanwhile           │
//! │                                                                         │
//! │  Two overlapping fetches on the same path are not coalesced; whichever │
//! │  response arrives last is the one that stays (last write wins).       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::sync::watch;
use tracing::{debug, warn};

use courier_core::{scope_to_store, Category, Id, Order, Product, Profile, QueryKey};

use crate::error::{ClientError, ClientResult};
use crate::http::ApiClient;
use crate::invalidation::{Invalidate, InvalidationRegistry, Registration};

/// Post-processing applied to every successful response, given its path.
pub type Transform<T> = Box<dyn Fn(&str, T) -> T + Send + Sync>;

// =============================================================================
// Resource State
// =============================================================================

/// Snapshot observed by views.
#[derive(Debug, Clone)]
pub struct ResourceState<T> {
    pub data: Option<T>,
    pub loading: bool,
    pub error: Option<ClientError>,
    /// Path the state belongs to. `None` means not ready.
    pub path: Option<String>,
}

impl<T> ResourceState<T> {
    fn idle(path: Option<String>) -> Self {
        ResourceState {
            data: None,
            loading: path.is_some(),
            error: None,
            path,
        }
    }
}

// =============================================================================
// Inner
// =============================================================================

#[derive(Debug, Default)]
struct Slot {
    path: Option<String>,
    /// Bumped on every path change and on unmount.
    epoch: u64,
    in_flight: usize,
}

struct Inner<T> {
    api: ApiClient,
    state: watch::Sender<ResourceState<T>>,
    slot: Mutex<Slot>,
    mounted: AtomicBool,
    transform: Option<Transform<T>>,
}

impl<T> Inner<T>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    fn slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(|p| p.into_inner())
    }

    async fn fetch(&self) -> ClientResult<()> {
        let (path, epoch) = {
            let mut slot = self.slot();
            let Some(path) = slot.path.clone() else {
                return Ok(());
            };
            if !self.mounted.load(Ordering::SeqCst) {
                return Ok(());
            }
            slot.in_flight += 1;
            self.state.send_modify(|s| s.loading = true);
            (path, slot.epoch)
        };

        debug!(path = %path, "Fetching resource");
        let result = self.api.get::<T>(&path).await;

        let mut slot = self.slot();
        if slot.epoch != epoch || !self.mounted.load(Ordering::SeqCst) {
            debug!(path = %path, "Discarding response for an abandoned request");
            return Ok(());
        }
        slot.in_flight = slot.in_flight.saturating_sub(1);
        let still_loading = slot.in_flight > 0;

        match result {
            Ok(data) => {
                let data = match &self.transform {
                    Some(transform) => transform(&path, data),
                    None => data,
                };
                self.state.send_modify(|s| {
                    s.data = Some(data);
                    s.error = None;
                    s.loading = still_loading;
                });
                Ok(())
            }
            Err(e) => {
                warn!(path = %path, error = %e, "Resource fetch failed");
                self.state.send_modify(|s| {
                    s.error = Some(e.clone());
                    s.loading = still_loading;
                });
                Err(e)
            }
        }
    }
}

impl<T> Invalidate for Inner<T>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    fn invalidate(self: Arc<Self>) {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    let _ = self.fetch().await;
                });
            }
            Err(_) => warn!("Invalidation outside a runtime ignored"),
        }
    }
}

// =============================================================================
// Resource
// =============================================================================

/// A mounted, observable view of one endpoint.
///
/// Dropping the resource unmounts it.
pub struct Resource<T>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    inner: Arc<Inner<T>>,
    registry: InvalidationRegistry,
    registration: Mutex<Option<Registration>>,
}

impl<T> std::fmt::Debug for Resource<T>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resource")
            .field("path", &self.path())
            .field("mounted", &self.is_mounted())
            .finish()
    }
}

fn normalize(path: Option<String>) -> Option<String> {
    path.filter(|p| !p.trim().is_empty())
}

impl<T> Resource<T>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// Mounts a resource and starts the first fetch in the background.
    ///
    /// Must be called inside a tokio runtime when `path` is set.
    pub fn mount(api: ApiClient, registry: InvalidationRegistry, path: Option<String>) -> Self {
        Self::build(api, registry, path, None)
    }

    /// Like [`Resource::mount`], post-processing each successful response.
    pub fn mount_with(
        api: ApiClient,
        registry: InvalidationRegistry,
        path: Option<String>,
        transform: Transform<T>,
    ) -> Self {
        Self::build(api, registry, path, Some(transform))
    }

    fn build(
        api: ApiClient,
        registry: InvalidationRegistry,
        path: Option<String>,
        transform: Option<Transform<T>>,
    ) -> Self {
        let path = normalize(path);
        let (state, _rx) = watch::channel(ResourceState::idle(path.clone()));
        let inner = Arc::new(Inner {
            api,
            state,
            slot: Mutex::new(Slot {
                path: path.clone(),
                ..Default::default()
            }),
            mounted: AtomicBool::new(true),
            transform,
        });

        let resource = Resource {
            inner,
            registry,
            registration: Mutex::new(None),
        };
        if let Some(path) = path {
            resource.register(&path);
            resource.spawn_fetch();
        }
        resource
    }

    fn register(&self, path: &str) {
        let target: Weak<dyn Invalidate> = Arc::downgrade(&self.inner) as Weak<dyn Invalidate>;
        let registration = self.registry.register(path, target);
        *self.registration.lock().unwrap_or_else(|p| p.into_inner()) = Some(registration);
    }

    fn unregister(&self) {
        self.registration
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take();
    }

    fn spawn_fetch(&self) {
        Arc::clone(&self.inner).invalidate();
    }

    /// Fetches again and waits for the outcome. A no-op without a path.
    pub async fn refetch(&self) -> ClientResult<()> {
        self.inner.fetch().await
    }

    /// Moves the resource to another path.
    ///
    /// Data from the old path is dropped, and any response still in flight
    /// for it is discarded. An unchanged path does nothing.
    pub fn set_path(&self, path: Option<String>) {
        let path = normalize(path);
        {
            let mut slot = self.inner.slot();
            if slot.path == path {
                return;
            }
            debug!(from = ?slot.path, to = ?path, "Resource path changed");
            slot.path = path.clone();
            slot.epoch += 1;
            slot.in_flight = 0;
            let mut state = ResourceState::idle(path.clone());
            state.loading &= self.is_mounted();
            self.inner.state.send_replace(state);
        }

        self.unregister();
        if let Some(path) = path {
            if self.is_mounted() {
                self.register(&path);
                self.spawn_fetch();
            }
        }
    }

    /// Stops delivering updates. Responses that arrive later are dropped.
    pub fn unmount(&self) {
        if !self.inner.mounted.swap(false, Ordering::SeqCst) {
            return;
        }
        {
            let mut slot = self.inner.slot();
            slot.epoch += 1;
            slot.in_flight = 0;
        }
        self.unregister();
        self.inner.state.send_modify(|s| s.loading = false);
    }

    pub fn is_mounted(&self) -> bool {
        self.inner.mounted.load(Ordering::SeqCst)
    }

    pub fn path(&self) -> Option<String> {
        self.inner.slot().path.clone()
    }

    pub fn state(&self) -> ResourceState<T> {
        self.inner.state.borrow().clone()
    }

    pub fn data(&self) -> Option<T> {
        self.inner.state.borrow().data.clone()
    }

    pub fn loading(&self) -> bool {
        self.inner.state.borrow().loading
    }

    pub fn error(&self) -> Option<ClientError> {
        self.inner.state.borrow().error.clone()
    }

    /// Receiver that yields every state change.
    pub fn subscribe(&self) -> watch::Receiver<ResourceState<T>> {
        self.inner.state.subscribe()
    }
}

impl<T> Drop for Resource<T>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    fn drop(&mut self) {
        self.unmount();
    }
}

// =============================================================================
// Typed Resources
// =============================================================================

impl Resource<Profile> {
    pub fn profile(api: ApiClient, registry: InvalidationRegistry, user_id: Option<Id>) -> Self {
        Self::mount(api, registry, user_id.map(|id| QueryKey::Profile(id).path()))
    }
}

impl Resource<Vec<Category>> {
    /// Categories of one store. Items owned by other stores are dropped.
    pub fn categories(api: ApiClient, registry: InvalidationRegistry, store_id: Option<Id>) -> Self {
        Self::mount_with(
            api,
            registry,
            store_id.map(|id| QueryKey::Categories(id).path()),
            Box::new(|path, items| match QueryKey::from_path(path) {
                Some(QueryKey::Categories(id)) => scope_to_store(items, id),
                _ => items,
            }),
        )
    }
}

impl Resource<Vec<Product>> {
    /// Products of one store. Items owned by other stores are dropped.
    pub fn products(api: ApiClient, registry: InvalidationRegistry, store_id: Option<Id>) -> Self {
        Self::mount_with(
            api,
            registry,
            store_id.map(|id| QueryKey::Products(id).path()),
            Box::new(|path, items| match QueryKey::from_path(path) {
                Some(QueryKey::Products(id)) => scope_to_store(items, id),
                _ => items,
            }),
        )
    }
}

impl Resource<Vec<Order>> {
    pub fn orders(api: ApiClient, registry: InvalidationRegistry, store_id: Option<Id>) -> Self {
        Self::mount(api, registry, store_id.map(|id| QueryKey::Orders(id).path()))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
