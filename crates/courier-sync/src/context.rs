//! # Derived Context
//!
//! Pure projections of the signed-in user's profile resource.
//!
//! ```text
//! ResourceState<Profile>                 StoreView
//! ───────────────────────────────────    ─────────────────────────────────────
//! loading                          ───►  { store: None,    loading: true  }
//! loaded, profile.store = Some(s)  ───►  { store: Some(s), loading: false }
//! loaded, profile.store = None     ───►  { store: None,    loading: false }
//!                                         (merchant must create a store)
//! failed, no profile yet           ───►  { store: None,    error: Some(e) }
//!                                         (unknown, not "no store")
//! ```

use tokio::sync::watch;
use tracing::debug;

use courier_core::{Driver, Id, Profile, QueryKey, Store};

use crate::error::ClientError;
use crate::fetch::{Resource, ResourceState};
use crate::http::ApiClient;
use crate::invalidation::InvalidationRegistry;
use crate::session::SessionHandle;

#[derive(Debug, Clone)]
pub struct StoreView {
    pub store: Option<Store>,
    pub loading: bool,
    /// Last profile fetch error. With no store, the answer is unknown.
    pub error: Option<ClientError>,
}

impl StoreView {
    /// True only when a loaded profile really has no store.
    pub fn needs_store(&self) -> bool {
        !self.loading && self.error.is_none() && self.store.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct DriverView {
    pub driver: Option<Driver>,
    pub loading: bool,
    pub error: Option<ClientError>,
}

impl DriverView {
    /// True only when a loaded profile really has no vehicle profile.
    pub fn needs_driver_profile(&self) -> bool {
        !self.loading && self.error.is_none() && self.driver.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct ProfileView {
    pub profile: Option<Profile>,
    pub loading: bool,
    pub error: Option<ClientError>,
}

/// The store owned by the signed-in merchant.
///
/// While the profile is loading no store is reported, even if a previous
/// profile had one. A failed fetch carries its error so it is never mistaken
/// for a merchant without a store.
pub fn use_store(state: &ResourceState<Profile>) -> StoreView {
    StoreView {
        store: loaded(state).and_then(|p| p.store.clone()),
        loading: state.loading,
        error: state.error.clone(),
    }
}

/// The signed-in driver's vehicle profile, same rules as [`use_store`].
pub fn use_driver(state: &ResourceState<Profile>) -> DriverView {
    DriverView {
        driver: loaded(state).and_then(|p| p.driver.clone()),
        loading: state.loading,
        error: state.error.clone(),
    }
}

fn loaded(state: &ResourceState<Profile>) -> Option<&Profile> {
    if state.loading {
        None
    } else {
        state.data.as_ref()
    }
}

pub fn use_profile(state: &ResourceState<Profile>) -> ProfileView {
    ProfileView {
        profile: state.data.clone(),
        loading: state.loading,
        error: state.error.clone(),
    }
}

// =============================================================================
// Profile Context
// =============================================================================

/// Profile resource bound to whoever is signed in.
#[derive(Debug)]
pub struct ProfileContext {
    resource: Resource<Profile>,
    session: SessionHandle,
}

impl ProfileContext {
    pub fn new(api: ApiClient, registry: InvalidationRegistry) -> Self {
        let session = api.session().clone();
        let resource = Resource::profile(api, registry, session.user_id());
        ProfileContext { resource, session }
    }

    /// Re-points the resource after a login, logout or account switch.
    pub fn sync_with_session(&self) {
        let path = self.session.user_id().map(|id| QueryKey::Profile(id).path());
        debug!(?path, "Syncing profile with session");
        self.resource.set_path(path);
    }

    pub fn resource(&self) -> &Resource<Profile> {
        &self.resource
    }

    pub fn subscribe(&self) -> watch::Receiver<ResourceState<Profile>> {
        self.resource.subscribe()
    }

    pub fn store(&self) -> StoreView {
        use_store(&self.resource.state())
    }

    pub fn driver(&self) -> DriverView {
        use_driver(&self.resource.state())
    }

    pub fn profile(&self) -> ProfileView {
        use_profile(&self.resource.state())
    }

    /// Store id once the profile has loaded one.
    pub fn store_id(&self) -> Option<Id> {
        self.store().store.map(|s| s.id)
    }

    pub fn driver_id(&self) -> Option<Id> {
        self.driver().driver.map(|d| d.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn profile(with_store: bool) -> Profile {
        let mut raw = json!({"id": 7, "name": "Ana", "role": {"id": 2, "role": "restaurant"}});
        if with_store {
            raw["store"] = json!({"id": 8, "name": "Tacos"});
        }
        serde_json::from_value(raw).unwrap()
    }

    fn state(data: Option<Profile>, loading: bool) -> ResourceState<Profile> {
        ResourceState {
            data,
            loading,
            error: None,
            path: Some("/users/profile/7".into()),
        }
    }

    #[test]
    fn test_use_store_while_loading() {
        let view = use_store(&state(Some(profile(true)), true));
        assert!(view.store.is_none());
        assert!(view.loading);
        assert!(!view.needs_store());
    }

    #[test]
    fn test_use_store_loaded() {
        let view = use_store(&state(Some(profile(true)), false));
        assert_eq!(view.store.unwrap().id, 8);
        assert!(!view.loading);

        let view = use_store(&state(Some(profile(false)), false));
        assert!(view.store.is_none());
        assert!(view.needs_store());
    }

    #[test]
    fn test_failed_profile_is_not_a_missing_store() {
        let mut failed = state(None, false);
        failed.error = Some(ClientError::Network("connection refused".into()));

        let view = use_store(&failed);
        assert!(view.store.is_none());
        assert!(!view.loading);
        assert!(view.error.is_some());
        assert!(!view.needs_store());
        assert!(!use_driver(&failed).needs_driver_profile());
    }

    #[test]
    fn test_use_driver_and_profile() {
        let view = use_driver(&state(Some(profile(false)), false));
        assert_eq!(view.driver, None);
        assert!(!view.loading);
        assert!(view.needs_driver_profile());

        let view = use_profile(&state(None, true));
        assert!(view.profile.is_none());
        assert!(view.loading);
    }
}
