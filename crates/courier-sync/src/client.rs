//! # Courier Client
//!
//! Wires storage, session, HTTP, controllers and the invalidation registry
//! into one value an application holds for its lifetime.
//!
//! ## Startup
//! ```text
//! ClientConfig ──► Database::new (migrations) ──► SessionHandle
//!                                                   │
//!                      ApiClient(base_url, handle) ◄┘
//!                           │
//!        ┌──────────────────┼──────────────────────────┐
//!        ▼                  ▼                          ▼
//!   SessionStore       Controllers x5           Resource / Channel
//!   hydrate() ◄── must finish before routing    factories
//! ```

use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use courier_core::{Category, Id, Order, Product, Profile};
use courier_store::{Database, DbConfig, ThemePreference};

use crate::config::ClientConfig;
use crate::context::ProfileContext;
use crate::controllers::{
    CategoryController, DriverController, OrderController, ProductController, StoreController,
};
use crate::error::ClientResult;
use crate::fetch::Resource;
use crate::http::ApiClient;
use crate::invalidation::InvalidationRegistry;
use crate::location::{LocationReporter, PositionSource};
use crate::realtime::{NotificationChannel, RoomScope};
use crate::session::{SessionHandle, SessionStore};

#[derive(Debug)]
pub struct CourierClient {
    config: ClientConfig,
    db: Database,
    api: ApiClient,
    sessions: SessionStore,
    registry: InvalidationRegistry,
    categories: CategoryController,
    products: ProductController,
    orders: OrderController,
    drivers: DriverController,
    stores: StoreController,
}

impl CourierClient {
    /// Opens the configured database and restores any saved session.
    pub async fn open(config: ClientConfig) -> ClientResult<Self> {
        config.validate()?;
        let db = Database::new(DbConfig::new(config.db_path())).await?;
        Self::with_database(config, db).await
    }

    /// Same as [`CourierClient::open`] over an existing database.
    pub async fn with_database(config: ClientConfig, db: Database) -> ClientResult<Self> {
        let handle = SessionHandle::new(db.clone());
        let api = ApiClient::new(&config.api, handle)?;
        let sessions = SessionStore::new(api.clone());
        sessions.hydrate().await;

        info!(
            base_url = %api.base_url(),
            signed_in = api.session().is_authenticated(),
            "Courier client ready"
        );

        Ok(CourierClient {
            categories: CategoryController::new(api.clone()),
            products: ProductController::new(api.clone()),
            orders: OrderController::new(api.clone()),
            drivers: DriverController::new(api.clone()),
            stores: StoreController::new(api.clone()),
            registry: InvalidationRegistry::new(),
            config,
            db,
            api,
            sessions,
        })
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn session(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn session_handle(&self) -> &SessionHandle {
        self.api.session()
    }

    pub fn registry(&self) -> &InvalidationRegistry {
        &self.registry
    }

    pub fn categories(&self) -> &CategoryController {
        &self.categories
    }

    pub fn products(&self) -> &ProductController {
        &self.products
    }

    pub fn orders(&self) -> &OrderController {
        &self.orders
    }

    pub fn drivers(&self) -> &DriverController {
        &self.drivers
    }

    pub fn stores(&self) -> &StoreController {
        &self.stores
    }

    // =========================================================================
    // Resources
    // =========================================================================

    pub fn profile_context(&self) -> ProfileContext {
        ProfileContext::new(self.api.clone(), self.registry.clone())
    }

    pub fn profile_resource(&self, user_id: Option<Id>) -> Resource<Profile> {
        Resource::profile(self.api.clone(), self.registry.clone(), user_id)
    }

    pub fn categories_resource(&self, store_id: Option<Id>) -> Resource<Vec<Category>> {
        Resource::categories(self.api.clone(), self.registry.clone(), store_id)
    }

    pub fn products_resource(&self, store_id: Option<Id>) -> Resource<Vec<Product>> {
        Resource::products(self.api.clone(), self.registry.clone(), store_id)
    }

    pub fn orders_resource(&self, store_id: Option<Id>) -> Resource<Vec<Order>> {
        Resource::orders(self.api.clone(), self.registry.clone(), store_id)
    }

    // =========================================================================
    // Background Services
    // =========================================================================

    pub fn notifications(&self, scope: RoomScope) -> ClientResult<NotificationChannel> {
        NotificationChannel::connect(&self.config.socket, scope, self.registry.clone())
    }

    /// Starts location reporting at the configured interval.
    pub fn start_location_reporting(
        &self,
        driver_id: Id,
        source: Arc<dyn PositionSource>,
    ) -> ClientResult<LocationReporter> {
        self.start_location_reporting_every(driver_id, source, self.config.location.interval())
    }

    pub fn start_location_reporting_every(
        &self,
        driver_id: Id,
        source: Arc<dyn PositionSource>,
        interval: Duration,
    ) -> ClientResult<LocationReporter> {
        LocationReporter::start(self.api.clone(), driver_id, source, interval)
    }

    // =========================================================================
    // Preferences
    // =========================================================================

    pub async fn theme(&self) -> ClientResult<ThemePreference> {
        Ok(self.db.preferences().theme().await?)
    }

    pub async fn set_theme(&self, theme: ThemePreference) -> ClientResult<()> {
        Ok(self.db.preferences().set_theme(theme).await?)
    }
}
