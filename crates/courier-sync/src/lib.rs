//! # courier-sync: Data Sync Layer for the Courier Client
//!
//! Session handling, cached reads, mutations and realtime notifications for
//! the merchant and driver apps of a delivery marketplace.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Courier Client                                 │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                        CourierClient                             │  │
//! │  │  Opens storage, hydrates the session, hands out everything else │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │                                         │
//! │         ┌─────────────────────┼─────────────────────┐                  │
//! │         ▼                     ▼                     ▼                   │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────┐    │
//! │  │ SessionStore   │  │  Resource<T>   │  │  Controllers           │    │
//! │  │                │  │                │  │                        │    │
//! │  │ login/register │  │ {data, loading │  │ category, product,     │    │
//! │  │ logout/hydrate │  │  error} + GET  │  │ order, driver, store   │    │
//! │  │ persisted JSON │  │ refetch        │  │ local validation first │    │
//! │  └────────────────┘  └───────▲────────┘  └───────────┬────────────┘    │
//! │                              │                       │ settle()        │
//! │                      ┌───────┴───────────────────────▼──────┐          │
//! │                      │        InvalidationRegistry          │          │
//! │                      └───────▲──────────────────────────────┘          │
//! │                              │ new_order / order_updated               │
//! │  ┌───────────────────────────┴──────┐  ┌──────────────────────────┐    │
//! │  │ NotificationChannel              │  │ LocationReporter         │    │
//! │  │ Socket.IO, backoff, room join,   │  │ driver only, interval    │    │
//! │  │ unread counter                   │  │ position posts           │    │
//! │  └──────────────────────────────────┘  └──────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`client`] - `CourierClient` wiring
//! - [`config`] - TOML + environment configuration
//! - [`error`] - `ClientError` and its four user-facing kinds
//! - [`session`] - Session store and the read-only session handle
//! - [`http`] - REST client with bearer auth and envelope handling
//! - [`fetch`] - Mounted resources
//! - [`invalidation`] - Mutation and event driven refetches
//! - [`controllers`] - Entity mutations
//! - [`context`] - Store/profile/driver projections
//! - [`realtime`] - Notification socket
//! - [`location`] - Driver location reporting
//!
//! ## Usage
//!
//! ```rust,ignore
//! use courier_sync::{ClientConfig, CourierClient, Mutation};
//!
//! let client = CourierClient::open(ClientConfig::load_or_default(None)).await?;
//! client.session().login("ana@example.com", "secret").await;
//!
//! let orders = client.orders_resource(Some(8));
//! let order = orders.data().unwrap_or_default().remove(0);
//! client.registry().settle(
//!     &Mutation::AcceptOrder { store_id: 8, order_id: order.id },
//!     client.orders().accept(&order).await,
//! )?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod client;
pub mod config;
pub mod context;
pub mod controllers;
pub mod error;
pub mod fetch;
pub mod http;
pub mod inflight;
pub mod invalidation;
pub mod location;
pub mod realtime;
pub mod session;
pub mod upload;

// =============================================================================
// Re-exports
// =============================================================================

pub use client::CourierClient;
pub use config::{ApiSettings, ClientConfig, LocationSettings, SocketSettings, StorageSettings};
pub use context::{use_driver, use_profile, use_store, DriverView, ProfileContext, ProfileView, StoreView};
pub use controllers::{
    CategoryController, DriverController, OrderController, ProductController, StoreController,
};
pub use error::{ClientError, ClientResult, ErrorKind, UserFacingError};
pub use fetch::{Resource, ResourceState};
pub use http::ApiClient;
pub use invalidation::{Invalidate, InvalidationRegistry, Registration};
pub use location::{LocationReporter, PositionSource};
pub use realtime::{ConnectionState, NotificationChannel, NotificationEvent, RoomScope};
pub use session::{AuthOutcome, SessionHandle, SessionState, SessionStore};

pub use courier_core::{Mutation, QueryKey};
