//! # Domain Types
//!
//! Wire-level types exchanged with the marketplace backend.
//!
//! ## Entity Relationships
//! ```text
//! ┌──────────────┐        ┌──────────────┐        ┌──────────────┐
//! │   Session    │        │   Profile    │ 0..1   │    Store     │
//! │──────────────│        │──────────────│───────►│──────────────│
//! │ token        │  user  │ id, name     │        │ id, name     │
//! │ user ────────┼───────►│ role         │ 0..1   │ logo, banner │
//! └──────────────┘   id   │ store/driver │───┐    │ hours        │
//!                         └──────────────┘   │    └──────┬───────┘
//!                                            ▼           │ store_id
//!                                     ┌──────────────┐   ▼
//!                                     │    Driver    │ ┌──────────────────┐
//!                                     │ vehicle_*    │ │ Category/Product │
//!                                     │ is_available │ │ Order            │
//!                                     └──────────────┘ └──────────────────┘
//! ```
//!
//! The backend is loose about types (booleans as `0/1`, prices as strings,
//! `email` vs `identifier`), so deserialization here is tolerant while the
//! in-memory representation stays strict.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;

/// Server-assigned identifier.
pub type Id = i64;

/// Unknown fields kept so objects survive a save/load cycle unchanged.
pub type Extra = serde_json::Map<String, serde_json::Value>;

// =============================================================================
// Roles
// =============================================================================

/// Role attached to a user: `{ "id": 2, "role": "restaurant" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: Id,
    #[serde(default)]
    pub role: String,
}

pub const ROLE_ID_CUSTOMER: Id = 1;
pub const ROLE_ID_MERCHANT: Id = 2;
pub const ROLE_ID_DRIVER: Id = 3;

/// What a role means for navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleKind {
    Merchant,
    Driver,
    Customer,
    Unknown,
}

impl RoleKind {
    /// Resolves by role name first, falling back to the well-known ids.
    pub fn of(role: &Role) -> Self {
        match role.role.to_ascii_lowercase().as_str() {
            "restaurant" | "store" | "merchant" => return RoleKind::Merchant,
            "driver" | "delivery" => return RoleKind::Driver,
            "customer" | "client" | "user" => return RoleKind::Customer,
            _ => {}
        }
        match role.id {
            ROLE_ID_MERCHANT => RoleKind::Merchant,
            ROLE_ID_DRIVER => RoleKind::Driver,
            ROLE_ID_CUSTOMER => RoleKind::Customer,
            _ => RoleKind::Unknown,
        }
    }

    /// Where a freshly registered user of this role goes next.
    pub fn onboarding(&self) -> Onboarding {
        match self {
            RoleKind::Merchant => Onboarding::CreateStore,
            RoleKind::Driver => Onboarding::CreateDriverProfile,
            RoleKind::Customer | RoleKind::Unknown => Onboarding::Home,
        }
    }
}

/// Post-registration routing hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Onboarding {
    CreateStore,
    CreateDriverProfile,
    Home,
}

// =============================================================================
// Session
// =============================================================================

/// Minimal store reference carried on the user object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreRef {
    pub id: Id,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// The authenticated user as returned by `/auth/login`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Id,
    #[serde(default)]
    pub name: String,
    /// Email or phone used to sign in.
    #[serde(default, alias = "email")]
    pub identifier: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store: Option<StoreRef>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl User {
    pub fn role_kind(&self) -> RoleKind {
        RoleKind::of(&self.role)
    }
}

/// Authenticated identity plus bearer token.
///
/// A session without a role cannot be constructed: `role` is required when
/// deserializing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub user: User,
    #[serde(flatten)]
    pub extra: Extra,
}

impl Session {
    pub fn user_id(&self) -> Id {
        self.user.id
    }

    pub fn role_kind(&self) -> RoleKind {
        self.user.role_kind()
    }

    /// Store id known from the login payload, if any.
    pub fn store_id(&self) -> Option<Id> {
        self.user.store.as_ref().map(|s| s.id)
    }
}

// =============================================================================
// Store / Profile / Driver
// =============================================================================

/// A merchant's store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Store {
    pub id: Id,
    pub name: String,
    #[serde(default)]
    pub logo: Option<String>,
    #[serde(default)]
    pub banner: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
}

/// A driver's vehicle profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Driver {
    pub id: Id,
    #[serde(default)]
    pub user_id: Option<Id>,
    pub vehicle_type: String,
    pub vehicle_license_plate: String,
    pub vehicle_color: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub is_available: bool,
}

/// `/users/profile/{id}` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Id,
    #[serde(default)]
    pub name: String,
    #[serde(default, alias = "email")]
    pub identifier: String,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub store: Option<Store>,
    #[serde(default)]
    pub driver: Option<Driver>,
    #[serde(flatten)]
    pub extra: Extra,
}

// =============================================================================
// Catalog
// =============================================================================

/// Items that belong to exactly one store.
pub trait StoreScoped {
    fn store_id(&self) -> Id;
}

/// Keeps only the items owned by `store_id`.
pub fn scope_to_store<T: StoreScoped>(items: Vec<T>, store_id: Id) -> Vec<T> {
    items
        .into_iter()
        .filter(|item| item.store_id() == store_id)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: Id,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub store_id: Id,
}

impl StoreScoped for Category {
    fn store_id(&self) -> Id {
        self.store_id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: Id,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Money,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub category_id: Option<Id>,
    pub store_id: Id,
}

impl StoreScoped for Product {
    fn store_id(&self) -> Id {
        self.store_id
    }
}

// =============================================================================
// Orders
// =============================================================================

/// Order lifecycle status.
///
/// ```text
/// pending ──accept──► accepted ──► preparing ──► on_the_way ──► delivered
///    │                   │             │              │
///    └───────────────────┴──cancel─────┴──────────────┴──────► cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Accepted,
    Preparing,
    OnTheWay,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    pub const fn can_accept(&self) -> bool {
        matches!(self, OrderStatus::Pending)
    }

    pub const fn can_cancel(&self) -> bool {
        !self.is_terminal()
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Accepted => "accepted",
            OrderStatus::Preparing => "preparing",
            OrderStatus::OnTheWay => "on_the_way",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLineItem {
    #[serde(default)]
    pub product_id: Option<Id>,
    #[serde(default, alias = "product_name")]
    pub name: Option<String>,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
    #[serde(default)]
    pub price: Money,
}

fn default_quantity() -> i64 {
    1
}

impl OrderLineItem {
    pub fn line_total(&self) -> Money {
        self.price * self.quantity
    }
}

/// Customer attached to an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    #[serde(default)]
    pub id: Option<Id>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Id,
    pub status: OrderStatus,
    #[serde(default)]
    pub order: Vec<OrderLineItem>,
    pub total_price: Money,
    #[serde(default)]
    pub delivery_address: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub user: Option<Customer>,
    #[serde(default)]
    pub store_id: Option<Id>,
}

impl Order {
    /// Refuses to accept anything that is not pending.
    pub fn ensure_acceptable(&self) -> CoreResult<()> {
        if self.status.can_accept() {
            Ok(())
        } else {
            Err(CoreError::InvalidTransition {
                order_id: self.id,
                status: self.status,
                action: "accept",
            })
        }
    }

    /// Refuses to cancel a delivered or cancelled order.
    pub fn ensure_cancellable(&self) -> CoreResult<()> {
        if self.status.can_cancel() {
            Ok(())
        } else {
            Err(CoreError::InvalidTransition {
                order_id: self.id,
                status: self.status,
                action: "cancel",
            })
        }
    }
}

// =============================================================================
// Mutation Inputs
// =============================================================================

/// A locally picked image, identified by its URI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSource {
    pub uri: String,
}

impl ImageSource {
    pub fn new(uri: impl Into<String>) -> Self {
        Self { uri: uri.into() }
    }

    /// Last path segment of the URI.
    pub fn filename(&self) -> &str {
        let path = self.uri.split(['?', '#']).next().unwrap_or(&self.uri);
        match path.rsplit_once('/') {
            Some((_, name)) if !name.is_empty() => name,
            _ => path,
        }
    }

    /// MIME type guessed from the file extension.
    pub fn mime(&self) -> &'static str {
        let ext = self
            .filename()
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "jpg" | "jpeg" => "image/jpeg",
            "png" => "image/png",
            "gif" => "image/gif",
            "webp" => "image/webp",
            "heic" => "image/heic",
            _ => "application/octet-stream",
        }
    }

    /// Whether the image differs from what the server already has.
    pub fn differs_from(&self, baseline: Option<&str>) -> bool {
        baseline != Some(self.uri.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryInput {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProductInput {
    pub name: String,
    pub description: Option<String>,
    pub price: Money,
    pub category_id: Option<Id>,
    pub image: Option<ImageSource>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DriverInput {
    pub vehicle_type: String,
    pub vehicle_license_plate: String,
    pub vehicle_color: String,
    pub image: Option<ImageSource>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoreInput {
    pub name: String,
    pub address: String,
    pub phone: String,
    pub start_time: String,
    pub end_time: String,
    pub logo: Option<ImageSource>,
    pub banner: Option<ImageSource>,
}

// =============================================================================
// Location
// =============================================================================

/// A position fix from the device.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
}

/// Body of `/driver-locations/update-location`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationUpdate {
    pub driver_id: Id,
    pub latitude: f64,
    pub longitude: f64,
}

// =============================================================================
// Lenient Deserializers
// =============================================================================

mod lenient {
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum BoolLike {
        Bool(bool),
        Int(i64),
        Text(String),
    }

    /// Accepts `true`, `1`, `"1"` and `"true"`.
    pub fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        Ok(match Option::<BoolLike>::deserialize(deserializer)? {
            None => false,
            Some(BoolLike::Bool(b)) => b,
            Some(BoolLike::Int(i)) => i != 0,
            Some(BoolLike::Text(s)) => matches!(s.as_str(), "1" | "true"),
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
