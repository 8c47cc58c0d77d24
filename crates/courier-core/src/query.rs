//! # Query Keys and Mutation Effects
//!
//! A [`QueryKey`] names one cached server resource. A [`Mutation`] names one
//! remote write. The only link between the two is [`Mutation::invalidates`],
//! the single table that says which cached views a write makes stale.
//!
//! ```text
//! ┌──────────────────────────────┐        ┌──────────────────────────────┐
//! │ Mutation                     │        │ QueryKey → path              │
//! │──────────────────────────────│        │──────────────────────────────│
//! │ Create/Update/DeleteCategory │───────►│ Categories(s) /categories/   │
//! │                              │        │               store/{s}      │
//! │ Create/Update/DeleteProduct  │───────►│ Products(s)   /products/     │
//! │                              │        │               store/{s}      │
//! │ AcceptOrder / CancelOrder    │───────►│ Orders(s)     /orders/       │
//! │                              │        │               store/{s}      │
//! │ CreateDriver / ToggleDriver  │───┐    │                              │
//! │ CreateStore / UpdateStore    │───┴───►│ Profile(u)    /users/        │
//! │                              │        │               profile/{u}    │
//! └──────────────────────────────┘        └──────────────────────────────┘
//! ```

use std::fmt;

use crate::types::Id;

// =============================================================================
// Query Key
// =============================================================================

/// Identity of a cached server resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKey {
    /// `/users/profile/{user_id}`
    Profile(Id),
    /// `/categories/store/{store_id}`
    Categories(Id),
    /// `/products/store/{store_id}`
    Products(Id),
    /// `/orders/store/{store_id}`
    Orders(Id),
}

impl QueryKey {
    /// Endpoint path, relative to the API base URL.
    pub fn path(&self) -> String {
        match self {
            QueryKey::Profile(id) => format!("/users/profile/{id}"),
            QueryKey::Categories(id) => format!("/categories/store/{id}"),
            QueryKey::Products(id) => format!("/products/store/{id}"),
            QueryKey::Orders(id) => format!("/orders/store/{id}"),
        }
    }

    /// Recognizes a path produced by [`QueryKey::path`].
    pub fn from_path(path: &str) -> Option<Self> {
        let path = path.trim_end_matches('/');
        let (prefix, id) = path.rsplit_once('/')?;
        let id: Id = id.parse().ok()?;
        match prefix {
            "/users/profile" => Some(QueryKey::Profile(id)),
            "/categories/store" => Some(QueryKey::Categories(id)),
            "/products/store" => Some(QueryKey::Products(id)),
            "/orders/store" => Some(QueryKey::Orders(id)),
            _ => None,
        }
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

// =============================================================================
// Mutation
// =============================================================================

/// A remote write, carrying the scoping ids needed to find stale views.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    CreateCategory { store_id: Id },
    UpdateCategory { store_id: Id, category_id: Id },
    DeleteCategory { store_id: Id, category_id: Id },
    CreateProduct { store_id: Id },
    UpdateProduct { store_id: Id, product_id: Id },
    DeleteProduct { store_id: Id, product_id: Id },
    AcceptOrder { store_id: Id, order_id: Id },
    CancelOrder { store_id: Id, order_id: Id },
    CreateDriver { user_id: Id },
    ToggleDriverAvailability { user_id: Id, driver_id: Id },
    CreateStore { user_id: Id },
    UpdateStore { user_id: Id, store_id: Id },
}

impl Mutation {
    /// Query keys made stale by a successful run of this mutation.
    pub fn invalidates(&self) -> Vec<QueryKey> {
        match *self {
            Mutation::CreateCategory { store_id }
            | Mutation::UpdateCategory { store_id, .. } => {
                vec![QueryKey::Categories(store_id)]
            }
            // Products reference their category, so product lists go too.
            Mutation::DeleteCategory { store_id, .. } => {
                vec![QueryKey::Categories(store_id), QueryKey::Products(store_id)]
            }
            Mutation::CreateProduct { store_id }
            | Mutation::UpdateProduct { store_id, .. }
            | Mutation::DeleteProduct { store_id, .. } => {
                vec![QueryKey::Products(store_id)]
            }
            Mutation::AcceptOrder { store_id, .. } | Mutation::CancelOrder { store_id, .. } => {
                vec![QueryKey::Orders(store_id)]
            }
            Mutation::CreateDriver { user_id }
            | Mutation::ToggleDriverAvailability { user_id, .. }
            | Mutation::CreateStore { user_id }
            | Mutation::UpdateStore { user_id, .. } => vec![QueryKey::Profile(user_id)],
        }
    }

    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Mutation::CreateCategory { .. } => "create_category",
            Mutation::UpdateCategory { .. } => "update_category",
            Mutation::DeleteCategory { .. } => "delete_category",
            Mutation::CreateProduct { .. } => "create_product",
            Mutation::UpdateProduct { .. } => "update_product",
            Mutation::DeleteProduct { .. } => "delete_product",
            Mutation::AcceptOrder { .. } => "accept_order",
            Mutation::CancelOrder { .. } => "cancel_order",
            Mutation::CreateDriver { .. } => "create_driver",
            Mutation::ToggleDriverAvailability { .. } => "toggle_driver_availability",
            Mutation::CreateStore { .. } => "create_store",
            Mutation::UpdateStore { .. } => "update_store",
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
