//! # Mutation Controllers
//!
//! One controller per entity. Each operation validates locally, sends one
//! request with the session's bearer token, and returns the server's answer
//! or a typed [`ClientError`](crate::ClientError).
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Controller         Writes                         Invalidates         │
//! │  ─────────────────  ─────────────────────────────  ─────────────────── │
//! │  CategoryController /categories/create|update|{id} Categories(store)   │
//! │  ProductController  /products/create|update|{id}   Products(store)     │
//! │  OrderController    /orders/{id}/accept|cancel     Orders(store)       │
//! │  DriverController   /drivers/create|{id}/toggle    Profile(user)       │
//! │  StoreController    /stores/create|update/{id}     Profile(user)       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Controllers never touch cached resources. Callers pass the result through
//! [`InvalidationRegistry::settle`](crate::InvalidationRegistry::settle).

pub mod category;
pub mod driver;
pub mod order;
pub mod product;
pub mod store;

pub use category::CategoryController;
pub use driver::DriverController;
pub use order::OrderController;
pub use product::ProductController;
pub use store::StoreController;

use serde::de::DeserializeOwned;
use serde_json::Value;

use courier_core::RoleKind;

use crate::error::{ClientError, ClientResult};
use crate::http::ApiClient;

/// Decodes an entity that may be bare or nested under `key`
/// (`{"category": {...}, "message": "..."}`).
pub(crate) fn entity<T: DeserializeOwned>(value: Value, key: &str) -> Option<T> {
    if let Some(nested) = value.get(key) {
        if let Ok(found) = serde_json::from_value(nested.clone()) {
            return Some(found);
        }
    }
    serde_json::from_value(value).ok()
}

pub(crate) fn expect_entity<T: DeserializeOwned>(value: Value, key: &str) -> ClientResult<T> {
    entity(value, key).ok_or_else(|| ClientError::Decode(format!("response did not contain a {key}")))
}

/// Fails unless the signed-in user has `role`.
pub(crate) fn require_role(api: &ApiClient, role: RoleKind, action: &str) -> ClientResult<()> {
    match api.session().role_kind() {
        None => Err(ClientError::NotAuthenticated),
        Some(kind) if kind == role => Ok(()),
        Some(kind) => Err(ClientError::NotPermitted(format!(
            "A {kind:?} account cannot {action}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::Category;
    use serde_json::json;

    #[test]
    fn test_entity_accepts_bare_and_nested() {
        let bare: Option<Category> =
            entity(json!({"id": 1, "name": "Drinks", "store_id": 8}), "category");
        assert_eq!(bare.unwrap().id, 1);

        let nested: Option<Category> = entity(
            json!({"message": "created", "category": {"id": 2, "name": "Food", "store_id": 8}}),
            "category",
        );
        assert_eq!(nested.unwrap().id, 2);

        let missing: ClientResult<Category> = expect_entity(json!({"message": "ok"}), "category");
        assert!(matches!(missing, Err(ClientError::Decode(_))));
    }
}
