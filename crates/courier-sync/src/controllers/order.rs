//! Order status transitions.
//!
//! ```text
//! accept(order) ─► pending? ──no──► InvalidTransition (no request)
//!                     │yes
//!                     ▼
//!               already submitting? ──yes──► Busy (no request)
//!                     │no
//!                     ▼
//!               PUT /orders/{id}/accept ─► Order (server copy, or local
//!                                          copy with the new status)
//! ```

use serde_json::Value;
use tracing::{info, instrument};

use courier_core::{Id, Order, OrderStatus, QueryKey};

use super::entity;
use crate::error::{ClientError, ClientResult};
use crate::http::ApiClient;
use crate::inflight::InFlightSet;

#[derive(Debug, Clone)]
pub struct OrderController {
    api: ApiClient,
    in_flight: InFlightSet,
}

impl OrderController {
    pub fn new(api: ApiClient) -> Self {
        OrderController {
            api,
            in_flight: InFlightSet::new(),
        }
    }

    pub async fn list(&self, store_id: Id) -> ClientResult<Vec<Order>> {
        self.api.get(&QueryKey::Orders(store_id).path()).await
    }

    /// True while an accept or cancel for this order is being sent.
    pub fn is_submitting(&self, order_id: Id) -> bool {
        self.in_flight.contains(order_id)
    }

    #[instrument(skip(self, order), fields(order_id = order.id, status = %order.status))]
    pub async fn accept(&self, order: &Order) -> ClientResult<Order> {
        order.ensure_acceptable()?;
        self.transition(order, "accept", OrderStatus::Accepted).await
    }

    #[instrument(skip(self, order), fields(order_id = order.id, status = %order.status))]
    pub async fn cancel(&self, order: &Order) -> ClientResult<Order> {
        order.ensure_cancellable()?;
        self.transition(order, "cancel", OrderStatus::Cancelled).await
    }

    async fn transition(
        &self,
        order: &Order,
        action: &'static str,
        target: OrderStatus,
    ) -> ClientResult<Order> {
        let _guard = self.in_flight.try_acquire(order.id).ok_or(ClientError::Busy {
            action,
            entity: "order",
            id: order.id,
        })?;

        let value: Value = self
            .api
            .put_empty(&format!("/orders/{}/{action}", order.id))
            .await?;

        let updated = entity::<Order>(value, "order").unwrap_or_else(|| Order {
            status: target,
            ..order.clone()
        });
        info!(action, new_status = %updated.status, "Order transition applied");
        Ok(updated)
    }
}
