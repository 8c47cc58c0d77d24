//! # Notification Channel
//!
//! One socket scoped to one room, routing server events into the cache.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   Transport task ──TransportEvent──► Router task                        │
//! │                                         │                               │
//! │          Connected ─────────────────────┼──► log                        │
//! │          new_order ─────────────────────┼──► unread += 1                │
//! │                                         ├──► invalidate Orders(store)   │
//! │                                         └──► broadcast to subscribers   │
//! │          order_updated ─────────────────────► invalidate + broadcast    │
//! │                                                                         │
//! │   rescope(new) ── shutdown old transport ── await both tasks ──►        │
//! │                   unread = 0 ── spawn new transport + router            │
//! │                                                                         │
//! │   Dropping the channel closes the transport's shutdown sender, which   │
//! │   ends both tasks.                                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use courier_core::{Id, QueryKey, RoleKind};

use super::protocol::NotificationEvent;
use super::transport::{ConnectionState, JoinRequest, Transport, TransportConfig, TransportEvent, TransportHandle};
use crate::config::SocketSettings;
use crate::error::ClientResult;
use crate::invalidation::InvalidationRegistry;

// =============================================================================
// Room Scope
// =============================================================================

/// Which room the socket joins after connecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomScope {
    /// `join_store`, keyed by store id.
    Store(Id),
    /// `join-restaurant`, kept for older restaurant rooms.
    Restaurant(Id),
    /// `join_driver`, keyed by driver id.
    Driver(Id),
}

impl RoomScope {
    pub fn join_event(&self) -> &'static str {
        match self {
            RoomScope::Store(_) => "join_store",
            RoomScope::Restaurant(_) => "join-restaurant",
            RoomScope::Driver(_) => "join_driver",
        }
    }

    pub fn id(&self) -> Id {
        match self {
            RoomScope::Store(id) | RoomScope::Restaurant(id) | RoomScope::Driver(id) => *id,
        }
    }

    /// Store whose order list this room's events refresh.
    pub fn store_id(&self) -> Option<Id> {
        match self {
            RoomScope::Store(id) | RoomScope::Restaurant(id) => Some(*id),
            RoomScope::Driver(_) => None,
        }
    }

    /// Room for a signed-in role, once its store or driver profile is known.
    pub fn for_role(role: RoleKind, store_id: Option<Id>, driver_id: Option<Id>) -> Option<Self> {
        match role {
            RoleKind::Merchant => store_id.map(RoomScope::Store),
            RoleKind::Driver => driver_id.map(RoomScope::Driver),
            RoleKind::Customer | RoleKind::Unknown => None,
        }
    }

    fn join_request(&self) -> JoinRequest {
        JoinRequest {
            event: self.join_event().to_string(),
            payload: Value::from(self.id()),
        }
    }
}

// =============================================================================
// Notification Channel
// =============================================================================

struct Active {
    scope: RoomScope,
    transport: TransportHandle,
    router: JoinHandle<()>,
}

impl Active {
    /// Closes the socket and waits for both tasks to exit.
    async fn stop(self) {
        self.transport.shutdown().await;
        if let Err(e) = self.router.await {
            warn!(error = %e, "Notification router ended abnormally");
        }
        debug!(id = self.scope.id(), "Notification channel stopped");
    }
}

/// Realtime notifications for one room.
pub struct NotificationChannel {
    settings: SocketSettings,
    registry: InvalidationRegistry,
    state: Arc<watch::Sender<ConnectionState>>,
    unread: Arc<watch::Sender<u64>>,
    events: broadcast::Sender<NotificationEvent>,
    scope: watch::Sender<Option<RoomScope>>,
    /// Held across a whole stop/start so lifecycle calls never interleave.
    active: Mutex<Option<Active>>,
}

impl std::fmt::Debug for NotificationChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationChannel")
            .field("scope", &self.scope())
            .field("state", &self.connection_state())
            .field("unread", &self.unread())
            .finish()
    }
}

impl NotificationChannel {
    /// Opens the socket and starts joining `scope`. Connection failures are
    /// never returned; they show up in [`NotificationChannel::is_connected`].
    pub fn connect(
        settings: &SocketSettings,
        scope: RoomScope,
        registry: InvalidationRegistry,
    ) -> ClientResult<Self> {
        let (events, _) = broadcast::channel(64);
        let mut channel = NotificationChannel {
            settings: settings.clone(),
            registry,
            state: Arc::new(watch::channel(ConnectionState::Disconnected).0),
            unread: Arc::new(watch::channel(0).0),
            events,
            scope: watch::channel(None).0,
            active: Mutex::new(None),
        };
        let active = channel.spawn(scope)?;
        *channel.active.get_mut() = Some(active);
        channel.scope.send_replace(Some(scope));
        Ok(channel)
    }

    fn spawn(&self, scope: RoomScope) -> ClientResult<Active> {
        let config = TransportConfig::from_settings(&self.settings, Some(scope.join_request()))?;
        let (transport, incoming) = Transport::spawn(config, Arc::clone(&self.state));
        let router = tokio::spawn(route(
            scope,
            incoming,
            self.registry.clone(),
            Arc::clone(&self.unread),
            self.events.clone(),
        ));

        info!(room = scope.join_event(), id = scope.id(), "Notification channel started");
        Ok(Active {
            scope,
            transport,
            router,
        })
    }

    /// Leaves the current room and joins another.
    ///
    /// The old socket is fully closed before the new one opens, and the
    /// unread counter starts again from zero. Concurrent calls run one after
    /// another; the last one decides the room.
    pub async fn rescope(&self, scope: RoomScope) -> ClientResult<()> {
        let mut active = self.active.lock().await;
        if active.as_ref().map(|a| a.scope) == Some(scope) {
            return Ok(());
        }
        if let Some(old) = active.take() {
            self.scope.send_replace(None);
            old.stop().await;
        }
        self.unread.send_replace(0);
        *active = Some(self.spawn(scope)?);
        self.scope.send_replace(Some(scope));
        Ok(())
    }

    /// Closes the socket and waits for it. The channel stays usable through
    /// [`NotificationChannel::rescope`].
    pub async fn disconnect(&self) {
        let mut active = self.active.lock().await;
        if let Some(old) = active.take() {
            self.scope.send_replace(None);
            old.stop().await;
        }
    }

    pub fn scope(&self) -> Option<RoomScope> {
        *self.scope.borrow()
    }

    pub fn is_connected(&self) -> bool {
        *self.state.borrow() == ConnectionState::Connected
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn watch_connection(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub fn unread(&self) -> u64 {
        *self.unread.borrow()
    }

    pub fn watch_unread(&self) -> watch::Receiver<u64> {
        self.unread.subscribe()
    }

    pub fn mark_all_read(&self) {
        self.unread.send_replace(0);
    }

    /// Typed events received from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<NotificationEvent> {
        self.events.subscribe()
    }
}

async fn route(
    scope: RoomScope,
    mut incoming: mpsc::Receiver<TransportEvent>,
    registry: InvalidationRegistry,
    unread: Arc<watch::Sender<u64>>,
    events: broadcast::Sender<NotificationEvent>,
) {
    while let Some(event) = incoming.recv().await {
        match event {
            TransportEvent::Connected { sid } => {
                info!(?sid, room = scope.join_event(), id = scope.id(), "Notifications connected");
            }
            TransportEvent::Disconnected => {
                info!("Notifications disconnected");
            }
            TransportEvent::Notification(event) => {
                match &event {
                    NotificationEvent::NewOrder { .. } => {
                        unread.send_modify(|n| *n += 1);
                        refresh_orders(&scope, &registry);
                        info!(unread = *unread.borrow(), "New order received");
                    }
                    NotificationEvent::OrderUpdated { .. } => {
                        refresh_orders(&scope, &registry);
                        debug!("Order update received");
                    }
                    NotificationEvent::Other { name, .. } => {
                        debug!(event = %name, "Unhandled notification");
                    }
                }
                // No subscribers is fine.
                let _ = events.send(event);
            }
        }
    }
}

fn refresh_orders(scope: &RoomScope, registry: &InvalidationRegistry) {
    if let Some(store_id) = scope.store_id() {
        registry.invalidate(&QueryKey::Orders(store_id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_scope_events() {
        assert_eq!(RoomScope::Store(8).join_event(), "join_store");
        assert_eq!(RoomScope::Restaurant(8).join_event(), "join-restaurant");
        assert_eq!(RoomScope::Driver(3).join_event(), "join_driver");
        assert_eq!(RoomScope::Driver(3).store_id(), None);
        assert_eq!(RoomScope::Store(8).join_request().payload, Value::from(8));
    }

    #[test]
    fn test_room_for_role() {
        assert_eq!(
            RoomScope::for_role(RoleKind::Merchant, Some(8), None),
            Some(RoomScope::Store(8))
        );
        assert_eq!(RoomScope::for_role(RoleKind::Merchant, None, Some(1)), None);
        assert_eq!(
            RoomScope::for_role(RoleKind::Driver, None, Some(4)),
            Some(RoomScope::Driver(4))
        );
        assert_eq!(RoomScope::for_role(RoleKind::Customer, Some(1), Some(1)), None);
    }

    #[tokio::test]
    async fn test_new_order_routing() {
        let (tx, rx) = mpsc::channel(8);
        let registry = InvalidationRegistry::new();
        let unread = Arc::new(watch::channel(0u64).0);
        let (events, mut sub) = broadcast::channel(8);

        let router = tokio::spawn(route(
            RoomScope::Store(8),
            rx,
            registry,
            Arc::clone(&unread),
            events,
        ));

        tx.send(TransportEvent::Notification(NotificationEvent::NewOrder {
            payload: Value::Null,
        }))
        .await
        .unwrap();
        tx.send(TransportEvent::Notification(NotificationEvent::OrderUpdated {
            payload: Value::Null,
        }))
        .await
        .unwrap();
        drop(tx);
        router.await.unwrap();

        assert_eq!(*unread.borrow(), 1);
        assert_eq!(sub.recv().await.unwrap().name(), "new_order");
        assert_eq!(sub.recv().await.unwrap().name(), "order_updated");
    }
}
