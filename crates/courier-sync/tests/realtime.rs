//! Notification channel against the mock Socket.IO server.

mod common;

use common::*;
use courier_core::RoleKind;
use courier_sync::{ConnectionState, NotificationEvent, RoomScope};
use serde_json::{json, Value};
use std::time::Duration;

const SETTLE: Duration = Duration::from_millis(200);
const WAIT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn test_connect_joins_the_store_room() {
    let backend = MockBackend::spawn().await;
    let client = backend.client().await;
    login_merchant(&client).await;

    let session = client.session().current().unwrap();
    let scope = RoomScope::for_role(session.role_kind(), session.store_id(), None).unwrap();
    assert_eq!(session.role_kind(), RoleKind::Merchant);

    let channel = client.notifications(scope).unwrap();
    assert!(wait_until(WAIT, || channel.is_connected()).await);
    assert!(wait_until(WAIT, || !backend.joins().is_empty()).await);

    assert_eq!(
        backend.joins(),
        vec![("join_store".to_string(), Value::from(MERCHANT_STORE_ID))]
    );
    assert_eq!(channel.scope(), Some(RoomScope::Store(MERCHANT_STORE_ID)));
    assert_eq!(channel.unread(), 0);
}

#[tokio::test]
async fn test_new_order_counts_unread_and_refetches_once() {
    let backend = MockBackend::spawn().await;
    let client = backend.client().await;
    login_merchant(&client).await;

    let orders = client.orders_resource(Some(MERCHANT_STORE_ID));
    assert!(wait_until(WAIT, || orders.data().is_some()).await);

    let channel = client
        .notifications(RoomScope::Store(MERCHANT_STORE_ID))
        .unwrap();
    let mut events = channel.subscribe();
    assert!(wait_until(WAIT, || channel.is_connected()).await);

    let order = json!({ "id": 4, "status": "pending", "total_price": "7.00", "store_id": MERCHANT_STORE_ID });
    backend.add_order(order.clone());
    backend.emit("new_order", order);

    let event = tokio::time::timeout(WAIT, events.recv())
        .await
        .expect("event should arrive")
        .unwrap();
    assert!(matches!(event, NotificationEvent::NewOrder { ref payload } if payload["id"] == 4));

    assert!(wait_until(WAIT, || channel.unread() == 1).await);
    assert!(wait_until(WAIT, || orders.data().map(|o| o.len()) == Some(4)).await);
    tokio::time::sleep(SETTLE).await;
    assert_eq!(backend.hits("/orders/store/8"), 2);

    channel.mark_all_read();
    assert_eq!(channel.unread(), 0);
}

#[tokio::test]
async fn test_order_update_refetches_without_counting() {
    let backend = MockBackend::spawn().await;
    let client = backend.client().await;
    login_merchant(&client).await;

    let orders = client.orders_resource(Some(MERCHANT_STORE_ID));
    assert!(wait_until(WAIT, || orders.data().is_some()).await);
    let channel = client
        .notifications(RoomScope::Store(MERCHANT_STORE_ID))
        .unwrap();
    assert!(wait_until(WAIT, || channel.is_connected()).await);

    backend.emit("order_updated", json!({ "id": 1, "status": "preparing" }));
    backend.emit("promo", json!({ "text": "hello" }));

    assert!(wait_until(WAIT, || backend.hits("/orders/store/8") == 2).await);
    tokio::time::sleep(SETTLE).await;
    assert_eq!(channel.unread(), 0);
    assert_eq!(backend.hits("/orders/store/8"), 2);
}

#[tokio::test]
async fn test_reconnect_rejoins_the_room() {
    let backend = MockBackend::spawn().await;
    let client = backend.client().await;
    login_merchant(&client).await;

    let channel = client
        .notifications(RoomScope::Store(MERCHANT_STORE_ID))
        .unwrap();
    let mut states = channel.watch_connection();
    assert!(wait_until(WAIT, || backend.joins().len() == 1).await);
    assert!(channel.is_connected());
    states.borrow_and_update();

    backend.kick_sockets();
    tokio::time::timeout(WAIT, states.wait_for(|s| *s != ConnectionState::Connected))
        .await
        .expect("loss should be observed")
        .unwrap();

    assert!(wait_until(WAIT, || backend.joins().len() == 2).await);
    assert!(wait_until(WAIT, || channel.is_connected()).await);
    assert_eq!(backend.joins()[1].0, "join_store");
    assert_eq!(backend.socket_connections(), 1);
}

#[tokio::test]
async fn test_rescope_resets_unread_and_switches_room() {
    let backend = MockBackend::spawn().await;
    let client = backend.client().await;
    login_merchant(&client).await;

    let channel = client
        .notifications(RoomScope::Store(MERCHANT_STORE_ID))
        .unwrap();
    assert!(wait_until(WAIT, || channel.is_connected()).await);
    backend.emit("new_order", json!({ "id": 99 }));
    assert!(wait_until(WAIT, || channel.unread() == 1).await);

    // Same room: nothing changes.
    channel
        .rescope(RoomScope::Store(MERCHANT_STORE_ID))
        .await
        .unwrap();
    assert_eq!(channel.unread(), 1);

    channel.rescope(RoomScope::Restaurant(12)).await.unwrap();
    assert_eq!(channel.unread(), 0);
    assert_eq!(channel.scope(), Some(RoomScope::Restaurant(12)));

    assert!(wait_until(WAIT, || backend.joins().len() == 2).await);
    assert_eq!(
        backend.joins()[1],
        ("join-restaurant".to_string(), Value::from(12))
    );
    assert!(wait_until(WAIT, || backend.socket_connections() == 1).await);
}

#[tokio::test]
async fn test_overlapping_rescopes_leave_one_live_socket() {
    let backend = MockBackend::spawn().await;
    let client = backend.client().await;
    login_merchant(&client).await;

    let channel = client
        .notifications(RoomScope::Store(MERCHANT_STORE_ID))
        .unwrap();
    assert!(wait_until(WAIT, || channel.is_connected()).await);

    let (first, second) = tokio::join!(
        channel.rescope(RoomScope::Store(20)),
        channel.rescope(RoomScope::Store(21))
    );
    first.unwrap();
    second.unwrap();

    // Calls are served in order, so the later one owns the channel.
    assert_eq!(channel.scope(), Some(RoomScope::Store(21)));
    assert!(wait_until(WAIT, || channel.is_connected()).await);
    assert!(wait_until(WAIT, || {
        backend.joins().last() == Some(&("join_store".to_string(), Value::from(21)))
    })
    .await);

    tokio::time::sleep(SETTLE).await;
    assert!(channel.is_connected());
    assert_eq!(backend.socket_connections(), 1);
    assert_eq!(
        backend.joins().last(),
        Some(&("join_store".to_string(), Value::from(21)))
    );
}

#[tokio::test]
async fn test_driver_room_does_not_touch_store_orders() {
    let backend = MockBackend::spawn().await;
    let client = backend.client().await;
    login_merchant(&client).await;

    let orders = client.orders_resource(Some(MERCHANT_STORE_ID));
    assert!(wait_until(WAIT, || orders.data().is_some()).await);

    let channel = client.notifications(RoomScope::Driver(5)).unwrap();
    assert!(wait_until(WAIT, || backend.joins().len() == 1).await);
    assert_eq!(backend.joins()[0], ("join_driver".to_string(), Value::from(5)));
    assert!(wait_until(WAIT, || channel.is_connected()).await);

    backend.emit("new_order", json!({ "id": 4 }));
    assert!(wait_until(WAIT, || channel.unread() == 1).await);
    tokio::time::sleep(SETTLE).await;
    assert_eq!(backend.hits("/orders/store/8"), 1);
}

#[tokio::test]
async fn test_disconnect_closes_the_socket() {
    let backend = MockBackend::spawn().await;
    let client = backend.client().await;
    login_merchant(&client).await;

    let channel = client
        .notifications(RoomScope::Store(MERCHANT_STORE_ID))
        .unwrap();
    assert!(wait_until(WAIT, || channel.is_connected()).await);
    assert_eq!(backend.socket_connections(), 1);

    channel.disconnect().await;

    assert_eq!(channel.connection_state(), ConnectionState::Disconnected);
    assert_eq!(channel.scope(), None);
    assert!(wait_until(WAIT, || backend.socket_connections() == 0).await);

    // Still usable afterwards.
    channel
        .rescope(RoomScope::Store(MERCHANT_STORE_ID))
        .await
        .unwrap();
    assert!(wait_until(WAIT, || channel.is_connected()).await);
}

#[tokio::test]
async fn test_unreachable_socket_server_is_not_an_error() {
    let backend = MockBackend::spawn().await;
    let mut config = backend.config();
    config.socket.url = "http://127.0.0.1:9".to_string();
    let db = courier_store::Database::new(courier_store::DbConfig::in_memory())
        .await
        .unwrap();
    let client = courier_sync::CourierClient::with_database(config, db)
        .await
        .unwrap();

    let channel = client.notifications(RoomScope::Store(1)).unwrap();
    let mut states = channel.watch_connection();
    tokio::time::timeout(WAIT, states.wait_for(|s| *s == ConnectionState::Backoff))
        .await
        .expect("should back off")
        .unwrap();
    assert!(!channel.is_connected());

    channel.disconnect().await;
    assert_eq!(channel.connection_state(), ConnectionState::Disconnected);
}
