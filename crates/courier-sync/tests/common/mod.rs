//! In-process marketplace backend for integration tests.
//!
//! Serves the REST endpoints the client uses plus a minimal Socket.IO server
//! on `/socket.io/`, all on `127.0.0.1:0`.

#![allow(dead_code)]

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Multipart, Path, Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use courier_core::ImageSource;
use courier_store::{Database, DbConfig};
use courier_sync::{ClientConfig, CourierClient};

pub const MERCHANT_ID: i64 = 7;
pub const MERCHANT_STORE_ID: i64 = 8;
pub const DRIVER_USER_ID: i64 = 9;
pub const PASSWORD: &str = "secret";
pub const MERCHANT_LOGIN: &str = "ana@example.com";
pub const DRIVER_LOGIN: &str = "dan@example.com";

type Reply = Result<Json<Value>, (StatusCode, Json<Value>)>;

fn reject(status: StatusCode, message: &str) -> (StatusCode, Json<Value>) {
    (status, Json(json!({ "success": false, "message": message })))
}

// =============================================================================
// Recorded Requests
// =============================================================================

#[derive(Debug, Clone)]
pub struct UploadField {
    pub name: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub text: Option<String>,
    pub bytes: usize,
}

#[derive(Debug, Clone)]
pub struct Upload {
    pub path: String,
    pub fields: Vec<UploadField>,
}

impl Upload {
    pub fn field(&self, name: &str) -> Option<&UploadField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.field(name).and_then(|f| f.text.as_deref())
    }

    fn value(&self, name: &str) -> Value {
        self.text(name).map(Value::from).unwrap_or(Value::Null)
    }
}

struct MockUser {
    password: String,
    user: Value,
}

// =============================================================================
// Mock State
// =============================================================================

pub struct MockState {
    hits: Mutex<HashMap<String, usize>>,
    users: Mutex<Vec<MockUser>>,
    tokens: Mutex<HashMap<String, i64>>,
    stores: Mutex<HashMap<i64, Value>>,
    drivers: Mutex<HashMap<i64, Value>>,
    categories: Mutex<Vec<Value>>,
    products: Mutex<Vec<Value>>,
    orders: Mutex<Vec<Value>>,
    uploads: Mutex<Vec<Upload>>,
    locations: Mutex<Vec<Value>>,
    joins: Mutex<Vec<(String, Value)>>,
    next_id: AtomicI64,
    list_delay_ms: AtomicU64,
    fail_lists: AtomicBool,
    transition_delay_ms: AtomicU64,
    sockets: AtomicUsize,
    emit_tx: broadcast::Sender<String>,
    kick_tx: broadcast::Sender<()>,
}

impl MockState {
    fn new() -> Self {
        let merchant = json!({
            "id": MERCHANT_ID,
            "name": "Ana",
            "email": MERCHANT_LOGIN,
            "role": { "id": 2, "role": "restaurant" },
            "store": { "id": MERCHANT_STORE_ID, "name": "Tacos" }
        });
        let driver = json!({
            "id": DRIVER_USER_ID,
            "name": "Dan",
            "email": DRIVER_LOGIN,
            "role": { "id": 3, "role": "driver" }
        });

        let store = json!({
            "id": MERCHANT_STORE_ID,
            "name": "Tacos",
            "logo": "https://cdn.example.com/logo.png",
            "banner": null,
            "address": "1 Main St",
            "phone": "555-0100",
            "start_time": "09:00",
            "end_time": "22:00"
        });

        MockState {
            hits: Mutex::new(HashMap::new()),
            users: Mutex::new(vec![
                MockUser { password: PASSWORD.into(), user: merchant },
                MockUser { password: PASSWORD.into(), user: driver },
            ]),
            tokens: Mutex::new(HashMap::new()),
            stores: Mutex::new(HashMap::from([(MERCHANT_ID, store)])),
            drivers: Mutex::new(HashMap::new()),
            categories: Mutex::new(vec![
                json!({ "id": 1, "name": "Food", "description": "Hot food", "store_id": MERCHANT_STORE_ID }),
                json!({ "id": 2, "name": "Elsewhere", "store_id": 99 }),
            ]),
            products: Mutex::new(vec![
                json!({
                    "id": 1, "name": "Taco", "price": "4.50", "category_id": 1,
                    "image": "https://cdn.example.com/taco.png", "store_id": MERCHANT_STORE_ID
                }),
                json!({ "id": 2, "name": "Pizza", "price": 10, "store_id": 99 }),
            ]),
            orders: Mutex::new(vec![
                json!({
                    "id": 1, "status": "pending", "total_price": "9.00", "store_id": MERCHANT_STORE_ID,
                    "order": [{ "product_id": 1, "name": "Taco", "quantity": 2, "price": "4.50" }],
                    "user": { "id": 50, "name": "Carla", "phone": "555-0199" }
                }),
                json!({ "id": 2, "status": "delivered", "total_price": "4.50", "store_id": MERCHANT_STORE_ID }),
                json!({ "id": 3, "status": "accepted", "total_price": 12, "store_id": MERCHANT_STORE_ID }),
            ]),
            uploads: Mutex::new(Vec::new()),
            locations: Mutex::new(Vec::new()),
            joins: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(100),
            list_delay_ms: AtomicU64::new(0),
            fail_lists: AtomicBool::new(false),
            transition_delay_ms: AtomicU64::new(0),
            sockets: AtomicUsize::new(0),
            emit_tx: broadcast::channel(32).0,
            kick_tx: broadcast::channel(4).0,
        }
    }

    fn next_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    fn authorize(&self, headers: &HeaderMap) -> Result<i64, (StatusCode, Json<Value>)> {
        headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .and_then(|token| self.tokens.lock().unwrap().get(token).copied())
            .ok_or_else(|| reject(StatusCode::UNAUTHORIZED, "Unauthorized"))
    }

    fn user(&self, id: i64) -> Option<Value> {
        self.users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.user["id"] == id)
            .map(|u| u.user.clone())
    }
}

// =============================================================================
// Mock Backend
// =============================================================================

pub struct MockBackend {
    pub addr: SocketAddr,
    pub state: Arc<MockState>,
}

impl MockBackend {
    pub async fn spawn() -> Self {
        let state = Arc::new(MockState::new());

        let app = Router::new()
            .route("/auth/login", post(login))
            .route("/auth/register", post(register))
            .route("/users/profile/{id}", get(profile))
            .route("/categories/store/{id}", get(list_categories))
            .route("/categories/create", post(create_category))
            .route("/categories/update/{id}", put(update_category))
            .route("/categories/{id}", delete(delete_category))
            .route("/products/store/{id}", get(list_products))
            .route("/products/create", post(create_product))
            .route("/products/update/{id}", put(update_product))
            .route("/products/{id}", delete(delete_product))
            .route("/orders/store/{id}", get(list_orders))
            .route("/orders/{id}/accept", put(accept_order))
            .route("/orders/{id}/cancel", put(cancel_order))
            .route("/drivers/create", post(create_driver))
            .route("/drivers/{id}/toggle-availability", put(toggle_driver))
            .route("/stores/create", post(create_store))
            .route("/stores/update/{id}", put(update_store))
            .route("/driver-locations/update-location", post(update_location))
            .route("/fail/500", get(fail_500))
            .route("/socket.io/", get(socket_io))
            .layer(middleware::from_fn_with_state(state.clone(), record_hit))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        MockBackend { addr, state }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn config(&self) -> ClientConfig {
        let mut config = ClientConfig::default();
        config.api.base_url = self.base_url();
        config.socket.url = self.base_url();
        config.socket.connect_timeout_secs = 2;
        config.socket.initial_backoff_ms = 50;
        config.socket.max_backoff_secs = 1;
        config
    }

    /// Client over an in-memory database.
    pub async fn client(&self) -> CourierClient {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        CourierClient::with_database(self.config(), db).await.unwrap()
    }

    pub fn hits(&self, path: &str) -> usize {
        self.state.hits.lock().unwrap().get(path).copied().unwrap_or(0)
    }

    pub fn total_hits(&self) -> usize {
        self.state.hits.lock().unwrap().values().sum()
    }

    pub fn uploads(&self) -> Vec<Upload> {
        self.state.uploads.lock().unwrap().clone()
    }

    pub fn locations(&self) -> Vec<Value> {
        self.state.locations.lock().unwrap().clone()
    }

    pub fn joins(&self) -> Vec<(String, Value)> {
        self.state.joins.lock().unwrap().clone()
    }

    pub fn socket_connections(&self) -> usize {
        self.state.sockets.load(Ordering::SeqCst)
    }

    pub fn set_list_delay(&self, delay: Duration) {
        self.state
            .list_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Makes order listing answer 500 until switched back.
    pub fn set_list_failure(&self, fail: bool) {
        self.state.fail_lists.store(fail, Ordering::SeqCst);
    }

    pub fn set_transition_delay(&self, delay: Duration) {
        self.state
            .transition_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Invalidates every issued token.
    pub fn revoke_tokens(&self) {
        self.state.tokens.lock().unwrap().clear();
    }

    pub fn add_order(&self, order: Value) {
        self.state.orders.lock().unwrap().push(order);
    }

    /// Pushes a Socket.IO event to every connected socket.
    pub fn emit(&self, event: &str, payload: Value) {
        let frame = format!("42{}", json!([event, payload]));
        let _ = self.state.emit_tx.send(frame);
    }

    /// Drops every socket connection from the server side.
    pub fn kick_sockets(&self) {
        let _ = self.state.kick_tx.send(());
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Polls `check` until it holds or `within` elapses.
pub async fn wait_until(within: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + within;
    loop {
        if check() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

pub async fn login_merchant(client: &CourierClient) {
    let outcome = client.session().login(MERCHANT_LOGIN, PASSWORD).await;
    assert!(outcome.is_success(), "merchant login failed: {outcome:?}");
}

pub async fn login_driver(client: &CourierClient) {
    let outcome = client.session().login(DRIVER_LOGIN, PASSWORD).await;
    assert!(outcome.is_success(), "driver login failed: {outcome:?}");
}

/// Writes a small file and returns it as a picked image.
pub fn image_file(dir: &std::path::Path, name: &str) -> ImageSource {
    let path = dir.join(name);
    std::fs::write(&path, b"\x89PNG\r\n\x1a\nfake").unwrap();
    ImageSource::new(format!("file://{}", path.display()))
}

// =============================================================================
// Handlers
// =============================================================================

async fn record_hit(State(state): State<Arc<MockState>>, req: Request, next: Next) -> Response {
    *state
        .hits
        .lock()
        .unwrap()
        .entry(req.uri().path().to_string())
        .or_default() += 1;
    next.run(req).await
}

async fn login(State(s): State<Arc<MockState>>, Json(body): Json<Value>) -> Reply {
    let identifier = body["identifier"].as_str().unwrap_or_default();
    let password = body["password"].as_str().unwrap_or_default();

    let user = s
        .users
        .lock()
        .unwrap()
        .iter()
        .find(|u| u.user["email"] == identifier && u.password == password)
        .map(|u| u.user.clone())
        .ok_or_else(|| reject(StatusCode::UNAUTHORIZED, "Invalid credentials"))?;

    let id = user["id"].as_i64().unwrap_or_default();
    let token = format!("tok-{id}");
    s.tokens.lock().unwrap().insert(token.clone(), id);
    Ok(Json(json!({ "success": true, "data": { "token": token, "user": user } })))
}

async fn register(State(s): State<Arc<MockState>>, Json(body): Json<Value>) -> Reply {
    let identifier = body["identifier"].as_str().unwrap_or_default().to_string();
    if s.users.lock().unwrap().iter().any(|u| u.user["email"] == identifier.as_str()) {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({
                "message": "Identifier already taken",
                "errors": { "identifier": ["Identifier already taken"] }
            })),
        ));
    }

    let id = s.next_id();
    let role_id = body["role_id"].as_i64().unwrap_or(1);
    let role = match role_id {
        2 => "restaurant",
        3 => "driver",
        _ => "customer",
    };
    let user = json!({
        "id": id,
        "name": body["name"],
        "email": identifier,
        "role": { "id": role_id, "role": role }
    });
    s.users.lock().unwrap().push(MockUser {
        password: body["password"].as_str().unwrap_or_default().to_string(),
        user: user.clone(),
    });
    let token = format!("tok-{id}");
    s.tokens.lock().unwrap().insert(token.clone(), id);
    Ok(Json(json!({ "token": token, "user": user })))
}

async fn profile(State(s): State<Arc<MockState>>, headers: HeaderMap, Path(id): Path<i64>) -> Reply {
    s.authorize(&headers)?;
    let user = s
        .user(id)
        .ok_or_else(|| reject(StatusCode::NOT_FOUND, "User not found"))?;
    Ok(Json(json!({
        "id": id,
        "name": user["name"],
        "email": user["email"],
        "role": user["role"],
        "store": s.stores.lock().unwrap().get(&id).cloned(),
        "driver": s.drivers.lock().unwrap().get(&id).cloned()
    })))
}

async fn list_categories(State(s): State<Arc<MockState>>, headers: HeaderMap) -> Reply {
    s.authorize(&headers)?;
    Ok(Json(json!({ "success": true, "data": *s.categories.lock().unwrap() })))
}

async fn create_category(
    State(s): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Reply {
    s.authorize(&headers)?;
    let category = json!({
        "id": s.next_id(),
        "name": body["name"],
        "description": body["description"],
        "store_id": body["store_id"]
    });
    s.categories.lock().unwrap().push(category.clone());
    Ok(Json(json!({ "message": "Category created", "category": category })))
}

async fn update_category(
    State(s): State<Arc<MockState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> Reply {
    s.authorize(&headers)?;
    let mut categories = s.categories.lock().unwrap();
    let category = categories
        .iter_mut()
        .find(|c| c["id"] == id)
        .ok_or_else(|| reject(StatusCode::NOT_FOUND, "Category not found"))?;
    category["name"] = body["name"].clone();
    category["description"] = body["description"].clone();
    Ok(Json(category.clone()))
}

async fn delete_category(State(s): State<Arc<MockState>>, headers: HeaderMap, Path(id): Path<i64>) -> Reply {
    s.authorize(&headers)?;
    s.categories.lock().unwrap().retain(|c| c["id"] != id);
    Ok(Json(json!({ "success": true, "message": "Category deleted" })))
}

async fn list_products(State(s): State<Arc<MockState>>, headers: HeaderMap) -> Reply {
    s.authorize(&headers)?;
    Ok(Json(Value::Array(s.products.lock().unwrap().clone())))
}

async fn read_form(path: &str, mut multipart: Multipart) -> Upload {
    let mut fields = Vec::new();
    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let data = field.bytes().await.unwrap_or_default();
        let text = file_name
            .is_none()
            .then(|| String::from_utf8_lossy(&data).into_owned());
        fields.push(UploadField {
            name,
            file_name,
            content_type,
            text,
            bytes: data.len(),
        });
    }
    Upload {
        path: path.to_string(),
        fields,
    }
}

fn number(upload: &Upload, name: &str) -> Value {
    upload
        .text(name)
        .and_then(|t| t.parse::<i64>().ok())
        .map(Value::from)
        .unwrap_or(Value::Null)
}

fn image_name(upload: &Upload, name: &str) -> Option<String> {
    upload
        .field(name)
        .and_then(|f| f.file_name.clone())
        .map(|f| format!("https://cdn.example.com/{f}"))
}

async fn create_product(State(s): State<Arc<MockState>>, headers: HeaderMap, multipart: Multipart) -> Reply {
    s.authorize(&headers)?;
    let upload = read_form("/products/create", multipart).await;
    let product = json!({
        "id": s.next_id(),
        "name": upload.value("name"),
        "description": upload.value("description"),
        "price": upload.value("price"),
        "category_id": number(&upload, "category_id"),
        "store_id": number(&upload, "store_id"),
        "image": image_name(&upload, "image")
    });
    s.products.lock().unwrap().push(product.clone());
    s.uploads.lock().unwrap().push(upload);
    Ok(Json(json!({ "success": true, "data": product })))
}

async fn update_product(
    State(s): State<Arc<MockState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    multipart: Multipart,
) -> Reply {
    s.authorize(&headers)?;
    let upload = read_form(&format!("/products/update/{id}"), multipart).await;
    let mut products = s.products.lock().unwrap();
    let product = products
        .iter_mut()
        .find(|p| p["id"] == id)
        .ok_or_else(|| reject(StatusCode::NOT_FOUND, "Product not found"))?;
    product["name"] = upload.value("name");
    product["price"] = upload.value("price");
    if let Some(image) = image_name(&upload, "image") {
        product["image"] = Value::from(image);
    }
    let product = product.clone();
    s.uploads.lock().unwrap().push(upload);
    Ok(Json(json!({ "message": "Product updated", "product": product })))
}

async fn delete_product(State(s): State<Arc<MockState>>, headers: HeaderMap, Path(id): Path<i64>) -> Reply {
    s.authorize(&headers)?;
    s.products.lock().unwrap().retain(|p| p["id"] != id);
    Ok(Json(json!({ "success": true })))
}

async fn list_orders(State(s): State<Arc<MockState>>, headers: HeaderMap, Path(id): Path<i64>) -> Reply {
    // Delay first so a token revoked mid-flight is rejected.
    let delay = s.list_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
    s.authorize(&headers)?;
    if s.fail_lists.load(Ordering::SeqCst) {
        return Err(reject(StatusCode::INTERNAL_SERVER_ERROR, "Database unavailable"));
    }
    let orders: Vec<Value> = s
        .orders
        .lock()
        .unwrap()
        .iter()
        .filter(|o| o["store_id"] == id)
        .cloned()
        .collect();
    Ok(Json(json!({ "success": true, "data": orders })))
}

async fn set_order_status(s: &MockState, id: i64, status: &str) -> Result<Value, (StatusCode, Json<Value>)> {
    let delay = s.transition_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
    let mut orders = s.orders.lock().unwrap();
    let order = orders
        .iter_mut()
        .find(|o| o["id"] == id)
        .ok_or_else(|| reject(StatusCode::NOT_FOUND, "Order not found"))?;
    order["status"] = Value::from(status);
    Ok(order.clone())
}

async fn accept_order(State(s): State<Arc<MockState>>, headers: HeaderMap, Path(id): Path<i64>) -> Reply {
    s.authorize(&headers)?;
    let order = set_order_status(&s, id, "accepted").await?;
    Ok(Json(order))
}

async fn cancel_order(State(s): State<Arc<MockState>>, headers: HeaderMap, Path(id): Path<i64>) -> Reply {
    s.authorize(&headers)?;
    set_order_status(&s, id, "cancelled").await?;
    Ok(Json(json!({ "message": "Order cancelled" })))
}

async fn create_driver(State(s): State<Arc<MockState>>, headers: HeaderMap, multipart: Multipart) -> Reply {
    let user_id = s.authorize(&headers)?;
    let upload = read_form("/drivers/create", multipart).await;
    let driver = json!({
        "id": s.next_id(),
        "user_id": user_id,
        "vehicle_type": upload.value("vehicle_type"),
        "vehicle_license_plate": upload.value("vehicle_license_plate"),
        "vehicle_color": upload.value("vehicle_color"),
        "image": image_name(&upload, "image"),
        "is_available": 0
    });
    s.drivers.lock().unwrap().insert(user_id, driver.clone());
    s.uploads.lock().unwrap().push(upload);
    Ok(Json(json!({ "message": "Driver created", "driver": driver })))
}

async fn toggle_driver(State(s): State<Arc<MockState>>, headers: HeaderMap, Path(id): Path<i64>) -> Reply {
    s.authorize(&headers)?;
    let mut drivers = s.drivers.lock().unwrap();
    let driver = drivers
        .values_mut()
        .find(|d| d["id"] == id)
        .ok_or_else(|| reject(StatusCode::NOT_FOUND, "Driver not found"))?;
    let available = driver["is_available"] == 1;
    driver["is_available"] = Value::from(if available { 0 } else { 1 });
    Ok(Json(driver.clone()))
}

async fn create_store(State(s): State<Arc<MockState>>, headers: HeaderMap, multipart: Multipart) -> Reply {
    let user_id = s.authorize(&headers)?;
    let upload = read_form("/stores/create", multipart).await;
    let store = json!({
        "id": s.next_id(),
        "name": upload.value("name"),
        "address": upload.value("address"),
        "phone": upload.value("phone"),
        "start_time": upload.value("start_time"),
        "end_time": upload.value("end_time"),
        "logo": image_name(&upload, "logo"),
        "banner": image_name(&upload, "banner")
    });
    s.stores.lock().unwrap().insert(user_id, store.clone());
    s.uploads.lock().unwrap().push(upload);
    Ok(Json(json!({ "success": true, "data": store })))
}

async fn update_store(
    State(s): State<Arc<MockState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    multipart: Multipart,
) -> Reply {
    let user_id = s.authorize(&headers)?;
    let upload = read_form(&format!("/stores/update/{id}"), multipart).await;
    let mut stores = s.stores.lock().unwrap();
    let store = stores
        .get_mut(&user_id)
        .filter(|st| st["id"] == id)
        .ok_or_else(|| reject(StatusCode::FORBIDDEN, "Not your store"))?;
    for field in ["name", "address", "phone", "start_time", "end_time"] {
        store[field] = upload.value(field);
    }
    for field in ["logo", "banner"] {
        if let Some(url) = image_name(&upload, field) {
            store[field] = Value::from(url);
        }
    }
    let store = store.clone();
    s.uploads.lock().unwrap().push(upload);
    Ok(Json(json!({ "store": store })))
}

async fn update_location(
    State(s): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Reply {
    s.authorize(&headers)?;
    s.locations.lock().unwrap().push(body);
    Ok(Json(json!({ "success": true, "message": "Location updated" })))
}

async fn fail_500() -> Reply {
    Err((StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "message": "boom" }))))
}

// =============================================================================
// Socket.IO
// =============================================================================

async fn socket_io(ws: WebSocketUpgrade, State(s): State<Arc<MockState>>) -> Response {
    ws.on_upgrade(move |socket| socket_session(socket, s))
}

async fn socket_session(mut socket: WebSocket, s: Arc<MockState>) {
    let mut emits = s.emit_tx.subscribe();
    let mut kicks = s.kick_tx.subscribe();
    s.sockets.fetch_add(1, Ordering::SeqCst);

    let open = r#"0{"sid":"engine-1","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#;
    if socket.send(Message::Text(open.into())).await.is_ok() {
        loop {
            tokio::select! {
                incoming = socket.recv() => {
                    let text = match incoming {
                        Some(Ok(Message::Text(text))) => text.to_string(),
                        Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                        Some(Ok(_)) => continue,
                    };
                    if text.starts_with("40") {
                        let ack = r#"40{"sid":"socket-1"}"#;
                        if socket.send(Message::Text(ack.into())).await.is_err() {
                            break;
                        }
                    } else if let Some(body) = text.strip_prefix("42") {
                        if let Ok(Value::Array(args)) = serde_json::from_str::<Value>(body) {
                            let name = args.first().and_then(Value::as_str).unwrap_or_default();
                            if name.starts_with("join") {
                                let payload = args.get(1).cloned().unwrap_or(Value::Null);
                                s.joins.lock().unwrap().push((name.to_string(), payload));
                            }
                        }
                    } else if text == "1" {
                        break;
                    }
                }
                Ok(frame) = emits.recv() => {
                    if socket.send(Message::Text(frame.into())).await.is_err() {
                        break;
                    }
                }
                Ok(()) = kicks.recv() => {
                    let _ = socket.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    }

    s.sockets.fetch_sub(1, Ordering::SeqCst);
}
