//! # REST Client
//!
//! Thin wrapper over `reqwest` that every controller and resource shares.
//!
//! ## Request Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  get / post_json / put_multipart / delete ...                          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Authorization: Bearer <token>   (every authenticated call)            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  send ──► no response ─────────────────────────► Network / Timeout     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  status 2xx ──► unwrap {success, data, message} ─► T                   │
//! │  status 400/422 ─────────────────────────────────► Validation{fields}  │
//! │  status 401/403 ──► SessionHandle::expire() ─────► Auth                │
//! │  anything else ──────────────────────────────────► Server{status}      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use reqwest::multipart::Form;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, instrument, warn};

use crate::config::ApiSettings;
use crate::error::{ClientError, ClientResult};
use crate::session::SessionHandle;

/// Shared HTTP client bound to one base URL and one session.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    session: SessionHandle,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    pub fn new(settings: &ApiSettings, session: SessionHandle) -> ClientResult<Self> {
        url::Url::parse(&settings.base_url)?;

        let mut builder = Client::builder();
        if let Some(timeout) = settings.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;

        Ok(ApiClient {
            http,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            session,
        })
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    // =========================================================================
    // Verbs
    // =========================================================================

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        let req = self.http.get(self.url(path));
        self.execute(Method::GET, path, req, true).await
    }

    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> ClientResult<T> {
        let req = self.http.post(self.url(path)).json(body);
        self.execute(Method::POST, path, req, true).await
    }

    pub async fn put_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> ClientResult<T> {
        let req = self.http.put(self.url(path)).json(body);
        self.execute(Method::PUT, path, req, true).await
    }

    /// PUT without a body (status transitions).
    pub async fn put_empty<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        let req = self.http.put(self.url(path));
        self.execute(Method::PUT, path, req, true).await
    }

    pub async fn post_multipart<T: DeserializeOwned>(
        &self,
        path: &str,
        form: Form,
    ) -> ClientResult<T> {
        let req = self.http.post(self.url(path)).multipart(form);
        self.execute(Method::POST, path, req, true).await
    }

    pub async fn put_multipart<T: DeserializeOwned>(
        &self,
        path: &str,
        form: Form,
    ) -> ClientResult<T> {
        let req = self.http.put(self.url(path)).multipart(form);
        self.execute(Method::PUT, path, req, true).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        let req = self.http.delete(self.url(path));
        self.execute(Method::DELETE, path, req, true).await
    }

    /// Unauthenticated POST (login, register). Never expires the session.
    pub async fn post_public<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> ClientResult<T> {
        let req = self.http.post(self.url(path)).json(body);
        self.execute(Method::POST, path, req, false).await
    }

    // =========================================================================
    // Pipeline
    // =========================================================================

    #[instrument(skip_all, fields(method = %method, path = %path))]
    async fn execute<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        req: RequestBuilder,
        authenticated: bool,
    ) -> ClientResult<T> {
        let mut sent_token = None;
        let req = if authenticated {
            let session = self.session.current().ok_or(ClientError::NotAuthenticated)?;
            sent_token = session.token;
            match &sent_token {
                Some(token) => req.bearer_auth(token),
                None => req,
            }
        } else {
            req
        };

        let response = req.send().await.map_err(|e| {
            warn!(error = %e, "Request failed without a response");
            ClientError::from(e)
        })?;

        let status = response.status();
        let bytes = response.bytes().await?;
        debug!(status = status.as_u16(), bytes = bytes.len(), "Response received");

        if status.is_success() {
            let body = parse_body(&bytes);
            let data = unwrap_envelope(status, body)?;
            return serde_json::from_value(data).map_err(|e| {
                warn!(error = %e, "Response did not match the expected shape");
                ClientError::Decode(e.to_string())
            });
        }

        let err = error_from_response(status, &parse_body(&bytes));
        if authenticated
            && err.is_auth()
            && self.session.expire_if(sent_token.as_deref()).await
        {
            warn!(status = status.as_u16(), "Authorization rejected, session ended");
        }
        Err(err)
    }
}

// =============================================================================
// Response Decoding
// =============================================================================

fn parse_body(bytes: &[u8]) -> Value {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Value::Null;
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

/// `{success: true, data}` yields `data`; `{success: false, message}` is an
/// error even on a 2xx; anything else is returned as-is.
fn unwrap_envelope(status: StatusCode, body: Value) -> ClientResult<Value> {
    let Value::Object(mut map) = body else {
        return Ok(body);
    };

    match map.get("success").and_then(Value::as_bool) {
        Some(true) => Ok(map.remove("data").unwrap_or(Value::Null)),
        Some(false) => Err(ClientError::Server {
            status: status.as_u16(),
            message: extract_message(&Value::Object(map)).unwrap_or_default(),
        }),
        None => Ok(Value::Object(map)),
    }
}

fn extract_message(body: &Value) -> Option<String> {
    match body {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Object(map) => ["message", "error", "msg"]
            .iter()
            .find_map(|k| map.get(*k).and_then(Value::as_str))
            .map(str::to_string),
        _ => None,
    }
}

/// Reads `errors` as `{field: msg | [msg]}` or `[{field|path|param, msg|message}]`.
fn extract_fields(body: &Value) -> BTreeMap<String, String> {
    let mut fields = BTreeMap::new();
    match body.get("errors") {
        Some(Value::Object(map)) => {
            for (field, value) in map {
                let msg = match value {
                    Value::String(s) => Some(s.clone()),
                    Value::Array(items) => items.first().and_then(Value::as_str).map(str::to_string),
                    _ => None,
                };
                if let Some(msg) = msg {
                    fields.insert(field.clone(), msg);
                }
            }
        }
        Some(Value::Array(items)) => {
            for item in items {
                let field = ["field", "path", "param"]
                    .iter()
                    .find_map(|k| item.get(*k).and_then(Value::as_str));
                let msg = ["msg", "message"]
                    .iter()
                    .find_map(|k| item.get(*k).and_then(Value::as_str));
                if let (Some(field), Some(msg)) = (field, msg) {
                    fields.insert(field.to_string(), msg.to_string());
                }
            }
        }
        _ => {}
    }
    fields
}

fn error_from_response(status: StatusCode, body: &Value) -> ClientError {
    let reason = || status.canonical_reason().unwrap_or("").to_string();

    if matches!(status, StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY) {
        let fields = extract_fields(body);
        let message = extract_message(body)
            .or_else(|| fields.values().next().cloned())
            .unwrap_or_else(reason);
        return ClientError::Validation { message, fields };
    }

    let message = extract_message(body).unwrap_or_else(reason);
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ClientError::Auth {
            status: status.as_u16(),
            message,
        },
        _ => ClientError::Server {
            status: status.as_u16(),
            message,
        },
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
