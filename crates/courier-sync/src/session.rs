//! # Session Store
//!
//! Holds the authenticated identity and bearer token, persisted across
//! restarts.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   process start                                                        │
//! │        │   SessionState { session: None, is_loading: true }            │
//! │        ▼                                                                │
//! │   hydrate() ── read "session" key ──┬── valid JSON ──► Some(session)   │
//! │        │                            └── corrupt ─────► None (+ wipe)   │
//! │        ▼   is_loading: false                                           │
//! │   ┌─────────┐  login/register ok   ┌──────────┐                        │
//! │   │  None   │ ───────────────────► │ Some(s)  │                        │
//! │   │         │ ◄─────────────────── │          │                        │
//! │   └─────────┘  logout / 401 / 403  └──────────┘                        │
//! │                                                                         │
//! │   Writers: SessionStore (login, register, logout, hydrate)             │
//! │            ApiClient (expire on an auth failure for its own token)     │
//! │   Readers: everyone else, through SessionHandle                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use courier_core::{Id, Onboarding, RoleKind, Session, User};
use courier_store::{Database, SESSION_KEY};

use crate::error::{ClientError, ErrorKind};
use crate::http::ApiClient;

// =============================================================================
// Session State
// =============================================================================

/// Observable session snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub session: Option<Session>,
    /// True only until the first `hydrate()` finishes.
    pub is_loading: bool,
}

impl Default for SessionState {
    fn default() -> Self {
        SessionState {
            session: None,
            is_loading: true,
        }
    }
}

// =============================================================================
// Session Handle
// =============================================================================

/// Read side of the session, injected into the API client and everything
/// built on it. Cloning shares state.
#[derive(Clone)]
pub struct SessionHandle {
    state: Arc<watch::Sender<SessionState>>,
    db: Database,
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("SessionHandle")
            .field("user_id", &state.session.as_ref().map(|s| s.user.id))
            .field("token", &"[REDACTED]")
            .field("is_loading", &state.is_loading)
            .finish()
    }
}

impl SessionHandle {
    pub fn new(db: Database) -> Self {
        let (tx, _rx) = watch::channel(SessionState::default());
        SessionHandle {
            state: Arc::new(tx),
            db,
        }
    }

    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn current(&self) -> Option<Session> {
        self.state.borrow().session.clone()
    }

    pub fn token(&self) -> Option<String> {
        self.state
            .borrow()
            .session
            .as_ref()
            .and_then(|s| s.token.clone())
    }

    pub fn user_id(&self) -> Option<Id> {
        self.state.borrow().session.as_ref().map(|s| s.user.id)
    }

    pub fn role_kind(&self) -> Option<RoleKind> {
        self.state.borrow().session.as_ref().map(|s| s.role_kind())
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().session.is_some()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().is_loading
    }

    /// Receiver that yields every state change.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Forgets the session in memory and in storage. Never fails.
    pub(crate) async fn expire(&self) {
        if let Err(e) = self.db.preferences().remove(SESSION_KEY).await {
            warn!(error = %e, "Failed to clear persisted session");
        }
        self.state.send_modify(|s| {
            s.session = None;
            s.is_loading = false;
        });
    }

    /// Expires the session only if it is still the one that sent `token`.
    /// A rejection that lands after a re-login leaves the new session alone.
    pub(crate) async fn expire_if(&self, token: Option<&str>) -> bool {
        let cleared = self.state.send_if_modified(|s| {
            let current = s.session.as_ref().and_then(|s| s.token.as_deref());
            if s.session.is_none() || current != token {
                return false;
            }
            s.session = None;
            s.is_loading = false;
            true
        });
        if !cleared {
            debug!("Rejected token no longer current, keeping session");
            return false;
        }

        let prefs = self.db.preferences();
        let stale = match prefs.get_json::<Session>(SESSION_KEY).await {
            Ok(Some(stored)) => stored.token.as_deref() == token,
            Ok(None) => false,
            Err(_) => true,
        };
        if stale {
            if let Err(e) = prefs.remove(SESSION_KEY).await {
                warn!(error = %e, "Failed to clear persisted session");
            }
        }
        true
    }

    fn set(&self, session: Option<Session>) {
        self.state.send_modify(|s| {
            s.session = session;
            s.is_loading = false;
        });
    }
}

// =============================================================================
// Auth Outcome
// =============================================================================

/// Result of login/register. Failures are values, never errors.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthOutcome {
    Success(Session),
    Failure { kind: ErrorKind, message: String },
}

impl AuthOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, AuthOutcome::Success(_))
    }

    pub fn session(&self) -> Option<&Session> {
        match self {
            AuthOutcome::Success(s) => Some(s),
            AuthOutcome::Failure { .. } => None,
        }
    }

    /// Server message on failure.
    pub fn message(&self) -> Option<&str> {
        match self {
            AuthOutcome::Success(_) => None,
            AuthOutcome::Failure { message, .. } => Some(message),
        }
    }

    /// Where a freshly registered user goes next.
    pub fn onboarding(&self) -> Option<Onboarding> {
        self.session().map(|s| s.role_kind().onboarding())
    }

    fn failure(err: &ClientError) -> Self {
        let message = match err {
            ClientError::Auth { message, .. }
            | ClientError::Server { message, .. }
            | ClientError::Validation { message, .. }
                if !message.is_empty() =>
            {
                message.clone()
            }
            other => other.user_message(),
        };
        AuthOutcome::Failure {
            kind: err.kind(),
            message,
        }
    }
}

// =============================================================================
// Session Store
// =============================================================================

#[derive(Serialize)]
struct LoginRequest<'a> {
    identifier: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RegisterRequest<'a> {
    name: &'a str,
    identifier: &'a str,
    password: &'a str,
    role_id: Id,
}

/// The single writer of the session.
#[derive(Debug, Clone)]
pub struct SessionStore {
    api: ApiClient,
}

impl SessionStore {
    pub fn new(api: ApiClient) -> Self {
        SessionStore { api }
    }

    pub fn handle(&self) -> &SessionHandle {
        self.api.session()
    }

    pub fn current(&self) -> Option<Session> {
        self.handle().current()
    }

    pub fn is_loading(&self) -> bool {
        self.handle().is_loading()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.handle().subscribe()
    }

    /// Loads the persisted session. Must run before any routing decision.
    ///
    /// A stored value that no longer decodes is removed and treated as
    /// logged out.
    pub async fn hydrate(&self) -> Option<Session> {
        let handle = self.handle();
        let prefs = handle.database().preferences();

        let session = match prefs.get(SESSION_KEY).await {
            Ok(Some(raw)) => match serde_json::from_str::<Session>(&raw) {
                Ok(session) => {
                    info!(user_id = session.user.id, "Session restored");
                    Some(session)
                }
                Err(e) => {
                    warn!(error = %e, "Discarding corrupted persisted session");
                    if let Err(e) = prefs.remove(SESSION_KEY).await {
                        warn!(error = %e, "Failed to remove corrupted session");
                    }
                    None
                }
            },
            Ok(None) => {
                debug!("No persisted session");
                None
            }
            Err(e) => {
                warn!(error = %e, "Failed to read persisted session");
                None
            }
        };

        handle.set(session.clone());
        session
    }

    /// Posts credentials to `/auth/login`.
    pub async fn login(&self, identifier: &str, password: &str) -> AuthOutcome {
        let body = LoginRequest {
            identifier,
            password,
        };
        self.authenticate("/auth/login", &body).await
    }

    /// Posts a new account to `/auth/register`.
    ///
    /// Routing after registration is the caller's concern; see
    /// [`AuthOutcome::onboarding`].
    pub async fn register(
        &self,
        name: &str,
        identifier: &str,
        password: &str,
        role_id: Id,
    ) -> AuthOutcome {
        let body = RegisterRequest {
            name,
            identifier,
            password,
            role_id,
        };
        self.authenticate("/auth/register", &body).await
    }

    /// Clears storage and memory. Never fails.
    pub async fn logout(&self) {
        let user_id = self.handle().user_id();
        self.handle().expire().await;
        info!(?user_id, "Logged out");
    }

    async fn authenticate<B: Serialize>(&self, path: &str, body: &B) -> AuthOutcome {
        let payload: Value = match self.api.post_public(path, body).await {
            Ok(v) => v,
            Err(e) => {
                warn!(path = %path, error = %e, "Authentication failed");
                return AuthOutcome::failure(&e);
            }
        };

        let Some((session, raw)) = session_from_payload(payload) else {
            warn!(path = %path, "Authentication response did not contain a user");
            return AuthOutcome::Failure {
                kind: ErrorKind::Server,
                message: "Unexpected response from server".to_string(),
            };
        };

        if let Err(e) = self
            .handle()
            .database()
            .preferences()
            .set(SESSION_KEY, &raw)
            .await
        {
            warn!(error = %e, "Failed to persist session");
            return AuthOutcome::failure(&ClientError::from(e));
        }

        self.handle().set(Some(session.clone()));
        info!(user_id = session.user.id, role = ?session.role_kind(), "Signed in");
        AuthOutcome::Success(session)
    }
}

/// Accepts `{token, user}` or a bare user object (some register endpoints
/// return no token). Returns the session plus the JSON to persist.
fn session_from_payload(payload: Value) -> Option<(Session, String)> {
    if let Ok(session) = serde_json::from_value::<Session>(payload.clone()) {
        return Some((session, payload.to_string()));
    }

    let user = serde_json::from_value::<User>(payload).ok()?;
    let session = Session {
        token: None,
        user,
        extra: Default::default(),
    };
    let raw = serde_json::to_string(&session).ok()?;
    Some((session, raw))
}

// =============================================================================
// Unit Tests
// =============================================================================
