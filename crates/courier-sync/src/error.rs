//! # Client Error Types
//!
//! Every failure the sync layer can surface, reduced to four kinds a UI can
//! branch on.
//!
//! ## Error Taxonomy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        ErrorKind (machine-checkable)                    │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  VALIDATION     │  │  AUTH           │  │  NETWORK                │ │
//! │  │  400 / 422      │  │  401 / 403      │  │  no response            │ │
//! │  │  local checks   │  │  → forced logout│  │  timeout, socket drop   │ │
//! │  │  terminal order │  │  not signed in  │  │                         │ │
//! │  │  busy           │  │                 │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  SERVER: 5xx, other statuses, undecodable bodies, storage and   │   │
//! │  │  configuration failures                                          │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

use courier_core::{CoreError, ValidationError};

/// Result type alias for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

// =============================================================================
// Error Kind
// =============================================================================

/// Coarse category of a [`ClientError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    Validation,
    Auth,
    Network,
    Server,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Validation => write!(f, "validation"),
            ErrorKind::Auth => write!(f, "auth"),
            ErrorKind::Network => write!(f, "network"),
            ErrorKind::Server => write!(f, "server"),
        }
    }
}

// =============================================================================
// Client Error
// =============================================================================

#[derive(Debug, Clone, Error)]
pub enum ClientError {
    // =========================================================================
    // Request Errors
    // =========================================================================
    /// Input rejected, locally or by the server (400/422).
    #[error("{message}")]
    Validation {
        message: String,
        fields: BTreeMap<String, String>,
    },

    /// Server refused the credentials (401/403).
    #[error("Unauthorized ({status}): {message}")]
    Auth { status: u16, message: String },

    /// An authenticated call was attempted without a session.
    #[error("Not signed in")]
    NotAuthenticated,

    /// No response from the server.
    #[error("Network error: {0}")]
    Network(String),

    /// Request timed out.
    #[error("Request timed out")]
    Timeout,

    /// 5xx or any other unexpected status.
    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// Response body could not be decoded.
    #[error("Unexpected response: {0}")]
    Decode(String),

    // =========================================================================
    // Local Rule Errors
    // =========================================================================
    /// Order status does not allow the action.
    #[error("{0}")]
    InvalidTransition(String),

    /// The same action is already in flight for this entity.
    #[error("{action} already in progress for {entity} {id}")]
    Busy {
        action: &'static str,
        entity: &'static str,
        id: i64,
    },

    /// The session's role or scope does not allow the operation.
    #[error("{0}")]
    NotPermitted(String),

    // =========================================================================
    // Realtime Errors
    // =========================================================================
    /// Failed to establish the socket connection.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Socket closed by the server or the network.
    #[error("Disconnected from notification server")]
    Disconnected,

    /// Malformed socket frame.
    #[error("Socket protocol error: {0}")]
    Protocol(String),

    // =========================================================================
    // Local Infrastructure Errors
    // =========================================================================
    /// Durable storage failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),
}

impl ClientError {
    /// Builds a validation error for a single field.
    pub fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        let message = message.into();
        let mut fields = BTreeMap::new();
        fields.insert(field.into(), message.clone());
        ClientError::Validation { message, fields }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::Validation { .. }
            | ClientError::InvalidTransition(_)
            | ClientError::Busy { .. }
            | ClientError::NotPermitted(_) => ErrorKind::Validation,

            ClientError::Auth { .. } | ClientError::NotAuthenticated => ErrorKind::Auth,

            ClientError::Network(_)
            | ClientError::Timeout
            | ClientError::ConnectionFailed(_)
            | ClientError::Disconnected => ErrorKind::Network,

            ClientError::Server { .. }
            | ClientError::Decode(_)
            | ClientError::Protocol(_)
            | ClientError::Storage(_)
            | ClientError::InvalidConfig(_)
            | ClientError::InvalidUrl(_)
            | ClientError::ConfigLoadFailed(_)
            | ClientError::ConfigSaveFailed(_) => ErrorKind::Server,
        }
    }

    /// `true` for errors that end the session.
    pub fn is_auth(&self) -> bool {
        self.kind() == ErrorKind::Auth
    }

    /// Returns true if resubmitting the same request might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Server { status, .. } => *status >= 500,
            other => other.kind() == ErrorKind::Network,
        }
    }

    /// Single message suitable for a toast or an inline error.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Validation { message, fields } => {
                if message.is_empty() {
                    fields
                        .values()
                        .next()
                        .cloned()
                        .unwrap_or_else(|| "Invalid input".to_string())
                } else {
                    message.clone()
                }
            }
            ClientError::Auth { .. } | ClientError::NotAuthenticated => {
                "Your session has expired. Please sign in again.".to_string()
            }
            ClientError::Network(_)
            | ClientError::Timeout
            | ClientError::ConnectionFailed(_)
            | ClientError::Disconnected => {
                "Could not reach the server. Check your connection and try again.".to_string()
            }
            ClientError::Server { message, .. } if !message.is_empty() => message.clone(),
            ClientError::InvalidTransition(_)
            | ClientError::Busy { .. }
            | ClientError::NotPermitted(_) => self.to_string(),
            _ => "Something went wrong. Please try again.".to_string(),
        }
    }

    pub fn to_user_facing(&self) -> UserFacingError {
        UserFacingError {
            kind: self.kind(),
            message: self.user_message(),
        }
    }
}

// =============================================================================
// User-Facing Error
// =============================================================================

/// Serializable `{ kind, message }` pair handed to a UI layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserFacingError {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&ClientError> for UserFacingError {
    fn from(err: &ClientError) -> Self {
        err.to_user_facing()
    }
}

impl fmt::Display for UserFacingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<ValidationError> for ClientError {
    fn from(err: ValidationError) -> Self {
        ClientError::invalid_field(err.field().to_string(), err.to_string())
    }
}

impl From<CoreError> for ClientError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(v) => v.into(),
            other @ CoreError::InvalidTransition { .. } => {
                ClientError::InvalidTransition(other.to_string())
            }
        }
    }
}

impl From<courier_store::DbError> for ClientError {
    fn from(err: courier_store::DbError) -> Self {
        ClientError::Storage(err.to_string())
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClientError::Timeout
        } else if err.is_decode() {
            ClientError::Decode(err.to_string())
        } else if err.is_builder() {
            ClientError::InvalidUrl(err.to_string())
        } else {
            ClientError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Decode(err.to_string())
    }
}

impl From<url::ParseError> for ClientError {
    fn from(err: url::ParseError) -> Self {
        ClientError::InvalidUrl(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ClientError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error as WsError;
        match err {
            WsError::ConnectionClosed | WsError::AlreadyClosed => ClientError::Disconnected,
            WsError::Io(io) => ClientError::ConnectionFailed(io.to_string()),
            other => ClientError::Protocol(other.to_string()),
        }
    }
}

impl From<toml::de::Error> for ClientError {
    fn from(err: toml::de::Error) -> Self {
        ClientError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for ClientError {
    fn from(err: toml::ser::Error) -> Self {
        ClientError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::OrderStatus;

    #[test]
    fn test_kinds() {
        assert_eq!(
            ClientError::invalid_field("name", "name is required").kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            ClientError::Auth { status: 401, message: String::new() }.kind(),
            ErrorKind::Auth
        );
        assert_eq!(ClientError::Timeout.kind(), ErrorKind::Network);
        assert_eq!(
            ClientError::Server { status: 502, message: String::new() }.kind(),
            ErrorKind::Server
        );
        assert_eq!(ClientError::Storage("disk".into()).kind(), ErrorKind::Server);
    }

    #[test]
    fn test_retryable_errors() {
        assert!(ClientError::Network("reset".into()).is_retryable());
        assert!(ClientError::Server { status: 503, message: String::new() }.is_retryable());
        assert!(!ClientError::Server { status: 409, message: String::new() }.is_retryable());
        assert!(!ClientError::NotAuthenticated.is_retryable());
    }

    #[test]
    fn test_user_message_single_line() {
        let err = ClientError::Validation {
            message: String::new(),
            fields: BTreeMap::from([("price".to_string(), "price must be positive".to_string())]),
        };
        assert_eq!(err.user_message(), "price must be positive");

        let err = ClientError::Auth { status: 403, message: "forbidden".into() };
        assert!(err.user_message().contains("sign in"));

        let facing = UserFacingError::from(&ClientError::Disconnected);
        assert_eq!(facing.kind, ErrorKind::Network);
        assert_eq!(
            serde_json::to_value(&facing).unwrap()["kind"],
            "NETWORK"
        );
    }

    #[test]
    fn test_core_error_conversion() {
        let err: ClientError = CoreError::InvalidTransition {
            order_id: 3,
            status: OrderStatus::Cancelled,
            action: "cancel",
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.user_message(), "Order 3 is cancelled, cannot cancel");

        let err: ClientError = ValidationError::MustBePositive { field: "price".into() }.into();
        match err {
            ClientError::Validation { fields, .. } => assert!(fields.contains_key("price")),
            other => panic!("unexpected {other:?}"),
        }
    }
}
