//! # Error Types
//!
//! Domain-specific error types for courier-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  courier-core errors (this file)                                       │
//! │  ├── CoreError        - Order rule violations                          │
//! │  └── ValidationError  - Local input validation failures                │
//! │                                                                         │
//! │  courier-store errors                                                  │
//! │  └── DbError          - Preference storage failures                    │
//! │                                                                         │
//! │  courier-sync errors                                                   │
//! │  └── ClientError      - Validation / Auth / Network / Server           │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → ClientError → UserFacingError     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use crate::types::OrderStatus;

// =============================================================================
// Core Error
// =============================================================================

/// Domain rule violations detected without talking to the server.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The order is in a status that does not allow the requested action.
    ///
    /// ## When This Occurs
    /// - Accepting an order that is no longer pending
    /// - Cancelling an order that is delivered or already cancelled
    #[error("Order {order_id} is {status}, cannot {action}")]
    InvalidTransition {
        order_id: i64,
        status: OrderStatus,
        action: &'static str,
    },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before a request is built so the server never sees obviously bad
/// input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., bad time, bad plate).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

impl ValidationError {
    /// Name of the offending field.
    pub fn field(&self) -> &str {
        match self {
            Self::Required { field }
            | Self::TooLong { field, .. }
            | Self::MustBePositive { field }
            | Self::InvalidFormat { field, .. } => field,
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
