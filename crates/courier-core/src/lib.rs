//! # courier-core: Domain Types for the Courier Client
//!
//! Everything the sync layer exchanges with the marketplace backend is typed
//! here. The crate performs no I/O.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Courier Client Architecture                        │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 courier-console (or a UI shell)                 │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │    courier-sync: session, fetch cache, controllers, socket      │   │
//! │  └──────────────┬──────────────────────────────┬───────────────────┘   │
//! │                 │                              │                        │
//! │  ┌──────────────▼──────────────┐  ┌────────────▼────────────────────┐  │
//! │  │ ★ courier-core (THIS) ★     │  │ courier-store (SQLite prefs)    │  │
//! │  │ types • money • validation  │  │                                 │  │
//! │  │ query keys • order rules    │  │                                 │  │
//! │  └─────────────────────────────┘  └─────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Session, Profile, Store, Order, Category, Product, Driver
//! - [`money`] - Integer minor-unit money parsed from decimal wire values
//! - [`query`] - Query keys naming cached resources
//! - [`error`] - Domain error types
//! - [`validation`] - Local input checks run before any request

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod query;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use query::{Mutation, QueryKey};
pub use types::*;
