//! # courier-store: On-Device Storage
//!
//! SQLite-backed durable state for the courier client. The only things the
//! client keeps across restarts are the session object and a few UI
//! preferences; server resources are always refetched.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  SessionStore (courier-sync)        Theme command (console)            │
//! │       │  hydrate / persist / clear       │                              │
//! │       ▼                                  ▼                              │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  courier-store (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────────┐   ┌───────────┐  │   │
//! │  │   │   Database    │    │ PreferencesRepo    │   │Migrations │  │   │
//! │  │   │   (pool.rs)   │◄───│ get / set / remove │   │(embedded) │  │   │
//! │  │   └───────────────┘    └────────────────────┘   └───────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  courier.db (project data dir)  or  :memory: in tests                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use courier_store::{Database, DbConfig, SESSION_KEY};
//!
//! let db = Database::new(DbConfig::new("courier.db")).await?;
//! db.preferences().set(SESSION_KEY, &raw_json).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use repository::preferences::{PreferencesRepository, ThemePreference, SESSION_KEY, THEME_KEY};
