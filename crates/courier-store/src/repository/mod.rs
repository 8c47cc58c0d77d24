//! # Repository Module
//!
//! ```text
//! SessionStore / console
//!      │  db.preferences().get(SESSION_KEY)
//!      ▼
//! PreferencesRepository
//! ├── get / set / remove       raw strings
//! ├── get_json / set_json      typed values
//! └── theme / set_theme        ThemePreference
//!      │
//!      ▼
//! preferences table
//! ```

pub mod preferences;
