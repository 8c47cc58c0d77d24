//! # Preferences Repository
//!
//! Key/value storage for the little client state that must survive a
//! restart.

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::error::{DbError, DbResult};

/// Key holding the authenticated session JSON.
pub const SESSION_KEY: &str = "session";

/// Key holding the [`ThemePreference`].
pub const THEME_KEY: &str = "theme";

// =============================================================================
// Theme Preference
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemePreference {
    Light,
    Dark,
    #[default]
    System,
}

impl fmt::Display for ThemePreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThemePreference::Light => write!(f, "light"),
            ThemePreference::Dark => write!(f, "dark"),
            ThemePreference::System => write!(f, "system"),
        }
    }
}

impl FromStr for ThemePreference {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(ThemePreference::Light),
            "dark" => Ok(ThemePreference::Dark),
            "system" => Ok(ThemePreference::System),
            other => Err(DbError::corrupt(THEME_KEY, format!("unknown theme '{other}'"))),
        }
    }
}

// =============================================================================
// Repository
// =============================================================================

#[derive(Debug, Clone)]
pub struct PreferencesRepository {
    pool: SqlitePool,
}

impl PreferencesRepository {
    pub fn new(pool: SqlitePool) -> Self {
        PreferencesRepository { pool }
    }

    /// Reads a raw value.
    pub async fn get(&self, key: &str) -> DbResult<Option<String>> {
        let value: Option<String> =
            sqlx::query_scalar("SELECT value FROM preferences WHERE key = ?")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
        Ok(value)
    }

    /// Inserts or replaces a raw value.
    pub async fn set(&self, key: &str, value: &str) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO preferences (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        debug!(key = %key, bytes = value.len(), "Preference stored");
        Ok(())
    }

    /// Deletes a value. Returns whether anything was removed.
    pub async fn remove(&self, key: &str) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM preferences WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;

        debug!(key = %key, removed = result.rows_affected(), "Preference removed");
        Ok(result.rows_affected() > 0)
    }

    /// Reads and decodes a JSON value. Undecodable data is `DbError::Corrupt`.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> DbResult<Option<T>> {
        match self.get(key).await? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| DbError::corrupt(key, e)),
            None => Ok(None),
        }
    }

    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T) -> DbResult<()> {
        let raw = serde_json::to_string(value).map_err(|e| DbError::Internal(e.to_string()))?;
        self.set(key, &raw).await
    }

    /// Stored theme, or the default when unset or unreadable.
    pub async fn theme(&self) -> DbResult<ThemePreference> {
        Ok(match self.get(THEME_KEY).await? {
            Some(raw) => raw.parse().unwrap_or_default(),
            None => ThemePreference::default(),
        })
    }

    pub async fn set_theme(&self, theme: ThemePreference) -> DbResult<()> {
        self.set(THEME_KEY, &theme.to_string()).await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};

    async fn repo() -> PreferencesRepository {
        Database::new(DbConfig::in_memory())
            .await
            .unwrap()
            .preferences()
    }

    #[tokio::test]
    async fn test_set_get_remove() {
        let prefs = repo().await;

        assert_eq!(prefs.get(SESSION_KEY).await.unwrap(), None);

        prefs.set(SESSION_KEY, "{\"a\":1}").await.unwrap();
        prefs.set(SESSION_KEY, "{\"a\":2}").await.unwrap();
        assert_eq!(
            prefs.get(SESSION_KEY).await.unwrap().as_deref(),
            Some("{\"a\":2}")
        );

        assert!(prefs.remove(SESSION_KEY).await.unwrap());
        assert!(!prefs.remove(SESSION_KEY).await.unwrap());
        assert_eq!(prefs.get(SESSION_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_json_corrupt_value() {
        let prefs = repo().await;
        prefs.set("blob", "not json").await.unwrap();

        let result: DbResult<Option<serde_json::Value>> = prefs.get_json("blob").await;
        assert!(matches!(result, Err(DbError::Corrupt { .. })));

        prefs.set_json("blob", &vec![1, 2, 3]).await.unwrap();
        let back: Option<Vec<i32>> = prefs.get_json("blob").await.unwrap();
        assert_eq!(back, Some(vec![1, 2, 3]));
    }

    #[tokio::test]
    async fn test_theme_defaults_and_persists() {
        let prefs = repo().await;
        assert_eq!(prefs.theme().await.unwrap(), ThemePreference::System);

        prefs.set_theme(ThemePreference::Dark).await.unwrap();
        assert_eq!(prefs.theme().await.unwrap(), ThemePreference::Dark);

        prefs.set(THEME_KEY, "neon").await.unwrap();
        assert_eq!(prefs.theme().await.unwrap(), ThemePreference::System);
    }

    #[test]
    fn test_theme_parse() {
        assert_eq!("Light".parse::<ThemePreference>().unwrap(), ThemePreference::Light);
        assert!("sepia".parse::<ThemePreference>().is_err());
    }
}
