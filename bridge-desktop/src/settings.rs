//! SQLite-backed [`SettingsStore`] for desktop hosts.

use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result};
use bridge_traits::storage::SettingsStore;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use tracing::{debug, warn};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    kind TEXT NOT NULL,
    updated_at INTEGER NOT NULL
)
"#;

/// Type tag stored next to every value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Text,
    Bool,
    Int,
}

impl Kind {
    fn tag(self) -> &'static str {
        match self {
            Kind::Text => "string",
            Kind::Bool => "bool",
            Kind::Int => "i64",
        }
    }
}

fn db_error(action: &'static str) -> impl FnOnce(sqlx::Error) -> BridgeError {
    move |e| BridgeError::OperationFailed(format!("{}: {}", action, e))
}

/// Reading a key back as a different type than it was written with is an
/// error, never a coercion.
pub struct SqliteSettingsStore {
    pool: SqlitePool,
}

impl fmt::Debug for SqliteSettingsStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteSettingsStore").finish_non_exhaustive()
    }
}

impl SqliteSettingsStore {
    /// `<config dir>/player-core/settings.db`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("player-core").join("settings.db"))
    }

    /// Open the database at `db_path`, creating it and its parent
    /// directories on first use.
    pub async fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(BridgeError::Io)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .connect_with(options)
            .await
            .map_err(db_error("Failed to open settings database"))?;

        let store = Self::with_pool(pool).await?;
        debug!(path = ?db_path, "Opened settings store");
        Ok(store)
    }

    pub async fn in_memory() -> Result<Self> {
        // Each pooled connection to `:memory:` would be its own database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .map_err(db_error("Failed to open settings database"))?;
        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::query(SCHEMA)
            .execute(&pool)
            .await
            .map_err(db_error("Failed to create settings table"))?;
        Ok(Self { pool })
    }

    async fn write(&self, key: &str, value: String, kind: Kind) -> Result<()> {
        sqlx::query(
            "INSERT INTO settings (key, value, kind, updated_at) VALUES (?, ?, ?, ?) \
             ON CONFLICT(key) DO UPDATE SET \
             value = excluded.value, kind = excluded.kind, updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value)
        .bind(kind.tag())
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to write setting"))?;

        debug!(key, kind = kind.tag(), "Setting written");
        Ok(())
    }

    async fn read(&self, key: &str, kind: Kind) -> Result<Option<String>> {
        let Some(row) = sqlx::query("SELECT value, kind FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("Failed to read setting"))?
        else {
            return Ok(None);
        };

        let stored: String = row.get(1);
        if stored != kind.tag() {
            warn!(key, expected = kind.tag(), stored = %stored, "Setting type mismatch");
            return Err(BridgeError::OperationFailed(format!(
                "Setting '{}' holds {}, not {}",
                key,
                stored,
                kind.tag()
            )));
        }
        Ok(Some(row.get(0)))
    }

    async fn read_parsed<T>(&self, key: &str, kind: Kind) -> Result<Option<T>>
    where
        T: std::str::FromStr,
        T::Err: fmt::Display,
    {
        self.read(key, kind)
            .await?
            .map(|raw| {
                raw.parse().map_err(|e| {
                    BridgeError::OperationFailed(format!("Setting '{}' is corrupt: {}", key, e))
                })
            })
            .transpose()
    }
}

#[async_trait]
impl SettingsStore for SqliteSettingsStore {
    async fn set_string(&self, key: &str, value: &str) -> Result<()> {
        self.write(key, value.to_string(), Kind::Text).await
    }

    async fn get_string(&self, key: &str) -> Result<Option<String>> {
        self.read(key, Kind::Text).await
    }

    async fn set_bool(&self, key: &str, value: bool) -> Result<()> {
        self.write(key, value.to_string(), Kind::Bool).await
    }

    async fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        self.read_parsed(key, Kind::Bool).await
    }

    async fn set_i64(&self, key: &str, value: i64) -> Result<()> {
        self.write(key, value.to_string(), Kind::Int).await
    }

    async fn get_i64(&self, key: &str) -> Result<Option<i64>> {
        self.read_parsed(key, Kind::Int).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM settings WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(db_error("Failed to delete setting"))?;
        Ok(())
    }

    async fn has_key(&self, key: &str) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("Failed to read setting"))?;
        Ok(row.is_some())
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT key FROM settings ORDER BY key")
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("Failed to list settings"))?;
        Ok(rows.into_iter().map(|row| row.get(0)).collect())
    }
}
