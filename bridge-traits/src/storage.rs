//! Persisted Settings Abstraction
//!
//! Small typed values persisted across launches (theme flag, last repeat mode,
//! and similar preferences). The core treats the store as an opaque get/set
//! surface; durability and encoding are the host's concern.

use async_trait::async_trait;

use crate::error::Result;

/// Well-known settings keys read by the core.
pub mod keys {
    /// Whether the dark theme is forced on. Read once at bootstrap.
    pub const DARK_THEME: &str = "dark_theme";
}

/// Key-value settings storage trait
///
/// Abstracts platform preference stores:
/// - Android: MMKV / SharedPreferences / DataStore
/// - iOS: UserDefaults
/// - Desktop: SQLite-backed table
///
/// Type mismatches (reading a bool key as a string) are reported as errors
/// rather than silently coerced.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::SettingsStore;
///
/// async fn save_preferences(store: &dyn SettingsStore) -> Result<()> {
///     store.set_bool("dark_theme", true).await?;
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Store a string value
    async fn set_string(&self, key: &str, value: &str) -> Result<()>;

    /// Retrieve a string value
    async fn get_string(&self, key: &str) -> Result<Option<String>>;

    /// Store a boolean value
    async fn set_bool(&self, key: &str, value: bool) -> Result<()>;

    /// Retrieve a boolean value
    async fn get_bool(&self, key: &str) -> Result<Option<bool>>;

    /// Store an integer value
    async fn set_i64(&self, key: &str, value: i64) -> Result<()>;

    /// Retrieve an integer value
    async fn get_i64(&self, key: &str) -> Result<Option<i64>>;

    /// Delete a setting
    async fn delete(&self, key: &str) -> Result<()>;

    /// Check if a setting exists
    async fn has_key(&self, key: &str) -> Result<bool>;

    /// List all setting keys
    async fn list_keys(&self) -> Result<Vec<String>>;

    /// Retrieve a boolean, falling back to `default` when the key is unset.
    async fn get_bool_or(&self, key: &str, default: bool) -> Result<bool> {
        Ok(self.get_bool(key).await?.unwrap_or(default))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BridgeError;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemorySettings {
        values: Mutex<HashMap<String, String>>,
    }

    #[async_trait]
    impl SettingsStore for MemorySettings {
        async fn set_string(&self, key: &str, value: &str) -> Result<()> {
            self.values
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_string());
            Ok(())
        }

        async fn get_string(&self, key: &str) -> Result<Option<String>> {
            Ok(self.values.lock().unwrap().get(key).cloned())
        }

        async fn set_bool(&self, key: &str, value: bool) -> Result<()> {
            self.set_string(key, &value.to_string()).await
        }

        async fn get_bool(&self, key: &str) -> Result<Option<bool>> {
            match self.get_string(key).await? {
                Some(raw) => raw
                    .parse()
                    .map(Some)
                    .map_err(|e| BridgeError::OperationFailed(format!("Parse error: {}", e))),
                None => Ok(None),
            }
        }

        async fn set_i64(&self, key: &str, value: i64) -> Result<()> {
            self.set_string(key, &value.to_string()).await
        }

        async fn get_i64(&self, _key: &str) -> Result<Option<i64>> {
            Ok(None)
        }

        async fn delete(&self, key: &str) -> Result<()> {
            self.values.lock().unwrap().remove(key);
            Ok(())
        }

        async fn has_key(&self, key: &str) -> Result<bool> {
            Ok(self.values.lock().unwrap().contains_key(key))
        }

        async fn list_keys(&self) -> Result<Vec<String>> {
            Ok(self.values.lock().unwrap().keys().cloned().collect())
        }
    }

    #[tokio::test]
    async fn test_get_bool_or_uses_default_when_unset() {
        let store = MemorySettings::default();
        assert!(!store.get_bool_or(keys::DARK_THEME, false).await.unwrap());

        store.set_bool(keys::DARK_THEME, true).await.unwrap();
        assert!(store.get_bool_or(keys::DARK_THEME, false).await.unwrap());
    }
}
