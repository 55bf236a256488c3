use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::AppResult;

/// Persisted dashboard preferences
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DashboardSettings {
    /// Menu key to visibility. Menus without an entry are shown.
    #[serde(default)]
    pub menu_visibility: BTreeMap<String, bool>,
}

impl DashboardSettings {
    pub fn is_menu_visible(&self, menu: &str) -> bool {
        self.menu_visibility.get(menu).copied().unwrap_or(true)
    }
}

/// JSON file holding the dashboard settings, with explicit load and save
#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the settings; a missing file yields the defaults
    pub async fn load(&self) -> AppResult<DashboardSettings> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(DashboardSettings::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Replace the stored settings with `settings`
    pub async fn save(&self, settings: &DashboardSettings) -> AppResult<()> {
        let _guard = self.write_lock.lock().await;
        let body = serde_json::to_vec_pretty(settings)?;

        // atomic replace
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        tracing::info!(path = %self.path.display(), "saved dashboard settings");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json"));

        let settings = store.load().await.unwrap();
        assert_eq!(settings, DashboardSettings::default());
        assert!(settings.is_menu_visible("common-fee"));
    }

    #[tokio::test]
    async fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json"));

        let mut settings = DashboardSettings::default();
        settings.menu_visibility.insert("sales-mkt".to_string(), false);
        store.save(&settings).await.unwrap();

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded, settings);
        assert!(!loaded.is_menu_visible("sales-mkt"));
        assert!(loaded.is_menu_visible("sales-2025"));
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = SettingsStore::new(path);
        assert!(store.load().await.is_err());
    }
}
