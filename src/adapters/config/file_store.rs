use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::domain::{Category, SortSpec};
use crate::ports::{
    AppConfig, ConfigError, ConfigResult, ConfigStore, LocalCategoryStore, DEFAULT_CACHE_TTL_SECONDS,
};

const APP_DIR: &str = "taskforce-monitor";
const KEYRING_SERVICE: &str = "taskforce-monitor";
const KEYRING_USER: &str = "refresh_token";

#[derive(Debug, Default, Serialize, Deserialize)]
struct ConfigFile {
    backend_url: Option<String>,
    anon_key: Option<String>,
    site_url: Option<String>,
    cache_ttl_seconds: Option<u64>,
    default_sort: Option<SortSpec>,
    show_archived: Option<bool>,
}

/// JSON files under the user's config directory. The refresh token goes to
/// the OS keyring when one is usable and to an owner-only file otherwise.
pub struct FileConfigStore {
    config_dir: PathBuf,
    use_keyring: bool,
}

impl FileConfigStore {
    pub fn new() -> ConfigResult<Self> {
        let config_dir = dirs::config_dir().ok_or_else(|| {
            ConfigError::ReadError("Cannot determine config directory".to_string())
        })?;

        Ok(Self {
            config_dir: config_dir.join(APP_DIR),
            use_keyring: true,
        })
    }

    /// Store everything under `dir`, files only.
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: dir.into(),
            use_keyring: false,
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    fn config_path(&self) -> PathBuf {
        self.config_dir.join("config.json")
    }

    fn categories_path(&self) -> PathBuf {
        self.config_dir.join("categories.json")
    }

    fn token_file_path(&self) -> PathBuf {
        self.config_dir.join(".session")
    }

    async fn ensure_config_dir(&self) -> ConfigResult<()> {
        fs::create_dir_all(&self.config_dir)
            .await
            .map_err(|e| ConfigError::WriteError(e.to_string()))
    }

    async fn read_optional(&self, path: &Path) -> ConfigResult<Option<String>> {
        match fs::read_to_string(path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ConfigError::ReadError(e.to_string())),
        }
    }

    fn keyring_entry(&self) -> Option<keyring::Entry> {
        if !self.use_keyring {
            return None;
        }
        match keyring::Entry::new(KEYRING_SERVICE, KEYRING_USER) {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!("Keyring not available, using file storage: {}", e);
                None
            }
        }
    }

    async fn get_token_from_file(&self) -> ConfigResult<Option<String>> {
        Ok(self
            .read_optional(&self.token_file_path())
            .await?
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty()))
    }

    async fn set_token_in_file(&self, token: &str) -> ConfigResult<()> {
        self.ensure_config_dir().await?;
        let token_path = self.token_file_path();
        fs::write(&token_path, token)
            .await
            .map_err(|e| ConfigError::WriteError(e.to_string()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(&token_path)
                .await
                .map_err(|e| ConfigError::WriteError(e.to_string()))?
                .permissions();
            perms.set_mode(0o600);
            fs::set_permissions(&token_path, perms)
                .await
                .map_err(|e| ConfigError::WriteError(e.to_string()))?;
        }

        Ok(())
    }

    async fn remove_token_file(&self) -> ConfigResult<()> {
        match fs::remove_file(self.token_file_path()).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ConfigError::WriteError(e.to_string())),
        }
    }
}

#[async_trait]
impl ConfigStore for FileConfigStore {
    async fn load_config(&self) -> ConfigResult<AppConfig> {
        let config_file = match self.read_optional(&self.config_path()).await? {
            Some(content) => serde_json::from_str::<ConfigFile>(&content)
                .map_err(|e| ConfigError::InvalidFormat(e.to_string()))?,
            None => ConfigFile::default(),
        };

        Ok(AppConfig {
            backend_url: config_file.backend_url,
            anon_key: config_file.anon_key,
            site_url: config_file.site_url,
            refresh_token: self.get_refresh_token().await?,
            cache_ttl_seconds: config_file.cache_ttl_seconds.unwrap_or(DEFAULT_CACHE_TTL_SECONDS),
            default_sort: config_file.default_sort.unwrap_or_default(),
            show_archived: config_file.show_archived.unwrap_or(false),
        })
    }

    async fn save_config(&self, config: &AppConfig) -> ConfigResult<()> {
        self.ensure_config_dir().await?;

        let config_file = ConfigFile {
            backend_url: config.backend_url.clone(),
            anon_key: config.anon_key.clone(),
            site_url: config.site_url.clone(),
            cache_ttl_seconds: Some(config.cache_ttl_seconds),
            default_sort: Some(config.default_sort),
            show_archived: Some(config.show_archived),
        };

        let content = serde_json::to_string_pretty(&config_file)
            .map_err(|e| ConfigError::WriteError(e.to_string()))?;

        fs::write(self.config_path(), content)
            .await
            .map_err(|e| ConfigError::WriteError(e.to_string()))?;

        if let Some(token) = &config.refresh_token {
            self.set_refresh_token(token).await?;
        }

        Ok(())
    }

    async fn get_refresh_token(&self) -> ConfigResult<Option<String>> {
        if let Some(entry) = self.keyring_entry() {
            match entry.get_password() {
                Ok(token) => return Ok(Some(token)),
                Err(keyring::Error::NoEntry) => {}
                Err(e) => tracing::warn!("Keyring read failed, trying file storage: {}", e),
            }
        }

        self.get_token_from_file().await
    }

    async fn set_refresh_token(&self, token: &str) -> ConfigResult<()> {
        // Some platforms accept the write into a store that does not persist,
        // so the keyring only counts after reading the token back.
        let kept_in_keyring = match self.keyring_entry() {
            Some(entry) => match entry.set_password(token).and_then(|_| entry.get_password()) {
                Ok(read_back) if read_back == token => true,
                Ok(_) => {
                    tracing::warn!("Keyring did not keep the token, using file storage");
                    false
                }
                Err(e) => {
                    tracing::warn!("Failed to store in keyring, using file storage: {}", e);
                    false
                }
            },
            None => false,
        };

        if kept_in_keyring {
            self.remove_token_file().await
        } else {
            self.set_token_in_file(token).await
        }
    }

    async fn clear_refresh_token(&self) -> ConfigResult<()> {
        if let Some(entry) = self.keyring_entry() {
            match entry.delete_credential() {
                Ok(()) | Err(keyring::Error::NoEntry) => {}
                Err(e) => tracing::warn!("Failed to clear keyring entry: {}", e),
            }
        }

        self.remove_token_file().await
    }
}

#[async_trait]
impl LocalCategoryStore for FileConfigStore {
    async fn load_categories(&self) -> ConfigResult<Vec<Category>> {
        match self.read_optional(&self.categories_path()).await? {
            Some(content) => serde_json::from_str(&content)
                .map_err(|e| ConfigError::InvalidFormat(e.to_string())),
            None => Ok(Vec::new()),
        }
    }

    async fn save_categories(&self, categories: &[Category]) -> ConfigResult<()> {
        self.ensure_config_dir().await?;
        let content = serde_json::to_string_pretty(categories)
            .map_err(|e| ConfigError::WriteError(e.to_string()))?;
        fs::write(self.categories_path(), content)
            .await
            .map_err(|e| ConfigError::WriteError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CategoryId, SortKey, SortOrder};

    #[tokio::test]
    async fn test_missing_files_give_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileConfigStore::with_dir(dir.path().join("nested"));

        assert_eq!(store.load_config().await.unwrap(), AppConfig::default());
        assert!(store.load_categories().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_config_is_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileConfigStore::with_dir(dir.path());

        let config = AppConfig {
            backend_url: Some("https://db.example".into()),
            anon_key: Some("anon".into()),
            site_url: Some("http://localhost:3000".into()),
            refresh_token: Some("refresh".into()),
            cache_ttl_seconds: 60,
            default_sort: SortSpec::new(SortKey::Name, SortOrder::Asc),
            show_archived: true,
        };
        store.save_config(&config).await.unwrap();

        assert_eq!(store.load_config().await.unwrap(), config);
    }

    #[tokio::test]
    async fn test_invalid_config_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.json"), "{ not json").unwrap();

        let store = FileConfigStore::with_dir(dir.path());
        assert!(matches!(
            store.load_config().await,
            Err(ConfigError::InvalidFormat(_))
        ));
    }

    #[tokio::test]
    async fn test_refresh_token_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileConfigStore::with_dir(dir.path());

        assert_eq!(store.get_refresh_token().await.unwrap(), None);
        store.set_refresh_token("secret").await.unwrap();
        assert_eq!(store.get_refresh_token().await.unwrap(), Some("secret".into()));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(dir.path().join(".session"))
                .unwrap()
                .permissions()
                .mode();
            assert_eq!(mode & 0o777, 0o600);
        }

        store.clear_refresh_token().await.unwrap();
        assert_eq!(store.get_refresh_token().await.unwrap(), None);
        // Clearing twice is fine.
        store.clear_refresh_token().await.unwrap();
    }

    #[tokio::test]
    async fn test_categories_round_trip_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileConfigStore::with_dir(dir.path());
        let research = Category {
            id: CategoryId("research".into()),
            label: "Research".into(),
            icon: "flask".into(),
            color: "#ff0000".into(),
        };

        store.save_categories(&[research.clone()]).await.unwrap();
        assert_eq!(store.load_categories().await.unwrap(), vec![research]);

        store.save_categories(&[]).await.unwrap();
        assert!(store.load_categories().await.unwrap().is_empty());
    }
}
