use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{Category, SortSpec};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Failed to read configuration: {0}")]
    ReadError(String),

    #[error("Failed to write configuration: {0}")]
    WriteError(String),

    #[error("Invalid configuration format: {0}")]
    InvalidFormat(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

pub const DEFAULT_CACHE_TTL_SECONDS: u64 = 300;

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub backend_url: Option<String>,
    pub anon_key: Option<String>,
    /// Where OAuth sign-in redirects back to and where share links point.
    pub site_url: Option<String>,
    pub refresh_token: Option<String>,
    pub cache_ttl_seconds: u64,
    pub default_sort: SortSpec,
    pub show_archived: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend_url: None,
            anon_key: None,
            site_url: None,
            refresh_token: None,
            cache_ttl_seconds: DEFAULT_CACHE_TTL_SECONDS,
            default_sort: SortSpec::default(),
            show_archived: false,
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn load_config(&self) -> ConfigResult<AppConfig>;
    async fn save_config(&self, config: &AppConfig) -> ConfigResult<()>;
    async fn get_refresh_token(&self) -> ConfigResult<Option<String>>;
    async fn set_refresh_token(&self, token: &str) -> ConfigResult<()>;
    async fn clear_refresh_token(&self) -> ConfigResult<()>;
}

/// Local copy of the user's custom categories. Never the source of truth.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LocalCategoryStore: Send + Sync {
    async fn load_categories(&self) -> ConfigResult<Vec<Category>>;
    async fn save_categories(&self, categories: &[Category]) -> ConfigResult<()>;
}
