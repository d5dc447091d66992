use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{
    Category, CategoryId, NewCategory, NewProject, Profile, Project, ProjectId, ProjectUpdate,
    SortSpec, UserId,
};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RepositoryError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rate limited: retry after {0} seconds")]
    RateLimit(u64),

    #[error("{0}")]
    Api(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Equality filters plus ordering on one column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectQuery {
    pub owner: Option<UserId>,
    pub category: Option<String>,
    pub order: Option<SortSpec>,
}

impl ProjectQuery {
    pub fn owned_by(owner: &UserId) -> Self {
        Self {
            owner: Some(owner.clone()),
            ..Default::default()
        }
    }

    pub fn to_cache_key(&self) -> String {
        format!(
            "projects:{}:{}:{}",
            self.owner.as_ref().map(|o| o.0.as_str()).unwrap_or("all"),
            self.category.as_deref().unwrap_or("all"),
            self.order
                .map(|o| format!("{}.{:?}", o.key, o.order))
                .unwrap_or_else(|| "none".to_string()),
        )
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProjectRepository: Send + Sync {
    async fn list_projects(&self, query: &ProjectQuery) -> RepositoryResult<Vec<Project>>;
    async fn get_project(&self, id: &ProjectId) -> RepositoryResult<Project>;
    async fn create_project(&self, owner: &UserId, project: &NewProject) -> RepositoryResult<Project>;
    async fn update_project(&self, id: &ProjectId, update: &ProjectUpdate) -> RepositoryResult<Project>;
    /// Idempotent; deleting a missing row succeeds.
    async fn delete_project(&self, id: &ProjectId) -> RepositoryResult<()>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CategoryRepository: Send + Sync {
    async fn list_categories(&self, owner: &UserId) -> RepositoryResult<Vec<Category>>;
    async fn create_category(&self, owner: &UserId, category: &NewCategory) -> RepositoryResult<Category>;
    async fn delete_category(&self, owner: &UserId, id: &CategoryId) -> RepositoryResult<()>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn get_profile(&self, id: &UserId) -> RepositoryResult<Option<Profile>>;
    async fn upsert_profile(&self, profile: &Profile) -> RepositoryResult<Profile>;
    async fn delete_profile(&self, id: &UserId) -> RepositoryResult<()>;
}
