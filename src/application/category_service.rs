use super::AppResult;
use crate::domain::*;
use crate::ports::{CategoryRepository, LocalCategoryStore};
use std::sync::Arc;

/// Categories with the backend table as the single source of truth.
///
/// The local store is an optimistic cache: it is read for instant display and
/// overwritten after every successful backend read, never written on its own.
pub struct CategoryService {
    repository: Arc<dyn CategoryRepository>,
    local: Arc<dyn LocalCategoryStore>,
}

impl CategoryService {
    pub fn new(repository: Arc<dyn CategoryRepository>, local: Arc<dyn LocalCategoryStore>) -> Self {
        Self { repository, local }
    }

    fn with_defaults(custom: Vec<Category>) -> Vec<Category> {
        let mut categories = default_categories();
        for category in custom {
            if !categories.iter().any(|c| c.id == category.id) {
                categories.push(category);
            }
        }
        categories
    }

    /// Last known list, without touching the network.
    pub async fn cached(&self) -> Vec<Category> {
        match self.local.load_categories().await {
            Ok(custom) => Self::with_defaults(custom),
            Err(e) => {
                tracing::warn!("Ignoring unreadable category cache: {}", e);
                default_categories()
            }
        }
    }

    pub async fn refresh(&self, user: &User) -> AppResult<Vec<Category>> {
        let custom = self.repository.list_categories(&user.id).await?;

        if let Err(e) = self.local.save_categories(&custom).await {
            tracing::warn!("Failed to update category cache: {}", e);
        }

        Ok(Self::with_defaults(custom))
    }

    pub async fn add(&self, user: &User, category: NewCategory) -> AppResult<Vec<Category>> {
        category.validate()?;

        let id = category.id();
        let current = self.refresh(user).await?;
        if current.iter().any(|c| c.id == id) {
            return Err(DomainError::DuplicateCategory(id.0).into());
        }

        let created = self.repository.create_category(&user.id, &category).await?;
        tracing::info!("Created category {}", created.id);
        self.refresh(user).await
    }

    pub async fn remove(&self, user: &User, id: &CategoryId) -> AppResult<Vec<Category>> {
        self.repository.delete_category(&user.id, id).await?;
        self.refresh(user).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::user;
    use crate::application::AppError;
    use crate::ports::{ConfigError, MockCategoryRepository, MockLocalCategoryStore, RepositoryError};

    fn custom(id: &str) -> Category {
        Category {
            id: CategoryId(id.into()),
            label: id.to_uppercase(),
            icon: "folder".into(),
            color: "#111111".into(),
        }
    }

    #[tokio::test]
    async fn test_refresh_overwrites_local_cache() {
        let mut repo = MockCategoryRepository::new();
        repo.expect_list_categories()
            .returning(|_| Ok(vec![custom("research")]));

        let mut local = MockLocalCategoryStore::new();
        local
            .expect_save_categories()
            .withf(|saved: &[Category]| saved.len() == 1 && saved[0].id.0 == "research")
            .times(1)
            .returning(|_| Ok(()));

        let service = CategoryService::new(Arc::new(repo), Arc::new(local));
        let categories = service.refresh(&user("u1")).await.unwrap();

        assert_eq!(categories.len(), default_categories().len() + 1);
        assert_eq!(categories.last().unwrap().id.0, "research");
    }

    #[tokio::test]
    async fn test_failed_backend_read_leaves_cache_alone() {
        let mut repo = MockCategoryRepository::new();
        repo.expect_list_categories()
            .returning(|_| Err(RepositoryError::Network("offline".into())));

        let mut local = MockLocalCategoryStore::new();
        local.expect_save_categories().times(0);

        let service = CategoryService::new(Arc::new(repo), Arc::new(local));
        let err = service.refresh(&user("u1")).await.unwrap_err();
        assert_eq!(err, AppError::Repository(RepositoryError::Network("offline".into())));
    }

    #[tokio::test]
    async fn test_cached_falls_back_to_defaults() {
        let repo = MockCategoryRepository::new();
        let mut local = MockLocalCategoryStore::new();
        local
            .expect_load_categories()
            .returning(|| Err(ConfigError::InvalidFormat("garbage".into())));

        let service = CategoryService::new(Arc::new(repo), Arc::new(local));
        assert_eq!(service.cached().await, default_categories());
    }

    #[tokio::test]
    async fn test_add_rejects_duplicate_before_insert() {
        let mut repo = MockCategoryRepository::new();
        repo.expect_list_categories().returning(|_| Ok(vec![]));
        repo.expect_create_category().times(0);

        let mut local = MockLocalCategoryStore::new();
        local.expect_save_categories().returning(|_| Ok(()));

        let service = CategoryService::new(Arc::new(repo), Arc::new(local));
        let err = service
            .add(
                &user("u1"),
                NewCategory {
                    label: "Web".into(),
                    icon: "globe".into(),
                    color: "#fff".into(),
                },
            )
            .await
            .unwrap_err();

        assert_eq!(err, AppError::Validation(DomainError::DuplicateCategory("web".into())));
    }

    #[tokio::test]
    async fn test_add_inserts_then_resyncs() {
        let mut repo = MockCategoryRepository::new();
        let mut seq = mockall::Sequence::new();
        repo.expect_list_categories()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(vec![]));
        repo.expect_create_category()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, c| {
                Ok(Category {
                    id: c.id(),
                    label: c.label.clone(),
                    icon: c.icon.clone(),
                    color: c.color.clone(),
                })
            });
        repo.expect_list_categories()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(vec![custom("side-projects")]));

        let mut local = MockLocalCategoryStore::new();
        local.expect_save_categories().times(2).returning(|_| Ok(()));

        let service = CategoryService::new(Arc::new(repo), Arc::new(local));
        let categories = service
            .add(
                &user("u1"),
                NewCategory {
                    label: "Side Projects".into(),
                    icon: "folder".into(),
                    color: "#abcdef".into(),
                },
            )
            .await
            .unwrap();

        assert!(categories.iter().any(|c| c.id.0 == "side-projects"));
    }
}
