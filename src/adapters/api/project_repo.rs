use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

use super::client::{eq, order};
use super::dto::{CategoryRow, NewProjectRow, ProfileRow, ProjectPatch, ProjectRow};
use super::BackendClient;
use crate::domain::*;
use crate::ports::{
    CategoryRepository, ProfileRepository, ProjectQuery, ProjectRepository, RepositoryError,
    RepositoryResult,
};

const PROJECTS: &str = "projects";
const CATEGORIES: &str = "categories";
const PROFILES: &str = "profiles";

fn sort_column(key: SortKey) -> &'static str {
    match key {
        SortKey::Name => "name",
        SortKey::CreatedAt => "created_at",
        SortKey::Status => "status",
        SortKey::Priority => "priority",
        SortKey::Category => "category",
    }
}

/// Table-API implementation of the project, category and profile ports.
#[derive(Clone)]
pub struct BackendRepository {
    client: Arc<BackendClient>,
}

impl BackendRepository {
    pub fn new(client: Arc<BackendClient>) -> Self {
        Self { client }
    }

    fn build_project_params(&self, query: &ProjectQuery) -> Vec<(String, String)> {
        let mut params = Vec::new();

        if let Some(owner) = &query.owner {
            params.push(eq("user_id", owner));
        }

        if let Some(category) = &query.category {
            params.push(eq("category", category));
        }

        if let Some(spec) = query.order {
            params.push(order(sort_column(spec.key), spec.order.is_ascending()));
        }

        params
    }
}

#[async_trait]
impl ProjectRepository for BackendRepository {
    async fn list_projects(&self, query: &ProjectQuery) -> RepositoryResult<Vec<Project>> {
        let params = self.build_project_params(query);
        let rows: Vec<ProjectRow> = self.client.select(PROJECTS, &params).await?;
        tracing::debug!("Fetched {} project rows", rows.len());
        Ok(rows.into_iter().map(Project::from).collect())
    }

    async fn get_project(&self, id: &ProjectId) -> RepositoryResult<Project> {
        let rows: Vec<ProjectRow> = self.client.select(PROJECTS, &[eq("id", id)]).await?;
        rows.into_iter()
            .next()
            .map(Project::from)
            .ok_or_else(|| RepositoryError::NotFound(format!("Project {id} not found")))
    }

    async fn create_project(&self, owner: &UserId, project: &NewProject) -> RepositoryResult<Project> {
        let row: ProjectRow = self
            .client
            .insert(PROJECTS, &NewProjectRow::new(owner, project))
            .await?;
        Ok(row.into())
    }

    async fn update_project(&self, id: &ProjectId, update: &ProjectUpdate) -> RepositoryResult<Project> {
        let patch = ProjectPatch::new(update, Utc::now())?;
        let row: ProjectRow = self.client.update(PROJECTS, &[eq("id", id)], &patch).await?;
        Ok(row.into())
    }

    async fn delete_project(&self, id: &ProjectId) -> RepositoryResult<()> {
        self.client.delete(PROJECTS, &[eq("id", id)]).await
    }
}

#[async_trait]
impl CategoryRepository for BackendRepository {
    async fn list_categories(&self, owner: &UserId) -> RepositoryResult<Vec<Category>> {
        let rows: Vec<CategoryRow> = self
            .client
            .select(CATEGORIES, &[eq("user_id", owner), order("label", true)])
            .await?;
        Ok(rows.into_iter().map(Category::from).collect())
    }

    async fn create_category(&self, owner: &UserId, category: &NewCategory) -> RepositoryResult<Category> {
        let row: CategoryRow = self
            .client
            .insert(CATEGORIES, &CategoryRow::new(owner, category))
            .await?;
        Ok(row.into())
    }

    async fn delete_category(&self, owner: &UserId, id: &CategoryId) -> RepositoryResult<()> {
        self.client
            .delete(CATEGORIES, &[eq("user_id", owner), eq("id", id)])
            .await
    }
}

#[async_trait]
impl ProfileRepository for BackendRepository {
    async fn get_profile(&self, id: &UserId) -> RepositoryResult<Option<Profile>> {
        let rows: Vec<ProfileRow> = self.client.select(PROFILES, &[eq("id", id)]).await?;
        Ok(rows.into_iter().next().map(Profile::from))
    }

    async fn upsert_profile(&self, profile: &Profile) -> RepositoryResult<Profile> {
        let row: ProfileRow = self
            .client
            .upsert(PROFILES, &ProfileRow::from(profile))
            .await?;
        Ok(row.into())
    }

    async fn delete_profile(&self, id: &UserId) -> RepositoryResult<()> {
        self.client.delete(PROFILES, &[eq("id", id)]).await
    }
}
