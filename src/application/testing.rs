//! In-memory port implementations shared by the application tests.

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::domain::*;
use crate::ports::{ProjectQuery, ProjectRepository, RepositoryError, RepositoryResult};

pub fn user(id: &str) -> User {
    User {
        id: UserId(id.to_string()),
        email: Some(format!("{id}@example.com")),
    }
}

#[derive(Default)]
pub struct InMemoryProjectRepository {
    rows: Mutex<Vec<Project>>,
    failing_updates: Mutex<HashSet<ProjectId>>,
    writes: AtomicUsize,
}

impl InMemoryProjectRepository {
    /// Insert a row directly, bypassing the service layer.
    pub fn seed(&self, owner: &str, name: &str, comments: Option<&str>) -> Project {
        let mut rows = self.rows.lock().unwrap();
        let created_at = Utc.timestamp_opt(1_700_000_000, 0).single().unwrap()
            + Duration::seconds(rows.len() as i64);
        let project = Project {
            id: ProjectId(uuid::Uuid::new_v4().to_string()),
            user_id: UserId(owner.to_string()),
            name: name.to_string(),
            description: None,
            status: ProjectStatus::Concept,
            priority: None,
            category: None,
            tags: Vec::new(),
            link: None,
            comments: StoredNotes::decode(comments),
            share_token: None,
            created_at,
            updated_at: created_at,
        };
        rows.push(project.clone());
        project
    }

    pub fn stored(&self, id: &ProjectId) -> Option<Project> {
        self.rows.lock().unwrap().iter().find(|p| &p.id == id).cloned()
    }

    pub fn all(&self) -> Vec<Project> {
        self.rows.lock().unwrap().clone()
    }

    pub fn fail_updates_for(&self, id: &ProjectId) {
        self.failing_updates.lock().unwrap().insert(id.clone());
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProjectRepository for InMemoryProjectRepository {
    async fn list_projects(&self, query: &ProjectQuery) -> RepositoryResult<Vec<Project>> {
        let mut rows: Vec<Project> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|p| query.owner.as_ref().map(|o| o == &p.user_id).unwrap_or(true))
            .filter(|p| query.category.is_none() || p.category == query.category)
            .cloned()
            .collect();
        if let Some(order) = query.order {
            rows.sort_by(|a, b| compare_projects(a, b, order));
        }
        Ok(rows)
    }

    async fn get_project(&self, id: &ProjectId) -> RepositoryResult<Project> {
        self.stored(id)
            .ok_or_else(|| RepositoryError::NotFound(format!("project {id}")))
    }

    async fn create_project(&self, owner: &UserId, project: &NewProject) -> RepositoryResult<Project> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let now = Utc::now();
        let created = Project {
            id: ProjectId(uuid::Uuid::new_v4().to_string()),
            user_id: owner.clone(),
            name: project.name.clone(),
            description: project.description.clone(),
            status: project.status,
            priority: project.priority,
            category: project.category.clone(),
            tags: project.tags.clone(),
            link: project.link.clone(),
            comments: StoredNotes::Empty,
            share_token: None,
            created_at: now,
            updated_at: now,
        };
        self.rows.lock().unwrap().push(created.clone());
        Ok(created)
    }

    async fn update_project(&self, id: &ProjectId, update: &ProjectUpdate) -> RepositoryResult<Project> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.failing_updates.lock().unwrap().contains(id) {
            return Err(RepositoryError::Api(format!("update rejected for {id}")));
        }

        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .iter_mut()
            .find(|p| &p.id == id)
            .ok_or_else(|| RepositoryError::NotFound(format!("project {id}")))?;

        if let Some(name) = &update.name {
            row.name = name.clone();
        }
        if let Some(description) = &update.description {
            row.description = description.clone();
        }
        if let Some(status) = update.status {
            row.status = status;
        }
        if let Some(priority) = update.priority {
            row.priority = priority;
        }
        if let Some(category) = &update.category {
            row.category = category.clone();
        }
        if let Some(tags) = &update.tags {
            row.tags = tags.clone();
        }
        if let Some(link) = &update.link {
            row.link = link.clone();
        }
        if let Some(comments) = &update.comments {
            // Store through the column encoding, as the backend would.
            let encoded = comments
                .encode()
                .map_err(|e| RepositoryError::Serialization(e.to_string()))?;
            row.comments = StoredNotes::decode(encoded.as_deref());
        }
        if let Some(token) = &update.share_token {
            row.share_token = token.clone();
        }
        row.updated_at = Utc::now();

        Ok(row.clone())
    }

    async fn delete_project(&self, id: &ProjectId) -> RepositoryResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.rows.lock().unwrap().retain(|p| &p.id != id);
        Ok(())
    }
}
