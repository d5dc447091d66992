use super::{AppError, AppResult};
use crate::domain::*;
use crate::ports::{Cache, ProjectQuery, ProjectRepository, RepositoryError};
use chrono::Utc;
use std::sync::Arc;

/// Project reads and writes, with the ownership policy applied at every
/// boundary.
pub struct ProjectService {
    repository: Arc<dyn ProjectRepository>,
    cache: Arc<dyn Cache<ProjectId, Project>>,
}

impl ProjectService {
    pub fn new(
        repository: Arc<dyn ProjectRepository>,
        cache: Arc<dyn Cache<ProjectId, Project>>,
    ) -> Self {
        Self { repository, cache }
    }

    fn authorize(&self, user: &User, project: &Project) -> AppResult<()> {
        if can_access(user, project) {
            Ok(())
        } else {
            tracing::warn!("User {} denied access to project {}", user.id, project.id);
            Err(AppError::AccessDenied)
        }
    }

    async fn load(&self, id: &ProjectId, use_cache: bool) -> AppResult<Project> {
        if use_cache {
            if let Some(project) = self.cache.get(id).await {
                return Ok(project);
            }
        }

        let project = self.repository.get_project(id).await?;
        self.cache.insert(id.clone(), project.clone()).await;
        Ok(project)
    }

    async fn load_authorized(&self, user: &User, id: &ProjectId, use_cache: bool) -> AppResult<Project> {
        let project = self.load(id, use_cache).await?;
        self.authorize(user, &project)?;
        Ok(project)
    }

    async fn persist(&self, id: &ProjectId, update: &ProjectUpdate) -> AppResult<Project> {
        let updated = self.repository.update_project(id, update).await?;
        self.cache.insert(id.clone(), updated.clone()).await;
        Ok(updated)
    }

    pub async fn list(&self, user: &User) -> AppResult<Vec<Project>> {
        let query = ProjectQuery {
            owner: Some(user.id.clone()),
            category: None,
            order: Some(SortSpec::new(SortKey::CreatedAt, SortOrder::Desc)),
        };
        let projects = self.repository.list_projects(&query).await?;

        let mut visible = Vec::with_capacity(projects.len());
        for project in projects {
            if !can_access(user, &project) {
                tracing::warn!("Dropping project {} not owned by {}", project.id, user.id);
                continue;
            }
            self.cache.insert(project.id.clone(), project.clone()).await;
            visible.push(project);
        }

        Ok(visible)
    }

    pub async fn get(&self, user: &User, id: &ProjectId) -> AppResult<Project> {
        self.load_authorized(user, id, true).await
    }

    pub async fn create(&self, user: &User, project: NewProject) -> AppResult<Project> {
        project.validate()?;
        let project = project.normalized();

        let created = self.repository.create_project(&user.id, &project).await?;
        tracing::info!("Created project {} ({})", created.id, created.name);
        self.cache.insert(created.id.clone(), created.clone()).await;
        Ok(created)
    }

    pub async fn update(&self, user: &User, id: &ProjectId, update: ProjectUpdate) -> AppResult<Project> {
        update.validate()?;
        let update = update.normalized();
        if update.is_empty() {
            return self.get(user, id).await;
        }

        self.load_authorized(user, id, true).await?;
        self.persist(id, &update).await
    }

    pub async fn set_status(&self, user: &User, id: &ProjectId, status: ProjectStatus) -> AppResult<Project> {
        self.update(user, id, ProjectUpdate::status(status)).await
    }

    pub async fn delete(&self, user: &User, id: &ProjectId) -> AppResult<()> {
        match self.load_authorized(user, id, true).await {
            Ok(_) => {}
            // Already gone; deletion is idempotent.
            Err(AppError::Repository(RepositoryError::NotFound(_))) => {
                self.cache.remove(id).await;
                return Ok(());
            }
            Err(e) => return Err(e),
        }

        self.repository.delete_project(id).await?;
        self.cache.remove(id).await;
        tracing::info!("Deleted project {}", id);
        Ok(())
    }

    pub async fn add_note(&self, user: &User, id: &ProjectId, text: &str) -> AppResult<Project> {
        let text = text.trim();
        if text.is_empty() {
            return Err(DomainError::EmptyNote.into());
        }

        let project = self.load_authorized(user, id, false).await?;
        let mut notes = project.notes();
        add_note(&mut notes, text, Utc::now());

        self.persist(id, &ProjectUpdate::comments(notes)).await
    }

    pub async fn delete_note(&self, user: &User, id: &ProjectId, note_id: &NoteId) -> AppResult<Project> {
        let project = self.load_authorized(user, id, false).await?;
        let mut notes = project.notes();

        if !delete_note(&mut notes, note_id) {
            tracing::debug!("Note {} not found on project {}; nothing to delete", note_id, id);
            return Ok(project);
        }

        self.persist(id, &ProjectUpdate::comments(notes)).await
    }

    /// Issue a fresh share token. Any previous link stops working.
    pub async fn generate_share_link(&self, user: &User, id: &ProjectId) -> AppResult<String> {
        self.load_authorized(user, id, true).await?;

        let token = generate_share_token();
        self.persist(id, &ProjectUpdate::share_token(token.clone())).await?;
        tracing::info!("Generated share link for project {}", id);
        Ok(token)
    }

    /// Read-only access by share token, without a session.
    pub async fn view_shared(&self, id: &ProjectId, token: &str) -> AppResult<Project> {
        let project = match self.repository.get_project(id).await {
            Ok(project) => project,
            Err(RepositoryError::NotFound(_)) => return Err(AppError::AccessDenied),
            Err(e) => return Err(e.into()),
        };

        if validate_share_token(&project, token) {
            Ok(project)
        } else {
            tracing::warn!("Rejected share token for project {}", id);
            Err(AppError::AccessDenied)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::cache::MokaCacheAdapter;
    use crate::application::testing::{user, InMemoryProjectRepository};

    fn service(repo: Arc<InMemoryProjectRepository>) -> ProjectService {
        ProjectService::new(
            repo,
            Arc::new(MokaCacheAdapter::<ProjectId, Project>::with_default_settings()),
        )
    }

    #[tokio::test]
    async fn test_create_normalizes_tags() {
        let repo = Arc::new(InMemoryProjectRepository::default());
        let service = service(repo.clone());
        let owner = user("u1");

        let created = service
            .create(
                &owner,
                NewProject {
                    name: "X".into(),
                    tags: normalize_tags("a, b ,a"),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(created.tags, vec!["a", "b"]);
        assert_eq!(repo.stored(&created.id).unwrap().tags, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_create_rejects_empty_name_without_network() {
        let repo = Arc::new(InMemoryProjectRepository::default());
        let service = service(repo.clone());

        let err = service.create(&user("u1"), NewProject::new("  ")).await.unwrap_err();
        assert_eq!(err, AppError::Validation(DomainError::EmptyName));
        assert_eq!(repo.write_count(), 0);
    }

    #[tokio::test]
    async fn test_other_users_project_is_denied() {
        let repo = Arc::new(InMemoryProjectRepository::default());
        let service = service(repo.clone());
        let project = repo.seed("u1", "Mine", None);

        let stranger = user("u2");
        assert_eq!(service.get(&stranger, &project.id).await.unwrap_err(), AppError::AccessDenied);
        assert_eq!(
            service.set_status(&stranger, &project.id, ProjectStatus::Abandoned).await.unwrap_err(),
            AppError::AccessDenied
        );
        assert_eq!(service.delete(&stranger, &project.id).await.unwrap_err(), AppError::AccessDenied);
        assert!(repo.stored(&project.id).is_some());
    }

    #[tokio::test]
    async fn test_list_only_returns_owned_projects() {
        let repo = Arc::new(InMemoryProjectRepository::default());
        let service = service(repo.clone());
        repo.seed("u1", "One", None);
        repo.seed("u2", "Two", None);

        let projects = service.list(&user("u1")).await.unwrap();
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].name, "One");
    }

    #[tokio::test]
    async fn test_add_note_upgrades_legacy_comments() {
        let repo = Arc::new(InMemoryProjectRepository::default());
        let service = service(repo.clone());
        let owner = user("u1");
        let project = repo.seed("u1", "Legacy", Some("old free text"));

        let updated = service.add_note(&owner, &project.id, "  new note ").await.unwrap();
        let notes = updated.notes();

        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0].id, NoteId(LEGACY_NOTE_ID.into()));
        assert_eq!(notes[0].date, project.created_at);
        assert_eq!(notes[1].text, "new note");
        assert!(matches!(repo.stored(&project.id).unwrap().comments, StoredNotes::NoteList(_)));
    }

    #[tokio::test]
    async fn test_add_note_keeps_unreadable_entries() {
        let repo = Arc::new(InMemoryProjectRepository::default());
        let service = service(repo.clone());
        let raw = r#"[{"id":1,"text":"kept?","date":"yesterday"},{"id":2,"text":"ok","date":"2024-01-02T00:00:00Z"}]"#;
        let project = repo.seed("u1", "Mixed", Some(raw));

        service.add_note(&user("u1"), &project.id, "new").await.unwrap();

        let stored = repo.stored(&project.id).unwrap().comments.encode().unwrap().unwrap();
        assert!(stored.contains("kept?"));
        assert!(stored.contains("\"new\""));
    }

    #[tokio::test]
    async fn test_blank_note_is_rejected() {
        let repo = Arc::new(InMemoryProjectRepository::default());
        let service = service(repo.clone());
        let project = repo.seed("u1", "P", None);

        let err = service.add_note(&user("u1"), &project.id, "   ").await.unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_delete_unknown_note_does_not_write() {
        let repo = Arc::new(InMemoryProjectRepository::default());
        let service = service(repo.clone());
        let owner = user("u1");
        let project = repo.seed("u1", "P", None);
        let with_note = service.add_note(&owner, &project.id, "keep").await.unwrap();
        let writes = repo.write_count();

        let unchanged = service
            .delete_note(&owner, &project.id, &NoteId("nope".into()))
            .await
            .unwrap();

        assert_eq!(unchanged.notes(), with_note.notes());
        assert_eq!(repo.write_count(), writes);
    }

    #[tokio::test]
    async fn test_delete_note_removes_entry() {
        let repo = Arc::new(InMemoryProjectRepository::default());
        let service = service(repo.clone());
        let owner = user("u1");
        let project = repo.seed("u1", "P", Some("legacy text"));

        let updated = service
            .delete_note(&owner, &project.id, &NoteId(LEGACY_NOTE_ID.into()))
            .await
            .unwrap();
        assert!(updated.notes().is_empty());
    }

    #[tokio::test]
    async fn test_regenerating_share_link_invalidates_old_token() {
        let repo = Arc::new(InMemoryProjectRepository::default());
        let service = service(repo.clone());
        let owner = user("u1");
        let project = repo.seed("u1", "Shared", None);

        let first = service.generate_share_link(&owner, &project.id).await.unwrap();
        assert!(service.view_shared(&project.id, &first).await.is_ok());

        let second = service.generate_share_link(&owner, &project.id).await.unwrap();
        assert_ne!(first, second);
        assert_eq!(
            service.view_shared(&project.id, &first).await.unwrap_err(),
            AppError::AccessDenied
        );
        assert!(service.view_shared(&project.id, &second).await.is_ok());
    }

    #[tokio::test]
    async fn test_view_shared_hides_missing_projects() {
        let repo = Arc::new(InMemoryProjectRepository::default());
        let service = service(repo);

        assert_eq!(
            service.view_shared(&ProjectId("missing".into()), "token").await.unwrap_err(),
            AppError::AccessDenied
        );
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let repo = Arc::new(InMemoryProjectRepository::default());
        let service = service(repo.clone());
        let owner = user("u1");
        let project = repo.seed("u1", "Gone", None);

        service.delete(&owner, &project.id).await.unwrap();
        assert!(repo.stored(&project.id).is_none());
        service.delete(&owner, &project.id).await.unwrap();
    }
}
