use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use super::*;
use crate::domain::*;
use crate::ports::{AuthEvent, OAuthProvider};

#[derive(Debug, Clone)]
pub struct CachedList<T> {
    pub items: Vec<T>,
    pub fetched_at: DateTime<Utc>,
}

/// Every service the state container hands work to.
pub struct Services {
    pub projects: ProjectService,
    pub categories: CategoryService,
    pub auth: AuthService,
    pub profiles: ProfileService,
    pub repos: RepoBrowser,
    pub admin: AdminService,
}

/// Shared application state: the signed-in session, list caches and the
/// auth event listener. Constructed once and passed to the front ends.
pub struct StateManager {
    services: Services,
    session: Arc<RwLock<Option<Session>>>,
    project_lists: Arc<DashMap<UserId, CachedList<Project>>>,
    list_ttl: Duration,
    auth_listener: Mutex<Option<JoinHandle<()>>>,
}

impl StateManager {
    pub fn new(services: Services, list_ttl: Duration) -> Self {
        Self {
            services,
            session: Arc::new(RwLock::new(None)),
            project_lists: Arc::new(DashMap::new()),
            list_ttl,
            auth_listener: Mutex::new(None),
        }
    }

    /// Restore any stored session and start following auth events.
    /// Calling this again keeps the existing listener.
    pub async fn start(&self) -> AppResult<Option<Session>> {
        self.attach_auth_listener();

        let restored = self.services.auth.restore().await?;
        if let Some(session) = &restored {
            tracing::info!("Restored session for {}", session.user.id);
            *self.session.write().await = Some(session.clone());
        }
        Ok(restored)
    }

    pub fn shutdown(&self) {
        let mut listener = self.auth_listener.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(handle) = listener.take() {
            handle.abort();
            tracing::debug!("Auth listener detached");
        }
    }

    pub fn is_listening(&self) -> bool {
        let listener = self.auth_listener.lock().unwrap_or_else(|e| e.into_inner());
        listener.as_ref().map(|h| !h.is_finished()).unwrap_or(false)
    }

    fn attach_auth_listener(&self) {
        let mut listener = self.auth_listener.lock().unwrap_or_else(|e| e.into_inner());
        if listener.as_ref().map(|h| !h.is_finished()).unwrap_or(false) {
            return;
        }

        let mut events = self.services.auth.provider().subscribe();
        let session = self.session.clone();
        let project_lists = self.project_lists.clone();

        *listener = Some(tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(AuthEvent::SignedIn(s)) | Ok(AuthEvent::TokenRefreshed(s)) => {
                        tracing::debug!("Auth event: session for {}", s.user.id);
                        *session.write().await = Some(s);
                    }
                    Ok(AuthEvent::SignedOut) => {
                        tracing::debug!("Auth event: signed out");
                        *session.write().await = None;
                        project_lists.clear();
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("Auth listener skipped {} events", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }));
        tracing::debug!("Auth listener attached");
    }

    pub async fn current_session(&self) -> Option<Session> {
        self.session.read().await.clone()
    }

    pub async fn current_user(&self) -> AppResult<User> {
        self.session
            .read()
            .await
            .as_ref()
            .map(|s| s.user.clone())
            .ok_or(AppError::AuthenticationRequired)
    }

    pub fn invalidate_project_lists(&self) {
        self.project_lists.clear();
    }

    // Auth

    pub async fn sign_in(&self, email: &str, password: &str) -> AppResult<Session> {
        let session = self.services.auth.sign_in(email, password).await?;
        self.set_session(Some(session.clone())).await;
        Ok(session)
    }

    pub async fn sign_up(&self, request: SignUpRequest) -> AppResult<Option<Session>> {
        let session = self.services.auth.sign_up(request).await?;
        if session.is_some() {
            self.set_session(session.clone()).await;
        }
        Ok(session)
    }

    pub async fn sign_out(&self) -> AppResult<()> {
        let result = self.services.auth.sign_out().await;
        self.set_session(None).await;
        result
    }

    pub fn oauth_url(&self, provider: OAuthProvider) -> AppResult<String> {
        self.services.auth.oauth_url(provider)
    }

    pub async fn complete_oauth(&self, redirect_url: &str) -> AppResult<Session> {
        let session = self.services.auth.complete_oauth(redirect_url).await?;
        self.set_session(Some(session.clone())).await;
        Ok(session)
    }

    async fn set_session(&self, session: Option<Session>) {
        let changed_user = {
            let current = self.session.read().await;
            current.as_ref().map(|s| &s.user.id) != session.as_ref().map(|s| &s.user.id)
        };
        if changed_user {
            self.invalidate_project_lists();
        }
        *self.session.write().await = session;
    }

    // Projects

    pub async fn projects(&self, use_cache: bool) -> AppResult<Vec<Project>> {
        let user = self.current_user().await?;

        if use_cache {
            if let Some(cached) = self.project_lists.get(&user.id) {
                if Utc::now() - cached.fetched_at < self.list_ttl {
                    return Ok(cached.items.clone());
                }
            }
        }

        let projects = self.services.projects.list(&user).await?;
        self.project_lists.insert(
            user.id.clone(),
            CachedList {
                items: projects.clone(),
                fetched_at: Utc::now(),
            },
        );
        Ok(projects)
    }

    pub async fn dashboard(&self, filter: &DashboardFilter, sort: Option<SortSpec>) -> AppResult<Vec<Project>> {
        let projects = self.projects(true).await?;
        Ok(dashboard_view(&projects, filter, sort).into_iter().cloned().collect())
    }

    pub async fn browse(&self, filter: &BrowseFilter, sort: SortSpec) -> AppResult<Vec<Project>> {
        let projects = self.projects(true).await?;
        Ok(browse_view(&projects, filter, sort).into_iter().cloned().collect())
    }

    pub async fn get_project(&self, id: &ProjectId) -> AppResult<Project> {
        let user = self.current_user().await?;
        self.services.projects.get(&user, id).await
    }

    pub async fn create_project(&self, project: NewProject) -> AppResult<Project> {
        let user = self.current_user().await?;
        let created = self.services.projects.create(&user, project).await?;
        self.invalidate_project_lists();
        Ok(created)
    }

    pub async fn update_project(&self, id: &ProjectId, update: ProjectUpdate) -> AppResult<Project> {
        let user = self.current_user().await?;
        let updated = self.services.projects.update(&user, id, update).await?;
        self.invalidate_project_lists();
        Ok(updated)
    }

    pub async fn set_status(&self, id: &ProjectId, status: ProjectStatus) -> AppResult<Project> {
        let user = self.current_user().await?;
        let updated = self.services.projects.set_status(&user, id, status).await?;
        self.invalidate_project_lists();
        Ok(updated)
    }

    pub async fn delete_project(&self, id: &ProjectId) -> AppResult<()> {
        let user = self.current_user().await?;
        self.services.projects.delete(&user, id).await?;
        self.invalidate_project_lists();
        Ok(())
    }

    pub async fn add_note(&self, id: &ProjectId, text: &str) -> AppResult<Project> {
        let user = self.current_user().await?;
        let updated = self.services.projects.add_note(&user, id, text).await?;
        self.invalidate_project_lists();
        Ok(updated)
    }

    pub async fn delete_note(&self, id: &ProjectId, note_id: &NoteId) -> AppResult<Project> {
        let user = self.current_user().await?;
        let updated = self.services.projects.delete_note(&user, id, note_id).await?;
        self.invalidate_project_lists();
        Ok(updated)
    }

    pub async fn generate_share_link(&self, id: &ProjectId) -> AppResult<String> {
        let user = self.current_user().await?;
        let token = self.services.projects.generate_share_link(&user, id).await?;
        self.invalidate_project_lists();
        Ok(token)
    }

    pub async fn view_shared(&self, id: &ProjectId, token: &str) -> AppResult<Project> {
        self.services.projects.view_shared(id, token).await
    }

    // Categories

    pub async fn cached_categories(&self) -> Vec<Category> {
        self.services.categories.cached().await
    }

    pub async fn categories(&self) -> AppResult<Vec<Category>> {
        let user = self.current_user().await?;
        self.services.categories.refresh(&user).await
    }

    pub async fn add_category(&self, category: NewCategory) -> AppResult<Vec<Category>> {
        let user = self.current_user().await?;
        self.services.categories.add(&user, category).await
    }

    pub async fn remove_category(&self, id: &CategoryId) -> AppResult<Vec<Category>> {
        let user = self.current_user().await?;
        self.services.categories.remove(&user, id).await
    }

    // Profile and repositories

    pub async fn profile(&self) -> AppResult<Profile> {
        let user = self.current_user().await?;
        self.services.profiles.get(&user).await
    }

    pub async fn save_profile(&self, profile: Profile) -> AppResult<Profile> {
        let user = self.current_user().await?;
        self.services.profiles.save(&user, profile).await
    }

    pub async fn upload_avatar(&self, file_name: &str, bytes: Vec<u8>, content_type: &str) -> AppResult<Profile> {
        let user = self.current_user().await?;
        self.services
            .profiles
            .upload_avatar(&user, file_name, bytes, content_type)
            .await
    }

    pub async fn repositories(&self, host: CodeHost, username: &str) -> AppResult<Vec<RepoSummary>> {
        self.services.repos.list(host, username, true).await
    }

    // Admin

    pub async fn migrate_project_notes(&self) -> AppResult<MigrationReport> {
        self.current_user().await?;
        let report = self.services.admin.migrate_project_notes().await?;
        self.invalidate_project_lists();
        Ok(report)
    }

    pub async fn purge_user_data(&self) -> AppResult<PurgeReport> {
        let user = self.current_user().await?;
        let report = self.services.admin.purge_user_data(&user.id).await?;
        self.invalidate_project_lists();
        Ok(report)
    }
}

impl Drop for StateManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}
