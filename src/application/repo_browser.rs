use super::{AppError, AppResult};
use crate::domain::{CodeHost, RepoSummary};
use crate::ports::{Cache, CodeHostClient};
use std::collections::HashMap;
use std::sync::Arc;

/// Lists a user's repositories on the supported code hosts. Results are
/// cached per host and username; failures are returned as-is, never retried.
pub struct RepoBrowser {
    clients: HashMap<CodeHost, Arc<dyn CodeHostClient>>,
    cache: Arc<dyn Cache<(CodeHost, String), Vec<RepoSummary>>>,
}

impl RepoBrowser {
    pub fn new(
        clients: Vec<Arc<dyn CodeHostClient>>,
        cache: Arc<dyn Cache<(CodeHost, String), Vec<RepoSummary>>>,
    ) -> Self {
        let clients = clients.into_iter().map(|c| (c.host(), c)).collect();
        Self { clients, cache }
    }

    pub async fn list(&self, host: CodeHost, username: &str, use_cache: bool) -> AppResult<Vec<RepoSummary>> {
        let username = username.trim();
        if username.is_empty() {
            return Err(crate::domain::DomainError::MissingField("username".into()).into());
        }

        let key = (host, username.to_string());
        if use_cache {
            if let Some(repos) = self.cache.get(&key).await {
                return Ok(repos);
            }
        }

        let client = self
            .clients
            .get(&host)
            .ok_or_else(|| AppError::NotConfigured(format!("no client for {host}")))?;

        let repos = client.list_repositories(username).await?;
        self.cache.insert(key, repos.clone()).await;
        Ok(repos)
    }
}
