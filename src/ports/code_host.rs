use async_trait::async_trait;

use super::RepositoryResult;
use crate::domain::{CodeHost, RepoSummary};

/// Read-only repository listing on a third-party code host.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CodeHostClient: Send + Sync {
    fn host(&self) -> CodeHost;
    async fn list_repositories(&self, username: &str) -> RepositoryResult<Vec<RepoSummary>>;
}
