use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;

use super::{handle_response, http_client};
use crate::domain::{CodeHost, RepoSummary};
use crate::ports::{CodeHostClient, RepositoryError, RepositoryResult};

const GITLAB_API_BASE: &str = "https://gitlab.com";

#[derive(Debug, Deserialize)]
struct GitLabProjectDto {
    name: String,
    path_with_namespace: String,
    description: Option<String>,
    web_url: String,
    #[serde(default)]
    star_count: u64,
    last_activity_at: Option<DateTime<Utc>>,
}

impl From<GitLabProjectDto> for RepoSummary {
    fn from(dto: GitLabProjectDto) -> Self {
        Self {
            host: CodeHost::GitLab,
            name: dto.name,
            full_name: dto.path_with_namespace,
            description: dto.description.filter(|d| !d.trim().is_empty()),
            url: dto.web_url,
            // Not part of the project listing.
            language: None,
            stars: dto.star_count,
            updated_at: dto.last_activity_at,
        }
    }
}

pub struct GitLabClient {
    client: Client,
    base_url: String,
}

impl GitLabClient {
    pub fn new() -> RepositoryResult<Self> {
        Self::with_base_url(GITLAB_API_BASE)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> RepositoryResult<Self> {
        Ok(Self {
            client: http_client()?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl CodeHostClient for GitLabClient {
    fn host(&self) -> CodeHost {
        CodeHost::GitLab
    }

    async fn list_repositories(&self, username: &str) -> RepositoryResult<Vec<RepoSummary>> {
        let url = format!(
            "{}/api/v4/users/{}/projects?order_by=last_activity_at&per_page=100",
            self.base_url,
            urlencoding::encode(username)
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| RepositoryError::Network(e.to_string()))?;

        let projects: Vec<GitLabProjectDto> = handle_response(response).await?;
        Ok(projects.into_iter().map(RepoSummary::from).collect())
    }
}
