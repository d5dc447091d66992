use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;

use super::{handle_response, http_client};
use crate::domain::{CodeHost, RepoSummary};
use crate::ports::{CodeHostClient, RepositoryError, RepositoryResult};

const GITHUB_API_BASE: &str = "https://api.github.com";

#[derive(Debug, Deserialize)]
struct GitHubRepoDto {
    name: String,
    full_name: String,
    description: Option<String>,
    html_url: String,
    language: Option<String>,
    #[serde(default)]
    stargazers_count: u64,
    updated_at: Option<DateTime<Utc>>,
}

impl From<GitHubRepoDto> for RepoSummary {
    fn from(dto: GitHubRepoDto) -> Self {
        Self {
            host: CodeHost::GitHub,
            name: dto.name,
            full_name: dto.full_name,
            description: dto.description,
            url: dto.html_url,
            language: dto.language,
            stars: dto.stargazers_count,
            updated_at: dto.updated_at,
        }
    }
}

pub struct GitHubClient {
    client: Client,
    base_url: String,
}

impl GitHubClient {
    pub fn new() -> RepositoryResult<Self> {
        Self::with_base_url(GITHUB_API_BASE)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> RepositoryResult<Self> {
        Ok(Self {
            client: http_client()?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl CodeHostClient for GitHubClient {
    fn host(&self) -> CodeHost {
        CodeHost::GitHub
    }

    async fn list_repositories(&self, username: &str) -> RepositoryResult<Vec<RepoSummary>> {
        let url = format!(
            "{}/users/{}/repos?sort=updated&per_page=100",
            self.base_url,
            urlencoding::encode(username)
        );

        let response = self
            .client
            .get(&url)
            .header("Accept", "application/vnd.github+json")
            .send()
            .await
            .map_err(|e| RepositoryError::Network(e.to_string()))?;

        let repos: Vec<GitHubRepoDto> = handle_response(response).await?;
        Ok(repos.into_iter().map(RepoSummary::from).collect())
    }
}
