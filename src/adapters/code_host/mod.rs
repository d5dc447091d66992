pub mod github;
pub mod gitlab;

pub use github::GitHubClient;
pub use gitlab::GitLabClient;

use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::adapters::api::client::provider_message;
use crate::ports::{RepositoryError, RepositoryResult};

fn http_client() -> RepositoryResult<Client> {
    Client::builder()
        .timeout(Duration::from_secs(30))
        .user_agent(concat!("taskforce-monitor/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| RepositoryError::Network(format!("Failed to create HTTP client: {e}")))
}

/// Seconds until the host's rate-limit window resets, when it says so.
fn retry_after(response: &Response) -> Option<u64> {
    let header = |name: &str| {
        response
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
    };

    header("retry-after").or_else(|| {
        header("x-ratelimit-reset")
            .map(|reset| reset.saturating_sub(chrono::Utc::now().timestamp().max(0) as u64))
    })
}

async fn handle_response<T: DeserializeOwned>(response: Response) -> RepositoryResult<T> {
    let status = response.status();

    if status.is_success() {
        let text = response
            .text()
            .await
            .map_err(|e| RepositoryError::Network(e.to_string()))?;
        tracing::debug!("Code host response: {} bytes", text.len());
        return serde_json::from_str(&text)
            .map_err(|e| RepositoryError::Serialization(format!("Failed to parse response: {e}")));
    }

    let exhausted = response
        .headers()
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == "0")
        .unwrap_or(false);
    if status.as_u16() == 429 || (status.as_u16() == 403 && exhausted) {
        return Err(RepositoryError::RateLimit(retry_after(&response).unwrap_or(60)));
    }

    let body = response.text().await.unwrap_or_default();
    let message = provider_message(&body);
    Err(match status.as_u16() {
        401 => RepositoryError::Authentication(message.unwrap_or_else(|| "Unauthorized".to_string())),
        404 => RepositoryError::NotFound(message.unwrap_or_else(|| "User not found".to_string())),
        _ => RepositoryError::Api(message.unwrap_or_else(|| format!("HTTP {}: {}", status, body))),
    })
}
