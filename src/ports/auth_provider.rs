use async_trait::async_trait;
use std::fmt;
use thiserror::Error;
use tokio::sync::broadcast;

use super::RepositoryError;
use crate::domain::Session;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AuthError {
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("{0}")]
    Provider(String),

    #[error("No active session")]
    NoSession,

    #[error("Malformed OAuth redirect: {0}")]
    MalformedRedirect(String),
}

pub type AuthResult<T> = Result<T, AuthError>;

impl From<RepositoryError> for AuthError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Authentication(msg) => AuthError::InvalidCredentials(msg),
            RepositoryError::Network(msg) => AuthError::Network(msg),
            RepositoryError::Api(msg) => AuthError::Provider(msg),
            other => AuthError::Provider(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AuthEvent {
    SignedIn(Session),
    TokenRefreshed(Session),
    SignedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OAuthProvider {
    GitHub,
    GitLab,
    Google,
}

impl OAuthProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            OAuthProvider::GitHub => "github",
            OAuthProvider::GitLab => "gitlab",
            OAuthProvider::Google => "google",
        }
    }
}

impl fmt::Display for OAuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OAuthProvider {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "github" => Ok(OAuthProvider::GitHub),
            "gitlab" => Ok(OAuthProvider::GitLab),
            "google" => Ok(OAuthProvider::Google),
            other => Err(AuthError::Provider(format!("Unsupported OAuth provider: {other}"))),
        }
    }
}

/// Session-based authentication collaborator.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn current_session(&self) -> AuthResult<Option<Session>>;
    async fn sign_in_with_password(&self, email: &str, password: &str) -> AuthResult<Session>;
    /// `None` when the provider requires email confirmation first.
    async fn sign_up(&self, email: &str, password: &str) -> AuthResult<Option<Session>>;
    async fn sign_out(&self) -> AuthResult<()>;
    async fn refresh_session(&self, refresh_token: &str) -> AuthResult<Session>;
    fn oauth_authorize_url(&self, provider: OAuthProvider, redirect_to: &str) -> String;
    /// Finish a same-origin OAuth redirect from the URL the browser landed on.
    async fn complete_oauth(&self, redirect_url: &str) -> AuthResult<Session>;
    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;
}
