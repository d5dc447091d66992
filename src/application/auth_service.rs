use super::{AppError, AppResult};
use crate::domain::{DomainError, Session};
use crate::ports::{AuthProvider, ConfigStore, OAuthProvider};
use std::sync::Arc;

pub const MIN_PASSWORD_LENGTH: usize = 6;

#[derive(Debug, Clone)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

impl SignUpRequest {
    pub fn validate(&self) -> Result<(), DomainError> {
        validate_credentials(&self.email, &self.password)?;
        if self.password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(DomainError::PasswordTooShort(MIN_PASSWORD_LENGTH));
        }
        if self.password != self.confirm_password {
            return Err(DomainError::PasswordMismatch);
        }
        Ok(())
    }
}

fn validate_credentials(email: &str, password: &str) -> Result<(), DomainError> {
    if email.trim().is_empty() {
        return Err(DomainError::MissingField("email".into()));
    }
    if password.is_empty() {
        return Err(DomainError::MissingField("password".into()));
    }
    Ok(())
}

/// Sign-in flows plus persistence of the refresh token between runs.
pub struct AuthService {
    provider: Arc<dyn AuthProvider>,
    config_store: Arc<dyn ConfigStore>,
    site_url: Option<String>,
}

impl AuthService {
    pub fn new(
        provider: Arc<dyn AuthProvider>,
        config_store: Arc<dyn ConfigStore>,
        site_url: Option<String>,
    ) -> Self {
        Self {
            provider,
            config_store,
            site_url,
        }
    }

    pub fn provider(&self) -> Arc<dyn AuthProvider> {
        self.provider.clone()
    }

    async fn remember(&self, session: &Session) {
        if let Err(e) = self.config_store.set_refresh_token(&session.refresh_token).await {
            tracing::warn!("Failed to persist session: {}", e);
        }
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> AppResult<Session> {
        validate_credentials(email, password)?;

        let session = self.provider.sign_in_with_password(email.trim(), password).await?;
        self.remember(&session).await;
        tracing::info!("Signed in as {}", session.user.id);
        Ok(session)
    }

    pub async fn sign_up(&self, request: SignUpRequest) -> AppResult<Option<Session>> {
        request.validate()?;

        let session = self.provider.sign_up(request.email.trim(), &request.password).await?;
        match &session {
            Some(session) => self.remember(session).await,
            None => tracing::info!("Sign-up pending email confirmation"),
        }
        Ok(session)
    }

    pub async fn sign_out(&self) -> AppResult<()> {
        let result = self.provider.sign_out().await;
        // The local session is forgotten even if the provider call failed.
        self.config_store.clear_refresh_token().await?;
        result?;
        Ok(())
    }

    pub fn oauth_url(&self, provider: OAuthProvider) -> AppResult<String> {
        let redirect_to = self
            .site_url
            .as_deref()
            .ok_or_else(|| AppError::NotConfigured("site_url is required for OAuth".into()))?;
        Ok(self.provider.oauth_authorize_url(provider, redirect_to))
    }

    pub async fn complete_oauth(&self, redirect_url: &str) -> AppResult<Session> {
        let session = self.provider.complete_oauth(redirect_url).await?;
        self.remember(&session).await;
        Ok(session)
    }

    /// Resume the stored session, if any. A rejected token is discarded.
    pub async fn restore(&self) -> AppResult<Option<Session>> {
        if let Some(session) = self.provider.current_session().await? {
            return Ok(Some(session));
        }

        let Some(token) = self.config_store.get_refresh_token().await? else {
            return Ok(None);
        };

        match self.provider.refresh_session(&token).await {
            Ok(session) => {
                self.remember(&session).await;
                Ok(Some(session))
            }
            Err(e) => {
                tracing::warn!("Stored session rejected: {}", e);
                self.config_store.clear_refresh_token().await?;
                Ok(None)
            }
        }
    }
}
