use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

use super::dto::{AuthUserDto, PasswordCredentials, RefreshTokenGrant, TokenResponse};
use super::BackendClient;
use crate::domain::Session;
use crate::ports::{AuthError, AuthEvent, AuthProvider, AuthResult, OAuthProvider};

const EVENT_CAPACITY: usize = 16;

/// Parse the `key=value&...` fragment the auth server appends to the
/// OAuth redirect URL.
pub fn parse_redirect_fragment(redirect_url: &str) -> AuthResult<HashMap<String, String>> {
    let (_, fragment) = redirect_url
        .split_once('#')
        .ok_or_else(|| AuthError::MalformedRedirect("missing URL fragment".into()))?;

    let mut values = HashMap::new();
    for pair in fragment.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let value = urlencoding::decode(&value.replace('+', " "))
            .map_err(|e| AuthError::MalformedRedirect(e.to_string()))?
            .into_owned();
        values.insert(key.to_string(), value);
    }
    Ok(values)
}

/// Auth API client. Owns the live session and publishes every change on a
/// broadcast channel.
pub struct BackendAuth {
    client: Arc<BackendClient>,
    session: RwLock<Option<Session>>,
    events: broadcast::Sender<AuthEvent>,
}

impl BackendAuth {
    pub fn new(client: Arc<BackendClient>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            client,
            session: RwLock::new(None),
            events,
        }
    }

    async fn establish(&self, session: Session, event: fn(Session) -> AuthEvent) -> Session {
        self.client.set_access_token(Some(session.access_token.clone()));
        *self.session.write().await = Some(session.clone());
        // No receivers is fine; the CLI never subscribes.
        let _ = self.events.send(event(session.clone()));
        session
    }

    async fn clear(&self) {
        self.client.set_access_token(None);
        *self.session.write().await = None;
        let _ = self.events.send(AuthEvent::SignedOut);
    }
}

#[async_trait]
impl AuthProvider for BackendAuth {
    async fn current_session(&self) -> AuthResult<Option<Session>> {
        let current = self.session.read().await.clone();
        match current {
            Some(session) if session.is_expired(Utc::now()) => {
                tracing::debug!("Session expired, refreshing");
                self.refresh_session(&session.refresh_token).await.map(Some)
            }
            other => Ok(other),
        }
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> AuthResult<Session> {
        let response: TokenResponse = self
            .client
            .auth_post(
                "/token?grant_type=password",
                &PasswordCredentials { email, password },
                None,
            )
            .await?;

        Ok(self.establish(response.into_session(Utc::now()), AuthEvent::SignedIn).await)
    }

    async fn sign_up(&self, email: &str, password: &str) -> AuthResult<Option<Session>> {
        let response: serde_json::Value = self
            .client
            .auth_post("/signup", &PasswordCredentials { email, password }, None)
            .await?;

        // Without an access token the account still needs email confirmation.
        if response.get("access_token").is_none() {
            return Ok(None);
        }

        let tokens: TokenResponse = serde_json::from_value(response)
            .map_err(|e| AuthError::Provider(format!("Unexpected sign-up response: {e}")))?;
        Ok(Some(self.establish(tokens.into_session(Utc::now()), AuthEvent::SignedIn).await))
    }

    async fn sign_out(&self) -> AuthResult<()> {
        let current = self.session.read().await.clone();
        let result = match &current {
            Some(session) => self.client.auth_post_empty("/logout", &session.access_token).await,
            None => Ok(()),
        };

        self.clear().await;
        result.map_err(AuthError::from)
    }

    async fn refresh_session(&self, refresh_token: &str) -> AuthResult<Session> {
        let response: TokenResponse = self
            .client
            .auth_post(
                "/token?grant_type=refresh_token",
                &RefreshTokenGrant { refresh_token },
                None,
            )
            .await?;

        Ok(self
            .establish(response.into_session(Utc::now()), AuthEvent::TokenRefreshed)
            .await)
    }

    fn oauth_authorize_url(&self, provider: OAuthProvider, redirect_to: &str) -> String {
        format!(
            "{}?provider={}&redirect_to={}",
            self.client.auth_url("/authorize"),
            provider.as_str(),
            urlencoding::encode(redirect_to)
        )
    }

    async fn complete_oauth(&self, redirect_url: &str) -> AuthResult<Session> {
        let mut values = parse_redirect_fragment(redirect_url)?;

        if let Some(message) = values.remove("error_description").or_else(|| values.remove("error")) {
            return Err(AuthError::Provider(message));
        }

        let access_token = values
            .remove("access_token")
            .ok_or_else(|| AuthError::MalformedRedirect("missing access_token".into()))?;
        let refresh_token = values
            .remove("refresh_token")
            .ok_or_else(|| AuthError::MalformedRedirect("missing refresh_token".into()))?;
        let expires_in = values.get("expires_in").and_then(|v| v.parse::<i64>().ok());

        let user: AuthUserDto = self.client.auth_get("/user", &access_token).await?;

        let session = Session {
            user: user.into(),
            access_token,
            refresh_token,
            expires_at: expires_in.map(|secs| Utc::now() + chrono::Duration::seconds(secs)),
        };
        Ok(self.establish(session, AuthEvent::SignedIn).await)
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn token_body(user: &str) -> serde_json::Value {
        serde_json::json!({
            "access_token": format!("access-{user}"),
            "refresh_token": format!("refresh-{user}"),
            "expires_in": 3600,
            "token_type": "bearer",
            "user": {"id": user, "email": format!("{user}@example.com")}
        })
    }

    fn auth(server: &MockServer) -> BackendAuth {
        BackendAuth::new(Arc::new(BackendClient::new(server.uri(), "anon").unwrap()))
    }

    #[test]
    fn test_parse_redirect_fragment() {
        let values = parse_redirect_fragment(
            "https://tfm.example/#access_token=abc&refresh_token=def&expires_in=3600&token_type=bearer",
        )
        .unwrap();
        assert_eq!(values["access_token"], "abc");
        assert_eq!(values["expires_in"], "3600");

        assert!(matches!(
            parse_redirect_fragment("https://tfm.example/?code=1"),
            Err(AuthError::MalformedRedirect(_))
        ));
    }

    #[tokio::test]
    async fn test_password_sign_in_publishes_event() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "password"))
            .and(body_json(serde_json::json!({"email": "u1@example.com", "password": "secret"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("u1")))
            .mount(&server)
            .await;

        let auth = auth(&server);
        let mut events = auth.subscribe();
        let session = auth.sign_in_with_password("u1@example.com", "secret").await.unwrap();

        assert_eq!(session.access_token, "access-u1");
        assert_eq!(events.recv().await.unwrap(), AuthEvent::SignedIn(session.clone()));
        assert_eq!(auth.current_session().await.unwrap(), Some(session));
    }

    #[tokio::test]
    async fn test_bad_credentials_surface_provider_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant",
                "error_description": "Invalid login credentials"
            })))
            .mount(&server)
            .await;

        let err = auth(&server)
            .sign_in_with_password("u1@example.com", "wrong")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid login credentials");
    }

    #[tokio::test]
    async fn test_sign_up_pending_confirmation_has_no_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/signup"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "u2",
                "email": "u2@example.com",
                "confirmation_sent_at": "2024-01-01T00:00:00Z"
            })))
            .mount(&server)
            .await;

        let session = auth(&server).sign_up("u2@example.com", "secret").await.unwrap();
        assert_eq!(session, None);
    }

    #[tokio::test]
    async fn test_complete_oauth_fetches_user() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/v1/user"))
            .and(header("authorization", "Bearer oauth-access"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "u3",
                "email": "u3@example.com"
            })))
            .mount(&server)
            .await;

        let auth = auth(&server);
        let session = auth
            .complete_oauth("http://localhost/#access_token=oauth-access&refresh_token=r3&expires_in=60")
            .await
            .unwrap();

        assert_eq!(session.user.id.0, "u3");
        assert_eq!(session.refresh_token, "r3");
        assert!(session.expires_at.is_some());
    }

    #[tokio::test]
    async fn test_oauth_error_fragment_is_reported() {
        let server = MockServer::start().await;
        let err = auth(&server)
            .complete_oauth("http://localhost/#error=access_denied&error_description=User+cancelled")
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::Provider("User cancelled".into()));
    }

    #[tokio::test]
    async fn test_sign_out_clears_session_even_on_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("u1")))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/logout"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let auth = auth(&server);
        auth.sign_in_with_password("u1@example.com", "secret").await.unwrap();
        let mut events = auth.subscribe();

        assert!(auth.sign_out().await.is_err());
        assert_eq!(events.recv().await.unwrap(), AuthEvent::SignedOut);
        assert_eq!(auth.current_session().await.unwrap(), None);
    }

    #[test]
    fn test_authorize_url_encodes_redirect() {
        let client = Arc::new(BackendClient::new("https://db.example", "anon").unwrap());
        let url = BackendAuth::new(client)
            .oauth_authorize_url(OAuthProvider::GitHub, "http://localhost:8080/callback");
        assert_eq!(
            url,
            "https://db.example/auth/v1/authorize?provider=github&redirect_to=http%3A%2F%2Flocalhost%3A8080%2Fcallback"
        );
    }
}
