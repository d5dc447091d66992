use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::RwLock;
use std::time::Duration;

use crate::ports::{RepositoryError, RepositoryResult};

const REST_PATH: &str = "/rest/v1";
const STORAGE_PATH: &str = "/storage/v1/object";
const AUTH_PATH: &str = "/auth/v1";

/// Equality filter in the table API's query syntax.
pub fn eq(column: &str, value: impl std::fmt::Display) -> (String, String) {
    (column.to_string(), format!("eq.{value}"))
}

pub fn order(column: &str, ascending: bool) -> (String, String) {
    let direction = if ascending { "asc" } else { "desc" };
    ("order".to_string(), format!("{column}.{direction}"))
}

pub fn build_query_string(params: &[(String, String)]) -> String {
    if params.is_empty() {
        return String::new();
    }

    format!(
        "?{}",
        params
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    )
}

/// Pull the provider's own message out of an error body, if it has one.
pub fn provider_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    ["message", "msg", "error_description", "error"]
        .iter()
        .find_map(|key| value.get(*key).and_then(|v| v.as_str()))
        .map(str::to_string)
}

/// HTTP client for the hosted backend: table API, auth API and object
/// storage behind one base URL and one anon key.
pub struct BackendClient {
    client: Client,
    base_url: String,
    anon_key: String,
    access_token: RwLock<Option<String>>,
}

impl BackendClient {
    pub fn new(base_url: impl Into<String>, anon_key: impl Into<String>) -> RepositoryResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(30))
            .user_agent(concat!("taskforce-monitor/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RepositoryError::Network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
            access_token: RwLock::new(None),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Requests are signed with the session token when one is set, the anon
    /// key otherwise.
    pub fn set_access_token(&self, token: Option<String>) {
        let mut current = self.access_token.write().unwrap_or_else(|e| e.into_inner());
        *current = token;
    }

    fn bearer(&self) -> String {
        self.access_token
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .unwrap_or_else(|| self.anon_key.clone())
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.anon_key)
            .bearer_auth(self.bearer())
    }

    fn table_url(&self, table: &str, params: &[(String, String)]) -> String {
        format!("{}{}/{}{}", self.base_url, REST_PATH, table, build_query_string(params))
    }

    pub fn auth_url(&self, path: &str) -> String {
        format!("{}{}{}", self.base_url, AUTH_PATH, path)
    }

    pub fn public_object_url(&self, bucket: &str, path: &str) -> String {
        format!("{}{}/public/{}/{}", self.base_url, STORAGE_PATH, bucket, path)
    }

    pub async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        params: &[(String, String)],
    ) -> RepositoryResult<Vec<T>> {
        let mut params = params.to_vec();
        if !params.iter().any(|(k, _)| k == "select") {
            params.insert(0, ("select".to_string(), "*".to_string()));
        }

        let response = self
            .authorized(self.client.get(self.table_url(table, &params)))
            .send()
            .await
            .map_err(|e| RepositoryError::Network(e.to_string()))?;

        self.handle_response(response).await
    }

    pub async fn insert<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        table: &str,
        body: &B,
    ) -> RepositoryResult<T> {
        let response = self
            .authorized(self.client.post(self.table_url(table, &[])))
            .header("Prefer", "return=representation")
            .json(body)
            .send()
            .await
            .map_err(|e| RepositoryError::Network(e.to_string()))?;

        let rows: Vec<T> = self.handle_response(response).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| RepositoryError::Api(format!("Insert into {table} returned no rows")))
    }

    pub async fn upsert<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        table: &str,
        body: &B,
    ) -> RepositoryResult<T> {
        let response = self
            .authorized(self.client.post(self.table_url(table, &[])))
            .header("Prefer", "resolution=merge-duplicates,return=representation")
            .json(body)
            .send()
            .await
            .map_err(|e| RepositoryError::Network(e.to_string()))?;

        let rows: Vec<T> = self.handle_response(response).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| RepositoryError::Api(format!("Upsert into {table} returned no rows")))
    }

    pub async fn update<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        table: &str,
        filters: &[(String, String)],
        body: &B,
    ) -> RepositoryResult<T> {
        let response = self
            .authorized(self.client.patch(self.table_url(table, filters)))
            .header("Prefer", "return=representation")
            .json(body)
            .send()
            .await
            .map_err(|e| RepositoryError::Network(e.to_string()))?;

        // Row filters that match nothing come back as an empty array.
        let rows: Vec<T> = self.handle_response(response).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| RepositoryError::NotFound(format!("No {table} row matched the update")))
    }

    /// Deleting rows that are already gone is not an error.
    pub async fn delete(&self, table: &str, filters: &[(String, String)]) -> RepositoryResult<()> {
        let response = self
            .authorized(self.client.delete(self.table_url(table, filters)))
            .send()
            .await
            .map_err(|e| RepositoryError::Network(e.to_string()))?;

        match self.check_status(response).await {
            Ok(_) | Err(RepositoryError::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    pub async fn upload_object(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> RepositoryResult<()> {
        let url = format!("{}{}/{}/{}", self.base_url, STORAGE_PATH, bucket, path);
        let response = self
            .authorized(self.client.post(&url))
            .header("x-upsert", "true")
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await
            .map_err(|e| RepositoryError::Network(e.to_string()))?;

        self.check_status(response).await.map(|_| ())
    }

    /// POST to the auth API. `bearer` overrides the stored token.
    pub async fn auth_post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        bearer: Option<&str>,
    ) -> RepositoryResult<T> {
        let response = self.auth_request(self.client.post(self.auth_url(path)), bearer)
            .json(body)
            .send()
            .await
            .map_err(|e| RepositoryError::Network(e.to_string()))?;

        self.handle_response(response).await
    }

    /// POST to the auth API ignoring any response body.
    pub async fn auth_post_empty(&self, path: &str, bearer: &str) -> RepositoryResult<()> {
        let response = self
            .auth_request(self.client.post(self.auth_url(path)), Some(bearer))
            .send()
            .await
            .map_err(|e| RepositoryError::Network(e.to_string()))?;

        self.check_status(response).await.map(|_| ())
    }

    pub async fn auth_get<T: DeserializeOwned>(&self, path: &str, bearer: &str) -> RepositoryResult<T> {
        let response = self
            .auth_request(self.client.get(self.auth_url(path)), Some(bearer))
            .send()
            .await
            .map_err(|e| RepositoryError::Network(e.to_string()))?;

        self.handle_response(response).await
    }

    fn auth_request(&self, request: RequestBuilder, bearer: Option<&str>) -> RequestBuilder {
        let bearer = bearer.map(str::to_string).unwrap_or_else(|| self.anon_key.clone());
        request.header("apikey", &self.anon_key).bearer_auth(bearer)
    }

    async fn handle_response<T: DeserializeOwned>(&self, response: Response) -> RepositoryResult<T> {
        let response = self.check_status(response).await?;
        let response_text = response
            .text()
            .await
            .map_err(|e| RepositoryError::Network(e.to_string()))?;

        tracing::debug!("Backend response: {}", response_text);

        serde_json::from_str(&response_text).map_err(|e| {
            RepositoryError::Serialization(format!(
                "Failed to parse response: {}. Response was: {}",
                e, response_text
            ))
        })
    }

    async fn check_status(&self, response: Response) -> RepositoryResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);
            return Err(RepositoryError::RateLimit(retry_after));
        }

        let body = response.text().await.unwrap_or_default();
        tracing::debug!("Backend error {}: {}", status, body);
        let message = provider_message(&body);

        Err(match status.as_u16() {
            401 => RepositoryError::Authentication(
                message.unwrap_or_else(|| "Invalid or expired session".to_string()),
            ),
            404 => RepositoryError::NotFound(message.unwrap_or_else(|| "Resource not found".to_string())),
            _ => RepositoryError::Api(message.unwrap_or_else(|| format!("HTTP {}: {}", status, body))),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_provider_message_prefers_message_field() {
        assert_eq!(
            provider_message(r#"{"code":"23505","message":"duplicate key value"}"#),
            Some("duplicate key value".to_string())
        );
        assert_eq!(
            provider_message(r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#),
            Some("Invalid login credentials".to_string())
        );
        assert_eq!(provider_message("<html>bad gateway</html>"), None);
    }

    #[test]
    fn test_query_string_encodes_filters() {
        let params = vec![eq("user_id", "u 1"), order("created_at", false)];
        assert_eq!(
            build_query_string(&params),
            "?user_id=eq.u%201&order=created_at.desc"
        );
        assert_eq!(build_query_string(&[]), "");
    }

    #[tokio::test]
    async fn test_requests_carry_apikey_and_session_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/projects"))
            .and(query_param("select", "*"))
            .and(header("apikey", "anon"))
            .and(header("authorization", "Bearer session-token"))
            .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
            .expect(1)
            .mount(&server)
            .await;

        let client = BackendClient::new(server.uri(), "anon").unwrap();
        client.set_access_token(Some("session-token".into()));
        let rows: Vec<serde_json::Value> = client.select("projects", &[]).await.unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_error_message_is_surfaced_verbatim() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/projects"))
            .respond_with(ResponseTemplate::new(400).set_body_string(
                r#"{"code":"23502","message":"null value in column \"name\" violates not-null constraint"}"#,
            ))
            .mount(&server)
            .await;

        let client = BackendClient::new(server.uri(), "anon").unwrap();
        let err = client
            .insert::<serde_json::Value, _>("projects", &serde_json::json!({}))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "null value in column \"name\" violates not-null constraint"
        );
    }

    #[tokio::test]
    async fn test_status_codes_map_to_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/limited"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "12"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/private"))
            .respond_with(ResponseTemplate::new(401).set_body_string(r#"{"message":"JWT expired"}"#))
            .mount(&server)
            .await;

        let client = BackendClient::new(server.uri(), "anon").unwrap();
        assert_eq!(
            client.select::<serde_json::Value>("limited", &[]).await.unwrap_err(),
            RepositoryError::RateLimit(12)
        );
        assert_eq!(
            client.select::<serde_json::Value>("private", &[]).await.unwrap_err(),
            RepositoryError::Authentication("JWT expired".into())
        );
    }

    #[tokio::test]
    async fn test_delete_tolerates_missing_rows() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/rest/v1/projects"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = BackendClient::new(server.uri(), "anon").unwrap();
        client.delete("projects", &[eq("id", "gone")]).await.unwrap();
    }
}
