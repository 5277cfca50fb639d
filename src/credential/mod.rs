//! Ephemeral credential exchange
//!
//! Before a peer connection is opened, the session fetches a short-lived
//! credential from the local trusted token endpoint. The credential is scoped
//! to one realtime session and is never persisted.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use url::Url;

/// Error codes are capped to keep hostile or misconfigured endpoints from
/// flooding logs.
const MAX_ERROR_BODY_LEN: usize = 500;

/// Error types for credential exchange
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    /// The token endpoint responded with a non-success status
    #[error("token endpoint error ({0}): {1}")]
    Endpoint(StatusCode, String),

    /// The token endpoint was unreachable
    #[error("token endpoint request error: {0}")]
    Http(#[from] reqwest::Error),

    /// The token endpoint answered with an unusable payload
    #[error("malformed token response: {0}")]
    Malformed(String),

    /// The token endpoint URL is invalid
    #[error("credential configuration error: {0}")]
    Config(String),
}

/// Result type for credential operations
pub type CredentialResult<T> = Result<T, CredentialError>;

/// A short-lived credential scoped to one realtime session.
#[derive(Debug, Clone)]
pub struct EphemeralCredential {
    /// Bearer secret for the SDP exchange
    pub secret: String,
    /// Model identifier the session was minted for
    pub model: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    client_secret: ClientSecret,
    model: String,
}

#[derive(Debug, Deserialize)]
struct ClientSecret {
    value: String,
}

/// HTTP client for the local trusted token endpoint
#[derive(Clone)]
pub struct CredentialClient {
    client: Client,
    token_url: String,
}

impl std::fmt::Debug for CredentialClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialClient")
            .field("token_url", &self.token_url)
            .finish()
    }
}

impl CredentialClient {
    /// Create a new client for the given token endpoint.
    pub fn new(token_url: String, timeout: Duration) -> CredentialResult<Self> {
        Url::parse(&token_url)
            .map_err(|e| CredentialError::Config(format!("invalid token URL '{token_url}': {e}")))?;

        let client = Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(4)
            .build()
            .map_err(|e| CredentialError::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { client, token_url })
    }

    /// Fetch a fresh ephemeral credential, optionally scoped to a patient.
    ///
    /// # Returns
    /// * `CredentialResult<EphemeralCredential>` - the credential, or the
    ///   reason the exchange failed. A failed exchange leaves nothing behind;
    ///   callers simply retry on the next session start.
    pub async fn fetch(&self, patient_id: Option<i64>) -> CredentialResult<EphemeralCredential> {
        let mut url = Url::parse(&self.token_url)
            .map_err(|e| CredentialError::Config(format!("invalid token URL: {e}")))?;
        if let Some(id) = patient_id {
            url.query_pairs_mut()
                .append_pair("patient_id", &id.to_string());
        }

        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error body".to_string());
            let capped = if body.len() > MAX_ERROR_BODY_LEN {
                format!("{}... (truncated)", &body[..MAX_ERROR_BODY_LEN])
            } else {
                body
            };
            return Err(CredentialError::Endpoint(status, capped));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| CredentialError::Malformed(e.to_string()))?;

        tracing::debug!(model = %token.model, "ephemeral credential obtained");

        Ok(EphemeralCredential {
            secret: token.client_secret.value,
            model: token.model,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> CredentialClient {
        CredentialClient::new(
            format!("{}/v1/realtime/token", server.uri()),
            Duration::from_secs(2),
        )
        .unwrap()
    }

    #[test]
    fn test_new_rejects_invalid_url() {
        let result = CredentialClient::new("not a url".to_string(), Duration::from_secs(2));
        assert!(matches!(result, Err(CredentialError::Config(_))));
    }

    #[tokio::test]
    async fn test_fetch_parses_secret_and_model() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/realtime/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "sess_001",
                "model": "gpt-4o-realtime-preview-2024-12-17",
                "client_secret": { "value": "ek_test_secret", "expires_at": 1739000000 }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let credential = client_for(&server).fetch(None).await.unwrap();
        assert_eq!(credential.secret, "ek_test_secret");
        assert_eq!(credential.model, "gpt-4o-realtime-preview-2024-12-17");
    }

    #[tokio::test]
    async fn test_fetch_forwards_patient_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/realtime/token"))
            .and(query_param("patient_id", "42"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": "gpt-4o-realtime-preview-2024-12-17",
                "client_secret": { "value": "ek_scoped" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let credential = client_for(&server).fetch(Some(42)).await.unwrap();
        assert_eq!(credential.secret, "ek_scoped");
    }

    #[tokio::test]
    async fn test_fetch_maps_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_string("mint failed"))
            .mount(&server)
            .await;

        let result = client_for(&server).fetch(None).await;
        match result {
            Err(CredentialError::Endpoint(status, body)) => {
                assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
                assert_eq!(body, "mint failed");
            }
            other => panic!("expected endpoint error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_maps_malformed_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let result = client_for(&server).fetch(None).await;
        assert!(matches!(result, Err(CredentialError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_fetch_caps_long_error_bodies() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("X".repeat(2000)))
            .mount(&server)
            .await;

        let result = client_for(&server).fetch(None).await;
        match result {
            Err(CredentialError::Endpoint(_, body)) => {
                assert!(body.len() <= MAX_ERROR_BODY_LEN + 20);
                assert!(body.contains("(truncated)"));
            }
            other => panic!("expected endpoint error, got {other:?}"),
        }
    }
}
