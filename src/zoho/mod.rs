//! Zoho CRM client (write side of the sync).
//!
//! Upserts go to `<api>/<Module>/upsert` with a bearer-style
//! `Zoho-oauthtoken` header. Staleness of the access token is only discovered
//! through a 401; the client then refreshes once and retries the same
//! request exactly once.

pub mod endpoints;
pub mod records;
pub mod responses;

use std::time::Duration;

use anyhow::Context;
use reqwest::{Client, StatusCode};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::{SyncError, SyncResult};
use crate::types::RecordKind;

pub use self::endpoints::Endpoints;
use self::responses::TokenResponse;

const SERVICE: &str = "Zoho";

/// Marker Zoho puts in an upsert response when individual records failed.
const FAILURE_MARKER: &str = "FAILURE";

/// Credentials for the OAuth refresh-token grant.
#[derive(Clone)]
pub struct OAuthCredentials {
    pub refresh_token: String,
    pub client_id: String,
    pub client_secret: String,
}

impl std::fmt::Debug for OAuthCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthCredentials")
            .field("refresh_token", &"<redacted>")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// Successful upsert: the raw response body plus whether any record in the
/// batch was individually rejected.
#[derive(Debug, Clone)]
pub struct UpsertOutcome {
    pub body: Vec<u8>,
    pub partial_failure: bool,
}

impl UpsertOutcome {
    fn from_body(body: Vec<u8>) -> Self {
        let partial_failure = String::from_utf8_lossy(&body).contains(FAILURE_MARKER);
        Self {
            body,
            partial_failure,
        }
    }
}

/// Write access to the CRM. Implemented by [`ZohoClient`] and by in-memory
/// fakes in tests.
#[async_trait::async_trait]
pub trait TargetApi: Send + Sync {
    /// Upsert a serialised batch into the module for `kind`.
    async fn upsert(&self, payload: &[u8], kind: RecordKind) -> SyncResult<UpsertOutcome>;

    /// Obtain a fresh access token. Failure is fatal to the run.
    async fn refresh_token(&self) -> SyncResult<()>;
}

/// The access token together with a counter bumped on every refresh, so a
/// task that saw a 401 can tell whether someone else already refreshed.
#[derive(Default)]
struct TokenState {
    access_token: String,
    generation: u64,
}

enum Attempt {
    Done(UpsertOutcome),
    Unauthorized,
}

pub struct ZohoClient {
    client: Client,
    endpoints: Endpoints,
    credentials: OAuthCredentials,
    token: RwLock<TokenState>,
}

impl std::fmt::Debug for ZohoClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZohoClient")
            .field("endpoints", &self.endpoints)
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

impl ZohoClient {
    pub fn new(
        endpoints: Endpoints,
        credentials: OAuthCredentials,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build Zoho HTTP client")?;
        Ok(Self {
            client,
            endpoints,
            credentials,
            token: RwLock::new(TokenState::default()),
        })
    }

    async fn current_token(&self) -> (String, u64) {
        let state = self.token.read().await;
        (state.access_token.clone(), state.generation)
    }

    /// Refresh only if nobody has replaced the token since `seen_generation`.
    /// The write lock is held across the OAuth call so there is a single
    /// writer at a time.
    async fn refresh_if_stale(&self, seen_generation: u64) -> SyncResult<()> {
        let mut state = self.token.write().await;
        if state.generation != seen_generation {
            debug!("Access token already refreshed by another task");
            return Ok(());
        }
        state.access_token = self.request_access_token().await?;
        state.generation += 1;
        Ok(())
    }

    async fn request_access_token(&self) -> SyncResult<String> {
        let params = [
            ("refresh_token", self.credentials.refresh_token.as_str()),
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("grant_type", "refresh_token"),
        ];

        debug!("POST {}", self.endpoints.token);
        let response = self
            .client
            .post(&self.endpoints.token)
            .form(&params)
            .send()
            .await
            .map_err(|e| SyncError::TokenRefresh(format!("request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SyncError::TokenRefresh(format!("failed to read response: {}", e)))?;
        if !status.is_success() {
            return Err(SyncError::TokenRefresh(format!(
                "HTTP {}: {}",
                status.as_u16(),
                body
            )));
        }

        let parsed: TokenResponse = serde_json::from_str(&body).map_err(|e| {
            SyncError::TokenRefresh(format!("failed to parse response {}: {}", body, e))
        })?;
        match parsed.access_token {
            Some(token) if !token.is_empty() => {
                info!("Refreshed Zoho access token");
                Ok(token)
            }
            _ => Err(SyncError::TokenRefresh(
                parsed
                    .error
                    .unwrap_or_else(|| "response contained no access_token".to_string()),
            )),
        }
    }

    async fn send_upsert(
        &self,
        payload: &[u8],
        kind: RecordKind,
        token: &str,
    ) -> SyncResult<Attempt> {
        let url = self.endpoints.upsert_url(kind.module());
        debug!(%kind, bytes = payload.len(), "POST {}", url);

        let transport = |source| SyncError::Transport {
            service: SERVICE,
            source,
        };
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Zoho-oauthtoken {}", token))
            .header("Content-Type", "application/json")
            .body(payload.to_vec())
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        let body = response.bytes().await.map_err(transport)?.to_vec();
        if status.is_success() {
            Ok(Attempt::Done(UpsertOutcome::from_body(body)))
        } else if status == StatusCode::UNAUTHORIZED {
            Ok(Attempt::Unauthorized)
        } else {
            Err(SyncError::Rejected {
                service: SERVICE,
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            })
        }
    }

    #[cfg(test)]
    async fn seed_token(&self, token: &str) {
        self.token.write().await.access_token = token.to_string();
    }
}

#[async_trait::async_trait]
impl TargetApi for ZohoClient {
    async fn upsert(&self, payload: &[u8], kind: RecordKind) -> SyncResult<UpsertOutcome> {
        let (token, generation) = self.current_token().await;
        if let Attempt::Done(outcome) = self.send_upsert(payload, kind, &token).await? {
            return Ok(outcome);
        }

        warn!(%kind, "Zoho rejected the access token, refreshing and retrying once");
        self.refresh_if_stale(generation).await?;
        let (token, _) = self.current_token().await;
        match self.send_upsert(payload, kind, &token).await? {
            Attempt::Done(outcome) => Ok(outcome),
            Attempt::Unauthorized => Err(SyncError::Unauthorized { kind }),
        }
    }

    async fn refresh_token(&self) -> SyncResult<()> {
        let mut state = self.token.write().await;
        state.access_token = self.request_access_token().await?;
        state.generation += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> ZohoClient {
        let endpoints = Endpoints {
            token: format!("{}/oauth/v2/token", server.uri()),
            api: format!("{}/crm/v2", server.uri()),
        };
        let credentials = OAuthCredentials {
            refresh_token: "refresh-1".into(),
            client_id: "client-1".into(),
            client_secret: "secret-1".into(),
        };
        ZohoClient::new(endpoints, credentials, Duration::from_secs(5)).unwrap()
    }

    async fn mount_token(server: &MockServer, token: &str, expected_calls: u64) {
        Mock::given(method("POST"))
            .and(path("/oauth/v2/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=refresh-1"))
            .and(body_string_contains("client_id=client-1"))
            .and(body_string_contains("client_secret=secret-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": token,
                "expires_in": 3600
            })))
            .expect(expected_calls)
            .mount(server)
            .await;
    }

    fn success_body() -> serde_json::Value {
        json!({"data": [{"code": "SUCCESS", "status": "success", "details": {"id": "z1"}}]})
    }

    #[tokio::test]
    async fn test_upsert_success_sends_token_header() {
        let server = MockServer::start().await;
        mount_token(&server, "fresh", 1).await;
        Mock::given(method("POST"))
            .and(path("/crm/v2/Accounts/upsert"))
            .and(header("Authorization", "Zoho-oauthtoken fresh"))
            .and(body_string_contains("Account_Number"))
            .respond_with(ResponseTemplate::new(200).set_body_json(success_body()))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        client.refresh_token().await.unwrap();
        let outcome = client
            .upsert(
                br#"{"data":[],"duplicate_check_fields":["Account_Number"]}"#,
                RecordKind::Accounts,
            )
            .await
            .unwrap();
        assert!(!outcome.partial_failure);
        let body: serde_json::Value = serde_json::from_slice(&outcome.body).unwrap();
        assert_eq!(body["data"][0]["details"]["id"], "z1");
    }

    #[tokio::test]
    async fn test_failure_marker_flags_partial_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/crm/v2/Invoices/upsert"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"code": "MANDATORY_NOT_FOUND", "status": "error", "message": "FAILURE"}]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        client.seed_token("fresh").await;
        let outcome = client.upsert(b"{}", RecordKind::Invoices).await.unwrap();
        assert!(outcome.partial_failure);
    }

    #[tokio::test]
    async fn test_401_refreshes_once_and_retries_once() {
        let server = MockServer::start().await;
        mount_token(&server, "fresh", 1).await;
        Mock::given(method("POST"))
            .and(path("/crm/v2/Services/upsert"))
            .and(header("Authorization", "Zoho-oauthtoken stale"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({"code": "INVALID_TOKEN"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/crm/v2/Services/upsert"))
            .and(header("Authorization", "Zoho-oauthtoken fresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(success_body()))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        client.seed_token("stale").await;
        let outcome = client.upsert(b"{}", RecordKind::Services).await.unwrap();
        assert!(!outcome.partial_failure);
    }

    #[tokio::test]
    async fn test_second_401_is_not_retried_again() {
        let server = MockServer::start().await;
        mount_token(&server, "still-bad", 1).await;
        Mock::given(method("POST"))
            .and(path("/crm/v2/Invoices/upsert"))
            .respond_with(ResponseTemplate::new(401))
            .expect(2)
            .mount(&server)
            .await;

        let client = client_for(&server);
        client.seed_token("stale").await;
        let err = client.upsert(b"{}", RecordKind::Invoices).await.unwrap_err();
        assert!(matches!(
            err,
            SyncError::Unauthorized {
                kind: RecordKind::Invoices
            }
        ));
        assert!(!err.is_fatal());
    }

    #[tokio::test]
    async fn test_other_status_is_rejected_without_refresh() {
        let server = MockServer::start().await;
        mount_token(&server, "unused", 0).await;
        Mock::given(method("POST"))
            .and(path("/crm/v2/Accounts/upsert"))
            .respond_with(ResponseTemplate::new(400).set_body_string(r#"{"code":"INVALID_DATA"}"#))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        client.seed_token("fresh").await;
        let err = client.upsert(b"{}", RecordKind::Accounts).await.unwrap_err();
        match err {
            SyncError::Rejected {
                service,
                status,
                body,
            } => {
                assert_eq!(service, "Zoho");
                assert_eq!(status, 400);
                assert!(body.contains("INVALID_DATA"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_refresh_error_response_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/v2/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"error": "invalid_code"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/crm/v2/Accounts/upsert"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        client.seed_token("stale").await;
        let err = client.upsert(b"{}", RecordKind::Accounts).await.unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("invalid_code"));
    }

    #[tokio::test]
    async fn test_refresh_http_error_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/v2/token"))
            .respond_with(ResponseTemplate::new(500).set_body_string("down"))
            .mount(&server)
            .await;

        let err = client_for(&server).refresh_token().await.unwrap_err();
        assert!(matches!(err, SyncError::TokenRefresh(ref m) if m.contains("HTTP 500")));
    }

    #[tokio::test]
    async fn test_concurrent_401s_refresh_once() {
        let server = MockServer::start().await;
        mount_token(&server, "fresh", 1).await;
        for module in ["Services", "Invoices"] {
            Mock::given(method("POST"))
                .and(path(format!("/crm/v2/{}/upsert", module)))
                .and(header("Authorization", "Zoho-oauthtoken stale"))
                .respond_with(ResponseTemplate::new(401))
                .mount(&server)
                .await;
            Mock::given(method("POST"))
                .and(path(format!("/crm/v2/{}/upsert", module)))
                .and(header("Authorization", "Zoho-oauthtoken fresh"))
                .respond_with(ResponseTemplate::new(200).set_body_json(success_body()))
                .expect(1)
                .mount(&server)
                .await;
        }

        let client = client_for(&server);
        client.seed_token("stale").await;
        let (services, invoices) = tokio::join!(
            client.upsert(b"{}", RecordKind::Services),
            client.upsert(b"{}", RecordKind::Invoices)
        );
        assert!(services.is_ok());
        assert!(invoices.is_ok());
    }

    #[test]
    fn test_credentials_debug_redacted() {
        let creds = OAuthCredentials {
            refresh_token: "r-secret".into(),
            client_id: "cid".into(),
            client_secret: "c-secret".into(),
        };
        let debug = format!("{:?}", creds);
        assert!(debug.contains("cid"));
        assert!(!debug.contains("r-secret"));
        assert!(!debug.contains("c-secret"));
    }
}
