//! HostBill admin API client (read side of the sync).
//!
//! Every call is a GET to `/admin/api.php` carrying the API credentials, the
//! call name and a zero-based page number. There is no retry here; transient
//! failures surface to the orchestrator, which skips the page.

pub mod responses;

use std::time::Duration;

use anyhow::Context;
use reqwest::Client;
use tracing::debug;
use url::Url;

use crate::error::{SyncError, SyncResult};
use crate::types::SourceCall;

pub use self::responses::{ClientDetails, ClientsPage, InvoicesPage, Paginated, ServicesPage};

const SERVICE: &str = "HostBill";

/// Read access to the billing system. Implemented by [`HostBillClient`] and
/// by in-memory fakes in tests.
#[async_trait::async_trait]
pub trait SourceApi: Send + Sync {
    /// Fetch one raw page for `call`. `id` is only sent for single-record
    /// lookups, where `page` is irrelevant.
    async fn fetch_page(&self, call: SourceCall, page: u32, id: Option<&str>)
        -> SyncResult<Vec<u8>>;

    async fn clients(&self, page: u32) -> SyncResult<ClientsPage> {
        let body = self.fetch_page(SourceCall::GetClients, page, None).await?;
        responses::decode("clients", &body)
    }

    async fn client_details(&self, id: &str) -> SyncResult<ClientDetails> {
        let body = self
            .fetch_page(SourceCall::GetClientDetails, 0, Some(id))
            .await?;
        responses::decode("client details", &body)
    }

    async fn services(&self, page: u32) -> SyncResult<ServicesPage> {
        let body = self.fetch_page(SourceCall::GetAccounts, page, None).await?;
        responses::decode("services", &body)
    }

    async fn invoices(&self, page: u32) -> SyncResult<InvoicesPage> {
        let body = self.fetch_page(SourceCall::GetInvoices, page, None).await?;
        responses::decode("invoices", &body)
    }
}

pub struct HostBillClient {
    client: Client,
    endpoint: Url,
    api_id: String,
    api_key: String,
}

impl std::fmt::Debug for HostBillClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostBillClient")
            .field("endpoint", &self.endpoint.as_str())
            .field("api_id", &self.api_id)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl HostBillClient {
    /// `base_url` is the scheme and host of the HostBill installation, e.g.
    /// `https://billing.example.com`.
    pub fn new(
        base_url: &str,
        api_id: &str,
        api_key: &str,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let endpoint = Url::parse(base_url)
            .and_then(|u| u.join("/admin/api.php"))
            .with_context(|| format!("Invalid HostBill URL: {}", base_url))?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HostBill HTTP client")?;
        Ok(Self {
            client,
            endpoint,
            api_id: api_id.to_string(),
            api_key: api_key.to_string(),
        })
    }
}

#[async_trait::async_trait]
impl SourceApi for HostBillClient {
    async fn fetch_page(
        &self,
        call: SourceCall,
        page: u32,
        id: Option<&str>,
    ) -> SyncResult<Vec<u8>> {
        let page = page.to_string();
        let mut query: Vec<(&str, &str)> = vec![
            ("api_id", self.api_id.as_str()),
            ("api_key", self.api_key.as_str()),
            ("call", call.as_str()),
            ("page", page.as_str()),
        ];
        if let Some(id) = id {
            query.push(("id", id));
        }

        debug!(%call, page = %page, id = ?id, "GET {}", self.endpoint);
        let transport = |source| SyncError::Transport {
            service: SERVICE,
            source,
        };
        let response = self
            .client
            .get(self.endpoint.clone())
            .query(&query)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        let body = response.bytes().await.map_err(transport)?;
        if !status.is_success() {
            return Err(SyncError::Rejected {
                service: SERVICE,
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }
        Ok(body.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param, query_param_is_missing};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> HostBillClient {
        HostBillClient::new(&server.uri(), "id-1", "key-1", Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_page_sends_credentials_and_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/admin/api.php"))
            .and(query_param("api_id", "id-1"))
            .and(query_param("api_key", "key-1"))
            .and(query_param("call", "getInvoices"))
            .and(query_param("page", "2"))
            .and(query_param_is_missing("id"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "invoices": [{"id": "99", "client_id": "1"}],
                "sorter": {"totalpages": 4}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let page = client_for(&server).invoices(2).await.unwrap();
        assert_eq!(page.invoices[0].id, "99");
        assert_eq!(page.total_pages(), 4);
    }

    #[tokio::test]
    async fn test_client_details_sends_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/admin/api.php"))
            .and(query_param("call", "getClientDetails"))
            .and(query_param("id", "42"))
            .and(query_param("page", "0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "client": {"id": "42", "companyname": "Acme"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let details = client_for(&server).client_details("42").await.unwrap();
        assert_eq!(details.client.companyname, "Acme");
    }

    #[tokio::test]
    async fn test_non_success_status_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let err = client_for(&server).clients(0).await.unwrap_err();
        match err {
            SyncError::Rejected { status, body, .. } => {
                assert_eq!(status, 503);
                assert_eq!(body, "maintenance");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transport_error() {
        let client =
            HostBillClient::new("http://127.0.0.1:1", "id", "key", Duration::from_secs(5))
                .unwrap();
        let err = client
            .fetch_page(SourceCall::GetClients, 0, None)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Transport { service: "HostBill", .. }));
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let client = HostBillClient::new(
            "https://billing.example.com",
            "id",
            "secret-key",
            Duration::from_secs(5),
        )
        .unwrap();
        let debug = format!("{:?}", client);
        assert!(debug.contains("https://billing.example.com/admin/api.php"));
        assert!(!debug.contains("secret-key"));
    }
}
