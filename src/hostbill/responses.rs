//! Response shapes returned by the HostBill admin API.
//!
//! HostBill serialises nearly every scalar as a string, so fields are kept as
//! `String` and passed through to Zoho untouched.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{SyncError, SyncResult};

/// Pagination metadata attached to every listing call.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Sorter {
    #[serde(default)]
    pub perpage: Option<u32>,
    #[serde(default)]
    pub totalpages: u32,
}

/// A decoded listing page that knows how many pages the listing has.
pub trait Paginated {
    fn sorter(&self) -> &Sorter;

    fn total_pages(&self) -> u32 {
        self.sorter().totalpages
    }
}

/// Response from `getClients`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientsPage {
    #[serde(default)]
    pub clients: Vec<ClientRef>,
    #[serde(default)]
    pub sorter: Sorter,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClientRef {
    pub id: String,
}

/// Response from `getClientDetails`.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientDetails {
    pub client: Client,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Client {
    pub id: String,
    pub email: String,
    pub status: String,
    pub firstname: String,
    pub lastname: String,
    pub companyname: String,
    pub address1: String,
    pub city: String,
    pub state: String,
    pub postcode: String,
    pub country: String,
    pub phonenumber: String,
}

/// Response from `getAccounts` (HostBill's name for hosting services).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServicesPage {
    #[serde(default)]
    pub accounts: Vec<Service>,
    #[serde(default)]
    pub sorter: Sorter,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Service {
    pub id: String,
    pub domain: String,
    pub billingcycle: String,
    pub status: String,
    pub total: String,
    pub name: String,
    pub client_id: String,
}

/// Response from `getInvoices`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InvoicesPage {
    #[serde(default)]
    pub invoices: Vec<Invoice>,
    #[serde(default)]
    pub sorter: Sorter,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Invoice {
    pub id: String,
    pub date: String,
    pub duedate: String,
    pub datepaid: String,
    pub subtotal2: String,
    pub total: String,
    pub status: String,
    pub client_id: String,
    pub module: String,
}

impl Paginated for ClientsPage {
    fn sorter(&self) -> &Sorter {
        &self.sorter
    }
}

impl Paginated for ServicesPage {
    fn sorter(&self) -> &Sorter {
        &self.sorter
    }
}

impl Paginated for InvoicesPage {
    fn sorter(&self) -> &Sorter {
        &self.sorter
    }
}

/// HostBill reports API-level failures with HTTP 200 and `"success": false`.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    error: Option<Value>,
}

/// Decode a HostBill response body, surfacing `"success": false` as a rejection.
pub fn decode<T: DeserializeOwned>(what: &'static str, body: &[u8]) -> SyncResult<T> {
    let envelope: Envelope =
        serde_json::from_slice(body).map_err(|e| SyncError::decode(what, body, e))?;
    if envelope.success == Some(false) {
        let message = match envelope.error {
            Some(Value::Array(items)) => items
                .iter()
                .map(|v| v.as_str().map(str::to_owned).unwrap_or_else(|| v.to_string()))
                .collect::<Vec<_>>()
                .join("; "),
            Some(Value::String(s)) => s,
            Some(other) => other.to_string(),
            None => "unknown error".to_string(),
        };
        return Err(SyncError::Rejected {
            service: "HostBill",
            status: 200,
            body: message,
        });
    }
    serde_json::from_slice(body).map_err(|e| SyncError::decode(what, body, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clients_page_deserialize() {
        let json = br#"{
            "success": true,
            "call": "getClients",
            "clients": [{"id": "1", "firstname": "Jane"}, {"id": "7"}],
            "sorter": {"perpage": 25, "totalpages": 3}
        }"#;
        let page: ClientsPage = decode("clients", json).unwrap();
        assert_eq!(page.clients.len(), 2);
        assert_eq!(page.clients[1].id, "7");
        assert_eq!(page.total_pages(), 3);
        assert_eq!(page.sorter.perpage, Some(25));
    }

    #[test]
    fn test_services_page_missing_sorter_defaults_to_zero_pages() {
        let json = br#"{"accounts": [{"id": "10", "client_id": "1", "domain": "a.example"}]}"#;
        let page: ServicesPage = decode("services", json).unwrap();
        assert_eq!(page.accounts[0].domain, "a.example");
        assert_eq!(page.accounts[0].billingcycle, "");
        assert_eq!(page.total_pages(), 0);
    }

    #[test]
    fn test_client_details_deserialize() {
        let json = br#"{"client": {"id": "5", "companyname": "", "firstname": "Jane", "lastname": "Doe", "password": "x"}}"#;
        let details: ClientDetails = decode("client details", json).unwrap();
        assert_eq!(details.client.id, "5");
        assert_eq!(details.client.lastname, "Doe");
    }

    #[test]
    fn test_failed_envelope_is_rejection() {
        let json = br#"{"success": false, "error": ["invalid api key", "ip not allowed"]}"#;
        let err = decode::<InvoicesPage>("invoices", json).unwrap_err();
        match err {
            SyncError::Rejected { service, body, .. } => {
                assert_eq!(service, "HostBill");
                assert_eq!(body, "invalid api key; ip not allowed");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_malformed_body_is_decode_error() {
        let err = decode::<InvoicesPage>("invoices", b"<html>502</html>").unwrap_err();
        assert!(matches!(err, SyncError::Decode { what: "invoices", .. }));
    }

    #[test]
    fn test_wrong_shape_is_decode_error() {
        let err = decode::<ClientDetails>("client details", br#"{"success": true}"#).unwrap_err();
        assert!(matches!(err, SyncError::Decode { .. }));
    }
}
