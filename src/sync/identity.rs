use std::collections::HashMap;

use tracing::warn;

use crate::error::{SyncError, SyncResult};
use crate::hostbill::ClientsPage;
use crate::zoho::responses::UpsertResponse;

/// HostBill client ID → Zoho account ID.
///
/// Filled page by page during the accounts pass, then only read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityMap {
    ids: HashMap<String, String>,
}

impl IdentityMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, source_id: &str) -> Option<&str> {
        self.ids.get(source_id).map(String::as_str)
    }

    #[cfg(test)]
    pub fn contains(&self, source_id: &str) -> bool {
        self.ids.contains_key(source_id)
    }

    pub fn insert(&mut self, source_id: impl Into<String>, target_id: impl Into<String>) {
        self.ids.insert(source_id.into(), target_id.into());
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl<S: Into<String>, T: Into<String>> FromIterator<(S, T)> for IdentityMap {
    fn from_iter<I: IntoIterator<Item = (S, T)>>(iter: I) -> Self {
        let mut map = IdentityMap::new();
        for (s, t) in iter {
            map.insert(s, t);
        }
        map
    }
}

/// Record the Zoho IDs assigned to one page of upserted clients.
///
/// Zoho answers with one result per submitted record in submission order, so
/// result `i` belongs to client `i` of the same page. Pairing stops at the
/// shorter of the two lists. Results without an ID (records Zoho rejected)
/// are skipped without breaking alignment. Returns the number of mappings
/// written.
pub fn merge(response: &[u8], map: &mut IdentityMap, page: &ClientsPage) -> SyncResult<usize> {
    let parsed: UpsertResponse =
        serde_json::from_slice(response).map_err(|e| SyncError::decode("upsert response", response, e))?;

    if parsed.data.len() != page.clients.len() {
        warn!(
            submitted = page.clients.len(),
            returned = parsed.data.len(),
            "Zoho returned a different number of results than accounts submitted"
        );
    }

    let mut written = 0;
    for (client, result) in page.clients.iter().zip(parsed.data.iter()) {
        match result.details.id.as_deref() {
            Some(id) if !id.is_empty() => {
                map.insert(client.id.as_str(), id);
                written += 1;
            }
            _ => warn!(
                client = %client.id,
                code = ?result.code,
                status = ?result.status,
                "No Zoho ID returned for client"
            ),
        }
    }
    Ok(written)
}
