use serde::Deserialize;

/// Response from the OAuth token endpoint.
///
/// Zoho answers an invalid grant with HTTP 200 and `{"error": "..."}`, so
/// both fields are optional.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Response from `/<Module>/upsert`: one entry per submitted record, in
/// submission order.
#[derive(Debug, Default, Deserialize)]
pub struct UpsertResponse {
    #[serde(default)]
    pub data: Vec<UpsertResult>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpsertResult {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub details: UpsertDetails,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpsertDetails {
    #[serde(default)]
    pub id: Option<String>,
}
