use thiserror::Error;

use crate::types::RecordKind;

/// Errors raised while fetching, translating or upserting a page.
///
/// Everything except [`SyncError::TokenRefresh`] is page-scoped: the
/// orchestrator reports it and moves on to the next page.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("HTTP request to {service} failed: {source}")]
    Transport {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to decode {what}: {source} (body: {body})")]
    Decode {
        what: &'static str,
        body: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{service} rejected the request (HTTP {status}): {body}")]
    Rejected {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("Zoho still returned 401 for {kind} after refreshing the access token")]
    Unauthorized { kind: RecordKind },

    #[error("Failed to translate {kind}: {message}")]
    Translation { kind: RecordKind, message: String },

    #[error("Failed to refresh Zoho access token: {0}")]
    TokenRefresh(String),
}

impl SyncError {
    pub(crate) fn decode(what: &'static str, body: &[u8], source: serde_json::Error) -> Self {
        SyncError::Decode {
            what,
            body: String::from_utf8_lossy(body).into_owned(),
            source,
        }
    }

    /// Whether this error must abort the whole run instead of skipping a page.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SyncError::TokenRefresh(_))
    }

    /// Short, stable class name used when forwarding to the error reporter.
    pub fn class(&self) -> &'static str {
        match self {
            SyncError::Transport { .. } => "TransportError",
            SyncError::Decode { .. } => "DecodeError",
            SyncError::Rejected { .. } => "UpstreamRejection",
            SyncError::Unauthorized { .. } => "AuthorizationFailure",
            SyncError::Translation { .. } => "TranslationError",
            SyncError::TokenRefresh(_) => "TokenRefreshError",
        }
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
