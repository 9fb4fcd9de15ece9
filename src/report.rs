//! Forwarding of page-level sync errors to a monitoring sink.
//!
//! Reporting never blocks the pipeline and its own failures are only logged.
//! Deliveries run on tracked tasks; call [`BugsnagReporter::flush`] before the
//! process exits so pending events are not dropped with the runtime.

use std::time::Duration;

use anyhow::Context;
use reqwest::Client;
use serde_json::{json, Value};
use tokio_util::task::TaskTracker;

use crate::error::SyncError;

pub const BUGSNAG_NOTIFY_URL: &str = "https://notify.bugsnag.com";
const PAYLOAD_VERSION: &str = "5";

pub trait ErrorReporter: Send + Sync {
    /// Report `error`; `context` names where it happened, e.g. `"invoices page 3"`.
    fn notify(&self, error: &SyncError, context: &str);
}

/// Reporter that posts events to the Bugsnag notify API.
#[derive(Clone)]
pub struct BugsnagReporter {
    client: Client,
    endpoint: String,
    api_key: String,
    release_stage: String,
    in_flight: TaskTracker,
}

impl std::fmt::Debug for BugsnagReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BugsnagReporter")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .field("release_stage", &self.release_stage)
            .field("in_flight", &self.in_flight.len())
            .finish()
    }
}

impl BugsnagReporter {
    pub fn new(
        endpoint: &str,
        api_key: &str,
        release_stage: &str,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build Bugsnag HTTP client")?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            api_key: api_key.to_string(),
            release_stage: release_stage.to_string(),
            in_flight: TaskTracker::new(),
        })
    }

    fn payload(&self, error: &SyncError, context: &str) -> Value {
        json!({
            "apiKey": self.api_key,
            "payloadVersion": PAYLOAD_VERSION,
            "notifier": {
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
                "url": "https://www.bugsnag.com",
            },
            "events": [{
                "exceptions": [{
                    "errorClass": error.class(),
                    "message": error.to_string(),
                    "stacktrace": [],
                }],
                "context": context,
                "severity": "error",
                "unhandled": false,
                "app": {
                    "releaseStage": self.release_stage,
                    "version": env!("CARGO_PKG_VERSION"),
                },
            }],
        })
    }

    /// Deliver one event and wait for Bugsnag's answer.
    #[cfg(test)]
    pub async fn send(&self, error: &SyncError, context: &str) -> anyhow::Result<()> {
        self.post(&self.payload(error, context)).await
    }

    async fn post(&self, payload: &Value) -> anyhow::Result<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("Bugsnag-Api-Key", &self.api_key)
            .header("Bugsnag-Payload-Version", PAYLOAD_VERSION)
            .header("Bugsnag-Sent-At", chrono::Utc::now().to_rfc3339())
            .json(payload)
            .send()
            .await
            .context("Failed to send event to Bugsnag")?;
        if !response.status().is_success() {
            anyhow::bail!("Bugsnag returned HTTP {}", response.status().as_u16());
        }
        Ok(())
    }

    /// Wait up to `timeout` for queued events to be delivered. No further
    /// events are accepted for tracking once this has been called.
    pub async fn flush(&self, timeout: Duration) {
        self.in_flight.close();
        let pending = self.in_flight.len();
        if pending == 0 {
            return;
        }
        tracing::debug!(pending, "Waiting for error reports to be delivered");
        if tokio::time::timeout(timeout, self.in_flight.wait())
            .await
            .is_err()
        {
            tracing::warn!(
                pending = self.in_flight.len(),
                "Gave up waiting for error reports to be delivered"
            );
        }
    }
}

impl ErrorReporter for BugsnagReporter {
    fn notify(&self, error: &SyncError, context: &str) {
        let reporter = self.clone();
        let payload = self.payload(error, context);
        let context = context.to_string();
        self.in_flight.spawn(async move {
            if let Err(e) = reporter.post(&payload).await {
                tracing::debug!(%context, "Failed to report error to Bugsnag: {:#}", e);
            }
        });
    }
}
