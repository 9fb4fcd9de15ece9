use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use crate::zoho::Endpoints;

const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Application configuration, loaded from YAML.
///
/// Every value is an opaque string; required ones must be present and
/// non-empty.
#[derive(Deserialize)]
pub struct Config {
    pub hostbill: HostBillConfig,
    pub zoho: ZohoConfig,
    pub bugsnag: BugsnagConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

#[derive(Deserialize)]
pub struct HostBillConfig {
    /// Host name, e.g. `billing.example.com`. A full URL is also accepted.
    pub domain: String,
    pub credentials: HostBillCredentials,
}

#[derive(Deserialize)]
pub struct HostBillCredentials {
    pub api_id: String,
    pub api_key: String,
}

#[derive(Deserialize)]
pub struct ZohoConfig {
    #[serde(default = "default_zoho_domain")]
    pub domain: String,
    #[serde(default)]
    pub accounts_url: Option<String>,
    #[serde(default)]
    pub api_url: Option<String>,
    pub credentials: ZohoCredentials,
}

#[derive(Deserialize)]
pub struct ZohoCredentials {
    pub refresh_token: String,
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Deserialize)]
pub struct BugsnagConfig {
    pub credentials: BugsnagCredentials,
    #[serde(default = "default_release_stage")]
    pub release_stage: String,
}

#[derive(Deserialize)]
pub struct BugsnagCredentials {
    pub api_key: String,
}

#[derive(Debug, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

fn default_zoho_domain() -> String {
    "com".to_string()
}

fn default_release_stage() -> String {
    "production".to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("hostbill_domain", &self.hostbill.domain)
            .field("hostbill_api_id", &self.hostbill.credentials.api_id)
            .field("hostbill_api_key", &"<redacted>")
            .field("zoho_domain", &self.zoho.domain)
            .field("zoho_accounts_url", &self.zoho.accounts_url)
            .field("zoho_api_url", &self.zoho.api_url)
            .field("zoho_client_id", &self.zoho.credentials.client_id)
            .field("zoho_client_secret", &"<redacted>")
            .field("zoho_refresh_token", &"<redacted>")
            .field("bugsnag_api_key", &"<redacted>")
            .field("bugsnag_release_stage", &self.bugsnag.release_stage)
            .field("http", &self.http)
            .finish()
    }
}

pub(crate) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        let config: Config = serde_yaml::from_str(raw).context("Failed to parse YAML")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        let required = [
            ("hostbill.domain", &self.hostbill.domain),
            ("hostbill.credentials.api_id", &self.hostbill.credentials.api_id),
            ("hostbill.credentials.api_key", &self.hostbill.credentials.api_key),
            ("zoho.domain", &self.zoho.domain),
            ("zoho.credentials.refresh_token", &self.zoho.credentials.refresh_token),
            ("zoho.credentials.client_id", &self.zoho.credentials.client_id),
            ("zoho.credentials.client_secret", &self.zoho.credentials.client_secret),
            ("bugsnag.credentials.api_key", &self.bugsnag.credentials.api_key),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                anyhow::bail!("Missing required config value '{}'", key);
            }
        }
        if self.http.timeout_secs == 0 {
            anyhow::bail!("http.timeout_secs must be greater than zero");
        }
        Ok(())
    }

    /// Scheme and host of the HostBill installation.
    pub fn hostbill_base_url(&self) -> String {
        let domain = self.hostbill.domain.trim_end_matches('/');
        if domain.contains("://") {
            domain.to_string()
        } else {
            format!("https://{}", domain)
        }
    }

    pub fn zoho_endpoints(&self) -> anyhow::Result<Endpoints> {
        let endpoints = Endpoints::for_domain(&self.zoho.domain)?;
        Ok(endpoints.with_overrides(
            self.zoho.accounts_url.as_deref(),
            self.zoho.api_url.as_deref(),
        ))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.http.timeout_secs)
    }
}
