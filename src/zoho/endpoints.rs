/// Zoho OAuth and CRM API endpoints for a data centre.
///
/// Zoho hosts each data centre under its own top-level domain, for both the
/// accounts (OAuth) server and the API server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub token: String,
    pub api: String,
}

const DATA_CENTRES: &[&str] = &["com", "eu", "in", "com.au", "jp", "com.cn"];

impl Endpoints {
    /// Endpoints for a data-centre domain such as `"com"` or `"eu"`.
    pub fn for_domain(domain: &str) -> anyhow::Result<Self> {
        if !DATA_CENTRES.contains(&domain) {
            anyhow::bail!(
                "Zoho domain '{}' is not supported (expected one of {:?})",
                domain,
                DATA_CENTRES
            );
        }
        Ok(Self {
            token: format!("https://accounts.zoho.{}/oauth/v2/token", domain),
            api: format!("https://www.zohoapis.{}/crm/v2", domain),
        })
    }

    /// Replace either endpoint, e.g. to point at a sandbox or a test server.
    pub fn with_overrides(mut self, token: Option<&str>, api: Option<&str>) -> Self {
        if let Some(token) = token {
            self.token = token.to_string();
        }
        if let Some(api) = api {
            self.api = api.trim_end_matches('/').to_string();
        }
        self
    }

    pub fn upsert_url(&self, module: &str) -> String {
        format!("{}/{}/upsert", self.api, module)
    }
}
