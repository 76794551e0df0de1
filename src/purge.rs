use std::time::Duration;

use serde::Deserialize;

use crate::error::{DeployError, DeployResult};
use crate::settings::DeploySettings;

const CF_API: &str = "https://api.cloudflare.com/client/v4";

/// Invalidates cached objects at the edge.
pub trait CachePurger {
    /// Purge a single file URL. Fails unless the provider confirms.
    fn purge(&self, url: &str) -> DeployResult<()>;
}

/// Cloudflare cache purge using the global API key.
pub struct Cloudflare {
    zone: String,
    email: String,
    key: String,
    api_base: String,
    client: reqwest::blocking::Client,
}

impl Cloudflare {
    pub fn new(zone: &str, email: &str, key: &str) -> DeployResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            zone: zone.to_string(),
            email: email.to_string(),
            key: key.to_string(),
            api_base: CF_API.to_string(),
            client,
        })
    }

    pub fn from_settings(settings: &DeploySettings) -> DeployResult<Self> {
        Self::new(
            settings.cloudflare_zone.trim(),
            settings.cloudflare_email.trim(),
            settings.cloudflare_key.trim(),
        )
    }

    /// Point the client at another API root.
    #[must_use]
    pub fn api_base(mut self, base: &str) -> Self {
        self.api_base = base.trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn endpoint(&self) -> String {
        format!("{}/zones/{}/purge_cache", self.api_base, self.zone)
    }
}

impl CachePurger for Cloudflare {
    fn purge(&self, url: &str) -> DeployResult<()> {
        let endpoint = self.endpoint();
        tracing::debug!(%endpoint, url, "purging cache");

        let response = self
            .client
            .post(&endpoint)
            .header("X-Auth-Email", &self.email)
            .header("X-Auth-Key", &self.key)
            .json(&request_body(url))
            .send()?;

        let status = response.status().as_u16();
        let body = response.text()?;
        check_response(status, &body)
    }
}

/// `{"files":["<url>"]}`
#[must_use]
pub fn request_body(url: &str) -> serde_json::Value {
    serde_json::json!({ "files": [url] })
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

/// Interpret a purge response. Success needs both a 2xx status and
/// `"success": true` in the envelope.
pub fn check_response(status: u16, body: &str) -> DeployResult<()> {
    let parsed = serde_json::from_str::<ApiResponse>(body);

    match parsed {
        Ok(envelope) if (200..300).contains(&status) && envelope.success => Ok(()),
        Ok(envelope) => {
            let message = if envelope.errors.is_empty() {
                "provider reported failure".to_string()
            } else {
                envelope
                    .errors
                    .iter()
                    .map(|e| format!("{} ({})", e.message, e.code))
                    .collect::<Vec<_>>()
                    .join("; ")
            };
            Err(DeployError::PurgeRejected { status, message })
        }
        Err(_) => Err(DeployError::PurgeRejected {
            status,
            message: format!("unexpected response: {}", body.trim()),
        }),
    }
}

/// Purge the build artifact URL of `settings`. Returns the purged URL.
pub fn purge_cache(purger: &dyn CachePurger, settings: &DeploySettings) -> DeployResult<String> {
    settings.validate_for_purge()?;

    let url = settings.purge_url();
    eprintln!("Purging {url} from Cloudflare cache...");
    purger.purge(&url)?;
    eprintln!("  Purged");
    Ok(url)
}
