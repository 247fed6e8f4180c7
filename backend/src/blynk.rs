use crate::publisher::{DashboardPayload, DashboardSink, PublishError};
use anyhow::Context;
use reqwest::StatusCode;
use reqwest::Url;
use reqwest::blocking::Client;
use std::time::Duration;

const USER_AGENT: &str = "SensorBridge/0.1";

/// Blynk cloud "batch update" client. One GET per push carrying the token and
/// every virtual pin as query parameters.
pub struct BlynkClient {
    client: Client,
    batch_url: Url,
    token: String,
}

impl BlynkClient {
    pub fn new(batch_url: &str, token: &str, timeout: Duration) -> anyhow::Result<Self> {
        let batch_url =
            Url::parse(batch_url).with_context(|| format!("invalid dashboard URL {batch_url}"))?;
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            batch_url,
            token: token.to_string(),
        })
    }

    fn request_url(&self, payload: &DashboardPayload) -> Url {
        let mut url = self.batch_url.clone();
        url.query_pairs_mut()
            .append_pair("token", &self.token)
            .extend_pairs(payload.query_pairs());
        url
    }
}

impl DashboardSink for BlynkClient {
    fn push(&mut self, payload: &DashboardPayload) -> Result<(), PublishError> {
        let resp = self.client.get(self.request_url(payload)).send()?;
        let status = resp.status();
        // Blynk returns 200 on success
        if status != StatusCode::OK {
            let body = resp.text().unwrap_or_default();
            return Err(PublishError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}
