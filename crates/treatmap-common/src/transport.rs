use async_trait::async_trait;
use reqwest::{Client, ClientBuilder};
use std::time::Duration;
use tracing::debug;

use crate::error::{Result, TreatmapError};

/// Raw reply from one HTTP GET: status code plus body text.
/// Non-2xx replies are returned, not raised; the caller decides.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

impl HttpReply {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self { status, body: body.into() }
    }

    pub fn ok_json(body: &serde_json::Value) -> Self {
        Self::new(200, body.to_string())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Parse the body as JSON. An empty body reads as `null`.
    pub fn json(&self) -> Result<serde_json::Value> {
        if self.body.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// The single seam between the PubTator client and the network.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Issue `GET <base><path>?<params>`. Transport-level failures (timeouts,
    /// resets, DNS) are errors; any HTTP status is an `Ok` reply.
    async fn get(&self, path: &str, params: &[(String, String)]) -> Result<HttpReply>;
}

/// reqwest-backed transport bound to one base URL.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
    base_url: String,
}

impl ReqwestTransport {
    pub fn new(base_url: &str, timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = ClientBuilder::new()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| TreatmapError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, path: &str, params: &[(String, String)]) -> Result<HttpReply> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, ?params, "GET");

        let resp = self.client
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/json")
            .query(params)
            .send()
            .await
            .map_err(|e| TreatmapError::Transport {
                timeout: e.is_timeout(),
                message: e.to_string(),
            })?;

        let status = resp.status().as_u16();
        let body = resp.text().await.map_err(|e| TreatmapError::Transport {
            timeout: e.is_timeout(),
            message: e.to_string(),
        })?;

        Ok(HttpReply { status, body })
    }
}
