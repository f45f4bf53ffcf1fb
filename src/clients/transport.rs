use async_trait::async_trait;
use reqwest::Client;
use url::Url;

use crate::config::Config;
use crate::models::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub body: String,
}

impl FetchResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Issues a single request and hands back the raw body. Retry policy belongs to the caller.
#[async_trait]
pub trait CrawlTransport: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchResponse>;
}

#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    allowed_domains: Vec<String>,
}

impl HttpTransport {
    pub fn new(timeout_ms: u64, user_agent: &str, allowed_domains: Vec<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_millis(timeout_ms))
            .connect_timeout(std::time::Duration::from_millis(timeout_ms.min(10_000)))
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client, allowed_domains })
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        Self::new(cfg.http_timeout_ms, &cfg.http_user_agent, cfg.allowed_domains.clone())
    }

    /// An empty allow-list admits every host.
    pub fn is_allowed(&self, url: &Url) -> bool {
        if self.allowed_domains.is_empty() {
            return true;
        }
        let Some(host) = url.host_str() else { return false };
        self.allowed_domains
            .iter()
            .any(|domain| host == domain || host.ends_with(&format!(".{domain}")))
    }
}

#[async_trait]
impl CrawlTransport for HttpTransport {
    async fn fetch(&self, url: &str) -> Result<FetchResponse> {
        let parsed = Url::parse(url)?;
        if !self.is_allowed(&parsed) {
            return Err(CrawlerError::Disallowed(format!("{url} is outside the allowed domains")));
        }
        tracing::debug!(url = %url, "Sending crawl request");
        let response = self
            .client
            .get(parsed)
            .header("Accept", "application/json")
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(FetchResponse { status, body })
    }
}
