pub mod listing;
pub mod reviews;
pub mod urls;

pub use listing::ProductCrawler;
pub use reviews::ReviewCrawler;
pub use urls::{extract_product_id, with_pagination};

use std::time::Duration;

use serde_json::Value;

use crate::clients::CrawlTransport;
use crate::config::Config;
use crate::models::*;

#[derive(Debug, Clone)]
pub struct CrawlSettings {
    pub listing_url: String,
    pub review_url_template: String,
    pub listing_page_size: u64,
    pub review_page_size: u64,
    pub max_reviews_to_scrape: usize,
    pub max_retries: u32,
    pub retry_backoff: Duration,
    pub force_crawling: bool,
    pub duplicate_policy: DuplicatePolicy,
    pub checkpoint_freshness_secs: i64,
}

impl CrawlSettings {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            listing_url: cfg.product_listing_url.clone(),
            review_url_template: cfg.review_url_template.clone(),
            listing_page_size: cfg.listing_page_size.max(1),
            review_page_size: cfg.review_page_size.max(1),
            max_reviews_to_scrape: cfg.max_reviews_to_scrape,
            max_retries: cfg.max_retries,
            retry_backoff: cfg.crawl_retry_backoff(),
            force_crawling: cfg.force_crawling,
            duplicate_policy: cfg.duplicate_policy,
            checkpoint_freshness_secs: cfg.checkpoint_freshness_secs,
        }
    }
}

/// Fetch and decode one page, re-issuing the same request up to `max_retries`
/// times on transport errors, non-success statuses and undecodable bodies.
/// A URL outside the allowed domains fails at once.
pub async fn fetch_page(
    transport: &dyn CrawlTransport,
    url: &str,
    max_retries: u32,
    backoff: Duration,
) -> Result<Value> {
    let base_backoff_ms = backoff.as_millis() as u64;
    let mut attempt: u32 = 0;
    loop {
        let err = match transport.fetch(url).await {
            Ok(response) if response.is_success() => match serde_json::from_str::<Value>(&response.body) {
                Ok(body) => return Ok(body),
                Err(e) => CrawlerError::Decode(format!("{url}: {e}")),
            },
            Ok(response) => CrawlerError::Transport(format!("{url} answered with status {}", response.status)),
            Err(e @ CrawlerError::Disallowed(_)) => {
                tracing::error!(url = %url, error = %e, "Refusing page");
                return Err(e);
            }
            Err(e) => e,
        };
        if attempt >= max_retries {
            tracing::error!(url = %url, attempts = attempt + 1, error = %err, "Giving up on page");
            return Err(err);
        }
        let delay_ms = base_backoff_ms.saturating_mul(1u64 << attempt.min(16));
        attempt += 1;
        tracing::warn!(url = %url, attempt = attempt, max_retries = max_retries, delay_ms = delay_ms, error = %err, "Retrying page");
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }
}
