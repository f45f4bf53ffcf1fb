use std::time::Duration;

use crate::models::{CrawlerError, DuplicatePolicy, Result};

pub const DEFAULT_LISTING_URL: &str = "https://www.uniqlo.com/jp/api/commerce/v5/ja/products?path=%2C%2C1641&categoryId=1641&offset=0&limit=72&httpFailure=true";
pub const DEFAULT_REVIEW_URL_TEMPLATE: &str = "https://www.uniqlo.com/jp/api/commerce/v5/ja/products/{product_id}/reviews?limit=5&offset=0&sort=submission_time&httpFailure=true";

#[derive(Debug, Clone)]
pub struct Config {
    pub mongodb_uri: String,
    pub database_name: String,
    pub http_timeout_ms: u64,
    pub http_user_agent: String,
    pub allowed_domains: Vec<String>,
    pub product_listing_url: String,
    pub review_url_template: String,
    pub listing_page_size: u64,
    pub review_page_size: u64,
    pub max_reviews_to_scrape: usize,
    pub max_retries: u32,
    pub crawl_retry_backoff_ms: u64,
    pub force_crawling: bool,
    pub force_drop_collection: bool,
    pub duplicate_policy: DuplicatePolicy,
    pub min_price_interval_secs: i64,
    pub checkpoint_freshness_secs: i64,
    // Translation backend
    pub translation_enabled: bool,
    pub openai_api_key: Option<String>,
    pub translation_assistant: Option<String>,
    pub openai_base_url: String,
    pub translation_workers: usize,
    pub translation_max_retries: u32,
    pub translation_rate_limit: u32,
    pub translation_rate_window_secs: u64,
    pub translation_poll_interval_ms: u64,
    pub translation_backoff_secs: u64,
    pub translation_poll_timeout_secs: u64,
    pub translation_max_failures: i32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Build the configuration from any key lookup; `from_env` uses the process environment.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |k: &str| get(k).filter(|v| !v.trim().is_empty());
        let required = |k: &str| {
            get(k).ok_or_else(|| CrawlerError::Configuration(format!("{k} is not set")))
        };

        let mongodb_uri = required("MONGO_URL")?;
        let database_name = get("DATABASE_NAME").unwrap_or_else(|| "uniqlo".to_string());
        let http_timeout_ms: u64 = get("HTTP_TIMEOUT_MS").and_then(|s| s.parse().ok()).unwrap_or(30_000);
        let http_user_agent = get("HTTP_USER_AGENT").unwrap_or_else(|| "review-crawler/0.1".to_string());
        let allowed_domains: Vec<String> = get("ALLOWED_DOMAINS")
            .unwrap_or_else(|| "www.uniqlo.com".to_string())
            .split(',')
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .collect();
        let product_listing_url = get("PRODUCT_LISTING_URL").unwrap_or_else(|| DEFAULT_LISTING_URL.to_string());
        let review_url_template = get("REVIEW_URL_TEMPLATE").unwrap_or_else(|| DEFAULT_REVIEW_URL_TEMPLATE.to_string());
        if !review_url_template.contains("{product_id}") {
            return Err(CrawlerError::Configuration(
                "REVIEW_URL_TEMPLATE must contain {product_id}".to_string(),
            ));
        }
        let listing_page_size: u64 = get("LISTING_PAGE_SIZE").and_then(|s| s.parse().ok()).unwrap_or(72);
        let review_page_size: u64 = get("REVIEW_PAGE_SIZE").and_then(|s| s.parse().ok()).unwrap_or(5);
        let max_reviews_to_scrape: usize = get("MAX_REVIEWS_TO_SCRAPE").and_then(|s| s.parse().ok()).unwrap_or(100);
        let max_retries: u32 = get("MAX_RETRIES").and_then(|s| s.parse().ok()).unwrap_or(3);
        let crawl_retry_backoff_ms: u64 = get("CRAWL_RETRY_BACKOFF_MS").and_then(|s| s.parse().ok()).unwrap_or(500);
        let force_crawling = get("FORCE_CRAWLING").map(|s| parse_flag(&s)).unwrap_or(false);
        let force_drop_collection = get("FORCE_DROP_COLLECTION").map(|s| parse_flag(&s)).unwrap_or(false);
        let duplicate_policy = match get("DUPLICATE_POLICY") {
            Some(s) => s.parse().map_err(CrawlerError::Configuration)?,
            None => DuplicatePolicy::default(),
        };
        let min_price_interval_secs: i64 = get("MIN_PRICE_INTERVAL_SECS").and_then(|s| s.parse().ok()).unwrap_or(86_400);
        let checkpoint_freshness_secs: i64 = get("CHECKPOINT_FRESHNESS_SECS").and_then(|s| s.parse().ok()).unwrap_or(86_400);

        let translation_enabled = get("TRANSLATION_ENABLED").map(|s| parse_flag(&s)).unwrap_or(true);
        let (openai_api_key, translation_assistant) = if translation_enabled {
            (Some(required("OPENAI_API_KEY")?), Some(required("TRANSLATION_ASSISTANT")?))
        } else {
            (get("OPENAI_API_KEY"), get("TRANSLATION_ASSISTANT"))
        };
        let openai_base_url = get("OPENAI_BASE_URL").unwrap_or_else(|| "https://api.openai.com/v1".to_string());
        let translation_workers: usize = get("TRANSLATION_WORKERS").and_then(|s| s.parse().ok()).unwrap_or(10);
        let translation_max_retries: u32 = get("TRANSLATION_MAX_RETRIES").and_then(|s| s.parse().ok()).unwrap_or(3);
        let translation_rate_limit: u32 = get("TRANSLATION_RATE_LIMIT").and_then(|s| s.parse().ok()).unwrap_or(60);
        let translation_rate_window_secs: u64 = get("TRANSLATION_RATE_WINDOW_SECS").and_then(|s| s.parse().ok()).unwrap_or(60);
        let translation_poll_interval_ms: u64 = get("TRANSLATION_POLL_INTERVAL_MS").and_then(|s| s.parse().ok()).unwrap_or(1_000);
        let translation_backoff_secs: u64 = get("TRANSLATION_BACKOFF_SECS").and_then(|s| s.parse().ok()).unwrap_or(10);
        let translation_poll_timeout_secs: u64 = get("TRANSLATION_POLL_TIMEOUT_SECS").and_then(|s| s.parse().ok()).unwrap_or(120);
        let translation_max_failures: i32 = get("TRANSLATION_MAX_FAILURES").and_then(|s| s.parse().ok()).unwrap_or(3);

        Ok(Self {
            mongodb_uri,
            database_name,
            http_timeout_ms,
            http_user_agent,
            allowed_domains,
            product_listing_url,
            review_url_template,
            listing_page_size,
            review_page_size,
            max_reviews_to_scrape,
            max_retries,
            crawl_retry_backoff_ms,
            force_crawling,
            force_drop_collection,
            duplicate_policy,
            min_price_interval_secs,
            checkpoint_freshness_secs,
            translation_enabled,
            openai_api_key,
            translation_assistant,
            openai_base_url,
            translation_workers,
            translation_max_retries,
            translation_rate_limit,
            translation_rate_window_secs,
            translation_poll_interval_ms,
            translation_backoff_secs,
            translation_poll_timeout_secs,
            translation_max_failures,
        })
    }

    pub fn crawl_retry_backoff(&self) -> Duration {
        Duration::from_millis(self.crawl_retry_backoff_ms)
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes" | "on")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_apply_when_only_required_vars_are_set() {
        let cfg = Config::from_lookup(lookup(&[
            ("MONGO_URL", "mongodb://localhost:27017"),
            ("OPENAI_API_KEY", "sk-test"),
            ("TRANSLATION_ASSISTANT", "asst_1"),
        ]))
        .unwrap();
        assert_eq!(cfg.database_name, "uniqlo");
        assert_eq!(cfg.max_reviews_to_scrape, 100);
        assert_eq!(cfg.max_retries, 3);
        assert!(!cfg.force_crawling);
        assert!(!cfg.force_drop_collection);
        assert_eq!(cfg.min_price_interval_secs, 86_400);
        assert_eq!(cfg.duplicate_policy, DuplicatePolicy::RunWide);
        assert_eq!(cfg.translation_rate_limit, 60);
        assert_eq!(cfg.translation_max_retries, 3);
        assert_eq!(cfg.translation_max_failures, 3);
        assert_eq!(cfg.allowed_domains, vec!["www.uniqlo.com".to_string()]);
    }

    #[test]
    fn missing_required_variables_are_fatal() {
        let err = Config::from_lookup(lookup(&[("OPENAI_API_KEY", "k"), ("TRANSLATION_ASSISTANT", "a")])).unwrap_err();
        assert!(err.to_string().contains("MONGO_URL"));

        let err = Config::from_lookup(lookup(&[("MONGO_URL", "mongodb://x")])).unwrap_err();
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn credentials_optional_when_translation_disabled() {
        let cfg = Config::from_lookup(lookup(&[
            ("MONGO_URL", "mongodb://x"),
            ("TRANSLATION_ENABLED", "false"),
            ("FORCE_CRAWLING", "True"),
            ("DUPLICATE_POLICY", "product"),
            ("MIN_PRICE_INTERVAL_SECS", "5"),
        ]))
        .unwrap();
        assert!(!cfg.translation_enabled);
        assert!(cfg.openai_api_key.is_none());
        assert!(cfg.force_crawling);
        assert_eq!(cfg.duplicate_policy, DuplicatePolicy::PerProduct);
        assert_eq!(cfg.min_price_interval_secs, 5);
    }

    #[test]
    fn review_template_must_reference_product_id() {
        let err = Config::from_lookup(lookup(&[
            ("MONGO_URL", "mongodb://x"),
            ("TRANSLATION_ENABLED", "0"),
            ("REVIEW_URL_TEMPLATE", "https://example.com/reviews"),
        ]))
        .unwrap_err();
        assert!(matches!(err, CrawlerError::Configuration(_)));
    }
}
