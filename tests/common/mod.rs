#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use url::Url;

use review_crawler::clients::{
    CrawlTransport, FetchResponse, JobHandle, JobStatus, TranslationError, TranslationService,
};
use review_crawler::crawl::{extract_product_id, CrawlSettings};
use review_crawler::models::{DuplicatePolicy, Result};
use review_crawler::shutdown::Shutdown;

pub const LISTING_URL: &str = "http://catalog.test/api/products?offset=0&limit=2";
pub const REVIEW_TEMPLATE: &str = "http://catalog.test/api/products/{product_id}/reviews?offset=0&limit=5";

pub fn review_id(product_id: &str, index: usize) -> String {
    format!("{product_id}-r{index}")
}

pub fn settings() -> CrawlSettings {
    CrawlSettings {
        listing_url: LISTING_URL.to_string(),
        review_url_template: REVIEW_TEMPLATE.to_string(),
        listing_page_size: 2,
        review_page_size: 5,
        max_reviews_to_scrape: 100,
        max_retries: 3,
        retry_backoff: Duration::ZERO,
        force_crawling: false,
        duplicate_policy: DuplicatePolicy::RunWide,
        checkpoint_freshness_secs: 0,
    }
}

/// Synthetic catalog: every product has `reviews_per_product` reviews, served
/// by offset/limit like the real API.
pub struct CatalogTransport {
    products: Vec<String>,
    reviews_per_product: usize,
    price: Mutex<f64>,
    malformed: Mutex<HashMap<String, usize>>,
    requests: Mutex<Vec<String>>,
    stop_after_review_pages: Mutex<Option<(usize, Shutdown)>>,
}

impl CatalogTransport {
    pub fn new(product_count: usize, reviews_per_product: usize) -> Self {
        Self {
            products: (0..product_count).map(|i| format!("P{i}")).collect(),
            reviews_per_product,
            price: Mutex::new(1990.0),
            malformed: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
            stop_after_review_pages: Mutex::new(None),
        }
    }

    /// Trigger `shutdown` once `pages` review pages have been served.
    pub fn shutdown_after_review_pages(&self, pages: usize, shutdown: Shutdown) {
        *self.stop_after_review_pages.lock().unwrap() = Some((pages, shutdown));
    }

    /// The next `times` review responses for `product_id` are not valid JSON.
    pub fn corrupt_reviews(&self, product_id: &str, times: usize) {
        self.malformed.lock().unwrap().insert(product_id.to_string(), times);
    }

    pub fn set_price(&self, price: f64) {
        *self.price.lock().unwrap() = price;
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn review_requests_for(&self, product_id: &str) -> Vec<String> {
        let needle = format!("/products/{product_id}/reviews");
        self.requests().into_iter().filter(|u| u.contains(&needle)).collect()
    }

    fn listing_body(&self, offset: usize, limit: usize) -> String {
        let price = *self.price.lock().unwrap();
        let items: Vec<_> = self
            .products
            .iter()
            .skip(offset)
            .take(limit)
            .map(|id| {
                json!({
                    "productId": id,
                    "name": format!("item {id}"),
                    "colors": [{ "code": "00", "name": "WHITE" }],
                    "rating": { "average": 4.2, "count": self.reviews_per_product },
                    "prices": { "base": { "value": price }, "promo": null },
                    "images": { "main": { "00": { "image": format!("https://img.test/{id}.jpg") } } }
                })
            })
            .collect();
        json!({
            "status": "ok",
            "result": { "items": items, "pagination": { "total": self.products.len(), "offset": offset, "count": limit } }
        })
        .to_string()
    }

    fn review_body(&self, product_id: &str, offset: usize, limit: usize) -> String {
        let reviews: Vec<_> = (offset..self.reviews_per_product.min(offset + limit))
            .map(|i| {
                json!({
                    "reviewId": review_id(product_id, i),
                    "title": format!("title {i}"),
                    "comment": format!("comment {i}"),
                    "rate": 4,
                    "gender": { "name": "female" },
                    "createDate": "2024-05-01T00:00:00Z"
                })
            })
            .collect();
        json!({
            "status": "ok",
            "result": { "reviews": reviews, "pagination": { "total": self.reviews_per_product, "offset": offset, "count": limit } }
        })
        .to_string()
    }
}

#[async_trait]
impl CrawlTransport for CatalogTransport {
    async fn fetch(&self, url: &str) -> Result<FetchResponse> {
        self.requests.lock().unwrap().push(url.to_string());
        let parsed = Url::parse(url)?;
        let query: HashMap<String, String> = parsed.query_pairs().into_owned().collect();
        let offset = query.get("offset").and_then(|v| v.parse().ok()).unwrap_or(0);
        let limit = query.get("limit").and_then(|v| v.parse().ok()).unwrap_or(5);

        if parsed.path().ends_with("/reviews") {
            let product_id = extract_product_id(url).unwrap_or_default();
            {
                let mut malformed = self.malformed.lock().unwrap();
                if let Some(remaining) = malformed.get_mut(&product_id) {
                    if *remaining > 0 {
                        *remaining -= 1;
                        return Ok(FetchResponse { status: 200, body: "{\"result\": [truncated".to_string() });
                    }
                }
            }
            if !self.products.contains(&product_id) {
                return Ok(FetchResponse { status: 404, body: "{}".to_string() });
            }
            let body = self.review_body(&product_id, offset, limit);
            if let Some((remaining, shutdown)) = self.stop_after_review_pages.lock().unwrap().as_mut() {
                *remaining = remaining.saturating_sub(1);
                if *remaining == 0 {
                    shutdown.trigger();
                }
            }
            return Ok(FetchResponse { status: 200, body });
        }
        Ok(FetchResponse { status: 200, body: self.listing_body(offset, limit) })
    }
}

#[derive(Debug, Clone)]
pub enum Step {
    RateLimited,
    Fail,
    Reply(String),
}

/// Scripted translation backend. Unscripted texts translate to `en:{text}`.
pub struct FakeTranslator {
    scripts: Mutex<HashMap<String, VecDeque<Step>>>,
    delays: Mutex<HashMap<String, Duration>>,
    pending_polls: usize,
    jobs: Mutex<HashMap<String, (String, usize)>>,
    next_job: AtomicUsize,
    submissions: Mutex<Vec<String>>,
    shutdown_on: Mutex<HashMap<String, Shutdown>>,
}

impl FakeTranslator {
    pub fn new() -> Self {
        Self::with_pending_polls(1)
    }

    /// Every job reports in-progress `pending_polls` times before completing.
    pub fn with_pending_polls(pending_polls: usize) -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            delays: Mutex::new(HashMap::new()),
            pending_polls,
            jobs: Mutex::new(HashMap::new()),
            next_job: AtomicUsize::new(0),
            submissions: Mutex::new(Vec::new()),
            shutdown_on: Mutex::new(HashMap::new()),
        }
    }

    /// Trigger `shutdown` while `text` is being submitted.
    pub fn shutdown_on(&self, text: &str, shutdown: Shutdown) {
        self.shutdown_on.lock().unwrap().insert(text.to_string(), shutdown);
    }

    pub fn script(&self, text: &str, steps: Vec<Step>) {
        self.scripts.lock().unwrap().insert(text.to_string(), steps.into());
    }

    pub fn delay(&self, text: &str, delay: Duration) {
        self.delays.lock().unwrap().insert(text.to_string(), delay);
    }

    pub fn submissions(&self) -> Vec<String> {
        self.submissions.lock().unwrap().clone()
    }

    pub fn submissions_of(&self, text: &str) -> usize {
        self.submissions().iter().filter(|s| s.as_str() == text).count()
    }
}

#[async_trait]
impl TranslationService for FakeTranslator {
    async fn submit(&self, text: &str) -> std::result::Result<JobHandle, TranslationError> {
        self.submissions.lock().unwrap().push(text.to_string());
        if let Some(shutdown) = self.shutdown_on.lock().unwrap().get(text) {
            shutdown.trigger();
        }
        let delay = self.delays.lock().unwrap().get(text).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let step = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(text)
            .and_then(|steps| steps.pop_front())
            .unwrap_or_else(|| Step::Reply(format!("en:{text}")));
        let reply = match step {
            Step::RateLimited => return Err(TranslationError::RateLimited),
            Step::Fail => return Err(TranslationError::Service("scripted failure".to_string())),
            Step::Reply(reply) => reply,
        };
        let id = self.next_job.fetch_add(1, Ordering::SeqCst);
        let handle = JobHandle { thread_id: format!("thread_{id}"), run_id: format!("run_{id}") };
        self.jobs.lock().unwrap().insert(handle.run_id.clone(), (reply, self.pending_polls));
        Ok(handle)
    }

    async fn poll(&self, job: &JobHandle) -> std::result::Result<JobStatus, TranslationError> {
        let mut jobs = self.jobs.lock().unwrap();
        let (_, remaining) = jobs
            .get_mut(&job.run_id)
            .ok_or_else(|| TranslationError::Service("unknown run".to_string()))?;
        if *remaining > 0 {
            *remaining -= 1;
            return Ok(JobStatus::InProgress);
        }
        Ok(JobStatus::Completed)
    }

    async fn fetch_result(&self, job: &JobHandle) -> std::result::Result<String, TranslationError> {
        self.jobs
            .lock()
            .unwrap()
            .get(&job.run_id)
            .map(|(reply, _)| reply.clone())
            .ok_or_else(|| TranslationError::Service("unknown run".to_string()))
    }
}

pub fn shared(translator: &Arc<FakeTranslator>) -> Arc<dyn TranslationService> {
    translator.clone()
}
