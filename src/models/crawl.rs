use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;

/// Scope of the duplicate-review stop signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum DuplicatePolicy {
    /// The first duplicate halts pagination for the rest of the run.
    #[default]
    RunWide,
    /// A duplicate only halts pagination of the product it was found on.
    PerProduct,
}

impl FromStr for DuplicatePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "run" | "run_wide" | "run-wide" => Ok(Self::RunWide),
            "product" | "per_product" | "per-product" => Ok(Self::PerProduct),
            other => Err(format!("unknown duplicate policy: {other}")),
        }
    }
}

/// Flag raised by the persistence merger when it meets an already-stored review.
#[derive(Debug, Clone, Default)]
pub struct DuplicateSignal(Arc<AtomicBool>);

impl DuplicateSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Per-run state of the review crawl.
#[derive(Debug, Clone)]
pub struct CrawlState {
    pub reviews_scraped: usize,
    pub max_reviews_to_scrape: usize,
    pub latest_checkpoint_time: Option<i64>,
    pub duplicates_found: DuplicateSignal,
    pub force_crawling: bool,
    pub retry_budget: u32,
}

impl CrawlState {
    pub fn new(
        max_reviews_to_scrape: usize,
        force_crawling: bool,
        retry_budget: u32,
        duplicates_found: DuplicateSignal,
    ) -> Self {
        Self {
            reviews_scraped: 0,
            max_reviews_to_scrape,
            latest_checkpoint_time: None,
            duplicates_found,
            force_crawling,
            retry_budget,
        }
    }

    pub fn remaining_quota(&self) -> usize {
        self.max_reviews_to_scrape.saturating_sub(self.reviews_scraped)
    }

    pub fn ceiling_reached(&self) -> bool {
        self.reviews_scraped >= self.max_reviews_to_scrape
    }

    /// The ceiling always applies; duplicates only stop a non-forced crawl.
    pub fn should_stop(&self) -> bool {
        self.ceiling_reached() || (!self.force_crawling && self.duplicates_found.is_raised())
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        if self.ceiling_reached() {
            Some(StopReason::CeilingReached)
        } else if !self.force_crawling && self.duplicates_found.is_raised() {
            Some(StopReason::DuplicateFound)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum StopReason {
    #[default]
    Exhausted,
    CheckpointFresh,
    CeilingReached,
    DuplicateFound,
    Shutdown,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CrawlSummary {
    pub products_visited: usize,
    pub products_skipped: usize,
    pub products_abandoned: usize,
    pub pages_fetched: usize,
    pub reviews_extracted: usize,
    pub reviews_inserted: usize,
    pub duplicates: usize,
    pub reviews_translated: usize,
    pub stop_reason: StopReason,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ListingSummary {
    pub pages_fetched: usize,
    pub pages_abandoned: usize,
    pub products_created: usize,
    pub products_updated: usize,
    pub prices_appended: usize,
    pub items_skipped: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BackfillSummary {
    pub examined: usize,
    pub translated: usize,
    pub failed: usize,
}
