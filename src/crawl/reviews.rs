use std::sync::Arc;

use tracing::Instrument;

use crate::clients::CrawlTransport;
use crate::handlers::{extract_review, ReviewPage};
use crate::models::*;
use crate::persistence::{MergeOutcome, PersistenceMerger};
use crate::shutdown::Shutdown;
use crate::storage::ReviewTarget;
use crate::translation::TranslationDispatcher;

use super::{extract_product_id, fetch_page, with_pagination, CrawlSettings};

/// Pages through every stored product's review endpoint, translating and
/// persisting new reviews until the endpoints run out or a stop condition holds.
pub struct ReviewCrawler {
    transport: Arc<dyn CrawlTransport>,
    merger: PersistenceMerger,
    dispatcher: Option<TranslationDispatcher>,
    settings: CrawlSettings,
    shutdown: Shutdown,
}

impl ReviewCrawler {
    pub fn new(
        transport: Arc<dyn CrawlTransport>,
        merger: PersistenceMerger,
        dispatcher: Option<TranslationDispatcher>,
        settings: CrawlSettings,
        shutdown: Shutdown,
    ) -> Self {
        Self { transport, merger, dispatcher, settings, shutdown }
    }

    pub async fn run(&self) -> Result<CrawlSummary> {
        let span = tracing::info_span!("review_crawl", run_id = %uuid::Uuid::new_v4());
        self.crawl().instrument(span).await
    }

    async fn crawl(&self) -> Result<CrawlSummary> {
        let storage = self.merger.storage();
        let signal = self.merger.duplicate_signal();
        signal.reset();

        let mut summary = CrawlSummary::default();
        let mut state = CrawlState::new(
            self.settings.max_reviews_to_scrape,
            self.settings.force_crawling,
            self.settings.max_retries,
            signal.clone(),
        );
        state.latest_checkpoint_time = storage.latest_scraped_time().await?;

        if let Some(latest) = state.latest_checkpoint_time {
            let age = now_epoch() - latest;
            if !state.force_crawling && age < self.settings.checkpoint_freshness_secs {
                tracing::info!(latest_scraped_time = latest, age_secs = age, "Latest reviews are still fresh; skipping run");
                summary.stop_reason = StopReason::CheckpointFresh;
                return Ok(summary);
            }
        }

        let targets = storage.review_targets().await?;
        tracing::info!(
            products = targets.len(),
            max_reviews = state.max_reviews_to_scrape,
            force = state.force_crawling,
            policy = ?self.settings.duplicate_policy,
            "Starting review crawl"
        );

        for target in &targets {
            if self.shutdown.is_triggered() {
                break;
            }
            if self.settings.duplicate_policy == DuplicatePolicy::PerProduct {
                signal.reset();
            }
            if state.should_stop() {
                break;
            }
            let Some(product_id) = extract_product_id(&target.url) else {
                tracing::error!(url = %target.url, "Product id not found in review URL; skipping");
                summary.products_skipped += 1;
                continue;
            };
            if !state.force_crawling && self.already_complete(target, &product_id).await? {
                summary.products_skipped += 1;
                continue;
            }
            summary.products_visited += 1;
            self.crawl_product(target, &product_id, &mut state, &mut summary).await?;
        }

        summary.stop_reason = if self.shutdown.is_triggered() {
            StopReason::Shutdown
        } else {
            match state.stop_reason() {
                Some(StopReason::DuplicateFound) if self.settings.duplicate_policy == DuplicatePolicy::PerProduct => {
                    StopReason::Exhausted
                }
                Some(reason) => reason,
                None => StopReason::Exhausted,
            }
        };
        tracing::info!(
            visited = summary.products_visited,
            skipped = summary.products_skipped,
            abandoned = summary.products_abandoned,
            extracted = summary.reviews_extracted,
            inserted = summary.reviews_inserted,
            duplicates = summary.duplicates,
            translated = summary.reviews_translated,
            stop_reason = ?summary.stop_reason,
            "Review crawl finished"
        );
        Ok(summary)
    }

    /// Stored reviews already cover the product's advertised review count.
    async fn already_complete(&self, target: &ReviewTarget, product_id: &str) -> Result<bool> {
        let Some(expected) = target.review_count else { return Ok(false) };
        let stored = self.merger.storage().count_reviews(product_id).await?;
        if stored as i64 >= expected {
            tracing::debug!(product_id = %product_id, stored = stored, expected = expected, "Reviews already complete; skipping product");
            return Ok(true);
        }
        Ok(false)
    }

    async fn crawl_product(
        &self,
        target: &ReviewTarget,
        product_id: &str,
        state: &mut CrawlState,
        summary: &mut CrawlSummary,
    ) -> Result<()> {
        let page_size = self.settings.review_page_size;
        let mut offset: u64 = 0;

        loop {
            if self.shutdown.is_triggered() || state.should_stop() {
                return Ok(());
            }
            let url = with_pagination(&target.url, offset, page_size)?;
            let body = match fetch_page(self.transport.as_ref(), &url, state.retry_budget, self.settings.retry_backoff).await {
                Ok(body) => body,
                Err(e) => {
                    tracing::error!(product_id = %product_id, offset = offset, error = %e, "Abandoning product");
                    summary.products_abandoned += 1;
                    return Ok(());
                }
            };
            summary.pages_fetched += 1;

            let page = ReviewPage::parse(&body);
            let scraped_time = now_epoch();
            let mut fresh = Vec::new();
            for raw in &page.records {
                if state.should_stop() {
                    break;
                }
                let Some(review) = extract_review(raw, product_id, scraped_time) else {
                    tracing::warn!(product_id = %product_id, "Review record without reviewId; skipping");
                    continue;
                };
                state.reviews_scraped += 1;
                summary.reviews_extracted += 1;
                if self.merger.review_exists(&review.review_id).await? {
                    summary.duplicates += 1;
                    continue;
                }
                fresh.push(review);
            }
            self.persist(fresh, summary).await?;

            let next = offset + page_size;
            match page.pagination.total {
                Some(total) if next < total && !page.records.is_empty() => offset = next,
                _ => return Ok(()),
            }
        }
    }

    async fn persist(&self, mut fresh: Vec<Review>, summary: &mut CrawlSummary) -> Result<()> {
        if fresh.is_empty() {
            return Ok(());
        }
        if let Some(dispatcher) = &self.dispatcher {
            let pending: Vec<usize> = (0..fresh.len())
                .filter(|&i| self.merger.needs_translation(&fresh[i]))
                .collect();
            let texts = pending.iter().map(|&i| fresh[i].combined_text()).collect();
            let results = dispatcher.translate_many(texts).await;
            for (i, result) in pending.into_iter().zip(results) {
                if fresh[i].apply_translation(result.as_deref()) {
                    summary.reviews_translated += 1;
                } else {
                    tracing::warn!(review_id = %fresh[i].review_id, "Storing review without translation");
                }
            }
        }
        for review in fresh {
            match self.merger.merge(CrawledEntity::Review(review)).await? {
                MergeOutcome::ReviewInserted => summary.reviews_inserted += 1,
                MergeOutcome::DuplicateReview => summary.duplicates += 1,
                MergeOutcome::ProductCreated | MergeOutcome::ProductUpdated { .. } => {}
            }
        }
        Ok(())
    }
}
