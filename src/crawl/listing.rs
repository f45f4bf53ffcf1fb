use std::sync::Arc;

use tracing::Instrument;

use crate::clients::CrawlTransport;
use crate::handlers::ListingPage;
use crate::models::*;
use crate::persistence::{MergeOutcome, PersistenceMerger};
use crate::shutdown::Shutdown;

use super::{fetch_page, with_pagination, CrawlSettings};

/// Walks the catalog listing by offset and merges every product it sees.
pub struct ProductCrawler {
    transport: Arc<dyn CrawlTransport>,
    merger: PersistenceMerger,
    settings: CrawlSettings,
    shutdown: Shutdown,
}

impl ProductCrawler {
    pub fn new(
        transport: Arc<dyn CrawlTransport>,
        merger: PersistenceMerger,
        settings: CrawlSettings,
        shutdown: Shutdown,
    ) -> Self {
        Self { transport, merger, settings, shutdown }
    }

    pub async fn run(&self) -> Result<ListingSummary> {
        let span = tracing::info_span!("listing_crawl", run_id = %uuid::Uuid::new_v4());
        self.crawl().instrument(span).await
    }

    async fn crawl(&self) -> Result<ListingSummary> {
        let page_size = self.settings.listing_page_size;
        let mut summary = ListingSummary::default();
        let mut offset: u64 = 0;
        let mut total: Option<u64> = None;

        loop {
            if self.shutdown.is_triggered() {
                tracing::warn!(offset = offset, "Shutdown requested; stopping listing crawl");
                break;
            }
            let url = with_pagination(&self.settings.listing_url, offset, page_size)?;
            match fetch_page(self.transport.as_ref(), &url, self.settings.max_retries, self.settings.retry_backoff).await {
                Ok(body) => {
                    summary.pages_fetched += 1;
                    let page = ListingPage::parse(&body, &self.settings.review_url_template);
                    summary.items_skipped += page.skipped;
                    if page.pagination.total.is_some() {
                        total = page.pagination.total;
                    }
                    if page.products.is_empty() {
                        break;
                    }
                    for product in page.products {
                        match self.merger.merge(CrawledEntity::Product(product)).await? {
                            MergeOutcome::ProductCreated => summary.products_created += 1,
                            MergeOutcome::ProductUpdated { price_appended } => {
                                summary.products_updated += 1;
                                if price_appended {
                                    summary.prices_appended += 1;
                                }
                            }
                            MergeOutcome::ReviewInserted | MergeOutcome::DuplicateReview => {}
                        }
                    }
                }
                Err(e) => {
                    tracing::error!(offset = offset, error = %e, "Abandoning listing page");
                    summary.pages_abandoned += 1;
                }
            }

            let next = offset + page_size;
            match total {
                Some(total) if next < total => offset = next,
                _ => break,
            }
        }

        tracing::info!(
            pages = summary.pages_fetched,
            abandoned = summary.pages_abandoned,
            created = summary.products_created,
            updated = summary.products_updated,
            prices_appended = summary.prices_appended,
            "Listing crawl finished"
        );
        Ok(summary)
    }
}
