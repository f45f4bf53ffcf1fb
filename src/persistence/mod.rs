use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::models::*;
use crate::storage::{InsertOutcome, Storage};
use crate::translation::TranslationDispatcher;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    ProductCreated,
    ProductUpdated { price_appended: bool },
    ReviewInserted,
    DuplicateReview,
}

/// Turns crawled entities into store mutations and raises the duplicate
/// signal the crawler stops on.
#[derive(Clone)]
pub struct PersistenceMerger {
    storage: Storage,
    min_price_interval: i64,
    duplicates: DuplicateSignal,
    max_translation_failures: i32,
    product_locks: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
}

pub const DEFAULT_MAX_TRANSLATION_FAILURES: i32 = 3;

impl PersistenceMerger {
    pub fn new(storage: Storage, min_price_interval: i64) -> Self {
        Self {
            storage,
            min_price_interval,
            duplicates: DuplicateSignal::new(),
            max_translation_failures: DEFAULT_MAX_TRANSLATION_FAILURES,
            product_locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Backfill stops selecting a review after this many failed attempts.
    pub fn with_max_translation_failures(mut self, max: i32) -> Self {
        self.max_translation_failures = max.max(1);
        self
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn duplicate_signal(&self) -> DuplicateSignal {
        self.duplicates.clone()
    }

    pub async fn merge(&self, entity: CrawledEntity) -> Result<MergeOutcome> {
        match entity {
            CrawledEntity::Product(product) => self.upsert_product(&product).await,
            CrawledEntity::Review(review) => self.insert_review(&review).await,
        }
    }

    pub async fn upsert_product(&self, product: &Product) -> Result<MergeOutcome> {
        self.upsert_product_at(product, now_epoch()).await
    }

    /// Create the product on first sighting, otherwise refresh its descriptive
    /// fields and extend the price history when the append rule allows it.
    pub async fn upsert_product_at(&self, product: &Product, now: i64) -> Result<MergeOutcome> {
        let lock = self.product_lock(&product.product_id);
        let outcome = {
            let _held = lock.lock().await;
            self.upsert_locked(product, now).await
        };
        self.release_product_lock(&product.product_id, lock);
        outcome
    }

    async fn upsert_locked(&self, product: &Product, now: i64) -> Result<MergeOutcome> {
        let existing = match self.storage.find_product(&product.product_id).await? {
            Some(existing) => existing,
            None => {
                let document = ProductDocument::first_sighting(product, now);
                match self.storage.insert_product(&document).await? {
                    InsertOutcome::Inserted => {
                        tracing::info!(product_id = %product.product_id, price = ?product.price, "Product created");
                        return Ok(MergeOutcome::ProductCreated);
                    }
                    // Written by another process between our read and insert
                    InsertOutcome::DuplicateKey => self
                        .storage
                        .find_product(&product.product_id)
                        .await?
                        .ok_or_else(|| CrawlerError::Store(format!("product {} missing after duplicate key", product.product_id)))?,
                }
            }
        };

        let point = next_price_point(&existing.prices, product.price, now, self.min_price_interval);
        self.storage
            .update_product(&product.product_id, product.descriptive_fields(), point.as_ref())
            .await?;
        match &point {
            Some(p) => tracing::info!(
                product_id = %product.product_id,
                previous = ?existing.last_price().map(|l| l.price),
                price = p.price,
                "Price change recorded"
            ),
            None => tracing::debug!(product_id = %product.product_id, "Product refreshed"),
        }
        Ok(MergeOutcome::ProductUpdated { price_appended: point.is_some() })
    }

    fn product_lock(&self, product_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.product_locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        locks.entry(product_id.to_string()).or_default().clone()
    }

    // Drop the map entry once no other upsert holds or waits on it
    fn release_product_lock(&self, product_id: &str, lock: Arc<tokio::sync::Mutex<()>>) {
        let mut locks = self.product_locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let current = locks.get(product_id).is_some_and(|held| Arc::ptr_eq(held, &lock));
        if current && Arc::strong_count(&lock) == 2 {
            locks.remove(product_id);
        }
    }

    /// Insert a review once. A second insert of the same id leaves the stored
    /// document alone and raises the duplicate signal.
    pub async fn insert_review(&self, review: &Review) -> Result<MergeOutcome> {
        match self.storage.insert_review(review).await? {
            InsertOutcome::Inserted => {
                tracing::debug!(review_id = %review.review_id, product_id = %review.product_id, "Review stored");
                Ok(MergeOutcome::ReviewInserted)
            }
            InsertOutcome::DuplicateKey => {
                tracing::info!(review_id = %review.review_id, product_id = %review.product_id, "Duplicate review; raising stop signal");
                self.duplicates.raise();
                Ok(MergeOutcome::DuplicateReview)
            }
        }
    }

    /// Whether the review is already stored. A hit raises the duplicate signal.
    pub async fn review_exists(&self, review_id: &str) -> Result<bool> {
        let exists = self.storage.review_exists(review_id).await?;
        if exists {
            tracing::info!(review_id = %review_id, "Review already stored; raising stop signal");
            self.duplicates.raise();
        }
        Ok(exists)
    }

    pub fn needs_translation(&self, review: &Review) -> bool {
        !review.translated
    }

    /// Translate up to `limit` stored reviews that are still untranslated.
    /// Each failure is counted on the review so a later run moves past
    /// reviews that keep failing.
    pub async fn backfill_translations(&self, dispatcher: &TranslationDispatcher, limit: i64) -> Result<BackfillSummary> {
        let pending = self.storage.untranslated_reviews(limit, self.max_translation_failures).await?;
        let mut summary = BackfillSummary { examined: pending.len(), ..Default::default() };
        if pending.is_empty() {
            tracing::info!("No untranslated reviews to backfill");
            return Ok(summary);
        }

        let texts = pending.iter().map(Review::combined_text).collect();
        let results = dispatcher.translate_many(texts).await;
        for (mut review, translated) in pending.into_iter().zip(results) {
            let applied = review.apply_translation(translated.as_deref());
            let (true, Some(title), Some(comment)) =
                (applied, review.translated_title.as_deref(), review.translated_comment.as_deref())
            else {
                summary.failed += 1;
                // Items skipped for shutdown were never attempted
                if !(translated.is_none() && dispatcher.is_shutting_down()) {
                    self.storage.record_translation_failure(&review.review_id).await?;
                    tracing::warn!(
                        review_id = %review.review_id,
                        attempts = review.translation_attempts + 1,
                        "Backfill translation failed"
                    );
                }
                continue;
            };
            if self.storage.set_translation(&review.review_id, title, comment).await? {
                summary.translated += 1;
            }
        }
        tracing::info!(
            examined = summary.examined,
            translated = summary.translated,
            failed = summary.failed,
            "Translation backfill finished"
        );
        Ok(summary)
    }
}
