use std::sync::Arc;

use async_trait::async_trait;
use bson::{doc, Bson, Document};
use mongodb::Database;

use crate::models::*;

pub mod memory;
pub mod mongo;

pub use memory::MemoryCollection;
pub use mongo::{connect, MongoCollection};

pub const PRODUCTS_COLLECTION: &str = "products";
pub const REVIEWS_COLLECTION: &str = "reviews";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    DuplicateKey,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpdateOutcome {
    pub matched: u64,
    pub modified: u64,
    pub upserted: bool,
}

/// A keyed JSON-document collection. Every write is atomic per document.
#[async_trait]
pub trait DocumentCollection: Send + Sync {
    /// Collection name, used in log fields.
    fn name(&self) -> &str;

    async fn find_one(&self, filter: Document, sort: Option<Document>) -> Result<Option<Document>>;

    async fn find(&self, filter: Document, limit: Option<i64>) -> Result<Vec<Document>>;

    /// Insert a document; a unique-index violation is reported as
    /// [`InsertOutcome::DuplicateKey`] rather than an error.
    async fn insert_one(&self, document: Document) -> Result<InsertOutcome>;

    async fn update_one(&self, filter: Document, update: Document, upsert: bool) -> Result<UpdateOutcome>;

    async fn create_unique_index(&self, field: &str) -> Result<()>;

    async fn count_documents(&self, filter: Document) -> Result<u64>;

    async fn drop_collection(&self) -> Result<()>;
}

/// A product endpoint to page through, as stored by the listing crawl.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewTarget {
    pub url: String,
    pub review_count: Option<i64>,
}

#[derive(Clone)]
pub struct Storage {
    products: Arc<dyn DocumentCollection>,
    reviews: Arc<dyn DocumentCollection>,
}

impl Storage {
    pub fn new(products: Arc<dyn DocumentCollection>, reviews: Arc<dyn DocumentCollection>) -> Self {
        Self { products, reviews }
    }

    pub fn with_db(db: &Database) -> Self {
        Self::new(
            Arc::new(MongoCollection::new(db, PRODUCTS_COLLECTION)),
            Arc::new(MongoCollection::new(db, REVIEWS_COLLECTION)),
        )
    }

    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryCollection::with_unique_index(PRODUCTS_COLLECTION, "product_id")),
            Arc::new(MemoryCollection::with_unique_index(REVIEWS_COLLECTION, "review_id")),
        )
    }

    pub fn products(&self) -> &Arc<dyn DocumentCollection> {
        &self.products
    }

    pub fn reviews(&self) -> &Arc<dyn DocumentCollection> {
        &self.reviews
    }

    pub async fn ensure_indexes(&self) -> Result<()> {
        self.products.create_unique_index("product_id").await?;
        self.reviews.create_unique_index("review_id").await?;
        tracing::info!(
            products = self.products.name(),
            reviews = self.reviews.name(),
            "Unique indexes ensured on product_id and review_id"
        );
        Ok(())
    }

    pub async fn drop_reviews(&self) -> Result<()> {
        self.reviews.drop_collection().await?;
        // Dropping a collection drops its indexes too
        self.reviews.create_unique_index("review_id").await?;
        tracing::warn!(collection = self.reviews.name(), "Dropped the reviews collection");
        Ok(())
    }

    // Product operations
    pub async fn find_product(&self, product_id: &str) -> Result<Option<ProductDocument>> {
        let found = self.products.find_one(doc! { "product_id": product_id }, None).await?;
        found
            .map(bson::from_document::<ProductDocument>)
            .transpose()
            .map_err(CrawlerError::from)
    }

    pub async fn insert_product(&self, product: &ProductDocument) -> Result<InsertOutcome> {
        self.products.insert_one(bson::to_document(product)?).await
    }

    /// Overwrite descriptive fields and optionally push one price entry, in a single update.
    pub async fn update_product(&self, product_id: &str, fields: Document, price: Option<&PricePoint>) -> Result<()> {
        let mut update = doc! { "$set": fields };
        if let Some(p) = price {
            update.insert("$push", doc! { "prices": { "date": p.date, "price": p.price } });
        }
        let outcome = self.products.update_one(doc! { "product_id": product_id }, update, false).await?;
        if outcome.matched == 0 {
            return Err(CrawlerError::Store(format!("product {product_id} vanished during update")));
        }
        Ok(())
    }

    pub async fn review_targets(&self) -> Result<Vec<ReviewTarget>> {
        let docs = self.products.find(doc! {}, None).await?;
        Ok(docs
            .iter()
            .filter_map(|d| {
                let url = d.get_str("url").ok()?.to_string();
                Some(ReviewTarget { url, review_count: d.get("review_count").and_then(bson_i64) })
            })
            .collect())
    }

    // Review operations
    pub async fn insert_review(&self, review: &Review) -> Result<InsertOutcome> {
        self.reviews.insert_one(bson::to_document(review)?).await
    }

    pub async fn review_exists(&self, review_id: &str) -> Result<bool> {
        Ok(self.reviews.find_one(doc! { "review_id": review_id }, None).await?.is_some())
    }

    pub async fn count_reviews(&self, product_id: &str) -> Result<u64> {
        self.reviews.count_documents(doc! { "product_id": product_id }).await
    }

    /// Most recent `scraped_time` across stored reviews.
    pub async fn latest_scraped_time(&self) -> Result<Option<i64>> {
        let latest = self.reviews.find_one(doc! {}, Some(doc! { "scraped_time": -1 })).await?;
        Ok(latest.and_then(|d| d.get("scraped_time").and_then(bson_i64)))
    }

    /// Untranslated reviews that have failed fewer than `max_failures` backfill
    /// attempts. Reviews stored before the counter existed count as zero.
    pub async fn untranslated_reviews(&self, limit: i64, max_failures: i32) -> Result<Vec<Review>> {
        let filter = doc! {
            "translated": false,
            "translation_attempts": { "$not": { "$gte": max_failures } },
        };
        let docs = self.reviews.find(filter, Some(limit)).await?;
        docs.into_iter()
            .map(|d| bson::from_document::<Review>(d).map_err(CrawlerError::from))
            .collect()
    }

    /// Set translated fields on a review that has none yet. Returns whether a review was updated.
    pub async fn set_translation(&self, review_id: &str, title: &str, comment: &str) -> Result<bool> {
        let outcome = self
            .reviews
            .update_one(
                doc! { "review_id": review_id, "translated": false },
                doc! { "$set": { "translated_title": title, "translated_comment": comment, "translated": true } },
                false,
            )
            .await?;
        Ok(outcome.modified > 0)
    }

    pub async fn record_translation_failure(&self, review_id: &str) -> Result<()> {
        self.reviews
            .update_one(
                doc! { "review_id": review_id, "translated": false },
                doc! { "$inc": { "translation_attempts": 1 } },
                false,
            )
            .await?;
        Ok(())
    }
}

pub(crate) fn bson_i64(value: &Bson) -> Option<i64> {
    match value {
        Bson::Int32(v) => Some(i64::from(*v)),
        Bson::Int64(v) => Some(*v),
        Bson::Double(v) => Some(*v as i64),
        _ => None,
    }
}
