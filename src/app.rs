use std::sync::Arc;

use crate::clients::{CrawlTransport, HttpTransport};
use crate::config::Config;
use crate::crawl::{CrawlSettings, ProductCrawler, ReviewCrawler};
use crate::models::*;
use crate::persistence::PersistenceMerger;
use crate::shutdown::Shutdown;
use crate::storage::{connect, Storage};
use crate::translation::TranslationDispatcher;

/// Wired-up pipeline: store, transport, merger and the optional translator.
pub struct App {
    pub merger: PersistenceMerger,
    pub transport: Arc<dyn CrawlTransport>,
    pub dispatcher: Option<TranslationDispatcher>,
    pub settings: CrawlSettings,
    pub shutdown: Shutdown,
}

impl App {
    /// Connect to MongoDB, prepare collections and build every component.
    /// Any failure here is fatal to the process.
    pub async fn bootstrap(cfg: &Config, shutdown: Shutdown) -> Result<Self> {
        let db = connect(cfg).await?;
        let storage = Storage::with_db(&db);
        storage.ensure_indexes().await?;
        if cfg.force_drop_collection {
            storage.drop_reviews().await?;
        }

        let transport: Arc<dyn CrawlTransport> = Arc::new(HttpTransport::from_config(cfg)?);
        let dispatcher = if cfg.translation_enabled {
            Some(TranslationDispatcher::from_config(cfg, shutdown.clone())?)
        } else {
            tracing::warn!("Translation disabled; reviews are stored untranslated");
            None
        };
        Ok(Self::from_parts(storage, transport, dispatcher, cfg, shutdown))
    }

    pub fn from_parts(
        storage: Storage,
        transport: Arc<dyn CrawlTransport>,
        dispatcher: Option<TranslationDispatcher>,
        cfg: &Config,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            merger: PersistenceMerger::new(storage, cfg.min_price_interval_secs)
                .with_max_translation_failures(cfg.translation_max_failures),
            transport,
            dispatcher,
            settings: CrawlSettings::from_config(cfg),
            shutdown,
        }
    }

    pub fn product_crawler(&self) -> ProductCrawler {
        ProductCrawler::new(self.transport.clone(), self.merger.clone(), self.settings.clone(), self.shutdown.clone())
    }

    pub fn review_crawler(&self) -> ReviewCrawler {
        ReviewCrawler::new(
            self.transport.clone(),
            self.merger.clone(),
            self.dispatcher.clone(),
            self.settings.clone(),
            self.shutdown.clone(),
        )
    }

    pub async fn backfill(&self, limit: i64) -> Result<BackfillSummary> {
        let dispatcher = self.dispatcher.as_ref().ok_or_else(|| {
            CrawlerError::Configuration("translation backfill requires TRANSLATION_ENABLED".to_string())
        })?;
        self.merger.backfill_translations(dispatcher, limit).await
    }
}
