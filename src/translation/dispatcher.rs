use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tokio::time::MissedTickBehavior;

use crate::clients::{AssistantClient, JobHandle, JobStatus, TranslationError, TranslationService};
use crate::config::Config;
use crate::models::Result;
use crate::shutdown::Shutdown;

use super::rate_limiter::RateLimiter;

#[derive(Debug, Clone)]
pub struct DispatcherSettings {
    pub workers: usize,
    /// Total attempts per text; every failure kind draws from it.
    pub max_retries: u32,
    pub poll_interval: Duration,
    pub rate_limit_backoff: Duration,
    pub poll_timeout: Duration,
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self {
            workers: 10,
            max_retries: 3,
            poll_interval: Duration::from_secs(1),
            rate_limit_backoff: Duration::from_secs(10),
            poll_timeout: Duration::from_secs(120),
        }
    }
}

impl DispatcherSettings {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            workers: cfg.translation_workers.max(1),
            max_retries: cfg.translation_max_retries,
            poll_interval: Duration::from_millis(cfg.translation_poll_interval_ms.max(1)),
            rate_limit_backoff: Duration::from_secs(cfg.translation_backoff_secs),
            poll_timeout: Duration::from_secs(cfg.translation_poll_timeout_secs),
        }
    }
}

/// Runs translation jobs against a [`TranslationService`], sharing one
/// [`RateLimiter`] across all workers.
#[derive(Clone)]
pub struct TranslationDispatcher {
    service: Arc<dyn TranslationService>,
    limiter: Arc<RateLimiter>,
    settings: DispatcherSettings,
    shutdown: Shutdown,
}

impl TranslationDispatcher {
    pub fn new(
        service: Arc<dyn TranslationService>,
        limiter: Arc<RateLimiter>,
        settings: DispatcherSettings,
        shutdown: Shutdown,
    ) -> Self {
        Self { service, limiter, settings, shutdown }
    }

    pub fn from_config(cfg: &Config, shutdown: Shutdown) -> Result<Self> {
        let service = AssistantClient::from_config(cfg)?;
        let limiter = RateLimiter::new(
            cfg.translation_rate_limit,
            Duration::from_secs(cfg.translation_rate_window_secs),
        );
        Ok(Self::new(
            Arc::new(service),
            Arc::new(limiter),
            DispatcherSettings::from_config(cfg),
            shutdown,
        ))
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_triggered()
    }

    /// Translate one text. Failures are retried within the budget and end as
    /// `None`; nothing is propagated to the caller.
    pub async fn translate_one(&self, text: &str) -> Option<String> {
        let mut attempt: u32 = 0;
        loop {
            self.limiter.acquire().await;
            let err = match self.run_job(text).await {
                Ok(translated) => return Some(translated),
                Err(e) => e,
            };
            attempt += 1;
            if attempt >= self.settings.max_retries {
                tracing::error!(attempts = attempt, error = %err, "Translation failed; giving up");
                return None;
            }
            match err {
                TranslationError::RateLimited => {
                    tracing::warn!(
                        attempt = attempt,
                        backoff_secs = self.settings.rate_limit_backoff.as_secs(),
                        "Translation rate limited; backing off"
                    );
                    tokio::time::sleep(self.settings.rate_limit_backoff).await;
                }
                other => {
                    tracing::warn!(attempt = attempt, error = %other, "Translation attempt failed; retrying");
                }
            }
        }
    }

    async fn run_job(&self, text: &str) -> std::result::Result<String, TranslationError> {
        let job = self.service.submit(text).await?;
        let status = tokio::time::timeout(self.settings.poll_timeout, self.wait_for_completion(&job))
            .await
            .map_err(|_| {
                TranslationError::Service(format!(
                    "run {} still pending after {}s",
                    job.run_id,
                    self.settings.poll_timeout.as_secs()
                ))
            })??;
        match status {
            JobStatus::Completed => self.service.fetch_result(&job).await,
            JobStatus::Failed(status) => Err(TranslationError::Service(format!("run {} ended as {status}", job.run_id))),
            // wait_for_completion only returns settled statuses
            JobStatus::Queued | JobStatus::InProgress => {
                Err(TranslationError::Service(format!("run {} did not settle", job.run_id)))
            }
        }
    }

    async fn wait_for_completion(&self, job: &JobHandle) -> std::result::Result<JobStatus, TranslationError> {
        let mut ticker = tokio::time::interval(self.settings.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let status = self.service.poll(job).await?;
            if !status.is_pending() {
                return Ok(status);
            }
        }
    }

    /// Translate every text on a bounded worker pool. `result[i]` belongs to
    /// `texts[i]`; a failed or crashed item yields `None` at its index.
    pub async fn translate_many(&self, texts: Vec<String>) -> Vec<Option<String>> {
        let total = texts.len();
        if total == 0 {
            return Vec::new();
        }
        let outcomes: Vec<(usize, Option<String>)> = stream::iter(texts.into_iter().enumerate())
            .map(|(index, text)| {
                let dispatcher = self.clone();
                async move {
                    // Items not yet started are dropped once shutdown is requested
                    if dispatcher.shutdown.is_triggered() {
                        return (index, None);
                    }
                    let handle = tokio::spawn(async move { dispatcher.translate_one(&text).await });
                    match handle.await {
                        Ok(result) => (index, result),
                        Err(e) => {
                            tracing::error!(index = index, error = %e, "Translation worker crashed");
                            (index, None)
                        }
                    }
                }
            })
            .buffer_unordered(self.settings.workers.max(1))
            .collect()
            .await;

        let mut results = vec![None; total];
        for (index, result) in outcomes {
            results[index] = result;
        }
        let translated = results.iter().filter(|r| r.is_some()).count();
        tracing::info!(total = total, translated = translated, failed = total - translated, "Translation batch finished");
        results
    }
}
