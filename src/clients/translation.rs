use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

use crate::config::Config;
use crate::models::{CrawlerError, Result};

#[derive(Debug, thiserror::Error)]
pub enum TranslationError {
    #[error("translation service rate limit exceeded")]
    RateLimited,

    #[error("translation HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("translation service error: {0}")]
    Service(String),
}

/// Handle for one submitted translation job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    pub thread_id: String,
    pub run_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Queued,
    InProgress,
    Completed,
    Failed(String),
}

impl JobStatus {
    pub fn from_api(status: &str) -> Self {
        match status {
            "queued" => Self::Queued,
            "in_progress" => Self::InProgress,
            "completed" => Self::Completed,
            other => Self::Failed(other.to_string()),
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Queued | Self::InProgress)
    }
}

/// Asynchronous translation backend: submit text, poll the job, fetch the result.
#[async_trait]
pub trait TranslationService: Send + Sync {
    async fn submit(&self, text: &str) -> std::result::Result<JobHandle, TranslationError>;

    async fn poll(&self, job: &JobHandle) -> std::result::Result<JobStatus, TranslationError>;

    async fn fetch_result(&self, job: &JobHandle) -> std::result::Result<String, TranslationError>;
}

/// Client for an assistant-backed thread/run API: each job is a thread holding the
/// source text plus a run of the configured translation assistant.
#[derive(Clone)]
pub struct AssistantClient {
    client: Client,
    base_url: String,
    api_key: String,
    assistant_id: String,
}

impl AssistantClient {
    pub fn new(base_url: String, api_key: String, assistant_id: String, timeout_ms: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_millis(timeout_ms))
            .build()?;
        Ok(Self { client, base_url, api_key, assistant_id })
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        let api_key = cfg
            .openai_api_key
            .clone()
            .ok_or_else(|| CrawlerError::Configuration("OPENAI_API_KEY is not set".to_string()))?;
        let assistant_id = cfg
            .translation_assistant
            .clone()
            .ok_or_else(|| CrawlerError::Configuration("TRANSLATION_ASSISTANT is not set".to_string()))?;
        Self::new(cfg.openai_base_url.clone(), api_key, assistant_id, cfg.http_timeout_ms)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> std::result::Result<Value, TranslationError> {
        let response = request
            .bearer_auth(&self.api_key)
            .header("OpenAI-Beta", "assistants=v2")
            .send()
            .await?;
        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(TranslationError::RateLimited);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(TranslationError::Service(format!(
                "status={} body={}",
                status,
                text.chars().take(200).collect::<String>()
            )));
        }
        Ok(response.json().await?)
    }

    async fn post(&self, path: &str, body: Value) -> std::result::Result<Value, TranslationError> {
        self.send(self.client.post(self.url(path)).json(&body)).await
    }

    async fn get(&self, path: &str) -> std::result::Result<Value, TranslationError> {
        self.send(self.client.get(self.url(path))).await
    }
}

fn id_of(value: &Value, what: &str) -> std::result::Result<String, TranslationError> {
    value
        .get("id")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| TranslationError::Service(format!("{what} response has no id")))
}

#[async_trait]
impl TranslationService for AssistantClient {
    async fn submit(&self, text: &str) -> std::result::Result<JobHandle, TranslationError> {
        let thread = self.post("threads", json!({})).await?;
        let thread_id = id_of(&thread, "thread")?;
        self.post(
            &format!("threads/{thread_id}/messages"),
            json!({ "role": "user", "content": text }),
        )
        .await?;
        let run = self
            .post(&format!("threads/{thread_id}/runs"), json!({ "assistant_id": self.assistant_id }))
            .await?;
        let run_id = id_of(&run, "run")?;
        tracing::debug!(thread_id = %thread_id, run_id = %run_id, "Submitted translation job");
        Ok(JobHandle { thread_id, run_id })
    }

    async fn poll(&self, job: &JobHandle) -> std::result::Result<JobStatus, TranslationError> {
        let run = self.get(&format!("threads/{}/runs/{}", job.thread_id, job.run_id)).await?;
        let status = run
            .get("status")
            .and_then(|s| s.as_str())
            .ok_or_else(|| TranslationError::Service("run response has no status".to_string()))?;
        Ok(JobStatus::from_api(status))
    }

    async fn fetch_result(&self, job: &JobHandle) -> std::result::Result<String, TranslationError> {
        let messages = self.get(&format!("threads/{}/messages", job.thread_id)).await?;
        // Newest first; the latest assistant message carries the translation
        messages
            .get("data")
            .and_then(|d| d.as_array())
            .into_iter()
            .flatten()
            .find(|m| m.get("role").and_then(|r| r.as_str()) == Some("assistant"))
            .and_then(|m| m.pointer("/content/0/text/value"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| TranslationError::Service("no assistant message in thread".to_string()))
    }
}
