use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::SummarizerConfig;
use crate::llm::{ChatCompletionRequest, ChatMessage, ChatRole, LlmClient, OpenAiError};
use crate::util::text::truncate_chars;

pub mod chunk;
pub mod labels;
pub mod retry;

use retry::RetryPolicy;

// Notion rich_text limit.
const PROBLEM_MAX_CHARS: usize = 2000;

/// The single most relevant AI use case extracted from one article.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UseCase {
    pub title: String,
    pub problem: String,
    pub ai_solution: String,
    pub category: String,
    pub industry: String,
    pub note: String,
}

impl UseCase {
    /// Problem text with the note appended, capped at the rich text limit.
    pub fn problem_with_note(&self) -> String {
        if self.note.is_empty() {
            return truncate_chars(&self.problem, PROBLEM_MAX_CHARS);
        }
        truncate_chars(&format!("{}  (Note: {})", self.problem, self.note), PROBLEM_MAX_CHARS)
    }
}

#[derive(Debug)]
pub enum SummarizeError {
    /// 429s outlasted the retry budget.
    RateLimited,
    /// Connection or DNS failure.
    Unavailable(String),
    Timeout,
    Api { status: Option<u16>, message: String },
    /// The models answered but nothing usable could be parsed.
    NoUseCase,
}

impl From<OpenAiError> for SummarizeError {
    fn from(err: OpenAiError) -> Self {
        match err {
            OpenAiError::RateLimited { .. } => SummarizeError::RateLimited,
            OpenAiError::Timeout => SummarizeError::Timeout,
            OpenAiError::Http(e) => SummarizeError::Unavailable(e.to_string()),
            OpenAiError::Api { status, error } => SummarizeError::Api {
                status: Some(status.as_u16()),
                message: error.message,
            },
            other => SummarizeError::Api { status: None, message: other.to_string() },
        }
    }
}

impl std::fmt::Display for SummarizeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SummarizeError::RateLimited => write!(f, "summarizer rate limited"),
            SummarizeError::Unavailable(msg) => write!(f, "summarizer unavailable: {msg}"),
            SummarizeError::Timeout => write!(f, "summarizer timed out"),
            SummarizeError::Api { status: Some(s), message } => write!(f, "summarizer api error {s}: {message}"),
            SummarizeError::Api { status: None, message } => write!(f, "summarizer error: {message}"),
            SummarizeError::NoUseCase => write!(f, "no use case found"),
        }
    }
}

impl std::error::Error for SummarizeError {}

/// Condenses article text into a use case.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, text: &str) -> Result<UseCase, SummarizeError>;
}

/// Chunked extraction: the primary model reads every chunk, the fallback
/// model reads the whole text once when no chunk produced a candidate.
pub struct UseCaseExtractor<C: LlmClient> {
    client: C,
    policy: RetryPolicy,
    primary_model: String,
    fallback_model: String,
    primary_max_tokens: u32,
    fallback_max_tokens: u32,
    temperature: f32,
    chunk_chars: usize,
    call_delay: Duration,
    keywords: Vec<String>,
}

impl<C: LlmClient> UseCaseExtractor<C> {
    pub fn new(client: C, cfg: &SummarizerConfig, keywords: &[String]) -> Self {
        Self {
            client,
            policy: RetryPolicy::from_config(cfg),
            primary_model: cfg.primary_model.clone(),
            fallback_model: cfg.fallback_model.clone(),
            primary_max_tokens: cfg.primary_max_tokens,
            fallback_max_tokens: cfg.fallback_max_tokens,
            temperature: cfg.temperature,
            chunk_chars: cfg.chunk_chars,
            call_delay: Duration::from_millis(cfg.call_delay_ms),
            keywords: keywords
                .iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    async fn ask(&self, model: &str, excerpt: &str, max_tokens: u32) -> Result<String, OpenAiError> {
        let request = ChatCompletionRequest {
            model: Some(model.to_string()),
            messages: vec![ChatMessage::new(ChatRole::User, labels::build_prompt(excerpt))],
            max_tokens: Some(max_tokens),
            temperature: Some(self.temperature),
            top_p: None,
        };
        let resp = retry::call_with_retry(&self.client, &self.policy, &request).await?;
        Ok(resp.content)
    }

    async fn pause(&self) {
        if !self.call_delay.is_zero() {
            tokio::time::sleep(self.call_delay).await;
        }
    }
}

#[async_trait]
impl<C: LlmClient> Summarizer for UseCaseExtractor<C> {
    async fn summarize(&self, text: &str) -> Result<UseCase, SummarizeError> {
        let chunks = chunk::split_chunks(text, self.chunk_chars);
        if chunks.is_empty() {
            return Err(SummarizeError::NoUseCase);
        }

        let mut candidates = Vec::new();
        for (i, piece) in chunks.iter().enumerate() {
            if i > 0 {
                self.pause().await;
            }
            debug!(chunk = i + 1, of = chunks.len(), model = %self.primary_model, "primary model");
            match self.ask(&self.primary_model, piece, self.primary_max_tokens).await {
                Ok(reply) => candidates.extend(labels::parse_labelled(&reply, &self.keywords)),
                // the endpoint itself is gone or throttled; other chunks would fail the same way
                Err(e) if e.is_rate_limited() || e.is_transport() => return Err(e.into()),
                Err(e) => warn!(chunk = i + 1, error = %e, "primary model call failed"),
            }
        }

        if candidates.is_empty() {
            self.pause().await;
            debug!(model = %self.fallback_model, "no candidate from primary model, trying fallback on full text");
            let reply = self.ask(&self.fallback_model, text, self.fallback_max_tokens).await?;
            candidates.extend(labels::parse_labelled(&reply, &self.keywords));
        }

        labels::pick_best(candidates, text, &self.keywords).ok_or(SummarizeError::NoUseCase)
    }
}
