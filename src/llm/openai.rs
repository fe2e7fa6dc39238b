use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, RETRY_AFTER};
use reqwest::{Client as HttpClient, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::SummarizerConfig;

const DEFAULT_TOP_P: f32 = 1.0;

#[derive(Clone, Debug)]
pub struct OpenAiClientConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub default_model: String,
    pub default_temperature: f32,
    pub default_top_p: f32,
    pub timeout: Duration,
    /// OpenRouter attribution, sent as `HTTP-Referer` / `X-Title` when set.
    pub referer: Option<String>,
    pub app_title: Option<String>,
}

impl OpenAiClientConfig {
    pub fn from_summarizer(cfg: &SummarizerConfig, api_key: Option<String>) -> Self {
        let non_empty = |s: &str| (!s.trim().is_empty()).then(|| s.to_string());
        Self {
            api_key,
            base_url: cfg.base_url.clone(),
            default_model: cfg.primary_model.clone(),
            default_temperature: cfg.temperature,
            default_top_p: DEFAULT_TOP_P,
            timeout: Duration::from_secs(cfg.call_timeout_secs),
            referer: non_empty(&cfg.referer),
            app_title: non_empty(&cfg.app_title),
        }
    }
}

#[derive(Clone)]
pub struct OpenAiClient {
    http: HttpClient,
    cfg: OpenAiClientConfig,
}

impl OpenAiClient {
    pub fn new(cfg: OpenAiClientConfig) -> Result<Self, OpenAiError> {
        let mut headers = HeaderMap::new();
        if let Some(referer) = cfg.referer.as_deref().and_then(|v| HeaderValue::from_str(v).ok()) {
            headers.insert("http-referer", referer);
        }
        if let Some(title) = cfg.app_title.as_deref().and_then(|v| HeaderValue::from_str(v).ok()) {
            headers.insert("x-title", title);
        }
        let http = HttpClient::builder()
            .timeout(cfg.timeout)
            .default_headers(headers)
            .build()
            .map_err(OpenAiError::http)?;
        Ok(Self { http, cfg })
    }

    fn resolve_api_key(&self) -> Result<&str, OpenAiError> {
        self.cfg.api_key.as_deref().ok_or(OpenAiError::MissingApiKey)
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.cfg.base_url.trim_end_matches('/')
        )
    }

    fn build_api_request(&self, req: &ChatCompletionRequest) -> ApiChatCompletionRequest {
        ApiChatCompletionRequest {
            model: req
                .model
                .clone()
                .unwrap_or_else(|| self.cfg.default_model.clone()),
            temperature: req
                .temperature
                .unwrap_or(self.cfg.default_temperature),
            top_p: req.top_p.unwrap_or(self.cfg.default_top_p),
            max_tokens: req.max_tokens,
            messages: req
                .messages
                .iter()
                .map(|m| ApiChatMessage {
                    role: m.role.as_api_str().to_string(),
                    content: Some(m.content.clone()),
                })
                .collect(),
        }
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn chat_completion(
        &self,
        request: ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, OpenAiError>;
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn chat_completion(
        &self,
        request: ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, OpenAiError> {
        if request.messages.is_empty() {
            return Err(OpenAiError::EmptyMessages);
        }

        let api_key = self.resolve_api_key()?;
        let api_request = self.build_api_request(&request);
        let endpoint = self.endpoint();

        let response = self
            .http
            .post(endpoint)
            .bearer_auth(api_key)
            .json(&api_request)
            .send()
            .await
            .map_err(OpenAiError::from_reqwest)?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(OpenAiError::RateLimited {
                retry_after: retry_after(response.headers()),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(OpenAiError::from_reqwest)?;

        if !status.is_success() {
            let api_err = serde_json::from_slice::<ApiErrorEnvelope>(&bytes)
                .ok()
                .map(|env| env.error);
            return Err(OpenAiError::Api {
                status,
                error: api_err.unwrap_or_default(),
            });
        }

        let parsed: ApiChatCompletionResponse =
            serde_json::from_slice(&bytes).map_err(OpenAiError::Decode)?;
        let raw: Value =
            serde_json::from_slice(&bytes).map_err(OpenAiError::Decode)?;

        let content = parsed
            .choices
            .iter()
            .find_map(|choice| choice.message.content.clone())
            .unwrap_or_default();

        Ok(ChatCompletionResponse {
            content,
            raw,
            usage: parsed.usage.map(|usage| UsageMetrics {
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
                total_tokens: usage.total_tokens,
            }),
        })
    }
}

// Only the delta-seconds form; HTTP-date values are ignored.
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

#[derive(Clone, Debug, PartialEq)]
pub struct ChatCompletionRequest {
    pub model: Option<String>,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl ChatRole {
    fn as_api_str(&self) -> &'static str {
        match self {
            ChatRole::System => "system",
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

impl ChatMessage {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ChatCompletionResponse {
    pub content: String,
    pub raw: Value,
    pub usage: Option<UsageMetrics>,
}

impl ChatCompletionResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self { content: content.into(), raw: Value::Null, usage: None }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct UsageMetrics {
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
}

#[derive(Debug)]
pub enum OpenAiError {
    MissingApiKey,
    EmptyMessages,
    Http(reqwest::Error),
    Timeout,
    RateLimited {
        retry_after: Option<Duration>,
    },
    Api {
        status: StatusCode,
        error: ApiErrorBody,
    },
    MockQueueEmpty,
    Decode(serde_json::Error),
}

impl OpenAiError {
    fn http(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            OpenAiError::Timeout
        } else {
            OpenAiError::Http(err)
        }
    }

    fn from_reqwest(err: reqwest::Error) -> Self {
        Self::http(err)
    }

    /// Only 429 is worth waiting for; everything else fails fast.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, OpenAiError::RateLimited { .. })
    }

    /// The endpoint could not be reached or did not answer in time.
    pub fn is_transport(&self) -> bool {
        matches!(self, OpenAiError::Http(_) | OpenAiError::Timeout)
    }
}

impl std::fmt::Display for OpenAiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OpenAiError::MissingApiKey => write!(f, "language model api key is not set"),
            OpenAiError::EmptyMessages => {
                write!(f, "chat completion requires at least one message")
            }
            OpenAiError::Http(err) => write!(f, "http error: {err}"),
            OpenAiError::Timeout => write!(f, "request timed out"),
            OpenAiError::RateLimited { retry_after: Some(d) } => {
                write!(f, "rate limited (retry after {}s)", d.as_secs())
            }
            OpenAiError::RateLimited { retry_after: None } => write!(f, "rate limited"),
            OpenAiError::Api { status, error } => {
                write!(f, "api error {status}: {}", error.message)
            }
            OpenAiError::MockQueueEmpty => {
                write!(f, "mock client response queue is empty")
            }
            OpenAiError::Decode(err) => write!(f, "decode error: {err}"),
        }
    }
}

impl std::error::Error for OpenAiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            OpenAiError::Http(err) => Some(err),
            OpenAiError::Decode(err) => Some(err),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub message: String,
    #[serde(default)]
    pub r#type: Option<String>,
    #[serde(default)]
    pub code: Option<Value>,
}

impl Default for ApiErrorBody {
    fn default() -> Self {
        Self {
            message: "unknown error".to_string(),
            r#type: None,
            code: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

/// Scripted client: pops one queued result per call and records every request.
#[derive(Debug, Default)]
pub struct MockClient {
    responses: Mutex<VecDeque<Result<ChatCompletionResponse, OpenAiError>>>,
    calls: Mutex<Vec<ChatCompletionRequest>>,
}

impl MockClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_response(
        &self,
        resp: Result<ChatCompletionResponse, OpenAiError>,
    ) {
        self.responses.lock().unwrap().push_back(resp);
    }

    pub fn push_text(&self, content: &str) {
        self.push_response(Ok(ChatCompletionResponse::text(content)));
    }

    pub fn calls(&self) -> Vec<ChatCompletionRequest> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmClient for MockClient {
    async fn chat_completion(
        &self,
        request: ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, OpenAiError> {
        self.calls.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(OpenAiError::MockQueueEmpty))
    }
}

#[derive(Debug, Clone, Serialize)]
struct ApiChatCompletionRequest {
    model: String,
    temperature: f32,
    top_p: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    messages: Vec<ApiChatMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ApiChatMessage {
    role: String,
    content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ApiChatCompletionResponse {
    choices: Vec<ApiChatChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Clone, Deserialize)]
struct ApiChatChoice {
    message: ApiChatMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct ApiUsage {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
    total_tokens: Option<u32>,
}

#[cfg(test)]
impl OpenAiClient {
    pub(crate) fn build_request_for_tests(
        &self,
        req: &ChatCompletionRequest,
    ) -> ApiChatCompletionRequest {
        self.build_api_request(req)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_request() -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: None,
            messages: vec![
                ChatMessage::new(ChatRole::System, "You are an industrial analyst."),
                ChatMessage::new(ChatRole::User, "Article excerpt: ..."),
            ],
            max_tokens: Some(600),
            temperature: Some(0.3),
            top_p: Some(0.9),
        }
    }

    #[test]
    fn config_follows_summarizer_settings() {
        let cfg = OpenAiClientConfig::from_summarizer(&SummarizerConfig::default(), Some("k".into()));
        assert_eq!(cfg.base_url, "https://openrouter.ai/api/v1");
        assert_eq!(cfg.default_model, "google/gemma-9b:free");
        assert_eq!(cfg.timeout, Duration::from_secs(60));
        assert_eq!(cfg.app_title.as_deref(), Some("AI Use Case Extractor"));

        let blank = SummarizerConfig { referer: " ".into(), ..SummarizerConfig::default() };
        assert!(OpenAiClientConfig::from_summarizer(&blank, None).referer.is_none());
    }

    #[test]
    fn build_request_serializes_messages() {
        let mut cfg = OpenAiClientConfig::from_summarizer(&SummarizerConfig::default(), Some("test".into()));
        cfg.timeout = Duration::from_secs(30);
        let client = OpenAiClient::new(cfg).unwrap();

        let request = sample_request();
        let api_request = client.build_request_for_tests(&request);
        let value = serde_json::to_value(&api_request).unwrap();

        assert_eq!(value["model"], "google/gemma-9b:free");
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][1]["content"], "Article excerpt: ...");
        assert_eq!(value["max_tokens"], 600);
    }

    #[test]
    fn explicit_model_wins() {
        let client = OpenAiClient::new(OpenAiClientConfig::from_summarizer(
            &SummarizerConfig::default(),
            Some("test".into()),
        ))
        .unwrap();
        let mut request = sample_request();
        request.model = Some("qwen/qwen-7b-instruct:free".into());
        request.max_tokens = None;
        let value = serde_json::to_value(client.build_request_for_tests(&request)).unwrap();
        assert_eq!(value["model"], "qwen/qwen-7b-instruct:free");
        assert!(value.get("max_tokens").is_none());
    }

    #[tokio::test]
    async fn missing_key_fails_before_sending() {
        let client = OpenAiClient::new(OpenAiClientConfig::from_summarizer(
            &SummarizerConfig::default(),
            None,
        ))
        .unwrap();
        let err = client.chat_completion(sample_request()).await.unwrap_err();
        assert!(matches!(err, OpenAiError::MissingApiKey));
    }

    #[tokio::test]
    async fn mock_client_returns_enqueued_response() {
        let mock = MockClient::new();
        mock.push_text("Title: Vision QA");

        let req = sample_request();
        let out = mock.chat_completion(req.clone()).await.unwrap();

        assert_eq!(out.content, "Title: Vision QA");
        assert_eq!(mock.calls().len(), 1);
        assert_eq!(mock.calls()[0], req);
        assert!(matches!(
            mock.chat_completion(req).await,
            Err(OpenAiError::MockQueueEmpty)
        ));
    }

    #[test]
    fn retry_after_seconds_parsed() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("12"));
        assert_eq!(retry_after(&headers), Some(Duration::from_secs(12)));
        headers.insert(RETRY_AFTER, HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"));
        assert_eq!(retry_after(&headers), None);
    }

    #[test]
    fn error_classification() {
        let err = OpenAiError::Api {
            status: StatusCode::BAD_REQUEST,
            error: ApiErrorBody {
                message: "bad request".into(),
                r#type: Some("invalid_request_error".into()),
                code: None,
            },
        };
        assert_eq!(format!("{err}"), "api error 400 Bad Request: bad request");
        assert!(!err.is_rate_limited());
        assert!(!err.is_transport());

        let limited = OpenAiError::RateLimited { retry_after: Some(Duration::from_secs(3)) };
        assert!(limited.is_rate_limited());
        assert_eq!(format!("{limited}"), "rate limited (retry after 3s)");
        assert!(OpenAiError::Timeout.is_transport());
    }

    #[test]
    fn api_error_body_accepts_numeric_code() {
        let env: ApiErrorEnvelope =
            serde_json::from_str(r#"{"error":{"message":"No endpoints found","code":404}}"#).unwrap();
        assert_eq!(env.error.message, "No endpoints found");
    }
}
