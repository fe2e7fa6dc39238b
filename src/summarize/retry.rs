use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::exponential::ExponentialBackoff;
use tracing::warn;

use crate::config::SummarizerConfig;
use crate::llm::{ChatCompletionRequest, ChatCompletionResponse, LlmClient, OpenAiError};

/// Waits applied to HTTP 429 answers. Nothing else is retried.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial: Duration,
    pub max: Duration,
    pub randomization: f64,
}

impl RetryPolicy {
    pub fn from_config(cfg: &SummarizerConfig) -> Self {
        Self {
            max_retries: cfg.max_rate_limit_retries,
            initial: Duration::from_millis(cfg.backoff_initial_ms),
            max: Duration::from_millis(cfg.backoff_max_ms),
            randomization: 0.5,
        }
    }

    fn schedule(&self) -> ExponentialBackoff<backoff::SystemClock> {
        ExponentialBackoff {
            current_interval: self.initial,
            initial_interval: self.initial,
            randomization_factor: self.randomization,
            multiplier: 2.0,
            max_interval: self.max,
            max_elapsed_time: None,
            ..Default::default()
        }
    }
}

/// Sends `request`, sleeping and resending while the endpoint answers 429 and
/// retries remain. A `Retry-After` hint replaces the computed wait, capped at
/// the policy maximum. Any other error is returned on first sight.
pub async fn call_with_retry<C>(
    client: &C,
    policy: &RetryPolicy,
    request: &ChatCompletionRequest,
) -> Result<ChatCompletionResponse, OpenAiError>
where
    C: LlmClient + ?Sized,
{
    let mut schedule = policy.schedule();
    let mut attempt = 0u32;
    loop {
        match client.chat_completion(request.clone()).await {
            Err(OpenAiError::RateLimited { retry_after }) if attempt < policy.max_retries => {
                attempt += 1;
                let computed = schedule.next_backoff().unwrap_or(policy.max);
                let delay = retry_after.unwrap_or(computed).min(policy.max);
                warn!(
                    model = request.model.as_deref().unwrap_or("default"),
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "rate limited, backing off"
                );
                tokio::time::sleep(delay).await;
            }
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::openai::{ApiErrorBody, MockClient};
    use crate::llm::{ChatMessage, ChatRole};
    use reqwest::StatusCode;

    fn fast(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            initial: Duration::from_millis(1),
            max: Duration::from_millis(5),
            randomization: 0.0,
        }
    }

    fn request() -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: Some("m".into()),
            messages: vec![ChatMessage::new(ChatRole::User, "hi")],
            max_tokens: None,
            temperature: None,
            top_p: None,
        }
    }

    fn limited() -> Result<ChatCompletionResponse, OpenAiError> {
        Err(OpenAiError::RateLimited { retry_after: None })
    }

    #[tokio::test]
    async fn retries_rate_limit_then_succeeds() {
        let mock = MockClient::new();
        mock.push_response(limited());
        mock.push_response(Err(OpenAiError::RateLimited { retry_after: Some(Duration::from_secs(60)) }));
        mock.push_text("Title: ok");
        let out = call_with_retry(&mock, &fast(3), &request()).await.unwrap();
        assert_eq!(out.content, "Title: ok");
        assert_eq!(mock.calls().len(), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let mock = MockClient::new();
        for _ in 0..4 {
            mock.push_response(limited());
        }
        let err = call_with_retry(&mock, &fast(2), &request()).await.unwrap_err();
        assert!(err.is_rate_limited());
        assert_eq!(mock.calls().len(), 3);
    }

    #[tokio::test]
    async fn other_errors_are_not_retried() {
        let mock = MockClient::new();
        mock.push_response(Err(OpenAiError::Timeout));
        mock.push_text("never reached");
        assert!(matches!(
            call_with_retry(&mock, &fast(3), &request()).await,
            Err(OpenAiError::Timeout)
        ));

        let mock = MockClient::new();
        mock.push_response(Err(OpenAiError::Api {
            status: StatusCode::SERVICE_UNAVAILABLE,
            error: ApiErrorBody::default(),
        }));
        assert!(call_with_retry(&mock, &fast(3), &request()).await.is_err());
        assert_eq!(mock.calls().len(), 1);
    }

    #[test]
    fn schedule_grows_and_caps() {
        let policy = RetryPolicy {
            max_retries: 5,
            initial: Duration::from_millis(100),
            max: Duration::from_millis(250),
            randomization: 0.0,
        };
        let mut s = policy.schedule();
        assert_eq!(s.next_backoff(), Some(Duration::from_millis(100)));
        assert_eq!(s.next_backoff(), Some(Duration::from_millis(200)));
        assert_eq!(s.next_backoff(), Some(Duration::from_millis(250)));
    }
}
