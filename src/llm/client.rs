use crate::config::ClientConfig;
use crate::error::{ForecastError, Result};
use crate::llm::types::*;
use crate::provider::CompletionProvider;
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::{Client, StatusCode};
use tokio::time::sleep;

/// Outcome of a single HTTP attempt.
enum AttemptError {
    /// Worth one more try: timeouts, dropped connections, overload.
    Transient(String),
    Fatal(ForecastError),
}

#[derive(Clone)]
pub struct AnthropicClient {
    client: Client,
    config: ClientConfig,
}

impl AnthropicClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(ClientConfig::from_env()?)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.config.base_url)
    }

    async fn attempt(&self, payload: &MessagesRequest) -> std::result::Result<String, AttemptError> {
        let res = self
            .client
            .post(self.messages_url())
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    AttemptError::Transient(e.to_string())
                } else {
                    AttemptError::Fatal(e.into())
                }
            })?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            let message = api_error_message(status, &body);
            return Err(if is_transient_status(status) {
                AttemptError::Transient(message)
            } else {
                AttemptError::Fatal(ForecastError::ExternalService(message))
            });
        }

        let bytes = res.bytes().await.map_err(|e| {
            if e.is_timeout() || e.is_body() {
                AttemptError::Transient(format!("reading response body: {}", e))
            } else {
                AttemptError::Fatal(e.into())
            }
        })?;
        let body: MessagesResponse = serde_json::from_slice(&bytes).map_err(|e| {
            AttemptError::Fatal(ForecastError::ExternalService(format!(
                "Malformed model response: {}",
                e
            )))
        })?;

        if body.was_truncated() {
            warn!(
                "Model output hit the {} token limit; the table may be incomplete",
                payload.max_tokens
            );
        }
        if let Some(usage) = &body.usage {
            debug!(
                "Model usage: {} input tokens, {} output tokens",
                usage.input_tokens, usage.output_tokens
            );
        }

        body.text().map_err(AttemptError::Fatal)
    }
}

#[async_trait]
impl CompletionProvider for AnthropicClient {
    async fn complete(
        &self,
        prompt: &str,
        max_output_tokens: u32,
        model_id: &str,
    ) -> Result<String> {
        let payload = MessagesRequest {
            model: model_id.to_string(),
            max_tokens: max_output_tokens,
            messages: vec![Message::user(prompt)],
        };
        debug!(
            "Sending {} prompt characters to {} (max {} tokens)",
            prompt.len(),
            model_id,
            max_output_tokens
        );

        match self.attempt(&payload).await {
            Ok(text) => Ok(text),
            Err(AttemptError::Fatal(err)) => Err(err),
            Err(AttemptError::Transient(reason)) if !self.config.retry_transient => {
                Err(ForecastError::ExternalService(reason))
            }
            Err(AttemptError::Transient(reason)) => {
                warn!(
                    "Transient model API failure ({}); retrying once in {:?}",
                    reason, self.config.retry_delay
                );
                sleep(self.config.retry_delay).await;

                self.attempt(&payload).await.map_err(|err| match err {
                    AttemptError::Fatal(err) => err,
                    AttemptError::Transient(reason) => ForecastError::ExternalService(format!(
                        "Model API still failing after retry: {}",
                        reason
                    )),
                })
            }
        }
    }
}

pub(crate) fn is_transient_status(status: StatusCode) -> bool {
    matches!(status.as_u16(), 408 | 429 | 500 | 502 | 503 | 504 | 529)
}

pub(crate) fn api_error_message(status: StatusCode, body: &str) -> String {
    match serde_json::from_str::<ApiErrorResponse>(body) {
        Ok(parsed) => format!(
            "Model API error (status {}, {}): {}",
            status, parsed.error.kind, parsed.error.message
        ),
        Err(_) => format!("Model API error (status {}): {}", status, body.trim()),
    }
}
