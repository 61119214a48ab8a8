//! Language-model client for SQL generation.
//!
//! One interface over several providers. Requests carry a system instruction
//! and a user message; the completion is returned as bare SQL.
//!
//! # Supported Providers
//!
//! | Provider | Endpoint | Authentication |
//! |----------|----------|----------------|
//! | OpenAI | `api.openai.com` | Bearer token |
//! | Anthropic | `api.anthropic.com` | x-api-key header |
//! | Ollama | Local (configurable) | None |
//!
//! # Retry Behavior
//!
//! Transient failures are retried with exponential backoff:
//! - Connection timeouts
//! - Rate limiting (429)
//! - Server errors (5xx)
//!
//! Non-success responses and empty completions surface as errors.
//!
//! # Example
//!
//! ```
//! use schema_guard::{
//!     config::{LlmConfig, RetryConfig},
//!     llm::{LlmClient, LlmProvider}
//! };
//!
//! let provider = LlmProvider::Ollama {
//!     base_url: "http://localhost:11434".into(),
//!     model:    "llama3.2".into()
//! };
//!
//! let client = LlmClient::with_retry_config(provider, RetryConfig::default())
//!     .with_sampling(&LlmConfig::default());
//! ```

use std::{sync::LazyLock, time::Duration};

use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::time::sleep;

use crate::{
    config::{LlmConfig, RetryConfig},
    error::{AppError, AppResult, http_error, llm_api_error}
};

/// ```` ```sql ... ``` ```` around the whole completion
static FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^\s*```[A-Za-z0-9_-]*[ \t]*\r?\n?(.*?)\r?\n?```\s*$").expect("valid regex")
});

/// LLM provider configuration with authentication credentials.
#[derive(Debug, Clone)]
pub enum LlmProvider {
    OpenAI {
        /// API key (sk-...)
        api_key: String,
        model:   String
    },
    Anthropic {
        api_key: String,
        model:   String
    },
    /// Local Ollama instance
    Ollama {
        /// Base URL (e.g., "http://localhost:11434")
        base_url: String,
        model:    String
    }
}

/// HTTP client for SQL generation with retry support.
pub struct LlmClient {
    provider:     LlmProvider,
    client:       reqwest::Client,
    retry_config: RetryConfig,
    temperature:  f32,
    top_p:        f32
}

#[derive(Serialize)]
struct OpenAIRequest<'a> {
    model:       &'a str,
    temperature: f32,
    top_p:       f32,
    messages:    [ChatMessage<'a>; 2]
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role:    &'a str,
    content: &'a str
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage
}

#[derive(Deserialize)]
struct OpenAIResponseMessage {
    #[serde(default)]
    content: Option<String>
}

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model:       &'a str,
    max_tokens:  u32,
    temperature: f32,
    system:      &'a str,
    messages:    [ChatMessage<'a>; 1]
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>
}

#[derive(Deserialize)]
struct AnthropicContent {
    #[serde(default)]
    text: String
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model:   &'a str,
    system:  &'a str,
    prompt:  &'a str,
    stream:  bool,
    options: OllamaOptions
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
    top_p:       f32
}

#[derive(Deserialize)]
struct OllamaResponse {
    response: String
}

impl LlmClient {
    /// Create new LLM client with default retry configuration
    pub fn new(provider: LlmProvider) -> Self {
        Self::with_retry_config(provider, RetryConfig::default())
    }

    /// Create new LLM client with custom retry configuration
    pub fn with_retry_config(provider: LlmProvider, retry_config: RetryConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        let defaults = LlmConfig::default();
        Self {
            provider,
            client,
            retry_config,
            temperature: defaults.temperature,
            top_p: defaults.top_p
        }
    }

    /// Take temperature and top-p from configuration
    pub fn with_sampling(mut self, config: &LlmConfig) -> Self {
        self.temperature = config.temperature;
        self.top_p = config.top_p;
        self
    }

    pub fn provider(&self) -> &LlmProvider {
        &self.provider
    }

    /// Generate one SQL statement from a system instruction and a request
    ///
    /// # Errors
    ///
    /// Returns a service error for a non-success response or an empty
    /// completion after retries
    pub async fn generate_sql(&self, system: &str, user: &str) -> AppResult<String> {
        let completion = self.call_with_retry(system, user).await?;
        let sql = strip_fences(&completion);
        if sql.is_empty() {
            return Err(llm_api_error("Model returned empty SQL"));
        }
        Ok(sql)
    }

    async fn call_with_retry(&self, system: &str, user: &str) -> AppResult<String> {
        let mut last_error = None;
        let mut delay = self.retry_config.initial_delay_ms;
        for attempt in 0..=self.retry_config.max_retries {
            if attempt > 0 {
                tracing::warn!(
                    attempt = attempt + 1,
                    max_attempts = self.retry_config.max_retries + 1,
                    delay_ms = delay,
                    "retrying LLM request"
                );
                sleep(Duration::from_millis(delay)).await;
                delay = ((delay as f64 * self.retry_config.backoff_factor) as u64)
                    .min(self.retry_config.max_delay_ms);
            }
            match self.call_provider(system, user).await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    if is_retryable_error(&e) {
                        tracing::debug!(error = %e, "transient LLM failure");
                        last_error = Some(e);
                        continue;
                    }
                    return Err(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| llm_api_error("All retry attempts failed")))
    }

    async fn call_provider(&self, system: &str, user: &str) -> AppResult<String> {
        match &self.provider {
            LlmProvider::OpenAI {
                api_key,
                model
            } => self.call_openai(api_key, model, system, user).await,
            LlmProvider::Anthropic {
                api_key,
                model
            } => self.call_anthropic(api_key, model, system, user).await,
            LlmProvider::Ollama {
                base_url,
                model
            } => self.call_ollama(base_url, model, system, user).await
        }
    }

    async fn call_openai(
        &self,
        api_key: &str,
        model: &str,
        system: &str,
        user: &str
    ) -> AppResult<String> {
        let request = OpenAIRequest {
            model,
            temperature: self.temperature,
            top_p: self.top_p,
            messages: [
                ChatMessage {
                    role:    "system",
                    content: system
                },
                ChatMessage {
                    role:    "user",
                    content: user
                }
            ]
        };
        let response = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&request)
            .send()
            .await
            .map_err(http_error)?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(llm_api_error(format!(
                "OpenAI API error {}: {}",
                status, text
            )));
        }
        let result: OpenAIResponse = response.json().await.map_err(http_error)?;
        result
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| llm_api_error("Empty response from OpenAI"))
    }

    async fn call_anthropic(
        &self,
        api_key: &str,
        model: &str,
        system: &str,
        user: &str
    ) -> AppResult<String> {
        let request = AnthropicRequest {
            model,
            max_tokens: 4096,
            temperature: self.temperature,
            system,
            messages: [ChatMessage {
                role:    "user",
                content: user
            }]
        };
        let response = self
            .client
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&request)
            .send()
            .await
            .map_err(http_error)?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(llm_api_error(format!(
                "Anthropic API error {}: {}",
                status, text
            )));
        }
        let result: AnthropicResponse = response.json().await.map_err(http_error)?;
        result
            .content
            .into_iter()
            .next()
            .map(|c| c.text)
            .ok_or_else(|| llm_api_error("Empty response from Anthropic"))
    }

    async fn call_ollama(
        &self,
        base_url: &str,
        model: &str,
        system: &str,
        user: &str
    ) -> AppResult<String> {
        let request = OllamaRequest {
            model,
            system,
            prompt: user,
            stream: false,
            options: OllamaOptions {
                temperature: self.temperature,
                top_p:       self.top_p
            }
        };
        let url = format!("{}/api/generate", base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(http_error)?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(llm_api_error(format!(
                "Ollama API error {}: {}",
                status, text
            )));
        }
        let result: OllamaResponse = response.json().await.map_err(http_error)?;
        Ok(result.response)
    }
}

fn is_retryable_error(error: &AppError) -> bool {
    let msg = error.to_string().to_lowercase();
    msg.contains("timeout")
        || msg.contains("connection")
        || msg.contains("429")
        || msg.contains("rate limit")
        || msg.contains("500")
        || msg.contains("502")
        || msg.contains("503")
        || msg.contains("504")
}

/// Remove a markdown fence wrapping the whole completion and trim it.
///
/// ```
/// use schema_guard::llm::strip_fences;
///
/// assert_eq!(strip_fences("```sql\nSELECT 1;\n```"), "SELECT 1;");
/// assert_eq!(strip_fences("  SELECT 1  "), "SELECT 1");
/// ```
pub fn strip_fences(completion: &str) -> String {
    match FENCE.captures(completion) {
        Some(caps) => caps
            .get(1)
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default(),
        None => completion.trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fence_without_language() {
        assert_eq!(strip_fences("```\nSELECT 2\n```\n"), "SELECT 2");
    }

    #[test]
    fn inner_backticks_are_kept() {
        assert_eq!(strip_fences("SELECT `id` FROM t"), "SELECT `id` FROM t");
    }
}
