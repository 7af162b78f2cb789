//! Gemini API client
//!
//! Uses a long-lived reqwest::Client for connection pooling. Transient
//! failures (transport errors, timeouts, 429 and 5xx) are retried with
//! exponential backoff; anything else fails the call immediately.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info, warn};

use super::{GenerationOptions, TextGenerator};
use crate::error::RouterError;
use crate::Result;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

/// Reusable Gemini client (connection-pooled)
pub struct GeminiClient {
    client: Client,
    api_key: String,
    endpoint: String,
    options: GenerationOptions,
}

impl GeminiClient {
    pub fn new(api_key: String, model: &str, options: GenerationOptions) -> Result<Self> {
        Self::with_base_url(api_key, GEMINI_BASE_URL, model, options)
    }

    /// Point the client at a different host, e.g. a local stub.
    pub fn with_base_url(
        api_key: String,
        base_url: &str,
        model: &str,
        options: GenerationOptions,
    ) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(RouterError::ConfigError(
                "GEMINI_API_KEY not configured".to_string(),
            ));
        }

        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(options.timeout)
            .build()?;

        Ok(Self {
            client,
            api_key,
            endpoint: format!(
                "{}/{}:generateContent",
                base_url.trim_end_matches('/'),
                model
            ),
            options,
        })
    }

    pub fn options(&self) -> &GenerationOptions {
        &self.options
    }

    fn build_request(&self, system_instruction: &str, user_content: &str) -> GeminiRequest {
        GeminiRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: user_content.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: self.options.temperature,
                max_output_tokens: self.options.max_output_tokens,
            },
            system_instruction: SystemInstruction {
                parts: vec![Part {
                    text: system_instruction.to_string(),
                }],
            },
        }
    }

    /// One round trip. `Err(Attempt::Retry)` marks failures worth retrying.
    async fn attempt(&self, request: &GeminiRequest) -> std::result::Result<String, Attempt> {
        let url = format!("{}?key={}", self.endpoint, self.api_key);

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                let message = format!("Gemini API request failed: {}", without_url(e));
                Attempt::Retry(RouterError::LlmError(message))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let err = RouterError::LlmError(format!(
                "Gemini API returned {}: {}",
                status, error_text
            ));
            return Err(if is_transient(status) {
                Attempt::Retry(err)
            } else {
                Attempt::Fatal(err)
            });
        }

        let gemini_response: GeminiResponse = response.json().await.map_err(|e| {
            Attempt::Fatal(RouterError::LlmError(format!(
                "Gemini parse error: {}",
                without_url(e)
            )))
        })?;

        extract_text(gemini_response).map_err(Attempt::Fatal)
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, system_instruction: &str, user_content: &str) -> Result<String> {
        let request = self.build_request(system_instruction, user_content);
        let max_attempts = self.options.max_retries + 1;
        let mut attempt = 1;

        loop {
            info!(attempt, "Calling Gemini API");

            match self.attempt(&request).await {
                Ok(text) => return Ok(text),
                Err(Attempt::Retry(e)) if attempt < max_attempts => {
                    let delay = RETRY_BASE_DELAY * 2u32.saturating_pow(attempt - 1);
                    warn!(attempt, error = %e, ?delay, "Transient Gemini failure, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(Attempt::Retry(e)) | Err(Attempt::Fatal(e)) => {
                    error!(attempt, error = %e, "Gemini call failed");
                    return Err(e);
                }
            }
        }
    }
}

enum Attempt {
    Retry(RouterError),
    Fatal(RouterError),
}

fn is_transient(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
}

/// reqwest errors print the request URL, which carries the API key.
fn without_url(e: reqwest::Error) -> reqwest::Error {
    e.without_url()
}

fn extract_text(response: GeminiResponse) -> Result<String> {
    let candidate = response.candidates.into_iter().next().ok_or_else(|| {
        RouterError::LlmError("No response from Gemini API".to_string())
    })?;

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().map(|p| p.text).collect())
        .unwrap_or_default();

    if text.is_empty() {
        return Err(RouterError::LlmError(format!(
            "Empty response from Gemini (finish reason: {})",
            candidate.finish_reason.as_deref().unwrap_or("unknown")
        )));
    }

    Ok(text)
}

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
    system_instruction: SystemInstruction,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}
