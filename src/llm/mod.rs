//! Language-generation capability
//!
//! Every node talks to the model through [`TextGenerator`]: one system
//! instruction, one user message, one text answer. Sampling constraints
//! belong to the client, not to the call site.

use crate::formatting::MARKET_UPDATE_PREFIX;
use crate::models::{GENERAL_LABEL, QUANT_LABEL};
use crate::prompts::{CLASSIFICATION_PROMPT, SYMBOL_EXTRACTION_PROMPT};
use crate::Result;
use async_trait::async_trait;
use std::time::Duration;

pub mod gemini;
pub use gemini::GeminiClient;

/// Trait for text generation (LLM controlled)
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, system_instruction: &str, user_content: &str) -> Result<String>;
}

/// Sampling and transport limits applied to every generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOptions {
    pub temperature: f32,
    /// `None` leaves the output length to the model.
    pub max_output_tokens: Option<u32>,
    pub timeout: Duration,
    /// Extra attempts after the first one, for transient failures only.
    pub max_retries: u32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            max_output_tokens: None,
            timeout: Duration::from_secs(120),
            max_retries: 2,
        }
    }
}

/// Words that mark a question as being about a listed stock.
const QUANT_KEYWORDS: &[&str] = &[
    "stock", "share", "price", "ticker", "quote", "close", "closing", "open",
    "volume", "market", "trading", "traded", "cổ phiếu", "giá", "mã",
];

/// Deterministic offline generator for development & testing.
/// Keeps the router functional without an API key.
///
/// Classification is keyword based, symbol extraction picks the first
/// ticker-shaped token, market updates echo the supplied data and general
/// questions get an explicit "don't know".
pub struct MockGenerator;

impl MockGenerator {
    pub const GENERAL_ANSWER: &'static str =
        "I don't know. I don't have enough verified information to answer that.";

    fn classify(query: &str) -> &'static str {
        let lowered = query.to_lowercase();
        let keyword_hit = QUANT_KEYWORDS.iter().any(|kw| lowered.contains(kw));

        if keyword_hit || find_ticker(query).is_some() {
            QUANT_LABEL
        } else {
            GENERAL_LABEL
        }
    }

    fn extract_symbol(query: &str) -> String {
        find_ticker(query)
            .or_else(|| query.split_whitespace().last().map(clean_token))
            .unwrap_or_default()
    }
}

#[async_trait]
impl TextGenerator for MockGenerator {
    async fn generate(&self, system_instruction: &str, user_content: &str) -> Result<String> {
        let answer = if system_instruction == CLASSIFICATION_PROMPT {
            Self::classify(user_content).to_string()
        } else if system_instruction == SYMBOL_EXTRACTION_PROMPT {
            Self::extract_symbol(user_content)
        } else if system_instruction.contains(MARKET_UPDATE_PREFIX) {
            format!("{}\n{}", MARKET_UPDATE_PREFIX, user_content.trim())
        } else {
            Self::GENERAL_ANSWER.to_string()
        };

        Ok(answer)
    }
}

fn clean_token(token: &str) -> String {
    token
        .trim_matches(|c: char| !c.is_ascii_alphanumeric())
        .to_string()
}

/// First all-caps token of 2 to 5 ASCII letters/digits, e.g. `FPT`, `VN30`.
fn find_ticker(text: &str) -> Option<String> {
    text.split_whitespace().map(clean_token).find(|token| {
        (2..=5).contains(&token.len())
            && token.chars().any(|c| c.is_ascii_uppercase())
            && token
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
    })
}
