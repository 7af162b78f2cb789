//! Runtime configuration loaded from the environment
//!
//! Binaries call `dotenv::dotenv()` first so a local `.env` works too.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::RouterError;
use crate::Result;

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_QUOTE_API_BASE_URL: &str = "https://api-finfo.vndirect.com.vn";
pub const DEFAULT_LANGUAGE: &str = "Vietnamese";
pub const DEFAULT_PORT: u16 = 8000;
/// Upper bound for `QUOTE_LOOKBACK_DAYS`, ten years.
pub const MAX_LOOKBACK_DAYS: u32 = 3650;

#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Empty means no key; binaries then fall back to the offline generator.
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub llm_timeout: Duration,
    pub llm_max_retries: u32,
    pub quote_api_base_url: String,
    pub quote_timeout: Duration,
    pub lookback_days: u32,
    /// Language the general assistant answers in.
    pub language: String,
    pub port: u16,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            gemini_api_key: String::new(),
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            llm_timeout: Duration::from_secs(120),
            llm_max_retries: 2,
            quote_api_base_url: DEFAULT_QUOTE_API_BASE_URL.to_string(),
            quote_timeout: Duration::from_secs(30),
            lookback_days: 10,
            language: DEFAULT_LANGUAGE.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl RouterConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unset or blank keys keep defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = Self::default();

        Ok(Self {
            gemini_api_key: get("GEMINI_API_KEY").unwrap_or_default(),
            gemini_model: get("GEMINI_MODEL").unwrap_or(defaults.gemini_model),
            llm_timeout: match get("LLM_TIMEOUT_SECS") {
                Some(v) => Duration::from_secs(parse_number("LLM_TIMEOUT_SECS", &v)?),
                None => defaults.llm_timeout,
            },
            llm_max_retries: match get("LLM_MAX_RETRIES") {
                Some(v) => parse_number("LLM_MAX_RETRIES", &v)?,
                None => defaults.llm_max_retries,
            },
            quote_api_base_url: get("QUOTE_API_BASE_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or(defaults.quote_api_base_url),
            quote_timeout: match get("QUOTE_TIMEOUT_SECS") {
                Some(v) => Duration::from_secs(parse_number("QUOTE_TIMEOUT_SECS", &v)?),
                None => defaults.quote_timeout,
            },
            lookback_days: match get("QUOTE_LOOKBACK_DAYS") {
                Some(v) => parse_lookback_days(&v)?,
                None => defaults.lookback_days,
            },
            language: get("ASSISTANT_LANGUAGE").unwrap_or(defaults.language),
            port: match get("PORT").or_else(|| get("API_PORT")) {
                Some(v) => parse_number("PORT", &v)?,
                None => defaults.port,
            },
        })
    }

    pub fn has_gemini_key(&self) -> bool {
        !self.gemini_api_key.is_empty()
    }
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| {
        RouterError::ConfigError(format!("{} must be a non-negative integer, got {:?}", key, value))
    })
}

fn parse_lookback_days(value: &str) -> Result<u32> {
    let days: u32 = parse_number("QUOTE_LOOKBACK_DAYS", value)?;
    if days > MAX_LOOKBACK_DAYS {
        return Err(RouterError::ConfigError(format!(
            "QUOTE_LOOKBACK_DAYS must be at most {}, got {}",
            MAX_LOOKBACK_DAYS, days
        )));
    }
    Ok(days)
}
