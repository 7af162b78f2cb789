//! Data-backed handler for stock questions
//!
//! EXTRACT SYMBOL → LOOKUP QUOTE → PHRASE MARKET UPDATE
//!
//! A failed or empty lookup is not an error here: the provider hands back
//! the unavailable quote and it is phrased like any other data.

use crate::formatting::{
    ensure_market_update_prefix, FormattedQuote, CURRENCY_SUFFIX, MARKET_UPDATE_PREFIX,
    VOLUME_SUFFIX,
};
use crate::graph::Node;
use crate::llm::TextGenerator;
use crate::models::{Quote, QuoteWindow, RouterState, StateField, StateUpdate, UNAVAILABLE_DATE};
use crate::prompts::SYMBOL_EXTRACTION_PROMPT;
use crate::quotes::QuoteProvider;
use crate::Result;
use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use std::sync::Arc;
use tracing::{debug, info};

pub const NODE_NAME: &str = "quant_last_price";

pub const DEFAULT_LOOKBACK_DAYS: u32 = 10;

/// Data-backed node: writes `extracted_key` and `response`.
pub struct QuantPriceHandler {
    generator: Arc<dyn TextGenerator>,
    quotes: Arc<dyn QuoteProvider>,
    lookback_days: u32,
    reference_date: Option<NaiveDate>,
}

impl QuantPriceHandler {
    pub fn new(generator: Arc<dyn TextGenerator>, quotes: Arc<dyn QuoteProvider>) -> Self {
        Self {
            generator,
            quotes,
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            reference_date: None,
        }
    }

    pub fn with_lookback_days(mut self, days: u32) -> Self {
        self.lookback_days = days;
        self
    }

    /// Pin the window's end date instead of using today's local date.
    pub fn with_reference_date(mut self, date: NaiveDate) -> Self {
        self.reference_date = Some(date);
        self
    }

    fn window(&self) -> QuoteWindow {
        let end = self
            .reference_date
            .unwrap_or_else(|| Local::now().date_naive());
        QuoteWindow::trailing(end, self.lookback_days)
    }

    /// Model answer, trimmed and upper-cased.
    pub async fn extract_symbol(&self, query: &str) -> Result<String> {
        let raw = self
            .generator
            .generate(SYMBOL_EXTRACTION_PROMPT, query)
            .await?;
        Ok(raw.trim().to_uppercase())
    }

    async fn phrase(&self, query: &str, quote: &Quote) -> Result<String> {
        let instruction = build_market_update_prompt(query);
        let content = build_quote_message(query, quote);

        let answer = self.generator.generate(&instruction, &content).await?;
        Ok(ensure_market_update_prefix(&answer))
    }
}

#[async_trait]
impl Node for QuantPriceHandler {
    fn name(&self) -> &'static str {
        NODE_NAME
    }

    fn writes(&self) -> &'static [StateField] {
        &[StateField::ExtractedKey, StateField::Response]
    }

    async fn run(&self, state: &RouterState) -> Result<StateUpdate> {
        let symbol = self.extract_symbol(state.query()).await?;
        let window = self.window();

        info!(symbol = %symbol, start = %window.start, end = %window.end, "Looking up quote");

        let quote = self.quotes.lookup(&symbol, window).await;
        debug!(symbol = %symbol, available = quote.is_available(), "Quote resolved");

        let response = self.phrase(state.query(), &quote).await?;

        Ok(StateUpdate::response(response).with_extracted_key(symbol))
    }
}

/// System instruction carrying the display rules.
pub fn build_market_update_prompt(query: &str) -> String {
    format!(
        r#"You are a stock market analyst. Transform the raw stock data into natural language, answering in the same language as this query: "{query}"

Formatting rules:
1. Date format: DD/MM/YYYY. If the date is {na}, say that no recent trading data is available.
2. Currency: prices are quoted in thousands of VND (e.g., 153.4 means 153,400). Multiply by 1,000, format with commas as thousands separators and add "{currency}" at the end (e.g., 40.4 -> 40,400 {currency}).
3. Volume: format with commas + "{volume}".
4. Always start with "{prefix}".
The "Formatted" lines already follow these rules; reuse them verbatim."#,
        query = query,
        na = UNAVAILABLE_DATE,
        currency = CURRENCY_SUFFIX,
        volume = VOLUME_SUFFIX,
        prefix = MARKET_UPDATE_PREFIX,
    )
}

/// User message: the query plus every quote field, raw and formatted.
pub fn build_quote_message(query: &str, quote: &Quote) -> String {
    let formatted = FormattedQuote::from(quote);

    format!(
        "Query: {}\n\
         Symbol: {}\n\
         Date: {}\n\
         Opening Price: {}\n\
         Closing Price: {}\n\
         High Price: {}\n\
         Low Price: {}\n\
         Volume: {}\n\
         \n\
         Formatted Date: {}\n\
         Formatted Opening Price: {}\n\
         Formatted Closing Price: {}\n\
         Formatted High Price: {}\n\
         Formatted Low Price: {}\n\
         Formatted Volume: {}",
        query,
        quote.symbol,
        quote.date_label(),
        quote.open_price,
        quote.close_price,
        quote.high_price,
        quote.low_price,
        quote.volume,
        formatted.date,
        formatted.open,
        formatted.close,
        formatted.high,
        formatted.low,
        formatted.volume,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RouterError;
    use crate::llm::MockGenerator;
    use crate::quotes::{DailyBar, StaticQuoteProvider};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
    }

    fn fpt_provider() -> Arc<StaticQuoteProvider> {
        Arc::new(StaticQuoteProvider::new().with_bar(DailyBar {
            symbol: "FPT".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 3, 14).unwrap(),
            open: 110.5,
            close: 111.2,
            high: 112.0,
            low: 109.8,
            volume: 2_345_678,
        }))
    }

    fn handler(quotes: Arc<StaticQuoteProvider>) -> QuantPriceHandler {
        QuantPriceHandler::new(Arc::new(MockGenerator), quotes).with_reference_date(today())
    }

    #[tokio::test]
    async fn test_extracts_symbol_and_phrases_quote() {
        let quotes = fpt_provider();
        let update = handler(quotes.clone())
            .run(&RouterState::new("What is the current price of FPT?"))
            .await
            .unwrap();

        assert_eq!(update.extracted_key.as_deref(), Some("FPT"));
        let response = update.response.unwrap();
        assert!(response.starts_with(MARKET_UPDATE_PREFIX));
        assert!(response.contains("14/03/2024"));
        assert!(response.contains("111,200 VND"));
        assert!(response.contains("2,345,678 shares traded"));

        let lookups = quotes.lookups();
        assert_eq!(lookups.len(), 1);
        assert_eq!(lookups[0].0, "FPT");
        assert_eq!(lookups[0].1, QuoteWindow::trailing(today(), 10));
    }

    #[tokio::test]
    async fn test_symbol_is_uppercased() {
        let update = handler(fpt_provider())
            .run(&RouterState::new("closing price of fpt"))
            .await
            .unwrap();
        assert_eq!(update.extracted_key.as_deref(), Some("FPT"));
        assert!(update.response.unwrap().contains("111,200 VND"));
    }

    #[tokio::test]
    async fn test_unknown_symbol_degrades_to_unavailable_data() {
        let quotes = fpt_provider();
        let update = handler(quotes.clone())
            .run(&RouterState::new("What is the price of ZZZZ?"))
            .await
            .unwrap();

        assert_eq!(update.extracted_key.as_deref(), Some("ZZZZ"));
        let response = update.response.unwrap();
        assert!(response.contains("Date: N/A"));
        assert!(response.contains("0 VND"));
        assert!(response.contains("0 shares traded"));
        assert_eq!(quotes.lookup_count(), 1);
    }

    #[tokio::test]
    async fn test_custom_lookback_window() {
        let quotes = fpt_provider();
        handler(quotes.clone())
            .with_lookback_days(3)
            .run(&RouterState::new("price of FPT"))
            .await
            .unwrap();

        let window = quotes.lookups()[0].1;
        assert_eq!(window.start, NaiveDate::from_ymd_opt(2024, 3, 12).unwrap());
        assert_eq!(window.end, today());
    }

    struct NoPrefix;

    #[async_trait]
    impl TextGenerator for NoPrefix {
        async fn generate(&self, system: &str, _user: &str) -> Result<String> {
            if system == SYMBOL_EXTRACTION_PROMPT {
                Ok(" fpt\n".to_string())
            } else {
                Ok("FPT closed at 111,200 VND.".to_string())
            }
        }
    }

    #[tokio::test]
    async fn test_prefix_is_enforced() {
        let update = QuantPriceHandler::new(Arc::new(NoPrefix), fpt_provider())
            .run(&RouterState::new("FPT?"))
            .await
            .unwrap();
        assert_eq!(
            update.response.as_deref(),
            Some("[Market Update] FPT closed at 111,200 VND.")
        );
    }

    struct FailsOnPhrasing;

    #[async_trait]
    impl TextGenerator for FailsOnPhrasing {
        async fn generate(&self, system: &str, _user: &str) -> Result<String> {
            if system == SYMBOL_EXTRACTION_PROMPT {
                Ok("FPT".to_string())
            } else {
                Err(RouterError::LlmError("timeout".to_string()))
            }
        }
    }

    #[tokio::test]
    async fn test_generation_failure_propagates() {
        let err = QuantPriceHandler::new(Arc::new(FailsOnPhrasing), fpt_provider())
            .run(&RouterState::new("FPT?"))
            .await
            .unwrap_err();
        assert!(matches!(err, RouterError::LlmError(_)));
    }

    #[test]
    fn test_quote_message_lists_every_field() {
        let message = build_quote_message("q", &Quote::unavailable("ZZZZ"));
        for label in [
            "Query:", "Symbol: ZZZZ", "Date: N/A", "Opening Price:", "Closing Price:",
            "High Price:", "Low Price:", "Volume: 0",
        ] {
            assert!(message.contains(label), "missing {}", label);
        }
    }

    #[test]
    fn test_prompt_mentions_rules() {
        let prompt = build_market_update_prompt("Giá FPT?");
        assert!(prompt.contains("Giá FPT?"));
        assert!(prompt.contains("DD/MM/YYYY"));
        assert!(prompt.contains("VND"));
        assert!(prompt.contains(MARKET_UPDATE_PREFIX));
    }
}
