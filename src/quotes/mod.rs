//! Quote providers
//!
//! A provider turns a symbol and a date window into the latest daily bar.
//! Lookups never fail from the caller's point of view: an unknown symbol,
//! an empty window or a broken upstream all yield [`Quote::unavailable`].

use crate::models::{Quote, QuoteWindow};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Mutex;

pub mod vndirect;
pub use vndirect::VndirectQuoteProvider;

/// Trait for market data lookup
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    async fn lookup(&self, symbol: &str, window: QuoteWindow) -> Quote;
}

/// One trading day for one symbol, in source units.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyBar {
    pub symbol: String,
    pub date: NaiveDate,
    pub open: f64,
    pub close: f64,
    pub high: f64,
    pub low: f64,
    pub volume: u64,
}

impl From<&DailyBar> for Quote {
    fn from(bar: &DailyBar) -> Self {
        Quote {
            symbol: bar.symbol.clone(),
            latest_date: Some(bar.date),
            open_price: bar.open,
            close_price: bar.close,
            high_price: bar.high,
            low_price: bar.low,
            volume: bar.volume,
        }
    }
}

/// Most recent bar inside `window`, or the unavailable quote.
pub fn latest_quote(symbol: &str, window: QuoteWindow, bars: &[DailyBar]) -> Quote {
    bars.iter()
        .filter(|bar| window.contains(bar.date))
        .max_by_key(|bar| bar.date)
        .map(Quote::from)
        .unwrap_or_else(|| Quote::unavailable(symbol))
}

/// In-memory provider for development & testing.
///
/// Records every lookup so callers can assert on what was requested.
#[derive(Default)]
pub struct StaticQuoteProvider {
    bars: HashMap<String, Vec<DailyBar>>,
    lookups: Mutex<Vec<(String, QuoteWindow)>>,
}

impl StaticQuoteProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bar(mut self, bar: DailyBar) -> Self {
        self.bars
            .entry(bar.symbol.to_uppercase())
            .or_default()
            .push(bar);
        self
    }

    /// Every `(symbol, window)` pair looked up so far, in call order.
    pub fn lookups(&self) -> Vec<(String, QuoteWindow)> {
        self.lookups
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    pub fn lookup_count(&self) -> usize {
        self.lookups.lock().map(|calls| calls.len()).unwrap_or(0)
    }
}

#[async_trait]
impl QuoteProvider for StaticQuoteProvider {
    async fn lookup(&self, symbol: &str, window: QuoteWindow) -> Quote {
        if let Ok(mut calls) = self.lookups.lock() {
            calls.push((symbol.to_string(), window));
        }

        match self.bars.get(&symbol.to_uppercase()) {
            Some(bars) => latest_quote(symbol, window, bars),
            None => Quote::unavailable(symbol),
        }
    }
}
