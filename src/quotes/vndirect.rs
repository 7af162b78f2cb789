//! VNDirect finfo quote provider
//!
//! Daily prices for Vietnamese listed stocks. Prices come back in
//! thousands of VND; matched volume is `nmVolume`.

use super::{latest_quote, DailyBar, QuoteProvider};
use crate::error::RouterError;
use crate::models::{Quote, QuoteWindow};
use crate::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

const STOCK_PRICES_PATH: &str = "/v4/stock_prices";
const PAGE_SIZE: &str = "100";

pub struct VndirectQuoteProvider {
    client: Client,
    base_url: String,
}

impl VndirectQuoteProvider {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(8)
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn fetch_bars(&self, symbol: &str, window: QuoteWindow) -> Result<Vec<DailyBar>> {
        let url = format!("{}{}", self.base_url, STOCK_PRICES_PATH);
        let filter = build_filter(symbol, window);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("sort", "date"),
                ("q", filter.as_str()),
                ("size", PAGE_SIZE),
                ("page", "1"),
            ])
            .send()
            .await
            .map_err(|e| RouterError::QuoteError(format!("request failed for {}: {}", symbol, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RouterError::QuoteError(format!(
                "quote API returned {} for {}: {}",
                status, symbol, body
            )));
        }

        let body = response.text().await?;
        parse_bars(&body)
    }
}

#[async_trait]
impl QuoteProvider for VndirectQuoteProvider {
    async fn lookup(&self, symbol: &str, window: QuoteWindow) -> Quote {
        let symbol = symbol.trim().to_uppercase();
        if symbol.is_empty() {
            warn!("Quote lookup skipped: empty symbol");
            return Quote::unavailable(symbol);
        }

        match self.fetch_bars(&symbol, window).await {
            Ok(bars) => {
                debug!(symbol = %symbol, bars = bars.len(), "Quote bars received");
                let quote = latest_quote(&symbol, window, &bars);
                if !quote.is_available() {
                    warn!(symbol = %symbol, start = %window.start, end = %window.end, "No quote data in window");
                }
                quote
            }
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "Quote lookup failed, returning unavailable quote");
                Quote::unavailable(symbol)
            }
        }
    }
}

/// `code:FPT~date:gte:2024-03-05~date:lte:2024-03-15`
fn build_filter(symbol: &str, window: QuoteWindow) -> String {
    format!(
        "code:{}~date:gte:{}~date:lte:{}",
        symbol,
        window.start.format("%Y-%m-%d"),
        window.end.format("%Y-%m-%d")
    )
}

#[derive(Debug, Deserialize)]
struct StockPricesPage {
    #[serde(default)]
    data: Vec<StockPriceRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StockPriceRecord {
    code: String,
    date: NaiveDate,
    open: f64,
    close: f64,
    high: f64,
    low: f64,
    #[serde(default)]
    nm_volume: f64,
}

fn parse_bars(body: &str) -> Result<Vec<DailyBar>> {
    let page: StockPricesPage = serde_json::from_str(body)?;

    Ok(page
        .data
        .into_iter()
        .map(|r| DailyBar {
            symbol: r.code,
            date: r.date,
            open: r.open,
            close: r.close,
            high: r.high,
            low: r.low,
            volume: r.nm_volume.max(0.0) as u64,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r#"{
        "data": [
            {"code":"FPT","date":"2024-03-15","time":"15:04:05","floor":"HOSE","open":110.5,"high":112.0,"low":109.8,"close":111.2,"nmVolume":2345678.0},
            {"code":"FPT","date":"2024-03-14","time":"15:04:05","floor":"HOSE","open":109.0,"high":110.9,"low":108.5,"close":110.4,"nmVolume":1987000.0}
        ],
        "currentPage": 1,
        "size": 100,
        "totalElements": 2,
        "totalPages": 1
    }"#;

    #[test]
    fn test_build_filter() {
        let window = QuoteWindow::trailing(NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(), 10);
        assert_eq!(
            build_filter("FPT", window),
            "code:FPT~date:gte:2024-03-05~date:lte:2024-03-15"
        );
    }

    #[test]
    fn test_parse_bars_and_pick_latest() {
        let bars = parse_bars(FIXTURE).unwrap();
        assert_eq!(bars.len(), 2);

        let window = QuoteWindow::trailing(NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(), 10);
        let quote = latest_quote("FPT", window, &bars);
        assert_eq!(quote.date_label(), "2024-03-15");
        assert_eq!(quote.close_price, 111.2);
        assert_eq!(quote.volume, 2_345_678);
    }

    #[test]
    fn test_parse_empty_page() {
        let bars = parse_bars(r#"{"data":[],"totalElements":0}"#).unwrap();
        assert!(bars.is_empty());
    }

    #[test]
    fn test_parse_garbage_is_error() {
        assert!(parse_bars("<html>maintenance</html>").is_err());
    }

    #[tokio::test]
    async fn test_unreachable_source_yields_unavailable_quote() {
        // nothing listens on port 9; the lookup must degrade, not fail
        let provider =
            VndirectQuoteProvider::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        let window = QuoteWindow::trailing(NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(), 10);

        let quote = provider.lookup("fpt", window).await;
        assert_eq!(quote, Quote::unavailable("FPT"));
    }
}
