//! Display rules for market data
//!
//! The quote source reports prices in thousands of VND. These helpers
//! render quotes the way the market update answers present them, so the
//! rules are enforced in code rather than only described in the prompt.

use chrono::NaiveDate;

use crate::models::{Quote, UNAVAILABLE_DATE};

/// Source prices are quoted in thousands of VND.
pub const PRICE_SCALE: f64 = 1000.0;
pub const CURRENCY_SUFFIX: &str = "VND";
pub const VOLUME_SUFFIX: &str = "shares traded";
pub const MARKET_UPDATE_PREFIX: &str = "[Market Update]";

/// `DD/MM/YYYY`, or `N/A` when there is no trading date.
pub fn format_date(date: Option<NaiveDate>) -> String {
    match date {
        Some(d) => d.format("%d/%m/%Y").to_string(),
        None => UNAVAILABLE_DATE.to_string(),
    }
}

/// `40.4` → `"40,400 VND"`. Rounded to whole VND.
pub fn format_price(raw: f64) -> String {
    let scaled = (raw * PRICE_SCALE).round();
    let grouped = if scaled < 0.0 {
        format!("-{}", group_thousands(scaled.abs() as u64))
    } else {
        group_thousands(scaled as u64)
    };
    format!("{} {}", grouped, CURRENCY_SUFFIX)
}

/// `1234567` → `"1,234,567 shares traded"`.
pub fn format_volume(volume: u64) -> String {
    format!("{} {}", group_thousands(volume), VOLUME_SUFFIX)
}

pub fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);

    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }

    out
}

/// Prefix `text` with the market update marker unless it already has it.
pub fn ensure_market_update_prefix(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.starts_with(MARKET_UPDATE_PREFIX) {
        trimmed.to_string()
    } else {
        format!("{} {}", MARKET_UPDATE_PREFIX, trimmed)
    }
}

/// Quote fields rendered with the display rules above.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedQuote {
    pub date: String,
    pub open: String,
    pub close: String,
    pub high: String,
    pub low: String,
    pub volume: String,
}

impl From<&Quote> for FormattedQuote {
    fn from(quote: &Quote) -> Self {
        Self {
            date: format_date(quote.latest_date),
            open: format_price(quote.open_price),
            close: format_price(quote.close_price),
            high: format_price(quote.high_price),
            low: format_price(quote.low_price),
            volume: format_volume(quote.volume),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_price_scales_by_thousand() {
        assert_eq!(format_price(40.4), "40,400 VND");
        assert_eq!(format_price(153.4), "153,400 VND");
        assert_eq!(format_price(1234.5), "1,234,500 VND");
        assert_eq!(format_price(0.0), "0 VND");
        assert_eq!(format_price(12.3456), "12,346 VND");
    }

    #[test]
    fn test_format_date() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 5);
        assert_eq!(format_date(date), "05/03/2024");
        assert_eq!(format_date(None), "N/A");
    }

    #[test]
    fn test_format_volume() {
        assert_eq!(format_volume(1_234_567), "1,234,567 shares traded");
        assert_eq!(format_volume(999), "999 shares traded");
        assert_eq!(format_volume(0), "0 shares traded");
    }

    #[test]
    fn test_group_thousands_boundaries() {
        assert_eq!(group_thousands(1_000), "1,000");
        assert_eq!(group_thousands(100_000), "100,000");
        assert_eq!(group_thousands(1_000_000), "1,000,000");
    }

    #[test]
    fn test_market_update_prefix() {
        assert_eq!(
            ensure_market_update_prefix("FPT closed higher."),
            "[Market Update] FPT closed higher."
        );
        assert_eq!(
            ensure_market_update_prefix("  [Market Update] FPT closed higher.\n"),
            "[Market Update] FPT closed higher."
        );
    }

    #[test]
    fn test_formatted_unavailable_quote() {
        let formatted = FormattedQuote::from(&Quote::unavailable("ZZZZ"));
        assert_eq!(formatted.date, "N/A");
        assert_eq!(formatted.close, "0 VND");
        assert_eq!(formatted.volume, "0 shares traded");
    }
}
