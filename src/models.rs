//! Core data models for the query router

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::RouterError;
use crate::Result;

//
// ================= Intent =================
//

pub const QUANT_LABEL: &str = "QUANT";
pub const GENERAL_LABEL: &str = "GENERAL";

/// Category assigned to a query by the classifier node.
///
/// Labels are matched after trimming and ignoring ASCII case. Anything
/// else is kept verbatim in `Unrecognized` so routing can report it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum Intent {
    /// Question about a listed stock; answered from market data.
    Quant,
    /// Static knowledge; answered directly by the model.
    General,
    Unrecognized(String),
}

impl Intent {
    /// Every intent the routing table must cover.
    pub const RECOGNIZED: [Intent; 2] = [Intent::Quant, Intent::General];

    pub fn parse(raw: &str) -> Self {
        let label = raw.trim();
        if label.eq_ignore_ascii_case(QUANT_LABEL) {
            Intent::Quant
        } else if label.eq_ignore_ascii_case(GENERAL_LABEL) {
            Intent::General
        } else {
            Intent::Unrecognized(label.to_string())
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Intent::Quant => QUANT_LABEL,
            Intent::General => GENERAL_LABEL,
            Intent::Unrecognized(label) => label,
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, Intent::Unrecognized(_))
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl From<String> for Intent {
    fn from(value: String) -> Self {
        Intent::parse(&value)
    }
}

impl From<Intent> for String {
    fn from(value: Intent) -> Self {
        value.label().to_string()
    }
}

//
// ================= Router State =================
//

/// Fields of [`RouterState`] a node may write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateField {
    Intent,
    ExtractedKey,
    Response,
}

impl fmt::Display for StateField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StateField::Intent => "intent",
            StateField::ExtractedKey => "extracted_key",
            StateField::Response => "response",
        };
        write!(f, "{}", s)
    }
}

/// State threaded through one graph invocation.
///
/// Created fresh per query. `query` cannot change after construction and
/// every other field is written at most once, through [`RouterState::apply`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouterState {
    query: String,
    intent: Option<Intent>,
    extracted_key: Option<String>,
    response: Option<String>,
}

impl RouterState {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            intent: None,
            extracted_key: None,
            response: None,
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn intent(&self) -> Option<&Intent> {
        self.intent.as_ref()
    }

    pub fn extracted_key(&self) -> Option<&str> {
        self.extracted_key.as_deref()
    }

    pub fn response(&self) -> Option<&str> {
        self.response.as_deref()
    }

    /// Merge a node's partial update by field-wise assignment.
    ///
    /// Nothing is written unless every field in the update is still unset.
    pub fn apply(&mut self, update: StateUpdate) -> Result<()> {
        let conflicts: Vec<String> = update
            .fields()
            .into_iter()
            .filter(|field| self.is_set(*field))
            .map(|field| field.to_string())
            .collect();

        if !conflicts.is_empty() {
            return Err(RouterError::StateConflict(format!(
                "field(s) already written: {}",
                conflicts.join(", ")
            )));
        }

        if let Some(intent) = update.intent {
            self.intent = Some(intent);
        }
        if let Some(key) = update.extracted_key {
            self.extracted_key = Some(key);
        }
        if let Some(response) = update.response {
            self.response = Some(response);
        }

        Ok(())
    }

    fn is_set(&self, field: StateField) -> bool {
        match field {
            StateField::Intent => self.intent.is_some(),
            StateField::ExtractedKey => self.extracted_key.is_some(),
            StateField::Response => self.response.is_some(),
        }
    }
}

/// Partial update returned by a node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateUpdate {
    pub intent: Option<Intent>,
    pub extracted_key: Option<String>,
    pub response: Option<String>,
}

impl StateUpdate {
    pub fn intent(intent: Intent) -> Self {
        Self {
            intent: Some(intent),
            ..Self::default()
        }
    }

    pub fn response(response: impl Into<String>) -> Self {
        Self {
            response: Some(response.into()),
            ..Self::default()
        }
    }

    pub fn with_extracted_key(mut self, key: impl Into<String>) -> Self {
        self.extracted_key = Some(key.into());
        self
    }

    /// Fields this update writes.
    pub fn fields(&self) -> Vec<StateField> {
        let mut fields = Vec::with_capacity(3);
        if self.intent.is_some() {
            fields.push(StateField::Intent);
        }
        if self.extracted_key.is_some() {
            fields.push(StateField::ExtractedKey);
        }
        if self.response.is_some() {
            fields.push(StateField::Response);
        }
        fields
    }
}

//
// ================= Quotes =================
//

/// Rendering of a missing trading date.
pub const UNAVAILABLE_DATE: &str = "N/A";

/// Inclusive date range requested from a quote provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl QuoteWindow {
    /// Window of `days` days ending at `end`.
    /// `days` before `end` through `end`; clamps at the earliest
    /// representable date.
    pub fn trailing(end: NaiveDate, days: u32) -> Self {
        Self {
            start: end
                .checked_sub_signed(Duration::days(i64::from(days)))
                .unwrap_or(NaiveDate::MIN),
            end,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Latest daily bar for one symbol.
///
/// Prices are in the source's unit (thousands of VND). When the source
/// cannot resolve the symbol the quote is [`Quote::unavailable`]: zero
/// prices and volume, no date. That is a valid result, not an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    pub latest_date: Option<NaiveDate>,
    pub open_price: f64,
    pub close_price: f64,
    pub high_price: f64,
    pub low_price: f64,
    pub volume: u64,
}

impl Quote {
    pub fn unavailable(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            latest_date: None,
            open_price: 0.0,
            close_price: 0.0,
            high_price: 0.0,
            low_price: 0.0,
            volume: 0,
        }
    }

    pub fn is_available(&self) -> bool {
        self.latest_date.is_some()
    }

    /// `YYYY-MM-DD`, or [`UNAVAILABLE_DATE`].
    pub fn date_label(&self) -> String {
        self.latest_date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| UNAVAILABLE_DATE.to_string())
    }
}

//
// ================= Final Result =================
//

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub response: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intent_parse() {
        assert_eq!(Intent::parse("QUANT"), Intent::Quant);
        assert_eq!(Intent::parse("  general\n"), Intent::General);
        assert_eq!(
            Intent::parse(" Weather "),
            Intent::Unrecognized("Weather".to_string())
        );
        assert!(!Intent::parse("").is_recognized());
    }

    #[test]
    fn test_intent_serializes_as_label() {
        let json = serde_json::to_string(&Intent::Quant).unwrap();
        assert_eq!(json, "\"QUANT\"");
        let back: Intent = serde_json::from_str("\"general\"").unwrap();
        assert_eq!(back, Intent::General);
    }

    #[test]
    fn test_apply_merges_fields() {
        let mut state = RouterState::new("What is the current price of FPT?");
        state.apply(StateUpdate::intent(Intent::Quant)).unwrap();
        state
            .apply(StateUpdate::response("ok").with_extracted_key("FPT"))
            .unwrap();

        assert_eq!(state.query(), "What is the current price of FPT?");
        assert_eq!(state.intent(), Some(&Intent::Quant));
        assert_eq!(state.extracted_key(), Some("FPT"));
        assert_eq!(state.response(), Some("ok"));
    }

    #[test]
    fn test_apply_rejects_second_write() {
        let mut state = RouterState::new("q");
        state.apply(StateUpdate::response("first")).unwrap();

        let err = state
            .apply(StateUpdate::response("second").with_extracted_key("X"))
            .unwrap_err();
        assert!(matches!(err, RouterError::StateConflict(_)));
        // rejected updates leave the state untouched
        assert_eq!(state.response(), Some("first"));
        assert_eq!(state.extracted_key(), None);
    }

    #[test]
    fn test_trailing_window() {
        let end = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        let window = QuoteWindow::trailing(end, 10);
        assert_eq!(window.start, NaiveDate::from_ymd_opt(2024, 3, 5).unwrap());
        assert!(window.contains(end));
        assert!(!window.contains(NaiveDate::from_ymd_opt(2024, 3, 4).unwrap()));
    }

    #[test]
    fn test_trailing_window_clamps_huge_lookback() {
        let end = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        let window = QuoteWindow::trailing(end, u32::MAX);
        assert_eq!(window.start, NaiveDate::MIN);
        assert_eq!(window.end, end);
    }

    #[test]
    fn test_unavailable_quote() {
        let quote = Quote::unavailable("ZZZZ");
        assert!(!quote.is_available());
        assert_eq!(quote.date_label(), UNAVAILABLE_DATE);
        assert_eq!(quote.volume, 0);
    }
}
