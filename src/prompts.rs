//! System instructions shared by the nodes and the offline generator

/// Classifier instruction; the answer is one label.
pub const CLASSIFICATION_PROMPT: &str = r#"You are an expert in categorizing user queries for proper routing.

Categories:
- QUANT: Questions related to stocks (prices, trading sessions, volumes of a listed company).
- GENERAL: Static knowledge, definitions, explanations, or questions about well-established facts (e.g., historical facts, math, theoretical concepts).

Return only one word: QUANT or GENERAL."#;

/// Symbol extraction instruction; the answer is one ticker.
pub const SYMBOL_EXTRACTION_PROMPT: &str = r#"You are an expert in identifying the symbols of the stocks in question.
Return only the symbol, as a single word.

For example:
Query: Tell me the latest price of stock code FPT.
Return: FPT"#;
