//! Branch handlers
//!
//! One node per recognized intent. Each runs after the classifier and
//! produces the final `response`; its outgoing edge is always END.

pub mod general;
pub mod quant;

pub use general::GeneralAssistantHandler;
pub use quant::QuantPriceHandler;
