//! Stock Query Router
//!
//! A conversational router that:
//! - Classifies each query as a stock question or general knowledge
//! - Answers stock questions from the latest daily quote
//! - Answers everything else straight from the language model
//! - Degrades to an "unavailable data" answer when quotes cannot be found
//!
//! GRAPH:
//! QUERY → CLASSIFY → ROUTE → (QUANT | GENERAL) → RESPONSE

pub mod agent;
pub mod api;
pub mod classifier;
pub mod config;
pub mod error;
pub mod formatting;
pub mod graph;
pub mod handlers;
pub mod llm;
pub mod models;
pub mod prompts;
pub mod quotes;

pub use error::Result;

// Re-export common types
pub use agent::{QueryRouter, RouterSettings};
pub use error::RouterError;
pub use models::*;
