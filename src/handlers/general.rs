//! General-knowledge handler
//!
//! Answers straight from the model. No external data is consulted.

use crate::config::DEFAULT_LANGUAGE;
use crate::graph::Node;
use crate::llm::TextGenerator;
use crate::models::{RouterState, StateField, StateUpdate};
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;

pub const NODE_NAME: &str = "general_assistant";

/// General node: writes `response`.
pub struct GeneralAssistantHandler {
    generator: Arc<dyn TextGenerator>,
    instruction: String,
}

impl GeneralAssistantHandler {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self::with_language(generator, DEFAULT_LANGUAGE)
    }

    pub fn with_language(generator: Arc<dyn TextGenerator>, language: &str) -> Self {
        Self {
            generator,
            instruction: build_general_prompt(language),
        }
    }
}

#[async_trait]
impl Node for GeneralAssistantHandler {
    fn name(&self) -> &'static str {
        NODE_NAME
    }

    fn writes(&self) -> &'static [StateField] {
        &[StateField::Response]
    }

    async fn run(&self, state: &RouterState) -> Result<StateUpdate> {
        let answer = self
            .generator
            .generate(&self.instruction, state.query())
            .await?;
        Ok(StateUpdate::response(answer.trim()))
    }
}

pub fn build_general_prompt(language: &str) -> String {
    format!(
        "You're a friendly assistant and your goal is to answer general questions in {}.\n\
         Only answer from reliable, well-established knowledge; don't provide any unchecked information.\n\
         Just say that you don't know if you don't have enough information.",
        language
    )
}
