//! Intent Classifier
//!
//! Asks the model to label a query as either:
//! - QUANT: about a listed stock (e.g., "what is the current price of FPT?")
//! - GENERAL: static knowledge (e.g., "what is the boiling point of water?")
//!
//! The answer is trimmed and parsed but not validated here; an
//! off-vocabulary label becomes [`Intent::Unrecognized`] and is rejected
//! by the routing step.

use crate::graph::Node;
use crate::llm::TextGenerator;
use crate::models::{Intent, RouterState, StateField, StateUpdate};
use crate::prompts::CLASSIFICATION_PROMPT;
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

pub const NODE_NAME: &str = "router";

/// Classifier node: writes `intent`.
pub struct IntentClassifier {
    generator: Arc<dyn TextGenerator>,
}

impl IntentClassifier {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// One model call; the raw answer is trimmed and parsed.
    pub async fn classify(&self, query: &str) -> Result<Intent> {
        let raw = self
            .generator
            .generate(CLASSIFICATION_PROMPT, query)
            .await?;

        let intent = Intent::parse(&raw);
        info!(intent = %intent, recognized = intent.is_recognized(), "Query classified");

        Ok(intent)
    }
}

#[async_trait]
impl Node for IntentClassifier {
    fn name(&self) -> &'static str {
        NODE_NAME
    }

    fn writes(&self) -> &'static [StateField] {
        &[StateField::Intent]
    }

    async fn run(&self, state: &RouterState) -> Result<StateUpdate> {
        let intent = self.classify(state.query()).await?;
        Ok(StateUpdate::intent(intent))
    }
}

/// Routing function: the branch is a pure function of `state.intent`.
pub fn route_by_intent(state: &RouterState) -> Intent {
    state
        .intent()
        .cloned()
        .unwrap_or_else(|| Intent::Unrecognized(String::new()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RouterError;
    use crate::llm::MockGenerator;

    /// Always answers with the same text.
    struct FixedAnswer(&'static str);

    #[async_trait]
    impl TextGenerator for FixedAnswer {
        async fn generate(&self, _system: &str, _user: &str) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    struct Failing;

    #[async_trait]
    impl TextGenerator for Failing {
        async fn generate(&self, _system: &str, _user: &str) -> Result<String> {
            Err(RouterError::LlmError("quota exhausted".to_string()))
        }
    }

    #[tokio::test]
    async fn test_classifies_with_mock_generator() {
        let classifier = IntentClassifier::new(Arc::new(MockGenerator));

        let cases = vec![
            ("What is the current price of FPT?", Intent::Quant),
            ("How much volume did VNM trade today?", Intent::Quant),
            ("What is the boiling point of water at sea level?", Intent::General),
            ("explain the theory of relativity", Intent::General),
        ];

        for (query, expected) in cases {
            assert_eq!(classifier.classify(query).await.unwrap(), expected, "{}", query);
        }
    }

    #[tokio::test]
    async fn test_trims_model_output() {
        let classifier = IntentClassifier::new(Arc::new(FixedAnswer("  QUANT \n")));
        assert_eq!(classifier.classify("anything").await.unwrap(), Intent::Quant);
    }

    #[tokio::test]
    async fn test_off_vocabulary_label_is_kept() {
        let classifier = IntentClassifier::new(Arc::new(FixedAnswer("Category: QUANT")));
        assert_eq!(
            classifier.classify("anything").await.unwrap(),
            Intent::Unrecognized("Category: QUANT".to_string())
        );
    }

    #[tokio::test]
    async fn test_generator_failure_propagates() {
        let classifier = IntentClassifier::new(Arc::new(Failing));
        let err = classifier.run(&RouterState::new("q")).await.unwrap_err();
        assert!(matches!(err, RouterError::LlmError(_)));
    }

    #[test]
    fn test_route_by_intent() {
        let mut state = RouterState::new("q");
        assert!(!route_by_intent(&state).is_recognized());

        state.apply(StateUpdate::intent(Intent::General)).unwrap();
        assert_eq!(route_by_intent(&state), Intent::General);
    }
}
