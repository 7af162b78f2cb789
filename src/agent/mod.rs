//! Query router - wires the classifier and branch handlers into one graph
//!
//! router → (QUANT → quant_last_price | GENERAL → general_assistant) → END

use crate::classifier::{self, route_by_intent, IntentClassifier};
use crate::config::RouterConfig;
use crate::error::RouterError;
use crate::graph::{CompiledGraph, StateGraph, END};
use crate::handlers::{general, quant, GeneralAssistantHandler, QuantPriceHandler};
use crate::llm::{GeminiClient, GenerationOptions, MockGenerator, TextGenerator};
use crate::models::{Intent, QueryResponse, RouterState};
use crate::quotes::{QuoteProvider, VndirectQuoteProvider};
use crate::Result;
use std::sync::Arc;
use tracing::{info, warn};

/// Tunables for the graph's nodes.
#[derive(Debug, Clone)]
pub struct RouterSettings {
    pub lookback_days: u32,
    pub language: String,
}

impl Default for RouterSettings {
    fn default() -> Self {
        let config = RouterConfig::default();
        Self {
            lookback_days: config.lookback_days,
            language: config.language,
        }
    }
}

impl From<&RouterConfig> for RouterSettings {
    fn from(config: &RouterConfig) -> Self {
        Self {
            lookback_days: config.lookback_days,
            language: config.language.clone(),
        }
    }
}

/// Entry point for answering queries.
///
/// Safe to share across tasks: every call builds its own state and the
/// graph itself is immutable.
pub struct QueryRouter {
    graph: CompiledGraph,
}

impl QueryRouter {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        quotes: Arc<dyn QuoteProvider>,
        settings: RouterSettings,
    ) -> Result<Self> {
        let classifier = IntentClassifier::new(generator.clone());
        let quant_handler = QuantPriceHandler::new(generator.clone(), quotes)
            .with_lookback_days(settings.lookback_days);
        let general_handler =
            GeneralAssistantHandler::with_language(generator, &settings.language);

        let mut graph = StateGraph::new();
        graph
            .add_node(Arc::new(classifier))
            .add_node(Arc::new(quant_handler))
            .add_node(Arc::new(general_handler))
            .set_entry_point(classifier::NODE_NAME)
            .add_conditional_edges(
                classifier::NODE_NAME,
                route_by_intent,
                vec![
                    (Intent::Quant, quant::NODE_NAME),
                    (Intent::General, general::NODE_NAME),
                ],
            )
            .add_edge(quant::NODE_NAME, END)
            .add_edge(general::NODE_NAME, END);

        Ok(Self {
            graph: graph.compile()?,
        })
    }

    /// Gemini + VNDirect, or the offline generator when no key is set.
    pub fn from_config(config: &RouterConfig) -> Result<Self> {
        let generator: Arc<dyn TextGenerator> = if config.has_gemini_key() {
            let options = GenerationOptions {
                timeout: config.llm_timeout,
                max_retries: config.llm_max_retries,
                ..GenerationOptions::default()
            };
            Arc::new(GeminiClient::new(
                config.gemini_api_key.clone(),
                &config.gemini_model,
                options,
            )?)
        } else {
            warn!("GEMINI_API_KEY not set; answering with the offline mock generator");
            Arc::new(MockGenerator)
        };

        let quotes = Arc::new(VndirectQuoteProvider::new(
            &config.quote_api_base_url,
            config.quote_timeout,
        )?);

        Self::new(generator, quotes, RouterSettings::from(config))
    }

    /// Run the graph and return the full final state.
    pub async fn process_query(&self, query: &str) -> Result<RouterState> {
        self.graph.invoke(RouterState::new(query)).await
    }

    /// Run the graph and return only the response.
    pub async fn submit_query(&self, query: &str) -> Result<QueryResponse> {
        let state = self.process_query(query).await?;

        info!(
            intent = state.intent().map(|i| i.label()).unwrap_or(""),
            symbol = state.extracted_key().unwrap_or(""),
            "Query answered"
        );

        let response = state
            .response()
            .ok_or(RouterError::MissingResponse)?
            .to_string();

        Ok(QueryResponse { response })
    }
}
