//! REST API Server for the query router
//!
//! Exposes `POST /chat` for the chat UI plus a health check.

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::agent::QueryRouter;

/// =============================
/// Request / Response Models
/// =============================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ChatRequest {
    pub query: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ChatResponse {
    pub response: String,
}

/// Error body for failed requests.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    pub detail: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            detail: message.into(),
        }
    }
}

type ApiResult<T> = std::result::Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub router: Arc<QueryRouter>,
}

/// =============================
/// Health Endpoint
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Chat Endpoint
/// =============================

async fn chat_handler(
    State(state): State<ApiState>,
    Json(req): Json<ChatRequest>,
) -> ApiResult<ChatResponse> {
    if req.query.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("Query must not be empty")),
        ));
    }

    info!(chars = req.query.chars().count(), "Received chat request");

    match state.router.submit_query(&req.query).await {
        Ok(answer) => {
            info!(response = %answer.response, "Chatbot answered");
            Ok(Json(ChatResponse {
                response: answer.response,
            }))
        }
        Err(e) => {
            error!(error = %e, "Chat request failed");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new(format!("An error occurred: {}", e))),
            ))
        }
    }
}

/// =============================
/// Router
/// =============================

pub fn create_router(router: Arc<QueryRouter>) -> Router {
    let state = ApiState { router };

    Router::new()
        .route("/health", axum::routing::get(health))
        .route("/chat", post(chat_handler))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    router: Arc<QueryRouter>,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let app = create_router(router);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::RouterSettings;
    use crate::error::RouterError;
    use crate::llm::{MockGenerator, TextGenerator};
    use crate::quotes::StaticQuoteProvider;
    use crate::Result;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use tower::ServiceExt;

    struct Broken;

    #[async_trait]
    impl TextGenerator for Broken {
        async fn generate(&self, _system: &str, _user: &str) -> Result<String> {
            Err(RouterError::LlmError("deadline exceeded".to_string()))
        }
    }

    fn app(generator: Arc<dyn TextGenerator>) -> Router {
        let router = QueryRouter::new(
            generator,
            Arc::new(StaticQuoteProvider::new()),
            RouterSettings::default(),
        )
        .unwrap();
        create_router(Arc::new(router))
    }

    fn chat(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/chat")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = app(Arc::new(MockGenerator))
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value = json_body(response).await;
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_chat_returns_response() {
        let response = app(Arc::new(MockGenerator))
            .oneshot(chat(r#"{"query":"What is the boiling point of water at sea level?"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body: ChatResponse = json_body(response).await;
        assert_eq!(body.response, MockGenerator::GENERAL_ANSWER);
    }

    #[tokio::test]
    async fn test_chat_stock_query_with_missing_data() {
        let response = app(Arc::new(MockGenerator))
            .oneshot(chat(r#"{"query":"What is the price of ZZZZ?"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body: ChatResponse = json_body(response).await;
        assert!(body.response.starts_with("[Market Update]"));
    }

    #[tokio::test]
    async fn test_generation_failure_is_server_error() {
        let response = app(Arc::new(Broken))
            .oneshot(chat(r#"{"query":"hello"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: ErrorResponse = json_body(response).await;
        assert!(body.detail.starts_with("An error occurred:"));
        assert!(body.detail.contains("deadline exceeded"));
    }

    #[tokio::test]
    async fn test_chat_matches_router_answer() {
        let router = Arc::new(
            QueryRouter::new(
                Arc::new(MockGenerator),
                Arc::new(StaticQuoteProvider::new()),
                RouterSettings::default(),
            )
            .unwrap(),
        );
        let query = "What is the price of ZZZZ?";
        let direct = router.submit_query(query).await.unwrap();

        let response = create_router(router)
            .oneshot(chat(&format!(r#"{{"query":"{}"}}"#, query)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body: ChatResponse = json_body(response).await;
        assert_eq!(body.response, direct.response);
    }

    #[tokio::test]
    async fn test_blank_query_is_rejected() {
        let response = app(Arc::new(MockGenerator))
            .oneshot(chat(r#"{"query":"  "}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: ErrorResponse = json_body(response).await;
        assert_eq!(body.detail, "Query must not be empty");
    }
}
