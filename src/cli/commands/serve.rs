//! HTTP API server for the query pipeline.
//!
//! Exposes the one endpoint the system promises: POST /query, answering
//! with citations and a disclosed status.

use crate::cli::Output;
use crate::config::Settings;
use crate::engine::QaEngine;
use crate::error::ReplikkError;
use crate::generation::Citation;
use crate::orchestrator::QueryClass;
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::error;

/// Shared application state.
struct AppState {
    engine: QaEngine,
}

/// Run the HTTP API server.
pub async fn run_serve(host: &str, port: u16, settings: Settings) -> anyhow::Result<()> {
    let engine = QaEngine::new(settings)?;
    let state = Arc::new(AppState { engine });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(health))
        .route("/query", post(query))
        .layer(cors)
        .with_state(state);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("Replikk API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET  /health");
    Output::kv("Query", "POST /query");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, app).await?;

    Ok(())
}

// === Request/Response Types ===

#[derive(Deserialize)]
struct QueryRequest {
    query: String,
    /// Optional intent hint overriding keyword classification:
    /// "simple", "counting" or "composed".
    #[serde(default)]
    intent: Option<String>,
}

fn parse_intent(intent: &Option<String>) -> Result<Option<QueryClass>, String> {
    match intent.as_deref() {
        None => Ok(None),
        Some("simple") => Ok(Some(QueryClass::Simple)),
        Some("counting") => Ok(Some(QueryClass::Counting)),
        Some("composed") => Ok(Some(QueryClass::Composed)),
        Some(other) => Err(format!("unknown intent: {}", other)),
    }
}

#[derive(Serialize)]
struct QueryResponse {
    answer: String,
    citations: Vec<CitationInfo>,
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
struct CitationInfo {
    marker: usize,
    chunk_id: String,
    quote: String,
}

impl From<&Citation> for CitationInfo {
    fn from(citation: &Citation) -> Self {
        Self {
            marker: citation.marker,
            chunk_id: citation.chunk_id.clone(),
            quote: citation.quote.clone(),
        }
    }
}

// === Handlers ===

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn query(
    State(state): State<Arc<AppState>>,
    Json(req): Json<QueryRequest>,
) -> impl IntoResponse {
    let hint = match parse_intent(&req.intent) {
        Ok(hint) => hint,
        Err(msg) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(QueryResponse {
                    answer: String::new(),
                    citations: Vec::new(),
                    status: "failed".to_string(),
                    error: Some(msg),
                }),
            )
                .into_response()
        }
    };

    match state.engine.ask_with_hint(&req.query, hint).await {
        Ok(outcome) => Json(QueryResponse {
            answer: outcome.answer.text,
            citations: outcome.answer.citations.iter().map(CitationInfo::from).collect(),
            status: outcome.answer.status.to_string(),
            error: None,
        })
        .into_response(),
        Err(e @ ReplikkError::InvalidInput(_)) => (
            StatusCode::BAD_REQUEST,
            Json(QueryResponse {
                answer: String::new(),
                citations: Vec::new(),
                status: "failed".to_string(),
                error: Some(e.to_string()),
            }),
        )
            .into_response(),
        Err(e) => {
            error!("Query failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(QueryResponse {
                    answer: String::new(),
                    citations: Vec::new(),
                    status: "failed".to_string(),
                    error: Some(e.to_string()),
                }),
            )
                .into_response()
        }
    }
}
