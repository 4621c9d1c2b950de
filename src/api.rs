//! REST API Server for the Stock Buy Agent
//!
//! Exposes conversation threads over HTTP so a suspended purchase can be
//! approved from a different request (or process) than the one that
//! started it.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::agent::StockAgent;
use crate::catalog::PriceCatalog;
use crate::error::AgentError;

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MessageRequest {
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ResumeRequest {
    pub decision: String,
}

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

type ApiResult = (StatusCode, Json<ApiResponse>);

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub agent: Arc<StockAgent>,
    pub catalog: Arc<dyn PriceCatalog>,
}

fn error_status(error: &AgentError) -> StatusCode {
    match error {
        AgentError::PendingApproval(_) | AgentError::NothingToResume(_) => StatusCode::CONFLICT,
        AgentError::LlmError(_) | AgentError::HttpError(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn agent_error(error: AgentError) -> ApiResult {
    warn!("Agent request failed: {}", error);
    (error_status(&error), Json(ApiResponse::error(error.to_string())))
}

fn bad_request(message: &str) -> ApiResult {
    (StatusCode::BAD_REQUEST, Json(ApiResponse::error(message.to_string())))
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
/// Catalog Endpoint
/// =============================

async fn list_catalog(State(state): State<ApiState>) -> ApiResult {
    let entries: Vec<serde_json::Value> = state
        .catalog
        .entries()
        .into_iter()
        .map(|(symbol, price)| serde_json::json!({ "symbol": symbol, "price": price.to_string() }))
        .collect();

    (StatusCode::OK, Json(ApiResponse::success(entries)))
}

/// =============================
/// Thread Endpoints
/// =============================

async fn post_message(
    State(state): State<ApiState>,
    Path(thread_id): Path<String>,
    Json(req): Json<MessageRequest>,
) -> ApiResult {
    if req.content.trim().is_empty() {
        return bad_request("Message content must not be empty");
    }

    info!(thread_id = %thread_id, "Received message");

    match state.agent.invoke(&thread_id, &req.content).await {
        Ok(outcome) => (StatusCode::OK, Json(ApiResponse::success(outcome))),
        Err(e) => agent_error(e),
    }
}

async fn resume_thread(
    State(state): State<ApiState>,
    Path(thread_id): Path<String>,
    Json(req): Json<ResumeRequest>,
) -> ApiResult {
    info!(thread_id = %thread_id, "Received approval decision");

    match state.agent.resume(&thread_id, &req.decision).await {
        Ok(outcome) => (StatusCode::OK, Json(ApiResponse::success(outcome))),
        Err(e) => agent_error(e),
    }
}

async fn get_thread(State(state): State<ApiState>, Path(thread_id): Path<String>) -> ApiResult {
    match state.agent.state(&thread_id).await {
        Ok(Some(thread)) => (StatusCode::OK, Json(ApiResponse::success(thread))),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error(format!("Thread {} not found", thread_id))),
        ),
        Err(e) => agent_error(e),
    }
}

/// =============================
/// Router
/// =============================

pub fn create_router(agent: Arc<StockAgent>, catalog: Arc<dyn PriceCatalog>) -> Router {
    let state = ApiState { agent, catalog };

    Router::new()
        .route("/health", get(health))
        .route("/api/catalog", get(list_catalog))
        .route("/api/threads/:thread_id", get(get_thread))
        .route("/api/threads/:thread_id/messages", post(post_message))
        .route("/api/threads/:thread_id/resume", post(resume_thread))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    agent: Arc<StockAgent>,
    catalog: Arc<dyn PriceCatalog>,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(agent, catalog);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditLog;
    use crate::catalog::StaticCatalog;
    use crate::execution::ExecutionEngine;
    use crate::llm::{ModelReply, ScriptedModel};
    use crate::state::InMemoryCheckpointer;
    use crate::tools::{create_default_registry, BUY_STOCKS};
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn router(replies: Vec<ModelReply>) -> Router {
        let catalog: Arc<dyn PriceCatalog> = Arc::new(StaticCatalog::default());
        let agent = StockAgent::new(
            Arc::new(ScriptedModel::new(replies)),
            ExecutionEngine::new(create_default_registry(catalog.clone())),
            Arc::new(InMemoryCheckpointer::new()),
            AuditLog::new(),
            5,
        );
        create_router(Arc::new(agent), catalog)
    }

    async fn send(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(match body {
                Some(body) => Body::from(body.to_string()),
                None => Body::empty(),
            })
            .unwrap();

        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health_and_catalog() {
        let router = router(vec![]);

        let (status, body) = send(&router, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");

        let (status, body) = send(&router, "GET", "/api/catalog", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"][1], json!({"symbol": "AAPL", "price": "100.4"}));
    }

    #[tokio::test]
    async fn test_suspend_and_resume_over_http() {
        let router = router(vec![
            ModelReply::call(
                BUY_STOCKS,
                json!({"symbol": "AAPL", "quantity": 3, "total_price": 301.2}),
            ),
            ModelReply::text("Purchase complete."),
        ]);

        let (status, body) = send(
            &router,
            "POST",
            "/api/threads/t1/messages",
            Some(json!({"content": "Buy 3 AAPL stocks at current price."})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "suspended");
        assert_eq!(
            body["data"]["approval"]["prompt"],
            "Approve buying 3 AAPL stocks for $301.20?"
        );

        let (status, _) = send(
            &router,
            "POST",
            "/api/threads/t1/messages",
            Some(json!({"content": "anything"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, body) = send(
            &router,
            "POST",
            "/api/threads/t1/resume",
            Some(json!({"decision": "yes"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "completed");
        assert_eq!(body["data"]["answer"], "Purchase complete.");

        let (status, body) = send(&router, "GET", "/api/threads/t1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["data"]["pending"].is_null());
    }

    #[tokio::test]
    async fn test_error_statuses() {
        let router = router(vec![]);

        let (status, body) = send(&router, "GET", "/api/threads/nope", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);

        let (status, _) = send(
            &router,
            "POST",
            "/api/threads/nope/resume",
            Some(json!({"decision": "yes"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = send(
            &router,
            "POST",
            "/api/threads/t1/messages",
            Some(json!({"content": "   "})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        // Script is empty, so the model call fails upstream
        let (status, _) = send(
            &router,
            "POST",
            "/api/threads/t1/messages",
            Some(json!({"content": "hello"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }
}
