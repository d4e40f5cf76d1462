//! JSON handlers for the chat frontend
//!
//! Domain failures are reported in the body with `success: false` and a 200
//! status, which is what the frontend expects. Only store failures on the
//! read-only endpoints surface as 500s.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::error;

use super::AppState;
use crate::app::{ChatHistory, HealthStatus, ServiceError};

const DEFAULT_SESSION: &str = "default";

fn default_session() -> String {
    DEFAULT_SESSION.to_string()
}

fn default_clear_option() -> String {
    "all".to_string()
}

/// Service failure rendered as a 500
pub struct ApiError(ServiceError);

impl From<ServiceError> for ApiError {
    fn from(error: ServiceError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        error!("Request failed: {}", self.0);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "success": false, "message": self.0.to_string() })),
        )
            .into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
    #[serde(rename = "sessionId", default = "default_session")]
    pub session_id: String,
}

#[derive(Debug, Deserialize)]
pub struct SessionQuery {
    #[serde(rename = "sessionId", default = "default_session")]
    pub session_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ClearMemoryRequest {
    #[serde(rename = "sessionId", default = "default_session")]
    pub session_id: String,
    #[serde(rename = "clearOption", default = "default_clear_option")]
    pub clear_option: String,
}

#[derive(Debug, Deserialize)]
pub struct TestCodeRequest {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub language: Option<String>,
}

pub async fn chat_list(State(service): State<AppState>) -> Result<Json<Value>, ApiError> {
    let chats = service.list_chats().await?;
    Ok(Json(json!({ "chats": chats })))
}

pub async fn chat(State(service): State<AppState>, Json(request): Json<ChatRequest>) -> Json<Value> {
    match service.chat(&request.session_id, &request.message).await {
        Ok(reply) => Json(json!({
            "response": reply.response,
            "success": true,
            "important_info": reply.important_info,
        })),
        Err(e) => {
            error!(chat_id = %request.session_id, "Chat turn failed: {}", e);
            Json(json!({
                "response": format!("An error occurred: {}", e),
                "success": false,
            }))
        }
    }
}

pub async fn new_chat(State(service): State<AppState>) -> Result<Json<Value>, ApiError> {
    let chat = service.new_chat().await?;
    Ok(Json(json!({ "success": true, "chat": chat })))
}

pub async fn chat_history(
    State(service): State<AppState>,
    Query(query): Query<SessionQuery>,
) -> Result<Json<ChatHistory>, ApiError> {
    let history = service.chat_history(&query.session_id).await?;
    Ok(Json(history))
}

pub async fn clear_memory(
    State(service): State<AppState>,
    Json(request): Json<ClearMemoryRequest>,
) -> Json<Value> {
    match service
        .clear_memory(&request.session_id, &request.clear_option)
        .await
    {
        Ok(message) => Json(json!({ "success": true, "message": message })),
        Err(e @ ServiceError::InvalidClearOption) => {
            Json(json!({ "success": false, "message": e.to_string() }))
        }
        Err(e) => {
            error!(chat_id = %request.session_id, "Clearing memory failed: {}", e);
            Json(json!({
                "success": false,
                "message": format!("Error clearing memory: {}", e),
            }))
        }
    }
}

pub async fn test_code(
    State(service): State<AppState>,
    Json(request): Json<TestCodeRequest>,
) -> Json<Value> {
    match service
        .test_code(&request.code, request.language.as_deref())
        .await
    {
        Ok(outcome) => Json(json!({
            "success": outcome.success,
            "output": outcome.output,
        })),
        Err(e) => Json(json!({
            "success": false,
            "output": format!("Error executing code: {}", e),
        })),
    }
}

pub async fn delete_chat(
    State(service): State<AppState>,
    Json(request): Json<SessionQuery>,
) -> Json<Value> {
    match service.delete_chat(&request.session_id).await {
        Ok(true) => Json(json!({ "success": true, "message": "Chat deleted successfully" })),
        Ok(false) => Json(json!({ "success": false, "message": "Chat not found" })),
        Err(e) => {
            error!(chat_id = %request.session_id, "Deleting chat failed: {}", e);
            Json(json!({
                "success": false,
                "message": format!("Error deleting chat: {}", e),
            }))
        }
    }
}

pub async fn health(State(service): State<AppState>) -> Json<HealthStatus> {
    Json(service.health().await)
}
