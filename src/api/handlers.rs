//! HTTP request handlers

use super::sse::sse_stream;
use super::types::{
    CancelResponse, ChatListResponse, ChatResponse, CreateChatRequest, ErrorResponse,
    MessagesResponse, RenameRequest, SendMessageRequest, SuccessResponse,
};
use super::AppState;
use crate::runtime::{SendError, SendOutcome};
use crate::store::StoreError;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Chat lifecycle
        .route("/api/chats", get(list_chats).post(create_chat))
        .route(
            "/api/chats/:id",
            get(get_chat).put(rename_chat).delete(delete_chat),
        )
        // Messages
        .route(
            "/api/chats/:id/messages",
            get(list_messages).post(send_message),
        )
        .route("/api/chats/:id/cancel", post(cancel_send))
        // SSE streaming
        .route("/api/chats/:id/stream", get(stream_chat))
        // Version
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Chat Lifecycle
// ============================================================

async fn list_chats(State(state): State<AppState>) -> Json<ChatListResponse> {
    Json(ChatListResponse {
        chats: state.service.list_chats(),
    })
}

async fn create_chat(
    State(state): State<AppState>,
    body: Option<Json<CreateChatRequest>>,
) -> (StatusCode, Json<ChatResponse>) {
    let req = body.map(|Json(r)| r).unwrap_or_default();
    let chat = state.service.create_chat(req.title.as_deref());
    (
        StatusCode::CREATED,
        Json(ChatResponse {
            send_state: state.service.send_state(&chat.id),
            chat,
        }),
    )
}

/// Fetch a chat and make it the current one
async fn get_chat(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ChatResponse>, AppError> {
    let chat = state.service.select_chat(&id)?;
    Ok(Json(ChatResponse {
        send_state: state.service.send_state(&id),
        chat,
    }))
}

async fn rename_chat(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<RenameRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    if req.title.trim().is_empty() {
        return Err(AppError::BadRequest("Title must not be empty".to_string()));
    }
    let chat = state.service.rename_chat(&id, &req.title)?;
    Ok(Json(ChatResponse {
        send_state: state.service.send_state(&id),
        chat,
    }))
}

async fn delete_chat(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    state.service.delete_chat(&id)?;
    Ok(Json(SuccessResponse { success: true }))
}

// ============================================================
// Messages
// ============================================================

async fn list_messages(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MessagesResponse>, AppError> {
    let chat = state.service.get_chat(&id)?;
    Ok(Json(MessagesResponse {
        messages: chat.messages,
    }))
}

/// Send a message and wait for the streamed reply to finish.
///
/// Progress is visible on the chat's SSE stream while this is pending.
async fn send_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<SendMessageRequest>,
) -> Result<Json<SendOutcome>, AppError> {
    let outcome = state.service.send_message(&id, &req.content).await?;
    Ok(Json(outcome))
}

async fn cancel_send(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CancelResponse>, AppError> {
    if state.service.get_chat(&id).is_err() {
        return Err(AppError::NotFound(format!("Chat not found: {id}")));
    }
    Ok(Json(CancelResponse {
        ok: state.service.cancel(&id),
    }))
}

// ============================================================
// SSE Streaming
// ============================================================

async fn stream_chat(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    // Subscribe before the snapshot so no update falls in between
    let store_rx = state.service.store().subscribe();
    let chat = state.service.get_chat(&id)?;
    Ok(sse_stream(chat, state.service.send_state(&id), store_rx))
}

// ============================================================
// Version
// ============================================================

async fn get_version() -> &'static str {
    concat!("coder-chat ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    Internal(String),
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        AppError::NotFound(e.to_string())
    }
}

impl From<SendError> for AppError {
    fn from(e: SendError) -> Self {
        match e {
            SendError::InvalidInput => AppError::BadRequest(e.to_string()),
            SendError::ChatNotFound(_) => AppError::NotFound(e.to_string()),
            SendError::Busy(_) | SendError::Cancelled => AppError::Conflict(e.to_string()),
            SendError::Internal(_) => AppError::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
