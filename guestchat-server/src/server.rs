//! REST server core: shared state, request extractors, and handlers.
//!
//! Guest endpoints identify the caller through the `Device-ID` header and
//! are subject to the block list and the per-device rate limit. Support
//! endpoints take the target device in the request body.

use std::sync::Arc;

use axum::extract::{FromRequestParts, Query, State};
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{Json, Router};

use guestchat_proto::api::{
    ADMIN_BLOCK_PATH, ADMIN_REPLY_PATH, ADMIN_UNBLOCK_PATH, AdminReplyRequest, CONVERSATION_PATH,
    ConversationQuery, ConversationResponse, DEFAULT_PAGE_LIMIT, DEVICE_ID_HEADER, DeviceRequest,
    ErrorBody, RENAME_PATH, RenameRequest, RenameResponse, SEND_PATH, SendRequest,
};
use guestchat_proto::message::{Message, SenderType, ValidationError, validate_display_name};

use crate::config::ServerConfig;
use crate::limiter::RateLimiter;
use crate::store::ConversationStore;

/// Largest page size a client may request.
pub const MAX_PAGE_LIMIT: u32 = 100;

/// Errors returned to HTTP clients as `{ "error": ... }` bodies.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The `Device-ID` header is absent or empty.
    #[error("missing {} header", DEVICE_ID_HEADER)]
    MissingDeviceId,
    /// The device has been blocked by support.
    #[error("device is blocked")]
    Blocked,
    /// The device exceeded its request budget.
    #[error("too many requests")]
    RateLimited,
    /// Request body or parameters failed validation.
    #[error("{0}")]
    Validation(String),
}

impl From<ValidationError> for ServerError {
    fn from(e: ValidationError) -> Self {
        Self::Validation(e.to_string())
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = match self {
            Self::MissingDeviceId | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Blocked => StatusCode::FORBIDDEN,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        };
        let body = ErrorBody {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Shared server state holding the conversations and the rate limiter.
#[derive(Debug)]
pub struct ServerState {
    /// All guest conversations.
    pub store: ConversationStore,
    limiter: RateLimiter,
    max_content_len: usize,
}

impl Default for ServerState {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerState {
    /// Creates a state with default limits and rate limiting disabled.
    #[must_use]
    pub fn new() -> Self {
        Self {
            store: ConversationStore::new(),
            limiter: RateLimiter::unlimited(),
            max_content_len: guestchat_proto::message::MAX_CONTENT_LEN,
        }
    }

    /// Creates a state from the resolved [`ServerConfig`].
    #[must_use]
    pub fn with_config(config: &ServerConfig) -> Self {
        Self {
            store: ConversationStore::new(),
            limiter: if config.rate_limited() {
                RateLimiter::new(config.rate_limit_requests, config.rate_limit_window)
            } else {
                tracing::info!("guest rate limiting disabled");
                RateLimiter::unlimited()
            },
            max_content_len: config.max_content_len,
        }
    }

    /// Gate a guest request: blocked devices get 403, then the rate limit
    /// applies.
    async fn admit(&self, device_id: &str) -> Result<(), ServerError> {
        if self.store.is_blocked(device_id).await {
            tracing::debug!(device_id, "refusing blocked device");
            return Err(ServerError::Blocked);
        }
        if !self.limiter.check(device_id).await {
            tracing::info!(device_id, "rate limit exceeded");
            return Err(ServerError::RateLimited);
        }
        Ok(())
    }

    fn validate_content<'a>(&self, content: &'a str) -> Result<&'a str, ServerError> {
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyContent.into());
        }
        let len = trimmed.chars().count();
        if len > self.max_content_len {
            return Err(ValidationError::ContentTooLong {
                len,
                max: self.max_content_len,
            }
            .into());
        }
        Ok(trimmed)
    }
}

/// The caller's `Device-ID` header.
#[derive(Debug, Clone)]
pub struct DeviceId(pub String);

impl<S: Send + Sync> FromRequestParts<S> for DeviceId {
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(DEVICE_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| Self(v.to_string()))
            .ok_or(ServerError::MissingDeviceId)
    }
}

/// Build the application router over `state`.
pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route(CONVERSATION_PATH, get(conversation))
        .route(SEND_PATH, post(send))
        .route(RENAME_PATH, patch(rename))
        .route(ADMIN_REPLY_PATH, post(admin_reply))
        .route(ADMIN_BLOCK_PATH, post(admin_block))
        .route(ADMIN_UNBLOCK_PATH, post(admin_unblock))
        .with_state(state)
}

/// Starts the server on the given address with a fresh [`ServerState`].
///
/// This is the primary entry point used by both `main.rs` and test code.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server(
    addr: &str,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    start_server_with_state(addr, Arc::new(ServerState::new())).await
}

/// Starts the server with a pre-configured [`ServerState`].
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server_with_state(
    addr: &str,
    state: Arc<ServerState>,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "server error");
        }
    });

    Ok((bound_addr, handle))
}

// ---------------------------------------------------------------------------
// Guest handlers
// ---------------------------------------------------------------------------

async fn conversation(
    State(state): State<Arc<ServerState>>,
    DeviceId(device_id): DeviceId,
    Query(query): Query<ConversationQuery>,
) -> Result<Json<ConversationResponse>, ServerError> {
    state.admit(&device_id).await?;

    let limit = query
        .limit
        .unwrap_or(DEFAULT_PAGE_LIMIT)
        .clamp(1, MAX_PAGE_LIMIT);

    let response = if let Some(since) = query.since {
        let messages = state.store.since(&device_id, since).await;
        let (_, pagination) = state.store.page(&device_id, 1, limit).await;
        ConversationResponse {
            messages,
            pagination,
        }
    } else {
        let page = query.page.unwrap_or(1);
        let (messages, pagination) = state.store.page(&device_id, page, limit).await;
        ConversationResponse {
            messages,
            pagination,
        }
    };
    tracing::debug!(
        device_id = %device_id,
        since = ?query.since,
        count = response.messages.len(),
        "conversation fetched"
    );
    Ok(Json(response))
}

async fn send(
    State(state): State<Arc<ServerState>>,
    DeviceId(device_id): DeviceId,
    Json(request): Json<SendRequest>,
) -> Result<Json<Message>, ServerError> {
    state.admit(&device_id).await?;
    let content = state.validate_content(&request.content)?;

    let message = state
        .store
        .append(&device_id, SenderType::Guest, None, content)
        .await;
    tracing::info!(device_id = %device_id, id = %message.id.as_str(), "guest message stored");
    Ok(Json(message))
}

async fn rename(
    State(state): State<Arc<ServerState>>,
    DeviceId(device_id): DeviceId,
    Json(request): Json<RenameRequest>,
) -> Result<Json<RenameResponse>, ServerError> {
    state.admit(&device_id).await?;
    if request.device_id != device_id {
        return Err(ServerError::Validation(
            "deviceId does not match Device-ID header".to_string(),
        ));
    }
    let name = validate_display_name(&request.new_name)?;

    state.store.rename(&device_id, name).await;
    tracing::info!(device_id = %device_id, name = %name, "device renamed");
    Ok(Json(RenameResponse {
        device_id: Some(device_id),
        name: Some(name.to_string()),
    }))
}

// ---------------------------------------------------------------------------
// Support handlers
// ---------------------------------------------------------------------------

async fn admin_reply(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<AdminReplyRequest>,
) -> Result<Json<Message>, ServerError> {
    if request.device_id.trim().is_empty() {
        return Err(ServerError::Validation("deviceId is required".to_string()));
    }
    let content = state.validate_content(&request.content)?;

    let message = state
        .store
        .append(&request.device_id, SenderType::Admin, request.sender_name, content)
        .await;
    tracing::info!(device_id = %request.device_id, id = %message.id.as_str(), "support reply stored");
    Ok(Json(message))
}

async fn admin_block(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<DeviceRequest>,
) -> Result<Json<serde_json::Value>, ServerError> {
    set_blocked(&state, &request.device_id, true).await
}

async fn admin_unblock(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<DeviceRequest>,
) -> Result<Json<serde_json::Value>, ServerError> {
    set_blocked(&state, &request.device_id, false).await
}

async fn set_blocked(
    state: &ServerState,
    device_id: &str,
    blocked: bool,
) -> Result<Json<serde_json::Value>, ServerError> {
    if device_id.trim().is_empty() {
        return Err(ServerError::Validation("deviceId is required".to_string()));
    }
    state.store.set_blocked(device_id, blocked).await;
    tracing::info!(device_id, blocked, "device block state changed");
    Ok(Json(serde_json::json!({})))
}
