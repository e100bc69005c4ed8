//! REST API for the compare list
//!
//! Exposes one tab's compare store to the catalog front end: list and
//! mutate the selection, render the bar and toggle view models, and push
//! selection changes over a WebSocket.
//! Default port: 8130

use anyhow::{Context, Result};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};

use crate::compare::{
    compare_href, normalize_id, BarView, CompareBar, CompareStore, CompareToggle,
    SelectionChanged, ToggleMode, ToggleView,
};

pub use crate::config::DEFAULT_API_PORT;

/// Shared state for API handlers
pub struct ApiState {
    /// Compare store of the API tab
    pub store: CompareStore,
    /// Bar bound to the same store
    pub bar: CompareBar,
}

impl ApiState {
    pub fn new(store: CompareStore) -> Self {
        let bar = CompareBar::new(store.clone());
        Self { store, bar }
    }
}

/// Current selection
#[derive(Debug, Serialize, Deserialize)]
pub struct CompareListResponse {
    pub ids: Vec<String>,
    pub count: usize,
    pub href: String,
}

impl CompareListResponse {
    fn from_store(store: &CompareStore) -> Self {
        let ids = store.selection();
        Self {
            count: ids.len(),
            href: compare_href(&ids),
            ids,
        }
    }
}

/// Result of a toggle
#[derive(Debug, Serialize, Deserialize)]
pub struct ToggleResponse {
    pub id: String,
    pub selected: bool,
    pub count: usize,
}

/// Query of the toggle view route
#[derive(Debug, Deserialize)]
pub struct ToggleViewQuery {
    #[serde(default)]
    pub mode: ToggleMode,
}

/// API error response
#[derive(Debug, Serialize)]
struct ApiError {
    #[serde(skip)]
    status: StatusCode,
    error: String,
}

impl ApiError {
    fn invalid_id(id: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error: format!("Invalid device id: '{}'", id),
        }
    }

    fn internal(msg: impl std::fmt::Display) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error: msg.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

/// Trim a path id, rejecting blank ones
fn checked_id(id: &str) -> Result<String, ApiError> {
    normalize_id(id)
        .map(str::to_string)
        .ok_or_else(|| ApiError::invalid_id(id))
}

/// Run store work on the blocking pool; mutations write to durable storage
async fn with_store<T, F>(state: &Arc<ApiState>, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&ApiState) -> T + Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state))
        .await
        .map_err(|e| {
            warn!("Compare store task failed: {}", e);
            ApiError::internal("Compare store task failed")
        })
}

/// Build the API router
pub fn build_router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/api/compare", get(get_compare).delete(clear_compare))
        .route("/api/compare/bar", get(get_bar))
        .route("/api/compare/toggle/:id", get(get_toggle_view))
        .route("/api/compare/:id", put(add_device).delete(remove_device))
        .route("/api/compare/:id/toggle", post(toggle_device))
        .route("/api/ws/compare-updates", get(compare_updates_ws))
        .route("/api/health", get(health_check))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// GET /api/compare - Current selection
async fn get_compare(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<CompareListResponse>, ApiError> {
    let list = with_store(&state, |s| CompareListResponse::from_store(&s.store)).await?;
    Ok(Json(list))
}

/// DELETE /api/compare - Clear the selection
async fn clear_compare(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<CompareListResponse>, ApiError> {
    let list = with_store(&state, |s| {
        s.bar.clear();
        CompareListResponse::from_store(&s.store)
    })
    .await?;
    info!("Compare list cleared via API");
    Ok(Json(list))
}

/// PUT /api/compare/:id - Add a device
async fn add_device(
    Path(id): Path<String>,
    State(state): State<Arc<ApiState>>,
) -> Result<Json<CompareListResponse>, ApiError> {
    let id = checked_id(&id)?;
    debug!("Compare add via API: {}", id);
    let list = with_store(&state, move |s| {
        s.store.add(&id);
        CompareListResponse::from_store(&s.store)
    })
    .await?;
    Ok(Json(list))
}

/// DELETE /api/compare/:id - Remove a device
async fn remove_device(
    Path(id): Path<String>,
    State(state): State<Arc<ApiState>>,
) -> Result<Json<CompareListResponse>, ApiError> {
    let id = checked_id(&id)?;
    debug!("Compare remove via API: {}", id);
    let list = with_store(&state, move |s| {
        s.store.remove(&id);
        CompareListResponse::from_store(&s.store)
    })
    .await?;
    Ok(Json(list))
}

/// POST /api/compare/:id/toggle - Toggle a device
async fn toggle_device(
    Path(id): Path<String>,
    State(state): State<Arc<ApiState>>,
) -> Result<Json<ToggleResponse>, ApiError> {
    let id = checked_id(&id)?;
    let response = with_store(&state, move |s| {
        let selected = s.store.toggle(&id);
        debug!("Compare toggle via API: {} -> {}", id, selected);
        ToggleResponse {
            id,
            selected,
            count: s.store.len(),
        }
    })
    .await?;
    Ok(Json(response))
}

/// GET /api/compare/bar - Bar view, `null` when nothing is selected
async fn get_bar(State(state): State<Arc<ApiState>>) -> Result<Json<Option<BarView>>, ApiError> {
    let view = with_store(&state, |s| s.bar.view()).await?;
    Ok(Json(view))
}

/// GET /api/compare/toggle/:id?mode=icon|label - Toggle view for one device
async fn get_toggle_view(
    Path(id): Path<String>,
    Query(query): Query<ToggleViewQuery>,
    State(state): State<Arc<ApiState>>,
) -> Result<Json<ToggleView>, ApiError> {
    let id = checked_id(&id)?;
    let view = with_store(&state, move |s| {
        CompareToggle::new(s.store.clone(), id, query.mode).view()
    })
    .await?;
    Ok(Json(view))
}

/// GET /api/ws/compare-updates - WebSocket for push notifications
async fn compare_updates_ws(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ApiState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_websocket(socket, state.store.updates()))
}

/// Forward selection changes to a WebSocket client
async fn handle_websocket(mut socket: WebSocket, mut rx: broadcast::Receiver<SelectionChanged>) {
    debug!("WebSocket client connected for compare updates");

    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(update) => {
                        let msg = match serde_json::to_string(&update) {
                            Ok(msg) => msg,
                            Err(e) => {
                                warn!("Failed to serialize compare update: {}", e);
                                continue;
                            }
                        };
                        if socket.send(Message::Text(msg)).await.is_err() {
                            debug!("WebSocket client disconnected");
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!("Broadcast channel closed");
                        break;
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("WebSocket client lagged by {} messages", n);
                    }
                }
            }
            result = socket.recv() => {
                match result {
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("WebSocket client closed connection");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("WebSocket error: {}", e);
                        break;
                    }
                }
            }
        }
    }
}

/// GET /api/health - Health check endpoint
async fn health_check() -> &'static str {
    "ok"
}

/// Start the API server
pub async fn start_server(state: Arc<ApiState>, port: u16) -> Result<()> {
    let router = build_router(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting compare API server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind API server")?;

    axum::serve(listener, router)
        .await
        .context("API server error")?;

    Ok(())
}
