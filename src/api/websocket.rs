use crate::session::{ConnectionHandler, SessionManager};
use axum::{
    extract::{ws::WebSocketUpgrade, State},
    response::Response,
    routing::get,
    Router,
};
use std::sync::Arc;
use tracing::info;

/// Shared application state for WebSocket handler
#[derive(Clone)]
pub struct WsAppState {
    pub sessions: Arc<SessionManager>,
}

/// GET /api/ws - WebSocket upgrade; the connection owns one observer session
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<WsAppState>>) -> Response {
    info!("WebSocket upgrade request received");
    let handler = ConnectionHandler::new(Arc::clone(&state.sessions));
    ws.on_upgrade(move |socket| handler.handle(socket))
}

pub fn create_ws_router(state: Arc<WsAppState>) -> Router {
    Router::new()
        .route("/api/ws", get(ws_handler))
        .with_state(state)
}
