// HTTP and WebSocket APIs

pub mod admin;
mod ingestion;
pub mod query;
pub mod websocket;

pub use admin::{create_admin_router, AdminAppState};
pub use ingestion::{create_router, AppState, IngestSink};
pub use query::{create_query_router, QueryAppState};
pub use websocket::{create_ws_router, ws_handler, WsAppState};
