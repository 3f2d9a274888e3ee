use crate::state::{EntityState, EntityStatus, StateEngine};
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{delete, put},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// State for the admin API.
#[derive(Clone)]
pub struct AdminAppState {
    pub state_engine: Arc<StateEngine>,
    /// Required bearer token for admin mutations. None = unrestricted.
    pub admin_token: Option<String>,
}

#[derive(Deserialize)]
pub struct StatusUpdate {
    pub status: EntityStatus,
}

#[derive(Serialize)]
struct ResetResponse {
    removed: usize,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

pub fn create_admin_router(state: AdminAppState) -> Router {
    Router::new()
        .route("/api/fleet/entities/:id/status", put(put_status))
        .route("/api/fleet/entities", delete(reset_entities))
        .with_state(Arc::new(state))
}

/// PUT /api/fleet/entities/:id/status - external status control
/// (e.g., maintenance)
async fn put_status(
    State(state): State<Arc<AdminAppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(update): Json<StatusUpdate>,
) -> Response {
    if !validate_admin_token(&headers, &state.admin_token) {
        return error_response(StatusCode::UNAUTHORIZED, "Unauthorized");
    }

    match state.state_engine.set_status(&id, update.status) {
        Some(entity) => Json::<EntityState>(entity).into_response(),
        None => error_response(StatusCode::NOT_FOUND, "Entity not found"),
    }
}

/// DELETE /api/fleet/entities - drop all entity state
async fn reset_entities(State(state): State<Arc<AdminAppState>>, headers: HeaderMap) -> Response {
    if !validate_admin_token(&headers, &state.admin_token) {
        return error_response(StatusCode::UNAUTHORIZED, "Unauthorized");
    }

    let removed = state.state_engine.reset();
    info!(removed = removed, "Fleet state reset via admin API");
    Json(ResetResponse { removed }).into_response()
}

fn error_response(status: StatusCode, error: &str) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
        .into_response()
}

/// Returns true if the bearer token in `Authorization` matches the expected admin token.
/// Returns true (no restriction) when `expected` is None.
fn validate_admin_token(headers: &HeaderMap, expected: &Option<String>) -> bool {
    let Some(expected_token) = expected else {
        return true;
    };

    let Some(auth_header) = headers.get("Authorization") else {
        return false;
    };
    let Ok(value) = auth_header.to_str() else {
        return false;
    };
    let Some(token) = value.strip_prefix("Bearer ") else {
        return false;
    };

    token == expected_token
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_admin_token_validation() {
        let expected = Some("secret".to_string());

        let mut headers = HeaderMap::new();
        assert!(!validate_admin_token(&headers, &expected));
        assert!(validate_admin_token(&headers, &None));

        headers.insert("Authorization", HeaderValue::from_static("Bearer wrong"));
        assert!(!validate_admin_token(&headers, &expected));

        headers.insert("Authorization", HeaderValue::from_static("secret"));
        assert!(!validate_admin_token(&headers, &expected));

        headers.insert("Authorization", HeaderValue::from_static("Bearer secret"));
        assert!(validate_admin_token(&headers, &expected));
    }
}
