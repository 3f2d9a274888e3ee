use crate::state::{EntityState, EntityStatus, HistoryPoint, MetricsSnapshot, StateEngine};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Shared state for query API
pub struct QueryAppState {
    pub state_engine: Arc<StateEngine>,
    /// Window for the active reporter gauge (seconds)
    pub reporter_window_seconds: i64,
}

/// Query parameters for entity listing
#[derive(Deserialize)]
pub struct EntityQueryParams {
    /// Filter by status
    pub status: Option<EntityStatus>,
    /// Filter by entity ID prefix (string matching)
    pub prefix: Option<String>,
}

/// Single entity with its retained location history
#[derive(Serialize)]
pub struct EntityDetail {
    #[serde(flatten)]
    pub state: EntityState,
    pub history: Vec<HistoryPoint>,
}

/// Error response
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Create query API router
pub fn create_query_router(state: Arc<QueryAppState>) -> Router {
    Router::new()
        .route("/api/fleet/entities", get(list_entities))
        .route("/api/fleet/entities/:id", get(get_entity))
        .route("/api/fleet/metrics", get(get_metrics))
        .with_state(state)
}

/// GET /api/fleet/entities - Snapshot of every entity, ordered by id
///
/// Query parameters:
/// - `status`: only entities in this status (e.g., ?status=inactive)
/// - `prefix`: only entity ids starting with this prefix (e.g., ?prefix=bike-0)
async fn list_entities(
    State(state): State<Arc<QueryAppState>>,
    Query(params): Query<EntityQueryParams>,
) -> Json<Vec<EntityState>> {
    let entities = state
        .state_engine
        .list_all()
        .into_iter()
        .filter(|entity| params.status.map_or(true, |s| entity.status == s))
        .filter(|entity| {
            params
                .prefix
                .as_deref()
                .map_or(true, |p| entity.entity_id.starts_with(p))
        })
        .collect();

    Json(entities)
}

/// GET /api/fleet/entities/:id - Get specific entity
async fn get_entity(
    State(state): State<Arc<QueryAppState>>,
    Path(id): Path<String>,
) -> Result<Json<EntityDetail>, QueryError> {
    let entity = state.state_engine.get(&id).ok_or(QueryError::NotFound)?;
    let history = state.state_engine.history(&id).unwrap_or_default();

    Ok(Json(EntityDetail {
        state: entity,
        history,
    }))
}

/// GET /api/fleet/metrics - Ingestion and fan-out counters
async fn get_metrics(State(state): State<Arc<QueryAppState>>) -> Json<MetricsSnapshot> {
    Json(
        state
            .state_engine
            .metrics
            .get_snapshot(state.reporter_window_seconds),
    )
}

/// Query error types
#[derive(Debug)]
enum QueryError {
    NotFound,
}

impl IntoResponse for QueryError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            QueryError::NotFound => (StatusCode::NOT_FOUND, "Entity not found"),
        };

        let body = Json(ErrorResponse {
            error: error_message.to_string(),
        });

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::TelemetryEvent;
    use crate::geo::Coordinate;

    fn create_test_state() -> (Arc<StateEngine>, Arc<QueryAppState>) {
        let engine = Arc::new(StateEngine::new());
        let app_state = Arc::new(QueryAppState {
            state_engine: engine.clone(),
            reporter_window_seconds: 10,
        });
        (engine, app_state)
    }

    fn report(engine: &StateEngine, entity_id: &str, timestamp: i64) {
        engine
            .apply_telemetry(&TelemetryEvent {
                entity_id: entity_id.to_string(),
                timestamp,
                location: Coordinate::new(19.0760, 72.8777),
                speed: 12.0,
                battery_level: 80.0,
            })
            .unwrap();
    }

    #[tokio::test]
    async fn test_list_entities_no_filters() {
        let (engine, app_state) = create_test_state();
        report(&engine, "bike-002", 1_000);
        report(&engine, "bike-001", 1_000);
        report(&engine, "scooter-001", 1_000);

        let params = EntityQueryParams {
            status: None,
            prefix: None,
        };
        let result = list_entities(State(app_state), Query(params)).await;

        let ids: Vec<&str> = result.0.iter().map(|e| e.entity_id.as_str()).collect();
        assert_eq!(ids, vec!["bike-001", "bike-002", "scooter-001"]);
    }

    #[tokio::test]
    async fn test_list_entities_filters() {
        let (engine, app_state) = create_test_state();
        report(&engine, "bike-001", 1_000);
        report(&engine, "bike-002", 1_000);
        report(&engine, "scooter-001", 1_000);
        engine.set_status("bike-002", EntityStatus::Maintenance);

        let params = EntityQueryParams {
            status: None,
            prefix: Some("bike".to_string()),
        };
        let result = list_entities(State(app_state.clone()), Query(params)).await;
        assert_eq!(result.0.len(), 2);

        let params = EntityQueryParams {
            status: Some(EntityStatus::Active),
            prefix: Some("bike".to_string()),
        };
        let result = list_entities(State(app_state), Query(params)).await;
        assert_eq!(result.0.len(), 1);
        assert_eq!(result.0[0].entity_id, "bike-001");
    }

    #[tokio::test]
    async fn test_get_entity_includes_history() {
        let (engine, app_state) = create_test_state();
        report(&engine, "bike-001", 1_000);

        let result = get_entity(State(app_state.clone()), Path("bike-001".to_string()))
            .await
            .unwrap();
        assert_eq!(result.0.state.entity_id, "bike-001");
        assert_eq!(result.0.history.len(), 1);

        let missing = get_entity(State(app_state), Path("nope".to_string())).await;
        assert!(missing.is_err());
    }

    #[tokio::test]
    async fn test_metrics_snapshot() {
        let (engine, app_state) = create_test_state();
        report(&engine, "bike-001", 1_000);
        report(&engine, "bike-001", 1_000);

        let result = get_metrics(State(app_state)).await;
        assert_eq!(result.0.total_events, 2);
        assert_eq!(result.0.duplicate_events, 1);
        assert_eq!(result.0.active_reporters, 1);
    }
}
