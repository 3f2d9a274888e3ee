use crate::error::EngineError;
use crate::event::TelemetryEvent;
use crate::nats::TelemetryPublisher;
use crate::state::{StateEngine, UpdateKind};
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::post,
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error};

/// Destination for accepted telemetry
#[derive(Clone)]
pub enum IngestSink {
    /// Publish to JetStream; the engine's consumer applies it
    Nats(TelemetryPublisher),
    /// Apply straight to the store
    Direct,
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub sink: IngestSink,
    pub state_engine: Arc<StateEngine>,
    pub body_size_limit_single_bytes: usize,
    pub body_size_limit_batch_bytes: usize,
}

/// Success response for telemetry ingestion
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IngestResponse {
    entity_id: String,
    /// How the store applied the event; absent when queued on NATS
    #[serde(skip_serializing_if = "Option::is_none")]
    outcome: Option<UpdateKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sequence: Option<u64>,
}

/// Error response
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Batch request
#[derive(Deserialize)]
struct BatchRequest {
    events: Vec<serde_json::Value>,
}

/// Batch response
#[derive(Serialize)]
struct BatchResponse {
    successful: usize,
    failed: usize,
    results: Vec<BatchResult>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchResult {
    entity_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    outcome: Option<UpdateKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Create API router with ingestion endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/telemetry", post(ingest_telemetry))
        .route("/api/telemetry/batch", post(ingest_batch))
        .with_state(Arc::new(state))
}

/// POST /api/telemetry - Ingest a single telemetry event
async fn ingest_telemetry(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<IngestResponse>, AppError> {
    if body.len() > state.body_size_limit_single_bytes {
        return Err(AppError::PayloadTooLarge);
    }

    let event: TelemetryEvent = serde_json::from_slice(&body).map_err(|e| {
        state.state_engine.metrics.record_rejected();
        AppError::ValidationError(e.to_string())
    })?;

    Ok(Json(submit(&state, &event).await?))
}

/// POST /api/telemetry/batch - Ingest multiple events; one bad event never
/// fails the batch
async fn ingest_batch(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<BatchResponse>, AppError> {
    if body.len() > state.body_size_limit_batch_bytes {
        return Err(AppError::PayloadTooLarge);
    }

    let request: BatchRequest = serde_json::from_slice(&body).map_err(|e| {
        state.state_engine.metrics.record_rejected();
        AppError::ValidationError(e.to_string())
    })?;

    if request.events.is_empty() {
        return Err(AppError::ValidationError(
            "Batch request must contain at least one event".to_string(),
        ));
    }

    debug!(count = request.events.len(), "Ingesting telemetry batch");

    let mut results = Vec::with_capacity(request.events.len());
    let mut successful = 0;
    let mut failed = 0;

    for value in request.events {
        let entity_id = value
            .get("entityId")
            .and_then(|v| v.as_str())
            .map(str::to_string);

        let outcome = match serde_json::from_value::<TelemetryEvent>(value) {
            Ok(event) => submit(&state, &event).await,
            Err(e) => {
                state.state_engine.metrics.record_rejected();
                Err(AppError::ValidationError(e.to_string()))
            }
        };

        match outcome {
            Ok(response) => {
                successful += 1;
                results.push(BatchResult {
                    entity_id: Some(response.entity_id),
                    outcome: response.outcome,
                    error: None,
                });
            }
            Err(e) => {
                failed += 1;
                results.push(BatchResult {
                    entity_id,
                    outcome: None,
                    error: Some(e.message()),
                });
            }
        }
    }

    Ok(Json(BatchResponse {
        successful,
        failed,
        results,
    }))
}

/// Hand one event to the configured sink
async fn submit(state: &AppState, event: &TelemetryEvent) -> Result<IngestResponse, AppError> {
    match &state.sink {
        IngestSink::Direct => {
            let update = state
                .state_engine
                .apply_telemetry(event)
                .map_err(|e| AppError::ValidationError(e.to_string()))?;

            Ok(IngestResponse {
                entity_id: event.entity_id.clone(),
                outcome: Some(update.kind),
                sequence: Some(update.sequence),
            })
        }
        IngestSink::Nats(publisher) => {
            // Invalid telemetry never reaches the stream
            if let Err(source) = event.validate() {
                state.state_engine.metrics.record_rejected();
                let e = EngineError::InvalidTelemetry {
                    entity_id: event.entity_id.clone(),
                    source,
                };
                return Err(AppError::ValidationError(e.to_string()));
            }

            publisher.publish(event).await.map_err(|e| {
                error!(entity_id = %event.entity_id, error = %e, "Failed to publish telemetry to NATS");
                AppError::PublishError(e.to_string())
            })?;

            Ok(IngestResponse {
                entity_id: event.entity_id.clone(),
                outcome: None,
                sequence: None,
            })
        }
    }
}

/// Application error types
enum AppError {
    ValidationError(String),
    PublishError(String),
    PayloadTooLarge,
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::PublishError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
        }
    }

    fn message(self) -> String {
        match self {
            AppError::ValidationError(msg) | AppError::PublishError(msg) => msg,
            AppError::PayloadTooLarge => "payload too large".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(ErrorResponse {
            error: self.message(),
        });
        (status, body).into_response()
    }
}
