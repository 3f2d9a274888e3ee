use crate::event::TelemetryEvent;
use anyhow::{Context, Result};
use async_nats::jetstream;
use tracing::debug;

/// Publishes telemetry to JetStream for the state engine's consumer
#[derive(Clone)]
pub struct TelemetryPublisher {
    jetstream: jetstream::Context,
    subject_prefix: String,
}

impl TelemetryPublisher {
    pub fn new(jetstream: jetstream::Context, subject_prefix: impl Into<String>) -> Self {
        Self {
            jetstream,
            subject_prefix: subject_prefix.into(),
        }
    }

    /// Publish a single event and wait for the stream ack
    ///
    /// Subject format: {prefix}.{entity_id}
    /// Payload: JSON-serialized TelemetryEvent
    pub async fn publish(&self, event: &TelemetryEvent) -> Result<()> {
        let subject = event.subject(&self.subject_prefix);
        let payload = serde_json::to_vec(event).context("Failed to serialize telemetry to JSON")?;

        debug!(
            entity_id = %event.entity_id,
            subject = %subject,
            "Publishing telemetry to NATS"
        );

        self.jetstream
            .publish(subject.clone(), payload.into())
            .await
            .with_context(|| format!("Failed to publish telemetry to subject '{}'", subject))?
            .await
            .context("Failed to await publish ack")?;

        Ok(())
    }
}
