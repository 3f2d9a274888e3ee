// NATS JetStream transport for telemetry ingestion

mod client;
mod publisher;

pub use client::{NatsClient, NatsConfig};
pub use publisher::TelemetryPublisher;
