use anyhow::{Context, Result};
use async_nats::jetstream::{self, stream};
use serde::Deserialize;
use tracing::info;

/// NATS configuration
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct NatsConfig {
    pub url: String,
    pub stream_name: String,
    pub stream_subjects: Vec<String>,
    /// Prefix for per-entity subjects: `{prefix}.{entity_id}`
    pub subject_prefix: String,
    /// Durable consumer used by the state engine
    pub consumer_name: String,
    pub max_age_hours: i64,
    pub max_bytes: i64,
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            url: std::env::var("NATS_URL").unwrap_or_else(|_| "nats://localhost:4222".to_string()),
            stream_name: "FLEET_TELEMETRY".to_string(),
            stream_subjects: vec!["fleet.telemetry.>".to_string()],
            subject_prefix: "fleet.telemetry".to_string(),
            consumer_name: "fleetwatch-state-engine".to_string(),
            max_age_hours: 24,
            max_bytes: 1024 * 1024 * 1024, // 1GB
        }
    }
}

/// NATS client with JetStream
pub struct NatsClient {
    jetstream: jetstream::Context,
    config: NatsConfig,
}

impl NatsClient {
    /// Connect to NATS and initialize JetStream
    pub async fn connect(config: NatsConfig) -> Result<Self> {
        info!(url = %config.url, "Connecting to NATS");

        let client = async_nats::connect(&config.url)
            .await
            .context("Failed to connect to NATS")?;

        let nats_client = Self {
            jetstream: jetstream::new(client),
            config,
        };

        nats_client.ensure_stream().await?;

        Ok(nats_client)
    }

    /// Ensure the telemetry stream exists with the configured limits
    async fn ensure_stream(&self) -> Result<()> {
        let name = &self.config.stream_name;

        if self.jetstream.get_stream(name).await.is_ok() {
            info!(stream = %name, "JetStream stream already exists");
            return Ok(());
        }

        let stream_config = stream::Config {
            name: name.clone(),
            subjects: self.config.stream_subjects.clone(),
            max_age: std::time::Duration::from_secs((self.config.max_age_hours.max(1) * 3600) as u64),
            max_bytes: self.config.max_bytes,
            storage: stream::StorageType::File,
            retention: stream::RetentionPolicy::Limits,
            ..Default::default()
        };

        self.jetstream
            .create_stream(stream_config)
            .await
            .context("Failed to create JetStream stream")?;

        info!(stream = %name, "Created JetStream stream");
        Ok(())
    }

    pub fn jetstream(&self) -> &jetstream::Context {
        &self.jetstream
    }

    pub fn config(&self) -> &NatsConfig {
        &self.config
    }
}
