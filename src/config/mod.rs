use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

// Re-export existing config types
pub use crate::nats::NatsConfig;
pub use crate::session::SessionConfig;
pub use crate::state::EngineConfig;

/// Complete fleetwatch configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FleetConfig {
    pub nats: NatsConfig,
    pub ingest: IngestConfig,
    pub engine: EngineConfig,
    pub session: SessionConfig,
    pub api: ApiConfig,
}

/// Where accepted telemetry goes before it reaches the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestMode {
    /// Publish to JetStream; the engine applies events from its consumer
    #[default]
    Nats,
    /// Apply straight to the in-process store
    Direct,
}

impl std::str::FromStr for IngestMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "nats" => Ok(IngestMode::Nats),
            "direct" => Ok(IngestMode::Direct),
            other => Err(format!("unknown ingest mode '{}'", other)),
        }
    }
}

/// Ingestion configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub mode: IngestMode,
    pub body_size_limit_single_bytes: usize,
    pub body_size_limit_batch_bytes: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            mode: IngestMode::default(),
            body_size_limit_single_bytes: 1_048_576, // 1 MB
            body_size_limit_batch_bytes: 10_485_760, // 10 MB
        }
    }
}

/// API configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub bind_addr: String,
    /// Time window for "active reporter" tracking (seconds)
    pub reporter_window_seconds: i64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".to_string(),
            reporter_window_seconds: 10,
        }
    }
}

impl FleetConfig {
    /// Apply FLEETWATCH_* env vars on top of file values
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("FLEETWATCH_INGEST_MODE") {
            if let Ok(mode) = v.parse() {
                self.ingest.mode = mode;
            }
        }
        if let Ok(v) = std::env::var("FLEETWATCH_BIND_ADDR") {
            self.api.bind_addr = v;
        }
        if let Ok(v) = std::env::var("FLEETWATCH_BODY_SIZE_LIMIT_SINGLE_BYTES") {
            if let Ok(n) = v.parse::<usize>() {
                self.ingest.body_size_limit_single_bytes = n;
            }
        }
        if let Ok(v) = std::env::var("FLEETWATCH_BODY_SIZE_LIMIT_BATCH_BYTES") {
            if let Ok(n) = v.parse::<usize>() {
                self.ingest.body_size_limit_batch_bytes = n;
            }
        }
    }
}

/// Load configuration from a TOML file. A missing file yields defaults.
pub fn load_config(path: impl AsRef<Path>) -> Result<FleetConfig> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(FleetConfig::default());
    }

    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config: FleetConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;
    config
        .session
        .default_fence
        .validate()
        .context("Invalid default fence")?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = FleetConfig::default();
        assert_eq!(config.nats.stream_name, "FLEET_TELEMETRY");
        assert_eq!(config.ingest.mode, IngestMode::Nats);
        assert_eq!(config.engine.history_cap, 100);
        assert_eq!(config.engine.silence_timeout_seconds, 30);
        assert_eq!(config.session.alert_cap, 5);
        assert_eq!(config.session.default_fence.radius_km, 1.0);
        assert_eq!(config.api.bind_addr, "0.0.0.0:3000");
    }

    #[test]
    fn test_config_deserialization() {
        let toml = r#"
            [nats]
            url = "nats://example.com:4222"
            stream_name = "TEST_STREAM"

            [ingest]
            mode = "direct"
            body_size_limit_single_bytes = 2048

            [engine]
            history_cap = 50
            silence_timeout_seconds = 60
            fanout_capacity = 64

            [session]
            alert_cap = 10

            [session.default_fence]
            centerLat = 51.5074
            centerLng = -0.1278
            radiusKm = 2.5

            [api]
            bind_addr = "127.0.0.1:8080"
        "#;

        let config: FleetConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.nats.url, "nats://example.com:4222");
        assert_eq!(config.ingest.mode, IngestMode::Direct);
        assert_eq!(config.ingest.body_size_limit_single_bytes, 2048);
        assert_eq!(config.ingest.body_size_limit_batch_bytes, 10_485_760);
        assert_eq!(config.engine.history_cap, 50);
        assert_eq!(config.engine.fanout_capacity, 64);
        assert_eq!(config.engine.sweep_interval_seconds, 5);
        assert_eq!(config.session.alert_cap, 10);
        assert_eq!(config.session.default_fence.center_lat, 51.5074);
        assert_eq!(config.session.default_fence.radius_km, 2.5);
        assert_eq!(config.api.bind_addr, "127.0.0.1:8080");
    }

    #[test]
    fn test_partial_config() {
        // Test that missing sections use defaults
        let toml = r#"
            [engine]
            history_cap = 20
        "#;

        let config: FleetConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.engine.history_cap, 20);
        assert_eq!(config.engine.fanout_capacity, 1024); // Default
        assert_eq!(config.session.route_max_points, 1000); // Default
    }

    #[test]
    fn test_ingest_mode_parse() {
        assert_eq!("direct".parse::<IngestMode>(), Ok(IngestMode::Direct));
        assert_eq!("NATS".parse::<IngestMode>(), Ok(IngestMode::Nats));
        assert!("kafka".parse::<IngestMode>().is_err());
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[ingest]\nmode = \"direct\"\n\n[engine]\nhistory_cap = 7").unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.ingest.mode, IngestMode::Direct);
        assert_eq!(config.engine.history_cap, 7);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.engine.history_cap, 100);
    }

    #[test]
    fn test_load_rejects_invalid_fence() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[session.default_fence]\ncenterLat = 95.0\ncenterLng = 0.0\nradiusKm = 1.0"
        )
        .unwrap();

        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_load_malformed_file_fails() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[engine\nhistory_cap = ").unwrap();

        assert!(load_config(file.path()).is_err());
    }
}
