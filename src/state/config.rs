use serde::{Deserialize, Serialize};

/// Configuration for the entity state store
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Location samples retained per entity (oldest evicted)
    pub history_cap: usize,

    /// Silence after which an active entity is marked inactive (seconds)
    pub silence_timeout_seconds: u64,

    /// Interval between liveness sweeps (seconds)
    pub sweep_interval_seconds: u64,

    /// Bounded per-observer queue length; lagging observers lose the oldest updates
    pub fanout_capacity: usize,

    /// Movements at or below this distance count as GPS noise (meters)
    pub noise_threshold_m: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            history_cap: 100,
            silence_timeout_seconds: 30,
            sweep_interval_seconds: 5,
            fanout_capacity: 1024,
            noise_threshold_m: 1.0,
        }
    }
}
