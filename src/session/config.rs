use crate::geofence::{FenceConfig, DEFAULT_ALERT_CAP};
use serde::{Deserialize, Serialize};

/// Defaults applied to every newly opened observer session
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Alerts retained per session (most recent first)
    pub alert_cap: usize,

    /// Points retained per tracked route
    pub route_max_points: usize,

    /// Fence a session starts with
    pub default_fence: FenceConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            alert_cap: DEFAULT_ALERT_CAP,
            route_max_points: 1000,
            default_fence: FenceConfig::default(),
        }
    }
}
