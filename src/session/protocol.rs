use crate::geofence::{Alert, FenceConfig};
use crate::route::RouteSummary;
use crate::session::view::{EntityView, FleetUpdate, SessionSnapshot};
use serde::{Deserialize, Serialize};

/// Client → Server session control messages
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    #[serde(rename_all = "camelCase")]
    SetFence {
        center_lat: f64,
        center_lng: f64,
        radius_km: f64,
    },
    SetTracking {
        enabled: bool,
    },
    ClearAlerts,
    #[serde(rename_all = "camelCase")]
    ResetRoutes {
        #[serde(default)]
        entity_id: Option<String>,
    },
    Snapshot,
}

/// Server → Client messages
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Full session state, sent on connect and on request
    Snapshot(SessionSnapshot),
    /// One committed entity update
    FleetUpdate(FleetUpdate),
    /// The store was reset; every entity is gone
    FleetReset {
        removed: usize,
    },
    /// Fence changed; every entity reclassified
    FenceUpdated {
        fence: FenceConfig,
        entities: Vec<EntityView>,
    },
    Alerts {
        alerts: Vec<Alert>,
    },
    Routes {
        tracking: bool,
        routes: Vec<RouteSummary>,
    },
    Error {
        error: String,
    },
}

impl ServerMessage {
    pub fn error(error: impl Into<String>) -> Self {
        ServerMessage::Error {
            error: error.into(),
        }
    }
}
