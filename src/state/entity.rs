use crate::event::TelemetryEvent;
use crate::geo::{distance_m, Coordinate};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Advisory liveness status of a tracked entity
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityStatus {
    Active,
    Inactive,
    Maintenance,
}

/// Authoritative per-entity record held by the state store.
///
/// Fence classification is not stored here: it depends on the observing
/// session's fence and lives in that session's derived view.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityState {
    pub entity_id: String,

    pub current_location: Coordinate,

    /// Mean reported speed over the retained location history (km/h)
    pub avg_speed: f64,

    pub battery_level: f64,

    /// Store receipt time of the most recent event
    pub last_seen: DateTime<Utc>,

    /// Producer timestamp (epoch ms) of the most recent applied event
    pub last_reported_at: i64,

    pub status: EntityStatus,

    /// Total travelled distance in km; never decreases
    #[serde(rename = "cumulativeDistance")]
    pub cumulative_distance_km: f64,
}

/// One retained position sample
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    pub lat: f64,
    pub lng: f64,
    pub timestamp: i64,
    pub speed: f64,
}

impl HistoryPoint {
    pub fn location(&self) -> Coordinate {
        Coordinate::new(self.lat, self.lng)
    }
}

/// Bounded FIFO of recent positions (oldest evicted first)
#[derive(Clone, Debug)]
pub struct LocationHistory {
    points: VecDeque<HistoryPoint>,
    cap: usize,
}

impl LocationHistory {
    pub fn new(cap: usize) -> Self {
        let cap = cap.max(1);
        Self {
            points: VecDeque::with_capacity(cap),
            cap,
        }
    }

    pub fn push(&mut self, point: HistoryPoint) {
        while self.points.len() >= self.cap {
            self.points.pop_front();
        }
        self.points.push_back(point);
    }

    pub fn latest(&self) -> Option<&HistoryPoint> {
        self.points.back()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    pub fn to_vec(&self) -> Vec<HistoryPoint> {
        self.points.iter().copied().collect()
    }

    /// Mean speed over the retained window
    pub fn avg_speed(&self) -> f64 {
        if self.points.is_empty() {
            return 0.0;
        }
        self.points.iter().map(|p| p.speed).sum::<f64>() / self.points.len() as f64
    }
}

/// How a telemetry event (or control action) changed an entity
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateKind {
    /// First event for a previously unseen entity
    Created,
    /// Newer event applied to position, speed and battery
    Moved,
    /// Same timestamp and position as the newest sample; liveness refreshed only
    Duplicate,
    /// Producer timestamp older than the newest sample; liveness refreshed only
    Late,
    /// Status changed without a position change (sweep, reactivation, control)
    StatusChanged,
}

impl UpdateKind {
    /// Whether observers are notified of this update
    pub fn is_broadcast(&self) -> bool {
        !matches!(self, UpdateKind::Duplicate | UpdateKind::Late)
    }

    /// Whether the update carries a new position from telemetry
    pub fn is_telemetry(&self) -> bool {
        matches!(self, UpdateKind::Created | UpdateKind::Moved)
    }
}

/// Committed state change broadcast to observers
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateUpdate {
    /// Store-wide commit sequence; increases in commit order
    pub sequence: u64,
    pub kind: UpdateKind,
    pub entity: EntityState,
    pub timestamp: DateTime<Utc>,
}

/// Store-internal record: the public state plus its location history
#[derive(Clone, Debug)]
pub(crate) struct TrackedEntity {
    pub(crate) state: EntityState,
    pub(crate) history: LocationHistory,
}

impl TrackedEntity {
    /// Build the record for the first event of an unseen entity
    pub(crate) fn new(event: &TelemetryEvent, now: DateTime<Utc>, history_cap: usize) -> Self {
        let mut history = LocationHistory::new(history_cap);
        history.push(HistoryPoint {
            lat: event.location.lat,
            lng: event.location.lng,
            timestamp: event.timestamp,
            speed: event.speed,
        });

        Self {
            state: EntityState {
                entity_id: event.entity_id.clone(),
                current_location: event.location,
                avg_speed: history.avg_speed(),
                battery_level: event.battery_level,
                last_seen: now,
                last_reported_at: event.timestamp,
                status: EntityStatus::Active,
                cumulative_distance_km: 0.0,
            },
            history,
        }
    }

    /// Apply a validated event received at `now`.
    ///
    /// Movements of `noise_threshold_m` or less add nothing to the
    /// cumulative distance.
    pub(crate) fn apply(
        &mut self,
        event: &TelemetryEvent,
        now: DateTime<Utc>,
        noise_threshold_m: f64,
    ) -> UpdateKind {
        self.state.last_seen = now;

        let reactivated = self.state.status == EntityStatus::Inactive;
        if reactivated {
            self.state.status = EntityStatus::Active;
        }

        if let Some(latest) = self.history.latest() {
            let stale = event.timestamp < latest.timestamp;
            let repeated = event.timestamp == latest.timestamp && event.location == latest.location();
            if stale || repeated {
                return match (reactivated, stale) {
                    (true, _) => UpdateKind::StatusChanged,
                    (false, true) => UpdateKind::Late,
                    (false, false) => UpdateKind::Duplicate,
                };
            }
        }

        let delta_m = distance_m(self.state.current_location, event.location);
        if delta_m > noise_threshold_m {
            self.state.cumulative_distance_km += delta_m / 1000.0;
        }

        self.history.push(HistoryPoint {
            lat: event.location.lat,
            lng: event.location.lng,
            timestamp: event.timestamp,
            speed: event.speed,
        });

        self.state.current_location = event.location;
        self.state.battery_level = event.battery_level;
        self.state.last_reported_at = event.timestamp;
        self.state.avg_speed = self.history.avg_speed();

        UpdateKind::Moved
    }
}
