use crate::error::SessionError;
use crate::geofence::{evaluate, Alert, FenceConfig, FenceStatus, GeofenceEvaluator};
use crate::route::{RouteSummary, RouteTracker};
use crate::session::config::SessionConfig;
use crate::state::{EntityState, StateUpdate, UpdateKind};
use serde::Serialize;
use std::collections::HashMap;

/// Entity state as seen by one session: store fields plus that session's
/// fence classification
#[derive(Clone, Debug, Serialize)]
pub struct EntityView {
    #[serde(flatten)]
    pub state: EntityState,
    #[serde(flatten)]
    pub fence: FenceStatus,
}

/// Composite update pushed to a session
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FleetUpdate {
    pub sequence: u64,
    pub kind: UpdateKind,
    pub entity: EntityView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert: Option<Alert>,
    /// Route distance in km; present only while tracking is enabled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route_distance_km: Option<f64>,
}

/// Full catch-up view of a session
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session_id: String,
    pub fence: FenceConfig,
    pub tracking: bool,
    pub entities: Vec<EntityView>,
    pub alerts: Vec<Alert>,
    pub routes: Vec<RouteSummary>,
}

/// What a session delivers to its observer
#[derive(Clone, Debug)]
pub enum SessionEvent {
    Update(FleetUpdate),
    /// The store was reset; the session's entities and routes are gone
    Reset { removed: usize },
}

/// Per-session derived state: fence classification, alerts and routes.
///
/// Driven from the engine's commit path, so it reflects every committed
/// update regardless of how fast the observer drains its queue. `known`
/// holds the latest entity state this view has processed; fence and
/// tracking changes work from it rather than from the live store.
#[derive(Debug)]
pub struct SessionView {
    evaluator: GeofenceEvaluator,
    routes: RouteTracker,
    tracking: bool,
    known: HashMap<String, EntityState>,
}

impl SessionView {
    pub fn new(config: &SessionConfig, noise_threshold_m: f64) -> Self {
        Self {
            evaluator: GeofenceEvaluator::new(config.default_fence, config.alert_cap),
            routes: RouteTracker::new(noise_threshold_m, config.route_max_points),
            tracking: false,
            known: HashMap::new(),
        }
    }

    /// Silently classify entities from a store snapshot.
    ///
    /// Entities the view already processed an update for are skipped: that
    /// update is at least as new as the snapshot.
    pub fn seed(&mut self, entities: Vec<EntityState>) {
        for entity in entities {
            if self.known.contains_key(&entity.entity_id) {
                continue;
            }
            self.evaluator
                .reclassify(&entity.entity_id, entity.current_location);
            self.known.insert(entity.entity_id.clone(), entity);
        }
    }

    /// Derive the session's composite update for a committed state change.
    ///
    /// Only telemetry-driven updates can raise alerts or extend routes.
    pub fn apply(&mut self, update: &StateUpdate) -> FleetUpdate {
        let entity_id = update.entity.entity_id.as_str();
        let location = update.entity.current_location;
        self.known
            .insert(entity_id.to_string(), update.entity.clone());

        let (fence, alert) = if update.kind.is_telemetry() {
            self.evaluator.observe(entity_id, location)
        } else {
            (self.evaluator.reclassify(entity_id, location), None)
        };

        let route_distance_km = if self.tracking {
            if update.kind.is_telemetry() {
                self.routes.record_point(entity_id, location);
            }
            Some(self.routes.cumulative_distance(entity_id))
        } else {
            None
        };

        FleetUpdate {
            sequence: update.sequence,
            kind: update.kind,
            entity: EntityView {
                state: update.entity.clone(),
                fence,
            },
            alert,
            route_distance_km,
        }
    }

    /// Entities this view knows about, ordered by id
    fn entities(&self) -> Vec<EntityState> {
        let mut entities: Vec<EntityState> = self.known.values().cloned().collect();
        entities.sort_by(|a, b| a.entity_id.cmp(&b.entity_id));
        entities
    }

    /// Classify an entity against the current fence without touching alert
    /// state
    pub fn view_of(&self, state: EntityState) -> EntityView {
        let fence = evaluate(state.current_location, self.evaluator.fence());
        EntityView { state, fence }
    }

    pub fn set_fence(&mut self, fence: FenceConfig) -> Result<Vec<EntityView>, SessionError> {
        let entities = self.entities();
        let statuses = self.evaluator.set_fence(fence, &entities)?;
        Ok(entities
            .into_iter()
            .zip(statuses)
            .map(|(state, (_, fence))| EntityView { state, fence })
            .collect())
    }

    /// Enable or disable route tracking. Enabling (re)starts every route
    /// from the last position this view processed; disabling discards all
    /// routes.
    pub fn set_tracking(&mut self, enabled: bool) {
        self.routes.reset(None);
        self.tracking = enabled;

        if enabled {
            for entity in self.known.values() {
                self.routes
                    .record_point(&entity.entity_id, entity.current_location);
            }
        }
    }

    pub fn reset_routes(&mut self, entity_id: Option<&str>) {
        self.routes.reset(entity_id);
    }

    /// Forget every entity after a store reset. Alerts already raised stay
    /// in the buffer; the tracking flag is kept.
    pub fn reset(&mut self) {
        self.known.clear();
        self.evaluator.forget_all();
        self.routes.reset(None);
    }

    pub fn clear_alerts(&mut self) {
        self.evaluator.clear_alerts();
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.evaluator.alerts()
    }

    pub fn routes(&self) -> Vec<RouteSummary> {
        self.routes.summaries()
    }

    pub fn fence(&self) -> FenceConfig {
        *self.evaluator.fence()
    }

    pub fn tracking(&self) -> bool {
        self.tracking
    }

    pub fn snapshot(&self, session_id: &str) -> SessionSnapshot {
        SessionSnapshot {
            session_id: session_id.to_string(),
            fence: self.fence(),
            tracking: self.tracking,
            entities: self
                .entities()
                .into_iter()
                .map(|e| self.view_of(e))
                .collect(),
            alerts: self.alerts(),
            routes: self.routes(),
        }
    }
}
