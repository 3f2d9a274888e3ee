// Route accumulation with GPS-noise suppression

use crate::geo::{distance_m, Coordinate};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};


/// Polyline of one entity's accepted positions
#[derive(Clone, Debug, Default)]
struct Route {
    points: VecDeque<Coordinate>,
    /// Last accepted point, kept even when `points` is trimmed
    last: Option<Coordinate>,
    distance_km: f64,
}

/// Serializable view of a route
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteSummary {
    pub entity_id: String,
    pub points: Vec<Coordinate>,
    pub distance_km: f64,
}

/// Records simplified routes for every entity while tracking is enabled.
///
/// A point is appended only when it lies more than `noise_threshold_m` from
/// the previous accepted point; the route distance grows by exactly that
/// delta, so it is monotonic and O(1) per point. At most `max_points` are
/// retained per route (oldest dropped); trimming never reduces distance.
#[derive(Debug)]
pub struct RouteTracker {
    routes: HashMap<String, Route>,
    noise_threshold_m: f64,
    max_points: usize,
}

impl RouteTracker {
    pub fn new(noise_threshold_m: f64, max_points: usize) -> Self {
        Self {
            routes: HashMap::new(),
            noise_threshold_m,
            max_points: max_points.max(2),
        }
    }

    /// Append `location` to the entity's route. Returns false when the
    /// point is within the noise threshold of the last accepted one.
    pub fn record_point(&mut self, entity_id: &str, location: Coordinate) -> bool {
        let route = self.routes.entry(entity_id.to_string()).or_default();

        if let Some(last) = route.last {
            let delta_m = distance_m(last, location);
            if delta_m <= self.noise_threshold_m {
                return false;
            }
            route.distance_km += delta_m / 1000.0;
        }

        if route.points.len() >= self.max_points {
            route.points.pop_front();
        }
        route.points.push_back(location);
        route.last = Some(location);
        true
    }

    /// Distance travelled along the recorded route in km (0 when unknown)
    pub fn cumulative_distance(&self, entity_id: &str) -> f64 {
        self.routes.get(entity_id).map_or(0.0, |r| r.distance_km)
    }

    pub fn point_count(&self, entity_id: &str) -> usize {
        self.routes.get(entity_id).map_or(0, |r| r.points.len())
    }

    /// Clear one entity's route, or every route when `entity_id` is None
    pub fn reset(&mut self, entity_id: Option<&str>) {
        match entity_id {
            Some(id) => {
                self.routes.remove(id);
            }
            None => self.routes.clear(),
        }
    }

    pub fn summary(&self, entity_id: &str) -> Option<RouteSummary> {
        self.routes.get(entity_id).map(|route| RouteSummary {
            entity_id: entity_id.to_string(),
            points: route.points.iter().copied().collect(),
            distance_km: route.distance_km,
        })
    }

    /// All routes, ordered by entity id
    pub fn summaries(&self) -> Vec<RouteSummary> {
        let mut ids: Vec<&String> = self.routes.keys().collect();
        ids.sort();
        ids.into_iter().filter_map(|id| self.summary(id)).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
