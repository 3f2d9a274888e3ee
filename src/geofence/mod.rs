// Circular geofence classification and breach alerts

use crate::error::SessionError;
use crate::geo::{distance_km, Coordinate};
use crate::state::EntityState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use uuid::Uuid;

#[cfg(test)]
mod tests;

/// Default alert buffer length
pub const DEFAULT_ALERT_CAP: usize = 5;

/// Circular fence: center plus radius
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FenceConfig {
    pub center_lat: f64,
    pub center_lng: f64,
    pub radius_km: f64,
}

impl FenceConfig {
    pub fn new(center_lat: f64, center_lng: f64, radius_km: f64) -> Self {
        Self {
            center_lat,
            center_lng,
            radius_km,
        }
    }

    pub fn center(&self) -> Coordinate {
        Coordinate::new(self.center_lat, self.center_lng)
    }

    pub fn validate(&self) -> Result<(), SessionError> {
        if !self.center().is_valid() {
            return Err(SessionError::InvalidFence(format!(
                "center ({}, {}) is out of range",
                self.center_lat, self.center_lng
            )));
        }
        if !self.radius_km.is_finite() || self.radius_km <= 0.0 {
            return Err(SessionError::InvalidFence(format!(
                "radius must be a positive number of km, got {}",
                self.radius_km
            )));
        }
        Ok(())
    }
}

impl Default for FenceConfig {
    /// Mumbai city center, 1 km
    fn default() -> Self {
        Self::new(19.0760, 72.8777, 1.0)
    }
}

/// Classification of one position against a fence
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FenceStatus {
    pub is_outside_fence: bool,
    /// Distance from the fence center in km
    pub distance_from_fence_center: f64,
}

/// Classify a location: outside means strictly farther than the radius
pub fn evaluate(location: Coordinate, fence: &FenceConfig) -> FenceStatus {
    let distance = distance_km(location, fence.center());
    FenceStatus {
        is_outside_fence: distance > fence.radius_km,
        distance_from_fence_center: distance,
    }
}

/// Raised once when an entity crosses from inside (or unknown) to outside
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: String,
    pub entity_id: String,
    pub distance_km: f64,
    pub timestamp: DateTime<Utc>,
}

impl Alert {
    fn new(entity_id: &str, distance_km: f64) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            entity_id: entity_id.to_string(),
            distance_km,
            timestamp: Utc::now(),
        }
    }
}

/// Most-recent-first alert buffer; the oldest alert is dropped on overflow
#[derive(Clone, Debug)]
pub struct AlertBuffer {
    alerts: VecDeque<Alert>,
    cap: usize,
}

impl AlertBuffer {
    pub fn new(cap: usize) -> Self {
        Self {
            alerts: VecDeque::with_capacity(cap),
            cap,
        }
    }

    pub fn push(&mut self, alert: Alert) {
        self.alerts.push_front(alert);
        self.alerts.truncate(self.cap);
    }

    pub fn clear(&mut self) {
        self.alerts.clear();
    }

    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }

    /// Alerts, newest first
    pub fn to_vec(&self) -> Vec<Alert> {
        self.alerts.iter().cloned().collect()
    }
}

/// Per-session fence classification with rising-edge alerting.
///
/// Only telemetry-driven observations can raise alerts. Fence edits and
/// initial seeding reclassify silently, so an entity already outside never
/// alerts again until it has been seen inside.
#[derive(Debug)]
pub struct GeofenceEvaluator {
    fence: FenceConfig,
    /// entity_id -> last known is_outside_fence
    classifications: HashMap<String, bool>,
    alerts: AlertBuffer,
}

impl GeofenceEvaluator {
    pub fn new(fence: FenceConfig, alert_cap: usize) -> Self {
        Self {
            fence,
            classifications: HashMap::new(),
            alerts: AlertBuffer::new(alert_cap),
        }
    }

    pub fn fence(&self) -> &FenceConfig {
        &self.fence
    }

    /// Classify a telemetry-driven position and raise an alert on an
    /// inside/unknown -> outside transition.
    pub fn observe(&mut self, entity_id: &str, location: Coordinate) -> (FenceStatus, Option<Alert>) {
        let status = evaluate(location, &self.fence);
        let was_outside = self
            .classifications
            .insert(entity_id.to_string(), status.is_outside_fence)
            .unwrap_or(false);

        let alert = if status.is_outside_fence && !was_outside {
            let alert = Alert::new(entity_id, status.distance_from_fence_center);
            self.alerts.push(alert.clone());
            Some(alert)
        } else {
            None
        };

        (status, alert)
    }

    /// Classify without alerting (seeding, fence edits, status-only updates)
    pub fn reclassify(&mut self, entity_id: &str, location: Coordinate) -> FenceStatus {
        let status = evaluate(location, &self.fence);
        self.classifications
            .insert(entity_id.to_string(), status.is_outside_fence);
        status
    }

    /// Replace the fence and silently reclassify every given entity
    pub fn set_fence(
        &mut self,
        fence: FenceConfig,
        entities: &[EntityState],
    ) -> Result<Vec<(String, FenceStatus)>, SessionError> {
        fence.validate()?;
        self.fence = fence;

        Ok(entities
            .iter()
            .map(|e| (e.entity_id.clone(), self.reclassify(&e.entity_id, e.current_location)))
            .collect())
    }

    /// Drop every classification; the next observation of any entity is
    /// treated as coming from inside
    pub fn forget_all(&mut self) {
        self.classifications.clear();
    }

    /// Last known classification for an entity
    pub fn is_outside(&self, entity_id: &str) -> Option<bool> {
        self.classifications.get(entity_id).copied()
    }

    /// Alerts, newest first
    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.to_vec()
    }

    pub fn clear_alerts(&mut self) {
        self.alerts.clear();
    }
}
