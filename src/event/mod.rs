use crate::geo::Coordinate;
use serde::{Deserialize, Serialize};

mod validation;
#[cfg(test)]
mod tests;

pub use validation::{validate, ValidationError, MAX_ENTITY_ID_LEN};

/// TelemetryEvent is one immutable sensor reading reported by a bike.
///
/// Events arrive over an at-least-once channel: the same event may be
/// delivered more than once and producer timestamps are not globally
/// ordered.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryEvent {
    /// Stable identifier of the reporting entity (e.g., "bike-007")
    pub entity_id: String,

    /// Unix epoch milliseconds (producer time)
    pub timestamp: i64,

    /// Reported position
    pub location: Coordinate,

    /// Reported speed in km/h
    pub speed: f64,

    /// Battery charge, percent
    pub battery_level: f64,
}

impl TelemetryEvent {
    /// Checks entity id, timestamp, coordinate ranges and reading sanity.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validation::validate(self)
    }

    /// NATS subject this event is published on: `fleet.telemetry.{entity_id}`
    pub fn subject(&self, prefix: &str) -> String {
        format!("{}.{}", prefix, sanitize_subject_token(&self.entity_id))
    }
}

/// NATS subject tokens cannot contain '.', '*', '>' or whitespace
fn sanitize_subject_token(token: &str) -> String {
    token
        .chars()
        .map(|c| match c {
            '.' | '*' | '>' => '_',
            c if c.is_whitespace() => '_',
            c => c,
        })
        .collect()
}
