use super::TelemetryEvent;
use crate::geo::{is_valid_latitude, is_valid_longitude};
use std::fmt;

/// Longest entity id accepted from producers
pub const MAX_ENTITY_ID_LEN: usize = 128;

/// Validation errors for TelemetryEvent
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    MissingEntityId,
    EntityIdTooLong(usize),
    InvalidTimestamp(i64),
    InvalidLatitude(f64),
    InvalidLongitude(f64),
    InvalidSpeed(f64),
    InvalidBatteryLevel(f64),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::MissingEntityId => write!(f, "entityId is required"),
            ValidationError::EntityIdTooLong(len) => {
                write!(f, "entityId is {} bytes, limit is {}", len, MAX_ENTITY_ID_LEN)
            }
            ValidationError::InvalidTimestamp(ts) => {
                write!(f, "timestamp must be positive, got {}", ts)
            }
            ValidationError::InvalidLatitude(lat) => {
                write!(f, "latitude must be within [-90, 90], got {}", lat)
            }
            ValidationError::InvalidLongitude(lng) => {
                write!(f, "longitude must be within [-180, 180], got {}", lng)
            }
            ValidationError::InvalidSpeed(speed) => {
                write!(f, "speed must be a finite non-negative number, got {}", speed)
            }
            ValidationError::InvalidBatteryLevel(level) => {
                write!(f, "batteryLevel must be within [0, 100], got {}", level)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Validates a TelemetryEvent before it reaches the state store.
///
/// Validation rules:
/// - entityId: non-empty (after trimming), at most 128 bytes
/// - timestamp: positive Unix epoch milliseconds
/// - location: lat ∈ [-90, 90], lng ∈ [-180, 180], both finite
/// - speed: finite, ≥ 0
/// - batteryLevel: finite, within [0, 100]
///
/// Battery and speed are not required to be monotonic across events.
pub fn validate(event: &TelemetryEvent) -> Result<(), ValidationError> {
    if event.entity_id.trim().is_empty() {
        return Err(ValidationError::MissingEntityId);
    }
    if event.entity_id.len() > MAX_ENTITY_ID_LEN {
        return Err(ValidationError::EntityIdTooLong(event.entity_id.len()));
    }

    if event.timestamp <= 0 {
        return Err(ValidationError::InvalidTimestamp(event.timestamp));
    }

    if !is_valid_latitude(event.location.lat) {
        return Err(ValidationError::InvalidLatitude(event.location.lat));
    }
    if !is_valid_longitude(event.location.lng) {
        return Err(ValidationError::InvalidLongitude(event.location.lng));
    }

    if !event.speed.is_finite() || event.speed < 0.0 {
        return Err(ValidationError::InvalidSpeed(event.speed));
    }

    if !event.battery_level.is_finite() || !(0.0..=100.0).contains(&event.battery_level) {
        return Err(ValidationError::InvalidBatteryLevel(event.battery_level));
    }

    Ok(())
}
