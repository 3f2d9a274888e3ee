use super::*;
use serde_json::json;

fn valid_event() -> TelemetryEvent {
    TelemetryEvent {
        entity_id: "bike-001".to_string(),
        timestamp: 1707668400000, // 2024-02-11 16:20:00 UTC
        location: Coordinate::new(19.0760, 72.8777),
        speed: 14.5,
        battery_level: 87.0,
    }
}

#[test]
fn test_valid_event_passes_validation() {
    assert!(valid_event().validate().is_ok());
}

#[test]
fn test_boundary_coordinates_pass_validation() {
    let mut event = valid_event();
    event.location = Coordinate::new(-90.0, 180.0);
    assert!(event.validate().is_ok());

    event.location = Coordinate::new(90.0, -180.0);
    assert!(event.validate().is_ok());
}

#[test]
fn test_missing_entity_id_fails() {
    let mut event = valid_event();
    event.entity_id = "   ".to_string();
    assert_eq!(event.validate().unwrap_err(), ValidationError::MissingEntityId);
}

#[test]
fn test_oversized_entity_id_fails() {
    let mut event = valid_event();
    event.entity_id = "b".repeat(MAX_ENTITY_ID_LEN + 1);
    assert_eq!(
        event.validate().unwrap_err(),
        ValidationError::EntityIdTooLong(MAX_ENTITY_ID_LEN + 1)
    );
}

#[test]
fn test_invalid_timestamp_fails() {
    let mut event = valid_event();
    event.timestamp = 0;
    assert_eq!(event.validate().unwrap_err(), ValidationError::InvalidTimestamp(0));
}

#[test]
fn test_out_of_range_latitude_fails() {
    let mut event = valid_event();
    event.location.lat = 91.0;
    assert_eq!(event.validate().unwrap_err(), ValidationError::InvalidLatitude(91.0));
}

#[test]
fn test_out_of_range_longitude_fails() {
    let mut event = valid_event();
    event.location.lng = -181.0;
    assert_eq!(
        event.validate().unwrap_err(),
        ValidationError::InvalidLongitude(-181.0)
    );
}

#[test]
fn test_nan_latitude_fails() {
    let mut event = valid_event();
    event.location.lat = f64::NAN;
    match event.validate().unwrap_err() {
        ValidationError::InvalidLatitude(_) => {}
        other => panic!("Expected InvalidLatitude, got {:?}", other),
    }
}

#[test]
fn test_negative_speed_fails() {
    let mut event = valid_event();
    event.speed = -1.0;
    assert_eq!(event.validate().unwrap_err(), ValidationError::InvalidSpeed(-1.0));
}

#[test]
fn test_battery_out_of_range_fails() {
    let mut event = valid_event();
    event.battery_level = 100.5;
    assert_eq!(
        event.validate().unwrap_err(),
        ValidationError::InvalidBatteryLevel(100.5)
    );
}

#[test]
fn test_battery_increase_is_accepted() {
    // Producers may report charging; validation is per-event only
    let mut event = valid_event();
    event.battery_level = 100.0;
    assert!(event.validate().is_ok());
}

#[test]
fn test_deserialize_camel_case_payload() {
    let payload = json!({
        "entityId": "bike-042",
        "timestamp": 1707668400000i64,
        "location": { "lat": 19.09, "lng": 72.88 },
        "speed": 12.0,
        "batteryLevel": 64.5
    });

    let event: TelemetryEvent = serde_json::from_value(payload).unwrap();
    assert_eq!(event.entity_id, "bike-042");
    assert_eq!(event.location, Coordinate::new(19.09, 72.88));
    assert_eq!(event.battery_level, 64.5);
}

#[test]
fn test_deserialize_missing_location_fails() {
    let payload = json!({
        "entityId": "bike-042",
        "timestamp": 1707668400000i64,
        "speed": 12.0,
        "batteryLevel": 64.5
    });

    assert!(serde_json::from_value::<TelemetryEvent>(payload).is_err());
}

#[test]
fn test_subject_sanitizes_entity_id() {
    let mut event = valid_event();
    event.entity_id = "fleet.bike *7>".to_string();
    assert_eq!(event.subject("fleet.telemetry"), "fleet.telemetry.fleet_bike__7_");
}

#[test]
fn test_validation_error_messages_name_the_field() {
    assert!(ValidationError::InvalidLatitude(91.0)
        .to_string()
        .contains("latitude"));
    assert!(ValidationError::MissingEntityId.to_string().contains("entityId"));
}
