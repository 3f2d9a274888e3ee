use super::*;
use crate::state::EntityStatus;

const CENTER: Coordinate = Coordinate {
    lat: 19.0760,
    lng: 72.8777,
};
// ~2.1 km north of the center
const NORTH: Coordinate = Coordinate {
    lat: 19.0950,
    lng: 72.8777,
};

fn state_at(entity_id: &str, location: Coordinate) -> EntityState {
    EntityState {
        entity_id: entity_id.to_string(),
        current_location: location,
        avg_speed: 0.0,
        battery_level: 100.0,
        last_seen: Utc::now(),
        last_reported_at: 1_000,
        status: EntityStatus::Active,
        cumulative_distance_km: 0.0,
    }
}

#[test]
fn test_center_is_inside() {
    let status = evaluate(CENTER, &FenceConfig::default());
    assert!(!status.is_outside_fence);
    assert_eq!(status.distance_from_fence_center, 0.0);
}

#[test]
fn test_far_point_is_outside() {
    let status = evaluate(NORTH, &FenceConfig::default());
    assert!(status.is_outside_fence);
    assert!((status.distance_from_fence_center - 2.11).abs() < 0.01);
}

#[test]
fn test_alert_raised_once_per_breach() {
    let mut evaluator = GeofenceEvaluator::new(FenceConfig::default(), DEFAULT_ALERT_CAP);

    let (status, alert) = evaluator.observe("bike-001", CENTER);
    assert!(!status.is_outside_fence);
    assert!(alert.is_none());

    let (status, alert) = evaluator.observe("bike-001", NORTH);
    assert!(status.is_outside_fence);
    let alert = alert.expect("breach should alert");
    assert_eq!(alert.entity_id, "bike-001");
    assert!((alert.distance_km - 2.11).abs() < 0.01);

    // Still outside: no new alert
    for _ in 0..3 {
        let (_, alert) = evaluator.observe("bike-001", NORTH);
        assert!(alert.is_none());
    }
    assert_eq!(evaluator.alerts().len(), 1);

    // Back inside, then out again: a second breach
    evaluator.observe("bike-001", CENTER);
    let (_, alert) = evaluator.observe("bike-001", NORTH);
    assert!(alert.is_some());
    assert_eq!(evaluator.alerts().len(), 2);
}

#[test]
fn test_unknown_to_outside_alerts() {
    let mut evaluator = GeofenceEvaluator::new(FenceConfig::default(), DEFAULT_ALERT_CAP);
    let (_, alert) = evaluator.observe("bike-new", NORTH);
    assert!(alert.is_some());
}

#[test]
fn test_silent_reclassify_suppresses_alert_for_already_outside() {
    let mut evaluator = GeofenceEvaluator::new(FenceConfig::default(), DEFAULT_ALERT_CAP);

    let status = evaluator.reclassify("bike-001", NORTH);
    assert!(status.is_outside_fence);
    assert!(evaluator.alerts().is_empty());

    let (_, alert) = evaluator.observe("bike-001", NORTH);
    assert!(alert.is_none());
}

#[test]
fn test_forget_all_rearms_alerts() {
    let mut evaluator = GeofenceEvaluator::new(FenceConfig::default(), DEFAULT_ALERT_CAP);
    evaluator.observe("bike-001", NORTH);

    evaluator.forget_all();
    assert_eq!(evaluator.is_outside("bike-001"), None);

    let (_, alert) = evaluator.observe("bike-001", NORTH);
    assert!(alert.is_some());
    assert_eq!(evaluator.alerts().len(), 2);
}

#[test]
fn test_radius_change_reclassifies_without_alerts() {
    let mut evaluator = GeofenceEvaluator::new(FenceConfig::default(), DEFAULT_ALERT_CAP);
    let (_, alert) = evaluator.observe("bike-001", NORTH);
    assert!(alert.is_some());
    evaluator.clear_alerts();

    let entities = vec![state_at("bike-001", NORTH)];

    let widened = evaluator
        .set_fence(FenceConfig::new(19.0760, 72.8777, 5.0), &entities)
        .unwrap();
    assert!(!widened[0].1.is_outside_fence);
    assert_eq!(evaluator.is_outside("bike-001"), Some(false));

    let narrowed = evaluator
        .set_fence(FenceConfig::new(19.0760, 72.8777, 1.0), &entities)
        .unwrap();
    assert!(narrowed[0].1.is_outside_fence);
    assert_eq!(evaluator.is_outside("bike-001"), Some(true));

    assert!(evaluator.alerts().is_empty());

    // Telemetry while still outside does not alert either
    let (_, alert) = evaluator.observe("bike-001", NORTH);
    assert!(alert.is_none());
}

#[test]
fn test_center_change_reclassifies() {
    let mut evaluator = GeofenceEvaluator::new(FenceConfig::default(), DEFAULT_ALERT_CAP);
    evaluator.observe("bike-001", CENTER);

    let moved = FenceConfig::new(NORTH.lat, NORTH.lng, 1.0);
    let result = evaluator
        .set_fence(moved, &[state_at("bike-001", CENTER)])
        .unwrap();

    assert!(result[0].1.is_outside_fence);
    assert_eq!(evaluator.fence(), &moved);
    assert!(evaluator.alerts().is_empty());
}

#[test]
fn test_invalid_fence_is_rejected() {
    let mut evaluator = GeofenceEvaluator::new(FenceConfig::default(), DEFAULT_ALERT_CAP);

    assert!(matches!(
        evaluator.set_fence(FenceConfig::new(19.0, 72.0, 0.0), &[]),
        Err(SessionError::InvalidFence(_))
    ));
    assert!(matches!(
        evaluator.set_fence(FenceConfig::new(95.0, 72.0, 1.0), &[]),
        Err(SessionError::InvalidFence(_))
    ));

    // Fence unchanged after rejection
    assert_eq!(evaluator.fence(), &FenceConfig::default());
}

#[test]
fn test_alert_buffer_keeps_most_recent_five() {
    let mut evaluator = GeofenceEvaluator::new(FenceConfig::default(), DEFAULT_ALERT_CAP);

    for i in 0..8 {
        let (_, alert) = evaluator.observe(&format!("bike-{}", i), NORTH);
        assert!(alert.is_some());
    }

    let alerts = evaluator.alerts();
    assert_eq!(alerts.len(), 5);
    // Newest first; bikes 0..3 evicted
    assert_eq!(alerts[0].entity_id, "bike-7");
    assert_eq!(alerts[4].entity_id, "bike-3");
}

#[test]
fn test_clear_alerts_keeps_classification() {
    let mut evaluator = GeofenceEvaluator::new(FenceConfig::default(), DEFAULT_ALERT_CAP);
    evaluator.observe("bike-001", NORTH);

    evaluator.clear_alerts();
    assert!(evaluator.alerts().is_empty());

    let (_, alert) = evaluator.observe("bike-001", NORTH);
    assert!(alert.is_none());
}

#[test]
fn test_alert_buffer_cap() {
    let mut buffer = AlertBuffer::new(2);
    for i in 0..4 {
        buffer.push(Alert::new(&format!("bike-{}", i), 2.0));
    }
    assert_eq!(buffer.len(), 2);
    assert_eq!(buffer.to_vec()[0].entity_id, "bike-3");
}
