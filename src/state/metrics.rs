use chrono::Utc;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// Width of the event-rate sliding window
const RATE_WINDOW_MS: i64 = 5000;

/// Tracks ingestion and delivery metrics for the fleet engine
#[derive(Clone)]
pub struct MetricsTracker {
    /// Accepted telemetry events (lifetime counter)
    total_events: Arc<AtomicU64>,

    /// Events rejected by validation or deserialization
    rejected_events: Arc<AtomicU64>,

    duplicate_events: Arc<AtomicU64>,

    late_events: Arc<AtomicU64>,

    /// Updates dropped because an observer queue overflowed
    dropped_deliveries: Arc<AtomicU64>,

    /// Event timestamps for rate calculation (sliding 5-second window)
    event_timestamps: Arc<RwLock<VecDeque<i64>>>,

    /// Reporting entities (entity_id -> last_seen_timestamp_ms)
    reporters: Arc<RwLock<HashMap<String, i64>>>,

    /// Open observer sessions
    sessions: Arc<AtomicU64>,
}

impl MetricsTracker {
    /// Create new metrics tracker
    pub fn new() -> Self {
        Self {
            total_events: Arc::new(AtomicU64::new(0)),
            rejected_events: Arc::new(AtomicU64::new(0)),
            duplicate_events: Arc::new(AtomicU64::new(0)),
            late_events: Arc::new(AtomicU64::new(0)),
            dropped_deliveries: Arc::new(AtomicU64::new(0)),
            event_timestamps: Arc::new(RwLock::new(VecDeque::new())),
            reporters: Arc::new(RwLock::new(HashMap::new())),
            sessions: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Record an accepted event (call from StateEngine::apply_telemetry)
    pub fn record_event(&self, entity_id: &str) {
        self.total_events.fetch_add(1, Ordering::Relaxed);

        let now = Utc::now().timestamp_millis();

        {
            let mut timestamps = self
                .event_timestamps
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            timestamps.push_back(now);

            while let Some(&oldest) = timestamps.front() {
                if now - oldest > RATE_WINDOW_MS {
                    timestamps.pop_front();
                } else {
                    break;
                }
            }
        }

        let mut reporters = self.reporters.write().unwrap_or_else(PoisonError::into_inner);
        reporters.insert(entity_id.to_string(), now);
    }

    pub fn record_rejected(&self) {
        self.rejected_events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_duplicate(&self) {
        self.duplicate_events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_late(&self) {
        self.late_events.fetch_add(1, Ordering::Relaxed);
    }

    /// Record updates an observer lost to queue overflow
    pub fn record_dropped(&self, count: u64) {
        self.dropped_deliveries.fetch_add(count, Ordering::Relaxed);
    }

    /// Get current event rate (events per second over last 5 seconds)
    pub fn get_event_rate(&self) -> f64 {
        let timestamps = self
            .event_timestamps
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        timestamps.len() as f64 / (RATE_WINDOW_MS as f64 / 1000.0)
    }

    /// Get count of entities that reported within the window.
    ///
    /// Reporters outside the window are pruned.
    pub fn get_active_reporter_count(&self, window_seconds: i64) -> usize {
        let now = Utc::now().timestamp_millis();
        let threshold = now - (window_seconds * 1000);

        let mut reporters = self.reporters.write().unwrap_or_else(PoisonError::into_inner);
        reporters.retain(|_, &mut last_seen| last_seen > threshold);
        reporters.len()
    }

    /// Forget every reporter (store reset)
    pub fn clear_reporters(&self) {
        self.reporters
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn increment_sessions(&self) {
        self.sessions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn decrement_sessions(&self) {
        self.sessions.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn get_session_count(&self) -> u64 {
        self.sessions.load(Ordering::Relaxed)
    }

    /// Get total accepted events
    pub fn get_total_events(&self) -> u64 {
        self.total_events.load(Ordering::Relaxed)
    }

    pub fn get_rejected_events(&self) -> u64 {
        self.rejected_events.load(Ordering::Relaxed)
    }

    pub fn get_dropped_deliveries(&self) -> u64 {
        self.dropped_deliveries.load(Ordering::Relaxed)
    }

    /// Get snapshot of all metrics
    pub fn get_snapshot(&self, reporter_window_seconds: i64) -> MetricsSnapshot {
        MetricsSnapshot {
            total_events: self.get_total_events(),
            rejected_events: self.get_rejected_events(),
            duplicate_events: self.duplicate_events.load(Ordering::Relaxed),
            late_events: self.late_events.load(Ordering::Relaxed),
            dropped_deliveries: self.get_dropped_deliveries(),
            event_rate: self.get_event_rate(),
            active_reporters: self.get_active_reporter_count(reporter_window_seconds),
            sessions: self.get_session_count(),
        }
    }
}

impl Default for MetricsTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub total_events: u64,
    pub rejected_events: u64,
    pub duplicate_events: u64,
    pub late_events: u64,
    pub dropped_deliveries: u64,
    pub event_rate: f64,
    pub active_reporters: usize,
    pub sessions: u64,
}
