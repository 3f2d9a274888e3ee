use crate::state::StateEngine;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::debug;

/// Periodically mark silent entities inactive
///
/// Runs in the background next to ingestion. Each sweep locks entities one
/// at a time, so it never stalls telemetry for more than a single entity.
pub async fn run_liveness_sweeper(state_engine: Arc<StateEngine>) {
    let period = Duration::from_secs(state_engine.config().sweep_interval_seconds.max(1));
    let mut ticker = interval(period);

    // Skip missed ticks to prevent backlog under load
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        let swept = state_engine.sweep_inactive(Utc::now());
        debug!(swept = swept.len(), tracked = state_engine.len(), "Liveness sweep complete");
    }
}
