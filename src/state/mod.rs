// Entity state store, liveness and ingestion metrics

pub mod config;
mod engine;
mod entity;
mod liveness;
mod metrics;

pub use config::EngineConfig;
pub use engine::{CommitObserver, StateEngine};
pub use entity::{
    EntityState, EntityStatus, HistoryPoint, LocationHistory, StateUpdate, UpdateKind,
};
pub use liveness::run_liveness_sweeper;
pub use metrics::{MetricsSnapshot, MetricsTracker};
