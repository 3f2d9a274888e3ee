use crate::error::EngineError;
use crate::event::TelemetryEvent;
use crate::nats::NatsConfig;
use crate::state::config::EngineConfig;
use crate::state::entity::{
    EntityState, EntityStatus, HistoryPoint, StateUpdate, TrackedEntity, UpdateKind,
};
use crate::state::metrics::MetricsTracker;
use anyhow::{Context, Result};
use async_nats::jetstream::{self, consumer::DeliverPolicy};
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::StreamExt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Derived state that must track every committed update.
///
/// Callbacks run synchronously on the committing thread while the entity's
/// slot is still locked, so an observer sees one entity's updates in commit
/// order and nothing is skipped. Implementations must not call back into
/// the engine.
pub trait CommitObserver: Send + Sync {
    fn on_commit(&self, update: &StateUpdate);

    /// All entity state was dropped
    fn on_reset(&self, removed: usize);
}

/// State engine maintains the in-memory fleet state.
///
/// Each entity lives in its own DashMap slot; every mutation of an entity
/// happens while holding that slot's lock, and the resulting update is
/// broadcast before the lock is released. Observers therefore receive
/// updates for one entity in exactly the order they were committed.
pub struct StateEngine {
    pub(crate) entities: DashMap<String, TrackedEntity>,

    /// Broadcast channel for committed updates (bounded ring, drop-oldest)
    update_tx: broadcast::Sender<StateUpdate>,

    /// Next commit sequence number
    sequence: AtomicU64,

    /// Evaluated inline on every broadcast commit and on reset
    observers: RwLock<Vec<Arc<dyn CommitObserver>>>,

    config: EngineConfig,

    /// Metrics tracker for monitoring
    pub metrics: MetricsTracker,
}

impl StateEngine {
    /// Create a state engine with default configuration
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let (update_tx, _) = broadcast::channel(config.fanout_capacity.max(1));

        Self {
            entities: DashMap::new(),
            update_tx,
            sequence: AtomicU64::new(1),
            observers: RwLock::new(Vec::new()),
            config,
            metrics: MetricsTracker::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Apply one telemetry event (core state mutation).
    ///
    /// Invalid events are rejected without touching state. Unseen entity ids
    /// create a new active entity; known ones are updated in place.
    pub fn apply_telemetry(&self, event: &TelemetryEvent) -> Result<StateUpdate, EngineError> {
        if let Err(source) = event.validate() {
            self.metrics.record_rejected();
            warn!(entity_id = %event.entity_id, error = %source, "Rejected telemetry event");
            return Err(EngineError::InvalidTelemetry {
                entity_id: event.entity_id.clone(),
                source,
            });
        }

        self.metrics.record_event(&event.entity_id);
        let now = Utc::now();

        let update = match self.entities.entry(event.entity_id.clone()) {
            Entry::Vacant(slot) => {
                let tracked = TrackedEntity::new(event, now, self.config.history_cap);
                let tracked = slot.insert(tracked);
                info!(entity_id = %event.entity_id, "Tracking new entity");
                self.commit(&tracked.state, UpdateKind::Created, now)
            }
            Entry::Occupied(mut slot) => {
                let kind = slot
                    .get_mut()
                    .apply(event, now, self.config.noise_threshold_m);
                self.commit(&slot.get().state, kind, now)
            }
        };

        Ok(update)
    }

    /// Record a committed change and notify observers.
    ///
    /// Must be called while the entity's slot is still locked.
    fn commit(&self, state: &EntityState, kind: UpdateKind, now: DateTime<Utc>) -> StateUpdate {
        let update = StateUpdate {
            sequence: self.sequence.fetch_add(1, Ordering::SeqCst),
            kind,
            entity: state.clone(),
            timestamp: now,
        };

        match kind {
            UpdateKind::Duplicate => {
                self.metrics.record_duplicate();
                debug!(entity_id = %state.entity_id, "Duplicate telemetry ignored");
            }
            UpdateKind::Late => {
                self.metrics.record_late();
                debug!(entity_id = %state.entity_id, "Late telemetry refreshed liveness only");
            }
            _ => {}
        }

        if kind.is_broadcast() {
            for observer in self.observers().iter() {
                observer.on_commit(&update);
            }

            // No receivers is fine; lagging receivers lose their oldest entries
            let _ = self.update_tx.send(update.clone());
        }

        update
    }

    /// Get entity by ID
    pub fn get(&self, entity_id: &str) -> Option<EntityState> {
        self.entities.get(entity_id).map(|e| e.state.clone())
    }

    /// Snapshot of all entities, ordered by entity id
    pub fn list_all(&self) -> Vec<EntityState> {
        let mut all: Vec<EntityState> = self.entities.iter().map(|e| e.state.clone()).collect();
        all.sort_by(|a, b| a.entity_id.cmp(&b.entity_id));
        all
    }

    /// Retained location history for an entity, oldest first
    pub fn history(&self, entity_id: &str) -> Option<Vec<HistoryPoint>> {
        self.entities.get(entity_id).map(|e| e.history.to_vec())
    }

    /// Number of tracked entities
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Subscribe to committed updates
    pub fn subscribe(&self) -> broadcast::Receiver<StateUpdate> {
        self.update_tx.subscribe()
    }

    /// Register an observer for every subsequent commit and reset
    pub fn register_observer(&self, observer: Arc<dyn CommitObserver>) {
        self.observers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(observer);
    }

    fn observers(&self) -> RwLockReadGuard<'_, Vec<Arc<dyn CommitObserver>>> {
        self.observers.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mark an active entity inactive. Returns None for unknown entities.
    pub fn mark_inactive(&self, entity_id: &str) -> Option<EntityState> {
        let mut entity = self.entities.get_mut(entity_id)?;
        if entity.state.status == EntityStatus::Active {
            entity.state.status = EntityStatus::Inactive;
            self.commit(&entity.state, UpdateKind::StatusChanged, Utc::now());
        }
        Some(entity.state.clone())
    }

    /// Set status through external control (e.g., maintenance).
    ///
    /// Entities in maintenance are skipped by the liveness sweep and are not
    /// reactivated by telemetry.
    pub fn set_status(&self, entity_id: &str, status: EntityStatus) -> Option<EntityState> {
        let mut entity = self.entities.get_mut(entity_id)?;
        if entity.state.status != status {
            info!(entity_id = %entity_id, status = ?status, "Entity status set");
            entity.state.status = status;
            self.commit(&entity.state, UpdateKind::StatusChanged, Utc::now());
        }
        Some(entity.state.clone())
    }

    /// Mark every active entity silent for longer than the configured
    /// timeout as inactive. Returns the affected entity ids.
    ///
    /// Entities are locked one at a time.
    pub fn sweep_inactive(&self, now: DateTime<Utc>) -> Vec<String> {
        let timeout = chrono::Duration::seconds(self.config.silence_timeout_seconds as i64);
        let ids: Vec<String> = self.entities.iter().map(|e| e.key().clone()).collect();

        let mut swept = Vec::new();
        for id in ids {
            let Some(mut entity) = self.entities.get_mut(&id) else {
                continue;
            };
            if entity.state.status == EntityStatus::Active && now - entity.state.last_seen > timeout {
                entity.state.status = EntityStatus::Inactive;
                self.commit(&entity.state, UpdateKind::StatusChanged, now);
                swept.push(id);
            }
        }

        if !swept.is_empty() {
            info!(count = swept.len(), "Marked silent entities inactive");
        }
        swept
    }

    /// Drop all entity state. Returns the number of entities removed.
    pub fn reset(&self) -> usize {
        let removed = self.entities.len();
        self.entities.clear();
        self.metrics.clear_reporters();

        for observer in self.observers().iter() {
            observer.on_reset(removed);
        }

        info!(removed = removed, "State engine reset");
        removed
    }

    /// Run NATS subscriber to apply telemetry events to state
    ///
    /// Consumes the telemetry stream with at-least-once delivery. Every
    /// message is acknowledged, including malformed ones, so a poison
    /// message is never redelivered.
    pub async fn run_subscriber(
        self: Arc<Self>,
        jetstream: jetstream::Context,
        config: NatsConfig,
    ) -> Result<()> {
        info!("Starting telemetry subscriber");

        let stream = jetstream
            .get_stream(&config.stream_name)
            .await
            .with_context(|| format!("Failed to get {} stream", config.stream_name))?;

        let consumer = stream
            .get_or_create_consumer(
                &config.consumer_name,
                jetstream::consumer::pull::Config {
                    durable_name: Some(config.consumer_name.clone()),
                    filter_subject: format!("{}.>", config.subject_prefix),
                    deliver_policy: DeliverPolicy::New,
                    ..Default::default()
                },
            )
            .await
            .context("Failed to get or create consumer")?;

        info!(consumer = %config.consumer_name, "Telemetry consumer ready, processing events...");

        let mut messages = consumer.messages().await?;

        while let Some(next) = messages.next().await {
            let msg = match next {
                Ok(msg) => msg,
                Err(e) => {
                    error!(error = %e, "Error receiving message");
                    continue;
                }
            };

            match serde_json::from_slice::<TelemetryEvent>(&msg.payload) {
                Ok(event) => {
                    // Rejections are already counted and logged by apply_telemetry
                    let _ = self.apply_telemetry(&event);
                }
                Err(e) => {
                    self.metrics.record_rejected();
                    error!(error = %e, "Failed to deserialize telemetry, skipping");
                }
            }

            if let Err(e) = msg.ack().await {
                error!(error = %e, "Failed to acknowledge message");
            }
        }

        warn!("Telemetry subscriber stream ended");
        Ok(())
    }
}

impl Default for StateEngine {
    fn default() -> Self {
        Self::new()
    }
}
