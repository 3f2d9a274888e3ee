use crate::error::SessionError;
use crate::geofence::{Alert, FenceConfig};
use crate::route::RouteSummary;
use crate::session::config::SessionConfig;
use crate::session::view::{EntityView, SessionEvent, SessionSnapshot, SessionView};
use crate::state::{CommitObserver, MetricsTracker, StateEngine, StateUpdate};
use dashmap::DashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::{broadcast, watch};
use tracing::{info, warn};
use uuid::Uuid;

/// Shared per-session state: the derived view, the delivery queue and the
/// close signal
struct SessionEntry {
    view: Mutex<SessionView>,
    /// Bounded queue of evaluated events (drop-oldest on overflow)
    events_tx: broadcast::Sender<SessionEvent>,
    closed_tx: watch::Sender<bool>,
}

impl SessionEntry {
    fn view(&self) -> MutexGuard<'_, SessionView> {
        self.view.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn deliver(&self, event: SessionEvent) {
        // The receiver may already be gone while the session is closing
        let _ = self.events_tx.send(event);
    }
}

/// Open sessions, fed by the engine's commit path
struct SessionRegistry {
    sessions: DashMap<String, Arc<SessionEntry>>,
    metrics: MetricsTracker,
}

impl SessionRegistry {
    fn entries(&self) -> Vec<Arc<SessionEntry>> {
        self.sessions.iter().map(|e| Arc::clone(e.value())).collect()
    }

    /// Remove a session and signal its subscription. Returns false when the
    /// session was already gone.
    fn close(&self, session_id: &str) -> bool {
        let Some((_, entry)) = self.sessions.remove(session_id) else {
            return false;
        };
        entry.closed_tx.send_replace(true);
        self.metrics.decrement_sessions();
        info!(session_id = %session_id, open_sessions = self.sessions.len(), "Session closed");
        true
    }
}

impl CommitObserver for SessionRegistry {
    fn on_commit(&self, update: &StateUpdate) {
        for entry in self.entries() {
            let event = entry.view().apply(update);
            entry.deliver(SessionEvent::Update(event));
        }
    }

    fn on_reset(&self, removed: usize) {
        for entry in self.entries() {
            entry.view().reset();
            entry.deliver(SessionEvent::Reset { removed });
        }
    }
}

/// Tracks open observer sessions and serves their control operations.
///
/// Every session's view is evaluated on the engine's commit path; only
/// finished events are queued for the observer. Control operations touch
/// only the addressed session's view, never the shared entity state.
pub struct SessionManager {
    engine: Arc<StateEngine>,
    registry: Arc<SessionRegistry>,
    config: SessionConfig,
}

impl SessionManager {
    pub fn new(engine: Arc<StateEngine>, config: SessionConfig) -> Self {
        let registry = Arc::new(SessionRegistry {
            sessions: DashMap::new(),
            metrics: engine.metrics.clone(),
        });
        engine.register_observer(registry.clone());

        Self {
            engine,
            registry,
            config,
        }
    }

    /// Open a session with the default fence and tracking disabled.
    ///
    /// The returned subscription receives every update committed after this
    /// call. Dropping it closes the session.
    pub fn open(&self) -> Subscription {
        let view = SessionView::new(&self.config, self.engine.config().noise_threshold_m);
        let (events_tx, events) = broadcast::channel(self.engine.config().fanout_capacity.max(1));
        let (closed_tx, closed) = watch::channel(false);
        let entry = Arc::new(SessionEntry {
            view: Mutex::new(view),
            events_tx,
            closed_tx,
        });

        // Register before snapshotting so no commit falls between the two
        let id = Uuid::new_v4().to_string();
        self.registry.sessions.insert(id.clone(), Arc::clone(&entry));
        let entities = self.engine.list_all();
        entry.view().seed(entities);

        self.registry.metrics.increment_sessions();
        info!(session_id = %id, open_sessions = self.registry.sessions.len(), "Session opened");

        Subscription {
            id,
            events,
            closed,
            registry: Arc::clone(&self.registry),
        }
    }

    /// Close a session. Takes effect immediately for future deliveries.
    pub fn close(&self, session_id: &str) -> Result<(), SessionError> {
        if self.registry.close(session_id) {
            Ok(())
        } else {
            Err(SessionError::SessionNotFound(session_id.to_string()))
        }
    }

    pub fn is_open(&self, session_id: &str) -> bool {
        self.registry.sessions.contains_key(session_id)
    }

    pub fn len(&self) -> usize {
        self.registry.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.sessions.is_empty()
    }

    fn entry(&self, session_id: &str) -> Result<Arc<SessionEntry>, SessionError> {
        self.registry
            .sessions
            .get(session_id)
            .map(|e| Arc::clone(e.value()))
            .ok_or_else(|| SessionError::SessionNotFound(session_id.to_string()))
    }

    /// Replace the session's fence and return every entity reclassified
    /// against it. No alerts are raised by the change itself.
    pub fn set_fence(
        &self,
        session_id: &str,
        fence: FenceConfig,
    ) -> Result<Vec<EntityView>, SessionError> {
        let views = self.entry(session_id)?.view().set_fence(fence)?;

        info!(
            session_id = %session_id,
            center_lat = fence.center_lat,
            center_lng = fence.center_lng,
            radius_km = fence.radius_km,
            "Session fence updated"
        );
        Ok(views)
    }

    /// Toggle route tracking; returns the routes after the toggle
    pub fn set_tracking(
        &self,
        session_id: &str,
        enabled: bool,
    ) -> Result<Vec<RouteSummary>, SessionError> {
        let entry = self.entry(session_id)?;
        let mut view = entry.view();
        view.set_tracking(enabled);

        info!(session_id = %session_id, enabled = enabled, "Route tracking toggled");
        Ok(view.routes())
    }

    pub fn reset_routes(
        &self,
        session_id: &str,
        entity_id: Option<&str>,
    ) -> Result<Vec<RouteSummary>, SessionError> {
        let entry = self.entry(session_id)?;
        let mut view = entry.view();
        view.reset_routes(entity_id);
        Ok(view.routes())
    }

    pub fn is_tracking(&self, session_id: &str) -> Result<bool, SessionError> {
        Ok(self.entry(session_id)?.view().tracking())
    }

    pub fn clear_alerts(&self, session_id: &str) -> Result<(), SessionError> {
        self.entry(session_id)?.view().clear_alerts();
        Ok(())
    }

    pub fn alerts(&self, session_id: &str) -> Result<Vec<Alert>, SessionError> {
        Ok(self.entry(session_id)?.view().alerts())
    }

    pub fn routes(&self, session_id: &str) -> Result<Vec<RouteSummary>, SessionError> {
        Ok(self.entry(session_id)?.view().routes())
    }

    /// Catch-up read: every entity the session knows, classified against
    /// its fence, plus its alerts and routes
    pub fn snapshot(&self, session_id: &str) -> Result<SessionSnapshot, SessionError> {
        Ok(self.entry(session_id)?.view().snapshot(session_id))
    }
}

/// Delivery side of a session.
///
/// Each subscription owns a bounded queue of evaluated events. A
/// subscription that falls behind loses its oldest queued events; alerts
/// and routes are unaffected, and the engine and other sessions are never
/// slowed down by it.
pub struct Subscription {
    id: String,
    events: broadcast::Receiver<SessionEvent>,
    closed: watch::Receiver<bool>,
    registry: Arc<SessionRegistry>,
}

impl Subscription {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Wait for the next event for this session. Returns None once the
    /// session is closed; events still queued at that point are discarded.
    pub async fn recv(&mut self) -> Option<SessionEvent> {
        loop {
            if self.is_closed() {
                return None;
            }

            tokio::select! {
                biased;

                changed = self.closed.changed() => {
                    if changed.is_err() {
                        return None;
                    }
                }

                result = self.events.recv() => {
                    match result {
                        Ok(event) => return Some(event),
                        Err(RecvError::Lagged(skipped)) => self.record_overflow(skipped),
                        Err(RecvError::Closed) => return None,
                    }
                }
            }
        }
    }

    /// Non-blocking variant of [`recv`](Self::recv)
    pub fn try_recv(&mut self) -> Option<SessionEvent> {
        loop {
            if self.is_closed() {
                return None;
            }

            match self.events.try_recv() {
                Ok(event) => return Some(event),
                Err(TryRecvError::Lagged(skipped)) => self.record_overflow(skipped),
                Err(_) => return None,
            }
        }
    }

    fn record_overflow(&self, skipped: u64) {
        self.registry.metrics.record_dropped(skipped);
        warn!(session_id = %self.id, skipped = skipped, "Session lagged, dropped oldest updates");
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.registry.close(&self.id);
    }
}
