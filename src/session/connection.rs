use crate::geofence::FenceConfig;
use crate::session::manager::SessionManager;
use crate::session::protocol::{ClientMessage, ServerMessage};
use crate::session::view::SessionEvent;
use axum::extract::ws::{Message, WebSocket};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Drives one WebSocket connection: a session lives exactly as long as
/// its socket
pub struct ConnectionHandler {
    sessions: Arc<SessionManager>,
}

impl ConnectionHandler {
    pub fn new(sessions: Arc<SessionManager>) -> Self {
        Self { sessions }
    }

    /// Handle WebSocket connection lifecycle
    pub async fn handle(self, mut socket: WebSocket) {
        let mut subscription = self.sessions.open();
        let session_id = subscription.id().to_string();
        info!(session_id = %session_id, "WebSocket connection established");

        let snapshot = self.handle_client_message(&session_id, ClientMessage::Snapshot);
        if let Err(e) = send_message(&mut socket, &snapshot).await {
            error!(session_id = %session_id, error = %e, "Failed to send initial snapshot");
            return;
        }

        loop {
            tokio::select! {
                // Handle incoming client messages
                msg = socket.recv() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            let reply = match serde_json::from_str::<ClientMessage>(&text) {
                                Ok(request) => self.handle_client_message(&session_id, request),
                                Err(e) => ServerMessage::error(format!("invalid message: {}", e)),
                            };
                            if let Err(e) = send_message(&mut socket, &reply).await {
                                error!(session_id = %session_id, error = %e, "Failed to send reply");
                                break;
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            info!(session_id = %session_id, "WebSocket client disconnected");
                            break;
                        }
                        Some(Ok(Message::Ping(data))) => {
                            if let Err(e) = socket.send(Message::Pong(data)).await {
                                error!(error = %e, "Failed to send pong");
                                break;
                            }
                        }
                        Some(Ok(_)) => {
                            // Ignore binary, pong messages
                        }
                        Some(Err(e)) => {
                            warn!(session_id = %session_id, error = %e, "WebSocket error");
                            break;
                        }
                    }
                }

                // Forward evaluated session events
                event = subscription.recv() => {
                    let msg = match event {
                        Some(SessionEvent::Update(update)) => ServerMessage::FleetUpdate(update),
                        Some(SessionEvent::Reset { removed }) => ServerMessage::FleetReset { removed },
                        None => {
                            info!(session_id = %session_id, "Session closed, ending connection");
                            break;
                        }
                    };
                    if let Err(e) = send_message(&mut socket, &msg).await {
                        error!(session_id = %session_id, error = %e, "Failed to send session event");
                        break;
                    }
                }
            }
        }

        // Dropping the subscription releases the session
        drop(subscription);
        info!(session_id = %session_id, "WebSocket connection closed");
    }

    /// Apply one control request against this connection's session
    pub(crate) fn handle_client_message(&self, session_id: &str, msg: ClientMessage) -> ServerMessage {
        let sessions = &self.sessions;

        let result = match msg {
            ClientMessage::SetFence {
                center_lat,
                center_lng,
                radius_km,
            } => {
                let fence = FenceConfig::new(center_lat, center_lng, radius_km);
                sessions
                    .set_fence(session_id, fence)
                    .map(|entities| ServerMessage::FenceUpdated { fence, entities })
            }
            ClientMessage::SetTracking { enabled } => sessions
                .set_tracking(session_id, enabled)
                .map(|routes| ServerMessage::Routes {
                    tracking: enabled,
                    routes,
                }),
            ClientMessage::ClearAlerts => sessions
                .clear_alerts(session_id)
                .map(|_| ServerMessage::Alerts { alerts: Vec::new() }),
            ClientMessage::ResetRoutes { entity_id } => sessions
                .reset_routes(session_id, entity_id.as_deref())
                .and_then(|routes| {
                    let tracking = sessions.is_tracking(session_id)?;
                    Ok(ServerMessage::Routes { tracking, routes })
                }),
            ClientMessage::Snapshot => sessions.snapshot(session_id).map(ServerMessage::Snapshot),
        };

        result.unwrap_or_else(|e| ServerMessage::error(e.to_string()))
    }
}

async fn send_message(socket: &mut WebSocket, msg: &ServerMessage) -> anyhow::Result<()> {
    let json = serde_json::to_string(msg)?;
    socket.send(Message::Text(json)).await?;
    Ok(())
}
