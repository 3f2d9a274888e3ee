// Geodesic math
pub mod geo;

// Telemetry event model and validation
pub mod event;

// Error taxonomy
pub mod error;

// Entity state store and liveness
pub mod state;

// Fence classification and alerts
pub mod geofence;

// Route accumulation
pub mod route;

// Observer sessions and fan-out
pub mod session;

// NATS client integration
pub mod nats;

// HTTP and WebSocket APIs
pub mod api;

// Configuration
pub mod config;
