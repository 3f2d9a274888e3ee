// Observer sessions: lifecycle, derived views and update fan-out

pub mod config;
mod connection;
mod manager;
pub mod protocol;
mod view;

pub use config::SessionConfig;
pub use connection::ConnectionHandler;
pub use manager::{SessionManager, Subscription};
pub use protocol::{ClientMessage, ServerMessage};
pub use view::{EntityView, FleetUpdate, SessionEvent, SessionSnapshot, SessionView};
