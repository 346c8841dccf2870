//! Client transport: WebSocket connections and event delivery

pub mod connection;
pub mod messages;
pub mod publisher;
pub mod socket;

pub use connection::ConnectionRegistry;
pub use messages::MessageUtils;
pub use publisher::{EventSink, RecordingEventSink};
pub use socket::{serve_connection, ConnectionContext};
