//! # Huddle
//!
//! Session layer for multiplayer game servers: connected players, rooms
//! with a game-progress state machine, a lobby that fans notifications out
//! to members, and per-room voice chat with positional audio.
//!
//! The socket layer stays outside: it hands each connection's
//! [`Outbound`](huddle_transport::Outbound) to [`HuddleServer::connect`]
//! and feeds decoded requests to the returned [`ConnectionHandler`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use huddle::prelude::*;
//!
//! # fn main() -> Result<(), HuddleError> {
//! let config = ServerConfig::from_json(r#"{"log_filter": "huddle=debug"}"#)?;
//! config.init_tracing()?;
//! let server = HuddleServer::builder().config(config).build()?;
//!
//! let (outbound, _frames) = ChannelOutbound::pair(ConnectionId::new(1));
//! let conn = server.connect(PlayerId::new("alice"), "Alice", Arc::new(outbound))?;
//! conn.handle_message(ClientMessage::QuickJoin)?;
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod handler;
mod server;
pub mod telemetry;

pub use config::ServerConfig;
pub use error::HuddleError;
pub use handler::ConnectionHandler;
pub use server::{HuddleServer, HuddleServerBuilder};

pub use huddle_protocol as protocol;
pub use huddle_room as room;
pub use huddle_session as session;
pub use huddle_transport as transport;
pub use huddle_voice as voice;

/// The types most servers need.
pub mod prelude {
    pub use crate::{ConnectionHandler, HuddleError, HuddleServer, ServerConfig};
    pub use huddle_protocol::{
        AudioPacket, ClientMessage, MessageType, PlayerId, RoomId, RoomState, Transform, Vec3,
    };
    pub use huddle_room::{Lobby, LobbyConfig, LobbyEvent, RoomConfig, RoomError};
    pub use huddle_transport::{ChannelOutbound, ConnectionId, Outbound};
    pub use huddle_voice::{VoiceConfig, VoiceEvent, VoipManager};
}
