//! Rooms and the lobby that owns them.
//!
//! A [`Room`] is a bounded group of players with a game-progress state
//! machine and free-form settings. The [`Lobby`] is the entry point for
//! higher layers: it creates and destroys rooms, moves players in and out,
//! and fans notifications out to members.
//!
//! # Key types
//!
//! - [`Lobby`]: room registry, membership, broadcast
//! - [`Room`]: one session; its mutable state sits behind a per-room lock
//! - [`VoiceProvisioner`]: optional capability pairing rooms with voice
//! - [`LobbyEvent`]: in-process lifecycle notifications
//! - [`LobbyConfig`] / [`RoomConfig`]: limits and per-room settings

mod config;
mod error;
mod events;
mod manager;
mod provision;
mod room;

pub use config::{LobbyConfig, RoomConfig};
pub use error::{ProvisionError, RoomError};
pub use events::LobbyEvent;
pub use huddle_protocol::RoomState;
pub use manager::Lobby;
pub use provision::VoiceProvisioner;
pub use room::{Room, RoomCore, StateChange};
