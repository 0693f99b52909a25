//! Connected-player registry for Huddle.
//!
//! Every connection that completes its handshake becomes a [`Player`],
//! owned by the [`PlayerRegistry`]. Rooms and voice channels only ever
//! hold a player's id; this crate is where the entity itself lives.
//!
//! # How it fits in the stack
//!
//! ```text
//! Room / Voice layers (above)  ← membership by PlayerId, lookups here
//!     ↕
//! Session layer (this crate)   ← identity, transport handle, transform, stats
//!     ↕
//! Protocol / Transport (below) ← ids, wire snapshots, Outbound
//! ```

mod error;
mod player;
mod registry;

pub use error::SessionError;
pub use player::{Player, PlayerStats};
pub use registry::PlayerRegistry;
