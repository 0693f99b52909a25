//! Core protocol types: identities, delivery channels, lifecycle states and
//! the envelope every outbound frame travels in.

use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A stable, unique identifier for a player.
///
/// Issued by the connection handshake (account id, device id, ...), so it
/// is a string rather than a counter. `#[serde(transparent)]` keeps it a
/// plain JSON string on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub String);

impl PlayerId {
    /// Wraps anything string-like into a `PlayerId`.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrows the underlying string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// A unique identifier for a room.
///
/// Rooms get random 64-bit ids so they can't be enumerated by clients.
/// A voice channel shares the id of the room it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub u64);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R-{:016x}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Channel: delivery guarantees
// ---------------------------------------------------------------------------

/// The delivery guarantee for a frame.
///
/// Room notifications must arrive (reliable); audio and position data are
/// latency sensitive and stale quickly, so they go unreliable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
pub enum Channel {
    /// Delivered in order, no loss.
    #[default]
    Reliable,

    /// May be lost or reordered.
    Unreliable,
}

// ---------------------------------------------------------------------------
// MessageType
// ---------------------------------------------------------------------------

/// Tag identifying what an [`Envelope`]'s payload contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum MessageType {
    PlayerJoinedRoom,
    PlayerLeftRoom,
    PlayerReadyChanged,
    RoomStateChanged,
    RoomSettingChanged,
    RoomCreated,
    RoomJoined,
    RoomList,
    PlayerInfo,
    PlayerStartedTalking,
    PlayerStoppedTalking,
    AudioBroadcast,
    Error,
    /// Gameplay traffic owned by layers above the lobby; the number is
    /// theirs to assign.
    Custom(u16),
}

// ---------------------------------------------------------------------------
// Lifecycle states
// ---------------------------------------------------------------------------

/// Game-progress state of a room.
///
/// ```text
/// Waiting → Starting → InProgress ⇄ Paused
///                          │          │
///                          └────┬─────┘
///                               ▼
///                           Finished
///
/// (reset from any state → Waiting)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum RoomState {
    #[default]
    Waiting,
    Starting,
    InProgress,
    Paused,
    Finished,
}

impl RoomState {
    /// Returns `true` while a game is underway (running or paused).
    pub fn is_in_game(&self) -> bool {
        matches!(self, Self::Starting | Self::InProgress | Self::Paused)
    }
}

impl fmt::Display for RoomState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Waiting => "Waiting",
            Self::Starting => "Starting",
            Self::InProgress => "InProgress",
            Self::Paused => "Paused",
            Self::Finished => "Finished",
        };
        f.write_str(name)
    }
}

/// Where a connected player currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PlayerState {
    /// Connected, not in any room.
    #[default]
    Idle,
    /// In a room that isn't playing.
    InLobby,
    /// In a room whose game is running.
    InGame,
    /// Watching without participating.
    Spectating,
    /// Transport closed; awaiting cleanup.
    Disconnected,
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// The top-level wrapper around every outbound frame.
///
/// ```text
/// ┌──────────────────────────────────┐
/// │ seq: 42                          │  ← per-server counter
/// │ timestamp: 15000                 │  ← ms since server start
/// │ channel: Reliable                │
/// │ message_type: PlayerJoinedRoom   │
/// │ payload: [...codec bytes...]     │
/// └──────────────────────────────────┘
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub seq: u64,

    pub timestamp: u64,

    /// Defaults to `Reliable` when absent.
    #[serde(default)]
    pub channel: Channel,

    pub message_type: MessageType,

    /// The message, encoded by the same codec as the envelope.
    pub payload: Vec<u8>,
}

impl Envelope {
    /// Creates an envelope with an empty payload.
    pub fn new(seq: u64, timestamp: u64, channel: Channel, message_type: MessageType) -> Self {
        Self {
            seq,
            timestamp,
            channel,
            message_type,
            payload: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// ServerClock
// ---------------------------------------------------------------------------

/// Monotonic millisecond clock anchored at server start.
///
/// All server-stamped times on the wire (`Envelope::timestamp`,
/// `AudioBroadcast::server_timestamp`) come from one shared clock so
/// clients can compare them.
#[derive(Debug, Clone, Copy)]
pub struct ServerClock {
    started: Instant,
}

impl ServerClock {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    /// Milliseconds elapsed since the clock was created.
    pub fn now_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}

impl Default for ServerClock {
    fn default() -> Self {
        Self::new()
    }
}

// =========================================================================
// Tests
// =========================================================================
