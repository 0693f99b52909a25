//! Message bodies carried inside an [`Envelope`](crate::Envelope) payload,
//! plus the decoded inbound [`ClientMessage`].
//!
//! Field order is part of the contract: binary codecs encode struct fields
//! positionally, so reordering a field is a wire break.

use serde::{Deserialize, Serialize};

use crate::{PlayerId, PlayerState, RoomId, RoomState, Transform, Vec3};

// ---------------------------------------------------------------------------
// Room membership
// ---------------------------------------------------------------------------

/// Sent to the other members when a player joins a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerJoinedRoomMessage {
    pub player_id: PlayerId,
    pub player_name: String,
    pub room_id: RoomId,
}

/// Sent to the remaining members when a player leaves a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerLeftRoomMessage {
    pub player_id: PlayerId,
    pub player_name: String,
    pub room_id: RoomId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerReadyMessage {
    pub player_id: PlayerId,
    pub room_id: RoomId,
    pub is_ready: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomStateChangedMessage {
    pub room_id: RoomId,
    pub old_state: RoomState,
    pub new_state: RoomState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSettingMessage {
    pub room_id: RoomId,
    pub key: String,
    pub value: String,
}

// ---------------------------------------------------------------------------
// Listings
// ---------------------------------------------------------------------------

/// Flattened room snapshot for client-facing listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomInfo {
    pub room_id: RoomId,
    pub name: String,
    pub player_count: usize,
    pub max_players: usize,
    pub is_private: bool,
    pub is_persistent: bool,
    pub state: RoomState,
    pub players: Vec<PlayerId>,
}

impl RoomInfo {
    pub fn is_full(&self) -> bool {
        self.player_count >= self.max_players
    }
}

/// Flattened player snapshot for client-facing listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub player_id: PlayerId,
    pub name: String,
    pub room_id: Option<RoomId>,
    pub is_ready: bool,
    pub state: PlayerState,
    pub position: Vec3,
    pub kills: u32,
    pub deaths: u32,
    pub score: i64,
    pub level: u32,
    pub health: f32,
    pub max_health: f32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomListMessage {
    pub rooms: Vec<RoomInfo>,
}

/// Sent back to a client whose request failed.
///
/// `code` follows HTTP conventions: 400 bad request, 403 forbidden,
/// 404 not found, 409 conflict, 503 unavailable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMessage {
    pub code: u16,
    pub message: String,
}

// ---------------------------------------------------------------------------
// Voice
// ---------------------------------------------------------------------------

/// Audio codec tag. The server only transforms raw PCM; Opus frames are
/// relayed untouched apart from volume metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum AudioCodec {
    #[default]
    Pcm,
    Opus,
}

/// One chunk of captured audio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioPacket {
    pub player_id: PlayerId,
    pub player_name: String,
    /// Little-endian interleaved samples.
    pub audio_bytes: Vec<u8>,
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    /// Client capture time.
    pub timestamp: u64,
    pub position: Vec3,
    pub volume: f32,
    pub codec: AudioCodec,
    pub sequence_number: u32,
    pub is_end_of_speech: bool,
}

/// A positional variant of an [`AudioPacket`], built per listener.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioBroadcast {
    pub audio_packet: AudioPacket,
    pub room_id: RoomId,
    pub server_timestamp: u64,
    pub distance_from_listener: f32,
    pub volume_multiplier: f32,
}

/// Talking-state edge, sent with `PlayerStartedTalking` or
/// `PlayerStoppedTalking`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceActivityMessage {
    pub player_id: PlayerId,
    pub room_id: RoomId,
    pub is_talking: bool,
}

// ---------------------------------------------------------------------------
// ClientMessage: decoded inbound requests
// ---------------------------------------------------------------------------

/// Requests a connected client can make once the transport has decoded
/// them.
///
/// Internally tagged: `{ "type": "JoinRoom", "room_id": 12, "password": null }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    // -- Rooms --
    CreateRoom {
        name: String,
        max_players: Option<usize>,
        is_private: bool,
        password: Option<String>,
    },
    JoinRoom {
        room_id: RoomId,
        password: Option<String>,
    },
    /// Joins the first open public room, or creates one.
    QuickJoin,
    LeaveRoom,
    ListRooms,
    SetReady {
        ready: bool,
    },
    SetRoomSetting {
        key: String,
        value: String,
    },

    // -- Game progress --
    StartGame,
    PauseGame,
    ResumeGame,
    EndGame,
    ResetRoom,

    // -- Gameplay --
    UpdateTransform {
        transform: Transform,
    },

    // -- Voice --
    Audio {
        packet: AudioPacket,
    },
    SetMuted {
        muted: bool,
    },
    SetDeafened {
        deafened: bool,
    },
    SetTalking {
        talking: bool,
    },
    SetVoiceVolume {
        input: f32,
        output: f32,
    },
}
