//! Per-connection request routing.
//!
//! The transport decodes a client's frames into [`ClientMessage`]s and hands
//! them to that connection's [`ConnectionHandler`], which calls into the
//! lobby or the voice manager. Failures go back to the client as an
//! `Error` message; nothing here ever blocks on the network.

use std::sync::Arc;

use huddle_protocol::{
    Channel, ClientMessage, Codec, ErrorMessage, MessageType, PlayerId, RoomId, RoomListMessage,
};
use huddle_room::{Lobby, RoomConfig, RoomError};
use huddle_session::SessionError;
use huddle_transport::ConnectionId;
use huddle_voice::VoipManager;

use crate::HuddleError;

/// Default name for rooms made by `QuickJoin`.
const QUICK_MATCH_NAME: &str = "Quick Match";

/// Routes one player's requests for as long as the connection lives.
///
/// Dropping the handler is the disconnect: the player leaves its room,
/// loses its voice state and is unregistered.
pub struct ConnectionHandler {
    player_id: PlayerId,
    conn_id: ConnectionId,
    lobby: Arc<Lobby>,
    voip: Option<Arc<VoipManager>>,
}

impl ConnectionHandler {
    pub(crate) fn new(
        player_id: PlayerId,
        conn_id: ConnectionId,
        lobby: Arc<Lobby>,
        voip: Option<Arc<VoipManager>>,
    ) -> Self {
        Self {
            player_id,
            conn_id,
            lobby,
            voip,
        }
    }

    pub fn player_id(&self) -> &PlayerId {
        &self.player_id
    }

    pub fn conn_id(&self) -> ConnectionId {
        self.conn_id
    }

    /// Decodes a raw request frame and handles it. A frame that doesn't
    /// decode is answered with a 400 `Error`.
    pub fn handle_frame(&self, data: &[u8]) -> Result<(), HuddleError> {
        let message: ClientMessage = match self.lobby.codec().decode(data) {
            Ok(message) => message,
            Err(e) => {
                tracing::debug!(player_id = %self.player_id, error = %e, "undecodable request");
                let err = HuddleError::from(e);
                self.reply_error(&err);
                return Err(err);
            }
        };
        self.handle_message(message)
    }

    /// Handles one request. On failure the client is sent an `Error`
    /// reply and the error is also returned to the caller.
    pub fn handle_message(&self, message: ClientMessage) -> Result<(), HuddleError> {
        if self
            .lobby
            .players()
            .update(&self.player_id, |p| p.touch())
            .is_none()
        {
            return Err(SessionError::NotFound(self.player_id.clone()).into());
        }

        let result = self.dispatch(message);
        if let Err(e) = &result {
            tracing::warn!(player_id = %self.player_id, error = %e, "request rejected");
            self.reply_error(e);
        }
        result
    }

    fn dispatch(&self, message: ClientMessage) -> Result<(), HuddleError> {
        let player_id = &self.player_id;
        match message {
            // -- Rooms --
            ClientMessage::CreateRoom {
                name,
                max_players,
                is_private,
                password,
            } => {
                let mut config = RoomConfig::new(
                    name,
                    max_players.unwrap_or(self.lobby.config().default_max_players),
                );
                config.is_private = is_private;
                config.password = password.clone();

                let room_id = self.lobby.create_room(config)?.id();
                if let Err(e) = self.lobby.join_room(player_id, room_id, password.as_deref()) {
                    self.lobby.destroy_room(room_id);
                    return Err(e.into());
                }
                self.reply_room(MessageType::RoomCreated, room_id);
            }
            ClientMessage::JoinRoom { room_id, password } => {
                self.lobby.join_room(player_id, room_id, password.as_deref())?;
                self.reply_room(MessageType::RoomJoined, room_id);
            }
            ClientMessage::QuickJoin => {
                let config = RoomConfig::new(
                    QUICK_MATCH_NAME,
                    self.lobby.config().default_max_players,
                );
                let room_id = self.lobby.join_or_create(player_id, config)?;
                self.reply_room(MessageType::RoomJoined, room_id);
            }
            ClientMessage::LeaveRoom => {
                self.lobby.leave_current_room(player_id)?;
            }
            ClientMessage::ListRooms => {
                let list = RoomListMessage {
                    rooms: self.lobby.available_rooms(),
                };
                self.reply(MessageType::RoomList, &list);
            }
            ClientMessage::SetReady { ready } => {
                self.lobby.set_player_ready(player_id, ready)?;
            }
            ClientMessage::SetRoomSetting { key, value } => {
                let room_id = self.current_room()?;
                self.lobby.set_room_setting(room_id, key, value)?;
            }

            // -- Game progress --
            ClientMessage::StartGame => self.lobby.start_game(self.current_room()?)?,
            ClientMessage::PauseGame => self.lobby.pause_game(self.current_room()?)?,
            ClientMessage::ResumeGame => self.lobby.resume_game(self.current_room()?)?,
            ClientMessage::EndGame => self.lobby.end_game(self.current_room()?)?,
            ClientMessage::ResetRoom => self.lobby.reset_room(self.current_room()?)?,

            // -- Gameplay --
            ClientMessage::UpdateTransform { transform } => {
                self.lobby
                    .players()
                    .update(player_id, |p| p.update_transform(transform))
                    .ok_or_else(|| SessionError::NotFound(player_id.clone()))?;
            }

            // -- Voice --
            ClientMessage::Audio { packet } => {
                // Unreliable traffic: drops are logged by the pipeline and
                // never answered.
                let (Some(voip), Some(room_id)) = (&self.voip, self.room_id()) else {
                    tracing::trace!(%player_id, "audio outside a voice room ignored");
                    return Ok(());
                };
                voip.process_audio_packet(player_id, room_id, packet);
            }
            ClientMessage::SetMuted { muted } => {
                self.voip()?.set_player_muted(player_id, muted);
            }
            ClientMessage::SetDeafened { deafened } => {
                self.voip()?.set_player_deafened(player_id, deafened);
            }
            ClientMessage::SetTalking { talking } => {
                let voip = self.voip()?;
                voip.set_player_talking(player_id, self.current_room()?, talking);
            }
            ClientMessage::SetVoiceVolume { input, output } => {
                self.voip()?.set_player_volume(player_id, input, output);
            }
        }
        Ok(())
    }

    /// Leaves the room, drops voice state and unregisters the player.
    pub fn disconnect(self) {
        // Cleanup runs in Drop.
    }

    fn room_id(&self) -> Option<RoomId> {
        self.lobby.get_player(&self.player_id)?.current_room
    }

    fn current_room(&self) -> Result<RoomId, HuddleError> {
        self.room_id()
            .ok_or_else(|| RoomError::NoRoom(self.player_id.clone()).into())
    }

    fn voip(&self) -> Result<&Arc<VoipManager>, HuddleError> {
        self.voip.as_ref().ok_or(HuddleError::VoiceDisabled)
    }

    fn reply<T: serde::Serialize>(&self, message_type: MessageType, payload: &T) {
        self.lobby
            .send_to_player(&self.player_id, message_type, payload, Channel::Reliable);
    }

    fn reply_room(&self, message_type: MessageType, room_id: RoomId) {
        if let Some(info) = self.lobby.room_info(room_id) {
            self.reply(message_type, &info);
        }
    }

    fn reply_error(&self, error: &HuddleError) {
        let message = ErrorMessage {
            code: error.code(),
            message: error.to_string(),
        };
        self.reply(MessageType::Error, &message);
    }
}

impl Drop for ConnectionHandler {
    fn drop(&mut self) {
        // The id may already belong to a newer connection if this one was
        // pruned; only our own session is removed.
        let ours = self
            .lobby
            .get_player(&self.player_id)
            .is_some_and(|p| p.outbound().id() == self.conn_id);
        if ours && self.lobby.remove_player(&self.player_id).is_some() {
            tracing::info!(player_id = %self.player_id, conn_id = %self.conn_id, "player disconnected");
        }
    }
}
