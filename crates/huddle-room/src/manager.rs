//! The lobby: owns every room, routes players into and out of them and
//! fans out room-scoped notifications.
//!
//! # Locking
//!
//! Rooms live in a `DashMap<RoomId, Arc<Room>>`. Every operation clones the
//! `Arc` out of the map before touching the room, so no map shard is held
//! while a room is locked. Inside an operation the order is always room
//! lock first, then the player's registry entry. Notifications are sent
//! after [`Room::hand_off`], i.e. with the dispatch lock held and the room
//! state lock released.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use huddle_protocol::{
    Channel, Codec, Envelope, JsonCodec, MessageType, PlayerId, PlayerJoinedRoomMessage,
    PlayerLeftRoomMessage, PlayerReadyMessage, PlayerState, RoomId, RoomInfo,
    RoomSettingMessage, ServerClock, VoiceActivityMessage,
};
use huddle_session::{Player, PlayerRegistry, SessionError};
use huddle_transport::Outbound;
use rand::Rng;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::room::{RoomCore, StateChange};
use crate::{LobbyConfig, LobbyEvent, Room, RoomConfig, RoomError, VoiceProvisioner};

/// Manages all rooms and the players moving between them.
///
/// Constructed once per server and shared as `Arc<Lobby>` by every
/// connection task.
pub struct Lobby {
    players: Arc<PlayerRegistry>,
    rooms: DashMap<RoomId, Arc<Room>>,
    /// Room slots taken against `max_rooms`, reserved before the insert.
    room_slots: AtomicUsize,
    voice: Option<Arc<dyn VoiceProvisioner>>,
    config: LobbyConfig,
    codec: JsonCodec,
    clock: ServerClock,
    /// Sequence number for outbound envelopes.
    seq: AtomicU64,
    events: broadcast::Sender<LobbyEvent>,
}

impl Lobby {
    pub fn new(players: Arc<PlayerRegistry>, config: LobbyConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            players,
            rooms: DashMap::new(),
            room_slots: AtomicUsize::new(0),
            voice: None,
            config,
            codec: JsonCodec,
            clock: ServerClock::new(),
            seq: AtomicU64::new(1),
            events,
        }
    }

    /// Pairs every room created from now on with a voice channel.
    pub fn with_voice_provisioner(mut self, voice: Arc<dyn VoiceProvisioner>) -> Self {
        self.voice = Some(voice);
        self
    }

    pub fn config(&self) -> &LobbyConfig {
        &self.config
    }

    pub fn players(&self) -> &Arc<PlayerRegistry> {
        &self.players
    }

    /// The clock outbound envelopes are stamped with.
    pub fn clock(&self) -> &ServerClock {
        &self.clock
    }

    pub fn codec(&self) -> &JsonCodec {
        &self.codec
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LobbyEvent> {
        self.events.subscribe()
    }

    // =====================================================================
    // Room lifecycle
    // =====================================================================

    /// Creates a room under a fresh random id.
    ///
    /// If a voice provisioner is attached, a voice channel is requested
    /// afterwards; its failure is logged and the room is returned anyway.
    ///
    /// # Errors
    /// - [`RoomError::InvalidConfig`] for a zero capacity or a private
    ///   room without a password.
    /// - [`RoomError::TooManyRooms`] at the configured room limit.
    /// - [`RoomError::IdCollision`] if the generated id is taken. Retrying
    ///   draws a new id.
    pub fn create_room(&self, config: RoomConfig) -> Result<Arc<Room>, RoomError> {
        self.create_room_inner(config)
            .inspect_err(|e| tracing::warn!(error = %e, "room creation rejected"))
    }

    fn create_room_inner(&self, config: RoomConfig) -> Result<Arc<Room>, RoomError> {
        if config.max_players == 0 {
            return Err(RoomError::InvalidConfig("capacity must be at least 1".into()));
        }
        if config.is_private && config.password.is_none() {
            return Err(RoomError::InvalidConfig(
                "private room needs a password".into(),
            ));
        }
        self.reserve_room_slot()?;

        let room_id = RoomId(rand::rng().random());
        let room = match self.rooms.entry(room_id) {
            Entry::Occupied(_) => {
                self.release_room_slot();
                return Err(RoomError::IdCollision(room_id));
            }
            Entry::Vacant(slot) => {
                let room = Arc::new(Room::new(room_id, config));
                slot.insert(Arc::clone(&room));
                room
            }
        };

        tracing::info!(
            %room_id,
            name = room.name(),
            capacity = room.capacity(),
            private = room.is_private(),
            "room created"
        );

        if let Some(voice) = &self.voice {
            if let Err(e) = voice.provision(room_id) {
                tracing::warn!(%room_id, error = %e, "voice channel not provisioned");
            }
        }

        self.publish(LobbyEvent::RoomCreated { room_id });
        Ok(room)
    }

    /// Takes one of the `max_rooms` slots, or fails if none is left.
    fn reserve_room_slot(&self) -> Result<(), RoomError> {
        let max_rooms = self.config.max_rooms;
        self.room_slots
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |taken| {
                (taken < max_rooms).then_some(taken + 1)
            })
            .map(drop)
            .map_err(|_| RoomError::TooManyRooms(max_rooms))
    }

    fn release_room_slot(&self) {
        self.room_slots.fetch_sub(1, Ordering::AcqRel);
    }

    /// Destroys a room, sending each member through the normal leave path
    /// first. Returns `false` if the room doesn't exist.
    ///
    /// The room leaves the map before anything else, so a second call (or
    /// the empty-room rule firing from one of the leaves) finds nothing.
    pub fn destroy_room(&self, room_id: RoomId) -> bool {
        let Some((_, room)) = self.rooms.remove(&room_id) else {
            return false;
        };
        self.release_room_slot();

        let members = {
            let mut core = room.lock();
            core.close();
            core.members().to_vec()
        };

        for player_id in &members {
            if let Err(e) = self.leave_inner(&room, player_id) {
                tracing::debug!(%room_id, %player_id, error = %e, "member already gone");
            }
        }

        if let Some(voice) = &self.voice {
            if let Err(e) = voice.teardown(room_id) {
                tracing::warn!(%room_id, error = %e, "voice channel teardown failed");
            }
        }

        tracing::info!(%room_id, evicted = members.len(), "room destroyed");
        self.publish(LobbyEvent::RoomDestroyed { room_id });
        true
    }

    // =====================================================================
    // Membership
    // =====================================================================

    /// Adds a player to a room.
    ///
    /// # Errors
    /// - [`RoomError::NotFound`] / [`RoomError::PlayerNotFound`] for
    ///   unknown ids (a room being destroyed counts as unknown).
    /// - [`RoomError::AlreadyInRoom`] if the player is in any room.
    /// - [`RoomError::RoomFull`] at capacity.
    /// - [`RoomError::WrongPassword`] for a private room.
    pub fn join_room(
        &self,
        player_id: &PlayerId,
        room_id: RoomId,
        password: Option<&str>,
    ) -> Result<(), RoomError> {
        self.join_inner(player_id, room_id, password).inspect_err(|e| {
            tracing::warn!(%player_id, %room_id, error = %e, "join rejected");
        })
    }

    fn join_inner(
        &self,
        player_id: &PlayerId,
        room_id: RoomId,
        password: Option<&str>,
    ) -> Result<(), RoomError> {
        let room = self.get_room(room_id).ok_or(RoomError::NotFound(room_id))?;
        let mut core = room.lock();
        if core.is_closed() {
            return Err(RoomError::NotFound(room_id));
        }

        self.players
            .update(player_id, |p| check_admission(p))
            .ok_or_else(|| RoomError::PlayerNotFound(player_id.clone()))??;

        if core.len() >= room.capacity() {
            return Err(RoomError::RoomFull(room_id));
        }
        if !room.check_password(password) {
            return Err(RoomError::WrongPassword(room_id));
        }

        // Another room's lock may have stamped the player since the check
        // above, so admission is re-checked in the same entry access that
        // stamps it.
        let running = core.state().is_in_game();
        let player_name = self
            .players
            .update(player_id, |p| -> Result<String, RoomError> {
                check_admission(p)?;
                p.enter_room(room_id, running);
                Ok(p.name.clone())
            })
            .ok_or_else(|| RoomError::PlayerNotFound(player_id.clone()))??;

        core.add_member(player_id.clone());
        let recipients = core.others(player_id);
        let count = core.len();
        let _dispatch = room.hand_off(core);

        tracing::info!(%player_id, %room_id, players = count, "player joined room");

        let message = PlayerJoinedRoomMessage {
            player_id: player_id.clone(),
            player_name,
            room_id,
        };
        self.send_frame(&recipients, MessageType::PlayerJoinedRoom, Channel::Reliable, &message);
        self.publish(LobbyEvent::PlayerJoined {
            player_id: player_id.clone(),
            room_id,
        });
        Ok(())
    }

    /// Removes a player from a room. A non-persistent room left empty is
    /// destroyed before this returns.
    ///
    /// # Errors
    /// - [`RoomError::NotFound`] / [`RoomError::PlayerNotFound`].
    /// - [`RoomError::NotInRoom`] if the player isn't a member.
    pub fn leave_room(&self, player_id: &PlayerId, room_id: RoomId) -> Result<(), RoomError> {
        let emptied = self
            .get_room(room_id)
            .ok_or(RoomError::NotFound(room_id))
            .and_then(|room| self.leave_inner(&room, player_id))
            .inspect_err(|e| {
                tracing::warn!(%player_id, %room_id, error = %e, "leave rejected");
            })?;

        if emptied {
            self.destroy_room(room_id);
        }
        Ok(())
    }

    /// Leaves whichever room the player is in, returning its id.
    pub fn leave_current_room(&self, player_id: &PlayerId) -> Result<RoomId, RoomError> {
        let room_id = self
            .players
            .update(player_id, |p| p.current_room)
            .ok_or_else(|| RoomError::PlayerNotFound(player_id.clone()))?
            .ok_or_else(|| RoomError::NoRoom(player_id.clone()))?;
        self.leave_room(player_id, room_id)?;
        Ok(room_id)
    }

    /// The leave path shared by [`leave_room`](Self::leave_room) and
    /// [`destroy_room`](Self::destroy_room). Never destroys; returns `true`
    /// if the caller should, because this leave emptied a non-persistent
    /// room. The room is already closed to joins in that case.
    fn leave_inner(&self, room: &Room, player_id: &PlayerId) -> Result<bool, RoomError> {
        let room_id = room.id();
        let mut core = room.lock();
        if !core.remove_member(player_id) {
            return Err(if self.players.contains(player_id) {
                RoomError::NotInRoom(player_id.clone(), room_id)
            } else {
                RoomError::PlayerNotFound(player_id.clone())
            });
        }

        let player_name = self
            .players
            .update(player_id, |p| {
                p.exit_room();
                p.name.clone()
            })
            .unwrap_or_default();

        let paused = core.auto_pause(self.config.min_players_to_start);
        let emptied = core.is_empty() && !room.is_persistent() && !core.is_closed();
        if emptied {
            core.close();
        }
        let recipients = core.members().to_vec();
        let _dispatch = room.hand_off(core);

        tracing::info!(%player_id, %room_id, players = recipients.len(), "player left room");

        let was_talking = self
            .voice
            .as_ref()
            .is_some_and(|voice| voice.player_left(player_id, room_id));
        if was_talking {
            let stopped = VoiceActivityMessage {
                player_id: player_id.clone(),
                room_id,
                is_talking: false,
            };
            self.send_frame(
                &recipients,
                MessageType::PlayerStoppedTalking,
                Channel::Reliable,
                &stopped,
            );
        }

        let message = PlayerLeftRoomMessage {
            player_id: player_id.clone(),
            player_name,
            room_id,
        };
        self.send_frame(&recipients, MessageType::PlayerLeftRoom, Channel::Reliable, &message);
        self.publish(LobbyEvent::PlayerLeft {
            player_id: player_id.clone(),
            room_id,
        });
        if let Some(change) = paused {
            self.announce_state(room_id, &recipients, change);
        }
        Ok(emptied)
    }

    /// Joins the first open public room, or creates one from `config` if
    /// none will take the player.
    pub fn join_or_create(
        &self,
        player_id: &PlayerId,
        config: RoomConfig,
    ) -> Result<RoomId, RoomError> {
        for info in self.available_rooms() {
            match self.join_inner(player_id, info.room_id, None) {
                Ok(()) => return Ok(info.room_id),
                // Filled up or went away since the listing; try the next.
                Err(RoomError::RoomFull(_) | RoomError::NotFound(_)) => continue,
                Err(e) => return Err(e),
            }
        }

        let password = config.password.clone();
        let room_id = self.create_room(config)?.id();
        if let Err(e) = self.join_room(player_id, room_id, password.as_deref()) {
            // Nobody else knows about the room yet.
            self.destroy_room(room_id);
            return Err(e);
        }
        Ok(room_id)
    }

    // =====================================================================
    // Broadcast
    // =====================================================================

    /// Sends `payload` reliably to every member except `exclude`. Returns
    /// how many members it was handed to; 0 for an unknown room.
    pub fn broadcast_to_room<T: Serialize>(
        &self,
        room_id: RoomId,
        message_type: MessageType,
        payload: &T,
        exclude: Option<&PlayerId>,
    ) -> usize {
        self.broadcast(room_id, message_type, Channel::Reliable, payload, exclude)
    }

    /// Like [`broadcast_to_room`](Self::broadcast_to_room) over the
    /// unreliable channel.
    pub fn broadcast_to_room_unreliable<T: Serialize>(
        &self,
        room_id: RoomId,
        message_type: MessageType,
        payload: &T,
        exclude: Option<&PlayerId>,
    ) -> usize {
        self.broadcast(room_id, message_type, Channel::Unreliable, payload, exclude)
    }

    fn broadcast<T: Serialize>(
        &self,
        room_id: RoomId,
        message_type: MessageType,
        channel: Channel,
        payload: &T,
        exclude: Option<&PlayerId>,
    ) -> usize {
        let Some(room) = self.get_room(room_id) else {
            return 0;
        };
        let core = room.lock();
        let recipients = match exclude {
            Some(excluded) => core.others(excluded),
            None => core.members().to_vec(),
        };
        let _dispatch = room.hand_off(core);
        self.send_frame(&recipients, message_type, channel, payload)
    }

    /// Sends one message to one player. Returns `false` if the player is
    /// unknown or the transport refused it.
    pub fn send_to_player<T: Serialize>(
        &self,
        player_id: &PlayerId,
        message_type: MessageType,
        payload: &T,
        channel: Channel,
    ) -> bool {
        self.send_frame(std::slice::from_ref(player_id), message_type, channel, payload) == 1
    }

    /// Encodes once and hands the frame to each recipient's transport.
    /// Send failures are logged, never returned.
    fn send_frame<T: Serialize>(
        &self,
        recipients: &[PlayerId],
        message_type: MessageType,
        channel: Channel,
        payload: &T,
    ) -> usize {
        if recipients.is_empty() {
            return 0;
        }
        let envelope = Envelope::new(
            self.seq.fetch_add(1, Ordering::Relaxed),
            self.clock.now_ms(),
            channel,
            message_type,
        );
        let frame = match self.codec.encode_frame(envelope, payload) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(?message_type, error = %e, "failed to encode outbound frame");
                return 0;
            }
        };

        let mut delivered = 0;
        for player_id in recipients {
            let Some(outbound) = self.players.outbound(player_id) else {
                continue;
            };
            let result = match channel {
                Channel::Reliable => outbound.send(frame.clone()),
                Channel::Unreliable => outbound.send_unreliable(frame.clone()),
            };
            match result {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::warn!(%player_id, ?message_type, error = %e, "send failed");
                }
            }
        }
        delivered
    }

    fn publish(&self, event: LobbyEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    // =====================================================================
    // Game state
    // =====================================================================

    pub fn start_game(&self, room_id: RoomId) -> Result<(), RoomError> {
        let min_players = self.config.min_players_to_start;
        self.transition(room_id, "start", |core| core.start_game(min_players))
    }

    pub fn end_game(&self, room_id: RoomId) -> Result<(), RoomError> {
        self.transition(room_id, "end", RoomCore::end_game)
    }

    pub fn pause_game(&self, room_id: RoomId) -> Result<(), RoomError> {
        self.transition(room_id, "pause", RoomCore::pause_game)
    }

    pub fn resume_game(&self, room_id: RoomId) -> Result<(), RoomError> {
        self.transition(room_id, "resume", RoomCore::resume_game)
    }

    /// Back to Waiting, whatever the current state.
    pub fn reset_room(&self, room_id: RoomId) -> Result<(), RoomError> {
        self.transition(room_id, "reset", |core| Ok(core.reset()))
    }

    fn transition(
        &self,
        room_id: RoomId,
        action: &'static str,
        apply: impl FnOnce(&mut RoomCore) -> Result<Option<StateChange>, RoomError>,
    ) -> Result<(), RoomError> {
        let room = self.get_room(room_id).ok_or(RoomError::NotFound(room_id))?;
        let mut core = room.lock();
        if core.is_closed() {
            return Err(RoomError::NotFound(room_id));
        }
        let change = apply(&mut core).inspect_err(|e| {
            tracing::warn!(%room_id, action, error = %e, "transition rejected");
        })?;
        let Some(change) = change else {
            return Ok(());
        };

        let running = change.to.is_in_game();
        for player_id in core.members() {
            self.players.update(player_id, |p| p.sync_game_state(running));
        }
        let recipients = core.members().to_vec();
        let _dispatch = room.hand_off(core);

        self.announce_state(room_id, &recipients, change);
        Ok(())
    }

    fn announce_state(&self, room_id: RoomId, recipients: &[PlayerId], change: StateChange) {
        tracing::info!(%room_id, from = %change.from, to = %change.to, "room state changed");
        self.send_frame(
            recipients,
            MessageType::RoomStateChanged,
            Channel::Reliable,
            &change.message(room_id),
        );
        self.publish(LobbyEvent::RoomStateChanged {
            room_id,
            from: change.from,
            to: change.to,
        });
    }

    // =====================================================================
    // Readiness / settings
    // =====================================================================

    /// Flags the player ready (or not) in its current room and tells every
    /// member, the player included.
    pub fn set_player_ready(&self, player_id: &PlayerId, ready: bool) -> Result<RoomId, RoomError> {
        let room_id = self
            .players
            .update(player_id, |p| p.current_room)
            .ok_or_else(|| RoomError::PlayerNotFound(player_id.clone()))?
            .ok_or_else(|| RoomError::NoRoom(player_id.clone()))?;
        let room = self.get_room(room_id).ok_or(RoomError::NotFound(room_id))?;

        let core = room.lock();
        if !core.contains(player_id) {
            return Err(RoomError::NotInRoom(player_id.clone(), room_id));
        }
        self.players.update(player_id, |p| {
            p.is_ready = ready;
            p.touch();
        });
        let recipients = core.members().to_vec();
        let _dispatch = room.hand_off(core);

        tracing::debug!(%player_id, %room_id, ready, "ready state changed");
        let message = PlayerReadyMessage {
            player_id: player_id.clone(),
            room_id,
            is_ready: ready,
        };
        self.send_frame(&recipients, MessageType::PlayerReadyChanged, Channel::Reliable, &message);
        Ok(room_id)
    }

    /// `true` if the room has members and all of them are ready.
    pub fn all_players_ready(&self, room_id: RoomId) -> bool {
        let Some(room) = self.get_room(room_id) else {
            return false;
        };
        let core = room.lock();
        !core.is_empty()
            && core
                .members()
                .iter()
                .all(|id| self.players.update(id, |p| p.is_ready).unwrap_or(false))
    }

    /// Stores a room setting and broadcasts it. Returns the previous value.
    pub fn set_room_setting(
        &self,
        room_id: RoomId,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<Option<String>, RoomError> {
        let (key, value) = (key.into(), value.into());
        let room = self.get_room(room_id).ok_or(RoomError::NotFound(room_id))?;

        let mut core = room.lock();
        if core.is_closed() {
            return Err(RoomError::NotFound(room_id));
        }
        let previous = core.set_setting(key.clone(), value.clone());
        let recipients = core.members().to_vec();
        let _dispatch = room.hand_off(core);

        tracing::debug!(%room_id, key = %key, value = %value, "room setting changed");
        let message = RoomSettingMessage { room_id, key, value };
        self.send_frame(&recipients, MessageType::RoomSettingChanged, Channel::Reliable, &message);
        Ok(previous)
    }

    pub fn room_setting(&self, room_id: RoomId, key: &str) -> Option<String> {
        self.get_room(room_id)?.setting(key)
    }

    // =====================================================================
    // Queries
    // =====================================================================

    pub fn get_room(&self, room_id: RoomId) -> Option<Arc<Room>> {
        self.rooms.get(&room_id).map(|r| Arc::clone(r.value()))
    }

    pub fn room_info(&self, room_id: RoomId) -> Option<RoomInfo> {
        self.get_room(room_id).map(|room| room.info())
    }

    /// Public rooms that have space and haven't started a game.
    pub fn available_rooms(&self) -> Vec<RoomInfo> {
        self.room_handles()
            .into_iter()
            .filter(|room| !room.is_private())
            .filter_map(|room| {
                let core = room.lock();
                let open = !core.is_closed()
                    && !core.is_started()
                    && core.len() < room.capacity();
                open.then(|| room.info_locked(&core))
            })
            .collect()
    }

    pub fn all_rooms(&self) -> Vec<RoomInfo> {
        self.room_handles().iter().map(|room| room.info()).collect()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Clones every room handle out of the map, so rooms can be locked
    /// without holding a shard.
    fn room_handles(&self) -> Vec<Arc<Room>> {
        self.rooms.iter().map(|r| Arc::clone(r.value())).collect()
    }

    // =====================================================================
    // Players
    // =====================================================================

    pub fn create_player(
        &self,
        player_id: PlayerId,
        name: impl Into<String>,
        outbound: Arc<dyn Outbound>,
    ) -> Result<Player, SessionError> {
        self.players.create(player_id, name, outbound)
    }

    /// Disconnect cleanup: leaves the current room, releases voice state
    /// and unregisters the player, in that order. Returns the final
    /// snapshot, or `None` for an unknown player.
    pub fn remove_player(&self, player_id: &PlayerId) -> Option<Player> {
        // Marked first so no join can slip in between the leave and the
        // removal.
        self.players
            .update(player_id, |p| p.state = PlayerState::Disconnected)?;

        match self.leave_current_room(player_id) {
            Ok(_) | Err(RoomError::NoRoom(_)) => {}
            Err(e) => tracing::warn!(%player_id, error = %e, "room cleanup failed"),
        }
        if let Some(voice) = &self.voice {
            voice.release_player(player_id);
        }
        self.players.remove(player_id)
    }

    pub fn get_player(&self, player_id: &PlayerId) -> Option<Player> {
        self.players.get(player_id)
    }

    pub fn all_players(&self) -> Vec<Player> {
        self.players.all()
    }

    /// Removes every player whose transport has gone away.
    pub fn prune_disconnected(&self) -> Vec<PlayerId> {
        let gone = self.players.disconnected();
        for player_id in &gone {
            self.remove_player(player_id);
        }
        if !gone.is_empty() {
            tracing::info!(count = gone.len(), "pruned disconnected players");
        }
        gone
    }
}

/// A player may join only while connected and roomless.
fn check_admission(player: &Player) -> Result<(), RoomError> {
    if player.state == PlayerState::Disconnected {
        return Err(RoomError::PlayerNotFound(player.id.clone()));
    }
    match player.current_room {
        Some(current) => Err(RoomError::AlreadyInRoom(player.id.clone(), current)),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use huddle_transport::{ChannelOutbound, ConnectionId, OutboundFrame};
    use tokio::sync::mpsc::UnboundedReceiver;

    use super::*;
    use crate::ProvisionError;

    fn pid(id: &str) -> PlayerId {
        PlayerId::new(id)
    }

    fn lobby() -> Lobby {
        Lobby::new(Arc::new(PlayerRegistry::new()), LobbyConfig::default())
    }

    fn connect(lobby: &Lobby, id: &str) -> UnboundedReceiver<OutboundFrame> {
        let (out, rx) = ChannelOutbound::pair(ConnectionId::new(id.len() as u64));
        lobby.create_player(pid(id), id.to_uppercase(), Arc::new(out)).unwrap();
        rx
    }

    #[derive(Default)]
    struct RecordingVoice {
        calls: Mutex<Vec<String>>,
        fail: bool,
        talking: Mutex<Vec<PlayerId>>,
    }

    impl VoiceProvisioner for RecordingVoice {
        fn provision(&self, room_id: RoomId) -> Result<(), ProvisionError> {
            self.calls.lock().unwrap().push(format!("provision {room_id}"));
            if self.fail {
                return Err(ProvisionError::Unavailable("offline".into()));
            }
            Ok(())
        }

        fn teardown(&self, room_id: RoomId) -> Result<(), ProvisionError> {
            self.calls.lock().unwrap().push(format!("teardown {room_id}"));
            if self.fail {
                return Err(ProvisionError::MissingChannel(room_id));
            }
            Ok(())
        }

        fn player_left(&self, player_id: &PlayerId, room_id: RoomId) -> bool {
            self.calls.lock().unwrap().push(format!("left {player_id} {room_id}"));
            let mut talking = self.talking.lock().unwrap();
            let before = talking.len();
            talking.retain(|id| id != player_id);
            talking.len() != before
        }

        fn release_player(&self, player_id: &PlayerId) {
            self.calls.lock().unwrap().push(format!("release {player_id}"));
        }
    }

    fn frame_types(rx: &mut UnboundedReceiver<OutboundFrame>) -> Vec<MessageType> {
        let mut types = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            let envelope: Envelope = JsonCodec.decode(frame.data()).unwrap();
            types.push(envelope.message_type);
        }
        types
    }

    #[test]
    fn test_create_room_rejects_zero_capacity() {
        let lobby = lobby();
        let result = lobby.create_room(RoomConfig::new("empty", 0));
        assert!(matches!(result, Err(RoomError::InvalidConfig(_))));
        assert_eq!(lobby.room_count(), 0);
    }

    #[test]
    fn test_create_room_rejects_private_without_password() {
        let lobby = lobby();
        let mut config = RoomConfig::new("hidden", 2);
        config.is_private = true;
        assert!(matches!(lobby.create_room(config), Err(RoomError::InvalidConfig(_))));
    }

    #[test]
    fn test_create_room_respects_room_limit() {
        let config = LobbyConfig {
            max_rooms: 1,
            ..LobbyConfig::default()
        };
        let lobby = Lobby::new(Arc::new(PlayerRegistry::new()), config);
        lobby.create_room(RoomConfig::new("a", 2)).unwrap();
        assert!(matches!(
            lobby.create_room(RoomConfig::new("b", 2)),
            Err(RoomError::TooManyRooms(1))
        ));
    }

    #[test]
    fn test_room_limit_frees_slot_on_destroy() {
        let config = LobbyConfig {
            max_rooms: 1,
            ..LobbyConfig::default()
        };
        let lobby = Lobby::new(Arc::new(PlayerRegistry::new()), config);
        let room = lobby.create_room(RoomConfig::new("a", 2)).unwrap();
        assert!(lobby.destroy_room(room.id()));
        assert!(!lobby.destroy_room(room.id()));

        lobby.create_room(RoomConfig::new("b", 2)).unwrap();
        assert!(lobby.create_room(RoomConfig::new("c", 2)).is_err());
    }

    #[test]
    fn test_concurrent_creates_never_exceed_room_limit() {
        let config = LobbyConfig {
            max_rooms: 5,
            ..LobbyConfig::default()
        };
        let lobby = Arc::new(Lobby::new(Arc::new(PlayerRegistry::new()), config));

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let lobby = Arc::clone(&lobby);
                std::thread::spawn(move || {
                    (0..4)
                        .filter(|j| {
                            lobby
                                .create_room(RoomConfig::new(format!("r{i}-{j}"), 2))
                                .is_ok()
                        })
                        .count()
                })
            })
            .collect();
        let created: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

        assert_eq!(created, 5);
        assert_eq!(lobby.room_count(), 5);
    }

    #[test]
    fn test_talking_member_leaving_stops_talking_for_others() {
        let voice = Arc::new(RecordingVoice::default());
        let lobby = lobby().with_voice_provisioner(voice.clone());
        let _a = connect(&lobby, "a");
        let mut b = connect(&lobby, "bb");
        let room = lobby.create_room(RoomConfig::new("r", 3)).unwrap();
        lobby.join_room(&pid("a"), room.id(), None).unwrap();
        lobby.join_room(&pid("bb"), room.id(), None).unwrap();
        frame_types(&mut b);
        voice.talking.lock().unwrap().push(pid("a"));

        lobby.leave_room(&pid("a"), room.id()).unwrap();

        assert_eq!(
            frame_types(&mut b),
            vec![MessageType::PlayerStoppedTalking, MessageType::PlayerLeftRoom]
        );
        assert!(voice.talking.lock().unwrap().is_empty());

        // Not talking: only the leave is announced.
        lobby.join_room(&pid("a"), room.id(), None).unwrap();
        frame_types(&mut b);
        lobby.leave_room(&pid("a"), room.id()).unwrap();
        assert_eq!(frame_types(&mut b), vec![MessageType::PlayerLeftRoom]);
    }

    #[test]
    fn test_failing_provisioner_does_not_block_rooms() {
        let voice = Arc::new(RecordingVoice {
            fail: true,
            ..RecordingVoice::default()
        });
        let lobby = lobby().with_voice_provisioner(voice.clone());

        let room = lobby.create_room(RoomConfig::new("a", 2)).unwrap();
        assert!(lobby.destroy_room(room.id()));

        let calls = voice.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].starts_with("provision"));
        assert!(calls[1].starts_with("teardown"));
    }

    #[test]
    fn test_remove_player_cleans_room_then_voice() {
        let voice = Arc::new(RecordingVoice::default());
        let lobby = lobby().with_voice_provisioner(voice.clone());
        let _rx = connect(&lobby, "a");
        let room = lobby.create_room(RoomConfig::new("r", 2).persistent()).unwrap();
        lobby.join_room(&pid("a"), room.id(), None).unwrap();

        let removed = lobby.remove_player(&pid("a")).expect("was connected");

        assert_eq!(removed.state, PlayerState::Disconnected);
        assert!(removed.current_room.is_none());
        assert!(room.is_empty());
        assert!(lobby.get_player(&pid("a")).is_none());
        assert_eq!(voice.calls.lock().unwrap().last().unwrap(), "release a");
    }

    #[test]
    fn test_join_or_create_prefers_open_room() {
        let lobby = lobby();
        let _a = connect(&lobby, "a");
        let _b = connect(&lobby, "b");

        let first = lobby.join_or_create(&pid("a"), RoomConfig::new("auto", 2)).unwrap();
        let second = lobby.join_or_create(&pid("b"), RoomConfig::new("auto", 2)).unwrap();

        assert_eq!(first, second);
        assert_eq!(lobby.room_count(), 1);
    }

    #[test]
    fn test_join_or_create_makes_room_when_all_full() {
        let lobby = lobby();
        let _a = connect(&lobby, "a");
        let _b = connect(&lobby, "b");

        let first = lobby.join_or_create(&pid("a"), RoomConfig::new("solo", 1)).unwrap();
        let second = lobby.join_or_create(&pid("b"), RoomConfig::new("solo", 1)).unwrap();

        assert_ne!(first, second);
        assert_eq!(lobby.room_count(), 2);
    }

    #[test]
    fn test_all_players_ready() {
        let lobby = lobby();
        let _a = connect(&lobby, "a");
        let _b = connect(&lobby, "b");
        let room = lobby.create_room(RoomConfig::new("r", 2)).unwrap();
        assert!(!lobby.all_players_ready(room.id()), "empty room");

        lobby.join_room(&pid("a"), room.id(), None).unwrap();
        lobby.join_room(&pid("b"), room.id(), None).unwrap();
        lobby.set_player_ready(&pid("a"), true).unwrap();
        assert!(!lobby.all_players_ready(room.id()));

        lobby.set_player_ready(&pid("b"), true).unwrap();
        assert!(lobby.all_players_ready(room.id()));
    }

    #[test]
    fn test_set_ready_without_room_fails() {
        let lobby = lobby();
        let _a = connect(&lobby, "a");
        assert!(matches!(
            lobby.set_player_ready(&pid("a"), true),
            Err(RoomError::NoRoom(_))
        ));
    }
}
