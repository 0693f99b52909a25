//! Voice channels and the positional audio pipeline.
//!
//! Every room gets a [`VoiceChannel`] when it is created and loses it when
//! it is destroyed; the [`ChannelRegistry`] does both through the lobby's
//! [`VoiceProvisioner`](huddle_room::VoiceProvisioner) hook. The
//! [`VoipManager`] takes inbound [`AudioPacket`](huddle_protocol::AudioPacket)s,
//! cleans them up and sends each other member a copy shaped for where they
//! stand.
//!
//! # Key types
//!
//! - [`ChannelRegistry`]: channels by room, voice state by player
//! - [`VoipManager`]: talking edges and the per-packet pipeline
//! - [`PlayerVoiceState`]: mute/deafen, volumes, link quality
//! - [`VoiceConfig`]: sample format, distances, DSP switches
//!
//! The sample-level helpers live in [`dsp`] and [`spatial`].

mod channel;
mod config;
pub mod dsp;
mod error;
mod manager;
mod registry;
pub mod spatial;
mod state;

pub use channel::VoiceChannel;
pub use config::{VoiceActivation, VoiceConfig};
pub use error::VoiceError;
pub use manager::{DropReason, PacketDisposition, VoiceEvent, VoipManager};
pub use registry::ChannelRegistry;
pub use state::{MAX_VOLUME, PlayerVoiceState, TalkingEdge, VoiceQuality};
