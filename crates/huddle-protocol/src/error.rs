//! Error types for the protocol layer.
//!
//! Each crate in Huddle defines its own error enum, so a `ProtocolError`
//! always means serialization went wrong, never room or voice logic.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, missing fields, wrong types,
    /// or a truncated frame.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The message decoded but violates a protocol rule, e.g. an audio
    /// packet whose byte count doesn't match its declared bit depth.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
