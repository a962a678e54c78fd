//! Error types for the protocol layer.
//!
//! Each crate in Duelroom defines its own error enum. When you see a
//! `ProtocolError`, the problem is in turning bytes into messages (or
//! back), not in networking or room management.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes into a Rust type).
    ///
    /// Common causes: malformed JSON, an unknown `"type"` tag, or an
    /// ability name the server doesn't know.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The message is well-formed but violates protocol rules,
    /// e.g. an outcome string that is neither `timeout` nor `winner:<role>`.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
