//! Wire envelope
//!
//! Each transport payload carries exactly one message, text-encoded as a
//! flat JSON record. No fragmentation or batching happens here; payloads
//! that are too large or do not parse are rejected, and the caller drops
//! that single message while processing continues.

use crate::message::Message;

/// Upper bound on a single wire payload.
pub const MAX_WIRE_SIZE: usize = 64 * 1024;

/// Errors when encoding or decoding a wire payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    /// Payload exceeds [`MAX_WIRE_SIZE`].
    TooLarge(usize),
    /// Payload is not a valid message record.
    Malformed(String),
    /// Record parsed but carries an empty id or sender.
    MissingIdentity,
}

impl std::fmt::Display for WireError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WireError::TooLarge(size) => {
                write!(f, "payload too large: {} bytes (max {})", size, MAX_WIRE_SIZE)
            }
            WireError::Malformed(e) => write!(f, "malformed payload: {}", e),
            WireError::MissingIdentity => write!(f, "payload missing message id or sender"),
        }
    }
}

impl std::error::Error for WireError {}

/// Encode a message as one wire payload.
pub fn encode(message: &Message) -> Result<Vec<u8>, WireError> {
    let bytes = serde_json::to_vec(message).map_err(|e| WireError::Malformed(e.to_string()))?;
    if bytes.len() > MAX_WIRE_SIZE {
        return Err(WireError::TooLarge(bytes.len()));
    }
    Ok(bytes)
}

/// Decode one wire payload into a message.
pub fn decode(bytes: &[u8]) -> Result<Message, WireError> {
    if bytes.len() > MAX_WIRE_SIZE {
        return Err(WireError::TooLarge(bytes.len()));
    }
    let message: Message =
        serde_json::from_slice(bytes).map_err(|e| WireError::Malformed(e.to_string()))?;
    if message.id.is_empty() || message.sender_id.is_empty() {
        return Err(WireError::MissingIdentity);
    }
    Ok(message)
}
