//! Relay errors

/// Errors surfaced by the public relay API.
///
/// Nothing in the relay core is fatal once running: transport, store and
/// persistence failures all degrade to "retry later" or "drop this one
/// message" internally. These errors cover the API boundary only.
#[derive(Debug)]
pub enum RelayError {
    /// Failed to start the relay.
    StartFailed(String),
    /// Local database error.
    Database(String),
    /// The relay is not running.
    NotRunning,
    /// Invalid input provided.
    InvalidInput(String),
}

impl std::fmt::Display for RelayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RelayError::StartFailed(e) => write!(f, "failed to start relay: {}", e),
            RelayError::Database(e) => write!(f, "database error: {}", e),
            RelayError::NotRunning => write!(f, "relay is not running"),
            RelayError::InvalidInput(e) => write!(f, "invalid input: {}", e),
        }
    }
}

impl std::error::Error for RelayError {}
