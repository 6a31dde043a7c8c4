//! # Error Types
//!
//! Custom error types for Sonar Link using `thiserror`.

use thiserror::Error;

use crate::link::state::ConnectionState;

/// Main error type for Sonar Link
#[derive(Debug, Error)]
pub enum SonarLinkError {
    /// Frame has the wrong length or bad identifier bytes
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    /// Frame checksum does not match its contents
    #[error("Checksum mismatch: expected 0x{expected:02X}, got 0x{actual:02X}")]
    ChecksumMismatch { expected: u8, actual: u8 },

    /// Device does not expose the service or characteristics we need
    #[error("Service discovery failed: {0}")]
    ServiceDiscovery(String),

    /// No sample arrived within the configured window
    #[error("No sample received within {0} ms")]
    WatchdogTimeout(u64),

    /// Operation not permitted in the current connection state
    #[error("Cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: ConnectionState,
    },

    /// Persisted sample record could not be parsed
    #[error("Invalid sample record: {0}")]
    InvalidRecord(String),

    /// Transport layer rejected a request
    #[error("Transport error: {0}")]
    Transport(String),

    /// The link task has stopped and no longer accepts commands
    #[error("Link task is no longer running")]
    LinkClosed,

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Sample log serialization errors
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for Sonar Link
pub type Result<T> = std::result::Result<T, SonarLinkError>;
