//! # Link State and Messages
//!
//! Connection states, the events the link consumes, and the notifications it
//! publishes to the application.

use std::fmt;

use tokio::sync::oneshot;

use crate::config::LinkConfig;
use crate::error::Result;
use crate::location::Location;
use crate::transport::{DeviceId, DisconnectReason, TransportEvent};

/// Connection lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    None,
    Connecting,
    Connected,
    Ready,
    Disconnecting,
    Disconnected,
    ConnectFailed,
}

impl ConnectionState {
    /// No connection exists or is being made
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ConnectionState::None | ConnectionState::Disconnected | ConnectionState::ConnectFailed
        )
    }

    /// A new connection may be started from here
    pub fn can_connect(&self) -> bool {
        self.is_terminal()
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Requests from the application
#[derive(Debug)]
pub enum LinkCommand {
    Connect {
        device: DeviceId,
        reply: oneshot::Sender<Result<()>>,
    },
    Configure {
        config: LinkConfig,
        reply: oneshot::Sender<Result<()>>,
    },
    Disconnect,
    SetLocation(Location),
    SetLoggingEnabled(bool),
    Shutdown,
}

/// Everything the link reacts to, in one ordered stream
#[derive(Debug)]
pub enum LinkEvent {
    Transport(TransportEvent),
    Command(LinkCommand),
    WatchdogTick { generation: u64 },
}

/// Published to the application
#[derive(Debug, Clone, PartialEq)]
pub enum LinkNotification {
    StateChanged {
        state: ConnectionState,
        device: Option<DeviceId>,
        reason: Option<DisconnectReason>,
    },
    /// Summary of the last logged depth and position
    Status(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(ConnectionState::None.is_terminal());
        assert!(ConnectionState::Disconnected.is_terminal());
        assert!(ConnectionState::ConnectFailed.is_terminal());
        assert!(!ConnectionState::Connecting.is_terminal());
        assert!(!ConnectionState::Connected.is_terminal());
        assert!(!ConnectionState::Ready.is_terminal());
        assert!(!ConnectionState::Disconnecting.is_terminal());
    }

    #[test]
    fn test_default_state() {
        assert_eq!(ConnectionState::default(), ConnectionState::None);
        assert_eq!(ConnectionState::ConnectFailed.to_string(), "ConnectFailed");
    }
}
