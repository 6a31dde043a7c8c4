//! # Transport Module
//!
//! The wireless transport is an external collaborator. This module defines the
//! requests the link makes of it and the events it must deliver back.
//!
//! Requests are non-blocking: a transport queues the work and reports progress
//! later as [`TransportEvent`]s through a [`TransportEventSender`]. Connection
//! retry and backoff belong to the transport; the link never retries on its own.

pub mod simulator;

use std::fmt;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;

use crate::config::TransportConfig;
use crate::error::Result;
use crate::link::state::LinkEvent;

/// Characteristic supports write without response
pub const PROPERTY_WRITE_NO_RESPONSE: u8 = 0x04;

/// Characteristic supports write with response
pub const PROPERTY_WRITE: u8 = 0x08;

/// Characteristic supports notifications
pub const PROPERTY_NOTIFY: u8 = 0x10;

/// Transport-specific device address
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceId(pub String);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(id: &str) -> Self {
        DeviceId(id.to_string())
    }
}

/// Connection policy handed to the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    pub timeout: Duration,
    pub retry_count: u32,
    pub retry_delay: Duration,
    pub auto_connect: bool,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self::from(&TransportConfig::default())
    }
}

impl From<&TransportConfig> for ConnectOptions {
    fn from(config: &TransportConfig) -> Self {
        Self {
            timeout: Duration::from_millis(config.connect_timeout_ms),
            retry_count: config.retry_count,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
            auto_connect: config.auto_connect,
        }
    }
}

/// Why a connection ended or failed, as reported by the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    Unknown,
    Success,
    TerminateLocalHost,
    TerminatePeerUser,
    LinkLoss,
    NotSupported,
    Cancelled,
    /// Connect timed out, or the sample watchdog gave up on a silent device
    Timeout,
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DisconnectReason::Unknown => "unknown",
            DisconnectReason::Success => "success",
            DisconnectReason::TerminateLocalHost => "terminated locally",
            DisconnectReason::TerminatePeerUser => "terminated by peer",
            DisconnectReason::LinkLoss => "link loss",
            DisconnectReason::NotSupported => "not supported",
            DisconnectReason::Cancelled => "cancelled",
            DisconnectReason::Timeout => "timeout",
        };
        f.write_str(name)
    }
}

/// A discovered characteristic and its capability flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharacteristicInfo {
    pub uuid: u16,
    pub properties: u8,
}

impl CharacteristicInfo {
    pub fn new(uuid: u16, properties: u8) -> Self {
        Self { uuid, properties }
    }

    pub fn can_notify(&self) -> bool {
        self.properties & PROPERTY_NOTIFY != 0
    }

    pub fn can_write(&self) -> bool {
        self.properties & (PROPERTY_WRITE | PROPERTY_WRITE_NO_RESPONSE) != 0
    }
}

/// A discovered service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInfo {
    pub uuid: u16,
    pub characteristics: Vec<CharacteristicInfo>,
}

impl ServiceInfo {
    pub fn characteristic(&self, uuid: u16) -> Option<&CharacteristicInfo> {
        self.characteristics.iter().find(|c| c.uuid == uuid)
    }
}

/// Callbacks from the transport
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Connecting,
    Connected,
    ServicesDiscovered(Vec<ServiceInfo>),
    FailedToConnect(DisconnectReason),
    Disconnecting,
    Disconnected(DisconnectReason),
    DataReceived { characteristic: u16, data: Vec<u8> },
}

/// Where a transport delivers its events
#[derive(Debug, Clone)]
pub struct TransportEventSender {
    events: UnboundedSender<LinkEvent>,
}

impl TransportEventSender {
    pub(crate) fn new(events: UnboundedSender<LinkEvent>) -> Self {
        Self { events }
    }

    /// Queue an event for the link. Returns false once the link has stopped.
    pub fn send(&self, event: TransportEvent) -> bool {
        self.events.send(LinkEvent::Transport(event)).is_ok()
    }
}

/// Wireless transport requests
#[cfg_attr(test, mockall::automock)]
pub trait Transport: Send {
    /// Begin connecting to `device`
    fn connect(&mut self, device: &DeviceId, options: &ConnectOptions) -> Result<()>;

    /// Begin disconnecting from the current device
    fn disconnect(&mut self) -> Result<()>;

    /// Write to a characteristic
    fn write(&mut self, characteristic: u16, data: &[u8]) -> Result<()>;

    /// Subscribe to notifications from a characteristic
    fn enable_notifications(&mut self, characteristic: u16) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_characteristic_capabilities() {
        let notify = CharacteristicInfo::new(0xFFF1, PROPERTY_NOTIFY);
        assert!(notify.can_notify());
        assert!(!notify.can_write());

        let write = CharacteristicInfo::new(0xFFF2, PROPERTY_WRITE);
        assert!(write.can_write());
        assert!(!write.can_notify());

        let unacked = CharacteristicInfo::new(0xFFF2, PROPERTY_WRITE_NO_RESPONSE);
        assert!(unacked.can_write());
    }

    #[test]
    fn test_service_characteristic_lookup() {
        let service = ServiceInfo {
            uuid: 0xFFF0,
            characteristics: vec![
                CharacteristicInfo::new(0xFFF1, PROPERTY_NOTIFY),
                CharacteristicInfo::new(0xFFF2, PROPERTY_WRITE),
            ],
        };
        assert_eq!(service.characteristic(0xFFF2).map(|c| c.uuid), Some(0xFFF2));
        assert!(service.characteristic(0xFFF3).is_none());
    }

    #[test]
    fn test_connect_options_from_config() {
        let options = ConnectOptions::default();
        assert_eq!(options.timeout, Duration::from_secs(100));
        assert_eq!(options.retry_count, 3);
        assert_eq!(options.retry_delay, Duration::from_millis(100));
        assert!(options.auto_connect);
    }

    #[test]
    fn test_event_sender_reports_closed_link() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let sender = TransportEventSender::new(tx);
        assert!(sender.send(TransportEvent::Connecting));
        drop(rx);
        assert!(!sender.send(TransportEvent::Connected));
    }
}
