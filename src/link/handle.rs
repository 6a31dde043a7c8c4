//! # Link Handle
//!
//! Cloneable front door to a running [`SonarLink`](super::SonarLink). Every call
//! becomes a message on the link's event channel.

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;

use super::state::{LinkCommand, LinkEvent};
use crate::config::LinkConfig;
use crate::error::{Result, SonarLinkError};
use crate::location::Location;
use crate::transport::{DeviceId, TransportEventSender};

/// Application-side handle to the link
#[derive(Debug, Clone)]
pub struct LinkHandle {
    events: UnboundedSender<LinkEvent>,
}

impl LinkHandle {
    /// Create the link's event channel
    ///
    /// The receiver goes to [`SonarLink::run`](super::SonarLink::run).
    pub fn channel() -> (Self, UnboundedReceiver<LinkEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        (Self { events }, rx)
    }

    /// Sender a transport uses to deliver its callbacks
    pub fn transport_events(&self) -> TransportEventSender {
        TransportEventSender::new(self.events.clone())
    }

    pub(crate) fn event_sender(&self) -> UnboundedSender<LinkEvent> {
        self.events.clone()
    }

    fn send(&self, command: LinkCommand) -> Result<()> {
        self.events
            .send(LinkEvent::Command(command))
            .map_err(|_| SonarLinkError::LinkClosed)
    }

    /// Connect to `device`
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` unless the link is idle, disconnected or failed
    pub async fn connect(&self, device: DeviceId) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(LinkCommand::Connect { device, reply })?;
        rx.await.map_err(|_| SonarLinkError::LinkClosed)?
    }

    /// Replace the link configuration
    pub async fn configure(&self, config: LinkConfig) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(LinkCommand::Configure { config, reply })?;
        rx.await.map_err(|_| SonarLinkError::LinkClosed)?
    }

    pub fn disconnect(&self) -> Result<()> {
        self.send(LinkCommand::Disconnect)
    }

    /// Supply the latest GPS fix
    pub fn set_location(&self, location: Location) -> Result<()> {
        self.send(LinkCommand::SetLocation(location))
    }

    pub fn set_logging_enabled(&self, enabled: bool) -> Result<()> {
        self.send(LinkCommand::SetLoggingEnabled(enabled))
    }

    /// Disconnect and stop the link task
    pub fn shutdown(&self) -> Result<()> {
        self.send(LinkCommand::Shutdown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_commands_are_queued_as_events() {
        let (handle, mut rx) = LinkHandle::channel();
        handle.set_location(Location::new(1.0, 2.0)).unwrap();
        handle.set_logging_enabled(false).unwrap();
        handle.disconnect().unwrap();

        assert!(matches!(
            rx.recv().await,
            Some(LinkEvent::Command(LinkCommand::SetLocation(l))) if l == Location::new(1.0, 2.0)
        ));
        assert!(matches!(
            rx.recv().await,
            Some(LinkEvent::Command(LinkCommand::SetLoggingEnabled(false)))
        ));
        assert!(matches!(
            rx.recv().await,
            Some(LinkEvent::Command(LinkCommand::Disconnect))
        ));
    }

    #[tokio::test]
    async fn test_closed_link() {
        let (handle, rx) = LinkHandle::channel();
        drop(rx);
        tokio_test::assert_err!(handle.shutdown());
        assert!(matches!(
            handle.connect(DeviceId::from("x")).await,
            Err(SonarLinkError::LinkClosed)
        ));
    }

    #[tokio::test]
    async fn test_unanswered_request_reports_closed() {
        let (handle, mut rx) = LinkHandle::channel();
        let responder = tokio::spawn(async move {
            // Drop the reply sender without answering
            let _ = rx.recv().await;
        });
        let result = handle.configure(LinkConfig::default()).await;
        responder.await.unwrap();
        assert!(matches!(result, Err(SonarLinkError::LinkClosed)));
    }
}
