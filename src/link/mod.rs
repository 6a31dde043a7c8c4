//! # Sonar Link Module
//!
//! Connection state machine tying the transport, protocol, filter and watchdog
//! together.
//!
//! This module handles:
//! - Connect/configure/disconnect requests from the application
//! - Transport lifecycle callbacks and service validation
//! - Decoding telemetry and forwarding significant samples to the sample log
//! - Forcing a disconnect when the device goes silent
//!
//! ## Ownership
//!
//! [`SonarLink`] is the only owner of link state. Transport callbacks, application
//! commands and watchdog ticks all arrive as [`LinkEvent`]s on one channel and are
//! handled in order by [`SonarLink::run`]. Handlers never block.
//!
//! ## States
//!
//! ```text
//! None/Disconnected/ConnectFailed --connect--> Connecting --> Connected --services ok--> Ready
//!                                                  |               |--services bad--> ConnectFailed
//!                                                  `--failed--> ConnectFailed
//! any non-terminal --disconnect--> Disconnecting --> Disconnected
//! ```

pub mod filter;
pub mod handle;
pub mod state;
pub mod watchdog;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, info, warn};

use crate::config::LinkConfig;
use crate::error::{Result, SonarLinkError};
use crate::location::{Location, LocationSource};
use crate::protocol::{ServiceLayout, SonarProtocol};
use crate::sample::Sample;
use crate::telemetry::SampleSink;
use crate::transport::{ConnectOptions, DeviceId, DisconnectReason, ServiceInfo, Transport, TransportEvent};

use filter::SampleFilter;
pub use handle::LinkHandle;
pub use state::{ConnectionState, LinkCommand, LinkEvent, LinkNotification};
use watchdog::{LinkWatchdog, TickOutcome};

/// Source of receipt timestamps, in milliseconds since the epoch
pub type Clock = fn() -> i64;

/// Wall-clock receipt time
pub fn system_clock() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Connection state machine and sample pipeline
pub struct SonarLink<T: Transport, S: SampleSink> {
    protocol: Box<dyn SonarProtocol>,
    layout: ServiceLayout,
    transport: T,
    sink: S,
    config: LinkConfig,
    connect_options: ConnectOptions,

    state: ConnectionState,
    device: Option<DeviceId>,
    services_resolved: bool,
    location_characteristic: Option<u16>,

    location: LocationSource,
    filter: SampleFilter,
    logging_enabled: bool,
    last_sample_time: i64,
    clock: Clock,

    watchdog: LinkWatchdog,
    timed_out: bool,

    events: UnboundedSender<LinkEvent>,
    notifications: UnboundedSender<LinkNotification>,
}

impl<T: Transport, S: SampleSink> std::fmt::Debug for SonarLink<T, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SonarLink")
            .field("protocol", &self.protocol.name())
            .field("state", &self.state)
            .field("device", &self.device)
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

impl<T: Transport, S: SampleSink> SonarLink<T, S> {
    /// Create a link driven by events from `handle`'s channel
    ///
    /// # Returns
    ///
    /// * The link, and the receiver for its notifications to the application
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use sonar_link::config::Config;
    /// use sonar_link::link::{LinkHandle, SonarLink};
    /// use sonar_link::protocol::erchang::Erchang;
    /// use sonar_link::sample::Sample;
    /// use sonar_link::transport::simulator::SimulatedSonar;
    ///
    /// #[tokio::main]
    /// async fn main() -> anyhow::Result<()> {
    ///     let config = Config::default();
    ///     let (handle, events) = LinkHandle::channel();
    ///     let transport = SimulatedSonar::new(config.simulator.clone(), handle.transport_events());
    ///     let (link, _notifications) = SonarLink::new(
    ///         Box::new(Erchang),
    ///         transport,
    ///         Vec::<Sample>::new(),
    ///         config.sonar.clone(),
    ///         (&config.transport).into(),
    ///         &handle,
    ///     );
    ///     tokio::spawn(link.run(events));
    ///     handle.connect("simulator".into()).await?;
    ///     Ok(())
    /// }
    /// ```
    pub fn new(
        protocol: Box<dyn SonarProtocol>,
        transport: T,
        sink: S,
        config: LinkConfig,
        connect_options: ConnectOptions,
        handle: &LinkHandle,
    ) -> (Self, UnboundedReceiver<LinkNotification>) {
        let (notifications, rx) = mpsc::unbounded_channel();
        let layout = protocol.layout();
        let link = Self {
            protocol,
            layout,
            transport,
            sink,
            filter: SampleFilter::from_config(&config),
            config,
            connect_options,
            state: ConnectionState::None,
            device: None,
            services_resolved: false,
            location_characteristic: None,
            location: LocationSource::default(),
            logging_enabled: true,
            last_sample_time: 0,
            clock: system_clock,
            watchdog: LinkWatchdog::new(),
            timed_out: false,
            events: handle.event_sender(),
            notifications,
        };
        (link, rx)
    }

    /// Replace the receipt-time source
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    pub fn location_source(&self) -> LocationSource {
        self.location
    }

    pub fn last_logged(&self) -> Option<&Sample> {
        self.filter.last_logged()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Short summary of the last logged depth and position
    pub fn status_text(&self) -> String {
        match self.filter.last_logged() {
            None => "Depth unknown".to_string(),
            Some(sample) => format!(
                "Depth {:.2}m Lat {:.6} Lon {:.6}",
                sample.depth(),
                sample.latitude(),
                sample.longitude()
            ),
        }
    }

    /// Process events until shutdown
    pub async fn run(mut self, mut events: UnboundedReceiver<LinkEvent>) {
        info!("Sonar link running ({} protocol)", self.protocol.name());

        while let Some(event) = events.recv().await {
            if !self.handle_event(event) {
                break;
            }
        }

        self.watchdog.disarm();
        info!("Sonar link stopped");
    }

    /// Handle one event. Returns false when the link should stop.
    pub fn handle_event(&mut self, event: LinkEvent) -> bool {
        match event {
            LinkEvent::Transport(event) => self.on_transport_event(event),
            LinkEvent::WatchdogTick { generation } => self.on_watchdog_tick(generation),
            LinkEvent::Command(command) => return self.on_command(command),
        }
        true
    }

    fn on_command(&mut self, command: LinkCommand) -> bool {
        match command {
            LinkCommand::Connect { device, reply } => {
                let _ = reply.send(self.connect(device));
            }
            LinkCommand::Configure { config, reply } => {
                let _ = reply.send(self.configure(config));
            }
            LinkCommand::Disconnect => self.disconnect(),
            LinkCommand::SetLocation(location) => self.set_location(location),
            LinkCommand::SetLoggingEnabled(enabled) => self.set_logging_enabled(enabled),
            LinkCommand::Shutdown => {
                info!("Shutdown requested");
                self.disconnect();
                return false;
            }
        }
        true
    }

    /// Start connecting to `device`
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - A connection already exists or is in progress
    /// - The transport refuses the request
    pub fn connect(&mut self, device: DeviceId) -> Result<()> {
        if !self.state.can_connect() {
            return Err(SonarLinkError::InvalidState {
                operation: "connect",
                state: self.state,
            });
        }

        info!("Connecting to {}", device);
        self.timed_out = false;
        self.device = Some(device.clone());

        if let Err(e) = self.transport.connect(&device, &self.connect_options) {
            error!("Transport refused connection to {}: {}", device, e);
            self.set_state(ConnectionState::ConnectFailed, Some(DisconnectReason::Unknown));
            return Err(e);
        }

        self.set_state(ConnectionState::Connecting, None);
        Ok(())
    }

    /// Replace the link configuration
    ///
    /// The configuration is kept for the life of the link. If the device services
    /// are resolved it is sent straight away and the watchdog restarted with the
    /// new timeout; otherwise it is sent when the link becomes ready.
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is out of range or the write fails
    pub fn configure(&mut self, config: LinkConfig) -> Result<()> {
        config.validate()?;
        debug!(
            "configure(sensitivity {}, noise {}, range {}, min depth {}m, min move {}m, timeout {}ms)",
            config.sensitivity,
            config.noise,
            config.range,
            config.min_delta_depth,
            config.min_delta_pos,
            config.sample_timeout_ms
        );

        self.filter.set_thresholds(&config);
        self.config = config;

        if !self.services_resolved {
            debug!("Device services not resolved, configuration will be sent when ready");
            return Ok(());
        }

        self.send_configuration()
    }

    /// Disconnect from the device. Does nothing if already disconnected.
    pub fn disconnect(&mut self) {
        if self.state.is_terminal() || self.state == ConnectionState::Disconnecting {
            debug!("disconnect() ignored in state {}", self.state);
            return;
        }

        self.watchdog.disarm();
        self.services_resolved = false;
        self.set_state(ConnectionState::Disconnecting, None);

        if let Err(e) = self.transport.disconnect() {
            warn!("Transport disconnect failed: {}", e);
            self.finish_disconnect(DisconnectReason::Unknown);
        }
    }

    /// Supply the latest GPS fix. Ignored once bench fixes have been received.
    pub fn set_location(&mut self, location: Location) {
        if !self.location.update_live(location) {
            debug!("Ignoring live location, bench locations are latched");
        }
    }

    /// Turn sample logging on or off. Turning it on logs the next sample.
    pub fn set_logging_enabled(&mut self, enabled: bool) {
        if enabled && !self.logging_enabled {
            self.filter.force_next();
        }
        self.logging_enabled = enabled;
        info!("Sample logging {}", if enabled { "enabled" } else { "disabled" });
    }

    fn set_state(&mut self, state: ConnectionState, reason: Option<DisconnectReason>) {
        if self.state == state {
            return;
        }

        match reason {
            Some(reason) => info!("Link {} -> {} ({})", self.state, state, reason),
            None => info!("Link {} -> {}", self.state, state),
        }
        self.state = state;

        let _ = self.notifications.send(LinkNotification::StateChanged {
            state,
            device: self.device.clone(),
            reason,
        });
    }

    fn finish_disconnect(&mut self, reason: DisconnectReason) {
        self.watchdog.disarm();
        self.services_resolved = false;
        self.location_characteristic = None;

        let reason = if self.timed_out {
            DisconnectReason::Timeout
        } else {
            reason
        };
        self.set_state(ConnectionState::Disconnected, Some(reason));
    }

    fn on_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Connecting => self.set_state(ConnectionState::Connecting, None),
            TransportEvent::Connected => self.set_state(ConnectionState::Connected, None),
            TransportEvent::ServicesDiscovered(services) => self.on_services_discovered(&services),
            TransportEvent::FailedToConnect(reason) => {
                self.watchdog.disarm();
                self.services_resolved = false;
                self.set_state(ConnectionState::ConnectFailed, Some(reason));
            }
            TransportEvent::Disconnecting => {
                self.watchdog.disarm();
                self.services_resolved = false;
                if !self.state.is_terminal() {
                    self.set_state(ConnectionState::Disconnecting, None);
                }
            }
            TransportEvent::Disconnected(reason) => {
                if self.state.is_terminal() {
                    debug!("Transport disconnected ({}) while {}", reason, self.state);
                    self.watchdog.disarm();
                    return;
                }
                self.finish_disconnect(reason);
            }
            TransportEvent::DataReceived { characteristic, data } => {
                if characteristic == self.layout.sample {
                    self.on_sample_frame(&data);
                } else if Some(characteristic) == self.location_characteristic {
                    self.on_location_fix(&data);
                } else {
                    debug!("Ignoring data from characteristic 0x{:04X}", characteristic);
                }
            }
        }
    }

    /// Check the device exposes what the protocol needs
    ///
    /// Returns the usable location characteristic, if any.
    fn resolve_services(&self, services: &[ServiceInfo]) -> Result<Option<u16>> {
        let layout = &self.layout;
        let service = services
            .iter()
            .find(|s| s.uuid == layout.service)
            .ok_or_else(|| {
                SonarLinkError::ServiceDiscovery(format!("service 0x{:04X} not found", layout.service))
            })?;

        let sample = service.characteristic(layout.sample).ok_or_else(|| {
            SonarLinkError::ServiceDiscovery("no sample characteristic".to_string())
        })?;
        let configure = service.characteristic(layout.configure).ok_or_else(|| {
            SonarLinkError::ServiceDiscovery("no configure characteristic".to_string())
        })?;

        if !sample.can_notify() {
            return Err(SonarLinkError::ServiceDiscovery(
                "sample characteristic cannot notify".to_string(),
            ));
        }
        if !configure.can_write() {
            return Err(SonarLinkError::ServiceDiscovery(
                "configure characteristic is not writable".to_string(),
            ));
        }

        let location = layout
            .location
            .and_then(|uuid| service.characteristic(uuid))
            .and_then(|c| {
                if c.can_notify() {
                    Some(c.uuid)
                } else {
                    warn!("Location characteristic cannot notify, ignoring it");
                    None
                }
            });

        Ok(location)
    }

    fn on_services_discovered(&mut self, services: &[ServiceInfo]) {
        if !matches!(self.state, ConnectionState::Connecting | ConnectionState::Connected) {
            warn!("Ignoring service discovery while {}", self.state);
            return;
        }

        // Location before samples, so fixes precede the frames they belong to
        let result = self.resolve_services(services).and_then(|location| {
            let location = location.filter(|&uuid| match self.transport.enable_notifications(uuid) {
                Ok(()) => true,
                Err(e) => {
                    warn!("Could not enable location notifications: {}", e);
                    false
                }
            });
            self.transport.enable_notifications(self.layout.sample)?;
            Ok(location)
        });

        match result {
            Ok(location) => {
                self.location_characteristic = location;
                self.services_resolved = true;
                self.filter.force_next();
                self.set_state(ConnectionState::Ready, None);
                if let Err(e) = self.send_configuration() {
                    warn!("Failed to send configuration: {}", e);
                }
            }
            Err(e) => {
                error!("{}", e);
                self.watchdog.disarm();
                self.services_resolved = false;
                self.set_state(ConnectionState::ConnectFailed, Some(DisconnectReason::NotSupported));
                if let Err(e) = self.transport.disconnect() {
                    warn!("Transport disconnect failed: {}", e);
                }
            }
        }
    }

    /// Write the configure frame and restart the watchdog
    fn send_configuration(&mut self) -> Result<()> {
        self.watchdog.disarm();

        let frame = self.protocol.encode_configure(&self.config);
        let result = self.transport.write(self.layout.configure, &frame);
        match &result {
            Ok(()) => debug!("Configuration sent to {:?}", self.device),
            Err(e) => warn!("Configuration write failed: {}", e),
        }

        let events = self.events.clone();
        self.watchdog.arm(self.config.sample_timeout_ms, move |generation| {
            events.send(LinkEvent::WatchdogTick { generation }).is_ok()
        });

        result
    }

    fn receipt_time(&mut self) -> i64 {
        let now = (self.clock)().max(self.last_sample_time);
        self.last_sample_time = now;
        now
    }

    fn on_sample_frame(&mut self, data: &[u8]) {
        if !self.services_resolved {
            debug!("Sample frame before services resolved, dropping");
            return;
        }

        let time = self.receipt_time();
        let reading = match self.protocol.decode_sample(data, time) {
            Ok(reading) => reading,
            Err(e) => {
                warn!("Dropping frame ({} bytes): {}", data.len(), e);
                return;
            }
        };

        let location = self.location.current();
        let sample = Sample::new(&reading, location);
        self.watchdog.note_sample();

        if !self.logging_enabled || !self.filter.accept(&sample, location) {
            return;
        }

        if let Err(e) = self.sink.log_sample(&sample) {
            error!("Failed to log sample: {}", e);
        }
        let _ = self
            .notifications
            .send(LinkNotification::Status(self.status_text()));
    }

    fn on_location_fix(&mut self, data: &[u8]) {
        match Location::from_fix_bytes(data) {
            Ok(location) => {
                if !self.location.is_latched() {
                    info!("Bench location received, ignoring live locations from now on");
                }
                self.location.update_test(location);
            }
            Err(e) => warn!("Dropping location fix: {}", e),
        }
    }

    fn on_watchdog_tick(&mut self, generation: u64) {
        match self.watchdog.on_tick(generation) {
            TickOutcome::Stale => debug!("Stale watchdog tick (generation {})", generation),
            TickOutcome::Healthy => {}
            TickOutcome::Expired => {
                warn!("{}", SonarLinkError::WatchdogTimeout(self.watchdog.period_ms()));
                self.timed_out = true;
                self.disconnect();
            }
        }
    }
}
