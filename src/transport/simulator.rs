//! # Simulated Sonar
//!
//! A bench transport that plays the device side of the Erchang protocol, so the
//! whole pipeline can run without hardware or GPS.
//!
//! Once connected it:
//! - Advertises the sonar service with sample, configure and location characteristics
//! - Streams valid telemetry frames while sample notifications are enabled
//! - Sends location fixes on the test characteristic, walking slowly north-east
//! - Optionally goes silent after a number of frames, to exercise the watchdog

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, sleep};
use tracing::{debug, info, warn};

use super::{
    CharacteristicInfo, ConnectOptions, DeviceId, DisconnectReason, ServiceInfo, Transport,
    TransportEvent, TransportEventSender, PROPERTY_NOTIFY, PROPERTY_WRITE,
};
use crate::config::SimulatorConfig;
use crate::error::{Result, SonarLinkError};
use crate::location::Location;
use crate::protocol::erchang::checksum::sum8;
use crate::protocol::erchang::constants::*;
use crate::protocol::erchang::encoder::encode_sample_frame;
use crate::protocol::SonarReading;

/// Delay between simulated connection lifecycle steps
const LIFECYCLE_STEP: Duration = Duration::from_millis(50);

/// Degrees moved per frame along each axis
const WALK_STEP_DEGREES: f64 = 0.00002;

/// Bench transport producing synthetic telemetry
pub struct SimulatedSonar {
    config: SimulatorConfig,
    events: TransportEventSender,
    connection: Option<JoinHandle<()>>,
    stream: Option<JoinHandle<()>>,
    locations_enabled: bool,
}

impl std::fmt::Debug for SimulatedSonar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedSonar")
            .field("streaming", &self.stream.is_some())
            .field("locations_enabled", &self.locations_enabled)
            .finish_non_exhaustive()
    }
}

impl SimulatedSonar {
    pub fn new(config: SimulatorConfig, events: TransportEventSender) -> Self {
        Self {
            config,
            events,
            connection: None,
            stream: None,
            locations_enabled: false,
        }
    }

    fn services(&self) -> Vec<ServiceInfo> {
        let mut characteristics = vec![
            CharacteristicInfo::new(SAMPLE_CHARACTERISTIC_UUID, PROPERTY_NOTIFY),
            CharacteristicInfo::new(CONFIGURE_CHARACTERISTIC_UUID, PROPERTY_WRITE),
        ];
        if self.config.send_locations {
            characteristics.push(CharacteristicInfo::new(LOCATION_CHARACTERISTIC_UUID, PROPERTY_NOTIFY));
        }
        vec![ServiceInfo {
            uuid: SERVICE_UUID,
            characteristics,
        }]
    }

    fn start_stream(&mut self) {
        if self.stream.is_some() {
            return;
        }

        let events = self.events.clone();
        let config = self.config.clone();
        let send_locations = self.locations_enabled;
        let period = Duration::from_millis(config.sample_interval_ms);

        self.stream = Some(tokio::spawn(async move {
            let mut ticker = interval(period);
            let mut frame_count: u64 = 0;

            loop {
                ticker.tick().await;

                if config.stall_after_samples > 0 && frame_count >= config.stall_after_samples {
                    info!("Simulator going silent after {} frames", frame_count);
                    return;
                }

                if send_locations {
                    let fix = simulated_location(&config, frame_count);
                    if !events.send(TransportEvent::DataReceived {
                        characteristic: LOCATION_CHARACTERISTIC_UUID,
                        data: fix.to_fix_bytes().to_vec(),
                    }) {
                        return;
                    }
                }

                let frame = encode_sample_frame(&simulated_reading(frame_count));
                if !events.send(TransportEvent::DataReceived {
                    characteristic: SAMPLE_CHARACTERISTIC_UUID,
                    data: frame.to_vec(),
                }) {
                    return;
                }

                frame_count += 1;
            }
        }));
    }

    fn stop_tasks(&mut self) {
        if let Some(task) = self.connection.take() {
            task.abort();
        }
        if let Some(task) = self.stream.take() {
            task.abort();
        }
    }
}

impl Drop for SimulatedSonar {
    fn drop(&mut self) {
        self.stop_tasks();
    }
}

impl Transport for SimulatedSonar {
    fn connect(&mut self, device: &DeviceId, options: &ConnectOptions) -> Result<()> {
        info!(
            "Simulator connecting to {} (timeout {:?}, {} retries)",
            device, options.timeout, options.retry_count
        );
        self.stop_tasks();
        self.locations_enabled = false;

        let events = self.events.clone();
        let services = self.services();
        self.connection = Some(tokio::spawn(async move {
            events.send(TransportEvent::Connecting);
            sleep(LIFECYCLE_STEP).await;
            events.send(TransportEvent::Connected);
            sleep(LIFECYCLE_STEP).await;
            events.send(TransportEvent::ServicesDiscovered(services));
        }));
        Ok(())
    }

    fn disconnect(&mut self) -> Result<()> {
        self.stop_tasks();
        self.events.send(TransportEvent::Disconnecting);
        self.events
            .send(TransportEvent::Disconnected(DisconnectReason::TerminateLocalHost));
        Ok(())
    }

    fn write(&mut self, characteristic: u16, data: &[u8]) -> Result<()> {
        if characteristic != CONFIGURE_CHARACTERISTIC_UUID {
            return Err(SonarLinkError::Transport(format!(
                "characteristic 0x{:04X} is not writable",
                characteristic
            )));
        }

        if data.len() != CONFIGURE_FRAME_SIZE
            || data[0] != ID0
            || data[1] != ID1
            || data[CONFIGURE_CHECKSUM_INDEX] != sum8(&data[..CONFIGURE_CHECKSUM_INDEX])
        {
            warn!("Simulator ignoring invalid configure frame {:02X?}", data);
            return Ok(());
        }

        debug!(
            "Simulator configured: sensitivity {}, noise {}, range {}",
            data[6],
            data[7],
            RANGE_LABELS.get(data[8] as usize).copied().unwrap_or("?")
        );
        Ok(())
    }

    fn enable_notifications(&mut self, characteristic: u16) -> Result<()> {
        match characteristic {
            SAMPLE_CHARACTERISTIC_UUID => {
                self.start_stream();
                Ok(())
            }
            LOCATION_CHARACTERISTIC_UUID if self.config.send_locations => {
                self.locations_enabled = true;
                Ok(())
            }
            other => Err(SonarLinkError::Transport(format!(
                "characteristic 0x{:04X} does not notify",
                other
            ))),
        }
    }
}

/// Reading for frame `n`: a gently undulating bottom with an occasional fish
fn simulated_reading(n: u64) -> SonarReading {
    let phase = n as f32 * 0.05;
    SonarReading {
        time: 0,
        dry: false,
        depth: 6.0 + 2.5 * phase.sin(),
        strength: (160.0 + 60.0 * (phase * 0.7).cos()) as u8,
        fish_depth: 3.0 + phase.cos(),
        fish_strength: if n % 20 < 4 { 9 } else { 0 },
        battery: 6u64.saturating_sub(n / 2000) as u8,
        temperature: 12.0 + (phase * 0.1).sin(),
    }
}

fn simulated_location(config: &SimulatorConfig, n: u64) -> Location {
    let step = n as f64 * WALK_STEP_DEGREES;
    Location::new(config.start_latitude + step, config.start_longitude + step)
}
