//! # Sonar Link
//!
//! Connect to a wireless fishfinder sonar and log significant depth samples.
//!
//! This binary wires the bench simulator transport, the sonar link and the
//! rotating sample log together, and reports link state on the console.

use anyhow::Result;
use tracing::{info, warn, Level};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use sonar_link::config::{Config, TelemetryConfig};
use sonar_link::link::{LinkHandle, LinkNotification, SonarLink};
use sonar_link::protocol::erchang::Erchang;
use sonar_link::telemetry::{SampleLogger, SampleWriter};
use sonar_link::transport::simulator::SimulatedSonar;
use sonar_link::transport::DeviceId;

/// File name prefix for the daily diagnostic log
const DIAGNOSTIC_LOG_PREFIX: &str = "sonar-link.log";

/// Main entry point for the Sonar Link application
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Load configuration from the path given as the first argument, or defaults
///    - Set up console logging, plus a daily diagnostic log when telemetry is enabled
///    - Create the link, the simulator transport and the sample logger
///
/// 2. **Main Loop**
///    - Connect to the configured device
///    - Report state changes and the latest logged depth
///    - Handle Ctrl+C for graceful shutdown
///
/// 3. **Graceful Shutdown**
///    - Disconnect from the device
///    - Wait for the link task to stop and flush the sample log
///
/// # Errors
///
/// Returns error if:
/// - The configuration file cannot be read or is invalid
/// - The sample log directory cannot be created
/// - The link rejects the initial connection request
///
/// # Examples
///
/// ```bash
/// RUST_LOG=sonar_link=debug cargo run --release -- sonar.toml
/// ```
#[tokio::main]
async fn main() -> Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => Config::load(&path)?,
        None => {
            let config = Config::default();
            config.validate()?;
            config
        }
    };

    let _log_guard = init_logging(&config.telemetry);

    info!("Sonar Link v{} starting...", env!("CARGO_PKG_VERSION"));

    let (handle, events) = LinkHandle::channel();
    let transport = SimulatedSonar::new(config.simulator.clone(), handle.transport_events());
    let (sink, writer_task) = if config.telemetry.enabled {
        let (writer, task) = SampleWriter::spawn(SampleLogger::new(&config.telemetry)?);
        (Some(writer), Some(task))
    } else {
        info!("Sample logging disabled");
        (None, None)
    };

    let (link, mut notifications) = SonarLink::new(
        Box::new(Erchang),
        transport,
        sink,
        config.sonar.clone(),
        (&config.transport).into(),
        &handle,
    );
    let link_task = tokio::spawn(link.run(events));

    handle
        .connect(DeviceId(config.transport.device.clone()))
        .await?;
    info!("Press Ctrl+C to exit");

    loop {
        tokio::select! {
            notification = notifications.recv() => match notification {
                Some(notification) => info!("{}", describe(&notification)),
                None => {
                    warn!("Sonar link stopped unexpectedly");
                    break;
                }
            },

            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                let _ = handle.shutdown();
                break;
            }
        }
    }

    link_task.await?;
    if let Some(task) = writer_task {
        // The link owned the last writer handle, so this returns after the final flush
        task.await?;
    }
    Ok(())
}

/// Install the console subscriber, and a file layer when telemetry is enabled
///
/// The returned guard must be held until exit so buffered lines are written.
fn init_logging(telemetry: &TelemetryConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::from_default_env().add_directive(Level::INFO.into());
    let console = fmt::layer();

    if !telemetry.enabled {
        tracing_subscriber::registry().with(filter).with(console).init();
        return None;
    }

    let appender = tracing_appender::rolling::daily(&telemetry.log_dir, DIAGNOSTIC_LOG_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(fmt::layer().with_ansi(false).with_writer(writer))
        .init();
    Some(guard)
}

/// One console line for a link notification
fn describe(notification: &LinkNotification) -> String {
    match notification {
        LinkNotification::StateChanged {
            state,
            device,
            reason,
        } => {
            let mut line = format!("Link {}", state);
            if let Some(device) = device {
                line.push_str(&format!(" [{}]", device));
            }
            if let Some(reason) = reason {
                line.push_str(&format!(" ({})", reason));
            }
            line
        }
        LinkNotification::Status(text) => text.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sonar_link::link::ConnectionState;
    use sonar_link::transport::DisconnectReason;

    #[test]
    fn test_describe_state_change() {
        let line = describe(&LinkNotification::StateChanged {
            state: ConnectionState::Disconnected,
            device: Some(DeviceId::from("bench")),
            reason: Some(DisconnectReason::Timeout),
        });
        assert_eq!(line, "Link Disconnected [bench] (timeout)");
    }

    #[test]
    fn test_describe_without_details() {
        let line = describe(&LinkNotification::StateChanged {
            state: ConnectionState::Connecting,
            device: None,
            reason: None,
        });
        assert_eq!(line, "Link Connecting");
    }

    #[test]
    fn test_describe_status() {
        let status = LinkNotification::Status("Depth unknown".to_string());
        assert_eq!(describe(&status), "Depth unknown");
    }
}
