//! # Sonar Protocol Module
//!
//! Device protocols spoken over the wireless link.
//!
//! Each protocol describes:
//! - The GATT service and characteristics the device exposes
//! - How link configuration is encoded into a command frame
//! - How telemetry frames are validated and decoded into readings
//!
//! Only the Erchang fishfinder protocol exists today. Another device family would
//! be added as a sibling of [`erchang`] implementing [`SonarProtocol`].

pub mod erchang;

use crate::config::LinkConfig;
use crate::error::Result;

/// GATT identifiers (16-bit short form) a protocol needs from the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceLayout {
    /// Primary service
    pub service: u16,

    /// Characteristic notifying telemetry frames
    pub sample: u16,

    /// Characteristic accepting configure frames
    pub configure: u16,

    /// Optional characteristic notifying bench location fixes
    pub location: Option<u16>,
}

/// Device-originated measurement, before a location is attached
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SonarReading {
    /// Receipt time in milliseconds since the epoch
    pub time: i64,

    /// Transducer reports no water contact
    pub dry: bool,

    /// Bottom depth in metres (dry sentinel when `dry`)
    pub depth: f32,

    /// Bottom return strength (0-255)
    pub strength: u8,

    /// Fish arch depth in metres
    pub fish_depth: f32,

    /// Fish arch strength (0-15)
    pub fish_strength: u8,

    /// Battery level (0-15, devices report 0-6)
    pub battery: u8,

    /// Water temperature in degrees Celsius
    pub temperature: f32,
}

/// A wire protocol for one family of sonar devices
pub trait SonarProtocol: Send {
    /// Short protocol name for diagnostics
    fn name(&self) -> &'static str;

    /// Service and characteristics the device must expose
    fn layout(&self) -> ServiceLayout;

    /// Encode the device-bound part of a link configuration
    fn encode_configure(&self, config: &LinkConfig) -> Vec<u8>;

    /// Validate and decode a telemetry frame received at `received_at_ms`
    ///
    /// # Errors
    ///
    /// Returns `MalformedFrame` or `ChecksumMismatch` for structurally invalid frames
    fn decode_sample(&self, frame: &[u8], received_at_ms: i64) -> Result<SonarReading>;
}
