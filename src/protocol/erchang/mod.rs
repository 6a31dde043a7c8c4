//! # Erchang Fishfinder Protocol
//!
//! Implementation of the reverse-engineered protocol used by Erchang wireless
//! sonar transducers.
//!
//! This module handles:
//! - Configure command encoding (12 bytes)
//! - Telemetry frame decoding (18 bytes)
//! - Additive mod-256 checksums
//! - Lenient handling of undocumented reserved bytes

pub mod constants;
pub mod encoder;
pub mod decoder;
pub mod checksum;

use super::{ServiceLayout, SonarProtocol, SonarReading};
use crate::config::LinkConfig;
use crate::error::Result;
use constants::*;

/// Erchang protocol handler
#[derive(Debug, Clone, Copy, Default)]
pub struct Erchang;

impl SonarProtocol for Erchang {
    fn name(&self) -> &'static str {
        "erchang"
    }

    fn layout(&self) -> ServiceLayout {
        ServiceLayout {
            service: SERVICE_UUID,
            sample: SAMPLE_CHARACTERISTIC_UUID,
            configure: CONFIGURE_CHARACTERISTIC_UUID,
            location: Some(LOCATION_CHARACTERISTIC_UUID),
        }
    }

    fn encode_configure(&self, config: &LinkConfig) -> Vec<u8> {
        encoder::encode_configure_frame(config.sensitivity, config.noise, config.range).to_vec()
    }

    fn decode_sample(&self, frame: &[u8], received_at_ms: i64) -> Result<SonarReading> {
        decoder::decode_sample_frame(frame, received_at_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let layout = Erchang.layout();
        assert_eq!(layout.service, 0xFFF0);
        assert_eq!(layout.sample, 0xFFF1);
        assert_eq!(layout.configure, 0xFFF2);
        assert_eq!(layout.location, Some(0xFFF3));
    }

    #[test]
    fn test_encode_configure_uses_device_settings() {
        let config = LinkConfig {
            sensitivity: 5,
            noise: 2,
            range: 3,
            ..LinkConfig::default()
        };
        let frame = Erchang.encode_configure(&config);
        assert_eq!(frame.len(), CONFIGURE_FRAME_SIZE);
        assert_eq!(&frame[6..9], &[5, 2, 3]);
    }
}
