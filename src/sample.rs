//! # Sample Record
//!
//! A decoded sonar measurement stamped with the location it was taken at.
//!
//! Only the first five fields (`time`, `latitude`, `longitude`, `depth`,
//! `strength`) are persisted, as a fixed 21-byte big-endian record. The rest are
//! session-only.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SonarLinkError};
use crate::location::Location;
use crate::protocol::SonarReading;

/// Depth reported when the transducer has no water contact
pub const DRY_SENTINEL: f32 = -0.01;

/// Size of a persisted sample record: time + lat + lon + depth + strength
pub const SAMPLE_RECORD_SIZE: usize = 8 + 8 + 8 + 4 + 1;

/// Maximum fish strength (4-bit field)
pub const FISH_STRENGTH_MAX: u8 = 0x0F;

/// Maximum battery level representable (4-bit field)
pub const BATTERY_MAX: u8 = 0x0F;

/// Immutable sample record
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    time: i64,
    latitude: f64,
    longitude: f64,
    depth: f32,
    strength: u8,
    temperature: f32,
    fish_depth: f32,
    fish_strength: u8,
    battery: u8,
}

impl Sample {
    /// Attach a location to a device reading
    pub fn new(reading: &SonarReading, location: Location) -> Self {
        Self {
            time: reading.time,
            latitude: location.latitude,
            longitude: location.longitude,
            depth: reading.depth,
            strength: reading.strength,
            temperature: reading.temperature,
            fish_depth: reading.fish_depth,
            fish_strength: reading.fish_strength.min(FISH_STRENGTH_MAX),
            battery: reading.battery.min(BATTERY_MAX),
        }
    }

    /// Parse a persisted 21-byte record
    ///
    /// Session-only fields are zero in the result.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRecord` if `record` is not exactly 21 bytes
    pub fn from_record(record: &[u8]) -> Result<Self> {
        if record.len() != SAMPLE_RECORD_SIZE {
            return Err(SonarLinkError::InvalidRecord(format!(
                "expected {} bytes, got {}",
                SAMPLE_RECORD_SIZE,
                record.len()
            )));
        }

        let mut buf = record;
        Ok(Self {
            time: buf.get_i64(),
            latitude: buf.get_f64(),
            longitude: buf.get_f64(),
            depth: buf.get_f32(),
            strength: buf.get_u8(),
            temperature: 0.0,
            fish_depth: 0.0,
            fish_strength: 0,
            battery: 0,
        })
    }

    /// Serialize the persisted subset as a 21-byte big-endian record
    pub fn to_record(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(SAMPLE_RECORD_SIZE);
        buf.put_i64(self.time);
        buf.put_f64(self.latitude);
        buf.put_f64(self.longitude);
        buf.put_f32(self.depth);
        buf.put_u8(self.strength);
        buf.freeze()
    }

    /// Milliseconds since the epoch
    pub fn time(&self) -> i64 {
        self.time
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    /// Location the sample was taken at
    pub fn location(&self) -> Location {
        Location::new(self.latitude, self.longitude)
    }

    /// Bottom depth in metres, or [`DRY_SENTINEL`]
    pub fn depth(&self) -> f32 {
        self.depth
    }

    /// Bottom return strength (0-255)
    pub fn strength(&self) -> u8 {
        self.strength
    }

    /// Water temperature in degrees Celsius
    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    /// Fish arch depth in metres
    pub fn fish_depth(&self) -> f32 {
        self.fish_depth
    }

    /// Fish arch strength (0-15)
    pub fn fish_strength(&self) -> u8 {
        self.fish_strength
    }

    /// Battery level (devices report 0-6)
    pub fn battery(&self) -> u8 {
        self.battery
    }

    /// True if the transducer reported no water contact
    pub fn is_dry(&self) -> bool {
        self.depth == DRY_SENTINEL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading() -> SonarReading {
        SonarReading {
            time: 1_600_000_000_000,
            dry: false,
            depth: 4.25,
            strength: 201,
            fish_depth: 2.0,
            fish_strength: 9,
            battery: 4,
            temperature: 12.5,
        }
    }

    #[test]
    fn test_new_copies_reading_and_location() {
        let sample = Sample::new(&reading(), Location::new(51.5, -0.12));
        assert_eq!(sample.time(), 1_600_000_000_000);
        assert_eq!(sample.latitude(), 51.5);
        assert_eq!(sample.longitude(), -0.12);
        assert_eq!(sample.depth(), 4.25);
        assert_eq!(sample.strength(), 201);
        assert_eq!(sample.fish_strength(), 9);
        assert_eq!(sample.battery(), 4);
        assert!(!sample.is_dry());
    }

    #[test]
    fn test_new_clamps_nibble_fields() {
        let sample = Sample::new(
            &SonarReading {
                fish_strength: 0x3F,
                battery: 0xF2,
                ..reading()
            },
            Location::default(),
        );
        assert_eq!(sample.fish_strength(), FISH_STRENGTH_MAX);
        assert_eq!(sample.battery(), BATTERY_MAX);
    }

    #[test]
    fn test_record_layout_is_big_endian() {
        let sample = Sample::new(&reading(), Location::new(1.0, 2.0));
        let record = sample.to_record();

        assert_eq!(record.len(), SAMPLE_RECORD_SIZE);
        assert_eq!(&record[0..8], &1_600_000_000_000i64.to_be_bytes());
        assert_eq!(&record[8..16], &1.0f64.to_be_bytes());
        assert_eq!(&record[16..24], &2.0f64.to_be_bytes());
        assert_eq!(&record[24..28], &4.25f32.to_be_bytes());
        assert_eq!(record[28], 201);
    }

    #[test]
    fn test_from_record_keeps_persisted_fields_only() {
        let sample = Sample::new(&reading(), Location::new(-33.9, 151.2));
        let restored = Sample::from_record(&sample.to_record()).unwrap();

        assert_eq!(restored.time(), sample.time());
        assert_eq!(restored.location(), sample.location());
        assert_eq!(restored.depth(), sample.depth());
        assert_eq!(restored.strength(), sample.strength());
        assert_eq!(restored.temperature(), 0.0);
        assert_eq!(restored.battery(), 0);
    }

    #[test]
    fn test_from_record_wrong_length() {
        let result = Sample::from_record(&[0u8; 20]);
        assert!(matches!(result, Err(SonarLinkError::InvalidRecord(_))));
    }

    #[test]
    fn test_dry_sample() {
        let sample = Sample::new(
            &SonarReading {
                dry: true,
                depth: DRY_SENTINEL,
                ..reading()
            },
            Location::default(),
        );
        assert!(sample.is_dry());
    }
}
