//! # Location Module
//!
//! External position fixes and where the link takes them from.

use bytes::Buf;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SonarLinkError};

/// Mean Earth radius used for great-circle distances
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Size of a bench location fix: two big-endian f64
pub const LOCATION_FIX_SIZE: usize = 16;

/// A position fix in degrees
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Great-circle (haversine) distance to `other` in metres
    pub fn distance_to(&self, other: &Location) -> f64 {
        let dlat = (other.latitude - self.latitude).to_radians();
        let dlon = (other.longitude - self.longitude).to_radians();
        let a = (dlat / 2.0).sin().powi(2)
            + self.latitude.to_radians().cos()
                * other.latitude.to_radians().cos()
                * (dlon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
        EARTH_RADIUS_M * c
    }

    /// Parse a bench location fix (latitude then longitude, big-endian f64)
    ///
    /// Trailing bytes are ignored.
    ///
    /// # Errors
    ///
    /// Returns `MalformedFrame` if fewer than 16 bytes are supplied
    pub fn from_fix_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < LOCATION_FIX_SIZE {
            return Err(SonarLinkError::MalformedFrame(format!(
                "location fix needs {} bytes, got {}",
                LOCATION_FIX_SIZE,
                data.len()
            )));
        }

        let mut buf = data;
        let latitude = buf.get_f64();
        let longitude = buf.get_f64();
        Ok(Self { latitude, longitude })
    }

    /// Encode as a bench location fix
    pub fn to_fix_bytes(&self) -> [u8; LOCATION_FIX_SIZE] {
        let mut out = [0u8; LOCATION_FIX_SIZE];
        out[..8].copy_from_slice(&self.latitude.to_be_bytes());
        out[8..].copy_from_slice(&self.longitude.to_be_bytes());
        out
    }
}

/// Where the current location comes from
///
/// Starts as `Live` with a zero fix. The first fix from a bench simulator moves
/// it to `TestLatched` for the rest of the session; there is no way back.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LocationSource {
    /// Fixes supplied by the application (real GPS)
    Live(Location),

    /// Fixes supplied by the device's test characteristic
    TestLatched(Location),
}

impl Default for LocationSource {
    fn default() -> Self {
        LocationSource::Live(Location::default())
    }
}

impl LocationSource {
    /// Most recent fix from whichever source is active
    pub fn current(&self) -> Location {
        match self {
            LocationSource::Live(location) | LocationSource::TestLatched(location) => *location,
        }
    }

    pub fn is_latched(&self) -> bool {
        matches!(self, LocationSource::TestLatched(_))
    }

    /// Apply a fix from the application. Returns false if ignored.
    pub fn update_live(&mut self, location: Location) -> bool {
        match self {
            LocationSource::Live(current) => {
                *current = location;
                true
            }
            LocationSource::TestLatched(_) => false,
        }
    }

    /// Apply a bench fix, latching out application fixes
    pub fn update_test(&mut self, location: Location) {
        *self = LocationSource::TestLatched(location);
    }
}
