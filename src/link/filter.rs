//! # Sample Filter
//!
//! Decimates the device's sample stream down to the samples worth logging.
//!
//! A sample is logged when any of these hold:
//! - It is the first since the link became ready or logging was re-enabled
//! - Battery level changed
//! - Temperature moved by at least 1 °C
//! - Depth moved by at least `min_delta_depth`
//! - Position moved by more than `min_delta_pos`
//!
//! Comparisons are always against the last *logged* sample, so slow drift
//! eventually crosses a threshold.
//!
//! The dry sentinel takes part in the depth comparison as a plain number, so
//! going in or out of the water normally counts as a depth change.

use tracing::debug;

use crate::config::LinkConfig;
use crate::location::Location;
use crate::sample::Sample;

/// Minimum temperature change, in °C, that makes a sample significant
pub const MIN_DELTA_TEMPERATURE: f32 = 1.0;

/// Stateful significance filter
#[derive(Debug, Clone)]
pub struct SampleFilter {
    min_delta_depth: f32,
    min_delta_pos: f64,
    must_log_next: bool,
    last_logged: Option<Sample>,
    last_logged_location: Location,
}

impl SampleFilter {
    pub fn new(min_delta_depth: f32, min_delta_pos: f64) -> Self {
        Self {
            min_delta_depth,
            min_delta_pos,
            must_log_next: true,
            last_logged: None,
            last_logged_location: Location::default(),
        }
    }

    pub fn from_config(config: &LinkConfig) -> Self {
        Self::new(config.min_delta_depth, config.min_delta_pos)
    }

    /// Update thresholds without forgetting history
    pub fn set_thresholds(&mut self, config: &LinkConfig) {
        self.min_delta_depth = config.min_delta_depth;
        self.min_delta_pos = config.min_delta_pos;
    }

    /// Log the next sample unconditionally
    pub fn force_next(&mut self) {
        self.must_log_next = true;
    }

    pub fn last_logged(&self) -> Option<&Sample> {
        self.last_logged.as_ref()
    }

    pub fn last_logged_location(&self) -> Location {
        self.last_logged_location
    }

    /// Decide whether `sample`, taken at `location`, should be logged
    ///
    /// On acceptance the sample and location become the new reference point.
    pub fn accept(&mut self, sample: &Sample, location: Location) -> bool {
        let significant = match (&self.last_logged, self.must_log_next) {
            (_, true) | (None, _) => true,
            (Some(last), false) => {
                sample.battery() != last.battery()
                    || (sample.temperature() - last.temperature()).abs() >= MIN_DELTA_TEMPERATURE
                    || (sample.depth() - last.depth()).abs() >= self.min_delta_depth
                    || self.last_logged_location.distance_to(&location) > self.min_delta_pos
            }
        };

        if !significant {
            return false;
        }

        debug!(
            "Logging sample: depth {:.2}m, battery {}, {:.1}°C",
            sample.depth(),
            sample.battery(),
            sample.temperature()
        );
        self.must_log_next = false;
        self.last_logged = Some(*sample);
        self.last_logged_location = location;
        true
    }
}
