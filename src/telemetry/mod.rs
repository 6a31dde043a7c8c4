//! # Telemetry Module
//!
//! Persists the samples the link decides are worth keeping.
//!
//! This module handles:
//! - The [`SampleSink`] seam between the link and storage
//! - Writing samples as JSON lines or fixed 21-byte records
//! - Rotating files after N records and retaining only the last M files
//! - Keeping file I/O off the link's event loop

pub mod logger;
pub mod writer;

pub use logger::{LogFormat, SampleLogger};
pub use writer::{FlushSink, SampleWriter};

use crate::error::Result;
use crate::sample::Sample;

/// Destination for logged samples
pub trait SampleSink: Send {
    /// Persist one accepted sample
    fn log_sample(&mut self, sample: &Sample) -> Result<()>;
}

/// In-memory sink
impl SampleSink for Vec<Sample> {
    fn log_sample(&mut self, sample: &Sample) -> Result<()> {
        self.push(*sample);
        Ok(())
    }
}

/// `None` discards samples, for running with telemetry disabled
impl<S: SampleSink> SampleSink for Option<S> {
    fn log_sample(&mut self, sample: &Sample) -> Result<()> {
        match self {
            Some(sink) => sink.log_sample(sample),
            None => Ok(()),
        }
    }
}
