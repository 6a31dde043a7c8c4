//! # Background Sample Writer
//!
//! Moves sample persistence off the link's event loop. The link holds a
//! [`SampleWriter`], whose `log_sample` only queues the sample; a blocking task
//! owns the real sink and writes queued samples, flushing whenever the queue
//! runs dry.

use std::io;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use super::SampleSink;
use crate::error::{Result, SonarLinkError};
use crate::sample::Sample;

/// Sink that can persist what it has buffered
pub trait FlushSink: SampleSink {
    fn flush_samples(&mut self) -> Result<()>;
}

impl FlushSink for super::SampleLogger {
    fn flush_samples(&mut self) -> Result<()> {
        self.flush()
    }
}

impl FlushSink for Vec<Sample> {
    fn flush_samples(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Queueing front of a sink running on a blocking task
#[derive(Debug, Clone)]
pub struct SampleWriter {
    samples: UnboundedSender<Sample>,
}

impl SampleWriter {
    /// Start the writer task for `sink`
    ///
    /// The task ends once every `SampleWriter` clone is dropped, after a final
    /// flush, and hands the sink back. Must be called inside a tokio runtime.
    pub fn spawn<S>(sink: S) -> (Self, JoinHandle<S>)
    where
        S: FlushSink + 'static,
    {
        let (samples, rx) = mpsc::unbounded_channel();
        let task = tokio::task::spawn_blocking(move || write_loop(sink, rx));
        (Self { samples }, task)
    }
}

impl SampleSink for SampleWriter {
    fn log_sample(&mut self, sample: &Sample) -> Result<()> {
        self.samples.send(*sample).map_err(|_| {
            SonarLinkError::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "sample writer has stopped",
            ))
        })
    }
}

fn write_loop<S: FlushSink>(mut sink: S, mut samples: UnboundedReceiver<Sample>) -> S {
    debug!("Sample writer started");

    while let Some(sample) = samples.blocking_recv() {
        write_one(&mut sink, &sample);

        // Drain whatever queued up meanwhile, then flush once
        while let Ok(sample) = samples.try_recv() {
            write_one(&mut sink, &sample);
        }

        if let Err(e) = sink.flush_samples() {
            warn!("Failed to flush samples: {}", e);
        }
    }

    debug!("Sample writer stopped");
    sink
}

fn write_one<S: SampleSink>(sink: &mut S, sample: &Sample) {
    if let Err(e) = sink.log_sample(sample) {
        error!("Failed to log sample: {}", e);
    }
}
