//! # Sample Logger
//!
//! Rotating file sink for logged samples.
//!
//! Files are named `samples-<UTC timestamp>-<sequence>.<ext>` inside the log
//! directory, so lexical order is creation order. A new file is started after
//! `max_records_per_file` records, and the oldest files are removed so that at
//! most `max_files_to_keep` remain.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::Utc;
use tracing::{debug, info, warn};

use super::SampleSink;
use crate::config::{invalid, TelemetryConfig};
use crate::error::{Result, SonarLinkError};
use crate::sample::Sample;

const FILE_PREFIX: &str = "samples-";

/// On-disk sample encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line, all fields
    Jsonl,
    /// Concatenated 21-byte records, persisted fields only
    Binary,
}

impl LogFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            LogFormat::Jsonl => "jsonl",
            LogFormat::Binary => "bin",
        }
    }
}

impl FromStr for LogFormat {
    type Err = SonarLinkError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "jsonl" => Ok(LogFormat::Jsonl),
            "binary" => Ok(LogFormat::Binary),
            other => Err(invalid(format!("unknown log format '{}'", other))),
        }
    }
}

/// Rotating sample log writer
pub struct SampleLogger {
    dir: PathBuf,
    format: LogFormat,
    max_records_per_file: usize,
    max_files_to_keep: usize,
    writer: Option<BufWriter<File>>,
    current_path: Option<PathBuf>,
    records_in_file: usize,
    sequence: u32,
}

impl std::fmt::Debug for SampleLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleLogger")
            .field("dir", &self.dir)
            .field("format", &self.format)
            .field("current_path", &self.current_path)
            .field("records_in_file", &self.records_in_file)
            .finish_non_exhaustive()
    }
}

impl SampleLogger {
    /// Create a logger writing into `config.log_dir`, creating it if needed
    ///
    /// No file is opened until the first sample arrives.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The format is not `jsonl` or `binary`
    /// - The rotation limits are zero
    /// - The directory cannot be created
    pub fn new(config: &TelemetryConfig) -> Result<Self> {
        let format = config.format.parse()?;
        if config.max_records_per_file == 0 || config.max_files_to_keep == 0 {
            return Err(invalid("rotation limits must be greater than 0"));
        }

        let dir = PathBuf::from(&config.log_dir);
        fs::create_dir_all(&dir)?;
        info!("Logging samples to {} ({:?})", dir.display(), format);

        Ok(Self {
            dir,
            format,
            max_records_per_file: config.max_records_per_file,
            max_files_to_keep: config.max_files_to_keep,
            writer: None,
            current_path: None,
            records_in_file: 0,
            sequence: 0,
        })
    }

    pub fn format(&self) -> LogFormat {
        self.format
    }

    /// File currently being written, if any
    pub fn current_path(&self) -> Option<&Path> {
        self.current_path.as_deref()
    }

    /// Sample log files in the directory, oldest first
    pub fn log_files(&self) -> Result<Vec<PathBuf>> {
        let mut files: Vec<PathBuf> = fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                let name_matches = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| n.starts_with(FILE_PREFIX))
                    .unwrap_or(false);
                let ext_matches = path
                    .extension()
                    .and_then(|e| e.to_str())
                    .map(|e| e == self.format.extension())
                    .unwrap_or(false);
                name_matches && ext_matches
            })
            .collect();
        files.sort();
        Ok(files)
    }

    pub fn flush(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.as_mut() {
            writer.flush()?;
        }
        Ok(())
    }

    fn rotate(&mut self) -> Result<()> {
        self.flush()?;
        self.writer = None;

        let name = format!(
            "{}{}-{:04}.{}",
            FILE_PREFIX,
            Utc::now().format("%Y%m%dT%H%M%S"),
            self.sequence,
            self.format.extension()
        );
        self.sequence = self.sequence.wrapping_add(1);

        let path = self.dir.join(name);
        let file = File::create(&path)?;
        debug!("Opened sample log {}", path.display());

        self.writer = Some(BufWriter::new(file));
        self.current_path = Some(path);
        self.records_in_file = 0;

        self.prune()
    }

    /// Remove the oldest files beyond the retention limit
    fn prune(&self) -> Result<()> {
        let files = self.log_files()?;
        let excess = files.len().saturating_sub(self.max_files_to_keep);

        for old in files.iter().take(excess) {
            match fs::remove_file(old) {
                Ok(()) => debug!("Removed old sample log {}", old.display()),
                Err(e) => warn!("Failed to remove {}: {}", old.display(), e),
            }
        }
        Ok(())
    }
}

impl SampleSink for SampleLogger {
    /// Buffered; call [`SampleLogger::flush`] or drop the logger to reach the disk
    fn log_sample(&mut self, sample: &Sample) -> Result<()> {
        if self.writer.is_none() || self.records_in_file >= self.max_records_per_file {
            self.rotate()?;
        }

        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "sample log not open"))?;

        match self.format {
            LogFormat::Jsonl => {
                serde_json::to_writer(&mut *writer, sample)?;
                writer.write_all(b"\n")?;
            }
            LogFormat::Binary => writer.write_all(&sample.to_record())?,
        }

        self.records_in_file += 1;
        Ok(())
    }
}

impl Drop for SampleLogger {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            warn!("Failed to flush sample log: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::Location;
    use crate::protocol::SonarReading;
    use crate::sample::SAMPLE_RECORD_SIZE;
    use tempfile::TempDir;

    fn config(dir: &TempDir, format: &str, per_file: usize, keep: usize) -> TelemetryConfig {
        TelemetryConfig {
            enabled: true,
            log_dir: dir.path().join("logs").to_string_lossy().into_owned(),
            max_records_per_file: per_file,
            max_files_to_keep: keep,
            format: format.to_string(),
        }
    }

    fn sample(time: i64, depth: f32) -> Sample {
        let reading = SonarReading {
            time,
            dry: false,
            depth,
            strength: 77,
            fish_depth: 1.0,
            fish_strength: 2,
            battery: 5,
            temperature: 9.5,
        };
        Sample::new(&reading, Location::new(53.4, -3.0))
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("jsonl".parse::<LogFormat>().unwrap(), LogFormat::Jsonl);
        assert_eq!("binary".parse::<LogFormat>().unwrap(), LogFormat::Binary);
        tokio_test::assert_err!("csv".parse::<LogFormat>());
    }

    #[test]
    fn test_creates_directory_lazily_opens_file() {
        let dir = TempDir::new().unwrap();
        let logger = SampleLogger::new(&config(&dir, "jsonl", 10, 3)).unwrap();
        assert!(dir.path().join("logs").is_dir());
        assert!(logger.current_path().is_none());
        assert!(logger.log_files().unwrap().is_empty());
    }

    #[test]
    fn test_jsonl_lines_parse_back() {
        let dir = TempDir::new().unwrap();
        let mut logger = SampleLogger::new(&config(&dir, "jsonl", 10, 3)).unwrap();
        logger.log_sample(&sample(1, 2.0)).unwrap();
        logger.log_sample(&sample(2, 3.5)).unwrap();
        logger.flush().unwrap();

        let contents = fs::read_to_string(logger.current_path().unwrap()).unwrap();
        let parsed: Vec<Sample> = contents
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(parsed, vec![sample(1, 2.0), sample(2, 3.5)]);
    }

    #[test]
    fn test_binary_records() {
        let dir = TempDir::new().unwrap();
        let mut logger = SampleLogger::new(&config(&dir, "binary", 10, 3)).unwrap();
        logger.log_sample(&sample(1, 2.0)).unwrap();
        logger.log_sample(&sample(2, 3.5)).unwrap();
        logger.flush().unwrap();

        let path = logger.current_path().unwrap().to_path_buf();
        assert_eq!(path.extension().unwrap(), "bin");
        let bytes = fs::read(&path).unwrap();
        assert_eq!(bytes.len(), 2 * SAMPLE_RECORD_SIZE);

        let second = Sample::from_record(&bytes[SAMPLE_RECORD_SIZE..]).unwrap();
        assert_eq!(second.time(), 2);
        assert_eq!(second.depth(), 3.5);
        assert_eq!(second.strength(), 77);
    }

    #[test]
    fn test_rotation_and_retention() {
        let dir = TempDir::new().unwrap();
        let mut logger = SampleLogger::new(&config(&dir, "jsonl", 2, 3)).unwrap();

        for i in 0..9 {
            logger.log_sample(&sample(i, 1.0)).unwrap();
        }
        logger.flush().unwrap();

        // 9 records at 2 per file is 5 files, of which the newest 3 remain
        let files = logger.log_files().unwrap();
        assert_eq!(files.len(), 3);
        assert_eq!(files.last().map(|p| p.as_path()), logger.current_path());

        let newest = fs::read_to_string(&files[2]).unwrap();
        assert_eq!(newest.lines().count(), 1);
        let oldest = fs::read_to_string(&files[0]).unwrap();
        let first: Sample = serde_json::from_str(oldest.lines().next().unwrap()).unwrap();
        assert_eq!(first.time(), 4);
    }

    #[test]
    fn test_unrelated_files_are_kept() {
        let dir = TempDir::new().unwrap();
        let mut logger = SampleLogger::new(&config(&dir, "jsonl", 1, 1)).unwrap();
        let notes = dir.path().join("logs").join("notes.txt");
        fs::write(&notes, "keep me").unwrap();

        for i in 0..3 {
            logger.log_sample(&sample(i, 1.0)).unwrap();
        }
        assert!(notes.exists());
        assert_eq!(logger.log_files().unwrap().len(), 1);
    }

    #[test]
    fn test_records_are_buffered_until_flush() {
        let dir = TempDir::new().unwrap();
        let mut logger = SampleLogger::new(&config(&dir, "binary", 10, 3)).unwrap();
        logger.log_sample(&sample(1, 2.0)).unwrap();

        let path = logger.current_path().unwrap().to_path_buf();
        assert!(fs::read(&path).unwrap().is_empty());

        drop(logger);
        assert_eq!(fs::read(&path).unwrap().len(), SAMPLE_RECORD_SIZE);
    }

    #[test]
    fn test_zero_limits_rejected() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            SampleLogger::new(&config(&dir, "jsonl", 0, 3)),
            Err(SonarLinkError::Config(_))
        ));
    }
}
