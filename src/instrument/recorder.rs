// SPDX-License-Identifier: MIT
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};

pub const MARKER_FILE: &str = "markers.csv";
pub const TRACE_DIR: &str = "traces";
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";
/// Same as [`TIMESTAMP_FORMAT`] without colons, so it is a valid file name everywhere.
const SNAPSHOT_NAME_FORMAT: &str = "%Y-%m-%d %H%M%S%.6f";

/// Writes recorded data under the data folder: an append-only marker log
/// and periodic full-trace snapshots.
pub struct Recorder {
    folder: PathBuf,
    snapshot_interval: Duration,
    markers: Option<BufWriter<File>>,
    last_snapshot: Option<DateTime<Local>>,
}

impl Recorder {
    #[must_use]
    pub fn new(folder: &Path, snapshot_interval: Duration) -> Self {
        Self {
            folder: folder.to_path_buf(),
            snapshot_interval,
            markers: None,
            last_snapshot: None,
        }
    }

    /// Opens the marker log (first time only) and restarts the snapshot clock.
    ///
    /// # Errors
    ///
    /// Returns an error if the data folder or marker log cannot be created.
    pub fn start(&mut self, now: DateTime<Local>) -> Result<()> {
        if self.markers.is_none() {
            let traces = self.folder.join(TRACE_DIR);
            fs::create_dir_all(&traces)
                .with_context(|| format!("failed to create {}", traces.display()))?;
            let path = self.folder.join(MARKER_FILE);
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("failed to open marker log: {}", path.display()))?;
            self.markers = Some(BufWriter::new(file));
        }
        self.last_snapshot = Some(now);
        Ok(())
    }

    /// Appends one `timestamp,value` line to the marker log.
    ///
    /// # Errors
    ///
    /// Returns an error if recording was never started or the write fails.
    pub fn record_marker(&mut self, now: DateTime<Local>, value: f64) -> Result<()> {
        let markers = self
            .markers
            .as_mut()
            .context("marker log is not open, recording was never started")?;
        writeln!(markers, "{},{value}", now.format(TIMESTAMP_FORMAT))
            .and_then(|()| markers.flush())
            .context("failed to write marker sample")
    }

    /// Writes the trace to a new timestamp-named file if more than the
    /// snapshot interval has passed since the last one. Returns the path
    /// written, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot file cannot be written.
    pub fn maybe_snapshot(
        &mut self,
        now: DateTime<Local>,
        xs: &[f64],
        ys: &[f64],
    ) -> Result<Option<PathBuf>> {
        let due = match self.last_snapshot {
            Some(last) => now
                .signed_duration_since(last)
                .to_std()
                .is_ok_and(|elapsed| elapsed > self.snapshot_interval),
            None => false,
        };
        if !due {
            return Ok(None);
        }
        self.last_snapshot = Some(now);

        let path = self
            .folder
            .join(TRACE_DIR)
            .join(format!("{}.csv", now.format(SNAPSHOT_NAME_FORMAT)));
        let file = File::create(&path)
            .with_context(|| format!("failed to create trace snapshot: {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        for (x, y) in xs.iter().zip(ys) {
            writeln!(writer, "{x},{y}").context("failed to write trace snapshot")?;
        }
        writer.flush().context("failed to flush trace snapshot")?;
        Ok(Some(path))
    }

    /// Flushes the marker log. The file stays open for the next recording.
    ///
    /// # Errors
    ///
    /// Returns an error if flushing fails.
    pub fn stop(&mut self) -> Result<()> {
        self.last_snapshot = None;
        if let Some(markers) = self.markers.as_mut() {
            markers.flush().context("failed to flush marker log")?;
        }
        Ok(())
    }

    /// Flushes and closes the marker log.
    ///
    /// # Errors
    ///
    /// Returns an error if flushing fails.
    pub fn finish(&mut self) -> Result<()> {
        self.stop()?;
        self.markers = None;
        Ok(())
    }
}
