// SPDX-License-Identifier: MIT
pub mod marker;
pub mod trace;

use std::sync::Arc;

use chrono::{DateTime, Local};
use thiserror::Error;

use self::marker::{SeriesConfig, WindowedSeries};
use self::trace::{TraceSeries, TraceSnapshot};
use crate::config::Settings;

#[derive(Debug, Error, PartialEq)]
pub enum SeriesError {
    #[error("series is empty")]
    Empty,
    #[error("x/y length mismatch: {xs} frequencies, {ys} amplitudes")]
    LengthMismatch { xs: usize, ys: usize },
    #[error("timestamp {timestamp} is older than the newest point {newest}")]
    OutOfOrder { timestamp: f64, newest: f64 },
}

/// Seconds since the epoch, millisecond resolution, as a chart X value.
#[must_use]
pub fn chart_seconds(timestamp: &DateTime<Local>) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let millis = timestamp.timestamp_millis() as f64;
    millis / 1000.0
}

/// Everything a display surface plots: the marker history and the
/// latest sweep.
#[derive(Clone, Debug)]
pub struct ChartState {
    marker: WindowedSeries,
    trace: TraceSeries,
}

impl ChartState {
    #[must_use]
    pub fn new(config: SeriesConfig) -> Self {
        Self {
            marker: WindowedSeries::new(config),
            trace: TraceSeries::new(),
        }
    }

    /// Series sized from the settings, with the marker axis starting on the
    /// configured frequency range.
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        let mut chart = Self::new(SeriesConfig::new(
            settings.retention_secs(),
            settings.display_secs(),
        ));
        chart.set_marker_limits(settings.start_hz, settings.stop_hz);
        chart
    }

    /// # Errors
    ///
    /// Returns [`SeriesError::OutOfOrder`] if the wall clock stepped back.
    pub fn add_marker_point(&mut self, timestamp: &DateTime<Local>, value: f64) -> Result<(), SeriesError> {
        self.marker.append(chart_seconds(timestamp), value)
    }

    /// # Errors
    ///
    /// Returns an error if the sweep is empty or the lengths differ.
    pub fn set_trace(&mut self, xs: Vec<f64>, ys: Vec<f64>) -> Result<(), SeriesError> {
        self.trace.replace(xs, ys)
    }

    pub fn set_marker_limits(&mut self, min: f64, max: f64) {
        self.marker.set_y_limits(min, max);
    }

    #[must_use]
    pub fn marker(&self) -> &WindowedSeries {
        &self.marker
    }

    #[must_use]
    pub fn trace(&self) -> Option<Arc<TraceSnapshot>> {
        self.trace.snapshot()
    }
}
