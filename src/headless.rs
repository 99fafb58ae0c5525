// SPDX-License-Identifier: MIT
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::Result;
use chrono::{DateTime, Local};

use crate::config::Settings;
use crate::dispatch::surface::DisplaySurface;
use crate::series::ChartState;

pub type SharedChart = Arc<Mutex<ChartState>>;

/// Display surface without a screen: keeps the series up to date for the
/// status line and sends operator messages to the logger.
pub struct HeadlessDisplay {
    chart: SharedChart,
}

impl HeadlessDisplay {
    #[must_use]
    pub fn new(settings: &Settings) -> Self {
        Self {
            chart: Arc::new(Mutex::new(ChartState::from_settings(settings))),
        }
    }

    /// Handle for reading the series from another thread.
    #[must_use]
    pub fn chart(&self) -> SharedChart {
        Arc::clone(&self.chart)
    }

    fn lock(&self) -> MutexGuard<'_, ChartState> {
        self.chart.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DisplaySurface for HeadlessDisplay {
    fn log(&mut self, text: &str) -> Result<()> {
        log::info!("{text}");
        Ok(())
    }

    fn set_instrument_list(&mut self, instruments: Vec<String>) -> Result<()> {
        log::info!("available instruments: {}", instruments.join(", "));
        Ok(())
    }

    fn set_trace(&mut self, xs: Vec<f64>, ys: Vec<f64>) -> Result<()> {
        self.lock().set_trace(xs, ys)?;
        Ok(())
    }

    fn add_marker_point(&mut self, timestamp: DateTime<Local>, value: f64) -> Result<()> {
        self.lock().add_marker_point(&timestamp, value)?;
        Ok(())
    }

    fn set_marker_limits(&mut self, min: f64, max: f64) -> Result<()> {
        self.lock().set_marker_limits(min, max);
        Ok(())
    }

    fn refresh(&mut self) -> Result<()> {
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        log::info!("headless display closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn series_are_shared_with_readers() {
        let mut display = HeadlessDisplay::new(&Settings::default());
        let chart = display.chart();
        display.add_marker_point(Local::now(), 9_970_000.0).unwrap();
        display
            .set_trace(vec![9.92e6, 10.02e6], vec![-80.0, -30.0])
            .unwrap();

        let chart = chart.lock().unwrap();
        assert_eq!(chart.marker().len(), 1);
        assert_eq!(chart.trace().unwrap().peak_index(), 1);
    }

    #[test]
    fn mismatched_trace_is_an_error() {
        let mut display = HeadlessDisplay::new(&Settings::default());
        let err = display.set_trace(vec![1.0], vec![]).unwrap_err();
        assert!(err.to_string().contains("mismatch"));
    }
}
