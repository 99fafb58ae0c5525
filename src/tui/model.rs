// SPDX-License-Identifier: MIT
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::Result;
use chrono::{DateTime, Local};

use crate::config::Settings;
use crate::dispatch::surface::DisplaySurface;
use crate::series::ChartState;

const LOG_CAPACITY: usize = 500;

/// What the terminal shows. Written by [`TuiDisplay`] on the dispatcher
/// thread, read by the render loop.
#[derive(Debug)]
pub struct DisplayModel {
    pub chart: ChartState,
    pub logs: VecDeque<String>,
    pub instruments: Vec<String>,
    pub dirty: bool,
    pub closed: bool,
}

impl DisplayModel {
    #[must_use]
    pub fn new(settings: &Settings) -> Self {
        Self {
            chart: ChartState::from_settings(settings),
            logs: VecDeque::with_capacity(LOG_CAPACITY),
            instruments: Vec::new(),
            dirty: true,
            closed: false,
        }
    }

    pub fn push_log(&mut self, text: &str) {
        let stamp = Local::now().format("%H:%M:%S");
        for line in text.lines().filter(|l| !l.trim().is_empty()) {
            if self.logs.len() >= LOG_CAPACITY {
                self.logs.pop_front();
            }
            self.logs.push_back(format!("{stamp} {line}"));
        }
        self.dirty = true;
    }

    /// Returns whether a redraw is due and clears the flag.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }
}

pub type SharedModel = Arc<Mutex<DisplayModel>>;

pub fn lock_model(model: &SharedModel) -> MutexGuard<'_, DisplayModel> {
    model.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Display surface backing the terminal UI.
pub struct TuiDisplay {
    model: SharedModel,
}

impl TuiDisplay {
    #[must_use]
    pub fn new(model: SharedModel) -> Self {
        Self { model }
    }

    fn update<T>(&self, f: impl FnOnce(&mut DisplayModel) -> T) -> T {
        let mut model = lock_model(&self.model);
        model.dirty = true;
        f(&mut model)
    }
}

impl DisplaySurface for TuiDisplay {
    fn log(&mut self, text: &str) -> Result<()> {
        self.update(|m| m.push_log(text));
        Ok(())
    }

    fn set_instrument_list(&mut self, instruments: Vec<String>) -> Result<()> {
        self.update(|m| m.instruments = instruments);
        Ok(())
    }

    fn set_trace(&mut self, xs: Vec<f64>, ys: Vec<f64>) -> Result<()> {
        self.update(|m| m.chart.set_trace(xs, ys))?;
        Ok(())
    }

    fn add_marker_point(&mut self, timestamp: DateTime<Local>, value: f64) -> Result<()> {
        self.update(|m| m.chart.add_marker_point(&timestamp, value))?;
        Ok(())
    }

    fn set_marker_limits(&mut self, min: f64, max: f64) -> Result<()> {
        self.update(|m| m.chart.set_marker_limits(min, max));
        Ok(())
    }

    fn refresh(&mut self) -> Result<()> {
        self.update(|_| ());
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.update(|m| m.closed = true);
        log::info!("terminal display closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn display() -> (TuiDisplay, SharedModel) {
        let model = Arc::new(Mutex::new(DisplayModel::new(&Settings::default())));
        (TuiDisplay::new(Arc::clone(&model)), model)
    }

    #[test]
    fn every_update_marks_the_model_dirty() {
        let (mut display, model) = display();
        assert!(lock_model(&model).take_dirty());
        assert!(!lock_model(&model).take_dirty());

        display.refresh().unwrap();
        assert!(lock_model(&model).take_dirty());
        display.set_marker_limits(1.0, 2.0).unwrap();
        assert!(lock_model(&model).take_dirty());
    }

    #[test]
    fn log_is_split_into_lines_and_bounded() {
        let (mut display, model) = display();
        display.log("first\nsecond\n").unwrap();
        assert_eq!(lock_model(&model).logs.len(), 2);
        assert!(lock_model(&model).logs[1].ends_with(" second"));

        for i in 0..LOG_CAPACITY {
            display.log(&format!("line {i}")).unwrap();
        }
        let model = lock_model(&model);
        assert_eq!(model.logs.len(), LOG_CAPACITY);
        assert!(model.logs.back().unwrap().ends_with(&format!("line {}", LOG_CAPACITY - 1)));
    }

    #[test]
    fn close_ends_the_session() {
        let (mut display, model) = display();
        display
            .set_instrument_list(vec!["Simulation".into()])
            .unwrap();
        display.close().unwrap();
        let model = lock_model(&model);
        assert!(model.closed);
        assert_eq!(model.instruments, vec!["Simulation"]);
    }

    #[test]
    fn bad_trace_is_reported_to_the_dispatcher() {
        let (mut display, _model) = display();
        assert!(display.set_trace(vec![], vec![]).is_err());
    }
}
