// SPDX-License-Identifier: MIT
use anyhow::Result;
use chrono::{DateTime, Local};
use thiserror::Error;

use super::task::TaskKind;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("no {kind} handler named '{name}'")]
    UnknownTask { kind: TaskKind, name: String },
    #[error("task '{task}' is missing argument '{key}'")]
    MissingArgument { task: String, key: String },
    #[error("task '{task}' argument '{key}' should be {expected}, got {got}")]
    InvalidArgument {
        task: String,
        key: String,
        expected: &'static str,
        got: &'static str,
    },
    #[error("handler panicked: {0}")]
    Panicked(String),
    #[error(transparent)]
    Handler(#[from] anyhow::Error),
}

/// The instrument side of the dispatcher. Implementations receive a
/// [`TaskSender`](super::queue::TaskSender) when they are built and use it
/// to report back to the display.
pub trait InstrumentControl: Send {
    fn connect(&mut self, target: &str) -> Result<()>;
    fn configure(&mut self, start_hz: f64, stop_hz: f64) -> Result<()>;
    fn run_raw_command(&mut self, text: &str) -> Result<()>;
    fn query_instruments(&mut self) -> Result<()>;
    fn start_measuring(&mut self) -> Result<()>;
    fn stop_measuring(&mut self) -> Result<()>;
    fn start_recording(&mut self) -> Result<()>;
    fn stop_recording(&mut self) -> Result<()>;
    fn close(&mut self) -> Result<()>;
}

/// The presentation side of the dispatcher. Only ever called from the
/// dispatcher thread.
pub trait DisplaySurface: Send {
    fn log(&mut self, text: &str) -> Result<()>;
    fn set_instrument_list(&mut self, instruments: Vec<String>) -> Result<()>;
    fn set_trace(&mut self, xs: Vec<f64>, ys: Vec<f64>) -> Result<()>;
    fn add_marker_point(&mut self, timestamp: DateTime<Local>, value: f64) -> Result<()>;
    fn set_marker_limits(&mut self, min: f64, max: f64) -> Result<()>;
    fn refresh(&mut self) -> Result<()>;
    fn close(&mut self) -> Result<()>;
}
