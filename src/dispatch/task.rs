// SPDX-License-Identifier: MIT
use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Local};

use super::surface::DispatchError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskKind {
    Control,
    Display,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Control => write!(f, "control"),
            Self::Display => write!(f, "display"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Text(String),
    Number(f64),
    Texts(Vec<String>),
    Numbers(Vec<f64>),
    Timestamp(DateTime<Local>),
}

impl Value {
    fn type_name(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Number(_) => "number",
            Self::Texts(_) => "text list",
            Self::Numbers(_) => "number list",
            Self::Timestamp(_) => "timestamp",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => write!(f, "{s:?}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Texts(v) => write!(f, "{v:?}"),
            Self::Numbers(v) => write!(f, "[{} values]", v.len()),
            Self::Timestamp(t) => write!(f, "{}", t.format("%Y-%m-%d %H:%M:%S%.3f")),
        }
    }
}

/// Named task arguments.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Args(BTreeMap<String, Value>);

impl Args {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn take(&mut self, task: &str, key: &str) -> Result<Value, DispatchError> {
        self.0
            .remove(key)
            .ok_or_else(|| DispatchError::MissingArgument {
                task: task.to_string(),
                key: key.to_string(),
            })
    }

    fn mismatch(task: &str, key: &str, expected: &'static str, got: &Value) -> DispatchError {
        DispatchError::InvalidArgument {
            task: task.to_string(),
            key: key.to_string(),
            expected,
            got: got.type_name(),
        }
    }

    fn take_text(&mut self, task: &str, key: &str) -> Result<String, DispatchError> {
        match self.take(task, key)? {
            Value::Text(s) => Ok(s),
            other => Err(Self::mismatch(task, key, "text", &other)),
        }
    }

    fn take_number(&mut self, task: &str, key: &str) -> Result<f64, DispatchError> {
        match self.take(task, key)? {
            Value::Number(n) => Ok(n),
            Value::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| Self::mismatch(task, key, "number", &Value::Text(s))),
            other => Err(Self::mismatch(task, key, "number", &other)),
        }
    }

    fn take_texts(&mut self, task: &str, key: &str) -> Result<Vec<String>, DispatchError> {
        match self.take(task, key)? {
            Value::Texts(v) => Ok(v),
            other => Err(Self::mismatch(task, key, "text list", &other)),
        }
    }

    fn take_numbers(&mut self, task: &str, key: &str) -> Result<Vec<f64>, DispatchError> {
        match self.take(task, key)? {
            Value::Numbers(v) => Ok(v),
            other => Err(Self::mismatch(task, key, "number list", &other)),
        }
    }

    fn take_timestamp(&mut self, task: &str, key: &str) -> Result<DateTime<Local>, DispatchError> {
        match self.take(task, key)? {
            Value::Timestamp(t) => Ok(t),
            other => Err(Self::mismatch(task, key, "timestamp", &other)),
        }
    }
}

impl fmt::Display for Args {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (key, value)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{key}: {value}")?;
        }
        write!(f, "}}")
    }
}

/// A unit of work for the dispatcher. Immutable once built; consumed once.
#[derive(Clone, Debug, PartialEq)]
pub struct Task {
    kind: TaskKind,
    name: String,
    args: Args,
}

impl Task {
    #[must_use]
    pub fn new(kind: TaskKind, name: impl Into<String>, args: Args) -> Self {
        Self {
            kind,
            name: name.into(),
            args,
        }
    }

    #[must_use]
    pub fn control(name: impl Into<String>) -> Self {
        Self::new(TaskKind::Control, name, Args::new())
    }

    #[must_use]
    pub fn display(name: impl Into<String>) -> Self {
        Self::new(TaskKind::Display, name, Args::new())
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.args.insert(key, value);
        self
    }

    #[must_use]
    pub fn log(text: impl Into<String>) -> Self {
        DisplayCommand::Log { text: text.into() }.into()
    }

    #[cfg(test)]
    #[must_use]
    pub fn kind(&self) -> TaskKind {
        self.kind
    }

    #[cfg(test)]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn into_parts(self) -> (TaskKind, String, Args) {
        (self.kind, self.name, self.args)
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.name)?;
        if !self.args.is_empty() {
            write!(f, " {}", self.args)?;
        }
        Ok(())
    }
}

/// Operations addressable on the instrument-control surface.
#[derive(Clone, Debug, PartialEq)]
pub enum ControlCommand {
    Connect { target: String },
    Configure { start_hz: f64, stop_hz: f64 },
    RunRawCommand { text: String },
    QueryInstruments,
    StartMeasuring,
    StopMeasuring,
    StartRecording,
    StopRecording,
}

impl ControlCommand {
    /// Maps a task name and its arguments onto a typed command.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::UnknownTask`] for unrecognised names and
    /// argument errors for missing or mistyped arguments.
    pub fn resolve(name: &str, mut args: Args) -> Result<Self, DispatchError> {
        Ok(match name {
            "connect" => Self::Connect {
                target: args.take_text(name, "target")?,
            },
            "configure" => Self::Configure {
                start_hz: args.take_number(name, "start")?,
                stop_hz: args.take_number(name, "stop")?,
            },
            "runRawCommand" => Self::RunRawCommand {
                text: args.take_text(name, "text")?,
            },
            "queryInstruments" => Self::QueryInstruments,
            "startMeasuring" => Self::StartMeasuring,
            "stopMeasuring" => Self::StopMeasuring,
            "startRecording" => Self::StartRecording,
            "stopRecording" => Self::StopRecording,
            _ => {
                return Err(DispatchError::UnknownTask {
                    kind: TaskKind::Control,
                    name: name.to_string(),
                });
            }
        })
    }
}

impl From<ControlCommand> for Task {
    fn from(command: ControlCommand) -> Self {
        match command {
            ControlCommand::Connect { target } => {
                Task::control("connect").with("target", Value::Text(target))
            }
            ControlCommand::Configure { start_hz, stop_hz } => Task::control("configure")
                .with("start", Value::Number(start_hz))
                .with("stop", Value::Number(stop_hz)),
            ControlCommand::RunRawCommand { text } => {
                Task::control("runRawCommand").with("text", Value::Text(text))
            }
            ControlCommand::QueryInstruments => Task::control("queryInstruments"),
            ControlCommand::StartMeasuring => Task::control("startMeasuring"),
            ControlCommand::StopMeasuring => Task::control("stopMeasuring"),
            ControlCommand::StartRecording => Task::control("startRecording"),
            ControlCommand::StopRecording => Task::control("stopRecording"),
        }
    }
}

/// Operations addressable on the display surface.
#[derive(Clone, Debug, PartialEq)]
pub enum DisplayCommand {
    Log { text: String },
    SetInstrumentList { instruments: Vec<String> },
    SetTrace { xs: Vec<f64>, ys: Vec<f64> },
    AddMarkerPoint { timestamp: DateTime<Local>, value: f64 },
    SetMarkerLimits { min: f64, max: f64 },
    Refresh,
}

impl DisplayCommand {
    /// Maps a task name and its arguments onto a typed command.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::UnknownTask`] for unrecognised names and
    /// argument errors for missing or mistyped arguments.
    pub fn resolve(name: &str, mut args: Args) -> Result<Self, DispatchError> {
        Ok(match name {
            "log" => Self::Log {
                text: args.take_text(name, "text")?,
            },
            "setInstrumentList" => Self::SetInstrumentList {
                instruments: args.take_texts(name, "instruments")?,
            },
            "setTrace" => Self::SetTrace {
                xs: args.take_numbers(name, "x")?,
                ys: args.take_numbers(name, "y")?,
            },
            "addMarkerPoint" => Self::AddMarkerPoint {
                timestamp: args.take_timestamp(name, "timestamp")?,
                value: args.take_number(name, "value")?,
            },
            "setMarkerLimits" => Self::SetMarkerLimits {
                min: args.take_number(name, "min")?,
                max: args.take_number(name, "max")?,
            },
            "refresh" => Self::Refresh,
            _ => {
                return Err(DispatchError::UnknownTask {
                    kind: TaskKind::Display,
                    name: name.to_string(),
                });
            }
        })
    }
}

impl From<DisplayCommand> for Task {
    fn from(command: DisplayCommand) -> Self {
        match command {
            DisplayCommand::Log { text } => Task::display("log").with("text", Value::Text(text)),
            DisplayCommand::SetInstrumentList { instruments } => {
                Task::display("setInstrumentList").with("instruments", Value::Texts(instruments))
            }
            DisplayCommand::SetTrace { xs, ys } => Task::display("setTrace")
                .with("x", Value::Numbers(xs))
                .with("y", Value::Numbers(ys)),
            DisplayCommand::AddMarkerPoint { timestamp, value } => Task::display("addMarkerPoint")
                .with("timestamp", Value::Timestamp(timestamp))
                .with("value", Value::Number(value)),
            DisplayCommand::SetMarkerLimits { min, max } => Task::display("setMarkerLimits")
                .with("min", Value::Number(min))
                .with("max", Value::Number(max)),
            DisplayCommand::Refresh => Task::display("refresh"),
        }
    }
}
