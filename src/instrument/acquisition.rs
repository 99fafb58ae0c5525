// SPDX-License-Identifier: MIT
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Local};

use super::recorder::Recorder;
use super::transport::{TransportError, parse_block, parse_number};
use super::{AcquisitionFlags, SharedConnection, lock_connection};
use crate::dispatch::queue::TaskSender;
use crate::dispatch::task::DisplayCommand;

const MARKER_QUERY: &str = "CALC:MARK1:X?";
const TRACE_QUERY: &str = "TRAC:DATA? TRACE1";

#[derive(Debug, Default)]
struct Sample {
    marker: Option<f64>,
    trace: Option<(Vec<f64>, Vec<f64>)>,
    problems: Vec<String>,
}

/// Polls the instrument while measuring is on and feeds the dispatcher.
pub struct AcquisitionLoop {
    connection: SharedConnection,
    flags: Arc<AcquisitionFlags>,
    sender: TaskSender,
    recorder: Recorder,
    poll_interval: Duration,
    was_recording: bool,
    reported_disconnected: bool,
}

impl AcquisitionLoop {
    #[must_use]
    pub fn new(
        connection: SharedConnection,
        flags: Arc<AcquisitionFlags>,
        sender: TaskSender,
        recorder: Recorder,
        poll_interval: Duration,
    ) -> Self {
        Self {
            connection,
            flags,
            sender,
            recorder,
            poll_interval,
            was_recording: false,
            reported_disconnected: false,
        }
    }

    /// Polls until shutdown is requested, then flushes the recording.
    pub fn run(mut self) {
        log::debug!("acquisition loop started, polling every {:?}", self.poll_interval);
        while !self.sender.shutdown_requested() {
            self.tick(Local::now());
            thread::sleep(self.poll_interval);
        }
        if let Err(err) = self.recorder.finish() {
            log::error!("{err:#}");
        }
        log::debug!("acquisition loop exited");
    }

    /// One polling period. Does nothing unless measuring.
    pub fn tick(&mut self, now: DateTime<Local>) {
        if !self.flags.measuring() {
            return;
        }

        let sample = self.read_sample();
        for problem in &sample.problems {
            log::warn!("{problem}");
            self.sender.log(problem.clone());
        }
        if let Some(value) = sample.marker {
            self.sender.send(DisplayCommand::AddMarkerPoint {
                timestamp: now,
                value,
            });
        }
        if let Some((xs, ys)) = &sample.trace {
            self.sender.send(DisplayCommand::SetTrace {
                xs: xs.clone(),
                ys: ys.clone(),
            });
        }
        self.sender.notify();

        self.record(now, &sample);
    }

    /// Reads marker and trace under one lock, so handler commands cannot
    /// interleave with the exchange. Nothing is sent while the lock is held.
    fn read_sample(&mut self) -> Sample {
        let mut sample = Sample::default();
        let mut guard = lock_connection(&self.connection);
        let Some(connection) = guard.as_mut() else {
            if !self.reported_disconnected {
                self.reported_disconnected = true;
                sample
                    .problems
                    .push(format!("Could not read instrument: {}", TransportError::NotConnected));
            }
            return sample;
        };
        self.reported_disconnected = false;

        match connection
            .transport()
            .query(MARKER_QUERY)
            .and_then(|reply| parse_number(&reply))
        {
            Ok(value) => sample.marker = Some(value),
            Err(err) => sample.problems.push(format!("Could not read marker: {err}")),
        }

        match connection
            .transport()
            .query(TRACE_QUERY)
            .and_then(|reply| parse_block(&reply))
        {
            Ok(ys) => {
                let xs = match connection.frequency_axis() {
                    Some(axis) => axis.to_vec(),
                    #[allow(clippy::cast_precision_loss)]
                    None => (0..ys.len()).map(|i| i as f64).collect(),
                };
                if xs.len() == ys.len() {
                    sample.trace = Some((xs, ys));
                } else {
                    sample.problems.push(format!(
                        "Ignoring trace of {} points, instrument was configured for {}",
                        ys.len(),
                        xs.len()
                    ));
                }
            }
            Err(err) => sample.problems.push(format!("Could not read trace: {err}")),
        }
        sample
    }

    fn record(&mut self, now: DateTime<Local>, sample: &Sample) {
        let recording = self.flags.recording();
        let result = match (self.was_recording, recording) {
            (false, true) => self.recorder.start(now),
            (true, false) => self.recorder.stop(),
            _ => Ok(()),
        };
        self.was_recording = recording;
        if let Err(err) = result {
            self.report(&format!("Recording failed: {err:#}"));
            return;
        }
        if !recording {
            return;
        }

        if let Some(value) = sample.marker
            && let Err(err) = self.recorder.record_marker(now, value)
        {
            self.report(&format!("Could not save marker: {err:#}"));
        }
        if let Some((xs, ys)) = &sample.trace {
            match self.recorder.maybe_snapshot(now, xs, ys) {
                Ok(Some(path)) => log::info!("saved trace snapshot {}", path.display()),
                Ok(None) => {}
                Err(err) => self.report(&format!("Could not save trace: {err:#}")),
            }
        }
    }

    fn report(&self, text: &str) {
        log::error!("{text}");
        self.sender.log(text);
    }
}
