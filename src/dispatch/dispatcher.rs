// SPDX-License-Identifier: MIT
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

use super::queue::{TaskReceiver, TaskSender};
use super::surface::{DispatchError, DisplaySurface, InstrumentControl};
use super::task::{ControlCommand, DisplayCommand, Task, TaskKind};

/// How long the dispatcher sleeps between shutdown checks while idle.
const IDLE_POLL: Duration = Duration::from_millis(100);

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    pub dispatched: u64,
    pub failed: u64,
    pub close_errors: Vec<String>,
}

/// Sole consumer of the task queue. Routes control tasks to the instrument
/// surface and display tasks to the display surface, one at a time, and
/// owns the shutdown sequence.
pub struct Dispatcher<C, D> {
    receiver: TaskReceiver,
    sender: TaskSender,
    control: C,
    display: D,
    idle_poll: Duration,
    report: ShutdownReport,
}

impl<C: InstrumentControl, D: DisplaySurface> Dispatcher<C, D> {
    #[must_use]
    pub fn new(receiver: TaskReceiver, control: C, display: D) -> Self {
        let sender = receiver.sender();
        Self {
            receiver,
            sender,
            control,
            display,
            idle_poll: IDLE_POLL,
            report: ShutdownReport::default(),
        }
    }

    #[must_use]
    #[cfg(test)]
    pub fn with_idle_poll(mut self, idle_poll: Duration) -> Self {
        self.idle_poll = idle_poll;
        self
    }

    /// Runs until shutdown is requested, then closes both surfaces.
    pub fn run(mut self) -> ShutdownReport {
        self.receiver.queue().bind_consumer();
        log::debug!(
            "dispatcher started (queue capacity {})",
            self.receiver.queue().capacity()
        );

        while !self.receiver.shutdown().is_requested() {
            if !self.receiver.wake().wait_timeout(self.idle_poll) {
                continue;
            }
            // Cleared before draining: a producer that enqueues after the
            // last drain sets the flag again and the next wait returns at once.
            self.receiver.wake().clear();
            self.drain();
        }

        self.shutdown()
    }

    /// Dispatches queued tasks until the queue stays empty.
    pub fn drain(&mut self) {
        while !self.receiver.queue().is_empty() {
            for task in self.receiver.queue().drain_all() {
                self.dispatch(task);
            }
        }
    }

    /// Resolves and runs one task. Failures are logged and never propagate.
    pub fn dispatch(&mut self, task: Task) {
        let context = task.to_string();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.invoke(task)))
            .unwrap_or_else(|payload| Err(DispatchError::Panicked(panic_message(&*payload))));

        self.report.dispatched += 1;
        match outcome {
            Ok(()) => {}
            Err(err @ DispatchError::UnknownTask { .. }) => {
                self.report.failed += 1;
                self.diagnose(format!("Could not find task {context}: {err}"));
            }
            Err(err) => {
                self.report.failed += 1;
                self.diagnose(format!("Error caught -> {err:#} while running '{context}'"));
            }
        }
    }

    fn invoke(&mut self, task: Task) -> Result<(), DispatchError> {
        let (kind, name, args) = task.into_parts();
        let result = match kind {
            TaskKind::Control => {
                apply_control(&mut self.control, ControlCommand::resolve(&name, args)?)
            }
            TaskKind::Display => {
                apply_display(&mut self.display, DisplayCommand::resolve(&name, args)?)
            }
        };
        result.map_err(DispatchError::from)
    }

    /// Logs a diagnostic and queues it for the display.
    fn diagnose(&self, text: String) {
        log::warn!("{text}");
        self.sender.log(text);
    }

    fn shutdown(mut self) -> ShutdownReport {
        log::info!(
            "shutdown requested, closing components ({} tasks queued)",
            self.receiver.queue().len()
        );
        self.receiver.queue().release_backpressure();
        self.drain();

        if let Err(err) = self.control.close() {
            let text = format!("Could not close instrument: {err:#}");
            log::error!("{text}");
            self.report.close_errors.push(text);
        }
        // deliver whatever the instrument reported while closing
        self.drain();
        for text in &self.report.close_errors {
            if let Err(err) = self.display.log(text) {
                log::error!("could not show close error: {err:#}");
            }
        }

        if let Err(err) = self.display.close() {
            let text = format!("Could not close display: {err:#}");
            log::error!("{text}");
            self.report.close_errors.push(text);
        }

        log::info!(
            "closed all components ({} tasks dispatched, {} failed)",
            self.report.dispatched,
            self.report.failed
        );
        self.report
    }
}

fn apply_control<C: InstrumentControl>(control: &mut C, command: ControlCommand) -> anyhow::Result<()> {
    match command {
        ControlCommand::Connect { target } => control.connect(&target),
        ControlCommand::Configure { start_hz, stop_hz } => control.configure(start_hz, stop_hz),
        ControlCommand::RunRawCommand { text } => control.run_raw_command(&text),
        ControlCommand::QueryInstruments => control.query_instruments(),
        ControlCommand::StartMeasuring => control.start_measuring(),
        ControlCommand::StopMeasuring => control.stop_measuring(),
        ControlCommand::StartRecording => control.start_recording(),
        ControlCommand::StopRecording => control.stop_recording(),
    }
}

fn apply_display<D: DisplaySurface>(display: &mut D, command: DisplayCommand) -> anyhow::Result<()> {
    match command {
        DisplayCommand::Log { text } => display.log(&text),
        DisplayCommand::SetInstrumentList { instruments } => display.set_instrument_list(instruments),
        DisplayCommand::SetTrace { xs, ys } => display.set_trace(xs, ys),
        DisplayCommand::AddMarkerPoint { timestamp, value } => {
            display.add_marker_point(timestamp, value)
        }
        DisplayCommand::SetMarkerLimits { min, max } => display.set_marker_limits(min, max),
        DisplayCommand::Refresh => display.refresh(),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::thread;

    use anyhow::bail;
    use chrono::{DateTime, Local};

    use super::*;
    use crate::dispatch::channel;
    use crate::dispatch::queue::ShutdownSignal;

    type Journal = Arc<Mutex<Vec<String>>>;

    fn entries(journal: &Journal) -> Vec<String> {
        journal.lock().unwrap().clone()
    }

    #[derive(Default)]
    struct FakeControl {
        journal: Journal,
        fail_close: bool,
        fail_raw: bool,
    }

    impl InstrumentControl for FakeControl {
        fn connect(&mut self, target: &str) -> anyhow::Result<()> {
            self.journal.lock().unwrap().push(format!("connect {target}"));
            Ok(())
        }
        fn configure(&mut self, start_hz: f64, stop_hz: f64) -> anyhow::Result<()> {
            self.journal
                .lock()
                .unwrap()
                .push(format!("configure {start_hz} {stop_hz}"));
            Ok(())
        }
        fn run_raw_command(&mut self, text: &str) -> anyhow::Result<()> {
            if self.fail_raw {
                bail!("instrument timed out");
            }
            if text == "PANIC" {
                panic!("raw command exploded");
            }
            self.journal.lock().unwrap().push(format!("raw {text}"));
            Ok(())
        }
        fn query_instruments(&mut self) -> anyhow::Result<()> {
            self.journal.lock().unwrap().push("query".into());
            Ok(())
        }
        fn start_measuring(&mut self) -> anyhow::Result<()> {
            self.journal.lock().unwrap().push("startMeasuring".into());
            Ok(())
        }
        fn stop_measuring(&mut self) -> anyhow::Result<()> {
            self.journal.lock().unwrap().push("stopMeasuring".into());
            Ok(())
        }
        fn start_recording(&mut self) -> anyhow::Result<()> {
            self.journal.lock().unwrap().push("startRecording".into());
            Ok(())
        }
        fn stop_recording(&mut self) -> anyhow::Result<()> {
            self.journal.lock().unwrap().push("stopRecording".into());
            Ok(())
        }
        fn close(&mut self) -> anyhow::Result<()> {
            self.journal.lock().unwrap().push("close control".into());
            if self.fail_close {
                bail!("connection already gone");
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeDisplay {
        journal: Journal,
        logs: Journal,
        fail_close: bool,
    }

    impl DisplaySurface for FakeDisplay {
        fn log(&mut self, text: &str) -> anyhow::Result<()> {
            self.logs.lock().unwrap().push(text.to_string());
            Ok(())
        }
        fn set_instrument_list(&mut self, instruments: Vec<String>) -> anyhow::Result<()> {
            self.journal
                .lock()
                .unwrap()
                .push(format!("instruments {}", instruments.join(",")));
            Ok(())
        }
        fn set_trace(&mut self, xs: Vec<f64>, ys: Vec<f64>) -> anyhow::Result<()> {
            self.journal
                .lock()
                .unwrap()
                .push(format!("trace {} {}", xs.len(), ys.len()));
            Ok(())
        }
        fn add_marker_point(&mut self, _timestamp: DateTime<Local>, value: f64) -> anyhow::Result<()> {
            self.journal.lock().unwrap().push(format!("marker {value}"));
            Ok(())
        }
        fn set_marker_limits(&mut self, min: f64, max: f64) -> anyhow::Result<()> {
            self.journal.lock().unwrap().push(format!("limits {min} {max}"));
            Ok(())
        }
        fn refresh(&mut self) -> anyhow::Result<()> {
            self.journal.lock().unwrap().push("refresh".into());
            Ok(())
        }
        fn close(&mut self) -> anyhow::Result<()> {
            self.journal.lock().unwrap().push("close display".into());
            if self.fail_close {
                bail!("window already destroyed");
            }
            Ok(())
        }
    }

    #[test]
    fn tasks_run_in_enqueue_order_exactly_once() {
        let journal = Journal::default();
        let (sender, receiver) = channel(16, ShutdownSignal::new());
        let control = FakeControl {
            journal: Arc::clone(&journal),
            ..FakeControl::default()
        };
        let display = FakeDisplay {
            journal: Arc::clone(&journal),
            ..FakeDisplay::default()
        };

        sender.send(ControlCommand::Connect {
            target: "Simulation".into(),
        });
        sender.send(DisplayCommand::Refresh);
        sender.send(ControlCommand::StartMeasuring);
        sender.send(DisplayCommand::SetMarkerLimits { min: 1.0, max: 2.0 });
        sender.send(ControlCommand::StopMeasuring);
        sender.request_shutdown();

        let report = Dispatcher::new(receiver, control, display).run();

        assert_eq!(
            entries(&journal),
            vec![
                "connect Simulation",
                "refresh",
                "startMeasuring",
                "limits 1 2",
                "stopMeasuring",
                "close control",
                "close display",
            ]
        );
        assert_eq!(report.dispatched, 5);
        assert_eq!(report.failed, 0);
    }

    #[test]
    fn unknown_task_logs_diagnostic_and_keeps_going() {
        let journal = Journal::default();
        let logs = Journal::default();
        let (sender, receiver) = channel(8, ShutdownSignal::new());
        let control = FakeControl {
            journal: Arc::clone(&journal),
            ..FakeControl::default()
        };
        let display = FakeDisplay {
            journal: Arc::clone(&journal),
            logs: Arc::clone(&logs),
            ..FakeDisplay::default()
        };

        sender.send(Task::control("warpDrive"));
        sender.send(ControlCommand::QueryInstruments);
        sender.request_shutdown();

        let report = Dispatcher::new(receiver, control, display).run();

        assert_eq!(report.failed, 1);
        assert!(entries(&journal).contains(&"query".to_string()));
        let logs = entries(&logs);
        assert_eq!(logs.len(), 1);
        assert!(logs[0].contains("warpDrive"), "{logs:?}");
    }

    #[test]
    fn handler_errors_and_panics_are_isolated() {
        let journal = Journal::default();
        let logs = Journal::default();
        let (sender, receiver) = channel(8, ShutdownSignal::new());
        let control = FakeControl {
            journal: Arc::clone(&journal),
            ..FakeControl::default()
        };
        let display = FakeDisplay {
            logs: Arc::clone(&logs),
            ..FakeDisplay::default()
        };

        sender.send(ControlCommand::RunRawCommand {
            text: "PANIC".into(),
        });
        sender.send(ControlCommand::RunRawCommand {
            text: "*IDN?".into(),
        });
        sender.request_shutdown();

        let report = Dispatcher::new(receiver, control, display).run();

        // two commands plus the diagnostic log task
        assert_eq!(report.dispatched, 3);
        assert_eq!(report.failed, 1);
        assert!(entries(&journal).contains(&"raw *IDN?".to_string()));
        let logs = entries(&logs);
        assert!(logs[0].contains("raw command exploded"));
        assert!(logs[0].contains("runRawCommand"));
    }

    #[test]
    fn handler_error_message_carries_task_arguments() {
        let logs = Journal::default();
        let (sender, receiver) = channel(8, ShutdownSignal::new());
        let control = FakeControl {
            fail_raw: true,
            ..FakeControl::default()
        };
        let display = FakeDisplay {
            logs: Arc::clone(&logs),
            ..FakeDisplay::default()
        };

        sender.send(ControlCommand::RunRawCommand {
            text: "TRAC:DATA?".into(),
        });
        sender.request_shutdown();
        Dispatcher::new(receiver, control, display).run();

        let logs = entries(&logs);
        assert!(logs[0].contains("instrument timed out"));
        assert!(logs[0].contains("TRAC:DATA?"));
    }

    #[test]
    fn failing_control_close_still_closes_display() {
        let journal = Journal::default();
        let logs = Journal::default();
        let (sender, receiver) = channel(8, ShutdownSignal::new());
        let control = FakeControl {
            journal: Arc::clone(&journal),
            fail_close: true,
            ..FakeControl::default()
        };
        let display = FakeDisplay {
            journal: Arc::clone(&journal),
            logs: Arc::clone(&logs),
            ..FakeDisplay::default()
        };
        sender.request_shutdown();

        let report = Dispatcher::new(receiver, control, display).run();

        assert_eq!(entries(&journal), vec!["close control", "close display"]);
        assert_eq!(report.close_errors.len(), 1);
        assert!(entries(&logs)[0].contains("connection already gone"));
    }

    #[test]
    fn failing_display_close_is_reported() {
        let journal = Journal::default();
        let (sender, receiver) = channel(8, ShutdownSignal::new());
        let control = FakeControl {
            journal: Arc::clone(&journal),
            ..FakeControl::default()
        };
        let display = FakeDisplay {
            journal: Arc::clone(&journal),
            fail_close: true,
            ..FakeDisplay::default()
        };
        sender.request_shutdown();

        let report = Dispatcher::new(receiver, control, display).run();

        assert_eq!(entries(&journal), vec!["close control", "close display"]);
        assert_eq!(report.close_errors.len(), 1);
        assert!(report.close_errors[0].contains("window already destroyed"));
    }

    #[test]
    fn shutdown_before_any_task_closes_immediately() {
        let journal = Journal::default();
        let shutdown = ShutdownSignal::new();
        shutdown.request();
        let (_sender, receiver) = channel(8, shutdown);
        let control = FakeControl {
            journal: Arc::clone(&journal),
            ..FakeControl::default()
        };
        let display = FakeDisplay {
            journal: Arc::clone(&journal),
            ..FakeDisplay::default()
        };

        let report = Dispatcher::new(receiver, control, display)
            .with_idle_poll(Duration::from_secs(60))
            .run();

        assert_eq!(report.dispatched, 0);
        assert_eq!(entries(&journal), vec!["close control", "close display"]);
    }

    #[test]
    fn signal_only_shutdown_is_observed_while_idle() {
        let journal = Journal::default();
        let shutdown = ShutdownSignal::new();
        let (_sender, receiver) = channel(8, shutdown.clone());
        let control = FakeControl {
            journal: Arc::clone(&journal),
            ..FakeControl::default()
        };
        let display = FakeDisplay::default();

        let handle = thread::spawn(move || {
            Dispatcher::new(receiver, control, display)
                .with_idle_poll(Duration::from_millis(5))
                .run()
        });
        thread::sleep(Duration::from_millis(20));
        // no wake, as when SIGINT flips the flag
        shutdown.request();
        handle.join().unwrap();
        assert_eq!(entries(&journal), vec!["close control"]);
    }

    #[test]
    fn concurrent_producers_are_all_delivered() {
        let journal = Journal::default();
        let (sender, receiver) = channel(3, ShutdownSignal::new());
        let display = FakeDisplay {
            journal: Arc::clone(&journal),
            ..FakeDisplay::default()
        };
        let dispatcher = Dispatcher::new(receiver, FakeControl::default(), display)
            .with_idle_poll(Duration::from_millis(5));
        let handle = thread::spawn(move || dispatcher.run());

        let producers: Vec<_> = (0_u8..4)
            .map(|p| {
                let sender = sender.clone();
                thread::spawn(move || {
                    for i in 0_u8..25 {
                        sender.send(DisplayCommand::SetMarkerLimits {
                            min: f64::from(p),
                            max: f64::from(i),
                        });
                    }
                })
            })
            .collect();
        for producer in producers {
            producer.join().unwrap();
        }
        sender.request_shutdown();
        let report = handle.join().unwrap();

        assert_eq!(report.dispatched, 100);
        let journal = entries(&journal);
        // per-producer order is preserved
        for p in 0..4 {
            let seen: Vec<&String> = journal
                .iter()
                .filter(|e| e.starts_with(&format!("limits {p} ")))
                .collect();
            assert_eq!(seen.len(), 25);
            for (i, entry) in seen.iter().enumerate() {
                assert_eq!(**entry, format!("limits {p} {i}"));
            }
        }
    }
}
