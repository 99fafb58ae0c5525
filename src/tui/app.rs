// SPDX-License-Identifier: MIT
use ratatui::widgets::{Block, Borders};

use super::input::Action;
use super::layout;
use super::model::{DisplayModel, SharedModel, lock_model};
use super::panels::{command, header, instruments, marker, messages, trace};
use super::theme::Theme;
use crate::config::Settings;
use crate::dispatch::queue::TaskSender;
use crate::dispatch::task::{ControlCommand, DisplayCommand};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Normal,
    Command,
}

/// Operator side of the terminal UI. Every action becomes a task; the app
/// only tracks what it asked for, never the instrument itself.
pub struct App {
    model: SharedModel,
    sender: TaskSender,
    settings: Settings,
    selected: usize,
    mode: Mode,
    command: String,
    measuring: bool,
    recording: bool,
    pub should_quit: bool,
    pub theme: Theme,
}

impl App {
    #[must_use]
    pub fn new(model: SharedModel, sender: TaskSender, settings: Settings) -> Self {
        Self {
            model,
            sender,
            settings,
            selected: 0,
            mode: Mode::Normal,
            command: String::new(),
            measuring: false,
            recording: false,
            should_quit: false,
            theme: Theme::default(),
        }
    }

    /// Asks the instrument side for the list of candidate instruments.
    pub fn setup(&self) {
        self.sender.send(ControlCommand::QueryInstruments);
    }

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    #[must_use]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// The highlighted instrument, or the configured one before the list
    /// has arrived.
    #[must_use]
    pub fn selected_instrument(&self) -> String {
        lock_model(&self.model)
            .instruments
            .get(self.selected)
            .cloned()
            .unwrap_or_else(|| self.settings.instrument.clone())
    }

    pub fn handle_action(&mut self, action: Action) {
        match action {
            Action::Quit => {
                self.should_quit = true;
                self.sender.request_shutdown();
            }
            Action::SelectUp => self.selected = self.selected.saturating_sub(1),
            Action::SelectDown => {
                let count = lock_model(&self.model).instruments.len();
                if self.selected + 1 < count {
                    self.selected += 1;
                }
            }
            Action::Connect => {
                let target = self.selected_instrument();
                self.sender.log(format!("Connecting to {target}..."));
                self.settings.instrument.clone_from(&target);
                self.sender.send(ControlCommand::Connect { target });
            }
            Action::Prime => {
                let (start_hz, stop_hz) = (self.settings.start_hz, self.settings.stop_hz);
                self.sender.send(ControlCommand::Configure { start_hz, stop_hz });
                self.sender.send(DisplayCommand::SetMarkerLimits {
                    min: start_hz,
                    max: stop_hz,
                });
            }
            Action::ToggleMeasuring => {
                if self.measuring {
                    if self.recording {
                        self.recording = false;
                        self.sender.send(ControlCommand::StopRecording);
                    }
                    self.sender.send(ControlCommand::StopMeasuring);
                } else {
                    self.sender.send(ControlCommand::StartMeasuring);
                }
                self.measuring = !self.measuring;
            }
            Action::ToggleRecording => {
                if !self.measuring {
                    self.sender.log("Nothing to record, start measuring first.");
                } else if self.recording {
                    self.sender.send(ControlCommand::StopRecording);
                    self.recording = false;
                } else {
                    self.sender.send(ControlCommand::StartRecording);
                    self.recording = true;
                }
            }
            Action::EnterCommand => {
                self.mode = Mode::Command;
                self.command.clear();
            }
            Action::CommandInput(c) => self.command.push(c),
            Action::CommandBackspace => {
                self.command.pop();
            }
            Action::SendCommand => {
                let text = std::mem::take(&mut self.command);
                if !text.trim().is_empty() {
                    self.sender.send(ControlCommand::RunRawCommand { text });
                }
                self.mode = Mode::Normal;
            }
            Action::LeaveCommand => {
                self.command.clear();
                self.mode = Mode::Normal;
            }
            Action::None => {}
        }
    }

    fn block(&self, title: &str, active: bool) -> Block<'static> {
        let border_style = if active {
            self.theme.border_active
        } else {
            self.theme.border_normal
        };
        Block::default()
            .title(format!(" {title} "))
            .borders(Borders::ALL)
            .border_style(border_style)
            .title_style(self.theme.title)
    }

    pub fn render(&self, frame: &mut ratatui::Frame, model: &DisplayModel) {
        let outer = frame.area();
        if outer.height < 16 || outer.width < 40 {
            return;
        }
        let areas = layout::split(outer);

        let status = header::Status {
            instrument: &self.settings.instrument,
            measuring: self.measuring,
            recording: self.recording,
            latest_marker: model.chart.marker().latest().map(|(_, v)| v),
            points: model.chart.marker().len(),
        };
        header::render(frame, areas.header, &status, &self.theme);

        let snapshot = model.chart.trace();
        trace::render(
            frame,
            areas.trace,
            self.block("Trace", false),
            snapshot.as_deref(),
            &self.theme,
        );
        marker::render(
            frame,
            areas.marker,
            self.block("Marker history", false),
            model.chart.marker(),
            &self.theme,
        );
        instruments::render(
            frame,
            areas.instruments,
            self.block("Instruments", self.mode == Mode::Normal),
            &model.instruments,
            self.selected,
            &self.theme,
        );
        messages::render(frame, areas.log, self.block("Log", false), &model.logs);

        let typed = (self.mode == Mode::Command).then_some(self.command.as_str());
        command::render(
            frame,
            areas.command,
            self.block("Command", self.mode == Mode::Command),
            typed,
            &self.theme,
        );
    }
}
