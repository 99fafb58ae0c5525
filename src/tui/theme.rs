// SPDX-License-Identifier: MIT
use ratatui::style::{Color, Modifier, Style};

pub struct Theme {
    pub trace: Style,
    pub peak: Style,
    pub marker: Style,
    pub axis: Style,
    pub border_normal: Style,
    pub border_active: Style,
    pub title: Style,
    pub status_bar: Style,
    pub measuring_indicator: Style,
    pub recording_indicator: Style,
    pub selected: Style,
    pub hint: Style,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            trace: Style::default().fg(Color::Cyan),
            peak: Style::default().fg(Color::Red),
            marker: Style::default().fg(Color::Yellow),
            axis: Style::default().fg(Color::Gray),
            border_normal: Style::default().fg(Color::White),
            border_active: Style::default().fg(Color::Cyan),
            title: Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
            status_bar: Style::default().fg(Color::Black).bg(Color::White),
            measuring_indicator: Style::default()
                .fg(Color::Black)
                .bg(Color::Green)
                .add_modifier(Modifier::BOLD),
            recording_indicator: Style::default()
                .fg(Color::White)
                .bg(Color::Red)
                .add_modifier(Modifier::BOLD),
            selected: Style::default().fg(Color::Black).bg(Color::Cyan),
            hint: Style::default().fg(Color::DarkGray),
        }
    }
}

pub const SELECTED_MARKER: [char; 2] = ['\u{2610}', '\u{2611}'];
pub const RECORDING_DOT: char = '\u{25CF}';
