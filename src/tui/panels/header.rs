// SPDX-License-Identifier: MIT
use num_format::{Locale, ToFormattedString};
use ratatui::layout::Rect;
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;

use crate::tui::theme::{RECORDING_DOT, Theme};

pub struct Status<'a> {
    pub instrument: &'a str,
    pub measuring: bool,
    pub recording: bool,
    pub latest_marker: Option<f64>,
    pub points: usize,
}

/// Formats a frequency in Hz with thousands separators and one decimal.
#[must_use]
pub fn format_hz(hz: f64) -> String {
    if !hz.is_finite() {
        return format!("{hz} Hz");
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let tenths = (hz.abs() * 10.0).round() as u64;
    let sign = if hz < 0.0 && tenths > 0 { "-" } else { "" };
    format!(
        "{sign}{}.{} Hz",
        (tenths / 10).to_formatted_string(&Locale::en),
        tenths % 10
    )
}

pub fn render(frame: &mut ratatui::Frame, area: Rect, status: &Status<'_>, theme: &Theme) {
    if area.height == 0 || area.width == 0 {
        return;
    }

    let version = env!("CARGO_PKG_VERSION");
    let marker = status
        .latest_marker
        .map_or_else(|| "-".to_string(), format_hz);
    let text = format!(
        "qcmon v{version} | {} | Marker: {marker} | Points: {} ",
        status.instrument, status.points
    );

    let mut spans = Vec::new();
    let mut used = 0;
    if status.measuring {
        let label = " MEASURING ";
        used += label.chars().count();
        spans.push(Span::styled(label, theme.measuring_indicator));
    }
    if status.recording {
        let label = format!(" {RECORDING_DOT} REC ");
        used += label.chars().count();
        spans.push(Span::styled(label, theme.recording_indicator));
    }
    let width = (area.width as usize).saturating_sub(used);
    spans.push(Span::styled(format!(" {text:<width$}"), theme.status_bar));

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}
