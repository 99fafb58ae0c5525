// SPDX-License-Identifier: MIT
use ratatui::layout::Rect;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Paragraph};

use crate::tui::theme::{SELECTED_MARKER, Theme};

pub fn render(
    frame: &mut ratatui::Frame,
    area: Rect,
    block: Block<'_>,
    instruments: &[String],
    selected: usize,
    theme: &Theme,
) {
    if instruments.is_empty() {
        frame.render_widget(Paragraph::new("Looking for instruments...").block(block), area);
        return;
    }
    let lines: Vec<Line<'_>> = instruments
        .iter()
        .enumerate()
        .map(|(i, name)| {
            if i == selected {
                Line::from(Span::styled(format!("{} {name}", SELECTED_MARKER[1]), theme.selected))
            } else {
                Line::from(format!("{} {name}", SELECTED_MARKER[0]))
            }
        })
        .collect();
    frame.render_widget(Paragraph::new(lines).block(block), area);
}
