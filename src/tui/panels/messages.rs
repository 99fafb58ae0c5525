// SPDX-License-Identifier: MIT
use std::collections::VecDeque;

use ratatui::layout::Rect;
use ratatui::text::Line;
use ratatui::widgets::{Block, Paragraph};

/// The newest lines that fit, oldest at the top.
fn tail(logs: &VecDeque<String>, height: usize) -> Vec<Line<'_>> {
    let skip = logs.len().saturating_sub(height);
    logs.iter().skip(skip).map(|l| Line::from(l.as_str())).collect()
}

pub fn render(frame: &mut ratatui::Frame, area: Rect, block: Block<'_>, logs: &VecDeque<String>) {
    let inner = block.inner(area);
    let lines = tail(logs, inner.height as usize);
    frame.render_widget(Paragraph::new(lines).block(block), area);
}
