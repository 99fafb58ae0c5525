// SPDX-License-Identifier: MIT
use ratatui::layout::{Position, Rect};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Paragraph};

use crate::tui::theme::Theme;

const HINT: &str = "\u{2191}/\u{2193} select  c connect  p prime  m measure  r record  : command  q quit";

/// In command mode shows the SCPI line being typed and places the cursor;
/// otherwise shows the key bindings.
pub fn render(
    frame: &mut ratatui::Frame,
    area: Rect,
    block: Block<'_>,
    command: Option<&str>,
    theme: &Theme,
) {
    let inner = block.inner(area);
    let line = match command {
        Some(text) => Line::from(vec![Span::styled(":", theme.title), Span::raw(text)]),
        None => Line::from(Span::styled(HINT, theme.hint)),
    };
    frame.render_widget(Paragraph::new(line).block(block), area);

    if let Some(text) = command
        && inner.width > 0
        && inner.height > 0
    {
        let typed = u16::try_from(text.chars().count() + 1).unwrap_or(u16::MAX);
        let x = inner.x.saturating_add(typed.min(inner.width - 1));
        frame.set_cursor_position(Position::new(x, inner.y));
    }
}
