// SPDX-License-Identifier: MIT
use ratatui::layout::{Constraint, Direction, Layout, Rect};

const SIDEBAR_WIDTH: u16 = 34;
const LOWER_HEIGHT: u16 = 10;

pub struct ScreenAreas {
    pub header: Rect,
    pub trace: Rect,
    pub marker: Rect,
    pub instruments: Rect,
    pub log: Rect,
    pub command: Rect,
}

/// Header line on top, the two charts side by side, instrument list and
/// log underneath, command line at the bottom.
pub fn split(area: Rect) -> ScreenAreas {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(8),
            Constraint::Length(LOWER_HEIGHT),
            Constraint::Length(3),
        ])
        .split(area);

    let charts = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(rows[1]);

    let lower = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(SIDEBAR_WIDTH), Constraint::Min(10)])
        .split(rows[2]);

    ScreenAreas {
        header: rows[0],
        trace: charts[0],
        marker: charts[1],
        instruments: lower[0],
        log: lower[1],
        command: rows[3],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn areas_tile_the_screen() {
        let areas = split(Rect::new(0, 0, 120, 40));
        assert_eq!(areas.header.height, 1);
        assert_eq!(areas.command.height, 3);
        assert_eq!(areas.instruments.width, SIDEBAR_WIDTH);
        assert_eq!(areas.trace.width + areas.marker.width, 120);
        assert_eq!(
            areas.header.height + areas.trace.height + areas.log.height + areas.command.height,
            40
        );
    }
}
