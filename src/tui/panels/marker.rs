// SPDX-License-Identifier: MIT
use chrono::{Local, TimeZone};
use ratatui::layout::Rect;
use ratatui::symbols::Marker;
use ratatui::widgets::{Axis, Block, Chart, Dataset, GraphType, Paragraph};

use super::header::format_hz;
use crate::series::marker::WindowedSeries;
use crate::tui::theme::Theme;

fn clock(seconds: f64) -> String {
    #[allow(clippy::cast_possible_truncation)]
    let millis = (seconds * 1000.0) as i64;
    Local
        .timestamp_millis_opt(millis)
        .single()
        .map_or_else(|| format!("{seconds:.0}"), |t| t.format("%H:%M:%S").to_string())
}

pub fn render(
    frame: &mut ratatui::Frame,
    area: Rect,
    block: Block<'_>,
    series: &WindowedSeries,
    theme: &Theme,
) {
    let (Some((x0, x1)), Some((y0, y1))) = (series.display_window(), series.y_bounds()) else {
        frame.render_widget(Paragraph::new("No marker readings yet.").block(block), area);
        return;
    };
    if series.is_empty() {
        frame.render_widget(Paragraph::new("No marker readings yet.").block(block), area);
        return;
    }

    let points = series.visible_points();
    let datasets = vec![
        Dataset::default()
            .marker(Marker::Braille)
            .graph_type(GraphType::Line)
            .style(theme.marker)
            .data(&points),
    ];

    let chart = Chart::new(datasets)
        .block(block)
        .x_axis(
            Axis::default()
                .style(theme.axis)
                .bounds([x0, x1])
                .labels([clock(x0), clock((x0 + x1) / 2.0), clock(x1)]),
        )
        .y_axis(
            Axis::default()
                .style(theme.axis)
                .bounds([y0, y1])
                .labels([format_hz(y0), format_hz(y1)]),
        );
    frame.render_widget(chart, area);
}
