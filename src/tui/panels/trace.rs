// SPDX-License-Identifier: MIT
use ratatui::layout::Rect;
use ratatui::symbols::Marker;
use ratatui::text::Span;
use ratatui::widgets::{Axis, Block, Chart, Dataset, GraphType, Paragraph};

use crate::series::trace::TraceSnapshot;
use crate::tui::theme::Theme;

fn mhz(hz: f64) -> String {
    format!("{:.3}", hz / 1e6)
}

/// Vertical line through the peak, spanning the Y range.
fn peak_line(trace: &TraceSnapshot) -> [(f64, f64); 2] {
    let (x, _) = trace.peak();
    let (lo, hi) = trace.y_range();
    [(x, lo), (x, hi)]
}

pub fn render(
    frame: &mut ratatui::Frame,
    area: Rect,
    block: Block<'_>,
    trace: Option<&TraceSnapshot>,
    theme: &Theme,
) {
    let Some(trace) = trace else {
        frame.render_widget(Paragraph::new("Waiting for a sweep...").block(block), area);
        return;
    };

    let points = trace.points();
    let peak = peak_line(trace);
    let (x0, x1) = trace.x_range();
    let (y0, y1) = trace.y_range();
    let (peak_x, peak_y) = trace.peak();

    let datasets = vec![
        Dataset::default()
            .name(format!(
                "peak {} MHz @ {peak_y:.1} dB ({} pts)",
                mhz(peak_x),
                trace.len()
            ))
            .marker(Marker::Braille)
            .graph_type(GraphType::Line)
            .style(theme.peak)
            .data(&peak),
        Dataset::default()
            .marker(Marker::Braille)
            .graph_type(GraphType::Line)
            .style(theme.trace)
            .data(&points),
    ];

    let chart = Chart::new(datasets)
        .block(block)
        .x_axis(
            Axis::default()
                .title(Span::styled("MHz", theme.axis))
                .style(theme.axis)
                .bounds([x0, x1])
                .labels([mhz(x0), mhz((x0 + x1) / 2.0), mhz(x1)]),
        )
        .y_axis(
            Axis::default()
                .title(Span::styled("dB", theme.axis))
                .style(theme.axis)
                .bounds([y0, y1])
                .labels([format!("{y0:.1}"), format!("{y1:.1}")]),
        );
    frame.render_widget(chart, area);
}
