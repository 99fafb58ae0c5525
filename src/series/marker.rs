// SPDX-License-Identifier: MIT
use std::collections::VecDeque;

use super::SeriesError;

/// Relative headroom added around a new Y extreme (0.001 %).
pub const DEFAULT_Y_MARGIN: f64 = 1e-5;

#[derive(Clone, Copy, Debug)]
pub struct SeriesConfig {
    /// Maximum buffered time span, in seconds, before the oldest third is dropped.
    pub retention: f64,
    /// Width of the visible window, in seconds.
    pub display_span: f64,
    pub y_margin: f64,
}

impl SeriesConfig {
    #[must_use]
    pub fn new(retention: f64, display_span: f64) -> Self {
        Self {
            retention,
            display_span,
            y_margin: DEFAULT_Y_MARGIN,
        }
    }
}

/// Time-ordered marker history with a retention cap, a sliding display
/// window and Y bounds that only ever grow.
#[derive(Clone, Debug)]
pub struct WindowedSeries {
    config: SeriesConfig,
    points: VecDeque<(f64, f64)>,
    window_start: Option<f64>,
    y_bounds: Option<(f64, f64)>,
}

impl WindowedSeries {
    #[must_use]
    pub fn new(config: SeriesConfig) -> Self {
        Self {
            config,
            points: VecDeque::new(),
            window_start: None,
            y_bounds: None,
        }
    }

    /// Appends a point stamped in seconds.
    ///
    /// # Errors
    ///
    /// Returns [`SeriesError::OutOfOrder`] if `timestamp` is older than the
    /// newest stored point; the series is left untouched.
    pub fn append(&mut self, timestamp: f64, value: f64) -> Result<(), SeriesError> {
        if let Some(&(newest, _)) = self.points.back() {
            if timestamp < newest {
                return Err(SeriesError::OutOfOrder { timestamp, newest });
            }
            while self.points.len() >= 2 && self.stored_span() > self.config.retention {
                let cut = (self.points.len() / 3).max(1);
                self.points.drain(..cut);
            }
            // a lone point left over from before a pause
            if self.points.len() == 1
                && self.points.front().is_some_and(|&(t, _)| timestamp - t > self.config.retention)
            {
                self.points.clear();
            }
        }

        self.points.push_back((timestamp, value));
        self.slide_window(timestamp);
        self.grow_y_bounds(value);
        Ok(())
    }

    fn slide_window(&mut self, newest: f64) {
        let half_span = self.config.display_span / 2.0;
        let start = self.window_start.get_or_insert(newest);
        if half_span <= 0.0 {
            return;
        }
        while newest - *start > half_span {
            *start += half_span;
        }
    }

    fn grow_y_bounds(&mut self, value: f64) {
        if !value.is_finite() {
            return;
        }
        let headroom = value.abs() * self.config.y_margin;
        let (min, max) = self.y_bounds.get_or_insert((value - headroom, value + headroom));
        if value < *min {
            *min = value - headroom;
        }
        if value > *max {
            *max = value + headroom;
        }
    }

    /// Resets the Y axis to `[min, max]`; subsequent points only widen it.
    pub fn set_y_limits(&mut self, min: f64, max: f64) {
        self.y_bounds = Some((min.min(max), min.max(max)));
    }

    #[must_use]
    pub fn y_bounds(&self) -> Option<(f64, f64)> {
        self.y_bounds
    }

    /// The visible `[start, start + span]` range, anchored at the first point.
    #[must_use]
    pub fn display_window(&self) -> Option<(f64, f64)> {
        self.window_start
            .map(|start| (start, start + self.config.display_span))
    }

    /// Newest minus oldest timestamp of what is currently stored.
    #[must_use]
    pub fn stored_span(&self) -> f64 {
        match (self.points.front(), self.points.back()) {
            (Some(first), Some(last)) => last.0 - first.0,
            _ => 0.0,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[must_use]
    pub fn latest(&self) -> Option<(f64, f64)> {
        self.points.back().copied()
    }

    pub fn points(&self) -> impl Iterator<Item = &(f64, f64)> {
        self.points.iter()
    }

    /// Points that fall inside the display window.
    #[must_use]
    pub fn visible_points(&self) -> Vec<(f64, f64)> {
        let Some((start, end)) = self.display_window() else {
            return Vec::new();
        };
        self.points()
            .filter(|(t, _)| *t >= start && *t <= end)
            .copied()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(retention: f64, span: f64) -> WindowedSeries {
        WindowedSeries::new(SeriesConfig::new(retention, span))
    }

    #[test]
    fn first_point_anchors_display_window() {
        let mut s = series(300.0, 60.0);
        assert!(s.display_window().is_none());
        s.append(1_000.0, 10.0).unwrap();
        assert_eq!(s.display_window(), Some((1_000.0, 1_060.0)));
    }

    #[test]
    fn trims_oldest_third_once_span_exceeds_retention() {
        let mut s = series(300.0, 60.0);
        for i in 0_u32..300 {
            s.append(f64::from(i) * 301.0 / 299.0, 1.0).unwrap();
        }
        let prior = s.len();
        assert_eq!(prior, 300);
        assert!(s.stored_span() > 300.0);

        s.append(302.0, 1.0).unwrap();
        assert_eq!(s.len() - 1, prior * 2 / 3);
    }

    #[test]
    fn no_trim_at_exactly_retention() {
        let mut s = series(300.0, 60.0);
        for t in 0_u32..=300 {
            s.append(f64::from(t), 1.0).unwrap();
        }
        s.append(300.5, 1.0).unwrap();
        assert_eq!(s.len(), 302);
    }

    #[test]
    fn stored_span_never_exceeds_cap_by_more_than_one_step() {
        let step = 7.0;
        let mut s = series(300.0, 60.0);
        for i in 0_u32..2_000 {
            s.append(f64::from(i) * step, 0.0).unwrap();
            assert!(s.stored_span() <= 300.0 + step, "span {}", s.stored_span());
        }
    }

    #[test]
    fn trims_back_under_cap_after_a_pause() {
        let mut s = series(300.0, 60.0);
        for t in 0_u32..100 {
            s.append(f64::from(t), 0.0).unwrap();
        }
        for t in [10_099.0, 10_100.0, 10_101.0] {
            s.append(t, 0.0).unwrap();
            let held: Vec<f64> = s.points().map(|p| p.0).collect();
            // everything but the newest point fits the cap
            let previous = held[held.len().saturating_sub(2)];
            assert!(previous - held[0] <= 300.0, "held {held:?}");
        }
        assert!(s.stored_span() <= 301.0, "span {}", s.stored_span());
        assert_eq!(s.len(), 3);
    }

    #[test]
    fn lone_stale_point_is_dropped() {
        let mut s = series(300.0, 60.0);
        s.append(0.0, 1.0).unwrap();
        s.append(1_000.0, 2.0).unwrap();
        assert_eq!(s.len(), 1);
        assert_eq!(s.latest(), Some((1_000.0, 2.0)));

        s.append(1_400.0, 3.0).unwrap();
        assert_eq!(s.len(), 1);
        assert!(s.stored_span().abs() < f64::EPSILON);
    }

    #[test]
    fn oldest_after_trim_comes_from_recent_two_thirds() {
        let mut s = series(100.0, 60.0);
        for t in 0_u32..=101 {
            s.append(f64::from(t), 0.0).unwrap();
        }
        let before: Vec<f64> = s.points().map(|p| p.0).collect();
        s.append(102.0, 0.0).unwrap();
        let oldest = s.points().next().unwrap().0;
        let cut = before.len() / 3;
        assert!((oldest - before[cut]).abs() < f64::EPSILON);
    }

    #[test]
    fn display_window_slides_by_half_span() {
        let mut s = series(10_000.0, 60.0);
        s.append(0.0, 1.0).unwrap();
        s.append(30.0, 1.0).unwrap();
        assert_eq!(s.display_window(), Some((0.0, 60.0)));
        s.append(31.0, 1.0).unwrap();
        assert_eq!(s.display_window(), Some((30.0, 90.0)));
        s.append(200.0, 1.0).unwrap();
        let (start, end) = s.display_window().unwrap();
        assert!(200.0 - start <= 30.0);
        assert!(end >= 200.0);
    }

    #[test]
    fn y_bounds_never_shrink() {
        let mut s = series(10_000.0, 60.0);
        s.set_y_limits(9_975_000.0, 10_010_000.0);
        let values = [
            9_990_000.0,
            10_020_000.0,
            9_970_000.0,
            10_000_000.0,
            -5.0,
            10_020_000.5,
        ];
        let mut prev = s.y_bounds().unwrap();
        for (t, v) in (0_u32..).map(f64::from).zip(values.iter()) {
            s.append(t, *v).unwrap();
            let now = s.y_bounds().unwrap();
            assert!(now.0 <= prev.0);
            assert!(now.1 >= prev.1);
            assert!(now.0 <= *v && now.1 >= *v);
            prev = now;
        }
    }

    #[test]
    fn negative_extremes_expand_away_from_zero() {
        let mut s = series(10_000.0, 60.0);
        s.set_y_limits(-100.0, -50.0);
        s.append(0.0, -100.0001).unwrap();
        let (min, _) = s.y_bounds().unwrap();
        assert!(min < -100.0001);
    }

    #[test]
    fn out_of_order_point_is_rejected() {
        let mut s = series(300.0, 60.0);
        s.append(10.0, 1.0).unwrap();
        let err = s.append(5.0, 2.0).unwrap_err();
        assert_eq!(
            err,
            SeriesError::OutOfOrder {
                timestamp: 5.0,
                newest: 10.0
            }
        );
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn visible_points_filter_to_window() {
        let mut s = series(10_000.0, 60.0);
        for t in [0.0, 20.0, 40.0, 55.0] {
            s.append(t, t).unwrap();
        }
        // window is now [30, 90]
        let visible: Vec<f64> = s.visible_points().iter().map(|p| p.0).collect();
        assert_eq!(visible, vec![40.0, 55.0]);
    }
}
