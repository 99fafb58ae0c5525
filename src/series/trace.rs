// SPDX-License-Identifier: MIT
use std::sync::Arc;

use super::SeriesError;

/// One complete sweep: frequency-ordered X values, amplitudes, and the
/// derived axis ranges. Built whole and never mutated afterwards.
#[derive(Clone, Debug)]
pub struct TraceSnapshot {
    xs: Vec<f64>,
    ys: Vec<f64>,
    x_range: (f64, f64),
    y_range: (f64, f64),
    peak_index: usize,
}

impl TraceSnapshot {
    /// # Errors
    ///
    /// Returns an error if the sweep is empty or `xs` and `ys` differ in length.
    pub fn new(xs: Vec<f64>, ys: Vec<f64>) -> Result<Self, SeriesError> {
        if xs.len() != ys.len() {
            return Err(SeriesError::LengthMismatch {
                xs: xs.len(),
                ys: ys.len(),
            });
        }
        let (Some(&first), Some(&last)) = (xs.first(), xs.last()) else {
            return Err(SeriesError::Empty);
        };

        let mut peak_index = 0;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for (i, &y) in ys.iter().enumerate() {
            if y.is_nan() {
                continue;
            }
            min = min.min(y);
            if y > max {
                max = y;
                peak_index = i;
            }
        }
        if min > max {
            // all NaN
            min = 0.0;
            max = 0.0;
        }

        Ok(Self {
            xs,
            ys,
            x_range: (first, last),
            y_range: (pad_min(min), pad_max(max)),
            peak_index,
        })
    }

    #[must_use]
    pub fn xs(&self) -> &[f64] {
        &self.xs
    }

    #[must_use]
    pub fn ys(&self) -> &[f64] {
        &self.ys
    }

    #[must_use]
    pub fn x_range(&self) -> (f64, f64) {
        self.x_range
    }

    #[must_use]
    pub fn y_range(&self) -> (f64, f64) {
        self.y_range
    }

    #[must_use]
    pub fn peak_index(&self) -> usize {
        self.peak_index
    }

    #[must_use]
    pub fn peak(&self) -> (f64, f64) {
        let i = self.peak_index();
        (self.xs[i], self.ys[i])
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.xs.len()
    }

    #[must_use]
    pub fn points(&self) -> Vec<(f64, f64)> {
        self.xs().iter().copied().zip(self.ys().iter().copied()).collect()
    }
}

// Headroom always points away from the data: the lower bound moves down,
// the upper bound moves up, whichever side of zero they sit on.
fn pad_min(min: f64) -> f64 {
    if min < 0.0 { 1.1 * min } else { 0.9 * min }
}

fn pad_max(max: f64) -> f64 {
    if max < 0.0 { 0.9 * max } else { 1.1 * max }
}

/// Holder for the latest sweep. Replacement swaps a fully built
/// [`TraceSnapshot`], so readers holding a snapshot never see a mix of
/// old and new data.
#[derive(Clone, Debug, Default)]
pub struct TraceSeries {
    current: Option<Arc<TraceSnapshot>>,
}

impl TraceSeries {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    ///
    /// Returns an error if the sweep is empty or lengths differ; the previous
    /// sweep is kept in that case.
    pub fn replace(&mut self, xs: Vec<f64>, ys: Vec<f64>) -> Result<(), SeriesError> {
        let snapshot = TraceSnapshot::new(xs, ys)?;
        self.current = Some(Arc::new(snapshot));
        Ok(())
    }

    #[must_use]
    pub fn snapshot(&self) -> Option<Arc<TraceSnapshot>> {
        self.current.clone()
    }
}
