// SPDX-License-Identifier: MIT
use std::collections::VecDeque;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::transport::{Transport, TransportError};

const IDN: &str = "qcmon,Simulated DSA815,SIM000001,00.01.19";
const DEFAULT_POINTS: usize = 601;
const RESONANCE_HZ: f64 = 9_970_000.0;
/// Resonance drift, as a crystal loading up.
const DRIFT_HZ_PER_S: f64 = -0.05;
const HALF_WIDTH_HZ: f64 = 2_500.0;
const NOISE_FLOOR_DB: f64 = -80.0;
const PEAK_DB: f64 = 55.0;
/// Narrowest span kept when one bound is pushed past the other.
const MIN_SPAN_HZ: f64 = 100.0;
const MAX_POINTS: f64 = 10_001.0;

/// A stand-in for a spectrum analyser with tracking generator: answers
/// the SCPI subset qcmon uses with a drifting Lorentzian resonance.
pub struct SimulatedAnalyser {
    pending: VecDeque<String>,
    start_hz: f64,
    stop_hz: f64,
    points: usize,
    started: Instant,
    rng: StdRng,
}

impl SimulatedAnalyser {
    #[must_use]
    pub fn new() -> Self {
        Self::with_seed(rand::random())
    }

    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            pending: VecDeque::new(),
            start_hz: 9_920_000.0,
            stop_hz: 10_020_000.0,
            points: DEFAULT_POINTS,
            started: Instant::now(),
            rng,
        }
    }

    fn resonance(&mut self) -> f64 {
        let drift = self.started.elapsed().as_secs_f64() * DRIFT_HZ_PER_S;
        let jitter = self.rng.gen_range(-1.5..1.5);
        (RESONANCE_HZ + drift + jitter)
            .max(self.start_hz)
            .min(self.stop_hz)
    }

    fn trace_block(&mut self) -> String {
        let centre = self.resonance();
        let axis = linspace_points(self.start_hz, self.stop_hz, self.points);
        let mut body = String::with_capacity(self.points * 14);
        for (i, f) in axis.enumerate() {
            let detuning = (f - centre) / HALF_WIDTH_HZ;
            let level = NOISE_FLOOR_DB
                + PEAK_DB / (1.0 + detuning * detuning)
                + self.rng.gen_range(-0.3..0.3);
            if i > 0 {
                body.push_str(", ");
            }
            body.push_str(&format!("{level:.6e}"));
        }
        format!("#9{:09}{body}", body.len())
    }

    fn answer(&mut self, query: &str) -> Option<String> {
        match normalise(query).as_str() {
            "*IDN?" => Some(IDN.to_string()),
            ":SENSE:SWEEP:POINTS?" | "SENS:SWE:POIN?" => Some(self.points.to_string()),
            "SENS:FREQ:START?" => Some(self.start_hz.to_string()),
            "SENS:FREQ:STOP?" => Some(self.stop_hz.to_string()),
            "CALC:MARK1:X?" | "CALC:MARK:FCOUNT:X?" => Some(format!("{:.1}", self.resonance())),
            "TRAC:DATA? TRACE1" => Some(self.trace_block()),
            _ => None,
        }
    }

    fn apply(&mut self, command: &str) {
        let normalised = normalise(command);
        let mut parts = normalised.splitn(2, ' ');
        let header = parts.next().unwrap_or_default().trim_start_matches(':');
        let value = parts
            .next()
            .and_then(parse_frequency)
            .filter(|v| v.is_finite());
        // like the real analyser, a bound pushed past the other drags it along
        match (header, value) {
            ("SENS:FREQ:START", Some(hz)) => {
                self.start_hz = hz;
                if self.stop_hz < hz + MIN_SPAN_HZ {
                    self.stop_hz = hz + MIN_SPAN_HZ;
                }
            }
            ("SENS:FREQ:STOP", Some(hz)) => {
                self.stop_hz = hz;
                if self.start_hz > hz - MIN_SPAN_HZ {
                    self.start_hz = hz - MIN_SPAN_HZ;
                }
            }
            ("SENS:SWE:POIN", Some(n)) if (2.0..=MAX_POINTS).contains(&n) => {
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let n = n as usize;
                self.points = n;
            }
            ("*RST", _) => {
                self.points = DEFAULT_POINTS;
            }
            _ => {}
        }
    }
}

impl Default for SimulatedAnalyser {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for SimulatedAnalyser {
    fn write(&mut self, command: &str) -> Result<(), TransportError> {
        for command in command.split(';').map(str::trim).filter(|c| !c.is_empty()) {
            if command.contains('?') {
                if let Some(reply) = self.answer(command) {
                    self.pending.push_back(reply);
                }
            } else {
                self.apply(command);
            }
        }
        Ok(())
    }

    fn read(&mut self) -> Result<String, TransportError> {
        self.pending
            .pop_front()
            .ok_or(TransportError::Timeout(Duration::ZERO))
    }
}

fn normalise(command: &str) -> String {
    command.trim().to_ascii_uppercase()
}

/// Parses `9920000`, `9.92e6` or `9.92MHZ`.
fn parse_frequency(value: &str) -> Option<f64> {
    let value = value.trim();
    let (number, scale) = [("GHZ", 1e9), ("MHZ", 1e6), ("KHZ", 1e3), ("HZ", 1.0)]
        .iter()
        .find_map(|(suffix, scale)| value.strip_suffix(suffix).map(|n| (n, *scale)))
        .unwrap_or((value, 1.0));
    number.trim().parse::<f64>().ok().map(|n| n * scale)
}

fn linspace_points(start: f64, stop: f64, points: usize) -> impl Iterator<Item = f64> {
    #[allow(clippy::cast_precision_loss)]
    let step = if points > 1 {
        (stop - start) / (points - 1) as f64
    } else {
        0.0
    };
    #[allow(clippy::cast_precision_loss)]
    (0..points).map(move |i| start + step * i as f64)
}
