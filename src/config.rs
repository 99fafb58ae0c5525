// SPDX-License-Identifier: MIT
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};

pub const DEFAULT_SETTINGS_FILE: &str = "settings.cfg";
pub const SIMULATION: &str = "Simulation";

const SECONDS_PER_MINUTE: f64 = 60.0;

/// Operator settings persisted as `key = value` lines.
///
/// Loading never fails: a missing or unreadable file, malformed lines,
/// unknown keys and unparsable values all fall back to the defaults.
#[derive(Clone, Debug, PartialEq)]
pub struct Settings {
    pub instrument: String,
    pub data_folder: PathBuf,
    pub start_hz: f64,
    pub stop_hz: f64,
    pub poll_interval_ms: u64,
    pub snapshot_interval_s: u64,
    pub retention_minutes: f64,
    pub display_minutes: f64,
    pub queue_capacity: usize,
    pub(crate) path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            instrument: SIMULATION.to_string(),
            data_folder: PathBuf::from("current_data"),
            start_hz: 9_920_000.0,
            stop_hz: 10_020_000.0,
            poll_interval_ms: 500,
            snapshot_interval_s: 60,
            retention_minutes: 300.0,
            display_minutes: 60.0,
            queue_capacity: 10,
            path: None,
        }
    }
}

impl Settings {
    /// Loads settings from `path`, keeping defaults for anything missing.
    #[must_use]
    pub fn load(path: &Path) -> Self {
        let mut settings = Self {
            path: Some(path.to_path_buf()),
            ..Self::default()
        };
        match std::fs::read_to_string(path) {
            Ok(text) => settings.apply(&text),
            Err(e) => log::info!("using default settings ({}: {e})", path.display()),
        }
        settings
    }

    fn apply(&mut self, text: &str) {
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            self.set(key.trim(), value.trim());
        }
    }

    /// Sets a single key from its textual form. Returns `false` when the key
    /// is unknown or the value does not parse; the old value is kept.
    pub fn set(&mut self, key: &str, value: &str) -> bool {
        match key {
            "instrument" => {
                self.instrument = value.to_string();
                true
            }
            "data_folder" => {
                self.data_folder = PathBuf::from(value);
                true
            }
            "start" => parse_into(value, &mut self.start_hz),
            "stop" => parse_into(value, &mut self.stop_hz),
            "poll_interval_ms" => parse_into(value, &mut self.poll_interval_ms),
            "snapshot_interval_s" => parse_into(value, &mut self.snapshot_interval_s),
            "retention_minutes" => parse_into(value, &mut self.retention_minutes),
            "display_minutes" => parse_into(value, &mut self.display_minutes),
            "queue_capacity" => parse_into(value, &mut self.queue_capacity),
            _ => false,
        }
    }

    #[must_use]
    pub fn to_file_string(&self) -> String {
        let entries: [(&str, String); 9] = [
            ("instrument", self.instrument.clone()),
            ("data_folder", self.data_folder.display().to_string()),
            ("start", self.start_hz.to_string()),
            ("stop", self.stop_hz.to_string()),
            ("poll_interval_ms", self.poll_interval_ms.to_string()),
            ("snapshot_interval_s", self.snapshot_interval_s.to_string()),
            ("retention_minutes", self.retention_minutes.to_string()),
            ("display_minutes", self.display_minutes.to_string()),
            ("queue_capacity", self.queue_capacity.to_string()),
        ];
        entries
            .iter()
            .map(|(key, value)| format!("{key} = {value}\n"))
            .collect()
    }

    /// Writes the settings back to the file they were loaded from.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self) -> Result<()> {
        let path = self
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_FILE));
        std::fs::write(&path, self.to_file_string())
            .with_context(|| format!("failed to write settings file: {}", path.display()))
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    #[must_use]
    pub fn snapshot_interval(&self) -> Duration {
        Duration::from_secs(self.snapshot_interval_s)
    }

    #[must_use]
    pub fn retention_secs(&self) -> f64 {
        self.retention_minutes * SECONDS_PER_MINUTE
    }

    #[must_use]
    pub fn display_secs(&self) -> f64 {
        self.display_minutes * SECONDS_PER_MINUTE
    }
}

fn parse_into<T: std::str::FromStr>(value: &str, slot: &mut T) -> bool {
    match value.parse() {
        Ok(parsed) => {
            *slot = parsed;
            true
        }
        Err(_) => false,
    }
}
