// LogMeter - GPL-3.0-or-later
// This file is part of LogMeter.
//
// Copyright (C) 2026 Daniel Freiermuth
//
// LogMeter is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// LogMeter is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with LogMeter.  If not, see <https://www.gnu.org/licenses/>.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::clock::Clock;
use crate::error::Error;

/// Configuration of one monitored access log source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessLogConfig {
    /// The access log file to scan
    pub access_log: PathBuf,

    /// Apache `LogFormat` string describing the file's lines
    pub format: String,

    /// Window granularity in minutes
    #[serde(default = "default_window_minutes")]
    pub window_minutes: u32,

    /// Chunk size in bytes for the offset search and the window read
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Parse-error rate above which a window read fails
    #[serde(default = "default_errors_threshold")]
    pub parser_errors_threshold: f64,

    /// Replay historic time instead of the wall clock
    #[serde(default)]
    pub simulated_time: Option<SimulatedTimeConfig>,

    /// Optional server status page to poll
    #[serde(default)]
    pub status: Option<StatusConfig>,
}

/// Deterministic clock configuration: a start instant and a per-call step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatedTimeConfig {
    pub start: String,

    #[serde(default = "default_step_minutes")]
    pub step_minutes: i64,

    /// chrono format for `start`; may carry `%z`, otherwise local time
    #[serde(default = "default_time_format")]
    pub format: String,
}

/// Server status page endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusConfig {
    /// Machine-readable status URL, e.g. `http://localhost/server-status?auto`
    pub url: String,

    /// chrono format of the page's `CurrentTime`/`RestartTime` values
    #[serde(default = "default_date_format")]
    pub date_format: String,
}

const fn default_window_minutes() -> u32 {
    1
}

const fn default_chunk_size() -> usize {
    1024
}

const fn default_errors_threshold() -> f64 {
    0.2
}

const fn default_step_minutes() -> i64 {
    1
}

fn default_time_format() -> String {
    "%Y-%m-%d %H:%M:%S".to_string()
}

fn default_date_format() -> String {
    "%A, %d-%b-%Y %H:%M:%S %Z".to_string()
}

impl Default for AccessLogConfig {
    fn default() -> Self {
        AccessLogConfig {
            access_log: PathBuf::new(),
            format: String::new(),
            window_minutes: default_window_minutes(),
            chunk_size: default_chunk_size(),
            parser_errors_threshold: default_errors_threshold(),
            simulated_time: None,
            status: None,
        }
    }
}

impl AccessLogConfig {
    /// Load the configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self, Error> {
        log::info!("Loading config from {path:?}");
        let contents = std::fs::read_to_string(path)?;
        let config: AccessLogConfig = serde_json::from_str(&contents)
            .map_err(|e| Error::Configuration(format!("cannot parse {}: {e}", path.display())))?;
        Ok(config)
    }

    /// The clock selected by the configuration: simulated when a start
    /// instant is given, wall time otherwise.
    pub fn clock(&self) -> Result<Clock, Error> {
        match &self.simulated_time {
            Some(sim) => Clock::simulated(&sim.start, sim.step_minutes, &sim.format),
            None => Ok(Clock::Wall),
        }
    }
}
