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

//! The access-log performance provider: wires clock, locator, reader, cache
//! and aggregation behind one per-source façade.

use std::fs::File;

use crate::config::AccessLogConfig;
use crate::core::aggregate::{aggregate, AggregationSpec, StatRow};
use crate::core::cache::WindowCache;
use crate::core::clock::Clock;
use crate::core::locator::locate_start;
use crate::core::reader::read_window;
use crate::error::Error;
use crate::parser::{coerce_records, LineParser};

/// Reads performance data from a web server access log, one time window at a
/// time. Holds the compiled line parser, the clock and the per-key window
/// cache; `&mut self` serializes scans per provider.
#[derive(Debug)]
pub struct AccessLogProvider {
    config: AccessLogConfig,
    parser: LineParser,
    clock: Clock,
    cache: WindowCache,
}

impl AccessLogProvider {
    /// Compile the configured log format and validate it before any scan:
    /// the format must yield a timestamp (`%t`) and a response time
    /// (`%D` or `%T`).
    pub fn new(config: AccessLogConfig) -> Result<Self, Error> {
        let parser = LineParser::new(&config.format)?;

        let names = parser.names();
        if !names.iter().any(|n| n == "time_received") {
            return Err(Error::Configuration(
                "the specified log format does not contain a time field (%t)".to_string(),
            ));
        }
        if !names.iter().any(|n| n == "time_s" || n == "time_us") {
            return Err(Error::Configuration(
                "the specified log format does not contain a response time field (%D or %T)"
                    .to_string(),
            ));
        }

        let clock = config.clock()?;
        Ok(AccessLogProvider {
            config,
            parser,
            clock,
            cache: WindowCache::new(),
        })
    }

    /// The monitored file.
    pub fn source(&self) -> &std::path::Path {
        &self.config.access_log
    }

    /// Refresh the cached window for `key` if time has advanced past it.
    /// Returns whether a scan ran. On failure the cached entry, if any, is
    /// left untouched.
    pub fn update(&mut self, key: &str) -> Result<bool, Error> {
        let now = self.clock.now();
        let config = &self.config;
        let parser = &self.parser;

        let (entry, scanned) =
            self.cache
                .refresh(key, now, config.window_minutes, |window| {
                    log::debug!(
                        "Scanning {} for window {window}",
                        config.access_log.display()
                    );

                    // The handle is dropped on every path out of this scope
                    let mut file = File::open(&config.access_log)?;
                    let file_size = file.metadata()?.len();

                    let parse = |line: &str| parser.parse(line);
                    let Some(offset) = locate_start(
                        &mut file,
                        file_size,
                        &parse,
                        window.time_from,
                        config.chunk_size,
                    )?
                    else {
                        return Ok(None);
                    };

                    let records = read_window(
                        &mut file,
                        &parse,
                        offset,
                        window.time_to,
                        config.chunk_size,
                        config.parser_errors_threshold,
                        &config.access_log,
                    )?;
                    let records = coerce_records(records);
                    if records.is_empty() {
                        return Ok(None);
                    }
                    Ok(Some(records))
                })?;

        if scanned {
            log::info!(
                "Window {} for key {key:?}: {} records",
                entry.window,
                entry.records.as_ref().map_or(0, Vec::len)
            );
        }
        Ok(scanned)
    }

    /// Compute statistics for `key` over its current window, refreshing the
    /// cache first. An empty window yields an empty row set; a format
    /// mismatch or I/O failure is an error.
    pub fn stats(&mut self, key: &str, spec: &AggregationSpec) -> Result<Vec<StatRow>, Error> {
        self.update(key)?;
        let Some(entry) = self.cache.get(key) else {
            return Ok(Vec::new());
        };
        let Some(records) = entry.records.as_ref() else {
            return Ok(Vec::new());
        };
        Ok(aggregate(key, records, &entry.window, spec))
    }
}
