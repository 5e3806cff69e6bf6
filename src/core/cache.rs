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

//! Per-key cache of the last computed window.
//!
//! A cache entry is valid for as long as "now" stays inside the window it
//! was computed for, which bounds the scan rate to one per key per window
//! advance no matter how often statistics are requested.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use chrono::{DateTime, Local};

use crate::core::window::TimeWindow;
use crate::error::Error;
use crate::parser::record::LogRecord;

/// The last computed result for one key. `records == None` is the Empty
/// outcome: the scan ran and found nothing for the window. That is distinct
/// from having no entry at all.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub window: TimeWindow,
    pub records: Option<Vec<LogRecord>>,
    pub computed_at: Option<DateTime<Local>>,
}

impl CacheEntry {
    pub const fn is_empty(&self) -> bool {
        self.records.is_none()
    }
}

/// Owned map from logical key to its cached window result. One instance per
/// monitored log source; entries are only ever overwritten whole.
#[derive(Debug, Default)]
pub struct WindowCache {
    entries: HashMap<String, CacheEntry>,
}

impl WindowCache {
    pub fn new() -> Self {
        WindowCache {
            entries: HashMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    /// Return the entry for `key`, scanning first if time has moved past the
    /// cached window (or nothing is cached yet). The boolean reports whether
    /// a scan ran.
    ///
    /// `scan` receives the window to cover and returns its records, `None`
    /// when the window holds no data. If it fails, the previous entry is
    /// left untouched; stale data beats discarding valid results.
    pub fn refresh<F>(
        &mut self,
        key: &str,
        now: DateTime<Local>,
        granularity_minutes: u32,
        scan: F,
    ) -> Result<(&CacheEntry, bool), Error>
    where
        F: FnOnce(&TimeWindow) -> Result<Option<Vec<LogRecord>>, Error>,
    {
        let window = TimeWindow::ending_at(now, granularity_minutes);

        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                // Stale once "now" rounds to a different window than the one
                // the entry was computed for
                if occupied.get().window != window {
                    let records = scan(&window)?;
                    *occupied.get_mut() = entry_for(window, records, now);
                    Ok((occupied.into_mut(), true))
                } else {
                    Ok((occupied.into_mut(), false))
                }
            }
            Entry::Vacant(vacant) => {
                let records = scan(&window)?;
                Ok((vacant.insert(entry_for(window, records, now)), true))
            }
        }
    }
}

fn entry_for(
    window: TimeWindow,
    records: Option<Vec<LogRecord>>,
    now: DateTime<Local>,
) -> CacheEntry {
    let computed_at = records.is_some().then_some(now);
    CacheEntry {
        window,
        records,
        computed_at,
    }
}
