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

//! Reader for the web server's machine-readable status page
//! (`/server-status?auto`): typed key/value fields plus a per-state tally of
//! the worker scoreboard.

use chrono::{DateTime, Local, TimeZone};
use indexmap::IndexMap;

use crate::config::StatusConfig;
use crate::error::Error;
use crate::parser::record::FieldValue;

/// Worker states as they appear in the scoreboard string.
const SCOREBOARD_MEANINGS: &[(char, &str)] = &[
    ('_', "waiting_connection"),
    ('S', "starting_up"),
    ('R', "reading_request"),
    ('W', "sending_reply"),
    ('K', "keepalive_read"),
    ('D', "dns_lookup"),
    ('C', "closing_connection"),
    ('L', "logging"),
    ('G', "gracefully_finishing"),
    ('I', "idle_cleanup"),
    ('.', "open_slot"),
];

/// One parsed status page.
pub type StatusSnapshot = IndexMap<String, FieldValue>;

/// Fetches and parses the status page, keeping the last good snapshot.
pub struct StatusClient {
    config: StatusConfig,
    client: reqwest::blocking::Client,
    snapshot: Option<StatusSnapshot>,
}

impl StatusClient {
    pub fn new(config: StatusConfig) -> Self {
        StatusClient {
            config,
            client: reqwest::blocking::Client::new(),
            snapshot: None,
        }
    }

    /// Fetch the page and return a fresh snapshot with `name` attached. On
    /// failure the previous snapshot stays cached; the error propagates.
    pub fn get(&mut self, name: &str) -> Result<&StatusSnapshot, Error> {
        let body = self
            .client
            .get(&self.config.url)
            .send()?
            .error_for_status()?
            .text()?;
        let mut snapshot = parse_status_page(&body, &self.config.date_format)?;
        snapshot.insert("name".to_string(), FieldValue::Str(name.to_string()));
        self.snapshot = Some(snapshot);
        // Just assigned, so always present
        self.snapshot
            .as_ref()
            .ok_or_else(|| Error::StatusPage("snapshot vanished".to_string()))
    }

    /// The most recent successfully parsed snapshot, if any.
    pub const fn last(&self) -> Option<&StatusSnapshot> {
        self.snapshot.as_ref()
    }
}

/// Parse the `key: value` lines of a machine-readable status page. The
/// `Scoreboard` line becomes one `sb_*` counter per worker state.
pub fn parse_status_page(content: &str, date_format: &str) -> Result<StatusSnapshot, Error> {
    let mut snapshot = StatusSnapshot::new();

    for line in content.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim().replace(' ', "_");
        let value = value.trim();

        if key == "Scoreboard" {
            tally_scoreboard(value, &mut snapshot);
        } else {
            snapshot.insert(key.clone(), convert_field(&key, value, date_format));
        }
    }

    if !snapshot.contains_key("ServerVersion") {
        return Err(Error::StatusPage(
            "the property ServerVersion cannot be found".to_string(),
        ));
    }

    if let (Some(version), Some(uptime)) =
        (snapshot.get("ServerVersion"), snapshot.get("ServerUptime"))
    {
        log::debug!("Server status parsed. ServerVersion={version}, ServerUptime={uptime}");
    }

    Ok(snapshot)
}

fn tally_scoreboard(scoreboard: &str, snapshot: &mut StatusSnapshot) {
    for c in scoreboard.chars() {
        let meaning = SCOREBOARD_MEANINGS
            .iter()
            .find(|(ch, _)| *ch == c)
            .map_or("unknown", |(_, m)| m);
        let key = format!("sb_{meaning}");
        let count = snapshot
            .get(&key)
            .and_then(FieldValue::as_f64)
            .map_or(0, |n| n as i64);
        snapshot.insert(key, FieldValue::Int(count + 1));
    }
}

/// Typed conversion per well-known field name; everything else falls back to
/// float-if-possible, string otherwise.
fn convert_field(key: &str, value: &str, date_format: &str) -> FieldValue {
    const INT_FIELDS: &[&str] = &[
        "BusyWorkers",
        "CacheCurrentEntries",
        "CacheDiscardCount",
        "CacheExpireCount",
        "CacheIndexesPerSubcaches",
        "CacheRemoveHitCount",
        "CacheRemoveMissCount",
        "CacheReplaceCount",
        "CacheRetrieveHitCount",
        "CacheRetrieveMissCount",
        "CacheSharedMemory",
        "CacheStoreCount",
        "CacheSubcaches",
        "ConnsAsyncClosing",
        "ConnsAsyncKeepAlive",
        "ConnsAsyncWriting",
        "ConnsTotal",
        "IdleWorkers",
        "ParentServerConfigGeneration",
        "ParentServerMPMGeneration",
        "Processes",
        "ServerUptimeSeconds",
        "Stopping",
        "Total_Accesses",
        "Total_Duration",
        "Total_kBytes",
        "Uptime",
    ];
    const FLOAT_FIELDS: &[&str] = &[
        "BytesPerReq",
        "BytesPerSec",
        "CPUChildrenSystem",
        "CPUChildrenUser",
        "CPULoad",
        "CPUSystem",
        "CPUUser",
        "DurationPerReq",
        "Load1",
        "Load15",
        "Load5",
        "ReqPerSec",
    ];
    const STR_FIELDS: &[&str] = &[
        "CacheIndexUsage",
        "CacheType",
        "CacheUsage",
        "ServerMPM",
        "ServerUptime",
        "ServerVersion",
        "Server_Built",
    ];

    if INT_FIELDS.contains(&key) {
        if let Ok(n) = value.parse::<i64>() {
            return FieldValue::Int(n);
        }
    } else if FLOAT_FIELDS.contains(&key) {
        if let Ok(f) = value.parse::<f64>() {
            return FieldValue::Float(f);
        }
    } else if STR_FIELDS.contains(&key) {
        return FieldValue::Str(value.to_string());
    } else if key == "CurrentTime" || key == "RestartTime" {
        if let Some(ts) = parse_status_time(value, date_format) {
            return FieldValue::Time(ts);
        }
    } else if let Ok(f) = value.parse::<f64>() {
        // Unknown numeric-looking fields become floats
        return FieldValue::Float(f);
    }
    FieldValue::Str(value.to_string())
}

/// Status timestamps carry a timezone *name* (`%Z`), which chrono can skip
/// but not resolve; the instant is read as local time without it.
fn parse_status_time(value: &str, date_format: &str) -> Option<DateTime<Local>> {
    if let Ok(dt) = DateTime::parse_from_str(value, date_format) {
        return Some(dt.with_timezone(&Local));
    }
    let stripped_format = date_format.trim_end_matches(" %Z");
    let stripped_value = value.rsplit_once(' ').map_or(value, |(head, _)| head);
    chrono::NaiveDateTime::parse_from_str(stripped_value, stripped_format)
        .ok()
        .and_then(|naive| Local.from_local_datetime(&naive).single())
}
