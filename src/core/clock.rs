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

//! Wall-clock and simulated time sources.

use chrono::{DateTime, Duration, Local, NaiveDateTime, TimeZone};

use crate::error::Error;

/// Supplies "now" to the window computation. The simulated variant replays a
/// deterministic sequence: the configured start on the first call, then one
/// step further on every later call. Used to sweep historic log files in
/// tests and backfills.
#[derive(Debug, Clone)]
pub enum Clock {
    Wall,
    Simulated {
        next: DateTime<Local>,
        step: Duration,
    },
}

impl Clock {
    /// Simulated clock from a start string, per-call step in minutes and a
    /// chrono format string. The format may carry `%z`; otherwise the start
    /// is read as local time.
    pub fn simulated(start: &str, step_minutes: i64, format: &str) -> Result<Clock, Error> {
        let next = parse_start(start, format)?;
        Ok(Clock::Simulated {
            next,
            step: Duration::minutes(step_minutes),
        })
    }

    pub fn now(&mut self) -> DateTime<Local> {
        match self {
            Clock::Wall => Local::now(),
            Clock::Simulated { next, step } => {
                let current = *next;
                *next = current + *step;
                current
            }
        }
    }
}

fn parse_start(start: &str, format: &str) -> Result<DateTime<Local>, Error> {
    if let Ok(dt) = DateTime::parse_from_str(start, format) {
        return Ok(dt.with_timezone(&Local));
    }
    let naive = NaiveDateTime::parse_from_str(start, format).map_err(|e| {
        Error::Configuration(format!(
            "simulated time start {start:?} does not match format {format:?}: {e}"
        ))
    })?;
    Local.from_local_datetime(&naive).single().ok_or_else(|| {
        Error::Configuration(format!(
            "simulated time start {start:?} is ambiguous in the local timezone"
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_simulated_clock_advances_by_step() {
        let mut clock =
            Clock::simulated("2024-01-01 00:00:00", 1, "%Y-%m-%d %H:%M:%S").unwrap();
        let a = clock.now();
        let b = clock.now();
        let c = clock.now();
        assert_eq!((a.hour(), a.minute(), a.second()), (0, 0, 0));
        assert_eq!((b.hour(), b.minute(), b.second()), (0, 1, 0));
        assert_eq!((c.hour(), c.minute(), c.second()), (0, 2, 0));
    }

    #[test]
    fn test_simulated_clock_with_offset_format() {
        let mut clock =
            Clock::simulated("2024-01-01 10:06:00 +0000", 5, "%Y-%m-%d %H:%M:%S %z").unwrap();
        let first = clock.now().with_timezone(&chrono::Utc);
        assert_eq!((first.hour(), first.minute()), (10, 6));
        let second = clock.now().with_timezone(&chrono::Utc);
        assert_eq!((second.hour(), second.minute()), (10, 11));
    }

    #[test]
    fn test_bad_start_is_configuration_error() {
        let err = Clock::simulated("last tuesday", 1, "%Y-%m-%d %H:%M:%S").unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_wall_clock_moves_forward() {
        let mut clock = Clock::Wall;
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
