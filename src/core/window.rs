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

//! Time windows aligned to a minute granularity.

use chrono::{DateTime, Duration, Local, Timelike};

/// A half-open time interval `[time_from, time_to)` bounding which log
/// entries belong to one statistics computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub time_from: DateTime<Local>,
    pub time_to: DateTime<Local>,
}

impl TimeWindow {
    /// The window ending at `now` rounded down to `minutes` granularity and
    /// spanning one granularity step backwards.
    pub fn ending_at(now: DateTime<Local>, minutes: u32) -> TimeWindow {
        let time_to = round_down_minutes(now, minutes);
        let time_from = round_down_minutes(now - Duration::minutes(i64::from(minutes)), minutes);
        TimeWindow { time_from, time_to }
    }

    pub fn contains(&self, ts: DateTime<Local>) -> bool {
        self.time_from <= ts && ts < self.time_to
    }
}

impl std::fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}, {})",
            self.time_from.format("%Y-%m-%d %H:%M:%S"),
            self.time_to.format("%Y-%m-%d %H:%M:%S")
        )
    }
}

/// Round a timestamp down to a multiple of `minutes` within its hour,
/// zeroing seconds and sub-seconds. A granularity of 0 is treated as 1.
pub fn round_down_minutes(time: DateTime<Local>, minutes: u32) -> DateTime<Local> {
    let minutes = minutes.max(1);
    let rounded = (time.minute() / minutes) * minutes;
    time.with_minute(rounded)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        // with_minute only fails for out-of-range values; rounded < 60 here
        .unwrap_or(time)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn local(h: u32, m: u32, s: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 1, 1, h, m, s).unwrap()
    }

    #[test]
    fn test_round_down_one_minute() {
        assert_eq!(round_down_minutes(local(10, 6, 42), 1), local(10, 6, 0));
    }

    #[test]
    fn test_round_down_five_minutes() {
        assert_eq!(round_down_minutes(local(10, 7, 13), 5), local(10, 5, 0));
        assert_eq!(round_down_minutes(local(10, 5, 0), 5), local(10, 5, 0));
    }

    #[test]
    fn test_window_ending_at() {
        let w = TimeWindow::ending_at(local(10, 6, 0), 1);
        assert_eq!(w.time_from, local(10, 5, 0));
        assert_eq!(w.time_to, local(10, 6, 0));
    }

    #[test]
    fn test_window_is_half_open() {
        let w = TimeWindow::ending_at(local(10, 6, 0), 1);
        assert!(w.contains(local(10, 5, 0)));
        assert!(w.contains(local(10, 5, 59)));
        assert!(!w.contains(local(10, 6, 0)));
        assert!(!w.contains(local(10, 4, 59)));
    }
}
