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

//! Windowed web-server log statistics without full scans.
//!
//! LogMeter binary-searches an access log for the byte range of a recurring
//! time window, streams the records out of that range and computes grouped
//! statistics over them on demand. The log file is only ever read in bounded
//! chunks; it is never rewritten, re-sorted or buffered in full.

pub mod config;
pub mod core;
pub mod error;
pub mod parser;
pub mod provider;
pub mod status;

pub use config::AccessLogConfig;
pub use error::Error;
pub use provider::AccessLogProvider;
