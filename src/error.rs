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

//! Error kinds surfaced by the library.
//!
//! "No data in the window" is not an error anywhere in this crate; it is an
//! empty result. The variants here cover the conditions a caller must react
//! to: a broken configuration, a log format that no longer matches the file,
//! and plain I/O or HTTP failures.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The declared log format or the configuration file is unusable.
    /// Raised during setup, before any scan runs.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The parse-error rate of a window scan exceeded the configured
    /// threshold. This signals a format mismatch or a corrupt file, not a
    /// quiet gap, so it is never retried automatically.
    #[error(
        "too many errors ({errors} of {attempted} lines, {:.2}%) when parsing log entries of {}; check the log format",
        percentage(*errors, *attempted),
        path.display()
    )]
    TooManyParseErrors {
        errors: usize,
        attempted: usize,
        path: PathBuf,
    },

    /// The server status page could not be parsed into a snapshot.
    #[error("cannot parse the server status page: {0}")]
    StatusPage(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

fn percentage(errors: usize, attempted: usize) -> f64 {
    if attempted == 0 {
        return 0.0;
    }
    errors as f64 / attempted as f64 * 100.0
}
