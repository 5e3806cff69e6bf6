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

//! Binary search for the byte offset where a time window starts.
//!
//! The search probes the file with bounded chunk reads and never scans it
//! whole. It assumes timestamps are monotonically non-decreasing in byte
//! order; the result is undefined if the file violates that.

use std::fs::File;
use std::io::{Seek, SeekFrom};

use chrono::{DateTime, Local};

use crate::core::reader::read_at_most;
use crate::error::Error;
use crate::parser::record::LogRecord;

/// Upper bound on probe iterations. log2 of any real file size is far below
/// this; exhaustion means the file has no usable interior lines.
const MAX_PROBES: usize = 64;

/// What one probe chunk revealed about the search target.
struct Probe {
    /// Byte offset of the first parsed line with `ts >= time_from`
    after: Option<u64>,
    /// Byte offset of the first parsed line with `ts < time_from`
    before: Option<u64>,
}

/// Find the byte offset of the first log line whose timestamp reaches
/// `time_from`. `Ok(None)` means no such line exists (no data yet); it is
/// not an error.
///
/// At each probe position a chunk of up to `chunk_size` bytes is read and
/// split into lines. The first line is discarded as likely truncated, except
/// at offset 0 where it is complete by construction; the last line is
/// discarded unless the chunk reaches end of file. Interior lines that fail
/// to parse are skipped. Lines longer than `chunk_size` are never seen whole
/// and make the search degrade to `Ok(None)`.
pub fn locate_start<F>(
    file: &mut File,
    file_size: u64,
    parse: &F,
    time_from: DateTime<Local>,
    chunk_size: usize,
) -> Result<Option<u64>, Error>
where
    F: Fn(&str) -> Option<LogRecord>,
{
    if file_size == 0 || chunk_size == 0 {
        return Ok(None);
    }

    let mut start = 0u64;
    let mut end = file_size;
    let mut buf = vec![0u8; chunk_size];

    for _ in 0..MAX_PROBES {
        if end <= start {
            return Ok(None);
        }
        let pos = start + (end - start) / 2;
        let want = chunk_size.min((file_size - pos) as usize);

        file.seek(SeekFrom::Start(pos))?;
        let got = read_at_most(file, &mut buf[..want])?;
        // A shorter read than the queried size means the file shrank under
        // us; the probe still works on what is there.
        let reached_eof = pos + got as u64 >= file_size || got < want;

        let probe = probe_chunk(&buf[..got], pos, reached_eof, parse, time_from);

        match (probe.after, probe.before) {
            // Both relations in one chunk: the boundary is right here.
            (Some(after), Some(_)) => return Ok(Some(after)),
            (Some(after), None) => {
                if pos == 0 {
                    // Nothing can precede the file start.
                    return Ok(Some(after));
                }
                end = pos;
            }
            (None, Some(_)) => {
                if reached_eof {
                    // Every line up to EOF is still before the window.
                    return Ok(None);
                }
                start = pos;
            }
            // No parseable interior lines: try closer to the front.
            (None, None) => end = pos,
        }
    }

    log::warn!("Offset search did not converge after {MAX_PROBES} probes; treating as no data");
    Ok(None)
}

fn probe_chunk<F>(
    chunk: &[u8],
    chunk_pos: u64,
    reached_eof: bool,
    parse: &F,
    time_from: DateTime<Local>,
) -> Probe
where
    F: Fn(&str) -> Option<LogRecord>,
{
    let mut pieces: Vec<(u64, &[u8])> = Vec::new();
    let mut offset = chunk_pos;
    for piece in chunk.split(|&b| b == b'\n') {
        pieces.push((offset, piece));
        offset += piece.len() as u64 + 1;
    }

    let skip_first = usize::from(chunk_pos != 0);
    let keep_until = if reached_eof {
        pieces.len()
    } else {
        pieces.len().saturating_sub(1)
    };
    let interior = pieces.get(skip_first..keep_until).unwrap_or(&[]);

    let mut probe = Probe {
        after: None,
        before: None,
    };
    for (line_offset, piece) in interior {
        if piece.is_empty() {
            continue;
        }
        let line = String::from_utf8_lossy(piece);
        let Some(ts) = parse(&line).and_then(|r| r.time_received()) else {
            continue;
        };
        if ts >= time_from {
            probe.after.get_or_insert(*line_offset);
        } else {
            probe.before.get_or_insert(*line_offset);
        }
        if probe.after.is_some() && probe.before.is_some() {
            break;
        }
    }
    probe
}
