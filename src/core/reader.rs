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

//! Sequential chunked scan of a window's byte range.
//!
//! Reads fixed-size chunks from a start offset, reassembles lines across
//! chunk boundaries and parses them until the window's upper bound or end of
//! file. An error-rate circuit breaker fails the whole read when the log
//! format evidently does not match the file.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use chrono::{DateTime, Local};

use crate::error::Error;
use crate::parser::record::LogRecord;

/// Scan state carried across chunk boundaries.
///
/// Terminal once a parsed line reaches the window end; the caller stops
/// feeding chunks at end of file.
struct ChunkScan {
    /// Partial line held back from the previous chunk
    carried: Vec<u8>,
    records: Vec<LogRecord>,
    errors: usize,
    attempted: usize,
    bytes_consumed: u64,
    done: bool,
}

impl ChunkScan {
    const fn new() -> Self {
        ChunkScan {
            carried: Vec::new(),
            records: Vec::new(),
            errors: 0,
            attempted: 0,
            bytes_consumed: 0,
            done: false,
        }
    }

    /// Consume one chunk. `is_last` marks a short read, i.e. end of file:
    /// its final line is parsed directly instead of being held back.
    fn advance<F>(&mut self, chunk: &[u8], is_last: bool, parse: &F, time_to: DateTime<Local>)
    where
        F: Fn(&str) -> Option<LogRecord>,
    {
        self.bytes_consumed += chunk.len() as u64;

        // The held-back partial line continues into this chunk
        let buffered: Vec<u8>;
        let data: &[u8] = if self.carried.is_empty() {
            chunk
        } else {
            let mut whole = std::mem::take(&mut self.carried);
            whole.extend_from_slice(chunk);
            buffered = whole;
            &buffered
        };

        let ends_complete = chunk.last() == Some(&b'\n');
        let mut pieces: Vec<&[u8]> = data.split(|&b| b == b'\n').collect();
        let hold_back = !is_last && !ends_complete;
        let tail = if hold_back { pieces.pop() } else { None };

        for piece in &pieces {
            if piece.is_empty() {
                continue;
            }
            let line = String::from_utf8_lossy(piece);
            self.attempted += 1;
            let Some(record) = parse(&line) else {
                self.errors += 1;
                continue;
            };
            match record.time_received() {
                Some(ts) if ts < time_to => self.records.push(record),
                Some(_) => {
                    // Window end reached; the rest of the chunk is beyond it.
                    self.done = true;
                    return;
                }
                // A record without a timestamp counts as a parse failure
                None => self.errors += 1,
            }
        }

        self.carried = tail.map(<[u8]>::to_vec).unwrap_or_default();
    }
}

/// Read all records in `[start_offset, first line at or past time_to)`.
///
/// Individual parse failures are skipped and counted; the read fails as a
/// whole with [`Error::TooManyParseErrors`] when their rate over all
/// attempted lines exceeds `error_threshold`. A short final chunk is end of
/// file, which tolerates the log growing while we scan.
pub fn read_window<F>(
    file: &mut File,
    parse: &F,
    start_offset: u64,
    time_to: DateTime<Local>,
    chunk_size: usize,
    error_threshold: f64,
    path: &Path,
) -> Result<Vec<LogRecord>, Error>
where
    F: Fn(&str) -> Option<LogRecord>,
{
    file.seek(SeekFrom::Start(start_offset))?;

    let mut scan = ChunkScan::new();
    let mut buf = vec![0u8; chunk_size.max(1)];

    loop {
        let got = read_at_most(file, &mut buf)?;
        let is_last = got < buf.len();
        scan.advance(&buf[..got], is_last, parse, time_to);
        if scan.done || is_last {
            break;
        }
    }

    log::debug!(
        "Window read from offset {start_offset}: {} records, {} of {} lines failed, {} bytes",
        scan.records.len(),
        scan.errors,
        scan.attempted,
        scan.bytes_consumed
    );

    if scan.attempted > 0 && scan.errors as f64 / scan.attempted as f64 > error_threshold {
        return Err(Error::TooManyParseErrors {
            errors: scan.errors,
            attempted: scan.attempted,
            path: path.to_path_buf(),
        });
    }

    Ok(scan.records)
}

/// Fill `buf` as far as the file allows; a short count means end of file.
pub(crate) fn read_at_most(file: &mut File, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = file.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::LineParser;
    use chrono::TimeZone;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const FORMAT: &str = "%h %l %u %t \"%r\" %>s %b";

    fn line(minute: u32, second: u32) -> String {
        format!(
            "10.0.0.1 - - [01/Jan/2024:10:{minute:02}:{second:02} +0000] \"GET / HTTP/1.1\" 200 512"
        )
    }

    fn utc_local(h: u32, m: u32, s: u32) -> DateTime<Local> {
        chrono::Utc
            .with_ymd_and_hms(2024, 1, 1, h, m, s)
            .unwrap()
            .with_timezone(&Local)
    }

    fn write_file(lines: &[String], trailing_newline: bool) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        let body = lines.join("\n");
        file.write_all(body.as_bytes()).unwrap();
        if trailing_newline {
            file.write_all(b"\n").unwrap();
        }
        file.flush().unwrap();
        file
    }

    fn read_all(
        file: &NamedTempFile,
        offset: u64,
        time_to: DateTime<Local>,
        chunk_size: usize,
        threshold: f64,
    ) -> Result<Vec<LogRecord>, Error> {
        let parser = LineParser::new(FORMAT).unwrap();
        let mut f = File::open(file.path()).unwrap();
        read_window(
            &mut f,
            &|l: &str| parser.parse(l),
            offset,
            time_to,
            chunk_size,
            threshold,
            file.path(),
        )
    }

    #[test]
    fn test_reads_until_window_end() {
        let lines: Vec<String> = (0..5).map(|m| line(m, 30)).collect();
        let file = write_file(&lines, true);
        // Window ends at 10:03; lines at 10:00..10:02 qualify
        let records = read_all(&file, 0, utc_local(10, 3, 0), 64, 0.2).unwrap();
        assert_eq!(records.len(), 3);
        for r in &records {
            assert!(r.time_received().unwrap() < utc_local(10, 3, 0));
        }
    }

    #[test]
    fn test_lines_survive_chunk_boundaries() {
        let lines: Vec<String> = (0..4).map(|m| line(m, 10)).collect();
        let file = write_file(&lines, true);
        for chunk_size in [7, 16, 33, 61, 128, 4096] {
            let records = read_all(&file, 0, utc_local(11, 0, 0), chunk_size, 0.2).unwrap();
            assert_eq!(records.len(), 4, "chunk_size {chunk_size}");
        }
    }

    #[test]
    fn test_final_unterminated_line_is_parsed() {
        let lines: Vec<String> = (0..3).map(|m| line(m, 0)).collect();
        let file = write_file(&lines, false);
        let records = read_all(&file, 0, utc_local(11, 0, 0), 64, 0.2).unwrap();
        assert_eq!(records.len(), 3);
    }

    #[test]
    fn test_file_size_multiple_of_chunk_size() {
        let lines: Vec<String> = (0..3).map(|m| line(m, 0)).collect();
        let file = write_file(&lines, true);
        let size = std::fs::metadata(file.path()).unwrap().len() as usize;
        // Every divisor exercises the empty-final-read path
        for chunk_size in [size, size / 2, size / 3] {
            if chunk_size == 0 || size % chunk_size != 0 {
                continue;
            }
            let records = read_all(&file, 0, utc_local(11, 0, 0), chunk_size, 0.2).unwrap();
            assert_eq!(records.len(), 3, "chunk_size {chunk_size}");
        }
    }

    #[test]
    fn test_starts_at_offset() {
        let lines: Vec<String> = (0..4).map(|m| line(m, 0)).collect();
        let file = write_file(&lines, true);
        let offset = lines[0].len() as u64 + 1;
        let records = read_all(&file, offset, utc_local(11, 0, 0), 64, 0.2).unwrap();
        assert_eq!(records.len(), 3);
        assert!(records[0].time_received().unwrap() >= utc_local(10, 1, 0));
    }

    #[test]
    fn test_error_threshold_boundary() {
        // 79 bad lines out of 100 stays under a 0.8 threshold, 81 exceeds it
        for (bad, expect_err) in [(79usize, false), (81usize, true)] {
            let mut lines: Vec<String> = (0..(100 - bad)).map(|i| line(1, (i % 60) as u32)).collect();
            for i in 0..bad {
                lines.push(format!("not a log line {i}"));
            }
            let file = write_file(&lines, true);
            let result = read_all(&file, 0, utc_local(11, 0, 0), 1024, 0.8);
            match result {
                Err(Error::TooManyParseErrors { errors, attempted, .. }) => {
                    assert!(expect_err, "{bad} bad lines should not have raised");
                    assert_eq!(errors, bad);
                    assert_eq!(attempted, 100);
                }
                Ok(records) => {
                    assert!(!expect_err, "{bad} bad lines should have raised");
                    assert_eq!(records.len(), 100 - bad);
                }
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
    }

    #[test]
    fn test_empty_window_range_is_ok() {
        let lines: Vec<String> = (0..3).map(|m| line(m, 0)).collect();
        let file = write_file(&lines, true);
        // time_to before every line: scan stops on the first parsed line
        let records = read_all(&file, 0, utc_local(9, 0, 0), 64, 0.2).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_window_adjacency() {
        let lines: Vec<String> = (0..6).flat_map(|m| (0..3).map(move |s| line(m, s * 20))).collect();
        let file = write_file(&lines, true);

        let b = utc_local(10, 2, 0);
        let c = utc_local(10, 5, 0);

        let whole = read_all(&file, 0, c, 64, 0.2).unwrap();
        let first = read_all(&file, 0, b, 64, 0.2).unwrap();

        // Second half starts where the first window's records end
        let consumed: u64 = lines
            .iter()
            .filter(|l| l.contains(":00:") || l.contains(":01:"))
            .map(|l| l.len() as u64 + 1)
            .sum();
        let second = read_all(&file, consumed, c, 64, 0.2).unwrap();

        let stitched: Vec<LogRecord> = first.iter().chain(second.iter()).cloned().collect();
        assert_eq!(stitched, whole);
    }
}
