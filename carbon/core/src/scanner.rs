// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

use crate::error::{IngestError, IngestResult};

/// Lines longer than this are consumed and counted malformed without being
/// buffered, so one misbehaving client cannot grow the connection buffer
/// without bound.
const MAX_LINE_LENGTH: usize = 4096;

/// Reads successive carbon plaintext records (`name value timestamp\n`) off
/// a byte stream.
///
/// Malformed lines never terminate the scan: they are skipped and counted in
/// a counter the connection handler drains each iteration. The scan ends at
/// EOF or on a transport error, the latter retrievable via [`err`].
///
/// [`err`]: LineScanner::err
pub(crate) struct LineScanner<R> {
    reader: BufReader<R>,
    line: Vec<u8>,
    /// Byte range of the metric name within `line`.
    name: (usize, usize),
    timestamp: i64,
    value: f64,
    malformed: u64,
    err: Option<IngestError>,
}

enum ReadOutcome {
    Line,
    TooLong,
    Eof,
}

impl<R: AsyncRead + Unpin> LineScanner<R> {
    pub(crate) fn new(stream: R) -> Self {
        Self {
            reader: BufReader::new(stream),
            line: Vec::new(),
            name: (0, 0),
            timestamp: 0,
            value: 0.0,
            malformed: 0,
            err: None,
        }
    }

    /// Advances to the next well-formed record. Returns false at EOF or on a
    /// transport error.
    pub(crate) async fn advance(&mut self) -> bool {
        loop {
            match self.read_line().await {
                Ok(ReadOutcome::Eof) => return false,
                Ok(ReadOutcome::TooLong) => self.malformed += 1,
                Ok(ReadOutcome::Line) => {
                    if self.parse_line() {
                        return true;
                    }
                    self.malformed += 1;
                }
                Err(err) => {
                    self.err = Some(err);
                    return false;
                }
            }
        }
    }

    /// The current metric name. Valid only until the next [`advance`].
    ///
    /// [`advance`]: LineScanner::advance
    pub(crate) fn name(&self) -> &[u8] {
        &self.line[self.name.0..self.name.1]
    }

    pub(crate) fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub(crate) fn value(&self) -> f64 {
        self.value
    }

    /// Drains the malformed-line counter.
    pub(crate) fn take_malformed(&mut self) -> u64 {
        std::mem::take(&mut self.malformed)
    }

    pub(crate) fn err(&self) -> Option<&IngestError> {
        self.err.as_ref()
    }

    /// Accumulates one newline-terminated line into `self.line`. A final
    /// line without a terminator still counts as a line.
    async fn read_line(&mut self) -> IngestResult<ReadOutcome> {
        self.line.clear();
        let mut overflow = false;
        loop {
            let chunk = self.reader.fill_buf().await?;
            if chunk.is_empty() {
                return Ok(if overflow {
                    ReadOutcome::TooLong
                } else if self.line.is_empty() {
                    ReadOutcome::Eof
                } else {
                    ReadOutcome::Line
                });
            }
            match chunk.iter().position(|&byte| byte == b'\n') {
                Some(pos) => {
                    if !overflow {
                        self.line.extend_from_slice(&chunk[..pos]);
                    }
                    self.reader.consume(pos + 1);
                    return Ok(if overflow {
                        ReadOutcome::TooLong
                    } else {
                        ReadOutcome::Line
                    });
                }
                None => {
                    if !overflow {
                        self.line.extend_from_slice(chunk);
                        if self.line.len() > MAX_LINE_LENGTH {
                            overflow = true;
                            self.line.clear();
                        }
                    }
                    let consumed = chunk.len();
                    self.reader.consume(consumed);
                }
            }
        }
    }

    /// Parses `self.line` as `name value timestamp`, with any run of spaces
    /// or tabs separating fields. Returns false when the line is malformed.
    fn parse_line(&mut self) -> bool {
        let mut end = self.line.len();
        if self.line.ends_with(b"\r") {
            end -= 1;
        }

        let mut fields = [(0, 0); 3];
        let mut count = 0;
        let mut pos = 0;
        while pos < end {
            while pos < end && matches!(self.line[pos], b' ' | b'\t') {
                pos += 1;
            }
            if pos == end {
                break;
            }
            let start = pos;
            while pos < end && !matches!(self.line[pos], b' ' | b'\t') {
                pos += 1;
            }
            if count == 3 {
                return false;
            }
            fields[count] = (start, pos);
            count += 1;
        }
        if count != 3 {
            return false;
        }

        let Some(value) = parse_field::<f64>(&self.line[fields[1].0..fields[1].1]) else {
            return false;
        };
        let Some(timestamp) = parse_field::<i64>(&self.line[fields[2].0..fields[2].1]) else {
            return false;
        };

        self.name = fields[0];
        self.value = value;
        self.timestamp = timestamp;
        true
    }
}

fn parse_field<T: std::str::FromStr>(field: &[u8]) -> Option<T> {
    std::str::from_utf8(field).ok()?.parse().ok()
}

#[cfg(test)]
mod test {
    use super::*;

    async fn scan_all(input: &[u8]) -> (Vec<(Vec<u8>, i64, f64)>, u64) {
        let mut scanner = LineScanner::new(input);
        let mut records = Vec::new();
        while scanner.advance().await {
            records.push((scanner.name().to_vec(), scanner.timestamp(), scanner.value()));
        }
        assert!(scanner.err().is_none());
        (records, scanner.take_malformed())
    }

    #[tokio::test]
    async fn scans_well_formed_lines() {
        let (records, malformed) =
            scan_all(b"foo.bar 1.5 1700000000\nsys.cpu 0.25 1700000060\n").await;
        assert_eq!(
            records,
            vec![
                (b"foo.bar".to_vec(), 1700000000, 1.5),
                (b"sys.cpu".to_vec(), 1700000060, 0.25),
            ]
        );
        assert_eq!(malformed, 0);
    }

    #[tokio::test]
    async fn tolerates_crlf_and_repeated_separators() {
        let (records, malformed) = scan_all(b"foo.bar  1.5\t1700000000\r\n").await;
        assert_eq!(records, vec![(b"foo.bar".to_vec(), 1700000000, 1.5)]);
        assert_eq!(malformed, 0);
    }

    #[tokio::test]
    async fn final_line_without_newline_is_scanned() {
        let (records, malformed) = scan_all(b"foo 1 1700000000").await;
        assert_eq!(records, vec![(b"foo".to_vec(), 1700000000, 1.0)]);
        assert_eq!(malformed, 0);
    }

    #[tokio::test]
    async fn malformed_lines_are_counted_and_skipped() {
        let input: &[u8] = b"missing fields\n\
            foo bar 1700000000\n\
            foo 1.0 notatime\n\
            one two three four\n\
            \n\
            good 2.5 1700000000\n";
        let (records, malformed) = scan_all(input).await;
        assert_eq!(records, vec![(b"good".to_vec(), 1700000000, 2.5)]);
        assert_eq!(malformed, 5);
    }

    #[tokio::test]
    async fn oversized_line_is_dropped_without_buffering() {
        let mut input = vec![b'x'; MAX_LINE_LENGTH * 3];
        input.extend_from_slice(b" 1 1\nok 1 1700000000\n");
        let (records, malformed) = scan_all(&input).await;
        assert_eq!(records, vec![(b"ok".to_vec(), 1700000000, 1.0)]);
        assert_eq!(malformed, 1);
    }

    #[tokio::test]
    async fn empty_input_ends_immediately() {
        let (records, malformed) = scan_all(b"").await;
        assert!(records.is_empty());
        assert_eq!(malformed, 0);
    }
}
