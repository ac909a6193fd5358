//! Record Parser: turns an uploaded text blob into an ordered collection of
//! [`Record`]s.
//!
//! Grammar per line: `identifier:secret[|key=value[|key=value...]]`. There is
//! no escaping for `|`, `:` or `=` inside tokens; values containing them are
//! split as written.
//!
//! A malformed line is logged and skipped. Only a failure to read the input
//! as a whole surfaces as an error.
use std::io::Read;

use log::{debug, warn};
use rayon::prelude::*;

use crate::record::Record;

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("missing ':' between identifier and secret: {0}")]
    MissingSeparator(String),
    #[error("empty identifier or secret: {0}")]
    EmptyCredential(String),
    #[error("input could not be read as text: {0}")]
    Decode(#[from] std::io::Error),
}

/// Line counters collected during a parse.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ParseStats {
    pub parsed: usize,
    pub blank: usize,
    pub malformed: usize,
}

pub fn parse_line(line: &str) -> Result<Record, ParseError> {
    let raw = line.trim();
    // Only the first '|' separates credentials from details.
    let (credentials, details) = raw.split_once('|').unwrap_or((raw, ""));
    let (identifier, secret) = credentials
        .split_once(':')
        .ok_or_else(|| ParseError::MissingSeparator(raw.to_string()))?;
    let identifier = identifier.trim();
    let secret = secret.trim();
    if identifier.is_empty() || secret.is_empty() {
        return Err(ParseError::EmptyCredential(raw.to_string()));
    }

    let mut record = Record {
        identifier: identifier.to_string(),
        secret: secret.to_string(),
        raw: raw.to_string(),
        ..Record::default()
    };
    if !details.is_empty() {
        for segment in details.split('|') {
            if let Some((key, value)) = segment.split_once('=') {
                record.set_attr(key.trim(), value.trim());
            }
        }
    }
    Ok(record)
}

/// Parse one numbered line, updating `stats`. Blank lines yield `None`
/// silently; malformed lines are logged and yield `None`.
fn parse_numbered(lineno: usize, line: &str, stats: &mut ParseStats) -> Option<Record> {
    if line.trim().is_empty() {
        stats.blank += 1;
        return None;
    }
    match parse_line(line) {
        Ok(r) => {
            stats.parsed += 1;
            Some(r)
        }
        Err(e) => {
            warn!("line {}: {}", lineno, e);
            stats.malformed += 1;
            None
        }
    }
}

pub fn parse_contents(contents: &str) -> Vec<Record> {
    parse_contents_with_stats(contents).0
}

pub fn parse_contents_with_stats(contents: &str) -> (Vec<Record>, ParseStats) {
    let mut stats = ParseStats::default();
    let records = contents
        .split('\n')
        .enumerate()
        .filter_map(|(i, line)| parse_numbered(i + 1, line, &mut stats))
        .collect();
    debug!(
        "parsed {} records ({} blank, {} malformed)",
        stats.parsed, stats.blank, stats.malformed
    );
    (records, stats)
}

/// Parse raw bytes, splitting on `\n` and decoding each line lossily so that
/// invalid UTF-8 in one line never affects the others.
pub fn parse_bytes(bytes: &[u8]) -> (Vec<Record>, ParseStats) {
    let mut stats = ParseStats::default();
    let mut records = Vec::new();
    let mut pos = 0;
    let mut lineno = 0;
    while pos < bytes.len() {
        lineno += 1;
        let end = memchr::memchr(b'\n', &bytes[pos..])
            .map(|off| pos + off)
            .unwrap_or(bytes.len());
        let line = String::from_utf8_lossy(&bytes[pos..end]);
        if let Some(r) = parse_numbered(lineno, &line, &mut stats) {
            records.push(r);
        }
        pos = end + 1;
    }
    debug!(
        "parsed {} records from {} bytes ({} blank, {} malformed)",
        stats.parsed,
        bytes.len(),
        stats.blank,
        stats.malformed
    );
    (records, stats)
}

/// Read all of `reader` and parse it. A read failure is reported once for the
/// whole input.
pub fn parse_reader<R: Read>(mut reader: R) -> Result<(Vec<Record>, ParseStats), ParseError> {
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf)?;
    Ok(parse_bytes(&buf))
}

/// Parse lines on the rayon pool. Output order is input line order.
pub fn parse_parallel(contents: &str) -> (Vec<Record>, ParseStats) {
    let lines: Vec<&str> = contents.split('\n').collect();
    let results: Vec<(Option<Record>, ParseStats)> = lines
        .par_iter()
        .enumerate()
        .map(|(i, line)| {
            let mut stats = ParseStats::default();
            let r = parse_numbered(i + 1, line, &mut stats);
            (r, stats)
        })
        .collect();

    let mut stats = ParseStats::default();
    let mut records = Vec::with_capacity(results.len());
    for (r, s) in results {
        stats.parsed += s.parsed;
        stats.blank += s.blank;
        stats.malformed += s.malformed;
        records.extend(r);
    }
    (records, stats)
}
