//! Export Formatter: render a record collection as text or CSV.
//!
//! - `Text` joins each record's `raw` line with `\n`, reproducing the selected
//!   lines of the upload byte-for-byte.
//! - `Csv` writes the fixed header followed by one fully quoted row per record.
//!   Missing attributes are empty cells, not `"Unknown"`.
//!
//! Neither format ends with a trailing newline.
use std::fmt;
use std::sync::LazyLock;

use chrono::{Local, NaiveDateTime};
use csv::{QuoteStyle, Terminator, WriterBuilder};
use regex::Regex;
use serde::Serialize;

use crate::record::{Record, keys};

pub const CSV_HEADER: [&str; 7] = [
    "Email",
    "Password",
    "Plan",
    "Country",
    "PhoneVerified",
    "Hold",
    "PaymentMethod",
];

pub const DEFAULT_LABEL: &str = "filtered";

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatKind {
    Text,
    Csv,
}

impl FormatKind {
    pub fn extension(self) -> &'static str {
        match self {
            FormatKind::Text => "txt",
            FormatKind::Csv => "csv",
        }
    }
}

impl fmt::Display for FormatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FormatKind::Text => "text",
            FormatKind::Csv => "csv",
        })
    }
}

/// One rendered export: bytes plus a suggested file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    pub bytes: Vec<u8>,
    pub filename: String,
}

/// Capture time embedded in export file names, second resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stamp(String);

impl Stamp {
    pub const FORMAT: &'static str = "%Y%m%d_%H%M%S";

    pub fn now() -> Self {
        Self(Local::now().format(Self::FORMAT).to_string())
    }

    pub fn at(t: NaiveDateTime) -> Self {
        Self(t.format(Self::FORMAT).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Stamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

static UNSAFE_FILENAME_CHARS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^A-Za-z0-9_.-]+").unwrap_or_else(|e| panic!("invalid filename regex: {e}"))
});

/// Strip characters outside `[A-Za-z0-9_.-]`; an empty result becomes
/// [`DEFAULT_LABEL`].
pub fn sanitize_label(label: &str) -> String {
    let cleaned = UNSAFE_FILENAME_CHARS.replace_all(label, "");
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        DEFAULT_LABEL.to_string()
    } else {
        cleaned.to_string()
    }
}

/// File naming for a series of exports: a sanitized label, a capture stamp
/// and a sequence number. Every export after the first under the same
/// `Naming` gets a `_{n}` suffix, so names stay distinct within a second.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Naming {
    pub label: String,
    pub stamp: Stamp,
    pub seq: usize,
}

impl Naming {
    pub fn new(label: &str) -> Self {
        Self::with_stamp(label, Stamp::now())
    }

    pub fn with_stamp(label: &str, stamp: Stamp) -> Self {
        Self {
            label: sanitize_label(label),
            stamp,
            seq: 0,
        }
    }

    /// Start the series at `seq` exports already taken.
    pub fn with_sequence(mut self, seq: usize) -> Self {
        self.seq = seq;
        self
    }

    /// Move on to the next export in the series.
    pub fn advance(&mut self) {
        self.seq += 1;
    }

    /// `{label}_{stamp}`, or `{label}_{batch}x_{stamp}` for a non-zero batch
    /// size; later exports in the series append `_{seq + 1}` and chunked parts
    /// append `_batch{part}`.
    pub fn file_name(&self, kind: FormatKind, batch_size: usize, part: Option<usize>) -> String {
        let mut name = if batch_size > 0 {
            format!("{}_{}x_{}", self.label, batch_size, self.stamp)
        } else {
            format!("{}_{}", self.label, self.stamp)
        };
        if self.seq > 0 {
            name.push_str(&format!("_{}", self.seq + 1));
        }
        if let Some(p) = part {
            name.push_str(&format!("_batch{}", p));
        }
        format!("{}.{}", name, kind.extension())
    }
}

impl Default for Naming {
    fn default() -> Self {
        Self::new(DEFAULT_LABEL)
    }
}

#[derive(Serialize)]
struct CsvRow<'a> {
    email: &'a str,
    password: &'a str,
    plan: &'a str,
    country: &'a str,
    phone_verified: &'a str,
    hold: &'a str,
    payment_method: &'a str,
}

impl<'a> From<&'a Record> for CsvRow<'a> {
    fn from(r: &'a Record) -> Self {
        Self {
            email: &r.identifier,
            password: &r.secret,
            plan: r.attr_or(keys::PLAN, ""),
            country: r.attr_or(keys::COUNTRY, ""),
            phone_verified: r.attr_or(keys::PHONE_VERIFIED, ""),
            hold: r.attr_or(keys::HOLD, ""),
            payment_method: r.attr_or(keys::PAYMENT_METHOD, ""),
        }
    }
}

fn render_text(records: &[Record]) -> Vec<u8> {
    records
        .iter()
        .map(|r| r.raw.as_str())
        .collect::<Vec<_>>()
        .join("\n")
        .into_bytes()
}

fn render_csv(records: &[Record]) -> Result<Vec<u8>, ExportError> {
    // Header is written bare; every data cell is quoted.
    let mut buf = CSV_HEADER.join(",").into_bytes();
    buf.push(b'\n');
    let mut wtr = WriterBuilder::new()
        .has_headers(false)
        .quote_style(QuoteStyle::Always)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(buf);
    for r in records {
        wtr.serialize(CsvRow::from(r))?;
    }
    let mut out = wtr.into_inner().map_err(|e| e.into_error())?;
    if out.last() == Some(&b'\n') {
        out.pop();
    }
    Ok(out)
}

/// Render `records` without naming.
pub fn render(records: &[Record], kind: FormatKind) -> Result<Vec<u8>, ExportError> {
    match kind {
        FormatKind::Text => Ok(render_text(records)),
        FormatKind::Csv => render_csv(records),
    }
}

/// Render `records` as one payload named by `naming`, then advance the
/// series so the next payload gets a distinct name.
pub fn format(
    records: &[Record],
    kind: FormatKind,
    naming: &mut Naming,
) -> Result<Payload, ExportError> {
    let payload = Payload {
        bytes: render(records, kind)?,
        filename: naming.file_name(kind, 0, None),
    };
    naming.advance();
    Ok(payload)
}
