//! Filter Engine: select the records matching one categorical criterion.
//!
//! Free-form dimensions (plan, country, payment) compare case-insensitively
//! against the caller's value. Phone and hold are closed two-bucket
//! categories whose wire tokens (`Verified`/`Unverified`, `On Hold`/`Active`)
//! are matched verbatim.
//!
//! Filtering returns a new collection in input order and never mutates its
//! input.
use std::fmt;
use std::str::FromStr;

use crate::record::{Record, keys};
use crate::stats::{HOLD_DEFAULT, UNKNOWN};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SelectorError {
    #[error("unknown filter kind: {0}")]
    UnknownKind(String),
    #[error("unknown {kind} value: {value}")]
    UnknownToken { kind: FilterKind, value: String },
    #[error("expected KIND=VALUE, got: {0}")]
    MissingValue(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterKind {
    Plan,
    Country,
    Phone,
    Hold,
    Payment,
}

impl FilterKind {
    pub const ALL: [FilterKind; 5] = [
        FilterKind::Plan,
        FilterKind::Country,
        FilterKind::Phone,
        FilterKind::Hold,
        FilterKind::Payment,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FilterKind::Plan => "plan",
            FilterKind::Country => "country",
            FilterKind::Phone => "phone",
            FilterKind::Hold => "hold",
            FilterKind::Payment => "payment",
        }
    }
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterKind {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FilterKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| SelectorError::UnknownKind(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhoneStatus {
    Verified,
    Unverified,
}

impl PhoneStatus {
    pub const ALL: [PhoneStatus; 2] = [PhoneStatus::Verified, PhoneStatus::Unverified];

    pub fn as_str(self) -> &'static str {
        match self {
            PhoneStatus::Verified => "Verified",
            PhoneStatus::Unverified => "Unverified",
        }
    }

    /// `attr` is the lower-cased attribute value.
    fn matches(self, attr: &str) -> bool {
        match self {
            PhoneStatus::Verified => attr == "true",
            PhoneStatus::Unverified => matches!(attr, "false" | "null" | "unknown"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HoldStatus {
    OnHold,
    Active,
}

impl HoldStatus {
    pub const ALL: [HoldStatus; 2] = [HoldStatus::OnHold, HoldStatus::Active];

    pub fn as_str(self) -> &'static str {
        match self {
            HoldStatus::OnHold => "On Hold",
            HoldStatus::Active => "Active",
        }
    }

    fn matches(self, attr: &str) -> bool {
        match self {
            HoldStatus::OnHold => attr == "true",
            HoldStatus::Active => attr == "false",
        }
    }
}

impl FromStr for PhoneStatus {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PhoneStatus::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| SelectorError::UnknownToken {
                kind: FilterKind::Phone,
                value: s.to_string(),
            })
    }
}

impl FromStr for HoldStatus {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HoldStatus::ALL
            .into_iter()
            .find(|h| h.as_str() == s)
            .ok_or_else(|| SelectorError::UnknownToken {
                kind: FilterKind::Hold,
                value: s.to_string(),
            })
    }
}

/// One categorical predicate over a record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Criterion {
    Plan(String),
    Country(String),
    Phone(PhoneStatus),
    Hold(HoldStatus),
    Payment(String),
}

impl Criterion {
    /// Build a criterion from a kind and a value token.
    pub fn new(kind: FilterKind, value: &str) -> Result<Self, SelectorError> {
        Ok(match kind {
            FilterKind::Plan => Criterion::Plan(value.to_string()),
            FilterKind::Country => Criterion::Country(value.to_string()),
            FilterKind::Payment => Criterion::Payment(value.to_string()),
            FilterKind::Phone => Criterion::Phone(value.parse()?),
            FilterKind::Hold => Criterion::Hold(value.parse()?),
        })
    }

    /// Tolerant constructor for UI-driven selectors: `None` for an unknown
    /// kind or categorical token.
    pub fn from_selector(kind: &str, value: &str) -> Option<Self> {
        let kind = kind.parse().ok()?;
        Self::new(kind, value).ok()
    }

    /// Strict `KIND=VALUE` form; the value may itself contain `=`.
    pub fn parse(s: &str) -> Result<Self, SelectorError> {
        let (kind, value) = s
            .split_once('=')
            .ok_or_else(|| SelectorError::MissingValue(s.to_string()))?;
        Self::new(kind.trim().parse()?, value.trim())
    }

    pub fn kind(&self) -> FilterKind {
        match self {
            Criterion::Plan(_) => FilterKind::Plan,
            Criterion::Country(_) => FilterKind::Country,
            Criterion::Phone(_) => FilterKind::Phone,
            Criterion::Hold(_) => FilterKind::Hold,
            Criterion::Payment(_) => FilterKind::Payment,
        }
    }

    pub fn value(&self) -> &str {
        match self {
            Criterion::Plan(v) | Criterion::Country(v) | Criterion::Payment(v) => v.as_str(),
            Criterion::Phone(p) => p.as_str(),
            Criterion::Hold(h) => h.as_str(),
        }
    }

    /// Filename label: `kind_value`, lower-cased, spaces and slashes removed.
    pub fn label(&self) -> String {
        format!("{}_{}", self.kind(), self.value())
            .replace([' ', '/'], "")
            .to_lowercase()
    }

    /// Fallbacks apply only to absent attributes; a present but empty value
    /// is compared as the empty string.
    pub fn matches(&self, r: &Record) -> bool {
        match self {
            Criterion::Plan(v) => eq_folded(r.attr_as_written_or(keys::PLAN, ""), v),
            Criterion::Country(v) => eq_folded(r.attr_as_written_or(keys::COUNTRY, ""), v),
            Criterion::Payment(v) => {
                eq_folded(r.attr_as_written_or(keys::PAYMENT_METHOD, UNKNOWN), v)
            }
            Criterion::Phone(p) => {
                p.matches(&r.attr_as_written_or(keys::PHONE_VERIFIED, UNKNOWN).to_lowercase())
            }
            Criterion::Hold(h) => {
                h.matches(&r.attr_as_written_or(keys::HOLD, HOLD_DEFAULT).to_lowercase())
            }
        }
    }
}

fn eq_folded(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind(), self.value())
    }
}

impl FromStr for Criterion {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Criterion::parse(s)
    }
}

pub fn filter(records: &[Record], criterion: &Criterion) -> Vec<Record> {
    records
        .iter()
        .filter(|r| criterion.matches(r))
        .cloned()
        .collect()
}

/// Filter by raw selector strings. An unrecognized kind or token filters to
/// an empty collection.
pub fn filter_by_selector(records: &[Record], kind: &str, value: &str) -> Vec<Record> {
    match Criterion::from_selector(kind, value) {
        Some(c) => filter(records, &c),
        None => {
            log::debug!("unrecognized selector {}={}; nothing matches", kind, value);
            Vec::new()
        }
    }
}
