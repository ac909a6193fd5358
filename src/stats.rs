//! Stats Aggregator: per-attribute frequency tables over a record collection.
//!
//! Each of the five well-known attributes gets its own [`FrequencyTable`].
//! Missing or empty values are counted under a fixed fallback (`"Unknown"`,
//! or `"false"` for hold), so every table sums to the record count.
use std::collections::HashMap;

use crate::filter::FilterKind;
use crate::record::{Record, keys};

pub const UNKNOWN: &str = "Unknown";
pub const HOLD_DEFAULT: &str = "false";

/// Value → count, remembering the order in which values were first seen.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FrequencyTable {
    entries: Vec<(String, usize)>,
    index: HashMap<String, usize>,
}

impl FrequencyTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&mut self, value: &str) {
        match self.index.get(value) {
            Some(&i) => self.entries[i].1 += 1,
            None => {
                self.index.insert(value.to_string(), self.entries.len());
                self.entries.push((value.to_string(), 1));
            }
        }
    }

    pub fn get(&self, value: &str) -> usize {
        self.index.get(value).map_or(0, |&i| self.entries[i].1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn sum(&self) -> usize {
        self.entries.iter().map(|(_, n)| n).sum()
    }

    /// Entries in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.entries.iter().map(|(v, n)| (v.as_str(), *n))
    }

    /// Observed values in first-seen order.
    pub fn values(&self) -> Vec<String> {
        self.entries.iter().map(|(v, _)| v.clone()).collect()
    }

    /// Entries sorted by count descending, then value ascending.
    pub fn ranked(&self) -> Vec<(String, usize)> {
        use std::cmp::Reverse;
        let mut items = self.entries.clone();
        items.sort_by(|a, b| (Reverse(a.1), &a.0).cmp(&(Reverse(b.1), &b.0)));
        items
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Summary {
    pub total: usize,
    pub plan: FrequencyTable,
    pub phone: FrequencyTable,
    pub country: FrequencyTable,
    pub hold: FrequencyTable,
    pub payment: FrequencyTable,
}

impl Summary {
    /// The table backing a filter dimension.
    pub fn table(&self, kind: FilterKind) -> &FrequencyTable {
        match kind {
            FilterKind::Plan => &self.plan,
            FilterKind::Phone => &self.phone,
            FilterKind::Country => &self.country,
            FilterKind::Hold => &self.hold,
            FilterKind::Payment => &self.payment,
        }
    }
}

pub fn aggregate(records: &[Record]) -> Summary {
    let mut s = Summary {
        total: records.len(),
        ..Summary::default()
    };
    for r in records {
        s.plan.increment(r.attr_or(keys::PLAN, UNKNOWN));
        s.phone.increment(r.attr_or(keys::PHONE_VERIFIED, UNKNOWN));
        s.country.increment(r.attr_or(keys::COUNTRY, UNKNOWN));
        s.hold.increment(r.attr_or(keys::HOLD, HOLD_DEFAULT));
        s.payment.increment(r.attr_or(keys::PAYMENT_METHOD, UNKNOWN));
    }
    s
}
