//! Session: the per-upload working state a front end keeps between user
//! actions. Holds the parsed collection, its summary, the last applied filter
//! the chosen export format, and how many exports it has made.
//!
//! A `Session` is an ordinary value owned by the caller. Keying sessions by
//! user, and expiring them, is the caller's business.
//!
//! Typical usage:
//!
//! ```no_run
//! use credsift::prelude::*;
//! # fn main() -> anyhow::Result<()> {
//! let mut session = Session::from_text("a@x.com:pw|Plan=Premium")?;
//! session.apply_filter(Criterion::parse("plan=premium")?);
//! session.choose_format(FormatKind::Csv);
//! session.export::<anyhow::Error, _>(0, |part| {
//!     std::fs::write(&part.payload.filename, &part.payload.bytes)?;
//!     Ok(())
//! })?;
//! # Ok(())
//! # }
//! ```
use log::info;

use crate::{
    batch::{Part, split_and_emit},
    export::{ExportError, FormatKind, Naming},
    filter::{Criterion, FilterKind, HoldStatus, PhoneStatus, filter},
    parser::{ParseStats, parse_bytes, parse_contents_with_stats, parse_parallel},
    record::Record,
    stats::{Summary, aggregate},
};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("no valid records found in input")]
    NoValidRecords,
    #[error("no filter has been applied")]
    NoFilterApplied,
    #[error("no export format has been chosen")]
    NoFormatChosen,
    #[error(transparent)]
    Export(#[from] ExportError),
}

/// A filter result kept for export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub criterion: Criterion,
    pub records: Vec<Record>,
}

impl Selection {
    pub fn label(&self) -> String {
        self.criterion.label()
    }
}

#[derive(Debug, Clone)]
pub struct Session {
    records: Vec<Record>,
    summary: Summary,
    parse_stats: ParseStats,
    selection: Option<Selection>,
    format: Option<FormatKind>,
    exports: usize,
}

impl Session {
    /// Build a session from already parsed records.
    pub fn from_records(records: Vec<Record>) -> Result<Self, SessionError> {
        Self::build(records, ParseStats::default())
    }

    pub fn from_text(text: &str) -> Result<Self, SessionError> {
        let (records, stats) = parse_contents_with_stats(text);
        Self::build(records, stats)
    }

    /// Like [`Session::from_text`], parsing on the rayon pool.
    pub fn from_text_parallel(text: &str) -> Result<Self, SessionError> {
        let (records, stats) = parse_parallel(text);
        Self::build(records, stats)
    }

    /// Parse raw upload bytes; invalid UTF-8 is replaced per line.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SessionError> {
        let (records, stats) = parse_bytes(bytes);
        Self::build(records, stats)
    }

    fn build(records: Vec<Record>, parse_stats: ParseStats) -> Result<Self, SessionError> {
        if records.is_empty() {
            return Err(SessionError::NoValidRecords);
        }
        let summary = aggregate(&records);
        info!(
            "session loaded: {} records ({} malformed lines skipped)",
            records.len(),
            parse_stats.malformed
        );
        Ok(Self {
            records,
            summary,
            parse_stats,
            selection: None,
            format: None,
            exports: 0,
        })
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn summary(&self) -> &Summary {
        &self.summary
    }

    pub fn parse_stats(&self) -> ParseStats {
        self.parse_stats
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    pub fn format(&self) -> Option<FormatKind> {
        self.format
    }

    /// Number of exports started from this session.
    pub fn exports(&self) -> usize {
        self.exports
    }

    /// Values a UI can offer for a filter dimension: the observed values for
    /// free-form dimensions, the fixed tokens for phone and hold.
    pub fn filter_options(&self, kind: FilterKind) -> Vec<String> {
        match kind {
            FilterKind::Phone => PhoneStatus::ALL
                .iter()
                .map(|p| p.as_str().to_string())
                .collect(),
            FilterKind::Hold => HoldStatus::ALL
                .iter()
                .map(|h| h.as_str().to_string())
                .collect(),
            _ => self.summary.table(kind).values(),
        }
    }

    /// Filter the loaded records. A non-empty result replaces the current
    /// selection; an empty result leaves it untouched. Returns the match count.
    pub fn apply_filter(&mut self, criterion: Criterion) -> usize {
        let records = filter(&self.records, &criterion);
        let n = records.len();
        info!("filter {} matched {} of {}", criterion, n, self.records.len());
        if n > 0 {
            self.selection = Some(Selection { criterion, records });
        }
        n
    }

    pub fn choose_format(&mut self, kind: FormatKind) {
        self.format = Some(kind);
    }

    /// Export the current selection in the chosen format, named after the
    /// filter label and the current time. Every export after the first gets a
    /// `_{n}` suffix from the session's export count.
    pub fn export<E, F>(&mut self, batch_size: usize, sink: F) -> Result<usize, E>
    where
        E: From<SessionError> + From<ExportError>,
        F: FnMut(Part) -> Result<(), E>,
    {
        let label = self
            .selection
            .as_ref()
            .ok_or(SessionError::NoFilterApplied)?
            .label();
        let mut naming = Naming::new(&label).with_sequence(self.exports);
        self.export_named(batch_size, &mut naming, sink)
    }

    /// Export with caller-supplied naming. `naming` is advanced past the
    /// names it handed out, and the session's export count is bumped.
    pub fn export_named<E, F>(
        &mut self,
        batch_size: usize,
        naming: &mut Naming,
        sink: F,
    ) -> Result<usize, E>
    where
        E: From<SessionError> + From<ExportError>,
        F: FnMut(Part) -> Result<(), E>,
    {
        let selection = self.selection.as_ref().ok_or(SessionError::NoFilterApplied)?;
        let kind = self.format.ok_or(SessionError::NoFormatChosen)?;
        self.exports += 1;
        split_and_emit(&selection.records, kind, batch_size, naming, sink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::Stamp;
    use chrono::NaiveDate;

    const UPLOAD: &str = "a@x.com:pw1|Plan=Premium|Country=US|PaymentMethod=Card\n\
                          bad-line\n\
                          b@x.com:pw2|Plan=Basic|Country=US\n\
                          c@x.com:pw3|Plan=Premium|Country=DE|Hold=true";

    fn naming() -> Naming {
        let t = NaiveDate::from_ymd_opt(2024, 5, 6)
            .and_then(|d| d.and_hms_opt(7, 8, 9))
            .unwrap();
        Naming::with_stamp("plan_premium", Stamp::at(t))
    }

    #[test]
    fn loads_and_summarizes() {
        let s = Session::from_text(UPLOAD).unwrap();
        assert_eq!(s.records().len(), 3);
        assert_eq!(s.summary().total, 3);
        assert_eq!(s.summary().plan.get("Premium"), 2);
        assert_eq!(s.parse_stats().malformed, 1);
    }

    #[test]
    fn no_valid_records_is_distinguishable() {
        assert!(matches!(
            Session::from_text("junk\n\nmore junk"),
            Err(SessionError::NoValidRecords)
        ));
        assert!(matches!(
            Session::from_bytes(b""),
            Err(SessionError::NoValidRecords)
        ));
    }

    #[test]
    fn filter_options_per_kind() {
        let s = Session::from_text(UPLOAD).unwrap();
        assert_eq!(s.filter_options(FilterKind::Plan), vec!["Premium", "Basic"]);
        assert_eq!(s.filter_options(FilterKind::Country), vec!["US", "DE"]);
        assert_eq!(s.filter_options(FilterKind::Payment), vec!["Card", "Unknown"]);
        assert_eq!(
            s.filter_options(FilterKind::Phone),
            vec!["Verified", "Unverified"]
        );
        assert_eq!(s.filter_options(FilterKind::Hold), vec!["On Hold", "Active"]);
    }

    #[test]
    fn empty_filter_keeps_previous_selection() {
        let mut s = Session::from_text(UPLOAD).unwrap();
        assert_eq!(s.apply_filter(Criterion::Plan("premium".into())), 2);
        assert_eq!(s.apply_filter(Criterion::Country("FR".into())), 0);
        let sel = s.selection().unwrap();
        assert_eq!(sel.criterion, Criterion::Plan("premium".into()));
        assert_eq!(sel.label(), "plan_premium");
        // Source collection is untouched.
        assert_eq!(s.records().len(), 3);
    }

    #[test]
    fn export_requires_filter_and_format() {
        let mut s = Session::from_text(UPLOAD).unwrap();
        let res = s.export_named::<SessionError, _>(0, &mut naming(), |_| Ok(()));
        assert!(matches!(res, Err(SessionError::NoFilterApplied)));

        s.apply_filter(Criterion::Hold(HoldStatus::Active));
        let res = s.export_named::<SessionError, _>(0, &mut naming(), |_| Ok(()));
        assert!(matches!(res, Err(SessionError::NoFormatChosen)));
    }

    #[test]
    fn export_emits_selected_records() {
        let mut s = Session::from_text(UPLOAD).unwrap();
        s.apply_filter(Criterion::Plan("Premium".into()));
        s.choose_format(FormatKind::Text);
        let mut parts = Vec::new();
        let n = s
            .export_named::<SessionError, _>(1, &mut naming(), |p| {
                parts.push(p);
                Ok(())
            })
            .unwrap();
        assert_eq!(n, 2);
        assert_eq!(
            parts[0].payload.bytes,
            b"a@x.com:pw1|Plan=Premium|Country=US|PaymentMethod=Card".to_vec()
        );
        assert_eq!(
            parts[1].payload.bytes,
            b"c@x.com:pw3|Plan=Premium|Country=DE|Hold=true".to_vec()
        );
        assert_eq!(
            parts[1].payload.filename,
            "plan_premium_1x_20240506_070809_batch2.txt"
        );
    }

    #[test]
    fn back_to_back_exports_get_distinct_names() {
        let mut s = Session::from_text(UPLOAD).unwrap();
        s.apply_filter(Criterion::Plan("Premium".into()));
        s.choose_format(FormatKind::Csv);
        let mut names = Vec::new();
        for _ in 0..3 {
            s.export::<SessionError, _>(0, |p| {
                names.push(p.payload.filename);
                Ok(())
            })
            .unwrap();
        }
        assert_eq!(s.exports(), 3);
        assert!(names[0].starts_with("plan_premium_") && names[0].ends_with(".csv"));
        assert!(!names[0].contains("_2.") && !names[0].contains("_3."));
        assert!(names[1].ends_with("_2.csv"));
        assert!(names[2].ends_with("_3.csv"));
        assert_ne!(names[0], names[1]);
        assert_ne!(names[1], names[2]);
    }

    #[test]
    fn failed_export_does_not_count() {
        let mut s = Session::from_text(UPLOAD).unwrap();
        s.apply_filter(Criterion::Plan("Premium".into()));
        let res = s.export::<SessionError, _>(0, |_| Ok(()));
        assert!(matches!(res, Err(SessionError::NoFormatChosen)));
        assert_eq!(s.exports(), 0);
    }
}
