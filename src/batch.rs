//! Batch Splitter: partition a collection into contiguous, order-preserving
//! chunks and hand each rendered chunk to a caller-supplied sink.
//!
//! The splitter knows nothing about delivery. The sink decides whether a part
//! is written to disk, sent over the wire, or collected in memory.
use std::str::FromStr;

use log::debug;

use crate::export::{ExportError, FormatKind, Naming, Payload, render};
use crate::record::Record;

/// Records-per-file presets offered to users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchSize {
    /// Everything in one payload
    #[default]
    All,
    /// 100 records per payload
    Small,
    /// 200 records per payload
    Medium,
    /// 500 records per payload
    Large,
    /// Custom record count; zero means all
    Custom(usize),
}

impl BatchSize {
    pub const PRESETS: [BatchSize; 4] = [
        BatchSize::All,
        BatchSize::Small,
        BatchSize::Medium,
        BatchSize::Large,
    ];

    /// Records per payload; `0` means no splitting.
    pub fn as_usize(self) -> usize {
        match self {
            BatchSize::All => 0,
            BatchSize::Small => 100,
            BatchSize::Medium => 200,
            BatchSize::Large => 500,
            BatchSize::Custom(n) => n,
        }
    }
}

impl From<BatchSize> for usize {
    fn from(batch_size: BatchSize) -> Self {
        batch_size.as_usize()
    }
}

impl FromStr for BatchSize {
    type Err = std::num::ParseIntError;

    /// `all`, or a record count.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Ok(BatchSize::All);
        }
        Ok(match s.parse::<usize>()? {
            0 => BatchSize::All,
            100 => BatchSize::Small,
            200 => BatchSize::Medium,
            500 => BatchSize::Large,
            n => BatchSize::Custom(n),
        })
    }
}

/// One emitted chunk. `index` is 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    pub index: usize,
    pub total: usize,
    pub records: usize,
    pub payload: Payload,
}

/// Number of parts `len` records produce at `batch_size`.
pub fn part_count(len: usize, batch_size: usize) -> usize {
    if batch_size == 0 || len <= batch_size {
        1
    } else {
        len.div_ceil(batch_size)
    }
}

/// Render `records` and call `sink` once per part. With `batch_size == 0` or
/// at most `batch_size` records, the sink is called exactly once with the
/// whole collection. Otherwise it is called `ceil(len / batch_size)` times
/// with chunks of `batch_size` records, the last possibly smaller. CSV parts
/// each carry the header.
///
/// Every part of one call is named from the current position of `naming`,
/// which is then advanced so a later call never reuses those names.
///
/// Returns the number of parts emitted. The first sink error stops emission.
pub fn split_and_emit<E, F>(
    records: &[Record],
    kind: FormatKind,
    batch_size: usize,
    naming: &mut Naming,
    mut sink: F,
) -> Result<usize, E>
where
    E: From<ExportError>,
    F: FnMut(Part) -> Result<(), E>,
{
    let naming = {
        let current = naming.clone();
        naming.advance();
        current
    };
    let total = part_count(records.len(), batch_size);
    if total == 1 {
        let payload = Payload {
            bytes: render(records, kind)?,
            filename: naming.file_name(kind, batch_size, None),
        };
        sink(Part {
            index: 1,
            total,
            records: records.len(),
            payload,
        })?;
        return Ok(1);
    }

    for (i, chunk) in records.chunks(batch_size).enumerate() {
        let index = i + 1;
        debug!("emitting part {}/{} ({} records)", index, total, chunk.len());
        let payload = Payload {
            bytes: render(chunk, kind)?,
            filename: naming.file_name(kind, batch_size, Some(index)),
        };
        sink(Part {
            index,
            total,
            records: chunk.len(),
            payload,
        })?;
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::{CSV_HEADER, Stamp};
    use crate::parser::parse_contents;
    use chrono::NaiveDate;

    fn naming() -> Naming {
        let t = NaiveDate::from_ymd_opt(2024, 1, 2)
            .and_then(|d| d.and_hms_opt(3, 4, 5))
            .unwrap();
        Naming::with_stamp("plan_premium", Stamp::at(t))
    }

    fn records(n: usize) -> Vec<Record> {
        let text: Vec<String> = (0..n)
            .map(|i| format!("user{}@x.com:pw{}|Plan=Premium", i, i))
            .collect();
        parse_contents(&text.join("\n"))
    }

    fn collect(records: &[Record], kind: FormatKind, batch_size: usize) -> Vec<Part> {
        let mut parts = Vec::new();
        let n = split_and_emit::<ExportError, _>(records, kind, batch_size, &mut naming(), |p| {
            parts.push(p);
            Ok(())
        })
        .unwrap();
        assert_eq!(n, parts.len());
        parts
    }

    #[test]
    fn zero_batch_emits_once() {
        let r = records(250);
        let parts = collect(&r, FormatKind::Text, 0);
        assert_eq!(parts.len(), 1);
        assert_eq!((parts[0].index, parts[0].total, parts[0].records), (1, 1, 250));
        assert_eq!(parts[0].payload.filename, "plan_premium_20240102_030405.txt");
    }

    #[test]
    fn batch_not_smaller_than_collection_emits_once() {
        let r = records(100);
        let parts = collect(&r, FormatKind::Csv, 100);
        assert_eq!(parts.len(), 1);
        assert_eq!(
            parts[0].payload.filename,
            "plan_premium_100x_20240102_030405.csv"
        );
    }

    #[test]
    fn splits_250_into_100_100_50() {
        let r = records(250);
        let parts = collect(&r, FormatKind::Text, 100);
        let shape: Vec<(usize, usize, usize)> =
            parts.iter().map(|p| (p.index, p.total, p.records)).collect();
        assert_eq!(shape, vec![(1, 3, 100), (2, 3, 100), (3, 3, 50)]);
        assert_eq!(
            parts[2].payload.filename,
            "plan_premium_100x_20240102_030405_batch3.txt"
        );

        // Concatenating the parts reproduces the whole collection in order.
        let joined: Vec<String> = parts
            .iter()
            .map(|p| String::from_utf8(p.payload.bytes.clone()).unwrap())
            .collect();
        let whole = String::from_utf8(render(&r, FormatKind::Text).unwrap()).unwrap();
        assert_eq!(joined.join("\n"), whole);
    }

    #[test]
    fn exact_multiple_has_no_short_tail() {
        let r = records(200);
        let parts = collect(&r, FormatKind::Text, 50);
        assert_eq!(parts.len(), 4);
        assert!(parts.iter().all(|p| p.records == 50));
    }

    #[test]
    fn csv_parts_repeat_header() {
        let r = records(5);
        let parts = collect(&r, FormatKind::Csv, 2);
        assert_eq!(parts.len(), 3);
        for p in &parts {
            let s = String::from_utf8(p.payload.bytes.clone()).unwrap();
            assert!(s.starts_with(&CSV_HEADER.join(",")));
            assert_eq!(s.lines().count(), 1 + p.records);
        }
    }

    #[test]
    fn sink_error_stops_emission() {
        let r = records(10);
        let mut calls = 0;
        let res = split_and_emit::<anyhow::Error, _>(&r, FormatKind::Text, 3, &mut naming(), |p| {
            calls += 1;
            if p.index == 2 {
                anyhow::bail!("transport down");
            }
            Ok(())
        });
        assert!(res.is_err());
        assert_eq!(calls, 2);
    }

    #[test]
    fn repeated_runs_with_one_naming_do_not_collide() {
        let r = records(3);
        let mut n = naming();
        let mut names = Vec::new();
        for _ in 0..2 {
            split_and_emit::<ExportError, _>(&r, FormatKind::Csv, 2, &mut n, |p| {
                names.push(p.payload.filename);
                Ok(())
            })
            .unwrap();
        }
        assert_eq!(
            names,
            vec![
                "plan_premium_2x_20240102_030405_batch1.csv",
                "plan_premium_2x_20240102_030405_batch2.csv",
                "plan_premium_2x_20240102_030405_2_batch1.csv",
                "plan_premium_2x_20240102_030405_2_batch2.csv",
            ]
        );
        assert_eq!(n.seq, 2);
    }

    #[test]
    fn part_counts() {
        assert_eq!(part_count(0, 0), 1);
        assert_eq!(part_count(0, 100), 1);
        assert_eq!(part_count(101, 100), 2);
        assert_eq!(part_count(250, 100), 3);
        assert_eq!(part_count(300, 100), 3);
    }

    #[test]
    fn batch_size_tokens() {
        assert_eq!("all".parse::<BatchSize>().unwrap(), BatchSize::All);
        assert_eq!(" All ".parse::<BatchSize>().unwrap(), BatchSize::All);
        assert_eq!(" 100 ".parse::<BatchSize>().unwrap(), BatchSize::Small);
        assert_eq!("500".parse::<BatchSize>().unwrap(), BatchSize::Large);
        assert_eq!("42".parse::<BatchSize>().unwrap(), BatchSize::Custom(42));
        assert_eq!("0".parse::<BatchSize>().unwrap().as_usize(), 0);
        assert!("lots".parse::<BatchSize>().is_err());
        let sizes: Vec<usize> = BatchSize::PRESETS.iter().map(|b| b.as_usize()).collect();
        assert_eq!(sizes, vec![0, 100, 200, 500]);
    }
}
