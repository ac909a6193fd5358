//! Human-readable report rendering for terminal output.
//!
//! Produces a colored summary of a [`Summary`]: the total and one section per
//! attribute table, entries listed by count.
use colored::*;

use crate::stats::{FrequencyTable, Summary};

fn visible_len(s: &str) -> usize {
    // Strip ANSI escape sequences (\x1b[ ... m) to compute printable width
    let mut len = 0;
    let mut iter = s.chars().peekable();
    while let Some(ch) = iter.next() {
        if ch == '\u{1b}' {
            if let Some('[') = iter.peek().cloned() {
                let _ = iter.next();
            }
            for c in iter.by_ref() {
                if c == 'm' {
                    break;
                }
            }
        } else {
            len += 1;
        }
    }
    len
}

fn section_header(title: &str) -> String {
    let len = visible_len(title);
    let mut s = String::new();
    s.push('\n');
    s.push_str(title);
    s.push('\n');
    s.push_str(&"─".repeat(len));
    s.push_str("\n\n");
    s
}

fn pct(n: usize, d: usize) -> String {
    if d == 0 {
        return "0.00%".to_string();
    }
    format!("{:.2}%", (n as f64) / (d as f64) * 100.0)
}

fn table_lines(table: &FrequencyTable, total: usize) -> Vec<String> {
    if table.is_empty() {
        return vec!["(No records)".to_string()];
    }
    table
        .ranked()
        .into_iter()
        .map(|(value, count)| format!("  {}: {} ({})", value, count, pct(count, total)))
        .collect()
}

pub fn render_summary(summary: &Summary) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n", "Record Analysis Report".bold().cyan()));
    out.push_str(&format!(
        "\n{} {}\n",
        "Total records:".bold(),
        summary.total
    ));

    for (title, table) in [
        ("Plan Distribution".bold().yellow(), &summary.plan),
        ("Phone Verification".bold().blue(), &summary.phone),
        ("Country Distribution".bold().green(), &summary.country),
        ("Hold Status".bold().red(), &summary.hold),
        ("Payment Methods".bold().magenta(), &summary.payment),
    ] {
        out.push_str(&section_header(&title.to_string()));
        for line in table_lines(table, summary.total) {
            out.push_str(&line);
            out.push('\n');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_contents;
    use crate::stats::aggregate;

    #[test]
    fn summary_lists_every_section_ranked() {
        let records = parse_contents(
            "a:1|Plan=Basic|Country=US\nb:2|Plan=Premium|Country=US\nc:3|Plan=Premium|Hold=true",
        );
        let s = render_summary(&aggregate(&records));
        assert!(s.contains("Total records:"));
        for title in [
            "Plan Distribution",
            "Phone Verification",
            "Country Distribution",
            "Hold Status",
            "Payment Methods",
        ] {
            assert!(s.contains(title), "missing {title}");
        }
        let premium = s.find("Premium: 2 (66.67%)").unwrap();
        let basic = s.find("Basic: 1 (33.33%)").unwrap();
        assert!(premium < basic);
        assert!(s.contains("Unknown: 3 (100.00%)"));
        assert!(s.contains("false: 2"));
    }

    #[test]
    fn empty_summary_renders_placeholders() {
        let s = render_summary(&Summary::default());
        assert_eq!(s.matches("(No records)").count(), 5);
    }

    #[test]
    fn header_underline_ignores_ansi() {
        assert_eq!(visible_len("\u{1b}[1;33mPlan\u{1b}[0m"), 4);
        assert!(section_header("Plan").ends_with("────\n\n"));
    }
}
