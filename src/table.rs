use std::sync::LazyLock;

use regex::Regex;

static FIELD_SPLIT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s{2,}").unwrap());
static CELL_NUM_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"-?\d+(?:\.\d+)?").unwrap());
static TOKEN_NUM_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"-?\d[\d,]*(?:\.\d+)?").unwrap());
static PROSE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z\s-]+$").unwrap());

/// Case-insensitive token that marks the target column in a header line.
const COLUMN_TOKEN: &str = "value";

const CURRENCY_SYMBOLS: &[char] = &['₹', '$', '€', '£'];

/// Result of summing one page of document text. `Fallback` means no header
/// line was found and every numeric token on the page was summed instead,
/// a lower-confidence answer that callers log differently.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PageSum {
    Table(f64),
    Fallback(f64),
}

impl PageSum {
    pub fn value(&self) -> f64 {
        match self {
            PageSum::Table(v) | PageSum::Fallback(v) => *v,
        }
    }

}

/// Sum the "value" column of the first table found in `page_text`.
///
/// The header is the first line that contains the column token and splits
/// into at least two fields on runs of 2+ whitespace. Data rows follow until
/// the first prose line (letters/spaces/hyphens only, no columnar structure).
/// Unparsable cells are skipped. With no header anywhere, falls back to
/// summing every numeric token on the page.
pub fn sum_value_column(page_text: &str) -> PageSum {
    let lines: Vec<&str> = page_text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    for (i, line) in lines.iter().enumerate() {
        if !line.to_lowercase().contains(COLUMN_TOKEN) {
            continue;
        }
        let fields = split_fields(line);
        if fields.len() < 2 {
            continue;
        }
        let Some(col) = fields
            .iter()
            .position(|f| f.to_lowercase().contains(COLUMN_TOKEN))
        else {
            continue;
        };
        // Only the first header line is used; one table per page.
        return PageSum::Table(sum_rows(&lines[i + 1..], col));
    }

    PageSum::Fallback(sum_all_numbers(page_text))
}

/// Format a sum as a JSON answer: integral sums become integers, everything
/// else is rounded to 6 decimal places.
pub fn answer_value(sum: f64) -> serde_json::Value {
    if sum.fract() == 0.0 && sum.abs() < i64::MAX as f64 {
        serde_json::Value::from(sum as i64)
    } else {
        let rounded = (sum * 1e6).round() / 1e6;
        serde_json::Value::from(rounded)
    }
}

fn split_fields(line: &str) -> Vec<&str> {
    FIELD_SPLIT_RE
        .split(line)
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .collect()
}

fn sum_rows(rows: &[&str], col: usize) -> f64 {
    let mut sum = 0.0;
    for line in rows {
        let fields = split_fields(line);
        // Prose line with no columnar structure ends the table.
        if fields.len() <= 1 && PROSE_RE.is_match(line) {
            break;
        }
        if let Some(cell) = fields.get(col) {
            if let Some(n) = parse_cell(cell) {
                sum += n;
            }
        }
    }
    sum
}

/// Strip currency symbols and thousands separators, then take the first
/// signed decimal number in the cell.
fn parse_cell(cell: &str) -> Option<f64> {
    let cleaned: String = cell
        .chars()
        .filter(|c| !CURRENCY_SYMBOLS.contains(c) && *c != ',')
        .collect();
    CELL_NUM_RE
        .find(&cleaned)
        .and_then(|m| m.as_str().parse().ok())
}

fn sum_all_numbers(text: &str) -> f64 {
    TOKEN_NUM_RE
        .find_iter(text)
        .filter_map(|m| m.as_str().replace(',', "").parse::<f64>().ok())
        .sum()
}
