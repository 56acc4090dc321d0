use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{DATASET_FIELD_COUNT, HEADER_FIRST_FIELD, MAIN_NUMBER_COUNT};
use crate::types::{is_valid_number, DrawRecord};

/// Why a dataset line was not turned into a [`DrawRecord`].
/// Checked in declaration order; the first failing rule wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum RejectReason {
    #[error("fewer than 10 fields")]
    MalformedRow,
    #[error("draw number is not a positive integer")]
    InvalidDrawNumber,
    #[error("date field is empty")]
    MissingDate,
    #[error("number outside 1..=45")]
    NumberOutOfRange,
    #[error("duplicate main number")]
    DuplicateNumber,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RejectStats {
    pub malformed_row: usize,
    pub invalid_draw_number: usize,
    pub missing_date: usize,
    pub number_out_of_range: usize,
    pub duplicate_number: usize,
}

impl RejectStats {
    fn record(&mut self, reason: RejectReason) {
        match reason {
            RejectReason::MalformedRow => self.malformed_row += 1,
            RejectReason::InvalidDrawNumber => self.invalid_draw_number += 1,
            RejectReason::MissingDate => self.missing_date += 1,
            RejectReason::NumberOutOfRange => self.number_out_of_range += 1,
            RejectReason::DuplicateNumber => self.duplicate_number += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.malformed_row
            + self.invalid_draw_number
            + self.missing_date
            + self.number_out_of_range
            + self.duplicate_number
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineReject {
    /// 1-based line number in the dataset text.
    pub line_no: usize,
    pub reason: RejectReason,
}

#[derive(Debug, Default)]
pub struct ParsedDataset {
    pub records: Vec<DrawRecord>,
    pub rejects: Vec<LineReject>,
    pub stats: RejectStats,
    pub headers_skipped: usize,
}

impl ParsedDataset {
    pub fn latest_draw_number(&self) -> Option<u32> {
        self.records.iter().map(DrawRecord::draw_number).max()
    }

    /// Keep only records with `draw_number > after`. Reject bookkeeping is
    /// left as parsed.
    pub fn retain_after(mut self, after: u32) -> Self {
        self.records.retain(|r| r.draw_number() > after);
        self
    }
}

/// True for the column-name line, wherever it appears.
pub fn is_header(line: &str) -> bool {
    line.trim_start_matches('\u{feff}')
        .split(',')
        .next()
        .map(|f| f.trim() == HEADER_FIRST_FIELD)
        .unwrap_or(false)
}

/// Parse a single data line into a validated record.
pub fn parse_line(line: &str) -> Result<DrawRecord, RejectReason> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if fields.len() < DATASET_FIELD_COUNT {
        return Err(RejectReason::MalformedRow);
    }

    let draw_number = fields[1]
        .parse::<u32>()
        .ok()
        .filter(|&n| n > 0)
        .ok_or(RejectReason::InvalidDrawNumber)?;

    let date = fields[2];
    if date.is_empty() {
        return Err(RejectReason::MissingDate);
    }

    let mut numbers = [0u8; MAIN_NUMBER_COUNT + 1];
    for (slot, raw) in numbers.iter_mut().zip(&fields[3..3 + MAIN_NUMBER_COUNT + 1]) {
        *slot = raw
            .parse::<u8>()
            .ok()
            .filter(|&n| is_valid_number(n))
            .ok_or(RejectReason::NumberOutOfRange)?;
    }
    let mut mains = [0u8; MAIN_NUMBER_COUNT];
    mains.copy_from_slice(&numbers[..MAIN_NUMBER_COUNT]);
    let bonus = numbers[MAIN_NUMBER_COUNT];

    let year = fields[0]
        .parse::<i32>()
        .ok()
        .or_else(|| year_from_date(date))
        .unwrap_or(0);

    DrawRecord::new(year, draw_number, date, mains, bonus)
}

/// Leading `YYYY` of a date string such as `2025-09-13`.
pub fn year_from_date(date: &str) -> Option<i32> {
    date.get(..4).and_then(|y| y.parse().ok())
}

/// Parse a whole dataset. The first line is always treated as the header.
pub fn parse_dataset(text: &str) -> ParsedDataset {
    let mut parsed = ParsedDataset::default();

    for (idx, line) in text.lines().enumerate() {
        if idx == 0 || is_header(line) {
            parsed.headers_skipped += 1;
            continue;
        }
        if line.trim().is_empty() {
            continue;
        }

        match parse_line(line) {
            Ok(record) => parsed.records.push(record),
            Err(reason) => {
                warn!(line_no = idx + 1, %reason, "Rejected dataset line {}: {reason} ({line})", idx + 1);
                parsed.stats.record(reason);
                parsed.rejects.push(LineReject { line_no: idx + 1, reason });
            }
        }
    }

    if parsed.stats.total() > 0 {
        let s = &parsed.stats;
        info!(
            "[PARSE] rejected: malformed={} draw_no={} date={} range={} duplicate={}",
            s.malformed_row, s.invalid_draw_number, s.missing_date, s.number_out_of_range, s.duplicate_number,
        );
    }
    debug!(
        records = parsed.records.len(),
        rejects = parsed.rejects.len(),
        "Parsed dataset",
    );

    parsed
}

/// Like [`parse_dataset`], but keeps only records with `draw_number > after`.
/// Callers that already hold a parse should use [`ParsedDataset::retain_after`].
pub fn parse_dataset_after(text: &str, after: u32) -> ParsedDataset {
    parse_dataset(text).retain_after(after)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "year,drawNo,date,n1,n2,n3,n4,n5,n6,bonus";

    #[test]
    fn parses_valid_line() {
        let r = parse_line("2025,1184,2025-08-09,14,16,23,25,31,37,42").unwrap();
        assert_eq!(r.draw_number(), 1184);
        assert_eq!(r.year(), 2025);
        assert_eq!(r.date(), "2025-08-09");
        assert_eq!(r.main_numbers(), &[14, 16, 23, 25, 31, 37]);
        assert_eq!(r.bonus_number(), 42);
    }

    #[test]
    fn tolerates_whitespace_and_extra_fields() {
        let r = parse_line(" 2025 , 7 ,2003-01-18, 1 ,2,3,4,5,6 , 7 ,extra").unwrap();
        assert_eq!(r.draw_number(), 7);
        assert_eq!(r.bonus_number(), 7);
    }

    #[test]
    fn short_rows_are_malformed() {
        for line in ["", "2025", "2025,1,2002-12-07,1,2,3,4,5,6"] {
            assert_eq!(parse_line(line), Err(RejectReason::MalformedRow), "line={line:?}");
        }
    }

    #[test]
    fn draw_number_must_be_positive_integer() {
        for draw in ["", "0", "-3", "abc", "1.5"] {
            let line = format!("2025,{draw},2025-01-04,1,2,3,4,5,6,7");
            assert_eq!(parse_line(&line), Err(RejectReason::InvalidDrawNumber), "draw={draw:?}");
        }
    }

    #[test]
    fn empty_date_is_rejected_but_format_is_not_checked() {
        assert_eq!(parse_line("2025,5,,1,2,3,4,5,6,7"), Err(RejectReason::MissingDate));
        assert!(parse_line("2025,5,someday,1,2,3,4,5,6,7").is_ok());
    }

    #[test]
    fn numbers_outside_range_or_unparseable_are_rejected() {
        for line in [
            "2025,5,2003-01-04,0,2,3,4,5,6,7",
            "2025,5,2003-01-04,1,2,3,4,5,46,7",
            "2025,5,2003-01-04,1,2,3,4,5,6,46",
            "2025,5,2003-01-04,1,2,x,4,5,6,7",
            "2025,5,2003-01-04,1,2,,4,5,6,7",
        ] {
            assert_eq!(parse_line(line), Err(RejectReason::NumberOutOfRange), "line={line}");
        }
    }

    #[test]
    fn duplicate_main_numbers_are_rejected() {
        assert_eq!(
            parse_line("2025,5,2003-01-04,1,2,3,4,5,5,7"),
            Err(RejectReason::DuplicateNumber)
        );
    }

    #[test]
    fn missing_year_falls_back_to_date() {
        let r = parse_line(",5,2003-01-04,1,2,3,4,5,6,7").unwrap();
        assert_eq!(r.year(), 2003);
    }

    #[test]
    fn header_detection() {
        assert!(is_header(HEADER));
        assert!(is_header("\u{feff}year,drawNo,date"));
        assert!(!is_header("2025,1,2002-12-07,1,2,3,4,5,6,7"));
    }

    #[test]
    fn dataset_accumulates_records_and_rejects() {
        let text = format!(
            "{HEADER}\n\
             2025,3,2002-12-21,1,2,3,4,5,6,7\n\
             2025,2,2002-12-14,1,2,3\n\
             \n\
             {HEADER}\n\
             2025,1,2002-12-07,10,23,29,33,37,40,16\n\
             2025,x,2002-12-07,10,23,29,33,37,40,16\n"
        );
        let parsed = parse_dataset(&text);
        assert_eq!(parsed.records.len(), 2);
        assert_eq!(parsed.headers_skipped, 2);
        assert_eq!(parsed.stats.total(), 2);
        assert_eq!(parsed.stats.malformed_row, 1);
        assert_eq!(parsed.stats.invalid_draw_number, 1);
        assert_eq!(parsed.rejects[0], LineReject { line_no: 3, reason: RejectReason::MalformedRow });
        assert_eq!(parsed.latest_draw_number(), Some(3));
    }

    #[test]
    fn first_line_is_skipped_even_without_header_text() {
        let parsed = parse_dataset("2025,9,2003-02-01,1,2,3,4,5,6,7\n2025,8,2003-01-25,1,2,3,4,5,6,7\n");
        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.records[0].draw_number(), 8);
    }

    #[test]
    fn header_only_dataset_has_no_latest() {
        assert_eq!(parse_dataset(HEADER).latest_draw_number(), None);
    }

    #[test]
    fn after_filter_keeps_only_newer_rounds() {
        let mut text = String::from(HEADER);
        for n in (1..=105u32).rev() {
            text.push_str(&format!("\n2025,{n},2025-01-01,1,2,3,4,5,6,7"));
        }
        let parsed = parse_dataset_after(&text, 100);
        let draws: Vec<u32> = parsed.records.iter().map(|r| r.draw_number()).collect();
        assert_eq!(draws, vec![105, 104, 103, 102, 101]);
        assert!(parsed.rejects.is_empty());
    }

    #[test]
    fn after_filter_keeps_reject_counts() {
        let text = format!(
            "{HEADER}\n2025,12,2025-01-01,1,2,3,4,5,6,7\n2025,abc,2025-01-01,1,2,3,4,5,6,7\n2025,50,2025-01-01,1,1,3,4,5,6,7"
        );
        let parsed = parse_dataset_after(&text, 10);
        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.stats.invalid_draw_number, 1);
        assert_eq!(parsed.stats.duplicate_number, 1);
    }

    #[test]
    fn retain_after_filters_an_existing_parse() {
        let text = format!("{HEADER}\n2025,3,d,1,2,3,4,5,6,7\n2025,2,d,1,2,3,4,5,6,7\n2025,1,d,1,2,3,4,5,6,7");
        let parsed = parse_dataset(&text).retain_after(1);
        let draws: Vec<u32> = parsed.records.iter().map(|r| r.draw_number()).collect();
        assert_eq!(draws, vec![3, 2]);
    }
}
