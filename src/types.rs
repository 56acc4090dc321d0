use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::{MAIN_NUMBER_COUNT, MAX_NUMBER, MIN_NUMBER};
use crate::parser::RejectReason;

// ---------------------------------------------------------------------------
// DrawRecord
// ---------------------------------------------------------------------------

/// One published draw. Only constructible through [`DrawRecord::new`], which
/// enforces the same rules the dataset parser applies to a source line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DrawRecord {
    year: i32,
    draw_number: u32,
    date: String,
    /// Sorted ascending.
    main_numbers: [u8; MAIN_NUMBER_COUNT],
    bonus_number: u8,
}

impl DrawRecord {
    pub fn new(
        year: i32,
        draw_number: u32,
        date: impl Into<String>,
        main_numbers: [u8; MAIN_NUMBER_COUNT],
        bonus_number: u8,
    ) -> Result<Self, RejectReason> {
        if draw_number == 0 {
            return Err(RejectReason::InvalidDrawNumber);
        }
        let date = date.into();
        if date.trim().is_empty() {
            return Err(RejectReason::MissingDate);
        }
        if main_numbers
            .iter()
            .chain(std::iter::once(&bonus_number))
            .any(|&n| !is_valid_number(n))
        {
            return Err(RejectReason::NumberOutOfRange);
        }

        let mut sorted = main_numbers;
        sorted.sort_unstable();
        if sorted.windows(2).any(|w| w[0] == w[1]) {
            return Err(RejectReason::DuplicateNumber);
        }

        Ok(Self {
            year,
            draw_number,
            date: date.trim().to_string(),
            main_numbers: sorted,
            bonus_number,
        })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn draw_number(&self) -> u32 {
        self.draw_number
    }

    pub fn date(&self) -> &str {
        &self.date
    }

    pub fn main_numbers(&self) -> &[u8; MAIN_NUMBER_COUNT] {
        &self.main_numbers
    }

    pub fn bonus_number(&self) -> u8 {
        self.bonus_number
    }

    /// True if `n` is one of the six main numbers. Bonus is not considered.
    pub fn contains(&self, n: u8) -> bool {
        self.main_numbers.binary_search(&n).is_ok()
    }

    /// The 15 unordered main-number pairs of this draw, each as `(a, b)` with `a < b`.
    pub fn pairs(&self) -> impl Iterator<Item = (u8, u8)> + '_ {
        let m = &self.main_numbers;
        (0..MAIN_NUMBER_COUNT)
            .flat_map(move |i| ((i + 1)..MAIN_NUMBER_COUNT).map(move |j| (m[i], m[j])))
    }

    /// Render back to the dataset line format: `year,drawNo,date,n1..n6,bonus`.
    pub fn to_dataset_line(&self) -> String {
        let m = &self.main_numbers;
        format!(
            "{},{},{},{},{},{},{},{},{},{}",
            self.year, self.draw_number, self.date, m[0], m[1], m[2], m[3], m[4], m[5], self.bonus_number
        )
    }
}

pub fn is_valid_number(n: u8) -> bool {
    (MIN_NUMBER..=MAX_NUMBER).contains(&n)
}

// ---------------------------------------------------------------------------
// Derived statistics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumberStatistic {
    pub number: u8,
    pub appearance_count: u32,
    /// 0 if the number never appeared.
    pub last_draw_number: u32,
    pub last_appearance_gap: u32,
    pub popularity_score: f64,
    pub neglect_score: f64,
    pub trend_score: f64,
    pub is_odd: bool,
    pub last_digit: u8,
    pub avoidance_score: f64,
    /// Unix milliseconds.
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumberPair {
    /// Always less than `number_b`.
    pub number_a: u8,
    pub number_b: u8,
    pub pair_count: u32,
    pub last_draw_together: u32,
    pub pair_score: f64,
    /// Unix milliseconds.
    pub updated_at: i64,
}

impl NumberPair {
    pub fn contains(&self, number: u8) -> bool {
        self.number_a == number || self.number_b == number
    }

    /// The other half of the pair, if `number` is one of its members.
    pub fn partner_of(&self, number: u8) -> Option<u8> {
        if self.number_a == number {
            Some(self.number_b)
        } else if self.number_b == number {
            Some(self.number_a)
        } else {
            None
        }
    }

    pub fn is_consecutive(&self) -> bool {
        self.number_b.abs_diff(self.number_a) == 1
    }
}

// ---------------------------------------------------------------------------
// Sync bookkeeping
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncState {
    pub local_latest_draw_number: Option<u32>,
    pub last_sync_timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStrategy {
    /// Local store was empty; every dataset record was upserted.
    FullLoad,
    /// Only records newer than the local latest draw were upserted.
    IncrementalLoad,
    /// Nothing new to load; statistics were recomputed.
    StatisticsOnly,
}

impl std::fmt::Display for SyncStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SyncStrategy::FullLoad => "full_load",
            SyncStrategy::IncrementalLoad => "incremental_load",
            SyncStrategy::StatisticsOnly => "statistics_only",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncResult {
    pub strategy: SyncStrategy,
    pub records_added: usize,
    pub total_records: u64,
    /// Dataset lines rejected by the parser during this run.
    pub rejected_lines: usize,
}
