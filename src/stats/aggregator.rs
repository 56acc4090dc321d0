use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use crate::config::{MAX_NUMBER, MIN_NUMBER, RECENCY_HALF_GAP, TREND_WINDOW};
use crate::db::DrawRepository;
use crate::error::Result;
use crate::types::{DrawRecord, NumberPair, NumberStatistic};

/// Numbers players pick disproportionately rarely.
const DISFAVORED: [u8; 6] = [4, 13, 14, 24, 34, 44];
/// Numbers players pick disproportionately often.
const POPULAR: [u8; 5] = [1, 3, 7, 8, 9];

/// Trend score when the history is too short to fill the trend window.
const NEUTRAL_TREND: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregateSummary {
    pub draws: usize,
    pub statistics: usize,
    pub pairs: usize,
}

/// Rebuilds the per-number statistics and pair table from the full draw history.
pub struct StatisticsAggregator {
    repo: Arc<dyn DrawRepository>,
}

impl StatisticsAggregator {
    pub fn new(repo: Arc<dyn DrawRepository>) -> Self {
        Self { repo }
    }

    pub async fn recompute(&self) -> Result<AggregateSummary> {
        let draws = self.repo.get_all_draws().await?;
        let now = Utc::now().timestamp_millis();

        let stats = compute_number_statistics(&draws, now);
        let pairs = compute_number_pairs(&draws, now);

        self.repo.replace_all_statistics(&stats).await?;
        self.repo.replace_all_pairs(&pairs).await?;

        let summary = AggregateSummary { draws: draws.len(), statistics: stats.len(), pairs: pairs.len() };
        info!(
            draws = summary.draws,
            statistics = summary.statistics,
            pairs = summary.pairs,
            "[STATS] recomputed from {} draws: {} numbers, {} pairs",
            summary.draws,
            summary.statistics,
            summary.pairs,
        );
        Ok(summary)
    }
}

// ---------------------------------------------------------------------------
// Pure computations
// ---------------------------------------------------------------------------

/// Decays from 1.0 at gap 0 to 0.5 at [`RECENCY_HALF_GAP`] draws.
pub fn recency_factor(gap: u32) -> f64 {
    1.0 / (1.0 + f64::from(gap) / RECENCY_HALF_GAP)
}

pub fn avoidance_score(n: u8) -> f64 {
    if DISFAVORED.contains(&n) {
        80.0
    } else if n % 10 == 4 || n % 10 == 0 {
        60.0
    } else if POPULAR.contains(&n) {
        20.0
    } else {
        50.0
    }
}

fn sorted_by_draw(draws: &[DrawRecord]) -> Vec<&DrawRecord> {
    let mut sorted: Vec<&DrawRecord> = draws.iter().collect();
    sorted.sort_by_key(|r| r.draw_number());
    sorted
}

/// One statistic per number in 1..=45, ascending by number.
pub fn compute_number_statistics(draws: &[DrawRecord], updated_at: i64) -> Vec<NumberStatistic> {
    let sorted = sorted_by_draw(draws);
    let total = sorted.len();
    let max_draw = sorted.last().map_or(0, |r| r.draw_number());

    let recent = &sorted[total.saturating_sub(TREND_WINDOW)..];
    let trend_ready = total >= TREND_WINDOW;

    (MIN_NUMBER..=MAX_NUMBER)
        .map(|n| {
            let mut appearance_count = 0u32;
            let mut last_draw_number = 0u32;
            for r in sorted.iter().filter(|r| r.contains(n)) {
                appearance_count += 1;
                last_draw_number = r.draw_number();
            }
            let gap = max_draw - last_draw_number;

            let popularity_score = if total == 0 {
                0.0
            } else {
                f64::from(appearance_count) / total as f64 * 100.0 * recency_factor(gap)
            };

            let trend_score = if trend_ready {
                let hits = recent.iter().filter(|r| r.contains(n)).count();
                hits as f64 / TREND_WINDOW as f64 * 100.0
            } else {
                NEUTRAL_TREND
            };

            NumberStatistic {
                number: n,
                appearance_count,
                last_draw_number,
                last_appearance_gap: gap,
                popularity_score,
                neglect_score: f64::from(gap) * 2.0,
                trend_score,
                is_odd: n % 2 == 1,
                last_digit: n % 10,
                avoidance_score: avoidance_score(n),
                updated_at,
            }
        })
        .collect()
}

/// Every main-number pair that has co-occurred at least once, ascending by `(a, b)`.
pub fn compute_number_pairs(draws: &[DrawRecord], updated_at: i64) -> Vec<NumberPair> {
    let sorted = sorted_by_draw(draws);
    let total = sorted.len();
    let max_draw = sorted.last().map_or(0, |r| r.draw_number());

    // (a, b) → (count, last draw together)
    let mut acc: BTreeMap<(u8, u8), (u32, u32)> = BTreeMap::new();
    for r in &sorted {
        for pair in r.pairs() {
            let e = acc.entry(pair).or_insert((0, 0));
            e.0 += 1;
            e.1 = e.1.max(r.draw_number());
        }
    }

    acc.into_iter()
        .map(|((a, b), (pair_count, last_draw_together))| NumberPair {
            number_a: a,
            number_b: b,
            pair_count,
            last_draw_together,
            pair_score: f64::from(pair_count) / total as f64
                * 100.0
                * recency_factor(max_draw - last_draw_together),
            updated_at,
        })
        .collect()
}
