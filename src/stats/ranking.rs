//! Read-side reports over computed statistics. Every ranking breaks ties by
//! ascending number so the same inputs always produce the same list.

use std::cmp::Ordering;
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::config::{MAX_NUMBER, MIN_NUMBER};
use crate::types::{DrawRecord, NumberPair, NumberStatistic};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NumberOrder {
    /// Most appearances first.
    #[default]
    Hot,
    /// Fewest appearances first.
    Cold,
    /// Longest since last appearance first.
    Neglected,
    /// Highest recent-window share first.
    Trending,
    /// Least often picked by players first.
    Avoided,
}

pub fn rank_numbers(stats: &[NumberStatistic], order: NumberOrder, limit: usize) -> Vec<NumberStatistic> {
    let cmp: fn(&NumberStatistic, &NumberStatistic) -> Ordering = match order {
        NumberOrder::Hot => |a, b| b.appearance_count.cmp(&a.appearance_count),
        NumberOrder::Cold => |a, b| a.appearance_count.cmp(&b.appearance_count),
        NumberOrder::Neglected => |a, b| b.last_appearance_gap.cmp(&a.last_appearance_gap),
        NumberOrder::Trending => |a, b| b.trend_score.total_cmp(&a.trend_score),
        NumberOrder::Avoided => |a, b| b.avoidance_score.total_cmp(&a.avoidance_score),
    };

    let mut ranked = stats.to_vec();
    ranked.sort_by(|a, b| cmp(a, b).then(a.number.cmp(&b.number)));
    ranked.truncate(limit);
    ranked
}

pub fn hot_numbers(stats: &[NumberStatistic], limit: usize) -> Vec<NumberStatistic> {
    rank_numbers(stats, NumberOrder::Hot, limit)
}

pub fn cold_numbers(stats: &[NumberStatistic], limit: usize) -> Vec<NumberStatistic> {
    rank_numbers(stats, NumberOrder::Cold, limit)
}

pub fn neglected_numbers(stats: &[NumberStatistic], limit: usize) -> Vec<NumberStatistic> {
    rank_numbers(stats, NumberOrder::Neglected, limit)
}

pub fn trending_numbers(stats: &[NumberStatistic], limit: usize) -> Vec<NumberStatistic> {
    rank_numbers(stats, NumberOrder::Trending, limit)
}

pub fn avoided_numbers(stats: &[NumberStatistic], limit: usize) -> Vec<NumberStatistic> {
    rank_numbers(stats, NumberOrder::Avoided, limit)
}

/// Most frequent pairs first; ties by ascending `(a, b)`.
pub fn top_pairs(pairs: &[NumberPair], limit: usize) -> Vec<NumberPair> {
    let mut ranked = pairs.to_vec();
    ranked.sort_by(|x, y| {
        y.pair_count
            .cmp(&x.pair_count)
            .then((x.number_a, x.number_b).cmp(&(y.number_a, y.number_b)))
    });
    ranked.truncate(limit);
    ranked
}

// ---------------------------------------------------------------------------
// Number and pair lookups
// ---------------------------------------------------------------------------

/// Nine-number bands used for zone lookups: 1-9, 10-18, 19-27, 28-36, 37-45.
pub const ZONE_COUNT: u8 = 5;
const ZONE_WIDTH: u8 = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    Odd,
    Even,
}

/// Numbers covered by `zone` (1-based); `None` outside `1..=ZONE_COUNT`.
pub fn zone_range(zone: u8) -> Option<RangeInclusive<u8>> {
    if !(1..=ZONE_COUNT).contains(&zone) {
        return None;
    }
    let start = (zone - 1) * ZONE_WIDTH + 1;
    Some(start..=(zone * ZONE_WIDTH).min(MAX_NUMBER))
}

fn by_popularity(a: &NumberStatistic, b: &NumberStatistic) -> Ordering {
    b.popularity_score.total_cmp(&a.popularity_score).then(a.number.cmp(&b.number))
}

/// Odd or even numbers, most popular first.
pub fn numbers_by_parity(stats: &[NumberStatistic], parity: Parity) -> Vec<NumberStatistic> {
    let odd = parity == Parity::Odd;
    let mut picked: Vec<NumberStatistic> = stats.iter().filter(|s| s.is_odd == odd).cloned().collect();
    picked.sort_by(by_popularity);
    picked
}

/// Numbers in `zone`, most popular first. Empty for an unknown zone.
pub fn numbers_by_zone(stats: &[NumberStatistic], zone: u8) -> Vec<NumberStatistic> {
    let Some(range) = zone_range(zone) else {
        return Vec::new();
    };
    let mut picked: Vec<NumberStatistic> = stats.iter().filter(|s| range.contains(&s.number)).cloned().collect();
    picked.sort_by(by_popularity);
    picked
}

pub fn number_statistic(stats: &[NumberStatistic], number: u8) -> Option<NumberStatistic> {
    stats.iter().find(|s| s.number == number).cloned()
}

/// Pairs that include `number`, highest pair score first; ties by ascending
/// partner.
pub fn pairs_containing(pairs: &[NumberPair], number: u8, limit: usize) -> Vec<NumberPair> {
    let mut picked: Vec<NumberPair> = pairs.iter().filter(|p| p.contains(number)).cloned().collect();
    picked.sort_by(|x, y| {
        y.pair_score
            .total_cmp(&x.pair_score)
            .then(x.partner_of(number).cmp(&y.partner_of(number)))
    });
    picked.truncate(limit);
    picked
}

/// The pair with the highest score among those containing `number`.
pub fn best_partner(pairs: &[NumberPair], number: u8) -> Option<NumberPair> {
    pairs_containing(pairs, number, 1).into_iter().next()
}

/// Pairs of adjacent numbers (`consecutive = true`) or all others.
/// Input order is kept.
pub fn consecutive_pairs(pairs: &[NumberPair], consecutive: bool) -> Vec<NumberPair> {
    pairs.iter().filter(|p| p.is_consecutive() == consecutive).cloned().collect()
}

// ---------------------------------------------------------------------------
// Distribution report
// ---------------------------------------------------------------------------

/// Number ranges: 1-10, 11-20, 21-30, 31-40, 41-45.
pub const SECTION_LABELS: [&str; 5] = ["1-10", "11-20", "21-30", "31-40", "41-45"];

const HOT_COLD_LEN: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumberFrequency {
    pub number: u8,
    pub count: u32,
    /// Share of draws in the window containing this number.
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OddEven {
    pub odd_count: u32,
    pub even_count: u32,
    pub odd_percentage: f64,
    pub even_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Section {
    pub label: &'static str,
    pub count: u32,
    pub percentage: f64,
}

/// Frequency profile of one kind of number (main or bonus) over a window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrequencyProfile {
    pub hot: Vec<NumberFrequency>,
    pub cold: Vec<NumberFrequency>,
    pub odd_even: OddEven,
    pub sections: Vec<Section>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistributionReport {
    pub draws: usize,
    pub first_draw: Option<u32>,
    pub last_draw: Option<u32>,
    pub main: FrequencyProfile,
    pub bonus: FrequencyProfile,
}

fn section_index(n: u8) -> usize {
    (usize::from(n - 1) / 10).min(SECTION_LABELS.len() - 1)
}

fn pct(part: u32, whole: u32) -> f64 {
    if whole == 0 {
        0.0
    } else {
        f64::from(part) * 100.0 / f64::from(whole)
    }
}

/// `counts[n]` is the frequency of number `n`; index 0 is unused.
fn profile(counts: &[u32; MAX_NUMBER as usize + 1], draws: usize) -> FrequencyProfile {
    let draws_u32 = u32::try_from(draws).unwrap_or(u32::MAX);
    let freqs: Vec<NumberFrequency> = (MIN_NUMBER..=MAX_NUMBER)
        .map(|n| {
            let count = counts[usize::from(n)];
            NumberFrequency { number: n, count, percentage: pct(count, draws_u32) }
        })
        .collect();

    let mut hot = freqs.clone();
    hot.sort_by(|a, b| b.count.cmp(&a.count).then(a.number.cmp(&b.number)));
    hot.truncate(HOT_COLD_LEN);

    let mut cold = freqs.clone();
    cold.sort_by(|a, b| a.count.cmp(&b.count).then(a.number.cmp(&b.number)));
    cold.truncate(HOT_COLD_LEN);

    let (mut odd, mut even) = (0u32, 0u32);
    let mut section_counts = [0u32; SECTION_LABELS.len()];
    for f in &freqs {
        if f.number % 2 == 1 {
            odd += f.count;
        } else {
            even += f.count;
        }
        section_counts[section_index(f.number)] += f.count;
    }
    let total = odd + even;

    FrequencyProfile {
        hot,
        cold,
        odd_even: OddEven {
            odd_count: odd,
            even_count: even,
            odd_percentage: pct(odd, total),
            even_percentage: pct(even, total),
        },
        sections: SECTION_LABELS
            .iter()
            .zip(section_counts)
            .map(|(&label, count)| Section { label, count, percentage: pct(count, total) })
            .collect(),
    }
}

impl DistributionReport {
    pub fn from_draws(draws: &[DrawRecord]) -> Self {
        let mut main = [0u32; MAX_NUMBER as usize + 1];
        let mut bonus = [0u32; MAX_NUMBER as usize + 1];
        for r in draws {
            for &n in r.main_numbers() {
                main[usize::from(n)] += 1;
            }
            bonus[usize::from(r.bonus_number())] += 1;
        }

        Self {
            draws: draws.len(),
            first_draw: draws.iter().map(DrawRecord::draw_number).min(),
            last_draw: draws.iter().map(DrawRecord::draw_number).max(),
            main: profile(&main, draws.len()),
            bonus: profile(&bonus, draws.len()),
        }
    }
}
