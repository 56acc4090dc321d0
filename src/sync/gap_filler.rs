use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use crate::error::Result;
use crate::source::calendar::expected_latest_draw;
use crate::source::official::manual_correction;
use crate::source::DrawSource;
use crate::types::DrawRecord;

/// Where backfilled draws are written, one at a time.
#[async_trait]
pub trait RecordSink: Send + Sync {
    async fn append(&self, record: &DrawRecord) -> Result<()>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GapFillOutcome {
    /// Records appended, ascending by draw number.
    pub added: Vec<DrawRecord>,
    /// True when a round could not be obtained and the loop halted before
    /// reaching the expected latest round.
    pub stopped: bool,
}

impl GapFillOutcome {
    pub fn draw_numbers(&self) -> Vec<u32> {
        self.added.iter().map(DrawRecord::draw_number).collect()
    }
}

/// Backfills rounds the bulk dataset is missing from a per-round source.
/// Rounds are filled strictly in order; a round that cannot be obtained
/// ends the run so the dataset never contains a hole.
pub struct GapFiller {
    source: Arc<dyn DrawSource>,
    max_backfill: Option<u32>,
    clock: fn() -> DateTime<Utc>,
}

impl GapFiller {
    pub fn new(source: Arc<dyn DrawSource>, max_backfill: Option<u32>) -> Self {
        Self { source, max_backfill, clock: Utc::now }
    }

    #[cfg(test)]
    pub(crate) fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    pub async fn fill_gaps(&self, local_latest: u32, sink: &dyn RecordSink) -> Result<GapFillOutcome> {
        let expected = expected_latest_draw((self.clock)());
        let mut outcome = GapFillOutcome::default();

        if expected <= local_latest {
            return Ok(outcome);
        }

        let mut last = expected;
        if let Some(cap) = self.max_backfill {
            last = last.min(local_latest.saturating_add(cap));
        }
        info!(
            local_latest,
            expected,
            attempting = last - local_latest,
            "[GAP] dataset is behind the draw calendar: {local_latest} < {expected}",
        );

        for draw_no in (local_latest + 1)..=last {
            let record = match self.source.get_draw_by_number(draw_no).await {
                Some(r) => r,
                None => match manual_correction(draw_no) {
                    Some(r) => {
                        info!(draw = draw_no, "[GAP] using manual correction for draw {draw_no}");
                        r
                    }
                    None => {
                        warn!(draw = draw_no, "[GAP] draw {draw_no} unavailable, stopping backfill");
                        outcome.stopped = true;
                        break;
                    }
                },
            };

            if let Err(e) = sink.append(&record).await {
                error!(draw = draw_no, "[GAP] failed to store draw {draw_no}: {e}");
                outcome.stopped = true;
                break;
            }
            outcome.added.push(record);
        }

        info!(
            added = outcome.added.len(),
            stopped = outcome.stopped,
            "[GAP] backfill complete: {} added",
            outcome.added.len(),
        );
        Ok(outcome)
    }
}
