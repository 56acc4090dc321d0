use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::config::Config;
use crate::db::DrawRepository;
use crate::error::{AppError, Result};
use crate::parser::{parse_dataset, ParsedDataset};
use crate::source::{DatasetCache, OfficialDrawClient, RemoteFetcher};
use crate::stats::StatisticsAggregator;
use crate::sync::GapFiller;
use crate::types::{DrawRecord, SyncResult, SyncState, SyncStrategy};

/// Merges the remote dataset into the repository.
///
/// Only this type writes draws and sync state. Draws are only ever added:
/// a remote dataset that is behind the local store is logged and ignored.
pub struct Reconciler {
    fetcher: RemoteFetcher,
    cache: Arc<DatasetCache>,
    gap_filler: GapFiller,
    repo: Arc<dyn DrawRepository>,
    aggregator: StatisticsAggregator,
}

impl Reconciler {
    pub fn new(
        fetcher: RemoteFetcher,
        cache: Arc<DatasetCache>,
        gap_filler: GapFiller,
        repo: Arc<dyn DrawRepository>,
    ) -> Self {
        let aggregator = StatisticsAggregator::new(Arc::clone(&repo));
        Self { fetcher, cache, gap_filler, repo, aggregator }
    }

    pub fn from_config(cfg: &Config, repo: Arc<dyn DrawRepository>) -> Result<Self> {
        let fetcher = RemoteFetcher::new(cfg)?;
        let cache = Arc::new(DatasetCache::from_config(cfg));
        let official = Arc::new(OfficialDrawClient::new(cfg)?);
        let gap_filler = GapFiller::new(official, cfg.max_backfill);
        Ok(Self::new(fetcher, cache, gap_filler, repo))
    }

    /// Fetch, backfill and merge. Falls back to the cached dataset when the
    /// mirror is unavailable.
    pub async fn reconcile(&self) -> Result<SyncResult> {
        let parsed = self.refresh_dataset().await?.ok_or(AppError::NoValidData)?;
        self.reconcile_parsed(parsed).await
    }

    /// Bring the local dataset cache up to date and return it parsed.
    /// `None` when there is neither a fresh download nor a cached copy.
    pub async fn refresh_dataset(&self) -> Result<Option<ParsedDataset>> {
        match self.fetcher.fetch().await {
            Ok(raw) => {
                info!(
                    bytes = raw.text.len(),
                    fetched_at = %raw.fetched_at,
                    "[SYNC] dataset downloaded",
                );
                self.cache.store(&raw).await?;
            }
            Err(e) => warn!("[SYNC] dataset fetch failed, using cached copy: {e}"),
        }

        let Some(text) = self.cache.load().await? else {
            warn!("[SYNC] no dataset available: fetch failed and no cache exists");
            return Ok(None);
        };

        let mut parsed = parse_dataset(&text);
        let Some(dataset_latest) = parsed.latest_draw_number() else {
            return Ok(Some(parsed));
        };
        // Backfilled records join the parse directly; the cache is not re-read.
        let gaps = self.gap_filler.fill_gaps(dataset_latest, self.cache.as_ref()).await?;
        parsed.records.extend(gaps.added);
        Ok(Some(parsed))
    }

    /// Merge a dataset text into the repository and refresh statistics.
    pub async fn reconcile_dataset(&self, text: &str) -> Result<SyncResult> {
        self.reconcile_parsed(parse_dataset(text)).await
    }

    /// Merge an already-parsed dataset. The incremental strategy filters the
    /// parsed records; the text is never read again.
    pub async fn reconcile_parsed(&self, parsed: ParsedDataset) -> Result<SyncResult> {
        let rejected_lines = parsed.stats.total();
        let remote_latest = parsed.latest_draw_number().ok_or(AppError::NoValidData)?;

        let state = self.repo.load_sync_state().await?;
        let local_latest = match state.local_latest_draw_number {
            Some(n) => Some(n),
            None => self.repo.get_latest_draw_number().await?,
        };

        let (strategy, records): (SyncStrategy, Vec<DrawRecord>) = match local_latest {
            None => (SyncStrategy::FullLoad, parsed.records),
            Some(local) if remote_latest > local => {
                (SyncStrategy::IncrementalLoad, parsed.retain_after(local).records)
            }
            Some(local) => {
                if remote_latest < local {
                    warn!(
                        local_latest = local,
                        remote_latest,
                        "[SYNC] remote dataset is behind local store ({remote_latest} < {local}), keeping local draws",
                    );
                }
                (SyncStrategy::StatisticsOnly, Vec::new())
            }
        };

        let added = if records.is_empty() {
            Vec::new()
        } else {
            self.repo.upsert_records(&records).await?
        };

        self.repo
            .save_sync_state(&SyncState {
                local_latest_draw_number: self.repo.get_latest_draw_number().await?,
                last_sync_timestamp: Some(Utc::now()),
            })
            .await?;

        self.aggregator.recompute().await?;

        let result = SyncResult {
            strategy,
            records_added: added.len(),
            total_records: self.repo.get_total_draw_count().await?,
            rejected_lines,
        };
        info!(
            strategy = %result.strategy,
            added = result.records_added,
            total = result.total_records,
            rejected = result.rejected_lines,
            local_latest = ?local_latest,
            remote_latest,
            "[SYNC] {}: +{} draws, {} total",
            result.strategy,
            result.records_added,
            result.total_records,
        );
        Ok(result)
    }
}
