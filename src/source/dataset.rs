use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{CACHE_CONTROL, EXPIRES, IF_MODIFIED_SINCE, IF_NONE_MATCH, PRAGMA};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::{Config, DATASET_HEADER_SIGNATURE, MIN_DATASET_BYTES, USER_AGENT};
use crate::error::{AppError, FetchError, Result};
use crate::parser::parse_dataset;
use crate::sync::RecordSink;
use crate::types::DrawRecord;

/// A dataset body that passed validation.
#[derive(Debug, Clone)]
pub struct RawDataset {
    pub text: String,
    pub fetched_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// RemoteFetcher
// ---------------------------------------------------------------------------

/// Downloads the dataset from the primary mirror. Every request carries a
/// unique query string and cache-defeat headers so CDN edges cannot serve a
/// stale copy. Performs no retries.
pub struct RemoteFetcher {
    client: reqwest::Client,
    url: String,
}

impl RemoteFetcher {
    pub fn new(cfg: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(cfg.fetch_connect_timeout)
            .read_timeout(cfg.fetch_read_timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client, url: cfg.dataset_url.clone() })
    }

    pub async fn fetch(&self) -> std::result::Result<RawDataset, FetchError> {
        let url = cache_bust_url(&self.url);
        debug!("Fetching dataset: {url}");

        let resp = self
            .client
            .get(&url)
            .header(CACHE_CONTROL, "no-cache, no-store, must-revalidate, max-age=0")
            .header(PRAGMA, "no-cache")
            .header(EXPIRES, "0")
            .header(IF_MODIFIED_SINCE, "Thu, 01 Jan 1970 00:00:00 GMT")
            .header(IF_NONE_MATCH, "\"\"")
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "Dataset fetch failed: HTTP {status}");
            return Err(FetchError::Status(status.as_u16()));
        }

        let text = resp.text().await?;
        validate_body(&text)?;

        info!(bytes = text.len(), "Dataset fetched ({} bytes)", text.len());
        Ok(RawDataset { text, fetched_at: Utc::now() })
    }
}

/// Append `t=<unix millis>&r=<nonce>` so every request has a unique URL.
fn cache_bust_url(base: &str) -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let nonce: u64 = rand::random();
    let sep = if base.contains('?') { '&' } else { '?' };
    format!("{base}{sep}t={millis}&r={nonce:016x}")
}

/// Reject truncated transfers and unrelated pages (error pages, captive portals).
pub fn validate_body(body: &str) -> std::result::Result<(), FetchError> {
    if body.len() < MIN_DATASET_BYTES {
        return Err(FetchError::TooShort { len: body.len() });
    }
    if !body.contains(DATASET_HEADER_SIGNATURE) {
        return Err(FetchError::MissingSignature);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// DatasetCache
// ---------------------------------------------------------------------------

/// Local copy of the dataset. Replaced by each successful fetch, extended by
/// the gap filler, and read by the reconciler. Falls back to an optional seed
/// file when nothing has been downloaded yet.
pub struct DatasetCache {
    path: PathBuf,
    seed_path: Option<PathBuf>,
    /// Serialises read-modify-write cycles on the file.
    write_lock: Mutex<()>,
}

impl DatasetCache {
    pub fn new(path: impl Into<PathBuf>, seed_path: Option<PathBuf>) -> Self {
        Self { path: path.into(), seed_path, write_lock: Mutex::new(()) }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(cfg.dataset_cache_path.clone(), cfg.dataset_seed_path.clone())
    }

    /// Replace the cached dataset with a freshly fetched one.
    pub async fn store(&self, raw: &RawDataset) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.write_atomic(&raw.text).await?;
        info!(path = %self.path.display(), "Dataset cache updated");
        Ok(())
    }

    /// Cached dataset text, seeding the cache from the bundled file on first use.
    pub async fn load(&self) -> Result<Option<String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => return Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let Some(seed) = &self.seed_path else {
            return Ok(None);
        };
        match tokio::fs::read_to_string(seed).await {
            Ok(text) => {
                let _guard = self.write_lock.lock().await;
                self.write_atomic(&text).await?;
                info!(seed = %seed.display(), "Dataset cache seeded from bundled file");
                Ok(Some(text))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(seed = %seed.display(), "Dataset seed file not found");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Latest valid draw number in the cached dataset.
    pub async fn latest_draw_number(&self) -> Result<Option<u32>> {
        Ok(self.load().await?.and_then(|text| parse_dataset(&text).latest_draw_number()))
    }

    async fn write_atomic(&self, text: &str) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, text).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl RecordSink for DatasetCache {
    /// Insert the record directly after the header; the dataset is newest-first.
    async fn append(&self, record: &DrawRecord) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AppError::Invalid("dataset cache does not exist yet".to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let (header, rest) = match text.split_once('\n') {
            Some((h, r)) => (h.trim_end_matches('\r'), r),
            None => (text.as_str(), ""),
        };

        let mut updated = String::with_capacity(text.len() + 48);
        updated.push_str(header);
        updated.push('\n');
        updated.push_str(&record.to_dataset_line());
        updated.push('\n');
        updated.push_str(rest);

        self.write_atomic(&updated).await?;
        debug!(draw = record.draw_number(), "Appended draw to dataset cache");
        Ok(())
    }
}
