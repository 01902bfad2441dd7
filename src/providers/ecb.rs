//! ECB euro foreign exchange reference rates, cached on disk.

use super::util::with_retry;
use crate::core::rates::{ExchangeRateTable, RateCache};
use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use chrono::Utc;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, instrument};

const ARCHIVE_DIR: &str = "currency_converter";
const ARCHIVE_NAME: &str = "eurofxref-hist.zip";
const LAST_UPDATE_NAME: &str = "last_update_time.txt";
const ARCHIVE_PATH: &str = "/stats/eurofxref/eurofxref-hist.zip";

/// Keeps the ECB historical rates archive under `data_dir`.
///
/// The refresh time is stored next to it as plain text seconds since the Unix epoch.
pub struct EcbRateCache {
    base_url: String,
    data_dir: PathBuf,
    refresh_after: Duration,
    client: reqwest::Client,
}

impl EcbRateCache {
    pub fn new(
        base_url: &str,
        data_dir: impl Into<PathBuf>,
        refresh_after: Duration,
        client: reqwest::Client,
    ) -> Self {
        EcbRateCache {
            base_url: base_url.trim_end_matches('/').to_string(),
            data_dir: data_dir.into(),
            refresh_after,
            client,
        }
    }

    pub fn archive_path(&self) -> PathBuf {
        self.data_dir.join(ARCHIVE_DIR).join(ARCHIVE_NAME)
    }

    pub fn last_update_path(&self) -> PathBuf {
        self.data_dir.join(LAST_UPDATE_NAME)
    }

    /// Seconds since the epoch of the last successful refresh, 0 when unknown.
    pub fn last_update(&self) -> f64 {
        fs::read_to_string(self.last_update_path())
            .ok()
            .and_then(|text| text.trim().parse::<f64>().ok())
            .unwrap_or(0.0)
    }

    fn save_last_update(&self) -> Result<()> {
        let path = self.last_update_path();
        fs::write(&path, now_secs().to_string())
            .with_context(|| format!("Failed to write {}", path.display()))
    }
}

fn now_secs() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

fn read_archive(path: &Path) -> Result<ExchangeRateTable> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut archive = zip::ZipArchive::new(file)
        .with_context(|| format!("Failed to read archive {}", path.display()))?;

    for index in 0..archive.len() {
        let entry = archive.by_index(index)?;
        if entry.name().ends_with(".csv") {
            debug!("Reading {} from {}", entry.name(), path.display());
            return ExchangeRateTable::from_ecb_csv(entry);
        }
    }
    Err(anyhow!("No CSV file in archive {}", path.display()))
}

#[async_trait]
impl RateCache for EcbRateCache {
    fn is_stale(&self) -> bool {
        if !self.archive_path().exists() {
            return true;
        }
        now_secs() - self.last_update() > self.refresh_after.as_secs_f64()
    }

    #[instrument(name = "EcbRefresh", skip(self))]
    async fn refresh(&self) -> Result<()> {
        let archive_path = self.archive_path();
        if let Some(parent) = archive_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        if archive_path.exists() {
            fs::remove_file(&archive_path)
                .with_context(|| format!("Failed to remove {}", archive_path.display()))?;
        }

        let url = format!("{}{}", self.base_url, ARCHIVE_PATH);
        info!("Downloading {}", url);
        let response = with_retry(|| self.client.get(&url).send(), 2, 500)
            .await
            .context("Exchange rate download failed")?;

        if !response.status().is_success() {
            bail!("HTTP error: {} downloading {}", response.status(), url);
        }

        let bytes = response
            .bytes()
            .await
            .context("Failed to read exchange rate archive")?;
        fs::write(&archive_path, &bytes)
            .with_context(|| format!("Failed to write {}", archive_path.display()))?;
        self.save_last_update()?;
        debug!(bytes = bytes.len(), "Saved exchange rate archive");
        Ok(())
    }

    fn load(&self) -> Result<ExchangeRateTable> {
        read_archive(&self.archive_path())
    }
}
