//! Historical EUR-based exchange rates and the cache that backs them.

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::io::Read;
use tracing::{debug, info, warn};

const BASE_CURRENCY: &str = "EUR";
const REPORTING_CURRENCY: &str = "USD";

/// Latest known rate of each currency against one EUR.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExchangeRateTable {
    rates: HashMap<String, f64>,
    as_of: Option<NaiveDate>,
}

impl ExchangeRateTable {
    /// Builds a table from `(currency, units per EUR)` pairs. EUR itself is always present.
    pub fn from_rates<I, S>(rates: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let mut rates: HashMap<String, f64> = rates
            .into_iter()
            .map(|(currency, rate)| (currency.into(), rate))
            .collect();
        rates.insert(BASE_CURRENCY.to_string(), 1.0);
        Self { rates, as_of: None }
    }

    /// Reads the ECB historical CSV (`Date,USD,JPY,...`).
    ///
    /// For each currency the value from the most recent date that has one is kept;
    /// `N/A` and empty cells are skipped.
    pub fn from_ecb_csv<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers: Vec<String> = csv_reader
            .headers()
            .context("Failed to read exchange rate header")?
            .iter()
            .map(str::to_string)
            .collect();

        let mut latest: HashMap<String, (NaiveDate, f64)> = HashMap::new();
        let mut as_of: Option<NaiveDate> = None;

        for record in csv_reader.records() {
            let record = record.context("Failed to read exchange rate record")?;
            let Some(date) = record
                .get(0)
                .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
            else {
                continue;
            };
            as_of = as_of.max(Some(date));

            for (currency, value) in headers.iter().zip(record.iter()).skip(1) {
                if currency.is_empty() {
                    continue;
                }
                let Ok(rate) = value.parse::<f64>() else {
                    continue;
                };
                if rate <= 0.0 {
                    continue;
                }
                match latest.get(currency) {
                    Some((seen, _)) if *seen >= date => {}
                    _ => {
                        latest.insert(currency.clone(), (date, rate));
                    }
                }
            }
        }

        if latest.is_empty() {
            return Err(anyhow!("Exchange rate data contains no rates"));
        }

        let mut table = Self::from_rates(latest.into_iter().map(|(c, (_, rate))| (c, rate)));
        table.as_of = as_of;
        debug!(currencies = table.len(), ?as_of, "Parsed exchange rate table");
        Ok(table)
    }

    pub fn contains(&self, currency: &str) -> bool {
        self.rates.contains_key(currency)
    }

    /// USD value of one unit of `currency`, converted through EUR.
    pub fn usd_price(&self, currency: &str) -> Option<f64> {
        let usd = self.rates.get(REPORTING_CURRENCY)?;
        let rate = self.rates.get(currency)?;
        Some(usd / rate)
    }

    pub fn as_of(&self) -> Option<NaiveDate> {
        self.as_of
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}

/// Local storage of the exchange rate table.
#[async_trait]
pub trait RateCache: Send + Sync {
    /// True when the stored table is missing or older than the refresh interval.
    fn is_stale(&self) -> bool;

    /// Replaces the stored table with a fresh download.
    async fn refresh(&self) -> Result<()>;

    fn load(&self) -> Result<ExchangeRateTable>;
}

/// Refreshes `cache` when stale and loads the table.
///
/// Failures are logged and yield `None`; callers fall back to other price sources.
pub async fn initialize_rate_table(cache: &dyn RateCache) -> Option<ExchangeRateTable> {
    if cache.is_stale() {
        info!("Refreshing exchange rate table");
        if let Err(e) = cache.refresh().await {
            warn!(error = %e, "Failed to refresh exchange rate table");
        }
    }

    match cache.load() {
        Ok(table) => {
            debug!(as_of = ?table.as_of(), "Exchange rate table loaded");
            Some(table)
        }
        Err(e) => {
            warn!(error = %e, "Exchange rate table unavailable");
            None
        }
    }
}
