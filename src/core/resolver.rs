//! Resolves currency codes to a USD price from several sources.

use crate::core::price::PriceProvider;
use crate::core::rates::{ExchangeRateTable, RateCache, initialize_rate_table};
use std::collections::HashMap;
use tokio::sync::OnceCell;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resolution {
    /// USD value of one unit of the currency.
    Usd(f64),
    Unresolved,
}

/// Looks up USD prices, first match wins:
///
/// 1. the historical exchange rate table,
/// 2. the fixed price overrides,
/// 3. the remote quote provider.
///
/// The rate table is loaded on first use and kept for the life of the resolver.
pub struct RateResolver {
    rate_cache: Box<dyn RateCache>,
    table: OnceCell<Option<ExchangeRateTable>>,
    quotes: Box<dyn PriceProvider>,
    fixed_prices: HashMap<String, f64>,
}

impl RateResolver {
    pub fn new(
        rate_cache: Box<dyn RateCache>,
        quotes: Box<dyn PriceProvider>,
        fixed_prices: HashMap<String, f64>,
    ) -> Self {
        Self {
            rate_cache,
            table: OnceCell::new(),
            quotes,
            fixed_prices,
        }
    }

    /// The exchange rate table, or `None` if it could not be loaded this run.
    pub async fn rate_table(&self) -> Option<&ExchangeRateTable> {
        self.table
            .get_or_init(|| initialize_rate_table(self.rate_cache.as_ref()))
            .await
            .as_ref()
    }

    pub async fn resolve(&self, currency: &str) -> Resolution {
        if let Some(price) = self
            .rate_table()
            .await
            .and_then(|table| table.usd_price(currency))
        {
            debug!(currency, price, "Resolved from exchange rate table");
            return Resolution::Usd(price);
        }

        if let Some(price) = self.fixed_prices.get(currency) {
            debug!(currency, price, "Resolved from fixed prices");
            return Resolution::Usd(*price);
        }

        match self.quotes.fetch_price(currency).await {
            Ok(quote) => {
                debug!(currency, price = quote.price, "Resolved from remote quote");
                Resolution::Usd(quote.price)
            }
            Err(e) => {
                debug!(currency, error = %e, "No price source for currency");
                Resolution::Unresolved
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::core::price::PriceResult;
    use anyhow::{Result, anyhow};
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// A rate cache that serves a fixed table and never touches disk.
    pub struct StaticRateCache(pub Option<ExchangeRateTable>);

    #[async_trait]
    impl RateCache for StaticRateCache {
        fn is_stale(&self) -> bool {
            false
        }

        async fn refresh(&self) -> Result<()> {
            Ok(())
        }

        fn load(&self) -> Result<ExchangeRateTable> {
            self.0.clone().ok_or_else(|| anyhow!("no table"))
        }
    }

    /// Quote provider answering from a map and counting every call.
    #[derive(Clone, Default)]
    pub struct StaticQuotes {
        pub prices: HashMap<String, f64>,
        pub calls: Arc<AtomicUsize>,
    }

    impl StaticQuotes {
        pub fn with(prices: &[(&str, f64)]) -> Self {
            Self {
                prices: prices.iter().map(|(s, p)| (s.to_string(), *p)).collect(),
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PriceProvider for StaticQuotes {
        async fn fetch_price(&self, symbol: &str) -> Result<PriceResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prices
                .get(symbol)
                .map(|price| PriceResult {
                    price: *price,
                    currency: "USD".to_string(),
                })
                .ok_or_else(|| anyhow!("No quote found for symbol: {symbol}"))
        }
    }

    pub fn default_fixed_prices() -> HashMap<String, f64> {
        crate::core::config::AppConfig::default().fixed_prices
    }

    /// Resolver with an ECB-like table (USD at 1.1 per EUR) and the given quotes.
    pub fn resolver(quotes: StaticQuotes) -> RateResolver {
        let table = ExchangeRateTable::from_rates([("USD", 1.1), ("JPY", 165.0)]);
        RateResolver::new(
            Box::new(StaticRateCache(Some(table))),
            Box::new(quotes),
            default_fixed_prices(),
        )
    }
}
