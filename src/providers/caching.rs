use crate::core::price::{PriceProvider, PriceResult};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Keeps successful quotes of the inner provider for the life of the process.
///
/// Failures are not stored, so a symbol that could not be priced is asked
/// for again on the next pass.
#[derive(Clone)]
pub struct CachingPriceProvider<T: PriceProvider> {
    inner: T,
    quotes: Arc<RwLock<HashMap<String, PriceResult>>>,
}

impl<T: PriceProvider> CachingPriceProvider<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            quotes: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

#[async_trait]
impl<T: PriceProvider + Send + Sync> PriceProvider for CachingPriceProvider<T> {
    async fn fetch_price(&self, symbol: &str) -> Result<PriceResult> {
        if let Some(quote) = self.quotes.read().await.get(symbol) {
            debug!(symbol, "Quote cache hit");
            return Ok(quote.clone());
        }

        debug!(symbol, "Quote cache miss");
        let quote = self.inner.fetch_price(symbol).await?;
        self.quotes
            .write()
            .await
            .insert(symbol.to_string(), quote.clone());
        Ok(quote)
    }
}
