use super::util::with_retry;
use crate::core::price::{PriceProvider, PriceResult};
use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, instrument};

const QUOTE_CURRENCY: &str = "USD";

/// Latest USD quotes from the CoinMarketCap pro API.
pub struct CoinMarketCapProvider {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl CoinMarketCapProvider {
    pub fn new(base_url: &str, api_key: Option<String>, client: reqwest::Client) -> Self {
        CoinMarketCapProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client,
        }
    }
}

#[derive(Debug, Deserialize)]
struct QuoteResponse {
    status: QuoteStatus,
    #[serde(default)]
    data: HashMap<String, QuoteAsset>,
}

#[derive(Debug, Deserialize)]
struct QuoteStatus {
    error_code: i64,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QuoteAsset {
    quote: HashMap<String, Quote>,
}

#[derive(Debug, Deserialize)]
struct Quote {
    price: Option<f64>,
}

#[async_trait]
impl PriceProvider for CoinMarketCapProvider {
    #[instrument(
        name = "CoinMarketCapQuote",
        skip(self),
        fields(symbol = %symbol)
    )]
    async fn fetch_price(&self, symbol: &str) -> Result<PriceResult> {
        let Some(api_key) = self.api_key.as_deref() else {
            bail!("No CoinMarketCap API key configured, cannot price {symbol}");
        };

        let symbol_upper = symbol.to_uppercase();
        let url = format!(
            "{}/v1/cryptocurrency/quotes/latest?symbol={}",
            self.base_url, symbol_upper
        );
        debug!("Requesting quote from {}", url);

        let response = with_retry(
            || {
                self.client
                    .get(&url)
                    .header("Accepts", "application/json")
                    .header("X-CMC_PRO_API_KEY", api_key)
                    .send()
            },
            2,
            500,
        )
        .await
        .with_context(|| format!("Quote request failed for symbol: {symbol}"))?;

        if !response.status().is_success() {
            bail!("HTTP error: {} for symbol: {}", response.status(), symbol);
        }

        let text = response.text().await?;
        let data: QuoteResponse = serde_json::from_str(&text)
            .map_err(|e| anyhow!("Failed to parse JSON response for {}: {}", symbol, e))?;

        if data.status.error_code != 0 {
            bail!(
                "Quote error {} for symbol {}: {}",
                data.status.error_code,
                symbol,
                data.status.error_message.unwrap_or_default()
            );
        }

        let price = data
            .data
            .get(&symbol_upper)
            .and_then(|asset| asset.quote.get(QUOTE_CURRENCY))
            .and_then(|quote| quote.price)
            .ok_or_else(|| anyhow!("No quote found for symbol: {}", symbol))?;

        Ok(PriceResult {
            price,
            currency: QUOTE_CURRENCY.to_string(),
        })
    }
}
