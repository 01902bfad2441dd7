pub mod cli;
pub mod core;
pub mod providers;

use crate::cli::session::{Session, SessionExit};
use crate::cli::terminal::{ConsoleTerminal, Terminal, select_file};
use crate::cli::ui;
use crate::core::RateResolver;
use crate::core::config::AppConfig;
use crate::providers::caching::CachingPriceProvider;
use crate::providers::coinmarketcap::CoinMarketCapProvider;
use crate::providers::ecb::EcbRateCache;
use crate::providers::spreadsheet::load_ledger;
use crate::providers::util::http_client;
use anyhow::Result;
use tracing::{debug, info, warn};

pub async fn run(config_path: Option<&str>) -> Result<()> {
    info!("Wager tally starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let mut terminal = ConsoleTerminal::new();
    run_with_terminal(&config, &mut terminal).await
}

/// Builds the price sources once, then processes transaction logs until the
/// user quits or cancels file selection.
pub async fn run_with_terminal(config: &AppConfig, terminal: &mut dyn Terminal) -> Result<()> {
    let resolver = build_resolver(config)?;

    loop {
        let Some(path) = select_file(terminal)? else {
            info!("No file selected");
            return Ok(());
        };

        let ledger = match load_ledger(&path, &config.columns) {
            Ok(ledger) => ledger,
            Err(e) => {
                warn!(error = %e, path = %path.display(), "Rejected transaction log");
                terminal.print(&ui::style_text(&e.to_string(), ui::StyleType::Error));
                continue;
            }
        };

        let mut session = Session::new(ledger, config, &resolver);
        match session.run(terminal).await? {
            SessionExit::Quit => return Ok(()),
            SessionExit::Restart => terminal.print(&ui::separator()),
        }
    }
}

fn build_resolver(config: &AppConfig) -> Result<RateResolver> {
    let client = http_client(config.request_timeout())?;

    let rate_cache = EcbRateCache::new(
        &config.providers.ecb.base_url,
        config.default_data_path()?,
        config.refresh_after(),
        client.clone(),
    );

    let api_key = config.coinmarketcap_api_key();
    if api_key.is_none() {
        warn!("No CoinMarketCap API key set, cryptocurrency quotes are unavailable");
    }
    let quotes = CachingPriceProvider::new(CoinMarketCapProvider::new(
        &config.providers.coinmarketcap.base_url,
        api_key,
        client,
    ));

    Ok(RateResolver::new(
        Box::new(rate_cache),
        Box::new(quotes),
        config.fixed_prices.clone(),
    ))
}
