//! Per-currency accumulation and USD summaries.
use crate::core::ledger::TransactionRow;
use crate::core::resolver::{RateResolver, Resolution};
use crate::core::token::{ParsedAmount, parse_amount};
use std::collections::BTreeMap;
use tracing::debug;

/// Accumulated amount per currency code, ordered by code.
pub type CurrencyTotals = BTreeMap<String, f64>;

/// A currency total that no price source could convert.
#[derive(Debug, Clone, PartialEq)]
pub struct UnrecognizedEntry {
    pub currency: String,
    pub total: f64,
}

/// One reported currency of a summary. `usd` is `None` when unresolved.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrencyLine {
    pub currency: String,
    pub total: f64,
    pub usd: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Summary {
    pub lines: Vec<CurrencyLine>,
    pub total_usd: f64,
    pub unresolved: Vec<UnrecognizedEntry>,
}

/// Sums the amounts found in the field selected by `field` for each row.
///
/// Cells that do not parse contribute nothing.
pub fn accumulate<'a, I, F>(rows: I, field: F) -> CurrencyTotals
where
    I: IntoIterator<Item = &'a TransactionRow>,
    F: Fn(&'a TransactionRow) -> &'a str,
{
    let mut totals = CurrencyTotals::new();
    let mut skipped = 0usize;
    for row in rows {
        match parse_amount(field(row)) {
            ParsedAmount::Parsed { amount, currency } => {
                *totals.entry(currency).or_insert(0.0) += amount;
            }
            ParsedAmount::NoMatch => skipped += 1,
        }
    }
    if skipped > 0 {
        debug!(skipped, "Rows without an amount token");
    }
    totals
}

/// Converts each total to USD through `resolver`.
///
/// Every currency appears once in `lines`. Unresolved currencies are left out
/// of `total_usd` and listed in `unresolved` in the order they were met.
/// `update_callback` runs after each currency is resolved.
pub async fn summarize(
    totals: &CurrencyTotals,
    resolver: &RateResolver,
    update_callback: &(dyn Fn()),
) -> Summary {
    let mut summary = Summary::default();

    for (currency, total) in totals {
        let usd = match resolver.resolve(currency).await {
            Resolution::Usd(price) => {
                let value = total * price;
                summary.total_usd += value;
                Some(value)
            }
            Resolution::Unresolved => {
                summary.unresolved.push(UnrecognizedEntry {
                    currency: currency.clone(),
                    total: *total,
                });
                None
            }
        };
        summary.lines.push(CurrencyLine {
            currency: currency.clone(),
            total: *total,
            usd,
        });
        update_callback();
    }

    summary
}
