//! Extraction of amount and currency tokens from free-text amount cells.
//!
//! A cell such as `-12.5 USDTFIAT` carries a signed number followed by a currency
//! code. Only the leading token is read; anything after the currency is ignored.

use regex::Regex;
use std::sync::LazyLock;

static AMOUNT_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([-+]?\d*\.?\d+)\s*(\w+)").expect("amount pattern is valid"));

const FIAT_SUFFIX: &str = "FIAT";

/// Outcome of reading a single amount cell.
///
/// A zero amount with a currency is a valid `Parsed` value and is distinct from
/// a cell that does not follow the `<number><currency>` grammar at all.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedAmount {
    Parsed { amount: f64, currency: String },
    NoMatch,
}

impl ParsedAmount {
    pub fn currency(&self) -> Option<&str> {
        match self {
            ParsedAmount::Parsed { currency, .. } => Some(currency),
            ParsedAmount::NoMatch => None,
        }
    }
}

/// Parses the leading amount and currency from `raw`.
///
/// The amount is always non-negative and a trailing `FIAT` marker is removed
/// from the currency code.
pub fn parse_amount(raw: &str) -> ParsedAmount {
    let Some(caps) = AMOUNT_TOKEN.captures(raw) else {
        return ParsedAmount::NoMatch;
    };

    let Ok(amount) = caps[1].parse::<f64>() else {
        return ParsedAmount::NoMatch;
    };

    let token = &caps[2];
    let currency = token.strip_suffix(FIAT_SUFFIX).unwrap_or(token);
    if currency.is_empty() {
        return ParsedAmount::NoMatch;
    }

    ParsedAmount::Parsed {
        amount: amount.abs(),
        currency: currency.to_string(),
    }
}
