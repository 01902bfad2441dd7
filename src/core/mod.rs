//! Core business logic: parsing, filtering, aggregation and price resolution

pub mod aggregate;
pub mod config;
pub mod ledger;
pub mod log;
pub mod price;
pub mod rates;
pub mod resolver;
pub mod token;

// Re-export main types for cleaner imports
pub use aggregate::{CurrencyTotals, Summary, UnrecognizedEntry};
pub use ledger::{DateRange, Ledger, LedgerError, TransactionRow};
pub use price::{PriceProvider, PriceResult};
pub use rates::{ExchangeRateTable, RateCache};
pub use resolver::{RateResolver, Resolution};
