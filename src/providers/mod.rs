pub mod caching;
pub mod coinmarketcap;
pub mod ecb;
pub mod spreadsheet;
pub mod util;
