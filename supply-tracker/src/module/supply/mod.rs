//! Bitcoin circulating-supply acquisition
//!
//! ## Main Components
//! - `units`: satoshi -> BTC conversion and display formatting
//! - `HttpSupplyFetcher`: one live request to the configured provider per call
//! - `SupplyCache`: 30 second get-or-refresh wrapper around any `SupplySource`

mod types;
pub use types::{Provider, SupplyReading, SupplyStats, MAX_SUPPLY_BTC};

pub mod units;

mod fetcher;
pub use fetcher::{HttpSupplyFetcher, SupplySource, parse_supply_body};

mod cache;
pub use cache::{SupplyCache, SUPPLY_TTL};

#[cfg(test)]
pub(crate) mod testing;
