use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::units::{SATS_PER_BTC, to_display_units, format_display};

/// Protocol cap on issuance
pub const MAX_SUPPLY_BTC: u64 = 21_000_000;

/// One successful upstream observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplyReading {
    /// Circulating supply in satoshis
    pub base_units: u64,
    /// `base_units / 10^8`
    pub display_units: f64,
    pub fetched_at: DateTime<Utc>,
}

impl SupplyReading {
    pub fn new(base_units: u64, fetched_at: DateTime<Utc>) -> Self {
        Self {
            base_units,
            display_units: to_display_units(base_units),
            fetched_at,
        }
    }

    /// Two-decimal text used in images and frame documents
    pub fn display_text(&self) -> String {
        format_display(self.base_units)
    }
}

/// Supported supply-statistics providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    /// Plain-text integer satoshis
    #[default]
    BlockchainInfo,
    /// JSON stats document with `data.circulation` in satoshis
    Blockchair,
}

impl Provider {
    pub fn default_url(&self) -> &'static str {
        match self {
            Provider::BlockchainInfo => "https://blockchain.info/q/totalbc",
            Provider::Blockchair => "https://api.blockchair.com/bitcoin/stats",
        }
    }
}

/// Derived figures served by `/btc`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SupplyStats {
    pub btc_mined: f64,
    pub sats_mined: u64,
    pub updated_at: DateTime<Utc>,
    pub max_supply: u64,
    pub remaining: f64,
    /// Share of the cap already issued, rounded to 4 decimals
    pub percent_mined: f64,
}

impl From<&SupplyReading> for SupplyStats {
    fn from(reading: &SupplyReading) -> Self {
        let max_sats = MAX_SUPPLY_BTC * SATS_PER_BTC;
        let remaining_sats = max_sats.saturating_sub(reading.base_units);
        let percent = reading.base_units as f64 / max_sats as f64 * 100.0;

        Self {
            btc_mined: reading.display_units,
            sats_mined: reading.base_units,
            updated_at: reading.fetched_at,
            max_supply: MAX_SUPPLY_BTC,
            remaining: to_display_units(remaining_sats),
            percent_mined: (percent * 10_000.0).round() / 10_000.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reading_converts_units() {
        let reading = SupplyReading::new(1_984_752_345_000_000, Utc::now());
        assert_eq!(reading.display_units, 19_847_523.45);
        assert_eq!(reading.display_text(), "19,847,523.45");
    }

    #[test]
    fn test_stats_from_reading() {
        let reading = SupplyReading::new(1_984_752_345_000_000, Utc::now());
        let stats = SupplyStats::from(&reading);
        assert_eq!(stats.sats_mined, 1_984_752_345_000_000);
        assert_eq!(stats.max_supply, 21_000_000);
        assert_eq!(stats.remaining, 1_152_476.55);
        assert_eq!(stats.percent_mined, 94.5120);

        let json = serde_json::to_value(&stats).unwrap();
        assert!(json.get("btcMined").is_some());
        assert!(json.get("percentMined").is_some());
    }

    #[test]
    fn test_provider_serde_names() {
        let p: Provider = serde_json::from_str("\"blockchain_info\"").unwrap();
        assert_eq!(p, Provider::BlockchainInfo);
        let p: Provider = serde_json::from_str("\"blockchair\"").unwrap();
        assert_eq!(p, Provider::Blockchair);
    }
}
