//! Satoshi / BTC unit conversion

/// Base units (satoshis) per display unit (BTC)
pub const SATS_PER_BTC: u64 = 100_000_000;

/// Base units per displayed hundredth of a BTC
const SATS_PER_CENT: u64 = SATS_PER_BTC / 100;

/// Full-precision conversion for API payloads.
///
/// Every supply the chain can reach (< 2^53 satoshis) converts exactly
/// before the single division, so the result is the closest `f64`.
pub fn to_display_units(base_units: u64) -> f64 {
    base_units as f64 / SATS_PER_BTC as f64
}

/// Two-decimal, comma-grouped text for images and frame documents,
/// e.g. `1984752345000000` -> `"19,847,523.45"`. Rounds half up.
pub fn format_display(base_units: u64) -> String {
    let mut cents = base_units / SATS_PER_CENT;
    if base_units % SATS_PER_CENT >= SATS_PER_CENT / 2 {
        cents += 1;
    }
    format!("{}.{:02}", group_thousands(cents / 100), cents % 100)
}

/// Format large numbers with thousands separators (e.g. 50_669_803 -> "50,669,803")
fn group_thousands(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::new();
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}
