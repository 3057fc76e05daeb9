use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

/// Price-like substring lifted from a source page, e.g. `"Rp 1.500.000"`
pub type RawPriceToken = String;

/// Whole Rupiah
pub type CleanedPrice = u64;

/// Distinct cleaned prices, kept in ascending order
pub type PriceSet = BTreeSet<CleanedPrice>;

/// Aggregate estimate for one query. `min <= avg <= max` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceSummary {
    pub min: CleanedPrice,
    pub max: CleanedPrice,
    pub avg: CleanedPrice,
}

impl PriceSummary {
    /// Summarize a price set, `None` when it is empty.
    ///
    /// The average is the arithmetic mean rounded half up.
    pub fn from_prices(prices: &PriceSet) -> Option<Self> {
        let min = *prices.first()?;
        let max = *prices.last()?;

        let count = prices.len() as u128;
        let sum: u128 = prices.iter().map(|&p| u128::from(p)).sum();
        let avg = ((sum + count / 2) / count) as CleanedPrice;

        Some(Self { min, max, avg })
    }
}

impl fmt::Display for PriceSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Min: {}\nMax: {}\nAverage: {}",
            format_rupiah(self.min),
            format_rupiah(self.max),
            format_rupiah(self.avg)
        )
    }
}

/// Format an amount the Indonesian way: `Rp1.500.000`
pub fn format_rupiah(amount: CleanedPrice) -> String {
    let digits = amount.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 2);
    grouped.push_str("Rp");

    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }
    grouped
}

/// A summary together with the moment it was written to the cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedSummary {
    pub summary: PriceSummary,
    pub cached_at: DateTime<Utc>,
}

impl CachedSummary {
    pub fn new(summary: PriceSummary) -> Self {
        Self {
            summary,
            cached_at: Utc::now(),
        }
    }

    /// `None` ttl means the entry never expires
    pub fn is_expired(&self, ttl: Option<Duration>, now: DateTime<Utc>) -> bool {
        let Some(ttl) = ttl else {
            return false;
        };
        match chrono::Duration::from_std(ttl) {
            Ok(ttl) => now.signed_duration_since(self.cached_at) >= ttl,
            Err(_) => false,
        }
    }
}
