//! Interquartile-range outlier rejection

use crate::domain::entities::{CleanedPrice, PriceSet};

/// Below this many prices quartiles are meaningless and nothing is dropped
pub const MIN_SAMPLE: usize = 4;

/// Tukey fence multiplier
pub const DEFAULT_FENCE: f64 = 1.5;

/// Keeps prices inside `[Q1 - k·IQR, Q3 + k·IQR]`.
///
/// Quartiles are the medians of the lower and upper halves of the sorted
/// set; for an odd count the middle element belongs to neither half.
/// The output is always a subset of the input and is never empty when the
/// input is not.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutlierFilter {
    fence: f64,
}

impl OutlierFilter {
    pub fn new(fence: f64) -> Self {
        Self { fence }
    }

    pub fn filter(&self, prices: &PriceSet) -> PriceSet {
        if prices.len() < MIN_SAMPLE {
            return prices.clone();
        }

        let sorted: Vec<CleanedPrice> = prices.iter().copied().collect();
        let (low, high) = self.bounds(&sorted);
        let kept: PriceSet = prices
            .iter()
            .copied()
            .filter(|&price| {
                let price = price as f64;
                price >= low && price <= high
            })
            .collect();

        if kept.is_empty() {
            tracing::debug!("Outlier bounds [{}, {}] rejected every price, keeping all", low, high);
            return prices.clone();
        }
        kept
    }

    /// Inclusive bounds for an ascending slice of at least [`MIN_SAMPLE`] values
    fn bounds(&self, sorted: &[CleanedPrice]) -> (f64, f64) {
        let (q1, q3) = quartiles(sorted);
        let iqr = q3 - q1;
        (q1 - self.fence * iqr, q3 + self.fence * iqr)
    }
}

impl Default for OutlierFilter {
    fn default() -> Self {
        Self::new(DEFAULT_FENCE)
    }
}

/// First and third quartile via lower/upper half medians
pub fn quartiles(sorted: &[CleanedPrice]) -> (f64, f64) {
    let half = sorted.len() / 2;
    let lower = &sorted[..half];
    let upper = &sorted[sorted.len() - half..];
    (median(lower), median(upper))
}

fn median(sorted: &[CleanedPrice]) -> f64 {
    match sorted.len() {
        0 => 0.0,
        n if n % 2 == 1 => sorted[n / 2] as f64,
        n => (sorted[n / 2 - 1] as f64 + sorted[n / 2] as f64) / 2.0,
    }
}
