//! Raw price strings to whole Rupiah

use once_cell::sync::Lazy;
use regex_lite::Regex;

use crate::domain::entities::{CleanedPrice, PriceSet, RawPriceToken};

pub const DEFAULT_MIN_PRICE: CleanedPrice = 1_000;
pub const DEFAULT_MAX_PRICE: CleanedPrice = 1_000_000_000;

/// Dot-grouped numeral (`1.500.000`) or a plain digit run (`1500000`)
static NUMERAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d{1,3}(?:\.\d{3})+|\d+").expect("numeral pattern is valid"));

/// Parses price tokens and rejects anything outside the plausibility band
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceCleaner {
    min_price: CleanedPrice,
    max_price: CleanedPrice,
}

impl PriceCleaner {
    pub fn new(min_price: CleanedPrice, max_price: CleanedPrice) -> Self {
        Self { min_price, max_price }
    }

    /// `"Rp 1.500.000 saja"` → `Some(1500000)`, `"gratis ongkir"` → `None`
    pub fn clean(&self, token: &str) -> Option<CleanedPrice> {
        let numeral = NUMERAL.find(strip_currency(token))?;
        let value: CleanedPrice = numeral.as_str().replace('.', "").parse().ok()?;

        (self.min_price..=self.max_price)
            .contains(&value)
            .then_some(value)
    }

    /// Clean every token of one source, dropping the ones that do not parse
    pub fn clean_all(&self, tokens: &[RawPriceToken]) -> PriceSet {
        tokens.iter().filter_map(|token| self.clean(token)).collect()
    }
}

impl Default for PriceCleaner {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_PRICE, DEFAULT_MAX_PRICE)
    }
}

fn strip_currency(token: &str) -> &str {
    let token = token.trim();
    let rest = match token.get(..2) {
        Some(marker) if marker.eq_ignore_ascii_case("rp") => &token[2..],
        _ => token,
    };
    rest.trim_start_matches(|c: char| c == '.' || c.is_whitespace())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_grouped_numeral() {
        let cleaner = PriceCleaner::default();
        assert_eq!(cleaner.clean("Rp 1.500.000 saja"), Some(1_500_000));
        assert_eq!(cleaner.clean("Rp15.000.000"), Some(15_000_000));
        assert_eq!(cleaner.clean("rp. 250.000"), Some(250_000));
        assert_eq!(cleaner.clean("Rp\u{a0}7.999.000"), Some(7_999_000));
    }

    #[test]
    fn test_clean_plain_digits_and_decimals() {
        let cleaner = PriceCleaner::default();
        assert_eq!(cleaner.clean("Rp15000000"), Some(15_000_000));
        assert_eq!(cleaner.clean("Rp 1.500.000,00"), Some(1_500_000));
        assert_eq!(cleaner.clean("2.499.000"), Some(2_499_000));
    }

    #[test]
    fn test_clean_takes_leading_numeral() {
        let cleaner = PriceCleaner::default();
        assert_eq!(cleaner.clean("Rp 15.000.000 - Rp 20.000.000"), Some(15_000_000));
    }

    #[test]
    fn test_clean_rejects_tokens_without_numeral() {
        let cleaner = PriceCleaner::default();
        assert_eq!(cleaner.clean("gratis ongkir"), None);
        assert_eq!(cleaner.clean("Rp"), None);
        assert_eq!(cleaner.clean(""), None);
    }

    #[test]
    fn test_clean_enforces_band() {
        let cleaner = PriceCleaner::default();
        assert_eq!(cleaner.clean("Rp 999"), None);
        assert_eq!(cleaner.clean("Rp 1.000"), Some(1_000));
        assert_eq!(cleaner.clean("Rp 1.000.000.000"), Some(1_000_000_000));
        assert_eq!(cleaner.clean("Rp 1.000.000.001"), None);
        assert_eq!(cleaner.clean("Rp 99999999999999999999999"), None);

        let narrow = PriceCleaner::new(500_000, 50_000_000);
        assert_eq!(narrow.clean("Rp 250.000"), None);
        assert_eq!(narrow.clean("Rp 5.000.000"), Some(5_000_000));
    }

    #[test]
    fn test_clean_all_dedupes_and_drops_garbage() {
        let cleaner = PriceCleaner::default();
        let tokens: Vec<RawPriceToken> = vec![
            "Rp 1.500.000".into(),
            "Rp1.500.000".into(),
            "diskon".into(),
            "Rp 2.000.000".into(),
            "Rp 5".into(),
        ];
        let prices = cleaner.clean_all(&tokens);
        assert_eq!(prices.into_iter().collect::<Vec<_>>(), vec![1_500_000, 2_000_000]);
    }
}
