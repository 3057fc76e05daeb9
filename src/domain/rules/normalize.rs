//! Query normalization - free-text question to canonical product phrase

use std::collections::{HashMap, HashSet};

use crate::domain::entities::NormalizedQuery;

/// Interrogative and filler phrases stripped from questions
pub const DEFAULT_FILLER_PHRASES: &[&str] = &[
    "berapa harga",
    "cek harga",
    "cari harga",
    "harga terbaru",
    "berapa sih",
    "berapa si",
    "kira kira",
    "harga",
    "berapa",
    "brp",
    "dong",
    "sih",
];

/// Common misspellings and abbreviations, applied word by word
pub const DEFAULT_CORRECTIONS: &[(&str, &str)] = &[
    ("ip", "iphone"),
    ("ipun", "iphone"),
    ("ipin", "iphone"),
    ("ipon", "iphone"),
    ("samsul", "samsung"),
    ("xiomi", "xiaomi"),
];

/// Bounds the correct/strip/dedupe loop when corrections chain into each other
const MAX_PASSES: usize = 4;

/// Turns user questions into cache keys.
///
/// Lowercases, drops punctuation, rewrites known misspellings, strips filler
/// phrases and deduplicates words while keeping first-seen order. The result
/// is a fixpoint, so normalizing twice gives the same key.
#[derive(Debug, Clone)]
pub struct QueryNormalizer {
    /// Token sequences, longest first
    fillers: Vec<Vec<String>>,
    corrections: HashMap<String, Vec<String>>,
}

impl QueryNormalizer {
    pub fn new<P, S>(filler_phrases: P, corrections: &HashMap<String, String>) -> Self
    where
        P: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut fillers: Vec<Vec<String>> = filler_phrases
            .into_iter()
            .map(|phrase| tokenize(&phrase.as_ref().to_lowercase()))
            .filter(|tokens| !tokens.is_empty())
            .collect();
        fillers.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        fillers.dedup();

        let corrections = corrections
            .iter()
            .filter_map(|(from, to)| {
                let from = tokenize(&from.to_lowercase());
                let to = tokenize(&to.to_lowercase());
                match from.as_slice() {
                    [word] if !to.is_empty() && to != from => Some((word.clone(), to)),
                    _ => None,
                }
            })
            .collect();

        Self { fillers, corrections }
    }

    pub fn normalize(&self, text: &str) -> NormalizedQuery {
        let lowered = text.trim().to_lowercase();
        let words = tokenize(&lowered);
        if words.is_empty() {
            // nothing but punctuation or whitespace
            return NormalizedQuery::new(lowered);
        }

        let mut current = words.clone();
        for _ in 0..MAX_PASSES {
            let next = dedupe(self.strip_fillers(self.correct(&current)));
            if next == current {
                break;
            }
            current = next;
        }

        if current.is_empty() {
            // the whole question was filler, keep it rather than an empty key
            return NormalizedQuery::new(words.join(" "));
        }
        NormalizedQuery::new(current.join(" "))
    }

    fn correct(&self, words: &[String]) -> Vec<String> {
        words
            .iter()
            .flat_map(|word| match self.corrections.get(word) {
                Some(replacement) => replacement.clone(),
                None => vec![word.clone()],
            })
            .collect()
    }

    /// Removes filler phrases until none is left, including ones that only
    /// appear after an inner phrase was cut out.
    fn strip_fillers(&self, mut words: Vec<String>) -> Vec<String> {
        loop {
            let mut kept = Vec::with_capacity(words.len());
            let mut removed = false;
            let mut i = 0;

            while i < words.len() {
                match self.filler_at(&words[i..]) {
                    Some(len) => {
                        i += len;
                        removed = true;
                    }
                    None => {
                        kept.push(words[i].clone());
                        i += 1;
                    }
                }
            }

            if !removed {
                return kept;
            }
            words = kept;
        }
    }

    fn filler_at(&self, words: &[String]) -> Option<usize> {
        self.fillers
            .iter()
            .find(|phrase| words.starts_with(phrase.as_slice()))
            .map(|phrase| phrase.len())
    }
}

impl Default for QueryNormalizer {
    fn default() -> Self {
        let corrections = DEFAULT_CORRECTIONS
            .iter()
            .map(|(from, to)| (from.to_string(), to.to_string()))
            .collect();
        Self::new(DEFAULT_FILLER_PHRASES.iter(), &corrections)
    }
}

/// Split into words, deleting anything that is not a letter or digit
fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|word| word.chars().filter(|c| c.is_alphanumeric()).collect::<String>())
        .filter(|word| !word.is_empty())
        .collect()
}

fn dedupe(words: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    words
        .into_iter()
        .filter(|word| seen.insert(word.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::seq::IndexedRandom;
    use rand::{Rng, SeedableRng};

    fn normalize(text: &str) -> String {
        QueryNormalizer::default().normalize(text).as_str().to_string()
    }

    #[test]
    fn test_strips_question_words() {
        assert_eq!(normalize("berapa harga iphone 15"), "iphone 15");
        assert_eq!(normalize("Cek harga Samsung Galaxy S24?"), "samsung galaxy s24");
        assert_eq!(normalize("cari harga rice cooker dong"), "rice cooker");
    }

    #[test]
    fn test_applies_corrections() {
        assert_eq!(normalize("harga ip 15 pro"), "iphone 15 pro");
        assert_eq!(normalize("berapa sih ipon 13"), "iphone 13");
        assert_eq!(normalize("xiomi redmi note 13"), "xiaomi redmi note 13");
    }

    #[test]
    fn test_dedupes_words_in_order() {
        assert_eq!(normalize("iphone iphone 15 15 pro"), "iphone 15 pro");
        assert_eq!(normalize("ip 15 iphone"), "iphone 15");
    }

    #[test]
    fn test_filler_exposed_by_removal_is_stripped() {
        let normalizer = QueryNormalizer::new(["cek harga"], &HashMap::new());
        assert_eq!(normalizer.normalize("cek cek harga harga laptop").as_str(), "laptop");
    }

    #[test]
    fn test_all_filler_falls_back_to_question() {
        assert_eq!(normalize("Berapa harga?"), "berapa harga");
        assert_eq!(normalize("harga  harga!"), "harga harga");
        assert!(!normalize("harga").is_empty());
    }

    #[test]
    fn test_blank_and_punctuation_only() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   "), "");
        assert_eq!(normalize(" ??? "), "???");
    }

    #[test]
    fn test_empty_filler_phrase_is_ignored() {
        let normalizer = QueryNormalizer::new(["", "  ", "harga"], &HashMap::new());
        assert_eq!(normalizer.normalize("harga tv").as_str(), "tv");
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let normalizer = QueryNormalizer::default();
        let fixed = [
            "berapa harga iphone 15",
            "Harga IP 15 PRO MAX!!",
            "cek harga cek harga",
            "harga harga terbaru",
            "berapa sih harga samsul a55 sekarang?",
            "kira-kira berapa ya",
            "ip ipun ipin ipon",
            "...",
            "",
        ];
        for text in fixed {
            let once = normalizer.normalize(text);
            assert_eq!(normalizer.normalize(once.as_str()), once, "input: {:?}", text);
        }

        let vocabulary = [
            "berapa", "harga", "cek", "cari", "terbaru", "sih", "si", "ip", "ipon", "iphone",
            "15", "pro", "samsul", "tv", "dong", "kira", "?", "!", "Rp", "-",
        ];
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            let len = rng.random_range(0..8);
            let text: Vec<&str> = (0..len)
                .map(|_| *vocabulary.choose(&mut rng).unwrap())
                .collect();
            let text = text.join(" ");
            let once = normalizer.normalize(&text);
            assert_eq!(normalizer.normalize(once.as_str()), once, "input: {:?}", text);
        }
    }
}
