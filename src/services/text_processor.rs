// Text Processing Service
// Deterministic text measures used by the text, document and email scorers.
// Every function is total: degenerate input yields 0.0.

use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

fn sentence_split_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[.!?]").expect("sentence regex"))
}

/// Lowercased whitespace tokens with surrounding punctuation trimmed.
pub fn tokenize_words(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|w| !w.is_empty())
        .collect()
}

/// Population variance of words-per-sentence; sentences with two words or fewer are ignored.
pub fn sentence_length_variance(text: &str) -> f64 {
    let lengths: Vec<f64> = sentence_split_re()
        .split(text)
        .map(|s| s.split_whitespace().count())
        .filter(|&n| n > 2)
        .map(|n| n as f64)
        .collect();

    population_variance(&lengths)
}

/// Fraction of distinct words that occur more than three times.
pub fn repetition_score(text: &str) -> f64 {
    let words = tokenize_words(text);
    let mut freq: HashMap<&str, usize> = HashMap::new();
    for w in &words {
        *freq.entry(w.as_str()).or_insert(0) += 1;
    }
    if freq.is_empty() {
        return 0.0;
    }
    let repeated = freq.values().filter(|&&c| c > 3).count();
    repeated as f64 / freq.len() as f64
}

/// Distinct words / total words.
pub fn lexical_diversity(text: &str) -> f64 {
    let words = tokenize_words(text);
    if words.is_empty() {
        return 0.0;
    }
    let unique: HashSet<&str> = words.iter().map(|w| w.as_str()).collect();
    unique.len() as f64 / words.len() as f64
}

/// Share of the original's distinct words that survive in the paraphrase.
pub fn word_overlap(original: &str, paraphrase: &str) -> f64 {
    let original_words: HashSet<String> =
        original.to_lowercase().split_whitespace().map(str::to_string).collect();
    if original_words.is_empty() {
        return 0.0;
    }
    let paraphrase_words: HashSet<String> =
        paraphrase.to_lowercase().split_whitespace().map(str::to_string).collect();
    let shared = original_words.intersection(&paraphrase_words).count();
    shared as f64 / original_words.len() as f64
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub fn population_variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TextMeasures {
    pub word_count: usize,
    pub sentence_variance: f64,
    pub repetition: f64,
    pub lexical_diversity: f64,
}

pub fn measure_text(text: &str) -> TextMeasures {
    TextMeasures {
        word_count: tokenize_words(text).len(),
        sentence_variance: sentence_length_variance(text),
        repetition: repetition_score(text),
        lexical_diversity: lexical_diversity(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input_is_neutral() {
        assert_eq!(sentence_length_variance(""), 0.0);
        assert_eq!(repetition_score(""), 0.0);
        assert_eq!(lexical_diversity("   "), 0.0);
        assert_eq!(word_overlap("", "anything"), 0.0);
        assert_eq!(measure_text("").word_count, 0);
    }

    #[test]
    fn test_sentence_variance_skips_short_sentences() {
        // lengths 4, 3, 3; "Highly recommend" is dropped
        let text = "The product is great. I love it. It works well. Highly recommend.";
        let var = sentence_length_variance(text);
        assert!((var - 2.0 / 9.0).abs() < 1e-9);
    }

    #[test]
    fn test_sentence_variance_only_short_sentences() {
        assert_eq!(sentence_length_variance("Yes. No way. Ok!"), 0.0);
    }

    #[test]
    fn test_repetition_score() {
        let text = "data data data data model model";
        assert!((repetition_score(text) - 0.5).abs() < 1e-9);
        assert_eq!(repetition_score("one two three"), 0.0);
    }

    #[test]
    fn test_lexical_diversity_trims_punctuation() {
        let text = "It works. It works!";
        assert!((lexical_diversity(text) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_word_overlap() {
        assert!((word_overlap("a b c d", "a b c x") - 0.75).abs() < 1e-9);
        assert_eq!(word_overlap("A B", "a b"), 1.0);
    }

    #[test]
    fn test_variance_helpers() {
        assert!((population_variance(&[10.0, 90.0, 10.0]) - 1422.222222).abs() < 1e-3);
        assert_eq!(population_variance(&[40.0, 40.0, 40.0]), 0.0);
        assert_eq!(mean(&[]), 0.0);
    }

    #[test]
    fn test_measures_are_deterministic() {
        let text = "Some words here. And a few more words here too.";
        assert_eq!(measure_text(text), measure_text(text));
    }
}
