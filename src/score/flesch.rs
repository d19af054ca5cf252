// src/score/flesch.rs
//! Flesch reading ease over plain text.
//!
//! Score = 206.835 − 1.015 × (words / sentences) − 84.6 × (syllables / words).
//! Higher is easier; standard prose lands roughly between 0 and 100,
//! though the formula is unbounded on both ends. Syllables are counted
//! with the usual vowel-group heuristic (silent trailing `e` dropped,
//! minimum one per word).

use super::ReadabilityScore;
use crate::error::ScoreError;

pub struct FleschScorer;

impl ReadabilityScore for FleschScorer {
    fn score(&self, text: &str) -> Result<f64, ScoreError> {
        let words: Vec<&str> = text
            .split_whitespace()
            .filter(|w| w.chars().any(|c| c.is_alphabetic()))
            .collect();
        if words.is_empty() {
            return Err(ScoreError::EmptyText);
        }

        let sentences = count_sentences(text).max(1) as f64;
        let word_count = words.len() as f64;
        let syllables: usize = words.iter().map(|w| count_syllables(w)).sum();

        Ok(206.835 - 1.015 * (word_count / sentences) - 84.6 * (syllables as f64 / word_count))
    }
}

/// Counts sentences as runs of terminal punctuation.
fn count_sentences(text: &str) -> usize {
    let mut count = 0;
    let mut in_terminator = false;
    for c in text.chars() {
        if matches!(c, '.' | '!' | '?') {
            if !in_terminator {
                count += 1;
                in_terminator = true;
            }
        } else {
            in_terminator = false;
        }
    }
    count
}

/// Heuristic syllable count: vowel groups, minus a silent trailing `e`,
/// never below one.
fn count_syllables(word: &str) -> usize {
    let lower: Vec<char> = word
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphabetic())
        .collect();
    if lower.is_empty() {
        return 0;
    }

    let is_vowel = |c: char| matches!(c, 'a' | 'e' | 'i' | 'o' | 'u' | 'y');
    let mut groups = 0;
    let mut prev_vowel = false;
    for &c in &lower {
        let vowel = is_vowel(c);
        if vowel && !prev_vowel {
            groups += 1;
        }
        prev_vowel = vowel;
    }

    // Silent trailing 'e' ("make", "rode") unless it is the only vowel.
    if groups > 1 && lower.last() == Some(&'e') && lower.get(lower.len() - 2).map_or(false, |&c| !is_vowel(c)) {
        groups -= 1;
    }

    groups.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monosyllables() {
        assert_eq!(count_syllables("the"), 1);
        assert_eq!(count_syllables("cat"), 1);
        assert_eq!(count_syllables("make"), 1);
    }

    #[test]
    fn polysyllables() {
        assert_eq!(count_syllables("water"), 2);
        assert_eq!(count_syllables("insurance"), 3);
        assert_eq!(count_syllables("readability"), 5);
    }

    #[test]
    fn sentences_count_terminator_runs_once() {
        assert_eq!(count_sentences("One. Two! Three?"), 3);
        assert_eq!(count_sentences("Wait... what"), 1);
        assert_eq!(count_sentences("no terminator"), 0);
    }

    #[test]
    fn simple_prose_scores_high() {
        let scorer = FleschScorer;
        let score = scorer.score("The cat sat on the mat. The dog ran.").unwrap();
        assert!(score > 90.0, "simple prose should score high, got {}", score);
    }

    #[test]
    fn dense_prose_scores_lower_than_simple_prose() {
        let scorer = FleschScorer;
        let simple = scorer.score("The cat sat. The dog ran.").unwrap();
        let dense = scorer
            .score(
                "Notwithstanding contractual obligations heretofore established, \
                 indemnification provisions necessitate comprehensive actuarial evaluation.",
            )
            .unwrap();
        assert!(dense < simple);
    }

    #[test]
    fn empty_text_is_an_error() {
        let scorer = FleschScorer;
        assert!(matches!(scorer.score(""), Err(ScoreError::EmptyText)));
        assert!(matches!(scorer.score("12 34 --"), Err(ScoreError::EmptyText)));
    }
}
