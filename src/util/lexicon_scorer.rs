// External crates
use std::collections::HashMap;

// Internal modules
use crate::sources::SentimentScorer;

/// Tokens a negation stays active for
const NEGATION_SCOPE: usize = 3;

const POSITIVE_TERMS: [(&str, f64); 30] = [
    ("bullish", 0.8),
    ("surge", 0.7),
    ("soar", 0.8),
    ("rally", 0.7),
    ("jump", 0.6),
    ("gain", 0.5),
    ("rise", 0.5),
    ("climb", 0.5),
    ("profit", 0.6),
    ("growth", 0.6),
    ("grow", 0.5),
    ("beat", 0.6),
    ("exceed", 0.6),
    ("outperform", 0.7),
    ("upgrade", 0.6),
    ("record", 0.5),
    ("strong", 0.5),
    ("robust", 0.5),
    ("optimistic", 0.6),
    ("confident", 0.5),
    ("positive", 0.5),
    ("improve", 0.5),
    ("recovery", 0.5),
    ("rebound", 0.5),
    ("breakthrough", 0.7),
    ("approval", 0.5),
    ("buyback", 0.4),
    ("dividend", 0.3),
    ("expand", 0.4),
    ("win", 0.5),
];

const NEGATIVE_TERMS: [(&str, f64); 32] = [
    ("bearish", -0.8),
    ("crash", -0.9),
    ("plunge", -0.8),
    ("tumble", -0.7),
    ("slump", -0.7),
    ("drop", -0.6),
    ("fall", -0.5),
    ("decline", -0.6),
    ("slide", -0.5),
    ("loss", -0.6),
    ("miss", -0.6),
    ("downgrade", -0.6),
    ("underperform", -0.6),
    ("weak", -0.5),
    ("negative", -0.5),
    ("pessimistic", -0.6),
    ("concern", -0.5),
    ("worry", -0.5),
    ("fear", -0.6),
    ("risk", -0.4),
    ("uncertainty", -0.5),
    ("volatile", -0.3),
    ("lawsuit", -0.6),
    ("probe", -0.5),
    ("recall", -0.6),
    ("layoff", -0.6),
    ("cut", -0.4),
    ("warning", -0.5),
    ("disappoint", -0.7),
    ("fraud", -0.9),
    ("bankruptcy", -0.9),
    ("default", -0.7),
];

const NEGATIONS: [&str; 16] = [
    "not", "no", "never", "none", "nothing", "without", "cannot", "cant", "dont", "doesnt",
    "didnt", "wont", "isnt", "arent", "wasnt", "hardly",
];

const INTENSIFIERS: [(&str, f64); 10] = [
    ("very", 1.5),
    ("extremely", 2.0),
    ("highly", 1.5),
    ("sharply", 1.6),
    ("significantly", 1.5),
    ("dramatically", 1.8),
    ("massively", 1.8),
    ("slightly", 0.5),
    ("somewhat", 0.7),
    ("marginally", 0.5),
];

/// Rule-based financial headline scorer.
///
/// Averages the scores of known terms. A negation flips the next scored term
/// within a few tokens; an intensifier scales the next scored term.
#[derive(Debug, Clone)]
pub struct LexiconScorer {
    terms: HashMap<String, f64>,
    intensifiers: HashMap<String, f64>,
}

impl Default for LexiconScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl LexiconScorer {
    pub fn new() -> Self {
        let terms = POSITIVE_TERMS
            .iter()
            .chain(NEGATIVE_TERMS.iter())
            .map(|(word, score)| (word.to_string(), *score))
            .collect();
        let intensifiers = INTENSIFIERS
            .iter()
            .map(|(word, factor)| (word.to_string(), *factor))
            .collect();
        Self {
            terms,
            intensifiers,
        }
    }

    /// Looks the token up as is, then with common inflections removed
    fn term_score(&self, token: &str) -> Option<f64> {
        if let Some(score) = self.terms.get(token) {
            return Some(*score);
        }
        ["ing", "ed", "es", "s"]
            .iter()
            .filter_map(|suffix| token.strip_suffix(suffix))
            .filter(|stem| stem.len() >= 3)
            .find_map(|stem| {
                self.terms
                    .get(stem)
                    .or_else(|| self.terms.get(&format!("{}e", stem)))
                    .copied()
            })
    }
}

/// Lowercase with apostrophes dropped and other punctuation trimmed
fn normalize(token: &str) -> String {
    token
        .chars()
        .filter(|c| *c != '\'' && *c != '\u{2019}')
        .collect::<String>()
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase()
}

impl SentimentScorer for LexiconScorer {
    fn score(&self, text: &str) -> f64 {
        let mut scores = Vec::new();
        let mut negation_left = 0usize;
        let mut intensity = 1.0;

        for raw in text.split_whitespace() {
            let token = normalize(raw);
            if token.is_empty() {
                continue;
            }

            if NEGATIONS.contains(&token.as_str()) {
                negation_left = NEGATION_SCOPE;
                continue;
            }
            if let Some(factor) = self.intensifiers.get(&token) {
                intensity = *factor;
                continue;
            }

            if let Some(mut score) = self.term_score(&token) {
                if negation_left > 0 {
                    score = -score;
                    negation_left = 0;
                }
                scores.push(score * intensity);
                intensity = 1.0;
            } else {
                negation_left = negation_left.saturating_sub(1);
                // An intensifier only modifies the token right after it
                intensity = 1.0;
            }
        }

        if scores.is_empty() {
            return 0.0;
        }
        (scores.iter().sum::<f64>() / scores.len() as f64).clamp(-1.0, 1.0)
    }
}
