use crate::normalize::normalize_answer;
use ahash::AHashSet;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Tunable precision knobs for answer matching.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// A contained answer must be at least this fraction of the containing
    /// one, measured in characters.
    pub min_containment_ratio: f64,
    /// Shortest run of ideographs or Latin letters treated as a keyword.
    pub min_token_chars: usize,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            min_containment_ratio: 0.5,
            min_token_chars: 2,
        }
    }
}

/// The rule that accepted a pair of answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchRule {
    Exact,
    Containment,
    TokenOverlap,
}

impl fmt::Display for MatchRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MatchRule::Exact => "exact",
            MatchRule::Containment => "containment",
            MatchRule::TokenOverlap => "token overlap",
        };
        f.write_str(name)
    }
}

/// Both answers in normalized form, with the verdict and the thresholds used.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    pub row: String,
    pub candidate: String,
    pub rule: Option<MatchRule>,
    pub thresholds: MatchConfig,
}

/// Decides whether a terse answer and a full answer name the same thing.
///
/// The token-overlap rule accepts any shared keyword, so two unrelated
/// answers that happen to share a term will match. That recall is kept on
/// purpose; tighten `min_token_chars` if it bites.
#[derive(Debug, Clone)]
pub struct AnswerMatcher {
    config: MatchConfig,
    token_re: Regex,
}

impl AnswerMatcher {
    pub fn new(config: MatchConfig) -> Result<Self, regex::Error> {
        let n = config.min_token_chars.max(1);
        let token_re = Regex::new(&format!(
            r"[\x{{4E00}}-\x{{9FA5}}]{{{n},}}|[a-zA-Z]{{{n},}}"
        ))?;
        Ok(Self { config, token_re })
    }

    pub fn matches(&self, row_answer: &str, candidate_answer: &str) -> bool {
        self.explain(row_answer, candidate_answer).is_some()
    }

    /// Like [`matches`](Self::matches), reporting which rule decided.
    pub fn explain(&self, row_answer: &str, candidate_answer: &str) -> Option<MatchRule> {
        let r = normalize_answer(row_answer);
        let c = normalize_answer(candidate_answer);
        if r.is_empty() || c.is_empty() {
            return None;
        }
        if r == c {
            return Some(MatchRule::Exact);
        }

        // Containment settles the question either way: a short term inside a
        // much longer answer is a fragment, not the same answer.
        let (shorter, longer) = if r.len() <= c.len() { (&r, &c) } else { (&c, &r) };
        if longer.contains(shorter.as_str()) {
            let shorter_chars = shorter.chars().count() as f64;
            let longer_chars = longer.chars().count() as f64;
            return (shorter_chars >= self.config.min_containment_ratio * longer_chars)
                .then_some(MatchRule::Containment);
        }

        let r_tokens = self.tokens(&r);
        let c_tokens = self.tokens(&c);
        (!r_tokens.is_disjoint(&c_tokens)).then_some(MatchRule::TokenOverlap)
    }

    pub fn compare(&self, row_answer: &str, candidate_answer: &str) -> Comparison {
        Comparison {
            row: normalize_answer(row_answer),
            candidate: normalize_answer(candidate_answer),
            rule: self.explain(row_answer, candidate_answer),
            thresholds: self.config,
        }
    }

    fn tokens<'a>(&self, s: &'a str) -> AHashSet<&'a str> {
        self.token_re.find_iter(s).map(|m| m.as_str()).collect()
    }
}

impl Default for AnswerMatcher {
    fn default() -> Self {
        Self::new(MatchConfig::default()).expect("default token pattern is valid")
    }
}
