//! Local word-list sentiment scorer.
//!
//! [`LexiconScorer`] is a pure function over the text: tokenized words are
//! matched against small polarity lists, adjusted for negation and
//! intensifiers, and the raw sum is squashed into `[-1, 1]`. It is the
//! zero-dependency baseline every deployment has, and the fallback the
//! local neural model degrades to.

use async_trait::async_trait;
use tracing::trace;

use sentira_types::BackendId;

use crate::error::Result;
use crate::transport::{BackendRequest, Transport};

/// Words contributing positive polarity.
const POSITIVE: &[&str] = &[
    "amazing", "awesome", "beautiful", "best", "brilliant", "delightful", "enjoy",
    "excellent", "fantastic", "favorite", "fun", "glad", "good", "great", "happy",
    "helpful", "impressive", "incredible", "like", "love", "loved", "nice",
    "outstanding", "perfect", "pleasant", "recommend", "reliable", "smooth",
    "solid", "superb", "thanks", "useful", "win", "wonderful", "works",
];

/// Words contributing negative polarity.
const NEGATIVE: &[&str] = &[
    "annoying", "awful", "bad", "broken", "bug", "buggy", "crash", "disappointed",
    "disappointing", "dreadful", "fail", "failed", "garbage", "hate", "hated",
    "horrible", "lose", "mediocre", "mess", "miserable", "painful", "pathetic",
    "poor", "sad", "scam", "slow", "terrible", "trash", "ugly", "unreliable",
    "useless", "waste", "worse", "worst", "wrong",
];

/// Words that amplify the following polarity word.
const INTENSIFIERS: &[&str] = &[
    "absolutely", "completely", "extremely", "incredibly", "really", "so",
    "totally", "very",
];

/// Words that flip the following polarity word.
const NEGATORS: &[&str] = &["no", "none", "never", "not", "cannot", "cant", "dont", "isnt", "wasnt"];

/// How much an intensifier scales the next polarity hit.
const INTENSIFIER_BOOST: f32 = 1.5;

/// Damped flip applied when a negator precedes a polarity hit.
const NEGATION_FACTOR: f32 = -0.75;

/// Normalization constant for squashing the raw sum into `[-1, 1]`.
const NORMALIZATION_ALPHA: f32 = 15.0;

/// A pure, synchronous sentiment scorer over small polarity word lists.
#[derive(Debug, Clone, Default)]
pub struct LexiconScorer;

impl LexiconScorer {
    /// Create a scorer.
    pub fn new() -> Self {
        Self
    }

    /// Score `text` in `[-1, 1]`. Empty or polarity-free text scores `0.0`.
    pub fn score(&self, text: &str) -> f32 {
        let tokens: Vec<String> = text
            .split_whitespace()
            .map(|t| {
                t.chars()
                    .filter(|c| c.is_alphanumeric() || *c == '\'')
                    .collect::<String>()
                    .replace('\'', "")
                    .to_lowercase()
            })
            .filter(|t| !t.is_empty())
            .collect();

        let mut sum = 0.0f32;
        for (i, token) in tokens.iter().enumerate() {
            let polarity = if POSITIVE.contains(&token.as_str()) {
                1.0
            } else if NEGATIVE.contains(&token.as_str()) {
                -1.0
            } else {
                continue;
            };

            let mut hit = polarity;
            // Look back up to two tokens for intensifiers and negators.
            let window = &tokens[i.saturating_sub(2)..i];
            if window.iter().any(|w| INTENSIFIERS.contains(&w.as_str())) {
                hit *= INTENSIFIER_BOOST;
            }
            if window.iter().any(|w| NEGATORS.contains(&w.as_str())) {
                hit *= NEGATION_FACTOR;
            }
            sum += hit;
        }

        if sum == 0.0 {
            return 0.0;
        }

        // Exclamation marks amplify whatever polarity is already there.
        let exclamations = text.chars().filter(|c| *c == '!').count().min(3) as f32;
        sum *= 1.0 + 0.1 * exclamations;

        // Squash to (-1, 1), same family of normalization the classic
        // compound score uses.
        sum / (sum * sum + NORMALIZATION_ALPHA).sqrt()
    }
}

/// [`Transport`] wrapper around the lexicon scorer. Answers with the bare
/// score as a decimal string.
#[derive(Debug, Default)]
pub struct LexiconBackend {
    scorer: LexiconScorer,
}

impl LexiconBackend {
    /// Create the backend.
    pub fn new() -> Self {
        Self { scorer: LexiconScorer::new() }
    }
}

#[async_trait]
impl Transport for LexiconBackend {
    fn id(&self) -> BackendId {
        BackendId::Lexicon
    }

    async fn send(&self, request: &BackendRequest) -> Result<String> {
        let score = self.scorer.score(&request.text);
        trace!(score, "lexicon scored text");
        Ok(score.to_string())
    }
}
