//! Per-text analysis records and feature outcomes.
//!
//! Internally every optional signal is a tagged [`FeatureOutcome`] so tests
//! and callers can tell "not requested" from "computed" from "failed".
//! [`AnalysisRecord::flatten`] collapses the tags into the fixed-shape
//! [`FlatRecord`] consumed downstream, where `-1.0` / absent booleans /
//! `"not available"` mean "not requested" and zeros plus a failure reason
//! mean "degraded".

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::backend::BackendId;

/// Reasoning string used for features that were never requested.
pub const NOT_AVAILABLE: &str = "not available";

/// Numeric sentinel meaning "not requested" in the flattened output.
pub const UNAVAILABLE_SCORE: f32 = -1.0;

/// One optional secondary signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FeatureKind {
    /// Sarcasm detection.
    Sarcasm,
    /// Perceived-IQ estimation.
    Iq,
    /// Bot-likelihood estimation.
    Bot,
}

impl FeatureKind {
    /// All feature kinds, in declaration order.
    pub const ALL: [FeatureKind; 3] = [FeatureKind::Sarcasm, FeatureKind::Iq, FeatureKind::Bot];

    /// The stable string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureKind::Sarcasm => "sarcasm",
            FeatureKind::Iq => "iq",
            FeatureKind::Bot => "bot",
        }
    }
}

impl std::fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The resolution of one (text, feature) pair.
///
/// Transitions are terminal: once a feature resolves to `Computed` or
/// `Failed` it never changes again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum FeatureOutcome<T> {
    /// The caller did not ask for this feature.
    NotRequested,
    /// The feature was evaluated successfully.
    Computed(T),
    /// The feature was requested but could not be evaluated.
    Failed {
        /// Why the evaluation failed (transport error, unparsable reply, …).
        reason: String,
    },
}

impl<T> FeatureOutcome<T> {
    /// The computed value, if any.
    pub fn computed(&self) -> Option<&T> {
        match self {
            FeatureOutcome::Computed(v) => Some(v),
            _ => None,
        }
    }

    /// Whether this outcome is `Failed`.
    pub fn is_failed(&self) -> bool {
        matches!(self, FeatureOutcome::Failed { .. })
    }

    /// Whether this outcome is `NotRequested`.
    pub fn is_not_requested(&self) -> bool {
        matches!(self, FeatureOutcome::NotRequested)
    }
}

/// Sarcasm signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sarcasm {
    /// Whether the text reads as sarcastic.
    pub is_sarcastic: bool,
    /// Backend confidence in `[0, 1]`.
    pub confidence: f32,
    /// Backend-supplied justification.
    pub reasoning: String,
}

/// Perceived-IQ signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Iq {
    /// Normalized score in `[0, 1]` (raw 55..145 mapped linearly).
    pub iq_score: f32,
    /// Raw IQ estimate on the conventional scale.
    pub raw_iq: f32,
    /// Backend confidence in `[0, 1]`.
    pub confidence: f32,
    /// Backend-supplied justification.
    pub reasoning: String,
}

/// Bot-likelihood signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bot {
    /// Whether the text reads as bot-authored.
    pub is_bot: bool,
    /// Bot probability in `[0, 1]`.
    pub probability: f32,
    /// Backend-supplied justification.
    pub reasoning: String,
}

/// Per-backend verdict from the image-analysis collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageVerdict {
    /// Image sentiment score in `[-1, 1]`; `0.0` on collaborator failure.
    pub score: f32,
    /// Free-text description, or an error placeholder.
    pub description: String,
}

/// The complete analysis of one input text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    /// The input text, unchanged.
    pub text: String,

    /// Optional caller-supplied label (e.g. a source tag).
    pub label: Option<String>,

    /// When the orchestration produced this record.
    pub analyzed_at: DateTime<Utc>,

    /// Baseline sentiment per backend that produced one. Backends that
    /// were not selected or not recognized are simply absent.
    pub baselines: BTreeMap<BackendId, f32>,

    /// Sarcasm outcome.
    pub sarcasm: FeatureOutcome<Sarcasm>,

    /// Perceived-IQ outcome.
    pub iq: FeatureOutcome<Iq>,

    /// Bot-likelihood outcome.
    pub bot: FeatureOutcome<Bot>,

    /// Per-backend image verdicts, present only for single-text requests
    /// that carried an image reference.
    pub image: Option<BTreeMap<BackendId, ImageVerdict>>,
}

impl AnalysisRecord {
    /// A record with every field at its empty/unrequested state.
    pub fn empty(text: impl Into<String>, label: Option<String>) -> Self {
        Self {
            text: text.into(),
            label,
            analyzed_at: Utc::now(),
            baselines: BTreeMap::new(),
            sarcasm: FeatureOutcome::NotRequested,
            iq: FeatureOutcome::NotRequested,
            bot: FeatureOutcome::NotRequested,
            image: None,
        }
    }

    /// Whether any requested signal had to be defaulted.
    pub fn is_degraded(&self) -> bool {
        self.sarcasm.is_failed() || self.iq.is_failed() || self.bot.is_failed()
    }

    /// The baseline score for a backend, `0.0` if absent.
    pub fn baseline(&self, id: BackendId) -> f32 {
        self.baselines.get(&id).copied().unwrap_or(0.0)
    }

    /// Collapse the tagged outcomes into the fixed-shape boundary record.
    pub fn flatten(&self) -> FlatRecord {
        let (is_sarcastic, sarcasm_confidence, sarcasm_reasoning) = match &self.sarcasm {
            FeatureOutcome::NotRequested => {
                (None, UNAVAILABLE_SCORE, NOT_AVAILABLE.to_string())
            }
            FeatureOutcome::Computed(s) => {
                (Some(s.is_sarcastic), s.confidence, s.reasoning.clone())
            }
            FeatureOutcome::Failed { reason } => (Some(false), 0.0, reason.clone()),
        };

        let (iq_score, raw_iq, iq_confidence, iq_reasoning) = match &self.iq {
            FeatureOutcome::NotRequested => (
                UNAVAILABLE_SCORE,
                UNAVAILABLE_SCORE,
                UNAVAILABLE_SCORE,
                NOT_AVAILABLE.to_string(),
            ),
            FeatureOutcome::Computed(i) => {
                (i.iq_score, i.raw_iq, i.confidence, i.reasoning.clone())
            }
            FeatureOutcome::Failed { reason } => (0.0, 0.0, 0.0, reason.clone()),
        };

        let (is_bot, bot_probability, bot_reasoning) = match &self.bot {
            FeatureOutcome::NotRequested => {
                (None, UNAVAILABLE_SCORE, NOT_AVAILABLE.to_string())
            }
            FeatureOutcome::Computed(b) => (Some(b.is_bot), b.probability, b.reasoning.clone()),
            FeatureOutcome::Failed { reason } => (Some(false), 0.0, reason.clone()),
        };

        FlatRecord {
            text: self.text.clone(),
            label: self.label.clone(),
            analyzed_at: self.analyzed_at,
            lexicon_score: self.baseline(BackendId::Lexicon),
            local_model_score: self.baseline(BackendId::LocalModel),
            gpt4_score: self.baseline(BackendId::Gpt4),
            gemini_score: self.baseline(BackendId::Gemini),
            grok_score: self.baseline(BackendId::Grok),
            is_sarcastic,
            sarcasm_confidence,
            sarcasm_reasoning,
            iq_score,
            raw_iq,
            iq_confidence,
            iq_reasoning,
            is_bot,
            bot_probability,
            bot_reasoning,
            image: self.image.clone(),
        }
    }
}

/// The backward-compatible output shape.
///
/// Numeric `-1.0` plus reasoning `"not available"` marks a feature that was
/// never requested; zeros plus a failure reason mark a degraded one. A
/// baseline of `0.0` for a backend means it was unselected, unrecognized,
/// or failed — indistinguishable here by design.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatRecord {
    /// The input text, unchanged.
    pub text: String,
    /// Optional caller-supplied label.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// When the orchestration produced this record.
    pub analyzed_at: DateTime<Utc>,
    /// Lexicon baseline, `0.0` if absent.
    pub lexicon_score: f32,
    /// Local-model baseline, `0.0` if absent.
    pub local_model_score: f32,
    /// gpt4 baseline, `0.0` if absent.
    pub gpt4_score: f32,
    /// gemini baseline, `0.0` if absent.
    pub gemini_score: f32,
    /// grok baseline, `0.0` if absent.
    pub grok_score: f32,
    /// Sarcasm verdict; absent when not requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_sarcastic: Option<bool>,
    /// Sarcasm confidence, `-1.0` when not requested.
    pub sarcasm_confidence: f32,
    /// Sarcasm reasoning or sentinel/failure text.
    pub sarcasm_reasoning: String,
    /// Normalized IQ, `-1.0` when not requested.
    pub iq_score: f32,
    /// Raw IQ, `-1.0` when not requested.
    pub raw_iq: f32,
    /// IQ confidence, `-1.0` when not requested.
    pub iq_confidence: f32,
    /// IQ reasoning or sentinel/failure text.
    pub iq_reasoning: String,
    /// Bot verdict; absent when not requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_bot: Option<bool>,
    /// Bot probability, `-1.0` when not requested.
    pub bot_probability: f32,
    /// Bot reasoning or sentinel/failure text.
    pub bot_reasoning: String,
    /// Per-backend image verdicts, if an image was analyzed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<BTreeMap<BackendId, ImageVerdict>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> AnalysisRecord {
        AnalysisRecord::empty("some text", Some("reddit".into()))
    }

    #[test]
    fn empty_record_flattens_to_sentinels() {
        let flat = record().flatten();
        assert_eq!(flat.lexicon_score, 0.0);
        assert_eq!(flat.gpt4_score, 0.0);
        assert_eq!(flat.iq_score, UNAVAILABLE_SCORE);
        assert_eq!(flat.raw_iq, UNAVAILABLE_SCORE);
        assert_eq!(flat.iq_confidence, UNAVAILABLE_SCORE);
        assert_eq!(flat.iq_reasoning, NOT_AVAILABLE);
        assert_eq!(flat.is_sarcastic, None);
        assert_eq!(flat.sarcasm_confidence, UNAVAILABLE_SCORE);
        assert_eq!(flat.is_bot, None);
        assert_eq!(flat.bot_probability, UNAVAILABLE_SCORE);
        assert!(flat.image.is_none());
    }

    #[test]
    fn computed_iq_flattens_to_values() {
        let mut r = record();
        r.iq = FeatureOutcome::Computed(Iq {
            iq_score: 0.5,
            raw_iq: 100.0,
            confidence: 0.9,
            reasoning: "fluent, on-topic".into(),
        });
        let flat = r.flatten();
        assert_eq!(flat.iq_score, 0.5);
        assert_eq!(flat.raw_iq, 100.0);
        assert_eq!(flat.iq_confidence, 0.9);
        assert_eq!(flat.iq_reasoning, "fluent, on-topic");
    }

    #[test]
    fn failed_feature_flattens_to_zeros_with_reason() {
        let mut r = record();
        r.bot = FeatureOutcome::Failed {
            reason: "request failed: HTTP 503".into(),
        };
        let flat = r.flatten();
        assert_eq!(flat.is_bot, Some(false));
        assert_eq!(flat.bot_probability, 0.0);
        assert_eq!(flat.bot_reasoning, "request failed: HTTP 503");
    }

    #[test]
    fn degraded_tracks_failed_outcomes_only() {
        let mut r = record();
        assert!(!r.is_degraded());
        r.sarcasm = FeatureOutcome::Computed(Sarcasm {
            is_sarcastic: false,
            confidence: 0.7,
            reasoning: "literal".into(),
        });
        assert!(!r.is_degraded());
        r.iq = FeatureOutcome::Failed { reason: "timeout".into() };
        assert!(r.is_degraded());
    }

    #[test]
    fn baseline_defaults_to_zero() {
        let mut r = record();
        r.baselines.insert(BackendId::Lexicon, 0.62);
        assert_eq!(r.baseline(BackendId::Lexicon), 0.62);
        assert_eq!(r.baseline(BackendId::Grok), 0.0);
    }

    #[test]
    fn outcome_accessors() {
        let o: FeatureOutcome<Sarcasm> = FeatureOutcome::NotRequested;
        assert!(o.is_not_requested());
        assert!(!o.is_failed());
        assert!(o.computed().is_none());

        let o = FeatureOutcome::Computed(Bot {
            is_bot: true,
            probability: 0.8,
            reasoning: "templated phrasing".into(),
        });
        assert!(o.computed().is_some());
    }

    #[test]
    fn outcome_serde_is_tagged() {
        let o: FeatureOutcome<Iq> = FeatureOutcome::Failed { reason: "boom".into() };
        let json = serde_json::to_value(&o).unwrap();
        assert_eq!(json["state"], "failed");
        assert_eq!(json["reason"], "boom");

        let o: FeatureOutcome<Iq> = FeatureOutcome::NotRequested;
        assert_eq!(serde_json::to_value(&o).unwrap()["state"], "not_requested");
    }

    #[test]
    fn flat_record_serde_skips_absent_booleans() {
        let flat = record().flatten();
        let json = serde_json::to_string(&flat).unwrap();
        assert!(!json.contains("is_sarcastic"));
        assert!(!json.contains("is_bot"));
    }

    #[test]
    fn feature_kind_strings() {
        assert_eq!(FeatureKind::Sarcasm.as_str(), "sarcasm");
        assert_eq!(FeatureKind::Iq.to_string(), "iq");
        let parsed: FeatureKind = serde_json::from_str("\"bot\"").unwrap();
        assert_eq!(parsed, FeatureKind::Bot);
    }
}
