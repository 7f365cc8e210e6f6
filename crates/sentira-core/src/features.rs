//! Optional per-text signals: sarcasm, perceived IQ, bot likelihood.
//!
//! Every feature call is total: transport failures, unparsable replies,
//! and an empty backend selection all resolve to
//! [`FeatureOutcome::Failed`] with a reason, never an error. Once a
//! (text, feature) pair resolves, nothing revisits it.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Deserialize;
use tracing::warn;

use sentira_backends::BackendRequest;
use sentira_types::{BackendId, Bot, FeatureOutcome, Iq, Sarcasm};

use crate::dispatch::Dispatcher;
use crate::prompts;
use crate::text::{is_mostly_emoji, strip_code_fences};

/// Fixed priority order for feature work. The first entry also present
/// in the caller's selected backend set wins.
pub const FEATURE_PRIORITY: [BackendId; 4] = [
    BackendId::Gpt4,
    BackendId::Gemini,
    BackendId::LocalModel,
    BackendId::Grok,
];

/// Failure reason used when the selected set contains no feature-capable
/// backend.
pub const NO_CAPABLE_BACKEND: &str = "no capable backend selected";

#[derive(Debug, Deserialize)]
struct SarcasmReply {
    is_sarcastic: bool,
    #[serde(default)]
    confidence: f32,
    #[serde(default)]
    reasoning: String,
}

#[derive(Debug, Deserialize)]
struct IqReply {
    raw_iq: f32,
    #[serde(default)]
    confidence: f32,
    #[serde(default)]
    reasoning: String,
}

#[derive(Debug, Deserialize)]
struct BotReply {
    is_bot: bool,
    #[serde(default)]
    probability: f32,
    #[serde(default)]
    reasoning: String,
}

/// Normalize a raw IQ estimate (conventional 55..145 scale) to `[0, 1]`.
fn normalize_iq(raw_iq: f32) -> f32 {
    ((raw_iq - 55.0) / 90.0).clamp(0.0, 1.0)
}

/// Evaluates one optional signal for one text.
pub struct FeatureAnalyzer {
    dispatcher: Arc<Dispatcher>,
}

impl FeatureAnalyzer {
    /// Create an analyzer over the shared dispatcher.
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }

    /// The backend feature work will run on, given the caller's
    /// selection: the first priority-order entry present in the set.
    pub fn select_backend(selected: &BTreeSet<BackendId>) -> Option<BackendId> {
        FEATURE_PRIORITY.iter().copied().find(|id| selected.contains(id))
    }

    /// One instructed call, parsed into the feature's reply shape.
    /// Errors come back as a reason string for [`FeatureOutcome::Failed`].
    async fn request<R: for<'de> Deserialize<'de>>(
        &self,
        backend: BackendId,
        instruction: &str,
        text: &str,
        feature: &str,
    ) -> Result<R, String> {
        let request = BackendRequest::instructed(instruction, text);
        let raw = match self.dispatcher.send(backend, &request).await {
            Ok(raw) => raw,
            Err(err) => {
                warn!(backend = %backend, feature, error = %err, "feature call failed");
                return Err(err.to_string());
            }
        };
        serde_json::from_str::<R>(strip_code_fences(&raw)).map_err(|err| {
            warn!(backend = %backend, feature, error = %err, "feature reply unparsable");
            format!("invalid response: {err}")
        })
    }

    /// Sarcasm signal for one text.
    pub async fn sarcasm(
        &self,
        text: &str,
        selected: &BTreeSet<BackendId>,
    ) -> FeatureOutcome<Sarcasm> {
        let Some(backend) = Self::select_backend(selected) else {
            return FeatureOutcome::Failed { reason: NO_CAPABLE_BACKEND.into() };
        };
        match self
            .request::<SarcasmReply>(backend, prompts::SARCASM, text, "sarcasm")
            .await
        {
            Ok(reply) => FeatureOutcome::Computed(Sarcasm {
                is_sarcastic: reply.is_sarcastic,
                confidence: reply.confidence.clamp(0.0, 1.0),
                reasoning: reply.reasoning,
            }),
            Err(reason) => FeatureOutcome::Failed { reason },
        }
    }

    /// Perceived-IQ signal for one text.
    ///
    /// Texts that are mostly emoji short-circuit to a fixed neutral
    /// result without any backend work: there is nothing for a language
    /// model to judge.
    pub async fn iq(&self, text: &str, selected: &BTreeSet<BackendId>) -> FeatureOutcome<Iq> {
        if is_mostly_emoji(text) {
            return FeatureOutcome::Computed(Iq {
                iq_score: 0.5,
                raw_iq: 100.0,
                confidence: 0.0,
                reasoning: "skipped: mostly emoji".into(),
            });
        }
        let Some(backend) = Self::select_backend(selected) else {
            return FeatureOutcome::Failed { reason: NO_CAPABLE_BACKEND.into() };
        };
        match self.request::<IqReply>(backend, prompts::IQ, text, "iq").await {
            Ok(reply) => FeatureOutcome::Computed(Iq {
                iq_score: normalize_iq(reply.raw_iq),
                raw_iq: reply.raw_iq,
                confidence: reply.confidence.clamp(0.0, 1.0),
                reasoning: reply.reasoning,
            }),
            Err(reason) => FeatureOutcome::Failed { reason },
        }
    }

    /// Bot-likelihood signal for one text.
    pub async fn bot(&self, text: &str, selected: &BTreeSet<BackendId>) -> FeatureOutcome<Bot> {
        let Some(backend) = Self::select_backend(selected) else {
            return FeatureOutcome::Failed { reason: NO_CAPABLE_BACKEND.into() };
        };
        match self.request::<BotReply>(backend, prompts::BOT, text, "bot").await {
            Ok(reply) => FeatureOutcome::Computed(Bot {
                is_bot: reply.is_bot,
                probability: reply.probability.clamp(0.0, 1.0),
                reasoning: reply.reasoning,
            }),
            Err(reason) => FeatureOutcome::Failed { reason },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;

    use sentira_backends::{BackendError, Result, Transport, TransportRegistry};
    use sentira_types::AnalysisConfig;

    use crate::dispatch::MAX_RETRIES;
    use crate::pacer::PacerRegistry;

    struct CannedTransport {
        id: BackendId,
        calls: Arc<AtomicU32>,
        reply: Result<&'static str>,
    }

    #[async_trait]
    impl Transport for CannedTransport {
        fn id(&self) -> BackendId {
            self.id
        }

        async fn send(&self, _request: &BackendRequest) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.reply {
                Ok(raw) => Ok(raw.to_string()),
                Err(_) => Err(BackendError::RequestFailed("HTTP 500: boom".into())),
            }
        }
    }

    fn analyzer_with(
        id: BackendId,
        reply: Result<&'static str>,
    ) -> (FeatureAnalyzer, Arc<AtomicU32>) {
        let calls = Arc::new(AtomicU32::new(0));
        let mut registry = TransportRegistry::new();
        registry.insert(Arc::new(CannedTransport { id, calls: calls.clone(), reply }));
        let pacers = Arc::new(PacerRegistry::new(Arc::new(AnalysisConfig::default())));
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::new(registry),
            pacers,
            MAX_RETRIES,
        ));
        (FeatureAnalyzer::new(dispatcher), calls)
    }

    fn set(ids: &[BackendId]) -> BTreeSet<BackendId> {
        ids.iter().copied().collect()
    }

    #[test]
    fn priority_takes_first_present_entry() {
        assert_eq!(
            FeatureAnalyzer::select_backend(&set(&[BackendId::Grok, BackendId::Gemini])),
            Some(BackendId::Gemini)
        );
        assert_eq!(
            FeatureAnalyzer::select_backend(&set(&[BackendId::Gpt4, BackendId::Grok])),
            Some(BackendId::Gpt4)
        );
        assert_eq!(
            FeatureAnalyzer::select_backend(&set(&[BackendId::Grok])),
            Some(BackendId::Grok)
        );
        assert_eq!(FeatureAnalyzer::select_backend(&set(&[BackendId::Lexicon])), None);
        assert_eq!(FeatureAnalyzer::select_backend(&BTreeSet::new()), None);
    }

    #[test]
    fn iq_normalization() {
        assert_eq!(normalize_iq(100.0), 0.5);
        assert_eq!(normalize_iq(55.0), 0.0);
        assert_eq!(normalize_iq(145.0), 1.0);
        assert_eq!(normalize_iq(40.0), 0.0);
        assert_eq!(normalize_iq(200.0), 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn sarcasm_parses_reply() {
        let (analyzer, calls) = analyzer_with(
            BackendId::Gemini,
            Ok(r#"{"is_sarcastic": true, "confidence": 0.8, "reasoning": "deadpan praise"}"#),
        );
        let outcome = analyzer.sarcasm("sure, great job", &set(&[BackendId::Gemini])).await;
        let sarcasm = outcome.computed().expect("computed");
        assert!(sarcasm.is_sarcastic);
        assert_eq!(sarcasm.confidence, 0.8);
        assert_eq!(sarcasm.reasoning, "deadpan praise");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn sarcasm_parses_fenced_reply() {
        let (analyzer, _) = analyzer_with(
            BackendId::Gemini,
            Ok("```json\n{\"is_sarcastic\": false, \"confidence\": 0.6}\n```"),
        );
        let outcome = analyzer.sarcasm("plain text", &set(&[BackendId::Gemini])).await;
        let sarcasm = outcome.computed().expect("computed");
        assert!(!sarcasm.is_sarcastic);
        assert_eq!(sarcasm.reasoning, "");
    }

    #[tokio::test(start_paused = true)]
    async fn transport_failure_becomes_failed_outcome() {
        let (analyzer, calls) = analyzer_with(
            BackendId::Gemini,
            Err(BackendError::RequestFailed("unused".into())),
        );
        let outcome = analyzer.bot("text", &set(&[BackendId::Gemini])).await;
        match outcome {
            FeatureOutcome::Failed { reason } => assert!(reason.contains("HTTP 500")),
            other => panic!("expected Failed, got {other:?}"),
        }
        // The dispatcher burned its full retry budget first.
        assert_eq!(calls.load(Ordering::SeqCst), MAX_RETRIES);
    }

    #[tokio::test(start_paused = true)]
    async fn unparsable_reply_becomes_failed_outcome() {
        let (analyzer, _) = analyzer_with(BackendId::Gpt4, Ok("definitely a bot, trust me"));
        let outcome = analyzer.bot("text", &set(&[BackendId::Gpt4])).await;
        match outcome {
            FeatureOutcome::Failed { reason } => assert!(reason.starts_with("invalid response:")),
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn no_capable_backend_defaults_without_network() {
        let (analyzer, calls) = analyzer_with(BackendId::Gpt4, Ok("{}"));
        let outcome = analyzer.iq("text", &set(&[BackendId::Lexicon])).await;
        match outcome {
            FeatureOutcome::Failed { reason } => assert_eq!(reason, NO_CAPABLE_BACKEND),
            other => panic!("expected Failed, got {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn mostly_emoji_short_circuits_iq() {
        let (analyzer, calls) = analyzer_with(BackendId::Gpt4, Ok("{}"));
        let outcome = analyzer.iq("😀😂🔥🚀", &set(&[BackendId::Gpt4])).await;
        let iq = outcome.computed().expect("computed");
        assert_eq!(iq.iq_score, 0.5);
        assert_eq!(iq.raw_iq, 100.0);
        assert_eq!(iq.confidence, 0.0);
        assert_eq!(iq.reasoning, "skipped: mostly emoji");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn iq_reply_is_normalized_and_clamped() {
        let (analyzer, _) = analyzer_with(
            BackendId::Gpt4,
            Ok(r#"{"raw_iq": 127, "confidence": 1.7, "reasoning": "structured argument"}"#),
        );
        let outcome = analyzer.iq("a long considered post", &set(&[BackendId::Gpt4])).await;
        let iq = outcome.computed().expect("computed");
        assert_eq!(iq.raw_iq, 127.0);
        assert_eq!(iq.iq_score, 0.8);
        // Confidence is clamped into [0, 1].
        assert_eq!(iq.confidence, 1.0);
    }
}
