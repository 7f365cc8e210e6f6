//! Baseline sentiment scoring for a list of texts against one backend.
//!
//! Texts are processed in consecutive chunks. The chunk width is re-read
//! from the backend's pacer before every chunk, so a failure streak
//! narrows the fan-out mid-run and a recovery widens it again. Within a
//! chunk, one dispatcher call per text runs concurrently and all are
//! awaited before the next chunk starts; one item failing never aborts
//! its siblings.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, warn};

use sentira_backends::{BackendError, BackendRequest, Result};
use sentira_types::BackendId;

use crate::dispatch::Dispatcher;
use crate::pacer::PacerRegistry;
use crate::prompts;
use crate::text::strip_code_fences;

/// Outcome of one batch run.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    /// One score per input text, in input order. Failed items carry the
    /// neutral `0.0`.
    pub scores: Vec<f32>,

    /// How many items were defaulted after their call or parse failed.
    pub failures: usize,

    /// How many chunks the run was partitioned into.
    pub chunks: usize,
}

/// Computes baseline scores for many texts against one backend.
pub struct BatchAnalyzer {
    dispatcher: Arc<Dispatcher>,
    pacers: Arc<PacerRegistry>,
}

impl BatchAnalyzer {
    /// Create an analyzer over the shared dispatcher and pacers.
    pub fn new(dispatcher: Arc<Dispatcher>, pacers: Arc<PacerRegistry>) -> Self {
        Self { dispatcher, pacers }
    }

    /// Score every text against `id`. Always returns exactly
    /// `texts.len()` scores, in input order.
    pub async fn run(&self, id: BackendId, texts: &[String]) -> BatchReport {
        let mut scores = vec![0.0f32; texts.len()];
        let mut failures = 0usize;
        let mut chunks = 0usize;

        let mut next = 0usize;
        while next < texts.len() {
            let width = self.pacers.pacer(id).batch_size().await;
            let end = (next + width).min(texts.len());
            chunks += 1;
            debug!(backend = %id, start = next, width, "dispatching baseline chunk");

            let calls = (next..end).map(|i| {
                let text = texts[i].as_str();
                async move {
                    let request = BackendRequest::instructed(prompts::BASELINE, text);
                    (i, self.dispatcher.send(id, &request).await)
                }
            });

            for (i, outcome) in join_all(calls).await {
                match outcome.and_then(|raw| parse_score(&raw)) {
                    Ok(score) => scores[i] = score,
                    Err(err) => {
                        failures += 1;
                        warn!(
                            backend = %id,
                            index = i,
                            error = %err,
                            "baseline scoring failed, substituting neutral score"
                        );
                    }
                }
            }
            next = end;
        }

        BatchReport { scores, failures, chunks }
    }
}

/// Parse a baseline reply: a bare float, or a JSON object with a `score`
/// field. Anything else is a per-item failure.
fn parse_score(raw: &str) -> Result<f32> {
    let body = strip_code_fences(raw);
    if let Ok(score) = body.parse::<f32>() {
        return Ok(score.clamp(-1.0, 1.0));
    }
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(score) = value.get("score").and_then(|s| s.as_f64()) {
            return Ok((score as f32).clamp(-1.0, 1.0));
        }
    }
    let mut preview = body.chars().take(80).collect::<String>();
    if preview.len() < body.len() {
        preview.push('…');
    }
    Err(BackendError::InvalidResponse(format!("no score in reply: {preview}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;

    use sentira_backends::{Transport, TransportRegistry};
    use sentira_types::{AnalysisConfig, BackendId, PacingConfig};

    use crate::dispatch::MAX_RETRIES;

    /// Scores each text by its leading number; texts containing "FAIL"
    /// always error.
    struct ScriptedTransport {
        id: BackendId,
        calls: AtomicU32,
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        fn id(&self) -> BackendId {
            self.id
        }

        async fn send(&self, request: &BackendRequest) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if request.text.contains("FAIL") {
                return Err(BackendError::RequestFailed("HTTP 500: boom".into()));
            }
            Ok(format!("{{\"score\": {}}}", request.text.trim()))
        }
    }

    fn fast_config(batch_size: usize) -> AnalysisConfig {
        let mut config = AnalysisConfig::default();
        config.pacing.insert(
            BackendId::Gpt4,
            PacingConfig {
                batch_size,
                ..PacingConfig::for_backend(BackendId::LocalModel)
            },
        );
        config
    }

    fn analyzer(
        config: AnalysisConfig,
        transport: Arc<dyn Transport>,
    ) -> (BatchAnalyzer, Arc<PacerRegistry>) {
        let mut registry = TransportRegistry::new();
        registry.insert(transport);
        let pacers = Arc::new(PacerRegistry::new(Arc::new(config)));
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::new(registry),
            pacers.clone(),
            MAX_RETRIES,
        ));
        (BatchAnalyzer::new(dispatcher, pacers.clone()), pacers)
    }

    fn texts(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn returns_scores_in_input_order() {
        let transport = Arc::new(ScriptedTransport {
            id: BackendId::Gpt4,
            calls: AtomicU32::new(0),
        });
        let (batch, _) = analyzer(fast_config(3), transport.clone());

        let report = batch
            .run(BackendId::Gpt4, &texts(&["0.9", "-0.4", "0.1", "0.7", "-1"]))
            .await;
        assert_eq!(report.scores, vec![0.9, -0.4, 0.1, 0.7, -1.0]);
        assert_eq!(report.failures, 0);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn chunk_count_is_ceil_of_n_over_b() {
        let transport = Arc::new(ScriptedTransport {
            id: BackendId::Gpt4,
            calls: AtomicU32::new(0),
        });
        let (batch, _) = analyzer(fast_config(3), transport);

        let report = batch
            .run(
                BackendId::Gpt4,
                &texts(&["0.1", "0.2", "0.3", "0.4", "0.5", "0.6", "0.7"]),
            )
            .await;
        // ceil(7 / 3) = 3 chunks.
        assert_eq!(report.chunks, 3);
        assert_eq!(report.scores.len(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn failing_item_defaults_without_aborting_siblings() {
        let transport = Arc::new(ScriptedTransport {
            id: BackendId::Gpt4,
            calls: AtomicU32::new(0),
        });
        let (batch, pacers) = analyzer(fast_config(1), transport.clone());

        let report = batch
            .run(BackendId::Gpt4, &texts(&["0.8", "FAIL", "-0.3"]))
            .await;
        assert_eq!(report.scores, vec![0.8, 0.0, -0.3]);
        assert_eq!(report.failures, 1);
        // The failing item burned the full retry budget; the next item's
        // success then reset the streak.
        assert_eq!(
            transport.calls.load(Ordering::SeqCst),
            1 + MAX_RETRIES + 1
        );
        assert_eq!(pacers.pacer(BackendId::Gpt4).consecutive_failures().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn width_shrinks_after_failures_mid_run() {
        let transport = Arc::new(ScriptedTransport {
            id: BackendId::Gpt4,
            calls: AtomicU32::new(0),
        });
        let (batch, _) = analyzer(fast_config(2), transport);

        // First chunk of 2 ends with the failing item exhausting retries,
        // leaving a streak of MAX_RETRIES, so the following chunks run at
        // width 1: chunks are [0.1, FAIL], [0.2], [0.3] = 3 chunks... but
        // the streak only narrows to max(1, 2 - 5) = 1.
        let report = batch
            .run(BackendId::Gpt4, &texts(&["0.1", "FAIL", "0.2", "0.3"]))
            .await;
        assert_eq!(report.chunks, 3);
        assert_eq!(report.scores, vec![0.1, 0.0, 0.2, 0.3]);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_input_is_a_no_op() {
        let transport = Arc::new(ScriptedTransport {
            id: BackendId::Gpt4,
            calls: AtomicU32::new(0),
        });
        let (batch, _) = analyzer(fast_config(2), transport.clone());

        let report = batch.run(BackendId::Gpt4, &[]).await;
        assert!(report.scores.is_empty());
        assert_eq!(report.chunks, 0);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn parse_bare_float() {
        assert_eq!(parse_score("0.75").unwrap(), 0.75);
        assert_eq!(parse_score(" -0.2 \n").unwrap(), -0.2);
    }

    #[test]
    fn parse_json_object() {
        assert_eq!(parse_score("{\"score\": -0.9}").unwrap(), -0.9);
    }

    #[test]
    fn parse_fenced_json() {
        assert_eq!(parse_score("```json\n{\"score\": 0.4}\n```").unwrap(), 0.4);
    }

    #[test]
    fn parse_clamps_out_of_range() {
        assert_eq!(parse_score("7").unwrap(), 1.0);
        assert_eq!(parse_score("{\"score\": -3.5}").unwrap(), -1.0);
    }

    #[test]
    fn parse_rejects_prose() {
        let err = parse_score("the sentiment is positive").unwrap_err();
        assert!(matches!(err, BackendError::InvalidResponse(_)));
    }
}
