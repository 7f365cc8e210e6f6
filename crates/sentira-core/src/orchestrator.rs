//! The single public entry point of the analysis engine.
//!
//! Given texts, a backend set, and a feature set, the [`Orchestrator`]
//! produces one structurally complete [`AnalysisRecord`] per text: cache
//! check, baseline scores per backend, per-text feature assembly,
//! optional image analysis, cache write. Its surface is total -- every
//! failure path below it degrades to a documented default, so the caller
//! never sees an error, only records.
//!
//! Identical concurrent requests are coalesced: one computes, the others
//! wait on a per-fingerprint gate and are then served from cache.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

use sentira_backends::{ImageAnalyzer, TransportRegistry};
use sentira_types::{
    AnalysisConfig, AnalysisRecord, BackendId, CacheConfig, FeatureKind, FeatureOutcome,
};

use crate::batch::BatchAnalyzer;
use crate::cache::ResultCache;
use crate::dispatch::Dispatcher;
use crate::features::FeatureAnalyzer;
use crate::pacer::PacerRegistry;

/// One orchestration call's full input set.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRequest {
    /// The texts to analyze, in output order.
    pub texts: Vec<String>,

    /// Which backends produce baseline scores. Must be non-empty to get
    /// any baselines; unknown backends are skipped.
    pub backends: BTreeSet<BackendId>,

    /// Which optional signals to compute. Empty means baselines only.
    pub features: BTreeSet<FeatureKind>,

    /// Image to analyze alongside a single text.
    pub image_ref: Option<String>,

    /// Optional per-text labels (e.g. source tags), matched by index.
    pub labels: Option<Vec<String>>,
}

impl AnalysisRequest {
    /// A request for baseline scores only.
    pub fn new(texts: Vec<String>, backends: BTreeSet<BackendId>) -> Self {
        Self {
            texts,
            backends,
            features: BTreeSet::new(),
            image_ref: None,
            labels: None,
        }
    }

    /// Add a feature set.
    pub fn with_features(mut self, features: BTreeSet<FeatureKind>) -> Self {
        self.features = features;
        self
    }

    /// Add an image reference (only honored for single-text requests).
    pub fn with_image_ref(mut self, image_ref: impl Into<String>) -> Self {
        self.image_ref = Some(image_ref.into());
        self
    }

    /// Add per-text labels.
    pub fn with_labels(mut self, labels: Vec<String>) -> Self {
        self.labels = Some(labels);
        self
    }
}

/// Composes pacing, dispatch, batching, features, and caching into the
/// one public operation.
pub struct Orchestrator {
    dispatcher: Arc<Dispatcher>,
    pacers: Arc<PacerRegistry>,
    batch: BatchAnalyzer,
    features: FeatureAnalyzer,
    cache: ResultCache,
    cache_config: CacheConfig,
    inflight: DashMap<String, Arc<Mutex<()>>>,
    image: Option<Arc<dyn ImageAnalyzer>>,
}

impl Orchestrator {
    /// Build an engine over a transport registry.
    ///
    /// All shared state (pacers, cache, in-flight gates) lives inside the
    /// returned value; two orchestrators never interfere with each other.
    pub fn new(config: Arc<AnalysisConfig>, transports: Arc<TransportRegistry>) -> Self {
        let pacers = Arc::new(PacerRegistry::new(config.clone()));
        let dispatcher = Arc::new(Dispatcher::new(
            transports,
            pacers.clone(),
            config.max_retries,
        ));
        Self {
            batch: BatchAnalyzer::new(dispatcher.clone(), pacers.clone()),
            features: FeatureAnalyzer::new(dispatcher.clone()),
            dispatcher,
            pacers,
            cache: ResultCache::new(),
            cache_config: config.cache.clone(),
            inflight: DashMap::new(),
            image: None,
        }
    }

    /// Attach the image-analysis collaborator.
    pub fn with_image_analyzer(mut self, analyzer: Arc<dyn ImageAnalyzer>) -> Self {
        self.image = Some(analyzer);
        self
    }

    /// The pacer registry (for diagnostics and tests).
    pub fn pacers(&self) -> Arc<PacerRegistry> {
        self.pacers.clone()
    }

    /// Analyze one text, restoring the scalar shape on output.
    pub async fn analyze_one(
        &self,
        text: impl Into<String>,
        backends: BTreeSet<BackendId>,
        features: BTreeSet<FeatureKind>,
        image_ref: Option<String>,
        label: Option<String>,
    ) -> AnalysisRecord {
        let text = text.into();
        let mut request = AnalysisRequest::new(vec![text.clone()], backends)
            .with_features(features);
        request.image_ref = image_ref;
        request.labels = label.map(|l| vec![l]);

        self.analyze(request)
            .await
            .into_iter()
            .next()
            // One input always yields one record; this arm is tier-3
            // defense in depth.
            .unwrap_or_else(|| AnalysisRecord::empty(text, None))
    }

    /// Analyze a list of texts. Always returns `request.texts.len()`
    /// records, in input order. Never fails.
    pub async fn analyze(&self, request: AnalysisRequest) -> Vec<AnalysisRecord> {
        if request.texts.is_empty() {
            return Vec::new();
        }
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "analyze",
            %run_id,
            texts = request.texts.len(),
            backends = request.backends.len(),
        );
        self.analyze_inner(request).instrument(span).await
    }

    async fn analyze_inner(&self, request: AnalysisRequest) -> Vec<AnalysisRecord> {
        let key = ResultCache::fingerprint(
            &request.texts,
            &request.backends,
            &request.features,
            request.image_ref.as_deref(),
            request.labels.as_deref(),
        );

        if let Some(hit) = self.cache.get(&key) {
            debug!("served from cache");
            return hit;
        }

        // Coalesce identical concurrent requests: losers of this gate
        // find the winner's result in the cache when they get the lock.
        let gate = self
            .inflight
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = gate.lock().await;

        if let Some(hit) = self.cache.get(&key) {
            drop(guard);
            debug!("served from cache after coalescing");
            return hit;
        }

        let (records, degraded) = self.run(&request).await;

        let ttl = if degraded {
            self.cache_config.degraded_ttl
        } else {
            self.cache_config.ttl
        };
        self.cache.set(key.clone(), records.clone(), ttl);

        drop(guard);
        self.inflight.remove(&key);

        info!(
            records = records.len(),
            degraded,
            ttl_secs = ttl.as_secs(),
            "orchestration complete"
        );
        records
    }

    /// The actual pipeline: baselines, per-text assembly, image merge.
    async fn run(&self, request: &AnalysisRequest) -> (Vec<AnalysisRecord>, bool) {
        // Step 1: one batch run per selected backend over all texts.
        let mut baselines: Vec<(BackendId, Vec<f32>)> = Vec::new();
        let mut degraded = false;
        for &backend in &request.backends {
            if !self.dispatcher.recognizes(backend) {
                warn!(%backend, "backend not recognized, leaving zero baseline");
                continue;
            }
            let report = self.batch.run(backend, &request.texts).await;
            degraded |= report.failures > 0;
            baselines.push((backend, report.scores));
        }

        // Step 2: per-text assembly. Selected features for one text run
        // concurrently; texts proceed in order.
        let analyzed_at = Utc::now();
        let mut records = Vec::with_capacity(request.texts.len());
        for (index, text) in request.texts.iter().enumerate() {
            let label = request
                .labels
                .as_ref()
                .and_then(|labels| labels.get(index))
                .cloned();
            let mut record = AnalysisRecord::empty(text.clone(), label);
            record.analyzed_at = analyzed_at;
            for (backend, scores) in &baselines {
                if let Some(score) = scores.get(index) {
                    record.baselines.insert(*backend, *score);
                }
            }

            let (sarcasm, iq, bot) = tokio::join!(
                async {
                    if request.features.contains(&FeatureKind::Sarcasm) {
                        self.features.sarcasm(text, &request.backends).await
                    } else {
                        FeatureOutcome::NotRequested
                    }
                },
                async {
                    if request.features.contains(&FeatureKind::Iq) {
                        self.features.iq(text, &request.backends).await
                    } else {
                        FeatureOutcome::NotRequested
                    }
                },
                async {
                    if request.features.contains(&FeatureKind::Bot) {
                        self.features.bot(text, &request.backends).await
                    } else {
                        FeatureOutcome::NotRequested
                    }
                },
            );
            record.sarcasm = sarcasm;
            record.iq = iq;
            record.bot = bot;
            degraded |= record.is_degraded();
            records.push(record);
        }

        // Step 3: image analysis, only for a single text with an image.
        if records.len() == 1 {
            if let (Some(image_ref), Some(analyzer)) = (&request.image_ref, &self.image) {
                let backends: Vec<BackendId> = request.backends.iter().copied().collect();
                let verdicts = analyzer.analyze(image_ref, &backends).await;
                if let Some(record) = records.first_mut() {
                    record.image = Some(verdicts);
                }
            }
        }

        (records, degraded)
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("cached_entries", &self.cache.len())
            .field("has_image_analyzer", &self.image.is_some())
            .finish()
    }
}
