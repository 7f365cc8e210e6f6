//! Lazily loaded local neural sentiment model.
//!
//! The model behind [`ModelLoader`] is loaded at most once per process,
//! on first use, under a hard deadline (default five minutes). Expiry
//! cancels the in-flight load by dropping its future and pins the loader
//! in an explicit [`ModelState::Unavailable`] state; it never blocks a
//! caller indefinitely and never returns an error. Callers that needed
//! the model fall back to the lexicon scorer.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use sentira_types::BackendId;

use crate::error::Result;
use crate::lexicon::LexiconScorer;
use crate::transport::{BackendRequest, Transport};

/// Environment variable that disables the local model entirely
/// (for CPU-only deployments and tests).
pub const NO_LOCAL_MODEL_ENV: &str = "SENTIRA_NO_LOCAL_MODEL";

/// An in-process sentiment model.
pub trait SentimentModel: Send + Sync {
    /// Score `text` in `[-1, 1]`.
    fn score(&self, text: &str) -> f32;
}

/// Result of the one-shot model load.
#[derive(Clone)]
pub enum ModelState {
    /// The model loaded and is ready to score.
    Ready(Arc<dyn SentimentModel>),
    /// The model is disabled, failed to load, or timed out.
    Unavailable(String),
}

impl std::fmt::Debug for ModelState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelState::Ready(_) => f.write_str("Ready"),
            ModelState::Unavailable(reason) => write!(f, "Unavailable({reason})"),
        }
    }
}

/// Future that produces a loaded model, boxed so the loader stays
/// object-free at the call site.
pub type ModelFactory =
    Box<dyn Fn() -> BoxFuture<'static, anyhow::Result<Arc<dyn SentimentModel>>> + Send + Sync>;

/// Lazy, deadline-bounded, once-per-process model loader.
pub struct ModelLoader {
    cell: OnceCell<ModelState>,
    factory: Option<ModelFactory>,
    timeout: Duration,
}

impl ModelLoader {
    /// A loader that will run `factory` on first use, bounded by `timeout`.
    pub fn new(timeout: Duration, factory: ModelFactory) -> Self {
        Self {
            cell: OnceCell::new(),
            factory: Some(factory),
            timeout,
        }
    }

    /// A loader that is permanently unavailable.
    pub fn disabled(reason: impl Into<String>) -> Self {
        Self {
            cell: OnceCell::new_with(Some(ModelState::Unavailable(reason.into()))),
            factory: None,
            timeout: Duration::ZERO,
        }
    }

    /// Like [`ModelLoader::new`], but honors the
    /// [`NO_LOCAL_MODEL_ENV`] kill-switch.
    pub fn from_env(timeout: Duration, factory: ModelFactory) -> Self {
        if std::env::var(NO_LOCAL_MODEL_ENV).as_deref() == Ok("1") {
            warn!("local model disabled via {NO_LOCAL_MODEL_ENV}");
            return Self::disabled(format!("disabled via {NO_LOCAL_MODEL_ENV}"));
        }
        Self::new(timeout, factory)
    }

    /// The model state, loading it on first call.
    pub async fn get(&self) -> ModelState {
        self.cell
            .get_or_init(|| async {
                let Some(factory) = &self.factory else {
                    return ModelState::Unavailable("no model factory configured".into());
                };
                info!("loading local model");
                match tokio::time::timeout(self.timeout, factory()).await {
                    Ok(Ok(model)) => {
                        info!("local model ready");
                        ModelState::Ready(model)
                    }
                    Ok(Err(e)) => {
                        warn!(error = %e, "local model load failed");
                        ModelState::Unavailable(e.to_string())
                    }
                    Err(_) => {
                        warn!(timeout_secs = self.timeout.as_secs(), "local model load timed out");
                        ModelState::Unavailable(format!(
                            "model load timed out after {}s",
                            self.timeout.as_secs()
                        ))
                    }
                }
            })
            .await
            .clone()
    }

    /// Whether the one-shot load has already resolved.
    pub fn is_resolved(&self) -> bool {
        self.cell.initialized()
    }
}

/// [`Transport`] for the local model, with lexicon fallback when the
/// model is unavailable. Answers with the bare score as a decimal string.
pub struct LocalModelBackend {
    loader: Arc<ModelLoader>,
    fallback: LexiconScorer,
}

impl LocalModelBackend {
    /// Create the backend around a shared loader.
    pub fn new(loader: Arc<ModelLoader>) -> Self {
        Self { loader, fallback: LexiconScorer::new() }
    }
}

#[async_trait]
impl Transport for LocalModelBackend {
    fn id(&self) -> BackendId {
        BackendId::LocalModel
    }

    async fn send(&self, request: &BackendRequest) -> Result<String> {
        let score = match self.loader.get().await {
            ModelState::Ready(model) => model.score(&request.text),
            ModelState::Unavailable(reason) => {
                debug!(%reason, "local model unavailable, using lexicon fallback");
                self.fallback.score(&request.text)
            }
        };
        Ok(score.to_string())
    }
}
