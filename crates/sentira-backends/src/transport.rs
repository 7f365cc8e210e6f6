//! The [`Transport`] seam and the registry of configured backends.
//!
//! One logical request goes in, one raw response string comes out. The
//! transport does not parse: the batch and feature analyzers own the
//! response contracts, so a lexicon transport can answer with a bare
//! float while a remote LLM answers with whatever the model produced.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use sentira_types::BackendId;

use crate::error::Result;
use crate::lexicon::LexiconBackend;
use crate::local_model::{LocalModelBackend, ModelLoader};
use crate::remote::{builtin_remotes, RemoteBackend};

/// One logical request to one backend.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendRequest {
    /// Instruction for instruction-following backends. Local backends
    /// ignore it.
    pub instruction: Option<String>,

    /// The text under analysis.
    pub text: String,
}

impl BackendRequest {
    /// A bare request: just the text, no instruction.
    pub fn text(text: impl Into<String>) -> Self {
        Self { instruction: None, text: text.into() }
    }

    /// A request with an instruction contract attached.
    pub fn instructed(instruction: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            instruction: Some(instruction.into()),
            text: text.into(),
        }
    }
}

/// A scoring source that can answer one request.
///
/// Implementations handle protocol details (authentication, request
/// formatting) but never response parsing, and must be safe to call
/// concurrently.
#[async_trait]
pub trait Transport: Send + Sync {
    /// The identity this transport serves.
    fn id(&self) -> BackendId;

    /// Execute one request and return the raw response text.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`](crate::error::BackendError) on transport,
    /// authentication, or rate-limit failure.
    async fn send(&self, request: &BackendRequest) -> Result<String>;
}

/// Maps backend identities to their transports.
///
/// Constructed once and shared by reference; there are no global
/// singletons. Unknown identities simply resolve to `None` and are
/// skipped by the orchestrator.
#[derive(Default)]
pub struct TransportRegistry {
    transports: HashMap<BackendId, Arc<dyn Transport>>,
}

impl TransportRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every built-in backend wired: the lexicon, the
    /// local model (with its loader), and the three remote APIs.
    pub fn with_builtins(loader: Arc<ModelLoader>) -> Self {
        let mut registry = Self::new();
        registry.insert(Arc::new(LexiconBackend::new()));
        registry.insert(Arc::new(LocalModelBackend::new(loader)));
        for config in builtin_remotes() {
            registry.insert(Arc::new(RemoteBackend::new(config)));
        }
        registry
    }

    /// Register a transport under its own identity, replacing any
    /// previous registration.
    pub fn insert(&mut self, transport: Arc<dyn Transport>) {
        self.transports.insert(transport.id(), transport);
    }

    /// Look up the transport for an identity.
    pub fn get(&self, id: BackendId) -> Option<Arc<dyn Transport>> {
        self.transports.get(&id).cloned()
    }

    /// Whether an identity has a registered transport.
    pub fn contains(&self, id: BackendId) -> bool {
        self.transports.contains_key(&id)
    }

    /// The registered identities, in unspecified order.
    pub fn ids(&self) -> Vec<BackendId> {
        self.transports.keys().copied().collect()
    }
}

impl std::fmt::Debug for TransportRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportRegistry")
            .field("ids", &self.ids())
            .finish()
    }
}
