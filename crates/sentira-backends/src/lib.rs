//! # sentira-backends
//!
//! The transport layer for the sentira analysis engine.
//!
//! # Architecture
//!
//! - [`Transport`] is the uniform seam every scoring source implements:
//!   one opaque request in, one raw response string out. Parsing belongs
//!   to the caller.
//! - [`RemoteBackend`] implements it for any OpenAI-compatible chat API
//!   (gpt4, gemini, grok).
//! - [`LexiconBackend`] wraps the pure in-process [`LexiconScorer`].
//! - [`LocalModelBackend`] wraps the lazily loaded neural model and falls
//!   back to the lexicon when the model is unavailable.
//! - [`TransportRegistry`] maps backend identities to transports.
//! - [`ImageAnalyzer`] is the collaborator contract for image scoring.

pub mod error;
pub mod image;
pub mod lexicon;
pub mod local_model;
pub mod remote;
pub mod transport;
pub mod wire;

pub use error::{BackendError, Result};
pub use image::ImageAnalyzer;
pub use lexicon::{LexiconBackend, LexiconScorer};
pub use local_model::{LocalModelBackend, ModelLoader, ModelState, SentimentModel};
pub use remote::{builtin_remotes, RemoteBackend, RemoteConfig};
pub use transport::{BackendRequest, Transport, TransportRegistry};
