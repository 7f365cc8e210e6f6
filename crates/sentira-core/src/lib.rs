//! # sentira-core
//!
//! The multi-backend analysis orchestrator.
//!
//! Fans work out across heterogeneous, independently rate-limited,
//! independently flaky scoring backends; degrades gracefully when any of
//! them fail; adapts its own request cadence to observed failure rates;
//! and memoizes whole-request results. The public surface is total: an
//! orchestration always returns a structurally complete record per text.
//!
//! # Architecture
//!
//! - [`AdaptivePacer`] / [`PacerRegistry`] -- per-backend adaptive delay,
//!   failure streak, and batch width
//! - [`Dispatcher`] -- one paced, retried call to one backend
//! - [`BatchAnalyzer`] -- baseline sentiment for many texts, chunked by
//!   the pacer's live batch width
//! - [`FeatureAnalyzer`] -- optional per-text signals (sarcasm, IQ, bot)
//!   with priority-ordered backend selection
//! - [`ResultCache`] -- fingerprint-keyed memoization with TTL
//! - [`Orchestrator`] -- the single public entry point, with
//!   single-flight coalescing of identical concurrent requests

pub mod batch;
pub mod cache;
pub mod dispatch;
pub mod features;
pub mod orchestrator;
pub mod pacer;
pub mod text;

mod prompts;

pub use batch::{BatchAnalyzer, BatchReport};
pub use cache::ResultCache;
pub use dispatch::Dispatcher;
pub use features::{FeatureAnalyzer, FEATURE_PRIORITY};
pub use orchestrator::{AnalysisRequest, Orchestrator};
pub use pacer::{AdaptivePacer, PacerRegistry};
