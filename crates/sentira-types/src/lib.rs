//! # sentira-types
//!
//! Shared vocabulary for the sentira analysis engine.
//!
//! Contains the backend identities, the per-backend pacing configuration,
//! and the analysis record types (tagged feature outcomes plus the
//! flattened boundary shape). This crate has no I/O and no async code.

pub mod backend;
pub mod config;
pub mod record;

pub use backend::{BackendId, UnknownBackend};
pub use config::{AnalysisConfig, CacheConfig, ConfigError, PacingConfig};
pub use record::{
    AnalysisRecord, Bot, FeatureKind, FeatureOutcome, FlatRecord, ImageVerdict, Iq, Sarcasm,
    NOT_AVAILABLE, UNAVAILABLE_SCORE,
};
