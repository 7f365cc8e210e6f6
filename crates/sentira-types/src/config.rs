//! Engine configuration: per-backend pacing, caching, and retry limits.
//!
//! [`PacingConfig`] carries the adaptive-delay tuning for one backend.
//! The built-in table mirrors the production deployment values; any entry
//! can be overridden via [`AnalysisConfig::pacing`] (e.g. from a TOML file).

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backend::BackendId;

/// Serialize/deserialize a [`Duration`] as fractional seconds.
mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(de)?;
        if !secs.is_finite() || secs < 0.0 {
            return Err(serde::de::Error::custom("duration must be a non-negative number of seconds"));
        }
        Ok(Duration::from_secs_f64(secs))
    }
}

/// Configuration is malformed or violates an invariant.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A pacing entry breaks `max_delay > min_delay > 0`.
    #[error("{backend}: delay bounds must satisfy max_delay > min_delay > 0")]
    DelayBounds {
        /// Which backend's entry is invalid.
        backend: BackendId,
    },

    /// A pacing entry has a zero batch size.
    #[error("{backend}: batch_size must be at least 1")]
    ZeroBatch {
        /// Which backend's entry is invalid.
        backend: BackendId,
    },

    /// A pacing entry has a retry multiplier at or below 1.
    #[error("{backend}: retry_multiplier must be greater than 1")]
    RetryMultiplier {
        /// Which backend's entry is invalid.
        backend: BackendId,
    },

    /// The retry cap is zero.
    #[error("max_retries must be at least 1")]
    ZeroRetries,
}

/// Adaptive-delay tuning for one backend.
///
/// Invariants (enforced by [`PacingConfig::validate`]):
/// `max_delay > min_delay > 0`, `batch_size >= 1`, `retry_multiplier > 1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PacingConfig {
    /// Delay applied before the first request.
    #[serde(with = "duration_secs")]
    pub initial_delay: Duration,

    /// Floor the delay decays toward after sustained success.
    #[serde(with = "duration_secs")]
    pub min_delay: Duration,

    /// Ceiling the delay grows toward under sustained failure.
    #[serde(with = "duration_secs")]
    pub max_delay: Duration,

    /// Requests issued concurrently per chunk when the backend is healthy.
    pub batch_size: usize,

    /// Floor for the delay immediately after a failure.
    #[serde(with = "duration_secs")]
    pub min_retry_delay: Duration,

    /// Base growth factor applied to the delay on failure.
    pub retry_multiplier: f64,
}

impl PacingConfig {
    /// The built-in pacing table for a backend.
    ///
    /// Remote values mirror the production deployment; local backends run
    /// in-process and get millisecond-scale pacing so the dispatcher path
    /// stays uniform without throttling them meaningfully.
    pub fn for_backend(id: BackendId) -> Self {
        match id {
            BackendId::Gpt4 => Self {
                initial_delay: Duration::from_secs_f64(2.0),
                min_delay: Duration::from_secs_f64(1.0),
                max_delay: Duration::from_secs_f64(10.0),
                batch_size: 2,
                min_retry_delay: Duration::from_secs_f64(2.0),
                retry_multiplier: 2.0,
            },
            BackendId::Gemini => Self {
                initial_delay: Duration::from_secs_f64(1.5),
                min_delay: Duration::from_secs_f64(0.8),
                max_delay: Duration::from_secs_f64(6.0),
                batch_size: 3,
                min_retry_delay: Duration::from_secs_f64(1.5),
                retry_multiplier: 1.5,
            },
            BackendId::Grok => Self {
                initial_delay: Duration::from_secs_f64(2.0),
                min_delay: Duration::from_secs_f64(1.0),
                max_delay: Duration::from_secs_f64(8.0),
                batch_size: 2,
                min_retry_delay: Duration::from_secs_f64(2.0),
                retry_multiplier: 2.0,
            },
            BackendId::Lexicon | BackendId::LocalModel => Self {
                initial_delay: Duration::from_millis(10),
                min_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(50),
                batch_size: 8,
                min_retry_delay: Duration::from_millis(10),
                retry_multiplier: 2.0,
            },
        }
    }

    /// Check the pacing invariants.
    pub fn validate(&self, backend: BackendId) -> Result<(), ConfigError> {
        if self.min_delay.is_zero() || self.max_delay <= self.min_delay {
            return Err(ConfigError::DelayBounds { backend });
        }
        if self.batch_size == 0 {
            return Err(ConfigError::ZeroBatch { backend });
        }
        if self.retry_multiplier <= 1.0 {
            return Err(ConfigError::RetryMultiplier { backend });
        }
        Ok(())
    }
}

/// Result-cache tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Lifetime of a fully successful orchestration result.
    #[serde(with = "duration_secs")]
    pub ttl: Duration,

    /// Lifetime of a degraded (partially defaulted) result. Set equal to
    /// `ttl` to cache degraded results like successful ones.
    #[serde(with = "duration_secs")]
    pub degraded_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(3600),
            degraded_ttl: Duration::from_secs(300),
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Per-backend pacing overrides. Backends not listed use
    /// [`PacingConfig::for_backend`].
    pub pacing: BTreeMap<BackendId, PacingConfig>,

    /// Result-cache tuning.
    pub cache: CacheConfig,

    /// Total transport attempts per logical backend call.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Deadline for the local model's lazy load.
    #[serde(with = "duration_secs", default = "default_model_load_timeout")]
    pub model_load_timeout: Duration,
}

fn default_max_retries() -> u32 {
    5
}

fn default_model_load_timeout() -> Duration {
    Duration::from_secs(300)
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            pacing: BTreeMap::new(),
            cache: CacheConfig::default(),
            max_retries: default_max_retries(),
            model_load_timeout: default_model_load_timeout(),
        }
    }
}

impl AnalysisConfig {
    /// The effective pacing for a backend: the override if present,
    /// otherwise the built-in table entry.
    pub fn pacing_for(&self, id: BackendId) -> PacingConfig {
        self.pacing
            .get(&id)
            .cloned()
            .unwrap_or_else(|| PacingConfig::for_backend(id))
    }

    /// Validate every pacing entry (built-in and overridden) plus the
    /// retry cap.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_retries == 0 {
            return Err(ConfigError::ZeroRetries);
        }
        for id in BackendId::ALL {
            self.pacing_for(id).validate(id)?;
        }
        Ok(())
    }
}
