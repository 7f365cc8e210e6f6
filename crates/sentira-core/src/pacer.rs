//! Adaptive per-backend request pacing.
//!
//! One [`AdaptivePacer`] exists per backend identity, created lazily by
//! the [`PacerRegistry`] and kept for the process lifetime. The pacer
//! owns the only mutable rate state in the system: the current delay,
//! the consecutive-failure streak, and the last-request timestamp, all
//! mutated under one mutex.
//!
//! [`AdaptivePacer::wait`] serializes *decision* timing per backend (the
//! mutex is held across the sleep) but does not bound in-flight
//! concurrency: once past `wait`, any number of requests may be
//! outstanding simultaneously.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use sentira_types::{AnalysisConfig, BackendId, PacingConfig};

/// Mutable pacing state; only touched under the pacer's mutex.
#[derive(Debug)]
struct PacerState {
    current_delay: Duration,
    last_request: Option<Instant>,
    consecutive_failures: u32,
}

/// Adaptive delay and failure tracking for one backend.
pub struct AdaptivePacer {
    id: BackendId,
    config: PacingConfig,
    state: Mutex<PacerState>,
}

impl AdaptivePacer {
    /// Create a pacer with the delay at `initial_delay` and no history.
    pub fn new(id: BackendId, config: PacingConfig) -> Self {
        let state = PacerState {
            current_delay: config.initial_delay,
            last_request: None,
            consecutive_failures: 0,
        };
        Self { id, config, state: Mutex::new(state) }
    }

    /// Suspend until the current delay has elapsed since the last
    /// request, then stamp the request time. The first request never
    /// waits.
    pub async fn wait(&self) {
        let mut state = self.state.lock().await;
        if let Some(last) = state.last_request {
            let elapsed = last.elapsed();
            if elapsed < state.current_delay {
                tokio::time::sleep(state.current_delay - elapsed).await;
            }
        }
        state.last_request = Some(Instant::now());
    }

    /// Record a failure: bump the streak and grow the delay, clamped to
    /// `[min_retry_delay, max_delay]`. Growth compounds with the streak.
    pub async fn report_failure(&self) {
        let mut state = self.state.lock().await;
        state.consecutive_failures += 1;
        let multiplier = self.config.retry_multiplier
            * 1.5f64.powi(state.consecutive_failures as i32 - 1);
        let new_secs = (state.current_delay.as_secs_f64() * multiplier)
            .max(self.config.min_retry_delay.as_secs_f64())
            .min(self.config.max_delay.as_secs_f64());
        state.current_delay = Duration::from_secs_f64(new_secs);
        debug!(
            backend = %self.id,
            delay_ms = state.current_delay.as_millis() as u64,
            failures = state.consecutive_failures,
            "increased backend delay"
        );
    }

    /// Record a success: reset the streak and decay the delay toward
    /// `min_delay`.
    pub async fn report_success(&self) {
        let mut state = self.state.lock().await;
        state.consecutive_failures = 0;
        let new_secs = (state.current_delay.as_secs_f64() * 0.8)
            .max(self.config.min_delay.as_secs_f64());
        state.current_delay = Duration::from_secs_f64(new_secs);
        debug!(
            backend = %self.id,
            delay_ms = state.current_delay.as_millis() as u64,
            "decreased backend delay"
        );
    }

    /// Current batch width: the configured width shrunk by the failure
    /// streak, never below one.
    pub async fn batch_size(&self) -> usize {
        let state = self.state.lock().await;
        self.config
            .batch_size
            .saturating_sub(state.consecutive_failures as usize)
            .max(1)
    }

    /// Snapshot of the current delay (for tests and diagnostics).
    pub async fn current_delay(&self) -> Duration {
        self.state.lock().await.current_delay
    }

    /// Snapshot of the failure streak (for tests and diagnostics).
    pub async fn consecutive_failures(&self) -> u32 {
        self.state.lock().await.consecutive_failures
    }

    /// The pacing configuration this pacer runs with.
    pub fn config(&self) -> &PacingConfig {
        &self.config
    }
}

/// Lazily built map of one pacer per backend identity.
///
/// Constructed once and passed by reference to the dispatcher and the
/// orchestrator; nothing here is a process-global.
pub struct PacerRegistry {
    config: Arc<AnalysisConfig>,
    pacers: DashMap<BackendId, Arc<AdaptivePacer>>,
}

impl PacerRegistry {
    /// Create an empty registry over the given configuration.
    pub fn new(config: Arc<AnalysisConfig>) -> Self {
        Self { config, pacers: DashMap::new() }
    }

    /// The pacer for an identity, created on first use.
    pub fn pacer(&self, id: BackendId) -> Arc<AdaptivePacer> {
        self.pacers
            .entry(id)
            .or_insert_with(|| Arc::new(AdaptivePacer::new(id, self.config.pacing_for(id))))
            .clone()
    }
}
