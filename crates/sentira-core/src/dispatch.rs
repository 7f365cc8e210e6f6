//! One paced, retried call to one backend.
//!
//! The [`Dispatcher`] is the only path to a transport: every call waits
//! on the backend's pacer first, reports the outcome back to it, and
//! retries failures in a bounded loop. Retries are throttled by the same
//! adaptive delay that protects steady-state traffic; there is no
//! separate retry-delay schedule.

use std::sync::Arc;

use tracing::{debug, warn};

use sentira_backends::{BackendError, BackendRequest, Result, TransportRegistry};
use sentira_types::BackendId;

use crate::pacer::PacerRegistry;

/// Total transport attempts per logical backend call.
pub const MAX_RETRIES: u32 = 5;

/// Issues single backend calls through the pacer with bounded retries.
pub struct Dispatcher {
    transports: Arc<TransportRegistry>,
    pacers: Arc<PacerRegistry>,
    max_retries: u32,
}

impl Dispatcher {
    /// Create a dispatcher over a transport registry and pacer registry.
    pub fn new(
        transports: Arc<TransportRegistry>,
        pacers: Arc<PacerRegistry>,
        max_retries: u32,
    ) -> Self {
        Self { transports, pacers, max_retries }
    }

    /// Whether a transport is registered for this identity.
    pub fn recognizes(&self, id: BackendId) -> bool {
        self.transports.contains(id)
    }

    /// Execute one logical request against `id`.
    ///
    /// Each attempt waits on the pacer, then calls the transport. Success
    /// reports success and returns the raw response. Each failure reports
    /// failure; the final attempt's error is returned to the caller (an
    /// analyzer), which converts it into that item's documented default —
    /// errors never travel further up.
    pub async fn send(&self, id: BackendId, request: &BackendRequest) -> Result<String> {
        let Some(transport) = self.transports.get(id) else {
            return Err(BackendError::NotConfigured(format!(
                "no transport registered for {id}"
            )));
        };
        let pacer = self.pacers.pacer(id);

        let mut attempt: u32 = 0;
        loop {
            pacer.wait().await;
            match transport.send(request).await {
                Ok(raw) => {
                    pacer.report_success().await;
                    if attempt > 0 {
                        debug!(backend = %id, attempt, "request succeeded after retry");
                    }
                    return Ok(raw);
                }
                Err(err) => {
                    pacer.report_failure().await;
                    attempt += 1;
                    if attempt >= self.max_retries {
                        warn!(
                            backend = %id,
                            attempts = attempt,
                            error = %err,
                            "backend call failed on final attempt"
                        );
                        return Err(err);
                    }
                    debug!(backend = %id, attempt, error = %err, "retrying backend call");
                }
            }
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("max_retries", &self.max_retries)
            .finish()
    }
}
