//! Shared application state for the HTTP surface.

use crate::orchestrator::Orchestrator;
use arc_swap::ArcSwap;
use modelgate_config::GatewayConfig;
use std::sync::Arc;
use std::time::Instant;

/// State shared by every handler.
///
/// Cloning is cheap; everything inside is behind an `Arc`. The config
/// sits behind an `ArcSwap` so a future reload path can publish a new
/// snapshot without locking readers.
#[derive(Clone)]
pub struct AppState {
    /// The orchestration pipeline
    pub orchestrator: Arc<Orchestrator>,
    /// Active configuration snapshot
    pub config: Arc<ArcSwap<GatewayConfig>>,
    /// Process start time, for uptime reporting
    pub started_at: Instant,
}

impl AppState {
    /// Create application state
    #[must_use]
    pub fn new(orchestrator: Arc<Orchestrator>, config: GatewayConfig) -> Self {
        Self {
            orchestrator,
            config: Arc::new(ArcSwap::from_pointee(config)),
            started_at: Instant::now(),
        }
    }

    /// Seconds since the server started
    #[must_use]
    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
