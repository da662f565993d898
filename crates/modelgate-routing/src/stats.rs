//! Per-provider reliability tracking.

use modelgate_core::ProviderId;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Exponentially weighted success-rate tracker.
///
/// Each recorded outcome moves the rate by `alpha` toward 1.0 or 0.0,
/// so recent behavior dominates without keeping a window of samples.
/// Providers with no history score a full 1.0; a new provider starts
/// with the benefit of the doubt rather than last place.
pub struct ProviderStatsTracker {
    alpha: f64,
    rates: RwLock<HashMap<ProviderId, f64>>,
}

impl ProviderStatsTracker {
    /// Default smoothing factor
    pub const DEFAULT_ALPHA: f64 = 0.2;

    /// Create a tracker with the given smoothing factor
    #[must_use]
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha: alpha.clamp(0.0, 1.0),
            rates: RwLock::new(HashMap::new()),
        }
    }

    /// Create a tracker with the default smoothing factor
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(Self::DEFAULT_ALPHA)
    }

    /// Record the outcome of one provider call
    pub fn record_outcome(&self, provider_id: &ProviderId, success: bool) {
        let sample = if success { 1.0 } else { 0.0 };
        let mut rates = self.rates.write();
        let rate = rates.entry(provider_id.clone()).or_insert(1.0);
        *rate = (1.0 - self.alpha) * *rate + self.alpha * sample;
    }

    /// Current smoothed success rate for a provider
    #[must_use]
    pub fn success_rate(&self, provider_id: &ProviderId) -> f64 {
        self.rates.read().get(provider_id).copied().unwrap_or(1.0)
    }

    /// Success rates for all providers with recorded history
    #[must_use]
    pub fn all_rates(&self) -> HashMap<ProviderId, f64> {
        self.rates.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(id: &str) -> ProviderId {
        ProviderId::new(id).expect("valid provider id")
    }

    #[test]
    fn test_unknown_provider_defaults_to_one() {
        let tracker = ProviderStatsTracker::with_defaults();
        assert!((tracker.success_rate(&provider("new")) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_failures_drag_rate_down() {
        let tracker = ProviderStatsTracker::with_defaults();
        let p = provider("flaky");
        for _ in 0..10 {
            tracker.record_outcome(&p, false);
        }
        assert!(tracker.success_rate(&p) < 0.2);
    }

    #[test]
    fn test_recovery_after_successes() {
        let tracker = ProviderStatsTracker::with_defaults();
        let p = provider("recovering");
        for _ in 0..10 {
            tracker.record_outcome(&p, false);
        }
        let low = tracker.success_rate(&p);
        for _ in 0..10 {
            tracker.record_outcome(&p, true);
        }
        assert!(tracker.success_rate(&p) > low);
        assert!(tracker.success_rate(&p) > 0.8);
    }

    #[test]
    fn test_recent_outcomes_dominate() {
        let tracker = ProviderStatsTracker::new(0.5);
        let p = provider("swing");
        tracker.record_outcome(&p, false);
        tracker.record_outcome(&p, false);
        tracker.record_outcome(&p, true);
        // One recent success with alpha 0.5 pulls the rate above 0.5
        assert!(tracker.success_rate(&p) > 0.5);
    }
}
