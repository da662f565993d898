//! Integer-micro accounting for one tenant's budget period.

use std::time::{Duration, Instant};

/// Convert a USD amount to integer micro-dollars.
///
/// All ledger arithmetic happens in micros so repeated small charges
/// never drift the way floating-point accumulation would.
#[must_use]
pub fn usd_to_micros(usd: f64) -> u64 {
    if usd <= 0.0 {
        return 0;
    }
    (usd * 1_000_000.0).round() as u64
}

/// Convert micro-dollars back to USD for display and API responses
#[must_use]
pub fn micros_to_usd(micros: u64) -> f64 {
    micros as f64 / 1_000_000.0
}

/// Spend ledger for a single tenant's current period.
///
/// The epoch increments on every period roll; authorization tokens
/// carry the epoch they were issued under, and a settle or release
/// against a stale epoch is a no-op so a reservation from a previous
/// period can never corrupt the fresh one.
#[derive(Debug)]
pub struct TenantLedger {
    /// Period generation counter
    pub epoch: u64,
    /// When the current period began
    pub period_start: Instant,
    /// Budget limit for the period, in micros
    pub limit_micros: u64,
    /// Settled spend this period, in micros
    pub spent_micros: u64,
    /// Outstanding reservations this period, in micros
    pub reserved_micros: u64,
}

impl TenantLedger {
    /// Create a fresh ledger with the given limit
    #[must_use]
    pub fn new(limit_micros: u64) -> Self {
        Self {
            epoch: 0,
            period_start: Instant::now(),
            limit_micros,
            spent_micros: 0,
            reserved_micros: 0,
        }
    }

    /// Committed plus reserved spend, in micros
    #[must_use]
    pub fn committed_micros(&self) -> u64 {
        self.spent_micros + self.reserved_micros
    }

    /// Roll to a new period if the current one has elapsed.
    ///
    /// Resets spend and reservations and bumps the epoch, orphaning any
    /// tokens issued under the old one.
    pub fn maybe_roll(&mut self, period: Duration) {
        if self.period_start.elapsed() >= period {
            self.epoch += 1;
            self.period_start = Instant::now();
            self.spent_micros = 0;
            self.reserved_micros = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usd_micros_round_trip() {
        assert_eq!(usd_to_micros(0.01), 10_000);
        assert_eq!(usd_to_micros(1.0), 1_000_000);
        assert_eq!(usd_to_micros(0.0), 0);
        assert_eq!(usd_to_micros(-1.0), 0);
        assert!((micros_to_usd(10_000) - 0.01).abs() < 1e-12);
    }

    #[test]
    fn test_repeated_small_charges_exact() {
        // 100 charges of $0.03 must total exactly $3.00 in micros
        let mut total = 0u64;
        for _ in 0..100 {
            total += usd_to_micros(0.03);
        }
        assert_eq!(total, 3_000_000);
    }

    #[test]
    fn test_roll_resets_and_bumps_epoch() {
        let mut ledger = TenantLedger::new(1_000_000);
        ledger.spent_micros = 500_000;
        ledger.reserved_micros = 100_000;

        ledger.maybe_roll(Duration::from_secs(3600));
        assert_eq!(ledger.epoch, 0);
        assert_eq!(ledger.spent_micros, 500_000);

        std::thread::sleep(Duration::from_millis(20));
        ledger.maybe_roll(Duration::from_millis(10));
        assert_eq!(ledger.epoch, 1);
        assert_eq!(ledger.spent_micros, 0);
        assert_eq!(ledger.reserved_micros, 0);
    }
}
