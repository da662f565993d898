//! Budget authorization with reserve/settle accounting.

use crate::ledger::{micros_to_usd, usd_to_micros, TenantLedger};
use dashmap::DashMap;
use modelgate_core::{GatewayError, TenantId};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

/// Spend posture attached to an authorization.
///
/// Soft degradation and the hard limit are independent policies: a
/// deployment can degrade without ever rejecting, reject without
/// degrading, or both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SpendPosture {
    /// Budget is healthy; route normally
    Normal,
    /// Soft threshold crossed; routing should avoid premium models
    PreferCheaper,
}

/// Budget manager configuration
#[derive(Debug, Clone)]
pub struct BudgetManagerConfig {
    /// Length of one budget period
    pub period: Duration,
    /// Limit applied to tenants without an explicit override, in USD
    pub default_limit_usd: f64,
    /// Per-tenant limit overrides, in USD
    pub tenant_limits_usd: HashMap<String, f64>,
    /// Committed-spend fraction above which authorizations carry
    /// [`SpendPosture::PreferCheaper`]; `None` disables degradation
    pub degrade_threshold: Option<f64>,
    /// Whether authorizations that would exceed the limit are rejected
    pub enforce_hard_limit: bool,
}

impl Default for BudgetManagerConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(24 * 3600),
            default_limit_usd: 100.0,
            tenant_limits_usd: HashMap::new(),
            degrade_threshold: Some(0.8),
            enforce_hard_limit: true,
        }
    }
}

/// Proof that an estimate was reserved against a tenant's budget.
///
/// Consumed by value in [`BudgetManager::settle`] or
/// [`BudgetManager::release`], so a reservation can only be resolved
/// once and never silently dropped on the success path.
#[derive(Debug)]
#[must_use = "a reservation must be settled or released"]
pub struct AuthorizationToken {
    tenant: TenantId,
    reserved_micros: u64,
    epoch: u64,
    posture: SpendPosture,
}

impl AuthorizationToken {
    /// Spend posture decided at authorization time
    #[must_use]
    pub fn posture(&self) -> SpendPosture {
        self.posture
    }

    /// Amount reserved, in USD
    #[must_use]
    pub fn reserved_usd(&self) -> f64 {
        micros_to_usd(self.reserved_micros)
    }

    /// Tenant the reservation belongs to
    #[must_use]
    pub fn tenant(&self) -> &TenantId {
        &self.tenant
    }
}

/// Point-in-time budget view for one tenant
#[derive(Debug, Clone, Serialize)]
pub struct BudgetSnapshot {
    /// Settled spend this period, in USD
    pub spent_usd: f64,
    /// Outstanding reservations, in USD
    pub reserved_usd: f64,
    /// Period limit, in USD
    pub limit_usd: f64,
    /// Committed fraction of the limit (spent plus reserved over limit)
    pub utilization: f64,
}

/// Per-tenant budget manager.
///
/// One ledger per tenant behind a sharded map; each authorize, settle,
/// and release runs under that tenant's mutex so the check and the
/// reservation are a single atomic step.
pub struct BudgetManager {
    config: BudgetManagerConfig,
    ledgers: DashMap<TenantId, Mutex<TenantLedger>>,
}

impl BudgetManager {
    /// Create a new budget manager
    #[must_use]
    pub fn new(config: BudgetManagerConfig) -> Self {
        Self {
            config,
            ledgers: DashMap::new(),
        }
    }

    fn limit_micros_for(&self, tenant: &TenantId) -> u64 {
        let usd = self
            .config
            .tenant_limits_usd
            .get(tenant.as_str())
            .copied()
            .unwrap_or(self.config.default_limit_usd);
        usd_to_micros(usd)
    }

    /// Atomically check the budget and reserve an estimate.
    ///
    /// The reservation counts against the limit immediately, so two
    /// concurrent requests cannot both pass a check that only one of
    /// them fits under.
    ///
    /// # Errors
    /// Returns [`GatewayError::BudgetExceeded`] when the hard limit is
    /// enforced and committed spend plus the estimate exceeds it.
    pub fn authorize(
        &self,
        tenant: &TenantId,
        estimate_usd: f64,
    ) -> Result<AuthorizationToken, GatewayError> {
        let estimate_micros = usd_to_micros(estimate_usd);
        let entry = self
            .ledgers
            .entry(tenant.clone())
            .or_insert_with(|| Mutex::new(TenantLedger::new(self.limit_micros_for(tenant))));
        let mut ledger = entry.lock();
        ledger.maybe_roll(self.config.period);

        let committed = ledger.committed_micros();
        if self.config.enforce_hard_limit
            && committed + estimate_micros > ledger.limit_micros
        {
            warn!(
                tenant = %tenant,
                spent_usd = micros_to_usd(committed),
                limit_usd = micros_to_usd(ledger.limit_micros),
                estimate_usd,
                "Budget authorization denied"
            );
            return Err(GatewayError::BudgetExceeded {
                tenant: tenant.to_string(),
                spent_usd: micros_to_usd(committed),
                limit_usd: micros_to_usd(ledger.limit_micros),
                degraded_available: self.config.degrade_threshold.is_some(),
            });
        }

        ledger.reserved_micros += estimate_micros;

        let posture = match self.config.degrade_threshold {
            Some(threshold)
                if ledger.limit_micros > 0
                    && ledger.committed_micros() as f64
                        >= threshold * ledger.limit_micros as f64 =>
            {
                debug!(tenant = %tenant, "Budget above soft threshold, preferring cheaper models");
                SpendPosture::PreferCheaper
            }
            _ => SpendPosture::Normal,
        };

        Ok(AuthorizationToken {
            tenant: tenant.clone(),
            reserved_micros: estimate_micros,
            epoch: ledger.epoch,
            posture,
        })
    }

    /// Replace a reservation with the actual cost.
    ///
    /// The actual amount is charged even when it exceeds the estimate;
    /// an overshoot can push spend past the limit, which subsequent
    /// authorizations then observe. A token from a rolled-over period
    /// is dropped without charging the new period.
    pub fn settle(&self, token: AuthorizationToken, actual_usd: f64) {
        let actual_micros = usd_to_micros(actual_usd);
        let Some(entry) = self.ledgers.get(&token.tenant) else {
            return;
        };
        let mut ledger = entry.lock();
        if ledger.epoch != token.epoch {
            debug!(tenant = %token.tenant, "Stale reservation dropped at settle");
            return;
        }
        ledger.reserved_micros = ledger.reserved_micros.saturating_sub(token.reserved_micros);
        ledger.spent_micros += actual_micros;
    }

    /// Drop a reservation without charging anything
    pub fn release(&self, token: AuthorizationToken) {
        let Some(entry) = self.ledgers.get(&token.tenant) else {
            return;
        };
        let mut ledger = entry.lock();
        if ledger.epoch != token.epoch {
            return;
        }
        ledger.reserved_micros = ledger.reserved_micros.saturating_sub(token.reserved_micros);
    }

    /// Budget snapshot for one tenant; `None` if it has never spent
    #[must_use]
    pub fn snapshot(&self, tenant: &TenantId) -> Option<BudgetSnapshot> {
        let entry = self.ledgers.get(tenant)?;
        let mut ledger = entry.lock();
        ledger.maybe_roll(self.config.period);
        let limit = ledger.limit_micros;
        Some(BudgetSnapshot {
            spent_usd: micros_to_usd(ledger.spent_micros),
            reserved_usd: micros_to_usd(ledger.reserved_micros),
            limit_usd: micros_to_usd(limit),
            utilization: if limit == 0 {
                0.0
            } else {
                ledger.committed_micros() as f64 / limit as f64
            },
        })
    }

    /// Snapshots for every tenant seen this period
    #[must_use]
    pub fn snapshots(&self) -> HashMap<TenantId, BudgetSnapshot> {
        self.ledgers
            .iter()
            .map(|entry| {
                let tenant = entry.key().clone();
                let ledger = entry.value().lock();
                let limit = ledger.limit_micros;
                (
                    tenant,
                    BudgetSnapshot {
                        spent_usd: micros_to_usd(ledger.spent_micros),
                        reserved_usd: micros_to_usd(ledger.reserved_micros),
                        limit_usd: micros_to_usd(limit),
                        utilization: if limit == 0 {
                            0.0
                        } else {
                            ledger.committed_micros() as f64 / limit as f64
                        },
                    },
                )
            })
            .collect()
    }
}
