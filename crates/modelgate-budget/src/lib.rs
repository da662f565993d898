//! # Modelgate Budget
//!
//! Per-tenant spend accounting for the orchestration gateway. Budgets
//! are enforced through an authorize-reserve/settle cycle: an estimate
//! is reserved before any provider is contacted, then replaced by the
//! actual cost on success or released on failure, so concurrent
//! requests can never collectively overshoot a tenant's limit.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod ledger;
pub mod manager;

pub use ledger::{usd_to_micros, micros_to_usd, TenantLedger};
pub use manager::{
    AuthorizationToken, BudgetManager, BudgetManagerConfig, BudgetSnapshot, SpendPosture,
};
