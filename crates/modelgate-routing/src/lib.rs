//! # Modelgate Routing
//!
//! Provider selection for the orchestration gateway. Each selection
//! pass filters the registered providers by capability, circuit state,
//! and spend posture, scores the survivors on cost, capability fit, and
//! observed reliability, and picks deterministically among ties.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod engine;
pub mod stats;

pub use engine::{
    RegisteredProvider, RouteContext, RouteReason, RoutingDecision, RoutingEngine, ScoreWeights,
};
pub use stats::ProviderStatsTracker;
