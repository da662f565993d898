//! # Modelgate Telemetry
//!
//! Prometheus metrics and structured logging for the orchestration
//! gateway.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
pub use metrics::Metrics;
