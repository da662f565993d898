//! # Modelgate Gateway
//!
//! The orchestration pipeline and HTTP surface of the gateway. The
//! [`Orchestrator`] runs each request through validation, cache lookup,
//! budget authorization, provider selection, and the guarded provider
//! call; the server exposes it over `POST /v1/generate` alongside
//! `/health` and `/metrics`.
//!
//! This is a library crate: deployments register their provider
//! adapters with [`OrchestratorBuilder`] and embed [`Server`] in their
//! binary.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod handlers;
pub mod orchestrator;
pub mod server;
pub mod state;

pub use error::{ApiError, ApiErrorDetail, ApiErrorResponse};
pub use handlers::{GatewayHealth, GenerateRequest, HealthResponse, ServicesHealth};
pub use orchestrator::{GatewayPolicy, Orchestrator, OrchestratorBuilder};
pub use server::{create_router, Server, ServerError};
pub use state::AppState;
