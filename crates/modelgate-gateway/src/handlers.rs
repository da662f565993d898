//! HTTP request handlers.

use crate::error::ApiError;
use crate::state::AppState;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use modelgate_core::{
    CompletionRequest, CompletionResponse, GatewayError, MaxTokens, ModelClass, ModelId, TenantId,
    UserId,
};
use modelgate_resilience::{CacheStats, CircuitState, ProviderHealth};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::instrument;

/// Wire format of a generation request
#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    /// The prompt to complete
    pub prompt: String,
    /// Tenant the request is billed to
    pub tenant_id: String,
    /// User within the tenant
    #[serde(default)]
    pub user_id: Option<String>,
    /// Maximum tokens to generate
    pub max_tokens: u32,
    /// Pin routing to the provider serving this exact model
    #[serde(default)]
    pub model_hint: Option<String>,
    /// Minimum capability class required
    #[serde(default)]
    pub model_class: Option<ModelClass>,
    /// Caller-supplied metadata
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl GenerateRequest {
    fn into_domain(self) -> Result<CompletionRequest, GatewayError> {
        let mut builder = CompletionRequest::builder()
            .prompt(self.prompt)
            .tenant_id(TenantId::new(self.tenant_id)?)
            .max_tokens(MaxTokens::new(self.max_tokens)?);
        if let Some(user_id) = self.user_id {
            builder = builder.user_id(UserId::new(user_id)?);
        }
        if let Some(hint) = self.model_hint {
            builder = builder.model_hint(ModelId::new(hint)?);
        }
        if let Some(class) = self.model_class {
            builder = builder.model_class(class);
        }
        for (key, value) in self.metadata {
            builder = builder.metadata(key, value);
        }
        Ok(builder.build()?)
    }
}

/// Handle POST /v1/generate
///
/// # Errors
/// Returns an [`ApiError`] with the taxonomy's status mapping.
#[instrument(skip_all, fields(tenant = %request.tenant_id))]
pub async fn generate(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> Result<Json<CompletionResponse>, ApiError> {
    let request = request.into_domain()?;
    let response = state.orchestrator.handle(request).await?;
    Ok(Json(response))
}

/// Health response body
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall status: `ok` while every circuit is closed, otherwise
    /// `degraded`
    pub status: &'static str,
    /// Per-service detail
    pub services: ServicesHealth,
}

/// Per-service section of the health body
#[derive(Debug, Serialize)]
pub struct ServicesHealth {
    /// The gateway process itself
    pub gateway: GatewayHealth,
    /// Breaker health per provider
    pub providers: HashMap<String, ProviderHealth>,
}

/// Gateway process health
#[derive(Debug, Serialize)]
pub struct GatewayHealth {
    /// Always `ok` while the process answers
    pub status: &'static str,
    /// Seconds since the server started
    pub uptime_secs: u64,
    /// Response cache statistics
    pub cache: CacheStats,
}

/// Handle GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let snapshots = state.orchestrator.provider_health();
    let degraded = snapshots
        .values()
        .any(|health| health.state != CircuitState::Closed);

    Json(HealthResponse {
        status: if degraded { "degraded" } else { "ok" },
        services: ServicesHealth {
            gateway: GatewayHealth {
                status: "ok",
                uptime_secs: state.uptime_secs(),
                cache: state.orchestrator.cache_stats(),
            },
            providers: snapshots
                .into_iter()
                .map(|(id, health)| (id.to_string(), health))
                .collect(),
        },
    })
}

/// Handle GET /metrics
///
/// Serves the Prometheus text exposition; 404 when metrics are
/// disabled in configuration.
pub async fn metrics(State(state): State<AppState>) -> Response {
    if !state.config.load().observability.metrics.enabled {
        return StatusCode::NOT_FOUND.into_response();
    }
    match state.orchestrator.metrics().gather() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("metrics encoding failed: {err}"),
        )
            .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_body_nests_services() {
        let mut providers = HashMap::new();
        providers.insert(
            "openai".to_string(),
            ProviderHealth {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                open_for: None,
                next_probe_in: None,
            },
        );
        let body = HealthResponse {
            status: "ok",
            services: ServicesHealth {
                gateway: GatewayHealth {
                    status: "ok",
                    uptime_secs: 42,
                    cache: CacheStats::default(),
                },
                providers,
            },
        };

        let json = serde_json::to_value(&body).expect("serializes");
        assert_eq!(json["status"], "ok");
        assert_eq!(json["services"]["gateway"]["uptime_secs"], 42);
        assert!(json["services"]["providers"].get("openai").is_some());
        // No top-level providers or cache keys
        assert!(json.get("providers").is_none());
        assert!(json.get("cache").is_none());
    }
}
