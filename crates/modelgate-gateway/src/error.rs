//! API error handling.
//!
//! Maps the gateway error taxonomy onto consistent JSON error
//! responses with the status codes the taxonomy prescribes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use modelgate_core::{GatewayError, ProviderAttempt};
use serde::{Deserialize, Serialize};
use tracing::error;

/// API error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    /// Error details
    pub error: ApiErrorDetail,
}

/// Error detail
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    /// Error message
    pub message: String,
    /// Error type
    #[serde(rename = "type")]
    pub error_type: String,
    /// Error code for programmatic handling
    pub code: String,
    /// Parameter that caused the error (if applicable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub param: Option<String>,
    /// Per-provider attempt trail (for exhausted-failover errors)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempts: Option<Vec<ProviderAttempt>>,
}

/// API error wrapper
#[derive(Debug)]
pub struct ApiError {
    /// HTTP status code
    pub status: StatusCode,
    /// Error type
    pub error_type: String,
    /// Error message
    pub message: String,
    /// Error code
    pub code: String,
    /// Optional parameter
    pub param: Option<String>,
    /// Optional attempt trail
    pub attempts: Option<Vec<ProviderAttempt>>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorResponse {
            error: ApiErrorDetail {
                message: self.message.clone(),
                error_type: self.error_type,
                code: self.code,
                param: self.param,
                attempts: self.attempts,
            },
        };

        error!(
            status = %self.status,
            message = %self.message,
            "API error response"
        );

        (self.status, Json(body)).into_response()
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        let status = err.status_code();
        let error_type = err.error_type().to_string();
        let code = err.error_code().to_string();
        let (param, attempts) = match &err {
            GatewayError::Validation { field, .. } => (field.clone(), None),
            GatewayError::AllProvidersUnavailable { attempts } => {
                (None, Some(attempts.clone()))
            }
            _ => (None, None),
        };
        Self {
            status,
            error_type,
            message: err.to_string(),
            code,
            param,
            attempts,
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error_type: "invalid_request_error".to_string(),
            message: format!("JSON parse error: {err}"),
            code: "invalid_json".to_string(),
            param: None,
            attempts: None,
        }
    }
}
