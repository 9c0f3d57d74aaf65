use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Domain errors raised by the role resolver and the entitlement/pricing engine.
///
/// Only `InvalidRole` is ever recovered locally (navigation falls back to the
/// applicant table). Everything billing-related is surfaced to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EntitlementError {
    #[error("Unrecognized role '{0}'")]
    InvalidRole(String),

    #[error("Invalid plan transition from '{from}' to '{to}': {reason}")]
    InvalidPlanTransition {
        from: String,
        to: String,
        reason: String,
    },

    #[error("Pricing catalog mismatch: expected {expected}, server confirmed {confirmed}")]
    PricingCatalogMismatch { expected: String, confirmed: String },

    #[error("Billing backend unavailable: {message}")]
    NetworkFailure { message: String, retryable: bool },

    #[error("Unknown plan '{0}'")]
    UnknownPlan(String),

    #[error("Unknown credit package '{0}'")]
    UnknownPackage(String),

    #[error("'{item}' is not offered to role '{role}'")]
    PlanNotOffered { item: String, role: String },

    #[error("Role '{0}' cannot manage billing")]
    BillingNotPermitted(String),
}

impl EntitlementError {
    pub fn invalid_transition(
        from: impl Into<String>,
        to: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        EntitlementError::InvalidPlanTransition {
            from: from.into(),
            to: to.into(),
            reason: reason.into(),
        }
    }
}

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Entitlement(#[from] EntitlementError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut retryable = None;

        let (status, code, message) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Entitlement(err) => match err {
                EntitlementError::InvalidRole(_) => {
                    (StatusCode::BAD_REQUEST, "INVALID_ROLE", err.to_string())
                }
                EntitlementError::InvalidPlanTransition { .. } => (
                    StatusCode::BAD_REQUEST,
                    "INVALID_PLAN_TRANSITION",
                    err.to_string(),
                ),
                EntitlementError::UnknownPlan(_) => {
                    (StatusCode::BAD_REQUEST, "UNKNOWN_PLAN", err.to_string())
                }
                EntitlementError::UnknownPackage(_) => {
                    (StatusCode::BAD_REQUEST, "UNKNOWN_PACKAGE", err.to_string())
                }
                EntitlementError::PlanNotOffered { .. } => {
                    (StatusCode::BAD_REQUEST, "PLAN_NOT_OFFERED", err.to_string())
                }
                EntitlementError::BillingNotPermitted(_) => {
                    (StatusCode::FORBIDDEN, "FORBIDDEN", err.to_string())
                }
                EntitlementError::PricingCatalogMismatch { .. } => {
                    tracing::error!("Aborting transaction: {err}");
                    (
                        StatusCode::CONFLICT,
                        "PRICING_CATALOG_MISMATCH",
                        "Price confirmation failed; the transaction was not submitted".to_string(),
                    )
                }
                EntitlementError::NetworkFailure {
                    message,
                    retryable: can_retry,
                } => {
                    tracing::warn!("Billing backend failure: {message}");
                    retryable = Some(*can_retry);
                    (
                        StatusCode::BAD_GATEWAY,
                        "NETWORK_FAILURE",
                        "The billing service could not be reached".to_string(),
                    )
                }
            },
        };

        let mut error = json!({
            "code": code,
            "message": message
        });
        if let Some(retryable) = retryable {
            error["retryable"] = json!(retryable);
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::Value;

    async fn render(err: AppError) -> (StatusCode, Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_invalid_transition_is_bad_request() {
        let err = EntitlementError::invalid_transition("pro", "pro", "already on this plan");
        let (status, body) = render(err.into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "INVALID_PLAN_TRANSITION");
    }

    #[tokio::test]
    async fn test_network_failure_carries_retryable_flag() {
        let err = EntitlementError::NetworkFailure {
            message: "connection refused".to_string(),
            retryable: true,
        };
        let (status, body) = render(err.into()).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"]["retryable"], true);
    }

    #[tokio::test]
    async fn test_catalog_mismatch_is_conflict() {
        let err = EntitlementError::PricingCatalogMismatch {
            expected: "PHP 170.00".to_string(),
            confirmed: "PHP 175.00".to_string(),
        };
        let (status, body) = render(err.into()).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "PRICING_CATALOG_MISMATCH");
        assert!(body["error"].get("retryable").is_none());
    }
}
