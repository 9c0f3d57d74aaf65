//! Axum route handlers for the billing API.

use axum::{extract::State, Json};
use chrono::Utc;
use serde::Deserialize;

use crate::billing::overview::{
    billing_overview, catalog_view, check_feature, BillingOverview, CatalogView, FeatureCheck,
};
use crate::billing::pricing::PlanChangePreview;
use crate::billing::service::{self, PlanChangeOutcome};
use crate::errors::AppError;
use crate::models::account::{AccountSnapshot, CurrentUser, PaymentMethod};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountRequest {
    pub current_user: CurrentUser,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureCheckRequest {
    pub current_user: CurrentUser,
    pub feature: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanPreviewRequest {
    pub current_user: CurrentUser,
    pub plan: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanPurchaseRequest {
    pub current_user: CurrentUser,
    pub plan: String,
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditPurchaseRequest {
    pub current_user: CurrentUser,
    pub package: String,
    pub payment_method: PaymentMethod,
}

fn require_plan(plan: &str) -> Result<&str, AppError> {
    let plan = plan.trim();
    if plan.is_empty() {
        return Err(AppError::Validation("plan must not be empty".to_string()));
    }
    Ok(plan)
}

// ────────────────────────────────────────────────────────────────────────────
// Read-only views
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/v1/billing/catalog
pub async fn handle_get_catalog(
    State(state): State<AppState>,
) -> Result<Json<CatalogView>, AppError> {
    Ok(Json(catalog_view(&state.catalog)?))
}

/// POST /api/v1/billing/overview
pub async fn handle_overview(
    State(state): State<AppState>,
    Json(body): Json<AccountRequest>,
) -> Result<Json<BillingOverview>, AppError> {
    let overview = billing_overview(&state.catalog, &body.current_user, Utc::now())?;
    Ok(Json(overview))
}

/// POST /api/v1/billing/entitlements/check
pub async fn handle_check_feature(
    State(state): State<AppState>,
    Json(body): Json<FeatureCheckRequest>,
) -> Result<Json<FeatureCheck>, AppError> {
    let feature = body.feature.trim();
    if feature.is_empty() {
        return Err(AppError::Validation("feature must not be empty".to_string()));
    }
    let check = check_feature(&state.catalog, &body.current_user, feature, Utc::now())?;
    Ok(Json(check))
}

/// POST /api/v1/billing/plan-change/preview
pub async fn handle_preview_plan_change(
    State(state): State<AppState>,
    Json(body): Json<PlanPreviewRequest>,
) -> Result<Json<PlanChangePreview>, AppError> {
    let plan = require_plan(&body.plan)?;
    let preview =
        service::preview_plan_change(&state.catalog, &body.current_user, plan, Utc::now())?;
    Ok(Json(preview))
}

// ────────────────────────────────────────────────────────────────────────────
// Mutations (each returns the re-fetched account)
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/billing/subscribe
pub async fn handle_subscribe(
    State(state): State<AppState>,
    Json(body): Json<PlanPurchaseRequest>,
) -> Result<Json<AccountSnapshot>, AppError> {
    let plan = require_plan(&body.plan)?;
    let account = service::subscribe(
        &state.catalog,
        state.gateway.as_ref(),
        &body.current_user,
        plan,
        body.payment_method,
        Utc::now(),
    )
    .await?;
    Ok(Json(account))
}

/// POST /api/v1/billing/change-plan
pub async fn handle_change_plan(
    State(state): State<AppState>,
    Json(body): Json<PlanPurchaseRequest>,
) -> Result<Json<PlanChangeOutcome>, AppError> {
    let plan = require_plan(&body.plan)?;
    let outcome = service::change_plan(
        &state.catalog,
        state.gateway.as_ref(),
        &body.current_user,
        plan,
        body.payment_method,
        Utc::now(),
    )
    .await?;
    Ok(Json(outcome))
}

/// POST /api/v1/billing/cancel
pub async fn handle_cancel(
    State(state): State<AppState>,
    Json(body): Json<AccountRequest>,
) -> Result<Json<AccountSnapshot>, AppError> {
    let account = service::cancel(state.gateway.as_ref(), &body.current_user, Utc::now()).await?;
    Ok(Json(account))
}

/// POST /api/v1/billing/reactivate
pub async fn handle_reactivate(
    State(state): State<AppState>,
    Json(body): Json<AccountRequest>,
) -> Result<Json<AccountSnapshot>, AppError> {
    let account =
        service::reactivate(state.gateway.as_ref(), &body.current_user, Utc::now()).await?;
    Ok(Json(account))
}

/// POST /api/v1/billing/credits/purchase
pub async fn handle_purchase_credits(
    State(state): State<AppState>,
    Json(body): Json<CreditPurchaseRequest>,
) -> Result<Json<AccountSnapshot>, AppError> {
    let account = service::purchase_credits(
        &state.catalog,
        state.gateway.as_ref(),
        &body.current_user,
        &body.package,
        body.payment_method,
    )
    .await?;
    Ok(Json(account))
}
