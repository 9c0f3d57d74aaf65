pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::billing::handlers as billing;
use crate::navigation::handlers as navigation;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Role Resolver
        .route("/api/v1/navigation", get(navigation::handle_get_navigation))
        // Entitlement & Pricing Engine
        .route("/api/v1/billing/catalog", get(billing::handle_get_catalog))
        .route("/api/v1/billing/overview", post(billing::handle_overview))
        .route(
            "/api/v1/billing/entitlements/check",
            post(billing::handle_check_feature),
        )
        .route(
            "/api/v1/billing/plan-change/preview",
            post(billing::handle_preview_plan_change),
        )
        .route("/api/v1/billing/subscribe", post(billing::handle_subscribe))
        .route("/api/v1/billing/change-plan", post(billing::handle_change_plan))
        .route("/api/v1/billing/cancel", post(billing::handle_cancel))
        .route("/api/v1/billing/reactivate", post(billing::handle_reactivate))
        .route(
            "/api/v1/billing/credits/purchase",
            post(billing::handle_purchase_credits),
        )
        .with_state(state)
}
