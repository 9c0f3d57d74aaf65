//! Axum route handlers for the navigation API.

use axum::{extract::Query, Json};
use serde::{Deserialize, Serialize};

use crate::navigation::{
    get_navigation, mark_active, resolve_base_path, NavigationItem, PermissionTier, Role,
};

#[derive(Debug, Deserialize)]
pub struct NavigationQuery {
    pub role: Option<String>,
    pub user_type: Option<String>,
    /// Current location (pathname plus optional query string).
    pub path: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct NavigationResponse {
    pub role: Role,
    pub base_path: &'static str,
    pub permission_tier: PermissionTier,
    pub items: Vec<NavigationItem>,
}

/// GET /api/v1/navigation
///
/// Never fails: unknown roles resolve to the applicant surface.
pub async fn handle_get_navigation(Query(query): Query<NavigationQuery>) -> Json<NavigationResponse> {
    let role = Role::resolve(query.role.as_deref(), query.user_type.as_deref());
    let mut items = get_navigation(role);
    if let Some(path) = query.path.as_deref() {
        mark_active(&mut items, path);
    }

    Json(NavigationResponse {
        role,
        base_path: resolve_base_path(role),
        permission_tier: role.permission_tier(),
        items,
    })
}
