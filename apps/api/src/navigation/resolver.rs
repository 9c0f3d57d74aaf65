use std::collections::HashSet;

use serde::Serialize;

use super::role::Role;
use super::tables::{
    table_for, NavRule, APPLICANT_BASE, CANONICAL_ADMIN_BASE, CANONICAL_RECRUITER_BASE,
};

/// A navigation entry resolved for one role, ready to hand to the renderer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NavigationItem {
    pub label: String,
    pub path: String,
    pub icon: String,
    pub exact: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub badge: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_roles: Option<Vec<Role>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub submenu: Vec<NavigationItem>,
    /// Set by `mark_active` when the caller supplies the current location.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
}

pub fn resolve_base_path(role: Role) -> &'static str {
    match role {
        Role::SuperAdmin => CANONICAL_ADMIN_BASE,
        Role::Admin | Role::Manager | Role::Recruiter => CANONICAL_RECRUITER_BASE,
        Role::Applicant => APPLICANT_BASE,
    }
}

/// Returns the role's navigation in table order, with role-gated entries removed
/// and every path rebased onto the role's base path.
pub fn get_navigation(role: Role) -> Vec<NavigationItem> {
    let base = resolve_base_path(role);
    resolve_rules(table_for(role), role, base)
}

fn resolve_rules(rules: &[NavRule], role: Role, base: &str) -> Vec<NavigationItem> {
    rules
        .iter()
        .filter(|rule| rule.is_visible_to(role))
        .map(|rule| NavigationItem {
            label: rule.label.to_string(),
            path: rebase_path(rule.path, base),
            icon: rule.icon.to_string(),
            exact: rule.exact,
            badge: rule.badge.map(str::to_string),
            allowed_roles: rule.allowed_roles.map(<[Role]>::to_vec),
            submenu: resolve_rules(rule.submenu, role, base),
            active: None,
        })
        .collect()
}

/// Replaces a canonical base prefix (on a segment boundary) with `base`.
fn rebase_path(path: &str, base: &str) -> String {
    for canonical in [CANONICAL_RECRUITER_BASE, CANONICAL_ADMIN_BASE] {
        if let Some(rest) = path.strip_prefix(canonical) {
            if rest.is_empty() || rest.starts_with('/') || rest.starts_with('?') {
                return format!("{base}{rest}");
            }
        }
    }
    path.to_string()
}

/// Whether `item` should be highlighted for the current location.
///
/// Items carrying a query string only match when both pathname and query
/// match; `exact` items need an identical pathname and no query; everything
/// else matches on a path-segment prefix.
pub fn is_item_active(current_path: &str, item: &NavigationItem) -> bool {
    let (current, current_query) = split_location(current_path);
    let (target, target_query) = split_location(&item.path);

    if target_query.is_some() {
        return current == target && query_pairs(current_query) == query_pairs(target_query);
    }
    if item.exact {
        return current == target && current_query.is_none();
    }
    if target == "/" {
        return true;
    }
    current == target
        || current
            .strip_prefix(target)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Sets `active` on every item (recursively). A parent is active when it
/// matches itself or any of its submenu entries is active.
pub fn mark_active(items: &mut [NavigationItem], current_path: &str) {
    for item in items.iter_mut() {
        mark_active(&mut item.submenu, current_path);
        let child_active = item.submenu.iter().any(|c| c.active == Some(true));
        item.active = Some(child_active || is_item_active(current_path, item));
    }
}

fn split_location(location: &str) -> (&str, Option<&str>) {
    let (path, query) = match location.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (location, None),
    };
    let path = if path.len() > 1 {
        path.trim_end_matches('/')
    } else {
        path
    };
    let path = if path.is_empty() { "/" } else { path };
    (path, query.filter(|q| !q.is_empty()))
}

fn query_pairs(query: Option<&str>) -> Vec<(&str, &str)> {
    let mut pairs: Vec<(&str, &str)> = query
        .unwrap_or_default()
        .split('&')
        .filter(|p| !p.is_empty())
        .map(|p| p.split_once('=').unwrap_or((p, "")))
        .collect();
    pairs.sort_unstable();
    pairs
}

/// Checks every role's table for malformed rows. Run once at startup.
pub fn validate_tables() -> Result<(), Vec<String>> {
    let mut defects = Vec::new();
    for role in Role::ALL {
        check_rules(table_for(role), role, &mut defects);
    }
    if defects.is_empty() {
        Ok(())
    } else {
        Err(defects)
    }
}

fn check_rules(rules: &[NavRule], role: Role, defects: &mut Vec<String>) {
    let mut seen = HashSet::new();
    for rule in rules {
        if rule.label.trim().is_empty() {
            defects.push(format!("{role}: entry at '{}' has an empty label", rule.path));
        }
        if !rule.path.starts_with('/') {
            defects.push(format!("{role}: '{}' has a relative path", rule.label));
        }
        if !seen.insert(rule.path) {
            defects.push(format!("{role}: duplicate path '{}'", rule.path));
        }
        if let Some(roles) = rule.allowed_roles {
            if roles.is_empty() {
                defects.push(format!("{role}: '{}' is visible to nobody", rule.label));
            }
        }
        check_rules(rule.submenu, role, defects);
    }
}
