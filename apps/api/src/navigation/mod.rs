// Role Resolver: role -> base path, navigation surface, permission tier.
// Everything here is pure and must never fail; unknown roles render as applicants.

pub mod handlers;
pub mod resolver;
pub mod role;
pub mod tables;

pub use resolver::{get_navigation, mark_active, resolve_base_path, validate_tables, NavigationItem};
pub use role::{PermissionTier, Role};
