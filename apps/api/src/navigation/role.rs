use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::EntitlementError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SuperAdmin,
    Admin,
    Manager,
    Recruiter,
    Applicant,
}

/// Effective tier used for feature gating, ordered from least to most privileged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionTier {
    Individual,
    Member,
    Lead,
    Owner,
    Platform,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::SuperAdmin,
        Role::Admin,
        Role::Manager,
        Role::Recruiter,
        Role::Applicant,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::SuperAdmin => "super_admin",
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::Recruiter => "recruiter",
            Role::Applicant => "applicant",
        }
    }

    /// Strict parse. Accepts `-` and spaces as separators and a few legacy aliases.
    pub fn parse(raw: &str) -> Result<Role, EntitlementError> {
        let normalized = raw.trim().to_lowercase().replace(&['-', ' '][..], "_");
        match normalized.as_str() {
            "super_admin" | "superadmin" => Ok(Role::SuperAdmin),
            "admin" | "organization_admin" | "org_admin" => Ok(Role::Admin),
            "manager" | "recruiter_manager" => Ok(Role::Manager),
            "recruiter" => Ok(Role::Recruiter),
            "applicant" | "candidate" => Ok(Role::Applicant),
            _ => Err(EntitlementError::InvalidRole(raw.to_string())),
        }
    }

    /// Resolves the effective role from the raw `role` and `userType` fields.
    ///
    /// `role` wins when it parses, then `userType`; anything else falls back to
    /// `Applicant`. Never fails, so navigation can always render.
    pub fn resolve(role: Option<&str>, user_type: Option<&str>) -> Role {
        for candidate in [role, user_type].into_iter().flatten() {
            match Role::parse(candidate) {
                Ok(resolved) => return resolved,
                Err(e) => debug!("{e}; trying next source"),
            }
        }
        Role::Applicant
    }

    pub fn permission_tier(self) -> PermissionTier {
        match self {
            Role::Applicant => PermissionTier::Individual,
            Role::Recruiter => PermissionTier::Member,
            Role::Manager => PermissionTier::Lead,
            Role::Admin => PermissionTier::Owner,
            Role::SuperAdmin => PermissionTier::Platform,
        }
    }

    /// Admins, managers and recruiters all work inside an organization.
    pub fn is_organization_member(self) -> bool {
        matches!(self, Role::Admin | Role::Manager | Role::Recruiter)
    }
}

impl FromStr for Role {
    type Err = EntitlementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::parse(s)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_canonical_names() {
        for role in Role::ALL {
            assert_eq!(Role::parse(role.as_str()).unwrap(), role);
        }
    }

    #[test]
    fn test_parse_is_lenient_on_case_and_separators() {
        assert_eq!(Role::parse(" Super-Admin ").unwrap(), Role::SuperAdmin);
        assert_eq!(Role::parse("Recruiter Manager").unwrap(), Role::Manager);
    }

    #[test]
    fn test_parse_unknown_is_invalid_role() {
        assert_eq!(
            Role::parse("janitor"),
            Err(EntitlementError::InvalidRole("janitor".to_string()))
        );
    }

    #[test]
    fn test_resolve_prefers_role_over_user_type() {
        assert_eq!(
            Role::resolve(Some("manager"), Some("applicant")),
            Role::Manager
        );
    }

    #[test]
    fn test_resolve_uses_user_type_when_role_unknown() {
        assert_eq!(Role::resolve(Some("???"), Some("recruiter")), Role::Recruiter);
        assert_eq!(Role::resolve(None, Some("admin")), Role::Admin);
    }

    #[test]
    fn test_resolve_defaults_to_applicant() {
        assert_eq!(Role::resolve(None, None), Role::Applicant);
        assert_eq!(Role::resolve(Some(""), Some("ghost")), Role::Applicant);
    }

    #[test]
    fn test_permission_tiers_are_ordered() {
        assert!(Role::Applicant.permission_tier() < Role::Recruiter.permission_tier());
        assert!(Role::Recruiter.permission_tier() < Role::Manager.permission_tier());
        assert!(Role::Manager.permission_tier() < Role::Admin.permission_tier());
        assert!(Role::Admin.permission_tier() < Role::SuperAdmin.permission_tier());
    }
}
