//! Static navigation rule tables, one per role.
//!
//! Organization tables are written against `/dashboard/recruiter` and the
//! platform table against `/dashboard/admin`; the resolver rebases them onto
//! the role's actual base path. Tables are hand-ordered; never sort them.

use super::role::Role;

pub const APPLICANT_BASE: &str = "/dashboard";
pub const CANONICAL_RECRUITER_BASE: &str = "/dashboard/recruiter";
pub const CANONICAL_ADMIN_BASE: &str = "/dashboard/admin";

/// One row of a navigation table. `allowed_roles: None` means visible to every role.
#[derive(Debug, Clone, Copy)]
pub struct NavRule {
    pub label: &'static str,
    pub path: &'static str,
    pub icon: &'static str,
    pub exact: bool,
    pub badge: Option<&'static str>,
    pub allowed_roles: Option<&'static [Role]>,
    pub submenu: &'static [NavRule],
}

impl NavRule {
    pub const fn new(label: &'static str, path: &'static str, icon: &'static str) -> Self {
        Self {
            label,
            path,
            icon,
            exact: false,
            badge: None,
            allowed_roles: None,
            submenu: &[],
        }
    }

    pub const fn exact(self) -> Self {
        Self { exact: true, ..self }
    }

    pub const fn badge(self, badge: &'static str) -> Self {
        Self {
            badge: Some(badge),
            ..self
        }
    }

    pub const fn only(self, roles: &'static [Role]) -> Self {
        Self {
            allowed_roles: Some(roles),
            ..self
        }
    }

    pub const fn submenu(self, items: &'static [NavRule]) -> Self {
        Self {
            submenu: items,
            ..self
        }
    }

    pub fn is_visible_to(&self, role: Role) -> bool {
        match self.allowed_roles {
            Some(roles) => roles.contains(&role),
            None => true,
        }
    }
}

const LOGOUT: NavRule = NavRule::new("Logout", "/logout", "log-out");

// ── Applicant ───────────────────────────────────────────────────────────────

const RESUME_FILTERS: &[NavRule] = &[
    NavRule::new("All Resumes", "/dashboard/resumes", "list").exact(),
    NavRule::new("Drafts", "/dashboard/resumes?status=draft", "file"),
    NavRule::new("Published", "/dashboard/resumes?status=published", "check-circle"),
];

pub const APPLICANT_NAV: &[NavRule] = &[
    NavRule::new("Dashboard", "/dashboard", "home").exact(),
    NavRule::new("My Resumes", "/dashboard/resumes", "file-text").submenu(RESUME_FILTERS),
    NavRule::new("Resume Builder", "/dashboard/resume-builder", "edit"),
    NavRule::new("Job Search", "/dashboard/jobs", "search"),
    NavRule::new("Applications", "/dashboard/applications", "briefcase").badge("applications"),
    NavRule::new("AI Tools", "/dashboard/ai-tools", "sparkles"),
    NavRule::new("Subscription", "/dashboard/subscription", "credit-card"),
    NavRule::new("Credits", "/dashboard/credits", "coins"),
    NavRule::new("Settings", "/dashboard/settings", "settings"),
    LOGOUT,
];

// ── Organization (admin, manager, recruiter) ────────────────────────────────

const TEAM_LEADS: &[Role] = &[Role::Admin, Role::Manager];
const ORG_OWNERS: &[Role] = &[Role::Admin];

const JOB_FILTERS: &[NavRule] = &[
    NavRule::new("All Jobs", "/dashboard/recruiter/jobs", "list").exact(),
    NavRule::new("Drafts", "/dashboard/recruiter/jobs?status=draft", "file"),
    NavRule::new("Active", "/dashboard/recruiter/jobs?status=active", "play-circle"),
    NavRule::new("Closed", "/dashboard/recruiter/jobs?status=closed", "archive"),
];

const ORG_DASHBOARD: NavRule = NavRule::new("Dashboard", "/dashboard/recruiter", "home").exact();
const ORG_JOBS: NavRule =
    NavRule::new("Job Postings", "/dashboard/recruiter/jobs", "briefcase").submenu(JOB_FILTERS);
const ORG_CANDIDATES: NavRule =
    NavRule::new("Candidates", "/dashboard/recruiter/candidates", "users").badge("new_candidates");
const ORG_INTERVIEWS: NavRule =
    NavRule::new("Interviews", "/dashboard/recruiter/interviews", "calendar");
const ORG_TEAM: NavRule =
    NavRule::new("Team Management", "/dashboard/recruiter/team", "user-plus").only(TEAM_LEADS);
const ORG_ANALYTICS: NavRule =
    NavRule::new("Analytics", "/dashboard/recruiter/analytics", "bar-chart").only(TEAM_LEADS);
const ORG_SETTINGS: NavRule = NavRule::new(
    "Organization Settings",
    "/dashboard/recruiter/organization",
    "building",
)
.only(ORG_OWNERS);
const ORG_BILLING: NavRule =
    NavRule::new("Billing", "/dashboard/recruiter/billing", "credit-card").only(ORG_OWNERS);
const ORG_ACCOUNT_SETTINGS: NavRule =
    NavRule::new("Settings", "/dashboard/recruiter/settings", "settings");

pub const ADMIN_NAV: &[NavRule] = &[
    ORG_DASHBOARD,
    ORG_JOBS,
    ORG_CANDIDATES,
    ORG_INTERVIEWS,
    ORG_TEAM,
    ORG_ANALYTICS,
    ORG_SETTINGS,
    ORG_BILLING,
    ORG_ACCOUNT_SETTINGS,
    LOGOUT,
];

pub const MANAGER_NAV: &[NavRule] = &[
    ORG_DASHBOARD,
    ORG_TEAM,
    ORG_JOBS,
    ORG_CANDIDATES,
    ORG_INTERVIEWS,
    ORG_ANALYTICS,
    ORG_SETTINGS,
    ORG_ACCOUNT_SETTINGS,
    LOGOUT,
];

pub const RECRUITER_NAV: &[NavRule] = &[
    ORG_DASHBOARD,
    ORG_CANDIDATES,
    ORG_JOBS,
    ORG_INTERVIEWS,
    ORG_TEAM,
    ORG_ACCOUNT_SETTINGS,
    LOGOUT,
];

// ── Platform (super admin) ──────────────────────────────────────────────────

const USER_FILTERS: &[NavRule] = &[
    NavRule::new("All Users", "/dashboard/admin/users", "list").exact(),
    NavRule::new("Applicants", "/dashboard/admin/users?type=applicant", "user"),
    NavRule::new("Recruiters", "/dashboard/admin/users?type=recruiter", "briefcase"),
];

pub const SUPER_ADMIN_NAV: &[NavRule] = &[
    NavRule::new("Overview", "/dashboard/admin", "home").exact(),
    NavRule::new("Users", "/dashboard/admin/users", "users").submenu(USER_FILTERS),
    NavRule::new("Organizations", "/dashboard/admin/organizations", "building"),
    NavRule::new("Subscriptions", "/dashboard/admin/subscriptions", "credit-card"),
    NavRule::new("Pricing Catalog", "/dashboard/admin/catalog", "tag"),
    NavRule::new("Reports", "/dashboard/admin/reports", "bar-chart"),
    NavRule::new("System Settings", "/dashboard/admin/settings", "settings"),
    LOGOUT,
];

pub fn table_for(role: Role) -> &'static [NavRule] {
    match role {
        Role::SuperAdmin => SUPER_ADMIN_NAV,
        Role::Admin => ADMIN_NAV,
        Role::Manager => MANAGER_NAV,
        Role::Recruiter => RECRUITER_NAV,
        Role::Applicant => APPLICANT_NAV,
    }
}
