//! Plan tiers for the two independent entitlement axes.
//!
//! `SubscriptionPlan` gates per-user AI features for applicants;
//! `RecruiterPlan` gates job-posting and analytics features for organizations.
//! They share the `PlanTier` trait and nothing else.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::EntitlementError;
use crate::navigation::Role;

/// A totally ordered plan ladder with a free bottom rung.
pub trait PlanTier: Copy + Eq + fmt::Debug + Send + Sync + 'static {
    /// Every tier, in ascending order.
    const ALL: &'static [Self];
    const FREE: Self;

    fn ordinal(self) -> u8;
    fn id(self) -> &'static str;

    fn is_paid(self) -> bool {
        self != Self::FREE
    }

    fn from_id(id: &str) -> Option<Self> {
        let id = id.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|tier| tier.id().eq_ignore_ascii_case(id))
    }

    /// Whether `self` is offered as a move target to a holder of `current`.
    /// The free tier is never a target; leaving a paid plan is a cancellation.
    fn is_offered_from(self, current: Self) -> bool {
        self.is_paid() && self != current
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionPlan {
    None,
    Basic,
    Pro,
    Enterprise,
}

impl PlanTier for SubscriptionPlan {
    const ALL: &'static [Self] = &[
        SubscriptionPlan::None,
        SubscriptionPlan::Basic,
        SubscriptionPlan::Pro,
        SubscriptionPlan::Enterprise,
    ];
    const FREE: Self = SubscriptionPlan::None;

    fn ordinal(self) -> u8 {
        match self {
            SubscriptionPlan::None => 0,
            SubscriptionPlan::Basic => 1,
            SubscriptionPlan::Pro => 2,
            SubscriptionPlan::Enterprise => 3,
        }
    }

    fn id(self) -> &'static str {
        match self {
            SubscriptionPlan::None => "none",
            SubscriptionPlan::Basic => "basic",
            SubscriptionPlan::Pro => "pro",
            SubscriptionPlan::Enterprise => "enterprise",
        }
    }

    /// Free users skip `basic` and are only offered `pro` and `enterprise`.
    fn is_offered_from(self, current: Self) -> bool {
        if current == SubscriptionPlan::None && self == SubscriptionPlan::Basic {
            return false;
        }
        self.is_paid() && self != current
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecruiterPlan {
    None,
    Starter,
    Professional,
    Premium,
}

impl PlanTier for RecruiterPlan {
    const ALL: &'static [Self] = &[
        RecruiterPlan::None,
        RecruiterPlan::Starter,
        RecruiterPlan::Professional,
        RecruiterPlan::Premium,
    ];
    const FREE: Self = RecruiterPlan::None;

    fn ordinal(self) -> u8 {
        match self {
            RecruiterPlan::None => 0,
            RecruiterPlan::Starter => 1,
            RecruiterPlan::Professional => 2,
            RecruiterPlan::Premium => 3,
        }
    }

    fn id(self) -> &'static str {
        match self {
            RecruiterPlan::None => "none",
            RecruiterPlan::Starter => "starter",
            RecruiterPlan::Professional => "professional",
            RecruiterPlan::Premium => "premium",
        }
    }
}

impl FromStr for SubscriptionPlan {
    type Err = EntitlementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_id(s).ok_or_else(|| EntitlementError::UnknownPlan(s.to_string()))
    }
}

impl FromStr for RecruiterPlan {
    type Err = EntitlementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_id(s).ok_or_else(|| EntitlementError::UnknownPlan(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierChange {
    Upgrade,
    Downgrade,
    Same,
}

/// Classifies a move from `from` to `to` using the fixed ordinal map.
pub fn compare_tiers<P: PlanTier>(from: P, to: P) -> TierChange {
    match to.ordinal().cmp(&from.ordinal()) {
        std::cmp::Ordering::Greater => TierChange::Upgrade,
        std::cmp::Ordering::Less => TierChange::Downgrade,
        std::cmp::Ordering::Equal => TierChange::Same,
    }
}

/// Every plan the holder of `current` may move to, ascending.
pub fn available_upgrades<P: PlanTier>(current: P) -> Vec<P> {
    P::ALL
        .iter()
        .copied()
        .filter(|plan| plan.is_offered_from(current))
        .collect()
}

/// Which catalog a role buys from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingAxis {
    Ai,
    Recruiter,
}

impl BillingAxis {
    /// Applicants buy AI plans; organization members are covered by their
    /// organization's recruiter plan. Super admins have no billing axis.
    pub fn for_role(role: Role) -> Option<BillingAxis> {
        if role == Role::Applicant {
            Some(BillingAxis::Ai)
        } else if role.is_organization_member() {
            Some(BillingAxis::Recruiter)
        } else {
            None
        }
    }
}

/// Only applicants (for themselves) and organization admins may change billing.
pub fn can_manage_billing(role: Role) -> bool {
    matches!(role, Role::Applicant | Role::Admin)
}
