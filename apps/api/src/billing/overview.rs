//! Billing-screen view: what the user holds, what they may move to, and what it costs.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::catalog::{Catalog, CatalogAxis, CreditPackageId};
use super::lifecycle::SubscriptionState;
use super::plans::{
    available_upgrades, can_manage_billing, compare_tiers, BillingAxis, RecruiterPlan,
    SubscriptionPlan, TierChange,
};
use super::pricing::PriceSummary;
use crate::errors::EntitlementError;
use crate::models::account::{CurrentUser, SubscriptionStatus};
use crate::navigation::Role;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanOffer {
    pub id: &'static str,
    pub display_name: &'static str,
    pub direction: TierChange,
    pub monthly_price: PriceSummary,
    /// Present only when the user is eligible for the first-month promotion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_month_price: Option<PriceSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_active_jobs: Option<u32>,
    pub features: &'static [&'static str],
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PackageOffer {
    pub id: CreditPackageId,
    pub credit_count: u32,
    pub discount_bps: u32,
    pub price: PriceSummary,
    pub per_credit_price: PriceSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BillingOverview {
    pub role: Role,
    pub axis: Option<BillingAxis>,
    pub can_manage_billing: bool,
    pub current_plan: &'static str,
    pub status: Option<SubscriptionStatus>,
    pub end_date: Option<DateTime<Utc>>,
    /// The plan whose features are usable right now (a cancelled plan stays
    /// effective until its end date).
    pub effective_plan: &'static str,
    pub features: &'static [&'static str],
    /// Plans the user can act on right now: subscribe targets when there is no
    /// running subscription, change targets when active, none when cancelled.
    pub available_plans: Vec<PlanOffer>,
    /// A cancelled plan still inside its paid period can only be reactivated.
    pub can_reactivate: bool,
    pub credit_packages: Vec<PackageOffer>,
    pub credit_balance: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_summary: Option<PriceSummary>,
}

pub fn billing_overview(
    catalog: &Catalog,
    user: &CurrentUser,
    now: DateTime<Utc>,
) -> Result<BillingOverview, EntitlementError> {
    let role = user.resolved_role();
    let axis = BillingAxis::for_role(role);
    let manages = axis.is_some() && can_manage_billing(role);

    let mut overview = match axis {
        Some(BillingAxis::Ai) => axis_overview::<SubscriptionPlan>(catalog, user, manages, now)?,
        Some(BillingAxis::Recruiter) => {
            axis_overview::<RecruiterPlan>(catalog, user, manages, now)?
        }
        None => BillingOverview {
            role,
            axis: None,
            can_manage_billing: false,
            current_plan: "none",
            status: None,
            end_date: None,
            effective_plan: "none",
            features: &[],
            available_plans: vec![],
            can_reactivate: false,
            credit_packages: vec![],
            credit_balance: user.credit_balance,
            price_summary: None,
        },
    };

    if axis == Some(BillingAxis::Ai) && manages {
        overview.credit_packages = package_offers(catalog)?;
    }
    Ok(overview)
}

fn axis_overview<P: CatalogAxis>(
    catalog: &Catalog,
    user: &CurrentUser,
    manages: bool,
    now: DateTime<Utc>,
) -> Result<BillingOverview, EntitlementError> {
    let state = SubscriptionState::<P>::from_snapshot(user.subscription.as_ref())?.settle(now);
    let current = state.plan();
    let effective = state.effective_plan(now);

    let available_plans = if manages {
        plan_offers(catalog, &state)?
    } else {
        vec![]
    };
    let can_reactivate = manages && matches!(state, SubscriptionState::Cancelled { .. });

    let price_summary = match &state {
        SubscriptionState::Active { plan, .. } => {
            let name = catalog.plan(*plan).map_or(plan.id(), |s| s.display_name);
            Some(PriceSummary::new(
                format!("Next charge: {name} monthly"),
                catalog.monthly_price(*plan)?,
            ))
        }
        _ => None,
    };

    Ok(BillingOverview {
        role: user.resolved_role(),
        axis: Some(P::AXIS),
        can_manage_billing: manages,
        current_plan: current.id(),
        status: state.status(),
        end_date: state.end_date(),
        effective_plan: effective.id(),
        features: catalog.features(effective),
        available_plans,
        can_reactivate,
        credit_packages: vec![],
        credit_balance: user.credit_balance,
        price_summary,
    })
}

fn plan_offers<P: CatalogAxis>(
    catalog: &Catalog,
    state: &SubscriptionState<P>,
) -> Result<Vec<PlanOffer>, EntitlementError> {
    if matches!(state, SubscriptionState::Cancelled { .. }) {
        return Ok(vec![]);
    }
    let current = state.plan();
    let first_month_eligible = state.is_first_subscription();

    available_upgrades(current)
        .into_iter()
        .map(|plan| {
            let spec = catalog
                .plan(plan)
                .ok_or_else(|| EntitlementError::UnknownPlan(plan.id().to_string()))?;
            let first_month_price = match spec.first_month_price_minor {
                Some(_) if first_month_eligible => Some(PriceSummary::new(
                    format!("{} first month", spec.display_name),
                    catalog.first_month_total(plan)?,
                )),
                _ => None,
            };
            Ok(PlanOffer {
                id: plan.id(),
                display_name: spec.display_name,
                direction: compare_tiers(current, plan),
                monthly_price: PriceSummary::new(
                    format!("{} monthly", spec.display_name),
                    catalog.monthly_price(plan)?,
                ),
                first_month_price,
                max_active_jobs: spec.max_active_jobs,
                features: spec.features,
            })
        })
        .collect()
}

fn package_offers(catalog: &Catalog) -> Result<Vec<PackageOffer>, EntitlementError> {
    catalog
        .credit_packages
        .iter()
        .map(|pkg| {
            Ok(PackageOffer {
                id: pkg.id,
                credit_count: pkg.credit_count,
                discount_bps: pkg.discount_bps,
                price: PriceSummary::new(
                    format!("{} credits", pkg.credit_count),
                    catalog.package_price(pkg.id)?,
                ),
                per_credit_price: PriceSummary::new(
                    "Per credit",
                    catalog.per_credit_price(pkg.id)?,
                ),
            })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureCheck {
    pub feature: String,
    pub granted: bool,
    pub effective_plan: &'static str,
}

/// Whether the user may use `feature` right now. Roles without a billing axis
/// hold no plan features.
pub fn check_feature(
    catalog: &Catalog,
    user: &CurrentUser,
    feature: &str,
    now: DateTime<Utc>,
) -> Result<FeatureCheck, EntitlementError> {
    let (granted, effective_plan) = match BillingAxis::for_role(user.resolved_role()) {
        Some(BillingAxis::Ai) => feature_on::<SubscriptionPlan>(catalog, user, feature, now)?,
        Some(BillingAxis::Recruiter) => feature_on::<RecruiterPlan>(catalog, user, feature, now)?,
        None => (false, "none"),
    };
    Ok(FeatureCheck {
        feature: feature.to_string(),
        granted,
        effective_plan,
    })
}

fn feature_on<P: CatalogAxis>(
    catalog: &Catalog,
    user: &CurrentUser,
    feature: &str,
    now: DateTime<Utc>,
) -> Result<(bool, &'static str), EntitlementError> {
    let state = SubscriptionState::<P>::from_snapshot(user.subscription.as_ref())?.settle(now);
    Ok((
        state.has_feature(catalog, feature, now),
        state.effective_plan(now).id(),
    ))
}

/// The catalog as published to clients, with package prices precomputed.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogView {
    #[serde(flatten)]
    pub catalog: Catalog,
    pub package_prices: Vec<PackageOffer>,
}

pub fn catalog_view(catalog: &Catalog) -> Result<CatalogView, EntitlementError> {
    Ok(CatalogView {
        catalog: catalog.clone(),
        package_prices: package_offers(catalog)?,
    })
}
