//! The versioned pricing and entitlement catalog.
//!
//! Prices are integer minor units (centavos). The catalog is served verbatim at
//! `GET /api/v1/billing/catalog` so the SPA and the billing backend price from
//! the same definition; `version` travels with every quote.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::plans::{BillingAxis, PlanTier, RecruiterPlan, SubscriptionPlan};
use super::pricing::{
    package_price_minor, round_half_up_div, Currency, BASIS_POINTS, MINOR_UNITS_PER_MAJOR,
};
use crate::errors::EntitlementError;

pub const CATALOG_VERSION: &str = "2024-06";
pub const BASE_CREDIT_PRICE_MINOR: i64 = 20 * MINOR_UNITS_PER_MAJOR;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanSpec<P> {
    pub plan: P,
    pub display_name: &'static str,
    pub monthly_price_minor: i64,
    /// Fixed promotional price for the first month. Catalog data, never derived.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_month_price_minor: Option<i64>,
    /// `None` is unlimited. Only meaningful on the recruiter axis.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_active_jobs: Option<u32>,
    /// The full, cumulative feature set of this tier.
    pub features: &'static [&'static str],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditPackageId {
    Single,
    Bundle5,
    Bundle10,
    Bundle20,
}

impl CreditPackageId {
    pub fn as_str(self) -> &'static str {
        match self {
            CreditPackageId::Single => "single",
            CreditPackageId::Bundle5 => "bundle5",
            CreditPackageId::Bundle10 => "bundle10",
            CreditPackageId::Bundle20 => "bundle20",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, EntitlementError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "single" => Ok(CreditPackageId::Single),
            "bundle5" => Ok(CreditPackageId::Bundle5),
            "bundle10" => Ok(CreditPackageId::Bundle10),
            "bundle20" => Ok(CreditPackageId::Bundle20),
            _ => Err(EntitlementError::UnknownPackage(raw.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CreditPackage {
    pub id: CreditPackageId,
    pub credit_count: u32,
    /// Discount as basis points (1500 = 15%).
    pub discount_bps: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Catalog {
    pub version: String,
    pub currency: Currency,
    pub base_credit_price_minor: i64,
    pub ai_plans: Vec<PlanSpec<SubscriptionPlan>>,
    pub recruiter_plans: Vec<PlanSpec<RecruiterPlan>>,
    pub credit_packages: Vec<CreditPackage>,
}

/// Ties a plan ladder to its slice of the catalog.
pub trait CatalogAxis: PlanTier {
    const AXIS: BillingAxis;

    fn specs(catalog: &Catalog) -> &[PlanSpec<Self>];
}

impl CatalogAxis for SubscriptionPlan {
    const AXIS: BillingAxis = BillingAxis::Ai;

    fn specs(catalog: &Catalog) -> &[PlanSpec<Self>] {
        &catalog.ai_plans
    }
}

impl CatalogAxis for RecruiterPlan {
    const AXIS: BillingAxis = BillingAxis::Recruiter;

    fn specs(catalog: &Catalog) -> &[PlanSpec<Self>] {
        &catalog.recruiter_plans
    }
}

const BASIC_FEATURES: &[&str] = &["ai_resume_builder", "ai_cover_letter"];
const PRO_FEATURES: &[&str] = &[
    "ai_resume_builder",
    "ai_cover_letter",
    "ai_job_match",
    "ai_interview_prep",
];
const ENTERPRISE_FEATURES: &[&str] = &[
    "ai_resume_builder",
    "ai_cover_letter",
    "ai_job_match",
    "ai_interview_prep",
    "ai_career_coach",
    "priority_support",
];

const STARTER_FEATURES: &[&str] = &["job_posting", "applicant_tracking"];
const PROFESSIONAL_FEATURES: &[&str] = &[
    "job_posting",
    "applicant_tracking",
    "candidate_analytics",
    "team_collaboration",
];
const PREMIUM_FEATURES: &[&str] = &[
    "job_posting",
    "applicant_tracking",
    "candidate_analytics",
    "team_collaboration",
    "advanced_analytics",
    "featured_job_posts",
    "dedicated_support",
];

impl Catalog {
    pub fn standard() -> Self {
        Self {
            version: CATALOG_VERSION.to_string(),
            currency: Currency::Php,
            base_credit_price_minor: BASE_CREDIT_PRICE_MINOR,
            ai_plans: vec![
                PlanSpec {
                    plan: SubscriptionPlan::Basic,
                    display_name: "Basic",
                    monthly_price_minor: 29_900,
                    first_month_price_minor: Some(15_000),
                    max_active_jobs: None,
                    features: BASIC_FEATURES,
                },
                PlanSpec {
                    plan: SubscriptionPlan::Pro,
                    display_name: "Pro",
                    monthly_price_minor: 59_900,
                    first_month_price_minor: Some(30_000),
                    max_active_jobs: None,
                    features: PRO_FEATURES,
                },
                PlanSpec {
                    plan: SubscriptionPlan::Enterprise,
                    display_name: "Enterprise",
                    monthly_price_minor: 149_900,
                    first_month_price_minor: Some(75_000),
                    max_active_jobs: None,
                    features: ENTERPRISE_FEATURES,
                },
            ],
            recruiter_plans: vec![
                PlanSpec {
                    plan: RecruiterPlan::Starter,
                    display_name: "Starter",
                    monthly_price_minor: 249_900,
                    first_month_price_minor: None,
                    max_active_jobs: Some(5),
                    features: STARTER_FEATURES,
                },
                PlanSpec {
                    plan: RecruiterPlan::Professional,
                    display_name: "Professional",
                    monthly_price_minor: 499_900,
                    first_month_price_minor: None,
                    max_active_jobs: Some(25),
                    features: PROFESSIONAL_FEATURES,
                },
                PlanSpec {
                    plan: RecruiterPlan::Premium,
                    display_name: "Premium",
                    monthly_price_minor: 999_900,
                    first_month_price_minor: None,
                    max_active_jobs: None,
                    features: PREMIUM_FEATURES,
                },
            ],
            credit_packages: vec![
                CreditPackage {
                    id: CreditPackageId::Single,
                    credit_count: 1,
                    discount_bps: 0,
                },
                CreditPackage {
                    id: CreditPackageId::Bundle5,
                    credit_count: 5,
                    discount_bps: 1_000,
                },
                CreditPackage {
                    id: CreditPackageId::Bundle10,
                    credit_count: 10,
                    discount_bps: 1_500,
                },
                CreditPackage {
                    id: CreditPackageId::Bundle20,
                    credit_count: 20,
                    discount_bps: 2_500,
                },
            ],
        }
    }

    pub fn plan<P: CatalogAxis>(&self, plan: P) -> Option<&PlanSpec<P>> {
        P::specs(self).iter().find(|spec| spec.plan == plan)
    }

    /// Feature set of a tier; the free tier has none.
    pub fn features<P: CatalogAxis>(&self, plan: P) -> &'static [&'static str] {
        self.plan(plan).map(|spec| spec.features).unwrap_or(&[])
    }

    pub fn grants<P: CatalogAxis>(&self, plan: P, feature: &str) -> bool {
        self.features(plan).contains(&feature)
    }

    pub fn package(&self, id: CreditPackageId) -> Option<&CreditPackage> {
        self.credit_packages.iter().find(|pkg| pkg.id == id)
    }

    /// Checks the catalog's invariants. Fatal defects must stop startup;
    /// first-month mismatches are reported, never corrected.
    pub fn validate(&self) -> Vec<CatalogDefect> {
        let mut defects = Vec::new();
        check_axis::<SubscriptionPlan>(self, &mut defects);
        check_axis::<RecruiterPlan>(self, &mut defects);

        for spec in &self.ai_plans {
            match spec.first_month_price_minor {
                Some(actual) => {
                    let expected = half_price_whole_units(spec.monthly_price_minor);
                    if actual != expected {
                        defects.push(CatalogDefect::FirstMonthPriceMismatch {
                            plan: spec.plan.id(),
                            expected_minor: expected,
                            actual_minor: actual,
                        });
                    }
                }
                None => defects.push(CatalogDefect::MissingFirstMonthPrice {
                    plan: spec.plan.id(),
                }),
            }
        }

        for pkg in &self.credit_packages {
            if pkg.credit_count == 0 || pkg.discount_bps >= BASIS_POINTS as u32 {
                defects.push(CatalogDefect::InvalidPackage { package: pkg.id });
            }
        }

        let mut packages: Vec<&CreditPackage> = self
            .credit_packages
            .iter()
            .filter(|pkg| pkg.credit_count > 0)
            .collect();
        packages.sort_by_key(|pkg| pkg.credit_count);
        for pair in packages.windows(2) {
            let (small, large) = (pair[0], pair[1]);
            let small_price = package_price_minor(small, self.base_credit_price_minor);
            let large_price = package_price_minor(large, self.base_credit_price_minor);
            // small/count_small >= large/count_large, cross-multiplied to stay exact
            if small_price * i64::from(large.credit_count)
                < large_price * i64::from(small.credit_count)
            {
                defects.push(CatalogDefect::PerCreditPriceIncreases {
                    smaller: small.id,
                    larger: large.id,
                });
            }
        }

        defects
    }
}

/// `round(monthly × 0.5)` at whole-currency-unit precision, half-up.
fn half_price_whole_units(monthly_minor: i64) -> i64 {
    round_half_up_div(monthly_minor, 2 * MINOR_UNITS_PER_MAJOR) * MINOR_UNITS_PER_MAJOR
}

fn check_axis<P: CatalogAxis>(catalog: &Catalog, defects: &mut Vec<CatalogDefect>) {
    for &tier in P::ALL.iter().filter(|t| t.is_paid()) {
        if catalog.plan(tier).is_none() {
            defects.push(CatalogDefect::MissingPlan {
                axis: P::AXIS,
                plan: tier.id(),
            });
        }
    }

    let mut specs: Vec<&PlanSpec<P>> = P::specs(catalog).iter().collect();
    specs.sort_by_key(|spec| spec.plan.ordinal());
    for pair in specs.windows(2) {
        let (lower, higher) = (pair[0], pair[1]);
        let missing: Vec<&'static str> = lower
            .features
            .iter()
            .copied()
            .filter(|f| !higher.features.contains(f))
            .collect();
        let adds_something = higher
            .features
            .iter()
            .any(|f| !lower.features.contains(f));
        if !missing.is_empty() || !adds_something {
            defects.push(CatalogDefect::FeatureSetNotIncreasing {
                axis: P::AXIS,
                lower: lower.plan.id(),
                higher: higher.plan.id(),
                missing,
            });
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogDefect {
    MissingPlan {
        axis: BillingAxis,
        plan: &'static str,
    },
    FeatureSetNotIncreasing {
        axis: BillingAxis,
        lower: &'static str,
        higher: &'static str,
        missing: Vec<&'static str>,
    },
    MissingFirstMonthPrice {
        plan: &'static str,
    },
    FirstMonthPriceMismatch {
        plan: &'static str,
        expected_minor: i64,
        actual_minor: i64,
    },
    InvalidPackage {
        package: CreditPackageId,
    },
    PerCreditPriceIncreases {
        smaller: CreditPackageId,
        larger: CreditPackageId,
    },
}

impl CatalogDefect {
    /// A first-month mismatch is a data inconsistency to flag; everything else
    /// breaks an invariant the engine relies on.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, CatalogDefect::FirstMonthPriceMismatch { .. })
    }
}

impl fmt::Display for CatalogDefect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogDefect::MissingPlan { axis, plan } => {
                write!(f, "{axis:?} catalog has no entry for '{plan}'")
            }
            CatalogDefect::FeatureSetNotIncreasing {
                axis,
                lower,
                higher,
                missing,
            } => write!(
                f,
                "{axis:?} tier '{higher}' does not strictly extend '{lower}' (missing: {})",
                missing.join(", ")
            ),
            CatalogDefect::MissingFirstMonthPrice { plan } => {
                write!(f, "AI plan '{plan}' has no first-month price")
            }
            CatalogDefect::FirstMonthPriceMismatch {
                plan,
                expected_minor,
                actual_minor,
            } => write!(
                f,
                "first-month price of '{plan}' is {actual_minor} but half of monthly is {expected_minor} (minor units)"
            ),
            CatalogDefect::InvalidPackage { package } => {
                write!(f, "credit package '{}' has an invalid size or discount", package.as_str())
            }
            CatalogDefect::PerCreditPriceIncreases { smaller, larger } => write!(
                f,
                "'{}' costs more per credit than '{}'",
                larger.as_str(),
                smaller.as_str()
            ),
        }
    }
}
