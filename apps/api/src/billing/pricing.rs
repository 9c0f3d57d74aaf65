//! Price computation in integer minor units.
//!
//! Rounding is half-up on exact integer arithmetic so the result matches the
//! billing backend bit-for-bit. Local prices are pre-flight estimates only; the
//! backend's confirmed quote is authoritative and any disagreement aborts.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::catalog::{Catalog, CatalogAxis, CreditPackage, CreditPackageId};
use super::plans::{compare_tiers, TierChange};
use crate::errors::EntitlementError;

pub const MINOR_UNITS_PER_MAJOR: i64 = 100;
pub const BASIS_POINTS: i64 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Php,
}

impl Currency {
    pub fn code(self) -> &'static str {
        match self {
            Currency::Php => "PHP",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    pub amount_minor: i64,
    pub currency: Currency,
}

impl Money {
    pub fn new(amount_minor: i64, currency: Currency) -> Self {
        Self {
            amount_minor,
            currency,
        }
    }

    /// Plain decimal rendering, e.g. `170.00` or `-300.00`. Locale formatting is
    /// left to the client.
    pub fn to_decimal_string(&self) -> String {
        let sign = if self.amount_minor < 0 { "-" } else { "" };
        let abs = self.amount_minor.unsigned_abs();
        let per_major = MINOR_UNITS_PER_MAJOR as u64;
        format!("{sign}{}.{:02}", abs / per_major, abs % per_major)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.currency.code(), self.to_decimal_string())
    }
}

/// `numerator / denominator` rounded half-up, for non-negative operands.
pub fn round_half_up_div(numerator: i64, denominator: i64) -> i64 {
    (2 * numerator + denominator) / (2 * denominator)
}

/// `credit_count × base × (1 − discount)`, rounded to the minor unit.
pub fn package_price_minor(pkg: &CreditPackage, base_credit_price_minor: i64) -> i64 {
    let gross = i64::from(pkg.credit_count) * base_credit_price_minor;
    round_half_up_div(gross * (BASIS_POINTS - i64::from(pkg.discount_bps)), BASIS_POINTS)
}

/// A labelled amount for the billing screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriceSummary {
    pub label: String,
    pub amount_minor: i64,
    /// Major-unit decimal string, e.g. `"170.00"`.
    pub amount: String,
    pub currency: Currency,
}

impl PriceSummary {
    pub fn new(label: impl Into<String>, money: Money) -> Self {
        Self {
            label: label.into(),
            amount_minor: money.amount_minor,
            amount: money.to_decimal_string(),
            currency: money.currency,
        }
    }
}

/// A locally computed price, tagged with the catalog version it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriceEstimate {
    pub money: Money,
    pub catalog_version: String,
}

/// The billing backend's confirmed price for a pending purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmedPrice {
    pub amount_minor: i64,
    pub currency: Currency,
    pub catalog_version: String,
}

impl Catalog {
    fn money(&self, amount_minor: i64) -> Money {
        Money::new(amount_minor, self.currency)
    }

    pub fn package_price(&self, id: CreditPackageId) -> Result<Money, EntitlementError> {
        let pkg = self
            .package(id)
            .ok_or_else(|| EntitlementError::UnknownPackage(id.as_str().to_string()))?;
        Ok(self.money(package_price_minor(pkg, self.base_credit_price_minor)))
    }

    /// Effective price of one credit inside a package, rounded half-up.
    pub fn per_credit_price(&self, id: CreditPackageId) -> Result<Money, EntitlementError> {
        let pkg = self
            .package(id)
            .ok_or_else(|| EntitlementError::UnknownPackage(id.as_str().to_string()))?;
        let total = package_price_minor(pkg, self.base_credit_price_minor);
        Ok(self.money(round_half_up_div(total, i64::from(pkg.credit_count.max(1)))))
    }

    pub fn monthly_price<P: CatalogAxis>(&self, plan: P) -> Result<Money, EntitlementError> {
        if !plan.is_paid() {
            return Ok(self.money(0));
        }
        let spec = self
            .plan(plan)
            .ok_or_else(|| EntitlementError::UnknownPlan(plan.id().to_string()))?;
        Ok(self.money(spec.monthly_price_minor))
    }

    /// The catalog's promotional first-month price, or the monthly price on
    /// axes without a promotion.
    pub fn first_month_total<P: CatalogAxis>(&self, plan: P) -> Result<Money, EntitlementError> {
        let spec = self
            .plan(plan)
            .ok_or_else(|| EntitlementError::UnknownPlan(plan.id().to_string()))?;
        Ok(self.money(
            spec.first_month_price_minor
                .unwrap_or(spec.monthly_price_minor),
        ))
    }

    /// What a new subscription to `plan` costs up front.
    pub fn subscription_estimate<P: CatalogAxis>(
        &self,
        plan: P,
        first_month: bool,
    ) -> Result<PriceEstimate, EntitlementError> {
        let money = if first_month {
            self.first_month_total(plan)?
        } else {
            self.monthly_price(plan)?
        };
        Ok(self.estimate(money))
    }

    pub fn package_estimate(&self, id: CreditPackageId) -> Result<PriceEstimate, EntitlementError> {
        let money = self.package_price(id)?;
        Ok(self.estimate(money))
    }

    fn estimate(&self, money: Money) -> PriceEstimate {
        PriceEstimate {
            money,
            catalog_version: self.version.clone(),
        }
    }
}

/// Rejects a purchase whose server-confirmed price differs from the local
/// estimate in amount, currency, or catalog version. Never reconciles.
pub fn verify_server_price(
    estimate: &PriceEstimate,
    confirmed: &ConfirmedPrice,
) -> Result<(), EntitlementError> {
    let confirmed_money = Money::new(confirmed.amount_minor, confirmed.currency);
    if confirmed_money != estimate.money || confirmed.catalog_version != estimate.catalog_version {
        return Err(EntitlementError::PricingCatalogMismatch {
            expected: format!("{} (catalog {})", estimate.money, estimate.catalog_version),
            confirmed: format!("{} (catalog {})", confirmed_money, confirmed.catalog_version),
        });
    }
    Ok(())
}

/// Informational view of a plan change. The charge itself (and any proration)
/// is computed by the billing backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanChangePreview {
    pub direction: TierChange,
    pub from: &'static str,
    pub to: &'static str,
    pub label: String,
    pub confirmation: String,
    pub current_monthly: PriceSummary,
    pub target_monthly: PriceSummary,
    /// Signed: positive for upgrades, negative for downgrades.
    pub monthly_difference: PriceSummary,
}

pub fn upgrade_delta<P: CatalogAxis>(
    catalog: &Catalog,
    from: P,
    to: P,
) -> Result<PlanChangePreview, EntitlementError> {
    let direction = compare_tiers(from, to);
    let current = catalog.monthly_price(from)?;
    let target = catalog.monthly_price(to)?;
    let difference = Money::new(target.amount_minor - current.amount_minor, catalog.currency);
    let target_name = catalog
        .plan(to)
        .map(|spec| spec.display_name)
        .unwrap_or_else(|| to.id());

    let (label, confirmation) = match direction {
        TierChange::Upgrade => (
            format!("Upgrade to {target_name}"),
            format!(
                "You will get {target_name} features immediately. Your monthly price becomes {target}."
            ),
        ),
        TierChange::Downgrade => (
            format!("Downgrade to {target_name}"),
            format!(
                "Features above {target_name} will no longer be available. Your monthly price becomes {target}."
            ),
        ),
        TierChange::Same => (
            "Current plan".to_string(),
            format!("You are already on {target_name}."),
        ),
    };

    Ok(PlanChangePreview {
        direction,
        from: from.id(),
        to: to.id(),
        label,
        confirmation,
        current_monthly: PriceSummary::new("Current monthly price", current),
        target_monthly: PriceSummary::new("New monthly price", target),
        monthly_difference: PriceSummary::new("Monthly difference", difference),
    })
}
