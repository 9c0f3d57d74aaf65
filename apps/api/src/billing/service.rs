//! Billing actions: subscribe, change plan, cancel, reactivate, buy credits.
//!
//! Flow for anything that charges: validate locally → estimate from the
//! catalog → server quote → verify → mutate → re-fetch the account.
//! Every local check runs before the first network call, and a price
//! disagreement aborts before the charge. The returned account is always the
//! re-fetched one; mutation responses are never trusted on their own.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::catalog::{Catalog, CatalogAxis, CreditPackageId};
use super::gateway::{BillingGateway, QuoteRequest};
use super::lifecycle::{classify_change, SubscriptionEvent, SubscriptionState, BILLING_PERIOD_DAYS};
use super::plans::{
    can_manage_billing, BillingAxis, PlanTier, RecruiterPlan, SubscriptionPlan, TierChange,
};
use super::pricing::{upgrade_delta, verify_server_price, PlanChangePreview};
use crate::errors::EntitlementError;
use crate::models::account::{AccountSnapshot, CurrentUser, PaymentMethod};
use crate::navigation::Role;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanChangeOutcome {
    pub direction: TierChange,
    pub preview: PlanChangePreview,
    pub account: AccountSnapshot,
}

// ────────────────────────────────────────────────────────────────────────────
// Guards
// ────────────────────────────────────────────────────────────────────────────

/// The axis a user may change billing on, or `BillingNotPermitted`.
fn managed_axis(user: &CurrentUser) -> Result<(Role, BillingAxis), EntitlementError> {
    let role = user.resolved_role();
    match BillingAxis::for_role(role) {
        Some(axis) if can_manage_billing(role) => Ok((role, axis)),
        _ => Err(EntitlementError::BillingNotPermitted(role.to_string())),
    }
}

fn parse_plan<P: CatalogAxis>(plan_id: &str) -> Result<P, EntitlementError> {
    P::from_id(plan_id).ok_or_else(|| EntitlementError::UnknownPlan(plan_id.to_string()))
}

fn current_state<P: CatalogAxis>(
    user: &CurrentUser,
    now: DateTime<Utc>,
) -> Result<SubscriptionState<P>, EntitlementError> {
    Ok(SubscriptionState::<P>::from_snapshot(user.subscription.as_ref())?.settle(now))
}

fn ensure_offered<P: CatalogAxis>(target: P, current: P, role: Role) -> Result<(), EntitlementError> {
    if target.is_offered_from(current) {
        Ok(())
    } else {
        Err(EntitlementError::PlanNotOffered {
            item: target.id().to_string(),
            role: role.to_string(),
        })
    }
}

async fn refetch(
    gateway: &dyn BillingGateway,
    user_id: Uuid,
) -> Result<AccountSnapshot, EntitlementError> {
    let account = gateway.fetch_account(user_id).await?;
    debug!(
        "Re-fetched account for {user_id}: credits={}",
        account.credit_balance
    );
    Ok(account)
}

// ────────────────────────────────────────────────────────────────────────────
// Subscribe
// ────────────────────────────────────────────────────────────────────────────

pub async fn subscribe(
    catalog: &Catalog,
    gateway: &dyn BillingGateway,
    user: &CurrentUser,
    plan_id: &str,
    payment_method: PaymentMethod,
    now: DateTime<Utc>,
) -> Result<AccountSnapshot, EntitlementError> {
    let (role, axis) = managed_axis(user)?;
    match axis {
        BillingAxis::Ai => {
            subscribe_on::<SubscriptionPlan>(catalog, gateway, user, role, plan_id, payment_method, now)
                .await
        }
        BillingAxis::Recruiter => {
            subscribe_on::<RecruiterPlan>(catalog, gateway, user, role, plan_id, payment_method, now)
                .await
        }
    }
}

async fn subscribe_on<P: CatalogAxis>(
    catalog: &Catalog,
    gateway: &dyn BillingGateway,
    user: &CurrentUser,
    role: Role,
    plan_id: &str,
    payment_method: PaymentMethod,
    now: DateTime<Utc>,
) -> Result<AccountSnapshot, EntitlementError> {
    // Step 1: Local validation
    let plan = parse_plan::<P>(plan_id)?;
    let state = current_state::<P>(user, now)?;
    state.apply(
        SubscriptionEvent::Subscribe {
            plan,
            end_date: now + Duration::days(BILLING_PERIOD_DAYS),
            payment_method,
        },
        now,
    )?;
    ensure_offered(plan, state.plan(), role)?;

    // Step 2: Estimate, then confirm with the backend
    let first_month = state.is_first_subscription();
    let estimate = catalog.subscription_estimate(plan, first_month)?;
    let confirmed = gateway
        .quote(&QuoteRequest::Subscription {
            user_id: user.user_id,
            plan: plan.id().to_string(),
            first_month,
        })
        .await?;
    if let Err(e) = verify_server_price(&estimate, &confirmed) {
        warn!("Aborting subscribe to {} for {}: {e}", plan.id(), user.user_id);
        return Err(e);
    }

    // Step 3: Charge
    info!(
        "Subscribing {} to {} at {}",
        user.user_id,
        plan.id(),
        estimate.money
    );
    gateway.subscribe(user.user_id, plan.id(), payment_method).await?;

    // Step 4: Authoritative state
    refetch(gateway, user.user_id).await
}

// ────────────────────────────────────────────────────────────────────────────
// Plan changes
// ────────────────────────────────────────────────────────────────────────────

/// Labels and prices for a plan change without performing it.
pub fn preview_plan_change(
    catalog: &Catalog,
    user: &CurrentUser,
    plan_id: &str,
    now: DateTime<Utc>,
) -> Result<PlanChangePreview, EntitlementError> {
    let (role, axis) = managed_axis(user)?;
    match axis {
        BillingAxis::Ai => {
            validate_change::<SubscriptionPlan>(catalog, user, role, plan_id, now).map(|(_, p)| p)
        }
        BillingAxis::Recruiter => {
            validate_change::<RecruiterPlan>(catalog, user, role, plan_id, now).map(|(_, p)| p)
        }
    }
}

/// Upgrades and downgrades. The charge and any proration are decided by the
/// backend, so no local price verification happens here.
pub async fn change_plan(
    catalog: &Catalog,
    gateway: &dyn BillingGateway,
    user: &CurrentUser,
    plan_id: &str,
    payment_method: PaymentMethod,
    now: DateTime<Utc>,
) -> Result<PlanChangeOutcome, EntitlementError> {
    let (role, axis) = managed_axis(user)?;
    let (target, preview) = match axis {
        BillingAxis::Ai => validate_change::<SubscriptionPlan>(catalog, user, role, plan_id, now)
            .map(|(plan, preview)| (plan.id(), preview))?,
        BillingAxis::Recruiter => {
            validate_change::<RecruiterPlan>(catalog, user, role, plan_id, now)
                .map(|(plan, preview)| (plan.id(), preview))?
        }
    };

    info!(
        "{:?} for {}: {} -> {}",
        preview.direction, user.user_id, preview.from, preview.to
    );
    gateway
        .change_plan(user.user_id, target, payment_method)
        .await?;
    let account = refetch(gateway, user.user_id).await?;

    Ok(PlanChangeOutcome {
        direction: preview.direction,
        preview,
        account,
    })
}

fn validate_change<P: CatalogAxis>(
    catalog: &Catalog,
    user: &CurrentUser,
    role: Role,
    plan_id: &str,
    now: DateTime<Utc>,
) -> Result<(P, PlanChangePreview), EntitlementError> {
    let target = parse_plan::<P>(plan_id)?;
    let state = current_state::<P>(user, now)?;
    let SubscriptionState::Active { plan: current, .. } = state else {
        return Err(EntitlementError::invalid_transition(
            state.plan().id(),
            target.id(),
            "no active subscription to change",
        ));
    };

    let event = match classify_change(current, target)? {
        TierChange::Upgrade => SubscriptionEvent::Upgrade { plan: target },
        _ => SubscriptionEvent::Downgrade { plan: target },
    };
    state.apply(event, now)?;
    ensure_offered(target, current, role)?;

    Ok((target, upgrade_delta(catalog, current, target)?))
}

// ────────────────────────────────────────────────────────────────────────────
// Cancel / reactivate
// ────────────────────────────────────────────────────────────────────────────

pub async fn cancel(
    gateway: &dyn BillingGateway,
    user: &CurrentUser,
    now: DateTime<Utc>,
) -> Result<AccountSnapshot, EntitlementError> {
    check_event(user, SubscriptionEventKind::Cancel, now)?;
    info!("Cancelling subscription for {}", user.user_id);
    gateway.cancel(user.user_id).await?;
    refetch(gateway, user.user_id).await
}

pub async fn reactivate(
    gateway: &dyn BillingGateway,
    user: &CurrentUser,
    now: DateTime<Utc>,
) -> Result<AccountSnapshot, EntitlementError> {
    check_event(user, SubscriptionEventKind::Reactivate, now)?;
    info!("Reactivating subscription for {}", user.user_id);
    gateway.reactivate(user.user_id).await?;
    refetch(gateway, user.user_id).await
}

#[derive(Clone, Copy)]
enum SubscriptionEventKind {
    Cancel,
    Reactivate,
}

fn check_event(
    user: &CurrentUser,
    kind: SubscriptionEventKind,
    now: DateTime<Utc>,
) -> Result<(), EntitlementError> {
    let (_, axis) = managed_axis(user)?;
    match axis {
        BillingAxis::Ai => check_event_on::<SubscriptionPlan>(user, kind, now),
        BillingAxis::Recruiter => check_event_on::<RecruiterPlan>(user, kind, now),
    }
}

fn check_event_on<P: CatalogAxis>(
    user: &CurrentUser,
    kind: SubscriptionEventKind,
    now: DateTime<Utc>,
) -> Result<(), EntitlementError> {
    let event = match kind {
        SubscriptionEventKind::Cancel => SubscriptionEvent::Cancel,
        SubscriptionEventKind::Reactivate => SubscriptionEvent::Reactivate,
    };
    current_state::<P>(user, now)?.apply(event, now).map(|_| ())
}

// ────────────────────────────────────────────────────────────────────────────
// Credits
// ────────────────────────────────────────────────────────────────────────────

/// Credits are sold to applicants only, on top of (or instead of) an AI plan.
pub async fn purchase_credits(
    catalog: &Catalog,
    gateway: &dyn BillingGateway,
    user: &CurrentUser,
    package_id: &str,
    payment_method: PaymentMethod,
) -> Result<AccountSnapshot, EntitlementError> {
    let (role, axis) = managed_axis(user)?;
    let package = CreditPackageId::parse(package_id)?;
    if axis != BillingAxis::Ai {
        return Err(EntitlementError::PlanNotOffered {
            item: package.as_str().to_string(),
            role: role.to_string(),
        });
    }

    let estimate = catalog.package_estimate(package)?;
    let confirmed = gateway
        .quote(&QuoteRequest::Credits {
            user_id: user.user_id,
            package,
        })
        .await?;
    if let Err(e) = verify_server_price(&estimate, &confirmed) {
        warn!(
            "Aborting purchase of {} for {}: {e}",
            package.as_str(),
            user.user_id
        );
        return Err(e);
    }

    info!(
        "Purchasing {} for {} at {}",
        package.as_str(),
        user.user_id,
        estimate.money
    );
    gateway
        .purchase_credits(user.user_id, package, payment_method)
        .await?;
    refetch(gateway, user.user_id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::billing::gateway::fake::FakeGateway;
    use crate::models::account::{SubscriptionSnapshot, SubscriptionStatus};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    fn snapshot(plan: &str, status: SubscriptionStatus) -> SubscriptionSnapshot {
        SubscriptionSnapshot {
            plan: plan.to_string(),
            status,
            end_date: now() + Duration::days(10),
            payment_method: PaymentMethod::Gcash,
        }
    }

    fn user(role: &str, subscription: Option<SubscriptionSnapshot>) -> CurrentUser {
        CurrentUser {
            user_id: Uuid::new_v4(),
            role: Some(role.to_string()),
            user_type: None,
            subscription,
            credit_balance: 0,
        }
    }

    fn gateway_for(user: &CurrentUser) -> FakeGateway {
        FakeGateway::new(AccountSnapshot {
            subscription: user.subscription.clone(),
            credit_balance: user.credit_balance,
        })
    }

    #[tokio::test]
    async fn test_subscribe_quotes_before_charging_and_refetches() {
        let catalog = Catalog::standard();
        let applicant = user("applicant", None);
        let gateway = gateway_for(&applicant);

        let account = subscribe(&catalog, &gateway, &applicant, "pro", PaymentMethod::Gcash, now())
            .await
            .unwrap();

        assert_eq!(gateway.calls(), vec!["quote", "subscribe", "fetch_account"]);
        let sub = account.subscription.unwrap();
        assert_eq!(sub.plan, "pro");
        assert_eq!(sub.status, SubscriptionStatus::Active);
    }

    #[tokio::test]
    async fn test_price_mismatch_aborts_before_charge() {
        let catalog = Catalog::standard();
        let applicant = user("applicant", None);
        let mut gateway = gateway_for(&applicant);
        gateway.quote_skew_minor = 1;

        let result =
            subscribe(&catalog, &gateway, &applicant, "pro", PaymentMethod::Card, now()).await;

        assert!(matches!(
            result,
            Err(EntitlementError::PricingCatalogMismatch { .. })
        ));
        assert_eq!(gateway.calls(), vec!["quote"]);
    }

    #[tokio::test]
    async fn test_free_user_cannot_pick_basic() {
        let catalog = Catalog::standard();
        let applicant = user("applicant", None);
        let gateway = gateway_for(&applicant);

        let result =
            subscribe(&catalog, &gateway, &applicant, "basic", PaymentMethod::Card, now()).await;

        assert!(matches!(result, Err(EntitlementError::PlanNotOffered { .. })));
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn test_expired_user_can_resubscribe() {
        let catalog = Catalog::standard();
        let applicant = user(
            "applicant",
            Some(snapshot("basic", SubscriptionStatus::Expired)),
        );
        let gateway = gateway_for(&applicant);

        let account = subscribe(&catalog, &gateway, &applicant, "pro", PaymentMethod::Maya, now())
            .await
            .unwrap();
        assert_eq!(account.subscription.unwrap().plan, "pro");
        assert_eq!(gateway.calls(), vec!["quote", "subscribe", "fetch_account"]);
    }

    #[tokio::test]
    async fn test_subscribe_while_active_is_rejected_locally() {
        let catalog = Catalog::standard();
        let applicant = user("applicant", Some(snapshot("pro", SubscriptionStatus::Active)));
        let gateway = gateway_for(&applicant);

        let result = subscribe(
            &catalog,
            &gateway,
            &applicant,
            "enterprise",
            PaymentMethod::Card,
            now(),
        )
        .await;

        assert!(matches!(
            result,
            Err(EntitlementError::InvalidPlanTransition { .. })
        ));
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn test_network_failure_is_retryable() {
        let catalog = Catalog::standard();
        let applicant = user("applicant", None);
        let mut gateway = gateway_for(&applicant);
        gateway.fail_status = Some(503);

        let result = subscribe(
            &catalog,
            &gateway,
            &applicant,
            "enterprise",
            PaymentMethod::Card,
            now(),
        )
        .await;

        assert!(matches!(
            result,
            Err(EntitlementError::NetworkFailure {
                retryable: true,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_downgrade_is_allowed() {
        let catalog = Catalog::standard();
        let applicant = user("applicant", Some(snapshot("pro", SubscriptionStatus::Active)));
        let gateway = gateway_for(&applicant);

        let outcome = change_plan(
            &catalog,
            &gateway,
            &applicant,
            "basic",
            PaymentMethod::Gcash,
            now(),
        )
        .await
        .unwrap();

        assert_eq!(outcome.direction, TierChange::Downgrade);
        assert_eq!(outcome.preview.label, "Downgrade to Basic");
        assert_eq!(outcome.account.subscription.unwrap().plan, "basic");
        assert_eq!(gateway.calls(), vec!["change_plan", "fetch_account"]);
    }

    #[tokio::test]
    async fn test_same_plan_change_makes_no_calls() {
        let catalog = Catalog::standard();
        let applicant = user("applicant", Some(snapshot("pro", SubscriptionStatus::Active)));
        let gateway = gateway_for(&applicant);

        let result = change_plan(
            &catalog,
            &gateway,
            &applicant,
            "pro",
            PaymentMethod::Gcash,
            now(),
        )
        .await;

        assert!(matches!(
            result,
            Err(EntitlementError::InvalidPlanTransition { .. })
        ));
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn test_admin_upgrades_organization_plan() {
        let catalog = Catalog::standard();
        let admin = user("admin", Some(snapshot("starter", SubscriptionStatus::Active)));
        let gateway = gateway_for(&admin);

        let outcome = change_plan(
            &catalog,
            &gateway,
            &admin,
            "premium",
            PaymentMethod::BankTransfer,
            now(),
        )
        .await
        .unwrap();
        assert_eq!(outcome.direction, TierChange::Upgrade);
        assert_eq!(outcome.preview.to, "premium");
    }

    #[tokio::test]
    async fn test_plan_from_other_axis_is_unknown() {
        let catalog = Catalog::standard();
        let admin = user("admin", Some(snapshot("starter", SubscriptionStatus::Active)));
        let gateway = gateway_for(&admin);

        let result = change_plan(&catalog, &gateway, &admin, "pro", PaymentMethod::Card, now()).await;
        assert_eq!(result, Err(EntitlementError::UnknownPlan("pro".to_string())));
    }

    #[tokio::test]
    async fn test_manager_cannot_change_billing() {
        let catalog = Catalog::standard();
        let manager = user("manager", Some(snapshot("starter", SubscriptionStatus::Active)));
        let gateway = gateway_for(&manager);

        let result = change_plan(
            &catalog,
            &gateway,
            &manager,
            "premium",
            PaymentMethod::Card,
            now(),
        )
        .await;
        assert_eq!(
            result,
            Err(EntitlementError::BillingNotPermitted("manager".to_string()))
        );
        assert!(gateway.calls().is_empty());
    }

    #[test]
    fn test_preview_needs_active_subscription() {
        let catalog = Catalog::standard();
        let cancelled = user(
            "applicant",
            Some(snapshot("pro", SubscriptionStatus::Cancelled)),
        );
        assert!(matches!(
            preview_plan_change(&catalog, &cancelled, "enterprise", now()),
            Err(EntitlementError::InvalidPlanTransition { .. })
        ));

        let active = user("applicant", Some(snapshot("basic", SubscriptionStatus::Active)));
        let preview = preview_plan_change(&catalog, &active, "enterprise", now()).unwrap();
        assert_eq!(preview.label, "Upgrade to Enterprise");
        assert_eq!(preview.monthly_difference.amount_minor, 120_000);
    }

    #[tokio::test]
    async fn test_cancel_then_reactivate() {
        let applicant = user("applicant", Some(snapshot("pro", SubscriptionStatus::Active)));
        let gateway = gateway_for(&applicant);

        let account = cancel(&gateway, &applicant, now()).await.unwrap();
        let sub = account.subscription.clone().unwrap();
        assert_eq!(sub.status, SubscriptionStatus::Cancelled);

        let cancelled = CurrentUser {
            subscription: Some(sub),
            ..applicant.clone()
        };
        let account = reactivate(&gateway, &cancelled, now()).await.unwrap();
        assert_eq!(
            account.subscription.unwrap().status,
            SubscriptionStatus::Active
        );
        assert_eq!(
            gateway.calls(),
            vec!["cancel", "fetch_account", "reactivate", "fetch_account"]
        );
    }

    #[tokio::test]
    async fn test_reactivate_after_end_date_is_rejected() {
        let applicant = user(
            "applicant",
            Some(snapshot("pro", SubscriptionStatus::Cancelled)),
        );
        let gateway = gateway_for(&applicant);

        let result = reactivate(&gateway, &applicant, now() + Duration::days(11)).await;
        assert!(matches!(
            result,
            Err(EntitlementError::InvalidPlanTransition { .. })
        ));
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_without_subscription_is_rejected() {
        let applicant = user("applicant", None);
        let gateway = gateway_for(&applicant);
        assert!(cancel(&gateway, &applicant, now()).await.is_err());
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn test_credit_purchase_adds_credits() {
        let catalog = Catalog::standard();
        let applicant = user("applicant", None);
        let gateway = gateway_for(&applicant);

        let account = purchase_credits(
            &catalog,
            &gateway,
            &applicant,
            "bundle10",
            PaymentMethod::Gcash,
        )
        .await
        .unwrap();
        assert_eq!(account.credit_balance, 10);
        assert_eq!(
            gateway.calls(),
            vec!["quote", "purchase_credits", "fetch_account"]
        );
    }

    #[tokio::test]
    async fn test_credit_price_mismatch_aborts() {
        let catalog = Catalog::standard();
        let applicant = user("applicant", None);
        let mut gateway = gateway_for(&applicant);
        gateway.quote_skew_minor = -100;

        let result = purchase_credits(
            &catalog,
            &gateway,
            &applicant,
            "bundle5",
            PaymentMethod::Card,
        )
        .await;
        assert!(matches!(
            result,
            Err(EntitlementError::PricingCatalogMismatch { .. })
        ));
        assert_eq!(gateway.calls(), vec!["quote"]);
    }

    #[tokio::test]
    async fn test_admin_cannot_buy_credits() {
        let catalog = Catalog::standard();
        let admin = user("admin", None);
        let gateway = gateway_for(&admin);

        let result =
            purchase_credits(&catalog, &gateway, &admin, "single", PaymentMethod::Card).await;
        assert!(matches!(result, Err(EntitlementError::PlanNotOffered { .. })));
    }

    #[tokio::test]
    async fn test_every_offered_plan_is_actionable() {
        use crate::billing::overview::billing_overview;

        let catalog = Catalog::standard();
        let users = [
            user("applicant", None),
            user("applicant", Some(snapshot("basic", SubscriptionStatus::Expired))),
            user("applicant", Some(snapshot("pro", SubscriptionStatus::Active))),
            user("applicant", Some(snapshot("pro", SubscriptionStatus::Cancelled))),
            user("admin", None),
            user("admin", Some(snapshot("professional", SubscriptionStatus::Active))),
            user("admin", Some(snapshot("starter", SubscriptionStatus::Cancelled))),
        ];

        for current in &users {
            let overview = billing_overview(&catalog, current, now()).unwrap();
            let active = overview.status == Some(SubscriptionStatus::Active);

            for offer in &overview.available_plans {
                if active {
                    let preview = preview_plan_change(&catalog, current, offer.id, now());
                    assert!(preview.is_ok(), "{}: {:?}", offer.id, preview);
                } else {
                    let gateway = gateway_for(current);
                    let result = subscribe(
                        &catalog,
                        &gateway,
                        current,
                        offer.id,
                        PaymentMethod::Card,
                        now(),
                    )
                    .await;
                    assert!(result.is_ok(), "{}: {:?}", offer.id, result);
                }
            }

            if overview.can_reactivate {
                let gateway = gateway_for(current);
                assert!(reactivate(&gateway, current, now()).await.is_ok());
            }
        }
    }
}
