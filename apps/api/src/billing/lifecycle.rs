//! Subscription lifecycle as an immutable state plus a pure reducer.
//!
//! | From                | Event            | To                  |
//! |---------------------|------------------|---------------------|
//! | None / Expired      | subscribe(p)     | Active(p)           |
//! | Active(p1)          | upgrade(p2 > p1) | Active(p2)          |
//! | Active(p1)          | downgrade(p2<p1) | Active(p2)          |
//! | Active(p)           | cancel           | Cancelled(p, end)   |
//! | Cancelled(p, end)   | reactivate       | Active(p), now<end  |
//! | Cancelled(p, end)   | expire           | Expired, now>=end   |
//!
//! Anything else is `InvalidPlanTransition`. A cancelled subscription keeps
//! the features of its plan until `end_date`.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::catalog::{Catalog, CatalogAxis};
use super::plans::{compare_tiers, PlanTier, TierChange};
use crate::errors::EntitlementError;
use crate::models::account::{PaymentMethod, SubscriptionSnapshot, SubscriptionStatus};

/// Length of one paid period. The backend sets the real end date.
pub const BILLING_PERIOD_DAYS: i64 = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SubscriptionState<P> {
    None,
    Active {
        plan: P,
        end_date: DateTime<Utc>,
        payment_method: PaymentMethod,
    },
    Cancelled {
        plan: P,
        end_date: DateTime<Utc>,
        payment_method: PaymentMethod,
    },
    Expired,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionEvent<P> {
    Subscribe {
        plan: P,
        end_date: DateTime<Utc>,
        payment_method: PaymentMethod,
    },
    Upgrade {
        plan: P,
    },
    Downgrade {
        plan: P,
    },
    Cancel,
    Reactivate,
    Expire,
}

impl<P> SubscriptionEvent<P> {
    fn name(&self) -> &'static str {
        match self {
            SubscriptionEvent::Subscribe { .. } => "subscribe",
            SubscriptionEvent::Upgrade { .. } => "upgrade",
            SubscriptionEvent::Downgrade { .. } => "downgrade",
            SubscriptionEvent::Cancel => "cancel",
            SubscriptionEvent::Reactivate => "reactivate",
            SubscriptionEvent::Expire => "expire",
        }
    }
}

impl<P: PlanTier> SubscriptionState<P> {
    /// Builds the state from the wire snapshot. A snapshot whose plan belongs to
    /// the other axis is an `UnknownPlan` error, not a silent downgrade.
    pub fn from_snapshot(snapshot: Option<&SubscriptionSnapshot>) -> Result<Self, EntitlementError> {
        let Some(snapshot) = snapshot else {
            return Ok(SubscriptionState::None);
        };
        let plan =
            P::from_id(&snapshot.plan).ok_or_else(|| EntitlementError::UnknownPlan(snapshot.plan.clone()))?;
        if !plan.is_paid() {
            return Ok(SubscriptionState::None);
        }

        Ok(match snapshot.status {
            SubscriptionStatus::Active => SubscriptionState::Active {
                plan,
                end_date: snapshot.end_date,
                payment_method: snapshot.payment_method,
            },
            SubscriptionStatus::Cancelled => SubscriptionState::Cancelled {
                plan,
                end_date: snapshot.end_date,
                payment_method: snapshot.payment_method,
            },
            SubscriptionStatus::Expired => SubscriptionState::Expired,
        })
    }

    /// The plan on record, regardless of access. Free when there is none.
    pub fn plan(&self) -> P {
        match self {
            SubscriptionState::Active { plan, .. } | SubscriptionState::Cancelled { plan, .. } => {
                *plan
            }
            SubscriptionState::None | SubscriptionState::Expired => P::FREE,
        }
    }

    /// The plan whose features the holder may use at `now`.
    pub fn effective_plan(&self, now: DateTime<Utc>) -> P {
        match self {
            SubscriptionState::Active { plan, .. } => *plan,
            SubscriptionState::Cancelled { plan, end_date, .. } if now < *end_date => *plan,
            _ => P::FREE,
        }
    }

    pub fn has_feature(&self, catalog: &Catalog, feature: &str, now: DateTime<Utc>) -> bool
    where
        P: CatalogAxis,
    {
        catalog.grants(self.effective_plan(now), feature)
    }

    pub fn status(&self) -> Option<SubscriptionStatus> {
        match self {
            SubscriptionState::None => None,
            SubscriptionState::Active { .. } => Some(SubscriptionStatus::Active),
            SubscriptionState::Cancelled { .. } => Some(SubscriptionStatus::Cancelled),
            SubscriptionState::Expired => Some(SubscriptionStatus::Expired),
        }
    }

    pub fn end_date(&self) -> Option<DateTime<Utc>> {
        match self {
            SubscriptionState::Active { end_date, .. }
            | SubscriptionState::Cancelled { end_date, .. } => Some(*end_date),
            SubscriptionState::None | SubscriptionState::Expired => None,
        }
    }

    /// Only an account that never subscribed gets the first-month promotion.
    pub fn is_first_subscription(&self) -> bool {
        matches!(self, SubscriptionState::None)
    }

    /// Applies time-driven transitions: a cancelled subscription past its end
    /// date expires through the reducer's `expire` event.
    pub fn settle(self, now: DateTime<Utc>) -> Self {
        let lapsed = matches!(
            &self,
            SubscriptionState::Cancelled { end_date, .. } if now >= *end_date
        );
        if lapsed {
            if let Ok(expired) = self.apply(SubscriptionEvent::Expire, now) {
                return expired;
            }
        }
        self
    }

    fn label(&self) -> String {
        match self {
            SubscriptionState::None => "none".to_string(),
            SubscriptionState::Active { plan, .. } => format!("active:{}", plan.id()),
            SubscriptionState::Cancelled { plan, .. } => format!("cancelled:{}", plan.id()),
            SubscriptionState::Expired => "expired".to_string(),
        }
    }

    pub fn apply(
        &self,
        event: SubscriptionEvent<P>,
        now: DateTime<Utc>,
    ) -> Result<Self, EntitlementError> {
        match (self, event) {
            (
                SubscriptionState::None | SubscriptionState::Expired,
                SubscriptionEvent::Subscribe {
                    plan,
                    end_date,
                    payment_method,
                },
            ) => {
                if !plan.is_paid() {
                    return Err(EntitlementError::invalid_transition(
                        self.label(),
                        plan.id(),
                        "cannot subscribe to the free tier",
                    ));
                }
                Ok(SubscriptionState::Active {
                    plan,
                    end_date,
                    payment_method,
                })
            }
            (
                SubscriptionState::Active {
                    plan: current,
                    end_date,
                    payment_method,
                },
                SubscriptionEvent::Upgrade { plan },
            ) => match compare_tiers(*current, plan) {
                TierChange::Upgrade => Ok(SubscriptionState::Active {
                    plan,
                    end_date: *end_date,
                    payment_method: *payment_method,
                }),
                TierChange::Same => Err(EntitlementError::invalid_transition(
                    current.id(),
                    plan.id(),
                    "already on this plan",
                )),
                TierChange::Downgrade => Err(EntitlementError::invalid_transition(
                    current.id(),
                    plan.id(),
                    "target plan is lower than the current plan",
                )),
            },
            (
                SubscriptionState::Active {
                    plan: current,
                    end_date,
                    payment_method,
                },
                SubscriptionEvent::Downgrade { plan },
            ) => match compare_tiers(*current, plan) {
                TierChange::Downgrade if plan.is_paid() => Ok(SubscriptionState::Active {
                    plan,
                    end_date: *end_date,
                    payment_method: *payment_method,
                }),
                TierChange::Downgrade => Err(EntitlementError::invalid_transition(
                    current.id(),
                    plan.id(),
                    "cancel the subscription to return to the free tier",
                )),
                TierChange::Same => Err(EntitlementError::invalid_transition(
                    current.id(),
                    plan.id(),
                    "already on this plan",
                )),
                TierChange::Upgrade => Err(EntitlementError::invalid_transition(
                    current.id(),
                    plan.id(),
                    "target plan is higher than the current plan",
                )),
            },
            (
                SubscriptionState::Active {
                    plan,
                    end_date,
                    payment_method,
                },
                SubscriptionEvent::Cancel,
            ) => Ok(SubscriptionState::Cancelled {
                plan: *plan,
                end_date: *end_date,
                payment_method: *payment_method,
            }),
            (
                SubscriptionState::Cancelled {
                    plan,
                    end_date,
                    payment_method,
                },
                SubscriptionEvent::Reactivate,
            ) => {
                if now >= *end_date {
                    return Err(EntitlementError::invalid_transition(
                        self.label(),
                        "reactivate",
                        "the paid period has already ended",
                    ));
                }
                Ok(SubscriptionState::Active {
                    plan: *plan,
                    end_date: *end_date,
                    payment_method: *payment_method,
                })
            }
            (SubscriptionState::Cancelled { end_date, .. }, SubscriptionEvent::Expire) => {
                if now < *end_date {
                    return Err(EntitlementError::invalid_transition(
                        self.label(),
                        "expire",
                        "the paid period is still running",
                    ));
                }
                Ok(SubscriptionState::Expired)
            }
            (state, event) => Err(EntitlementError::invalid_transition(
                state.label(),
                event.name(),
                "not allowed in the current state",
            )),
        }
    }
}

/// Classifies a requested plan change. Moving to the current plan is rejected;
/// downgrades are valid.
pub fn classify_change<P: PlanTier>(current: P, target: P) -> Result<TierChange, EntitlementError> {
    match compare_tiers(current, target) {
        TierChange::Same => Err(EntitlementError::invalid_transition(
            current.id(),
            target.id(),
            "already on this plan",
        )),
        change => Ok(change),
    }
}
