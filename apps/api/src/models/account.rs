use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::navigation::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Cancelled,
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Card,
    Gcash,
    Maya,
    BankTransfer,
}

/// Subscription as supplied by the authentication collaborator and returned by
/// the billing backend. Field names follow the SPA's camelCase contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionSnapshot {
    pub plan: String,
    pub status: SubscriptionStatus,
    pub end_date: DateTime<Utc>,
    pub payment_method: PaymentMethod,
}

/// The signed-in user as the client knows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentUser {
    pub user_id: Uuid,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub user_type: Option<String>,
    #[serde(default)]
    pub subscription: Option<SubscriptionSnapshot>,
    #[serde(default)]
    pub credit_balance: u32,
}

impl CurrentUser {
    pub fn resolved_role(&self) -> Role {
        Role::resolve(self.role.as_deref(), self.user_type.as_deref())
    }
}

/// Authoritative billing state for one account, as re-fetched after every mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSnapshot {
    #[serde(default)]
    pub subscription: Option<SubscriptionSnapshot>,
    #[serde(default)]
    pub credit_balance: u32,
}
