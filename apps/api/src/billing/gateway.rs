//! Billing backend client. The single point of contact with the authoritative
//! billing service.
//!
//! Nothing else in the crate talks to the network. Calls are fire-and-await:
//! no retries, no deduplication, no optimistic caching. A failed call is
//! surfaced to the user as a retryable notification when the failure is
//! transient.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use super::catalog::CreditPackageId;
use super::pricing::ConfirmedPrice;
use crate::errors::EntitlementError;
use crate::models::account::{AccountSnapshot, PaymentMethod};

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Billing API error (status {status}): {message}")]
    Api { status: u16, message: String },
}

impl GatewayError {
    /// Timeouts, connection failures, 429 and 5xx are worth retrying; other
    /// rejections are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            GatewayError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            GatewayError::Api { status, .. } => *status == 429 || *status >= 500,
        }
    }
}

impl From<GatewayError> for EntitlementError {
    fn from(err: GatewayError) -> Self {
        EntitlementError::NetworkFailure {
            retryable: err.is_retryable(),
            message: err.to_string(),
        }
    }
}

/// What is being priced. Serialized as the body of `POST /quotes`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QuoteRequest {
    Subscription {
        user_id: Uuid,
        plan: String,
        first_month: bool,
    },
    Credits {
        user_id: Uuid,
        package: CreditPackageId,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PlanRequest<'a> {
    plan_id: &'a str,
    payment_method: PaymentMethod,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreditPurchaseRequest {
    package_id: CreditPackageId,
    payment_method: PaymentMethod,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// The outbound billing contract. Every mutation returns the backend's view of
/// the account; callers still re-fetch before trusting it.
///
/// Carried in `AppState` as `Arc<dyn BillingGateway>`.
#[async_trait]
pub trait BillingGateway: Send + Sync {
    async fn fetch_account(&self, user_id: Uuid) -> Result<AccountSnapshot, GatewayError>;

    async fn quote(&self, request: &QuoteRequest) -> Result<ConfirmedPrice, GatewayError>;

    async fn subscribe(
        &self,
        user_id: Uuid,
        plan_id: &str,
        payment_method: PaymentMethod,
    ) -> Result<AccountSnapshot, GatewayError>;

    /// Upgrades and downgrades go through the same call.
    async fn change_plan(
        &self,
        user_id: Uuid,
        plan_id: &str,
        payment_method: PaymentMethod,
    ) -> Result<AccountSnapshot, GatewayError>;

    async fn cancel(&self, user_id: Uuid) -> Result<AccountSnapshot, GatewayError>;

    async fn reactivate(&self, user_id: Uuid) -> Result<AccountSnapshot, GatewayError>;

    async fn purchase_credits(
        &self,
        user_id: Uuid,
        package: CreditPackageId,
        payment_method: PaymentMethod,
    ) -> Result<AccountSnapshot, GatewayError>;
}

/// JSON-over-HTTP client for the billing backend.
#[derive(Clone)]
pub struct HttpBillingGateway {
    client: Client,
    base_url: String,
}

impl HttpBillingGateway {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, GatewayError> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, GatewayError> {
        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorEnvelope>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(GatewayError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl BillingGateway for HttpBillingGateway {
    async fn fetch_account(&self, user_id: Uuid) -> Result<AccountSnapshot, GatewayError> {
        debug!("Fetching billing account for {user_id}");
        self.send(self.client.get(self.url(&format!("/accounts/{user_id}"))))
            .await
    }

    async fn quote(&self, request: &QuoteRequest) -> Result<ConfirmedPrice, GatewayError> {
        self.send(self.client.post(self.url("/quotes")).json(request))
            .await
    }

    async fn subscribe(
        &self,
        user_id: Uuid,
        plan_id: &str,
        payment_method: PaymentMethod,
    ) -> Result<AccountSnapshot, GatewayError> {
        let body = PlanRequest {
            plan_id,
            payment_method,
        };
        self.send(
            self.client
                .post(self.url(&format!("/accounts/{user_id}/subscription")))
                .json(&body),
        )
        .await
    }

    async fn change_plan(
        &self,
        user_id: Uuid,
        plan_id: &str,
        payment_method: PaymentMethod,
    ) -> Result<AccountSnapshot, GatewayError> {
        let body = PlanRequest {
            plan_id,
            payment_method,
        };
        self.send(
            self.client
                .put(self.url(&format!("/accounts/{user_id}/subscription")))
                .json(&body),
        )
        .await
    }

    async fn cancel(&self, user_id: Uuid) -> Result<AccountSnapshot, GatewayError> {
        self.send(
            self.client
                .post(self.url(&format!("/accounts/{user_id}/subscription/cancel"))),
        )
        .await
    }

    async fn reactivate(&self, user_id: Uuid) -> Result<AccountSnapshot, GatewayError> {
        self.send(
            self.client
                .post(self.url(&format!("/accounts/{user_id}/subscription/reactivate"))),
        )
        .await
    }

    async fn purchase_credits(
        &self,
        user_id: Uuid,
        package: CreditPackageId,
        payment_method: PaymentMethod,
    ) -> Result<AccountSnapshot, GatewayError> {
        let body = CreditPurchaseRequest {
            package_id: package,
            payment_method,
        };
        self.send(
            self.client
                .post(self.url(&format!("/accounts/{user_id}/credits")))
                .json(&body),
        )
        .await
    }
}

/// In-memory stand-in for the billing backend, pricing from the standard catalog.
#[cfg(test)]
pub mod fake {
    use std::sync::Mutex;

    use chrono::{Duration, Utc};

    use super::*;
    use crate::billing::catalog::{Catalog, CatalogAxis};
    use crate::billing::plans::{RecruiterPlan, SubscriptionPlan};
    use crate::models::account::{SubscriptionSnapshot, SubscriptionStatus};

    pub struct FakeGateway {
        pub account: Mutex<AccountSnapshot>,
        pub calls: Mutex<Vec<&'static str>>,
        /// Added to every quote to simulate a diverging server catalog.
        pub quote_skew_minor: i64,
        /// Status code every call fails with, when set.
        pub fail_status: Option<u16>,
        catalog: Catalog,
    }

    impl FakeGateway {
        pub fn new(account: AccountSnapshot) -> Self {
            Self {
                account: Mutex::new(account),
                calls: Mutex::new(Vec::new()),
                quote_skew_minor: 0,
                fail_status: None,
                catalog: Catalog::standard(),
            }
        }

        pub fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: &'static str) -> Result<(), GatewayError> {
            self.calls.lock().unwrap().push(call);
            match self.fail_status {
                Some(status) => Err(GatewayError::Api {
                    status,
                    message: "simulated failure".to_string(),
                }),
                None => Ok(()),
            }
        }

        fn snapshot(&self) -> AccountSnapshot {
            self.account.lock().unwrap().clone()
        }

        fn plan_price<P: CatalogAxis>(&self, id: &str, first_month: bool) -> Option<i64> {
            let plan = P::from_id(id)?;
            let estimate = self.catalog.subscription_estimate(plan, first_month).ok()?;
            Some(estimate.money.amount_minor)
        }
    }

    #[async_trait]
    impl BillingGateway for FakeGateway {
        async fn fetch_account(&self, _user_id: Uuid) -> Result<AccountSnapshot, GatewayError> {
            self.record("fetch_account")?;
            Ok(self.snapshot())
        }

        async fn quote(&self, request: &QuoteRequest) -> Result<ConfirmedPrice, GatewayError> {
            self.record("quote")?;
            let amount = match request {
                QuoteRequest::Subscription {
                    plan, first_month, ..
                } => self
                    .plan_price::<SubscriptionPlan>(plan, *first_month)
                    .or_else(|| self.plan_price::<RecruiterPlan>(plan, *first_month)),
                QuoteRequest::Credits { package, .. } => self
                    .catalog
                    .package_price(*package)
                    .ok()
                    .map(|m| m.amount_minor),
            };
            let amount = amount.ok_or_else(|| GatewayError::Api {
                status: 400,
                message: "unknown item".to_string(),
            })?;
            Ok(ConfirmedPrice {
                amount_minor: amount + self.quote_skew_minor,
                currency: self.catalog.currency,
                catalog_version: self.catalog.version.clone(),
            })
        }

        async fn subscribe(
            &self,
            _user_id: Uuid,
            plan_id: &str,
            payment_method: PaymentMethod,
        ) -> Result<AccountSnapshot, GatewayError> {
            self.record("subscribe")?;
            let mut account = self.account.lock().unwrap();
            account.subscription = Some(SubscriptionSnapshot {
                plan: plan_id.to_string(),
                status: SubscriptionStatus::Active,
                end_date: Utc::now() + Duration::days(30),
                payment_method,
            });
            Ok(account.clone())
        }

        async fn change_plan(
            &self,
            _user_id: Uuid,
            plan_id: &str,
            payment_method: PaymentMethod,
        ) -> Result<AccountSnapshot, GatewayError> {
            self.record("change_plan")?;
            let mut account = self.account.lock().unwrap();
            if let Some(sub) = account.subscription.as_mut() {
                sub.plan = plan_id.to_string();
                sub.payment_method = payment_method;
            }
            Ok(account.clone())
        }

        async fn cancel(&self, _user_id: Uuid) -> Result<AccountSnapshot, GatewayError> {
            self.record("cancel")?;
            let mut account = self.account.lock().unwrap();
            if let Some(sub) = account.subscription.as_mut() {
                sub.status = SubscriptionStatus::Cancelled;
            }
            Ok(account.clone())
        }

        async fn reactivate(&self, _user_id: Uuid) -> Result<AccountSnapshot, GatewayError> {
            self.record("reactivate")?;
            let mut account = self.account.lock().unwrap();
            if let Some(sub) = account.subscription.as_mut() {
                sub.status = SubscriptionStatus::Active;
            }
            Ok(account.clone())
        }

        async fn purchase_credits(
            &self,
            _user_id: Uuid,
            package: CreditPackageId,
            _payment_method: PaymentMethod,
        ) -> Result<AccountSnapshot, GatewayError> {
            self.record("purchase_credits")?;
            let credits = self
                .catalog
                .package(package)
                .map(|p| p.credit_count)
                .unwrap_or(0);
            let mut account = self.account.lock().unwrap();
            account.credit_balance += credits;
            Ok(account.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_errors_retryable_only_when_transient() {
        let unavailable = GatewayError::Api {
            status: 503,
            message: String::new(),
        };
        let throttled = GatewayError::Api {
            status: 429,
            message: String::new(),
        };
        let rejected = GatewayError::Api {
            status: 402,
            message: String::new(),
        };
        assert!(unavailable.is_retryable());
        assert!(throttled.is_retryable());
        assert!(!rejected.is_retryable());
    }

    #[test]
    fn test_gateway_error_maps_to_network_failure() {
        let err: EntitlementError = GatewayError::Api {
            status: 502,
            message: "upstream".to_string(),
        }
        .into();
        assert!(matches!(
            err,
            EntitlementError::NetworkFailure {
                retryable: true,
                ..
            }
        ));
    }

    #[test]
    fn test_quote_request_wire_format() {
        let request = QuoteRequest::Credits {
            user_id: Uuid::nil(),
            package: CreditPackageId::Bundle10,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["kind"], "credits");
        assert_eq!(json["package"], "bundle10");
    }

    #[test]
    fn test_base_url_is_normalized() {
        let gateway =
            HttpBillingGateway::new("http://billing.local/api/", Duration::from_secs(5)).unwrap();
        assert_eq!(
            gateway.url("/accounts/1"),
            "http://billing.local/api/accounts/1"
        );
    }
}
