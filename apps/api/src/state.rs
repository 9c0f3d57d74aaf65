use std::sync::Arc;

use crate::billing::{BillingGateway, Catalog};
use crate::config::Config;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    #[allow(dead_code)]
    pub config: Config,
    /// Validated at startup and never mutated afterwards.
    pub catalog: Arc<Catalog>,
    /// Billing backend. `HttpBillingGateway` in production, a fake in tests.
    pub gateway: Arc<dyn BillingGateway>,
}
