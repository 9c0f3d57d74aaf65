// Entitlement & Pricing Engine: plan ladders, catalog, pricing, subscription
// lifecycle, and the billing backend client.

pub mod catalog;
pub mod gateway;
pub mod handlers;
pub mod lifecycle;
pub mod overview;
pub mod plans;
pub mod pricing;
pub mod service;

pub use catalog::Catalog;
pub use gateway::{BillingGateway, HttpBillingGateway};
