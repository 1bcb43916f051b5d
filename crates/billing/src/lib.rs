// Billing crate clippy configuration
#![allow(clippy::too_many_arguments)] // Some Stripe operations require many parameters
#![allow(clippy::field_reassign_with_default)] // Used for conditional struct field setting
// Test code patterns (expected in test files):
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Sternblitz Billing Module
//!
//! Order payment lifecycle on top of Stripe.
//!
//! ## Features
//!
//! - **Referrals**: Validate promo codes and apply discounts to orders
//! - **Payment Method Binding**: SetupIntents for off-session card / SEPA debit
//! - **Charges**: Off-session PaymentIntents against the stored method
//! - **Webhooks**: Idempotent reconciliation of Stripe events onto orders
//! - **Order Events**: Append-only audit log of every money movement

pub mod charge;
pub mod client;
pub mod customer;
pub mod error;
pub mod events;
pub mod gateway;
pub mod referral;
pub mod setup_intent;
pub mod webhooks;

// Charge
pub use charge::{ChargeReceipt, ChargeService};

// Client
pub use client::{StripeClient, StripeConfig};

// Customer
pub use customer::{CustomerResolution, CustomerService};

// Error
pub use error::{BillingError, BillingResult};

// Events
pub use events::{ActorType, OrderEvent, OrderEventBuilder, OrderEventLogger, OrderEventType};

// Gateway
pub use gateway::{PaymentGateway, StripeGateway};

// Referral
pub use referral::{
    DiscountSource, FallbackReason, InvalidReason, RedemptionOutcome, ReferralService,
    ReferralValidation,
};

// Setup Intent
pub use setup_intent::{SetupIntentRequest, SetupIntentResponse, SetupIntentService};

// Webhooks
pub use webhooks::{WebhookEvent, WebhookHandler, WebhookOutcome};

use std::sync::Arc;

use sqlx::PgPool;
use sternblitz_shared::PricingConfig;

/// Stripe-backed billing functionality
pub struct BillingService {
    pub charges: ChargeService,
    pub customers: CustomerService,
    pub setup_intents: SetupIntentService,
    pub webhooks: WebhookHandler,
}

impl BillingService {
    /// Create a new billing service from environment variables
    pub fn from_env(pricing: PricingConfig, pool: PgPool) -> BillingResult<Self> {
        let config = StripeConfig::from_env()?;
        Ok(Self::new(config, pricing, pool))
    }

    /// Create a new billing service with explicit config
    pub fn new(config: StripeConfig, pricing: PricingConfig, pool: PgPool) -> Self {
        let webhook_secret = config.webhook_secret.clone();
        let gateway = Arc::new(StripeGateway::new(StripeClient::new(config)));
        Self::with_gateway(gateway, webhook_secret, pricing, pool)
    }

    /// Create a billing service on top of any payment gateway
    pub fn with_gateway(
        gateway: Arc<dyn PaymentGateway>,
        webhook_secret: String,
        pricing: PricingConfig,
        pool: PgPool,
    ) -> Self {
        let customers = CustomerService::new(gateway.clone(), pool.clone());

        Self {
            charges: ChargeService::new(gateway.clone(), pool.clone(), pricing),
            setup_intents: SetupIntentService::new(gateway.clone(), customers.clone()),
            customers,
            webhooks: WebhookHandler::new(gateway, pool, webhook_secret),
        }
    }
}
