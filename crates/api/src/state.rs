//! Shared application state

use std::sync::Arc;

use sqlx::PgPool;
use sternblitz_billing::{
    client::parse_currency, BillingError, BillingService, OrderEventLogger, ReferralService,
    StripeConfig,
};

use crate::{
    auth::{InviteManager, JwtManager},
    config::Config,
    email::{EmailConfig, MailService},
    error::ApiError,
};

/// Application state shared by all handlers
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub jwt: JwtManager,
    pub invites: InviteManager,
    pub referrals: ReferralService,
    pub order_events: OrderEventLogger,
    pub mail: MailService,
    /// Stripe-backed services, absent when billing is disabled
    pub billing: Option<Arc<BillingService>>,
}

impl AppState {
    /// Build state from configuration. Stripe is wired up only when billing
    /// is enabled.
    pub fn new(config: Config, pool: PgPool) -> Result<Self, BillingError> {
        let billing = if config.enable_billing {
            let stripe = StripeConfig {
                secret_key: config.stripe_secret_key.clone(),
                webhook_secret: config.stripe_webhook_secret.clone(),
                currency: parse_currency(&config.charge_currency)?,
            };
            Some(Arc::new(BillingService::new(stripe, config.pricing(), pool.clone())))
        } else {
            None
        };

        Ok(Self::with_billing(config, pool, billing))
    }

    /// Build state around an already constructed billing service
    pub fn with_billing(
        config: Config,
        pool: PgPool,
        billing: Option<Arc<BillingService>>,
    ) -> Self {
        Self {
            jwt: JwtManager::new(&config.jwt_secret, config.jwt_expiry_hours),
            invites: InviteManager::new(pool.clone()),
            referrals: ReferralService::new(pool.clone(), config.pricing()),
            order_events: OrderEventLogger::new(pool.clone()),
            mail: MailService::new(EmailConfig::from_config(&config)),
            config: Arc::new(config),
            billing,
            pool,
        }
    }

    /// Billing services, or 503 when billing is disabled
    pub fn billing(&self) -> Result<&BillingService, ApiError> {
        self.billing.as_deref().ok_or(ApiError::BillingDisabled)
    }
}
