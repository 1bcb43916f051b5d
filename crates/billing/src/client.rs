//! Stripe client configuration

use stripe::{Client, Currency};

use crate::error::{BillingError, BillingResult};

/// Configuration for Stripe billing
#[derive(Debug, Clone)]
pub struct StripeConfig {
    /// Stripe secret API key
    pub secret_key: String,
    /// Stripe webhook signing secret (`whsec_...`). Empty disables webhooks.
    pub webhook_secret: String,
    /// Currency for off-session charges
    pub currency: Currency,
}

impl StripeConfig {
    /// Create config from environment variables
    pub fn from_env() -> BillingResult<Self> {
        let currency = std::env::var("CHARGE_CURRENCY").unwrap_or_else(|_| "eur".to_string());

        Ok(Self {
            secret_key: std::env::var("STRIPE_SECRET_KEY")
                .map_err(|_| BillingError::Config("STRIPE_SECRET_KEY not set".to_string()))?,
            webhook_secret: std::env::var("STRIPE_WEBHOOK_SECRET").unwrap_or_default(),
            currency: parse_currency(&currency)?,
        })
    }
}

/// Parse an ISO currency code as used in `CHARGE_CURRENCY`
pub fn parse_currency(code: &str) -> BillingResult<Currency> {
    code.trim()
        .to_lowercase()
        .parse::<Currency>()
        .map_err(|_| BillingError::Config(format!("Unsupported currency: {}", code)))
}

/// Stripe billing client
#[derive(Clone)]
pub struct StripeClient {
    client: Client,
    config: StripeConfig,
}

impl StripeClient {
    /// Create a new Stripe client from config
    pub fn new(config: StripeConfig) -> Self {
        let client = Client::new(&config.secret_key);
        Self { client, config }
    }

    /// Create a new Stripe client from environment variables
    pub fn from_env() -> BillingResult<Self> {
        let config = StripeConfig::from_env()?;
        Ok(Self::new(config))
    }

    /// Get the inner Stripe client
    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// Get the config
    pub fn config(&self) -> &StripeConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_currency() {
        assert_eq!(parse_currency("EUR").unwrap(), Currency::EUR);
        assert_eq!(parse_currency(" eur ").unwrap(), Currency::EUR);
        assert!(parse_currency("not-a-currency").is_err());
    }
}
