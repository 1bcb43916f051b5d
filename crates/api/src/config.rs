//! Application configuration

use std::env;

use sternblitz_shared::pricing::{DEFAULT_BASE_PRICE_CENTS, DEFAULT_REFERRAL_DISCOUNT_CENTS};
use sternblitz_shared::PricingConfig;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    // Server
    pub bind_address: String,
    pub public_url: String,

    // Database
    pub database_url: String,
    pub database_max_connections: u32,
    pub run_migrations: bool,

    // Authentication
    pub jwt_secret: String,
    pub jwt_expiry_hours: i64,

    // Stripe
    pub stripe_secret_key: String,
    pub stripe_webhook_secret: String,
    pub charge_currency: String,

    // Pricing
    pub order_base_price_cents: i64,
    pub referral_default_discount_cents: i64,

    // Email
    pub resend_api_key: String,
    pub email_from: String,

    // Feature flags
    pub enable_billing: bool,

    // Logging
    pub log_json: bool,
}

fn parsed<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let stripe_secret_key = env::var("STRIPE_SECRET_KEY").unwrap_or_default();

        let order_base_price_cents = parsed("ORDER_BASE_PRICE_CENTS", DEFAULT_BASE_PRICE_CENTS);
        let referral_default_discount_cents = parsed(
            "REFERRAL_DEFAULT_DISCOUNT_CENTS",
            DEFAULT_REFERRAL_DISCOUNT_CENTS,
        );
        if order_base_price_cents < 0 || referral_default_discount_cents < 0 {
            return Err(ConfigError::Invalid("prices must not be negative"));
        }

        Ok(Self {
            // Server
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            public_url: env::var("PUBLIC_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),

            // Database
            database_url: env::var("DATABASE_URL")
                .map_err(|_| ConfigError::Missing("DATABASE_URL"))?,
            database_max_connections: parsed("DATABASE_MAX_CONNECTIONS", 10),
            run_migrations: parsed("RUN_MIGRATIONS", false),

            // Authentication
            jwt_secret: {
                let secret =
                    env::var("JWT_SECRET").map_err(|_| ConfigError::Missing("JWT_SECRET"))?;
                if secret.len() < 32 {
                    return Err(ConfigError::WeakSecret(
                        "JWT_SECRET must be at least 32 characters",
                    ));
                }
                secret
            },
            jwt_expiry_hours: parsed("JWT_EXPIRY_HOURS", 24),

            // Stripe
            enable_billing: parsed("ENABLE_BILLING", !stripe_secret_key.is_empty()),
            stripe_secret_key,
            stripe_webhook_secret: env::var("STRIPE_WEBHOOK_SECRET").unwrap_or_default(),
            charge_currency: env::var("CHARGE_CURRENCY").unwrap_or_else(|_| "eur".to_string()),

            // Pricing
            order_base_price_cents,
            referral_default_discount_cents,

            // Email
            resend_api_key: env::var("RESEND_API_KEY").unwrap_or_default(),
            email_from: env::var("EMAIL_FROM")
                .unwrap_or_else(|_| "Sternblitz <noreply@localhost>".to_string()),

            // Logging
            log_json: env::var("LOG_FORMAT")
                .map(|v| v.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
        })
    }

    pub fn pricing(&self) -> PricingConfig {
        PricingConfig {
            base_price_cents: self.order_base_price_cents,
            default_referral_discount_cents: self.referral_default_discount_cents,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("Weak secret: {0}")]
    WeakSecret(&'static str),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: &[&str] = &[
        "DATABASE_URL",
        "JWT_SECRET",
        "STRIPE_SECRET_KEY",
        "ENABLE_BILLING",
        "ORDER_BASE_PRICE_CENTS",
        "REFERRAL_DEFAULT_DISCOUNT_CENTS",
        "LOG_FORMAT",
    ];

    fn setup_minimal_config() {
        for var in VARS {
            env::remove_var(var);
        }
        env::set_var("DATABASE_URL", "postgres://test");
        env::set_var(
            "JWT_SECRET",
            "test-jwt-secret-must-be-at-least-32-characters-long",
        );
    }

    fn cleanup_config() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_defaults() {
        setup_minimal_config();

        let config = Config::from_env().unwrap();
        assert_eq!(config.order_base_price_cents, 29_900);
        assert_eq!(config.referral_default_discount_cents, 2_500);
        assert_eq!(config.charge_currency, "eur");
        assert!(!config.enable_billing, "billing is off without a Stripe key");
        assert!(!config.log_json);

        cleanup_config();
    }

    #[test]
    #[serial]
    fn test_missing_database_url() {
        setup_minimal_config();
        env::remove_var("DATABASE_URL");

        assert!(matches!(
            Config::from_env(),
            Err(ConfigError::Missing("DATABASE_URL"))
        ));

        cleanup_config();
    }

    #[test]
    #[serial]
    fn test_weak_jwt_secret_rejected() {
        setup_minimal_config();
        env::set_var("JWT_SECRET", "short");

        assert!(matches!(
            Config::from_env(),
            Err(ConfigError::WeakSecret(_))
        ));

        cleanup_config();
    }

    #[test]
    #[serial]
    fn test_pricing_and_flags_from_env() {
        setup_minimal_config();
        env::set_var("STRIPE_SECRET_KEY", "sk_test_123");
        env::set_var("ORDER_BASE_PRICE_CENTS", "39900");
        env::set_var("REFERRAL_DEFAULT_DISCOUNT_CENTS", "5000");
        env::set_var("LOG_FORMAT", "JSON");

        let config = Config::from_env().unwrap();
        assert!(config.enable_billing);
        assert!(config.log_json);
        let pricing = config.pricing();
        assert_eq!(pricing.base_price_cents, 39_900);
        assert_eq!(pricing.default_referral_discount_cents, 5_000);

        env::set_var("ORDER_BASE_PRICE_CENTS", "-1");
        assert!(matches!(Config::from_env(), Err(ConfigError::Invalid(_))));

        cleanup_config();
    }
}
