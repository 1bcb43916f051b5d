//! Referral codes: validation and redemption onto orders
//!
//! Redemption never fails because of the code itself. An unknown, inactive,
//! expired or exhausted code (or a lost race for the last use) applies the
//! configured default discount instead.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use sternblitz_shared::{compute_final, PricingConfig, ReferralChannel};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::{BillingError, BillingResult};
use crate::events::{OrderEventBuilder, OrderEventLogger, OrderEventType};

const CODE_COLUMNS: &str =
    "code, referrer_order_id, discount_cents, max_uses, uses_count, active, expires_at";

#[derive(Debug, Clone, FromRow)]
pub struct ReferralCode {
    pub code: String,
    pub referrer_order_id: Option<Uuid>,
    pub discount_cents: i64,
    pub max_uses: i32,
    pub uses_count: i32,
    pub active: bool,
    pub expires_at: Option<OffsetDateTime>,
}

/// Why a code cannot be redeemed. Exactly one applies to any invalid code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidReason {
    NotFound,
    Inactive,
    Expired,
    Exhausted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReferralValidation {
    Ok { code: String, discount_cents: i64 },
    Invalid { reason: InvalidReason },
}

/// Codes are stored upper-case without surrounding whitespace
pub fn normalize_code(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// Classify a looked-up code at `now`. Checks run in a fixed order so the
/// reason is unambiguous.
pub fn evaluate(code: Option<&ReferralCode>, now: OffsetDateTime) -> ReferralValidation {
    let Some(code) = code else {
        return ReferralValidation::Invalid {
            reason: InvalidReason::NotFound,
        };
    };

    let reason = if !code.active {
        Some(InvalidReason::Inactive)
    } else if code.expires_at.is_some_and(|expires_at| expires_at <= now) {
        Some(InvalidReason::Expired)
    } else if code.uses_count >= code.max_uses {
        Some(InvalidReason::Exhausted)
    } else {
        None
    };

    match reason {
        Some(reason) => ReferralValidation::Invalid { reason },
        None => ReferralValidation::Ok {
            code: code.code.clone(),
            discount_cents: code.discount_cents,
        },
    }
}

/// Why the default discount was applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    NotFound,
    Inactive,
    Expired,
    Exhausted,
    /// Counter increment failed; the code was not charged a use
    ClaimFailed,
}

impl From<InvalidReason> for FallbackReason {
    fn from(reason: InvalidReason) -> Self {
        match reason {
            InvalidReason::NotFound => Self::NotFound,
            InvalidReason::Inactive => Self::Inactive,
            InvalidReason::Expired => Self::Expired,
            InvalidReason::Exhausted => Self::Exhausted,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum DiscountSource {
    Code,
    Fallback { reason: FallbackReason },
}

#[derive(Debug, Clone, Serialize)]
pub struct RedemptionOutcome {
    pub order_id: Uuid,
    pub referral_code: Option<String>,
    pub discount_cents: i64,
    pub total_cents: i64,
    pub applied: DiscountSource,
}

/// Referral validation and redemption
#[derive(Clone)]
pub struct ReferralService {
    pool: PgPool,
    pricing: PricingConfig,
    events: OrderEventLogger,
}

impl ReferralService {
    pub fn new(pool: PgPool, pricing: PricingConfig) -> Self {
        Self {
            events: OrderEventLogger::new(pool.clone()),
            pool,
            pricing,
        }
    }

    /// Read-only validity check
    pub async fn validate(&self, raw_code: &str) -> BillingResult<ReferralValidation> {
        let code = normalize_code(raw_code);
        if code.is_empty() {
            return Ok(evaluate(None, OffsetDateTime::now_utc()));
        }

        let row = self.find_code(&code).await?;
        Ok(evaluate(row.as_ref(), OffsetDateTime::now_utc()))
    }

    /// Apply a referral (or the fallback discount) to an order.
    ///
    /// The caller is responsible for rejecting internal users.
    pub async fn redeem(
        &self,
        order_id: Uuid,
        raw_code: &str,
        email: Option<&str>,
    ) -> BillingResult<RedemptionOutcome> {
        let code = normalize_code(raw_code);

        let order: Option<(i64, i64)> = sqlx::query_as(
            "SELECT base_price_cents, custom_discount_cents FROM orders WHERE id = $1",
        )
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;
        let (base_cents, custom_discount_cents) =
            order.ok_or_else(|| BillingError::NotFound(format!("order {}", order_id)))?;

        let validation = self.validate(&code).await?;

        let (claimed, applied) = match validation {
            ReferralValidation::Ok { .. } => match self.claim_use(&code).await {
                Ok(Some(row)) => (Some(row), DiscountSource::Code),
                // Lost the race for the last use
                Ok(None) => (
                    None,
                    DiscountSource::Fallback {
                        reason: FallbackReason::Exhausted,
                    },
                ),
                Err(e) => {
                    tracing::warn!(
                        order_id = %order_id,
                        code = %code,
                        error = %e,
                        "Referral counter increment failed, applying default discount"
                    );
                    (
                        None,
                        DiscountSource::Fallback {
                            reason: FallbackReason::ClaimFailed,
                        },
                    )
                }
            },
            ReferralValidation::Invalid { reason } => (
                None,
                DiscountSource::Fallback {
                    reason: reason.into(),
                },
            ),
        };

        let discount_cents = claimed
            .as_ref()
            .map(|row| row.discount_cents)
            .unwrap_or(self.pricing.default_referral_discount_cents);
        let referrer_order_id = claimed.as_ref().and_then(|row| row.referrer_order_id);
        let total_cents = compute_final(base_cents, discount_cents, custom_discount_cents);
        let stored_code = (!code.is_empty()).then(|| code.clone());

        let persisted = sqlx::query(
            r#"
            UPDATE orders
            SET discount_cents = $2,
                total_cents = $3,
                referral_code = $4,
                referral_channel = $5,
                referral_referrer_order_id = $6,
                email = COALESCE(NULLIF(email, ''), $7),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(order_id)
        .bind(discount_cents)
        .bind(total_cents)
        .bind(&stored_code)
        .bind(ReferralChannel::Referral.as_str())
        .bind(referrer_order_id)
        .bind(email.map(str::trim).filter(|e| !e.is_empty()))
        .execute(&self.pool)
        .await;

        let persist_error = match persisted {
            Ok(result) if result.rows_affected() == 1 => None,
            Ok(_) => Some(BillingError::NotFound(format!("order {}", order_id))),
            Err(e) => Some(e.into()),
        };
        if let Some(e) = persist_error {
            if claimed.is_some() {
                self.release_use(&code).await;
            }
            return Err(e);
        }

        let event_type = match applied {
            DiscountSource::Code => OrderEventType::ReferralRedeemed,
            DiscountSource::Fallback { .. } => OrderEventType::ReferralFallback,
        };
        self.events
            .record(OrderEventBuilder::new(order_id, event_type).data(serde_json::json!({
                "code": stored_code,
                "discount_cents": discount_cents,
                "total_cents": total_cents,
                "applied": applied,
            })))
            .await;

        tracing::info!(
            order_id = %order_id,
            code = %code,
            discount_cents = discount_cents,
            total_cents = total_cents,
            applied = ?applied,
            "Referral redeemed"
        );

        Ok(RedemptionOutcome {
            order_id,
            referral_code: stored_code,
            discount_cents,
            total_cents,
            applied,
        })
    }

    async fn find_code(&self, code: &str) -> BillingResult<Option<ReferralCode>> {
        let row: Option<ReferralCode> = sqlx::query_as(&format!(
            "SELECT {} FROM referral_codes WHERE code = $1",
            CODE_COLUMNS
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Atomically take one use of a code. `None` when the code stopped being
    /// redeemable between validation and claim.
    async fn claim_use(&self, code: &str) -> BillingResult<Option<ReferralCode>> {
        let row: Option<ReferralCode> = sqlx::query_as(&format!(
            r#"
            UPDATE referral_codes
            SET uses_count = uses_count + 1
            WHERE code = $1
              AND active
              AND (expires_at IS NULL OR expires_at > NOW())
              AND uses_count < max_uses
            RETURNING {}
            "#,
            CODE_COLUMNS
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Best-effort undo of [`Self::claim_use`]
    async fn release_use(&self, code: &str) {
        let released = sqlx::query(
            "UPDATE referral_codes SET uses_count = uses_count - 1 WHERE code = $1 AND uses_count > 0",
        )
        .bind(code)
        .execute(&self.pool)
        .await;

        if let Err(e) = released {
            tracing::error!(code = %code, error = %e, "Failed to release referral use");
        }
    }
}
