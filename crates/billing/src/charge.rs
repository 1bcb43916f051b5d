//! Off-session charge of an order's stored payment method
//!
//! Synchronous and single-shot: one PaymentIntent per call, no retries. Final
//! settlement of SEPA debits arrives later through the webhook reconciler.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use sqlx::PgPool;
use sternblitz_shared::{
    charge_amount, Order, PaymentMethodKind, PaymentStatus, PricingConfig, ORDER_COLUMNS,
};
use uuid::Uuid;

use crate::error::{BillingError, BillingResult};
use crate::events::{ActorType, OrderEventBuilder, OrderEventLogger, OrderEventType};
use crate::gateway::{IntentStatus, OffSessionCharge, PaymentGateway};

/// What will be sent to Stripe for an order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargePlan {
    pub customer_id: String,
    pub payment_method_id: String,
    pub amount_cents: i64,
}

/// Result returned to the admin who triggered the charge
#[derive(Debug, Clone, Serialize)]
pub struct ChargeReceipt {
    pub order_id: Uuid,
    pub payment_intent_id: String,
    pub status: String,
    pub amount_cents: i64,
    pub currency: String,
    pub payment_status: Option<PaymentStatus>,
    pub receipt_url: Option<String>,
}

/// Check an order is chargeable and compute the amount
pub fn plan_charge(order: &Order, pricing: &PricingConfig) -> BillingResult<ChargePlan> {
    let customer_id = non_empty(order.stripe_customer_id.as_deref())
        .ok_or(BillingError::PaymentMethodRequired)?;
    let payment_method_id = non_empty(order.stripe_payment_method_id.as_deref())
        .ok_or(BillingError::PaymentMethodRequired)?;

    let amount_cents = charge_amount(
        Some(order.total_cents),
        pricing.base_price_cents,
        order.discount_cents,
    );
    if amount_cents <= 0 {
        return Err(BillingError::InvalidInput(
            "Order total is zero, nothing to charge".to_string(),
        ));
    }

    Ok(ChargePlan {
        customer_id: customer_id.to_string(),
        payment_method_id: payment_method_id.to_string(),
        amount_cents,
    })
}

/// Payment status implied by a freshly created PaymentIntent. Other statuses
/// leave the stored payment status untouched.
pub fn payment_status_after_charge(status: &IntentStatus) -> Option<PaymentStatus> {
    match status {
        IntentStatus::Succeeded => Some(PaymentStatus::Paid),
        IntentStatus::Processing => Some(PaymentStatus::Processing),
        _ => None,
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Charge executor
#[derive(Clone)]
pub struct ChargeService {
    gateway: Arc<dyn PaymentGateway>,
    pool: PgPool,
    pricing: PricingConfig,
    events: OrderEventLogger,
}

impl ChargeService {
    pub fn new(gateway: Arc<dyn PaymentGateway>, pool: PgPool, pricing: PricingConfig) -> Self {
        Self {
            gateway,
            events: OrderEventLogger::new(pool.clone()),
            pool,
            pricing,
        }
    }

    /// Charge an order off-session. Admin authorization is checked by the caller.
    pub async fn charge(&self, order_id: Uuid, actor_id: Uuid) -> BillingResult<ChargeReceipt> {
        let order: Order = sqlx::query_as(&format!(
            "SELECT {} FROM orders WHERE id = $1",
            ORDER_COLUMNS
        ))
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| BillingError::NotFound(format!("order {}", order_id)))?;

        let plan = plan_charge(&order, &self.pricing)?;

        let live_kind = match self.gateway.payment_method_kind(&plan.payment_method_id).await {
            Ok(kind) => kind,
            Err(e) => {
                tracing::warn!(
                    order_id = %order_id,
                    error = %e,
                    "Could not retrieve payment method, using stored type"
                );
                order.payment_method_kind()
            }
        };
        let method_types = PaymentMethodKind::charge_order(live_kind).to_vec();

        let mut metadata = HashMap::new();
        metadata.insert("order_id".to_string(), order_id.to_string());

        let attempt = OffSessionCharge {
            customer_id: plan.customer_id.clone(),
            payment_method_id: plan.payment_method_id.clone(),
            amount_cents: plan.amount_cents,
            method_types: method_types.clone(),
            metadata,
        };

        let outcome = match self.gateway.create_off_session_charge(attempt).await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.record_failure(order_id, actor_id, plan.amount_cents, &e)
                    .await;
                return Err(e);
            }
        };

        let payment_status = payment_status_after_charge(&outcome.status);
        let succeeded = outcome.status == IntentStatus::Succeeded;

        sqlx::query(
            r#"
            UPDATE orders
            SET stripe_payment_intent_id = $2,
                last_payment_event = $3,
                charged_amount_cents = $4,
                charged_currency = $5,
                payment_status = COALESCE($6, payment_status),
                charged_at = CASE WHEN $7 THEN NOW() ELSE charged_at END,
                receipt_url = CASE WHEN $7 THEN COALESCE($8, receipt_url) ELSE receipt_url END,
                payment_method_type = COALESCE($9, payment_method_type),
                last_payment_error = NULL,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(order_id)
        .bind(&outcome.intent_id)
        .bind(format!("charge.{}", outcome.status))
        .bind(outcome.amount_cents)
        .bind(&outcome.currency)
        .bind(payment_status.map(|s| s.as_str()))
        .bind(succeeded)
        .bind(&outcome.receipt_url)
        .bind(live_kind.map(|k| k.as_str()))
        .execute(&self.pool)
        .await?;

        self.events
            .record(
                OrderEventBuilder::new(order_id, OrderEventType::ChargeAttempted)
                    .actor(actor_id, ActorType::Admin)
                    .data(serde_json::json!({
                        "payment_intent_id": outcome.intent_id,
                        "status": outcome.status.as_str(),
                        "amount_cents": outcome.amount_cents,
                        "currency": outcome.currency,
                        "method_types": method_types,
                    })),
            )
            .await;

        tracing::info!(
            order_id = %order_id,
            payment_intent_id = %outcome.intent_id,
            status = %outcome.status,
            amount_cents = outcome.amount_cents,
            "Off-session charge created"
        );

        Ok(ChargeReceipt {
            order_id,
            payment_intent_id: outcome.intent_id,
            status: outcome.status.as_str().to_string(),
            amount_cents: outcome.amount_cents,
            currency: outcome.currency,
            payment_status,
            receipt_url: outcome.receipt_url,
        })
    }

    async fn record_failure(
        &self,
        order_id: Uuid,
        actor_id: Uuid,
        amount_cents: i64,
        error: &BillingError,
    ) {
        tracing::warn!(order_id = %order_id, error = %error, "Off-session charge failed");

        let message = match error {
            BillingError::StripeApi(msg) => msg.clone(),
            other => other.to_string(),
        };

        let stored = sqlx::query(
            r#"
            UPDATE orders
            SET last_payment_event = 'charge.failed',
                last_payment_error = $2,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(order_id)
        .bind(&message)
        .execute(&self.pool)
        .await;
        if let Err(e) = stored {
            tracing::warn!(order_id = %order_id, error = %e, "Failed to store charge error");
        }

        self.events
            .record(
                OrderEventBuilder::new(order_id, OrderEventType::ChargeFailed)
                    .actor(actor_id, ActorType::Admin)
                    .data(serde_json::json!({
                        "amount_cents": amount_cents,
                        "error": message,
                    })),
            )
            .await;
    }
}
