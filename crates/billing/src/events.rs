//! Order Events Module
//!
//! Append-only audit log of everything that happens to an order's money:
//! referral redemptions, setup intents, charges, webhook reconciliations and
//! admin overrides. Logging is best-effort for callers; a failed insert never
//! fails the operation that produced the event.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::BillingResult;

/// Types of order events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderEventType {
    OrderCreated,
    ReferralRedeemed,
    ReferralFallback,
    SetupIntentSucceeded,
    ChargeAttempted,
    ChargeFailed,
    PaymentSucceeded,
    PaymentFailed,
    PaymentProcessing,
    ReferralAwardFlagged,
    StatusOverride,
}

impl std::fmt::Display for OrderEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OrderEventType::OrderCreated => "ORDER_CREATED",
            OrderEventType::ReferralRedeemed => "REFERRAL_REDEEMED",
            OrderEventType::ReferralFallback => "REFERRAL_FALLBACK",
            OrderEventType::SetupIntentSucceeded => "SETUP_INTENT_SUCCEEDED",
            OrderEventType::ChargeAttempted => "CHARGE_ATTEMPTED",
            OrderEventType::ChargeFailed => "CHARGE_FAILED",
            OrderEventType::PaymentSucceeded => "PAYMENT_SUCCEEDED",
            OrderEventType::PaymentFailed => "PAYMENT_FAILED",
            OrderEventType::PaymentProcessing => "PAYMENT_PROCESSING",
            OrderEventType::ReferralAwardFlagged => "REFERRAL_AWARD_FLAGGED",
            OrderEventType::StatusOverride => "STATUS_OVERRIDE",
        };
        write!(f, "{}", s)
    }
}

/// Who triggered the event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActorType {
    /// Internal sales user
    User,
    /// Admin user
    Admin,
    /// Unauthenticated customer flow or automation
    System,
    /// Stripe webhook
    Stripe,
}

impl std::fmt::Display for ActorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActorType::User => write!(f, "user"),
            ActorType::Admin => write!(f, "admin"),
            ActorType::System => write!(f, "system"),
            ActorType::Stripe => write!(f, "stripe"),
        }
    }
}

/// An order event record
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OrderEvent {
    pub id: Uuid,
    pub order_id: Uuid,
    pub event_type: String,
    pub event_data: serde_json::Value,
    pub stripe_event_id: Option<String>,
    pub actor_id: Option<Uuid>,
    pub actor_type: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Builder for creating order events
pub struct OrderEventBuilder {
    order_id: Uuid,
    event_type: OrderEventType,
    event_data: serde_json::Value,
    stripe_event_id: Option<String>,
    actor_id: Option<Uuid>,
    actor_type: ActorType,
}

impl OrderEventBuilder {
    pub fn new(order_id: Uuid, event_type: OrderEventType) -> Self {
        Self {
            order_id,
            event_type,
            event_data: serde_json::json!({}),
            stripe_event_id: None,
            actor_id: None,
            actor_type: ActorType::System,
        }
    }

    pub fn data(mut self, data: serde_json::Value) -> Self {
        self.event_data = data;
        self
    }

    pub fn stripe_event(mut self, event_id: impl Into<String>) -> Self {
        self.stripe_event_id = Some(event_id.into());
        self
    }

    /// Set the actor (user who triggered the event)
    pub fn actor(mut self, actor_id: Uuid, actor_type: ActorType) -> Self {
        self.actor_id = Some(actor_id);
        self.actor_type = actor_type;
        self
    }

    pub fn actor_type(mut self, actor_type: ActorType) -> Self {
        self.actor_type = actor_type;
        self
    }
}

/// Service for logging and querying order events
#[derive(Clone)]
pub struct OrderEventLogger {
    pool: PgPool,
}

impl OrderEventLogger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn log_event(&self, builder: OrderEventBuilder) -> BillingResult<Uuid> {
        let event_id: (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO order_events (
                id,
                order_id,
                event_type,
                event_data,
                stripe_event_id,
                actor_id,
                actor_type
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(builder.order_id)
        .bind(builder.event_type.to_string())
        .bind(&builder.event_data)
        .bind(&builder.stripe_event_id)
        .bind(builder.actor_id)
        .bind(builder.actor_type.to_string())
        .fetch_one(&self.pool)
        .await?;

        Ok(event_id.0)
    }

    /// Log and swallow failures
    pub async fn record(&self, builder: OrderEventBuilder) {
        let order_id = builder.order_id;
        let event_type = builder.event_type;
        if let Err(e) = self.log_event(builder).await {
            tracing::warn!(
                order_id = %order_id,
                event_type = %event_type,
                error = %e,
                "Failed to write order event"
            );
        }
    }

    /// Most recent events of an order, newest first
    pub async fn get_events_for_order(
        &self,
        order_id: Uuid,
        limit: i64,
    ) -> BillingResult<Vec<OrderEvent>> {
        let events: Vec<OrderEvent> = sqlx::query_as(
            r#"
            SELECT
                id,
                order_id,
                event_type,
                event_data,
                stripe_event_id,
                actor_id,
                actor_type,
                created_at
            FROM order_events
            WHERE order_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(order_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_display() {
        assert_eq!(OrderEventType::ChargeAttempted.to_string(), "CHARGE_ATTEMPTED");
        assert_eq!(
            OrderEventType::ReferralAwardFlagged.to_string(),
            "REFERRAL_AWARD_FLAGGED"
        );
    }

    #[test]
    fn test_actor_type_display() {
        assert_eq!(ActorType::Admin.to_string(), "admin");
        assert_eq!(ActorType::Stripe.to_string(), "stripe");
    }

    #[test]
    fn test_builder_defaults_to_system_actor() {
        let order_id = Uuid::new_v4();
        let builder = OrderEventBuilder::new(order_id, OrderEventType::OrderCreated)
            .data(serde_json::json!({ "total_cents": 27400 }));

        assert_eq!(builder.actor_type, ActorType::System);
        assert_eq!(builder.actor_id, None);
        assert_eq!(builder.event_data["total_cents"], 27400);
    }
}
