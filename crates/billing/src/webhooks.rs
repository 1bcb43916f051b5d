//! Stripe webhook reconciliation
//!
//! Signatures are verified by hand (`t=...,v1=...` over `"{t}.{payload}"`) and
//! payloads are read into small local structs instead of `stripe::Event`, so a
//! Stripe API version bump on the dashboard cannot break parsing.
//!
//! Every event id is claimed in `stripe_webhook_events` before any order is
//! touched. All order writes are plain overwrites, so a re-delivered event
//! converges to the same row.

use std::collections::HashMap;
use std::sync::Arc;

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use sqlx::PgPool;
use sternblitz_shared::{PaymentMethodKind, PaymentStatus, REFERRAL_AWARD_PENDING};
use subtle::ConstantTimeEq;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::{BillingError, BillingResult};
use crate::events::{ActorType, OrderEventBuilder, OrderEventLogger, OrderEventType};
use crate::gateway::PaymentGateway;

type HmacSha256 = Hmac<Sha256>;

/// Maximum age (and future skew) of a signed payload
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Events stuck in `processing` longer than this may be claimed again
const PROCESSING_TIMEOUT_MINUTES: i32 = 30;

// =============================================================================
// Signature verification
// =============================================================================

/// Verify a `Stripe-Signature` header against the raw payload.
pub fn verify_signature(
    payload: &str,
    header: &str,
    secret: &str,
    now_unix: i64,
) -> BillingResult<()> {
    if secret.is_empty() {
        return Err(BillingError::Config(
            "STRIPE_WEBHOOK_SECRET not set".to_string(),
        ));
    }

    let mut timestamp: Option<i64> = None;
    let mut candidates: Vec<Vec<u8>> = Vec::new();

    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => timestamp = value.parse().ok(),
            "v1" => {
                if let Ok(bytes) = hex::decode(value) {
                    candidates.push(bytes);
                }
            }
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or_else(|| {
        tracing::warn!("Missing timestamp in signature header");
        BillingError::WebhookSignatureInvalid
    })?;
    if candidates.is_empty() {
        tracing::warn!("Missing v1 signature in signature header");
        return Err(BillingError::WebhookSignatureInvalid);
    }

    if (now_unix - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
        tracing::warn!(
            timestamp = timestamp,
            now = now_unix,
            "Webhook timestamp outside tolerance"
        );
        return Err(BillingError::WebhookSignatureInvalid);
    }

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| BillingError::WebhookSignatureInvalid)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload.as_bytes());
    let expected = mac.finalize().into_bytes();

    // Several v1 entries are sent while a secret is being rolled
    let matched = candidates
        .iter()
        .any(|candidate| bool::from(expected.as_slice().ct_eq(candidate.as_slice())));

    if !matched {
        tracing::warn!("Webhook signature mismatch");
        return Err(BillingError::WebhookSignatureInvalid);
    }
    Ok(())
}

// =============================================================================
// Payload types
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub created: i64,
    pub data: WebhookEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEventData {
    pub object: serde_json::Value,
}

/// A Stripe reference that may or may not be expanded
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum ObjectRef {
    Id(String),
    Expanded(ExpandedObject),
}

#[derive(Debug, Clone, Deserialize)]
struct ExpandedObject {
    id: String,
    #[serde(rename = "type")]
    kind: Option<String>,
    receipt_url: Option<String>,
}

impl ObjectRef {
    fn id(&self) -> &str {
        match self {
            Self::Id(id) => id,
            Self::Expanded(object) => &object.id,
        }
    }

    fn expanded(&self) -> Option<&ExpandedObject> {
        match self {
            Self::Id(_) => None,
            Self::Expanded(object) => Some(object),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SetupIntentObject {
    id: String,
    customer: Option<ObjectRef>,
    payment_method: Option<ObjectRef>,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct PaymentIntentObject {
    id: String,
    #[serde(default)]
    amount: i64,
    #[serde(default)]
    amount_received: i64,
    currency: Option<String>,
    latest_charge: Option<ObjectRef>,
    /// Present on payloads from older API versions
    charges: Option<ChargeList>,
    last_payment_error: Option<LastPaymentError>,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct ChargeList {
    #[serde(default)]
    data: Vec<ChargeObject>,
}

#[derive(Debug, Deserialize)]
struct ChargeObject {
    receipt_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LastPaymentError {
    message: Option<String>,
    code: Option<String>,
}

impl PaymentIntentObject {
    fn receipt_url(&self) -> Option<String> {
        self.latest_charge
            .as_ref()
            .and_then(ObjectRef::expanded)
            .and_then(|charge| charge.receipt_url.clone())
            .or_else(|| {
                self.charges
                    .as_ref()?
                    .data
                    .iter()
                    .find_map(|charge| charge.receipt_url.clone())
            })
    }

    fn error_message(&self) -> Option<String> {
        let error = self.last_payment_error.as_ref()?;
        error.message.clone().or_else(|| error.code.clone())
    }
}

fn order_id_from(metadata: &HashMap<String, String>) -> Option<Uuid> {
    metadata
        .get("order_id")
        .and_then(|raw| Uuid::parse_str(raw.trim()).ok())
}

// =============================================================================
// Reconciliation plan
// =============================================================================

/// What an event means for an order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookAction {
    SetupSucceeded {
        order_id: Uuid,
        setup_intent_id: String,
        customer_id: Option<String>,
        payment_method_id: Option<String>,
        method_kind: Option<PaymentMethodKind>,
    },
    PaymentSucceeded {
        order_id: Uuid,
        payment_intent_id: String,
        amount_cents: i64,
        currency: Option<String>,
        receipt_url: Option<String>,
    },
    PaymentFailed {
        order_id: Uuid,
        payment_intent_id: String,
        error_message: Option<String>,
    },
    PaymentProcessing {
        order_id: Uuid,
        payment_intent_id: String,
    },
    Ignore {
        reason: &'static str,
    },
}

/// Map an event to the order update it implies. Pure; no I/O.
pub fn plan_action(event: &WebhookEvent) -> WebhookAction {
    match event.event_type.as_str() {
        "setup_intent.succeeded" => {
            let Ok(intent) = serde_json::from_value::<SetupIntentObject>(event.data.object.clone())
            else {
                return WebhookAction::Ignore {
                    reason: "malformed setup intent",
                };
            };
            let Some(order_id) = order_id_from(&intent.metadata) else {
                return WebhookAction::Ignore {
                    reason: "no order_id in metadata",
                };
            };
            let method_kind = intent
                .payment_method
                .as_ref()
                .and_then(ObjectRef::expanded)
                .and_then(|method| method.kind.as_deref())
                .and_then(|kind| kind.parse().ok());

            WebhookAction::SetupSucceeded {
                order_id,
                setup_intent_id: intent.id,
                customer_id: intent.customer.as_ref().map(|c| c.id().to_string()),
                payment_method_id: intent.payment_method.as_ref().map(|m| m.id().to_string()),
                method_kind,
            }
        }
        "payment_intent.succeeded" | "payment_intent.payment_failed" | "payment_intent.processing" => {
            let Ok(intent) =
                serde_json::from_value::<PaymentIntentObject>(event.data.object.clone())
            else {
                return WebhookAction::Ignore {
                    reason: "malformed payment intent",
                };
            };
            let Some(order_id) = order_id_from(&intent.metadata) else {
                return WebhookAction::Ignore {
                    reason: "no order_id in metadata",
                };
            };

            match event.event_type.as_str() {
                "payment_intent.succeeded" => WebhookAction::PaymentSucceeded {
                    order_id,
                    amount_cents: if intent.amount_received > 0 {
                        intent.amount_received
                    } else {
                        intent.amount
                    },
                    currency: intent.currency.clone(),
                    receipt_url: intent.receipt_url(),
                    payment_intent_id: intent.id,
                },
                "payment_intent.payment_failed" => WebhookAction::PaymentFailed {
                    order_id,
                    error_message: intent.error_message(),
                    payment_intent_id: intent.id,
                },
                _ => WebhookAction::PaymentProcessing {
                    order_id,
                    payment_intent_id: intent.id,
                },
            }
        }
        _ => WebhookAction::Ignore {
            reason: "unhandled event type",
        },
    }
}

/// How a delivery was handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    Processed,
    Duplicate,
    Ignored,
}

// =============================================================================
// Handler
// =============================================================================

/// Webhook handler
#[derive(Clone)]
pub struct WebhookHandler {
    gateway: Arc<dyn PaymentGateway>,
    pool: PgPool,
    webhook_secret: String,
    events: OrderEventLogger,
}

impl WebhookHandler {
    pub fn new(gateway: Arc<dyn PaymentGateway>, pool: PgPool, webhook_secret: String) -> Self {
        Self {
            gateway,
            events: OrderEventLogger::new(pool.clone()),
            pool,
            webhook_secret,
        }
    }

    /// Verify the signature and parse the payload
    pub fn construct_event(&self, payload: &str, signature: &str) -> BillingResult<WebhookEvent> {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        verify_signature(payload, signature, &self.webhook_secret, now)?;

        serde_json::from_str(payload).map_err(|e| {
            tracing::warn!(parse_error = %e, "Failed to parse webhook event JSON");
            BillingError::WebhookPayloadInvalid(e.to_string())
        })
    }

    /// Handle a verified event exactly once per event id
    pub async fn handle_event(&self, event: WebhookEvent) -> BillingResult<WebhookOutcome> {
        let event_timestamp = OffsetDateTime::from_unix_timestamp(event.created)
            .unwrap_or_else(|_| OffsetDateTime::now_utc());

        // Failed runs and runs stuck in `processing` may be claimed again
        let claimed: Option<(Uuid,)> = sqlx::query_as(
            r#"
            INSERT INTO stripe_webhook_events
                (stripe_event_id, event_type, event_timestamp, processing_result, processing_started_at)
            VALUES ($1, $2, $3, 'processing', NOW())
            ON CONFLICT (stripe_event_id) DO UPDATE SET
                processing_result = 'processing',
                processing_started_at = NOW(),
                error_message = NULL
            WHERE stripe_webhook_events.processing_result = 'error'
               OR (stripe_webhook_events.processing_result = 'processing'
                   AND stripe_webhook_events.processing_started_at
                       < NOW() - make_interval(mins => $4))
            RETURNING id
            "#,
        )
        .bind(&event.id)
        .bind(&event.event_type)
        .bind(event_timestamp)
        .bind(PROCESSING_TIMEOUT_MINUTES)
        .fetch_optional(&self.pool)
        .await?;

        if claimed.is_none() {
            tracing::info!(
                event_id = %event.id,
                event_type = %event.event_type,
                "Duplicate webhook event, already claimed"
            );
            return Ok(WebhookOutcome::Duplicate);
        }

        let result = self.process(&event, event_timestamp).await;

        let (processing_result, error_message) = match &result {
            Ok(_) => ("success", None),
            Err(e) => ("error", Some(e.to_string())),
        };

        if let Err(e) = sqlx::query(
            r#"
            UPDATE stripe_webhook_events
            SET processing_result = $1, error_message = $2, processed_at = NOW()
            WHERE stripe_event_id = $3
            "#,
        )
        .bind(processing_result)
        .bind(&error_message)
        .bind(&event.id)
        .execute(&self.pool)
        .await
        {
            tracing::error!(
                event_id = %event.id,
                error = %e,
                "Failed to record webhook processing result"
            );
        }

        result
    }

    async fn process(
        &self,
        event: &WebhookEvent,
        event_timestamp: OffsetDateTime,
    ) -> BillingResult<WebhookOutcome> {
        let action = plan_action(event);

        let order_id = match &action {
            WebhookAction::Ignore { reason } => {
                tracing::info!(
                    event_id = %event.id,
                    event_type = %event.event_type,
                    reason = %reason,
                    "Ignoring webhook event"
                );
                return Ok(WebhookOutcome::Ignored);
            }
            WebhookAction::SetupSucceeded { order_id, .. }
            | WebhookAction::PaymentSucceeded { order_id, .. }
            | WebhookAction::PaymentFailed { order_id, .. }
            | WebhookAction::PaymentProcessing { order_id, .. } => *order_id,
        };

        let updated = match action {
            WebhookAction::SetupSucceeded {
                order_id,
                setup_intent_id,
                customer_id,
                payment_method_id,
                method_kind,
            } => {
                let method_kind = match (method_kind, payment_method_id.as_deref()) {
                    (Some(kind), _) => Some(kind),
                    (None, Some(pm)) => self.lookup_method_kind(order_id, pm).await,
                    (None, None) => None,
                };

                sqlx::query(
                    r#"
                    UPDATE orders
                    SET stripe_customer_id = COALESCE($2, stripe_customer_id),
                        stripe_payment_method_id = COALESCE($3, stripe_payment_method_id),
                        stripe_setup_intent_id = $4,
                        payment_method_type = COALESCE($5, payment_method_type),
                        payment_status = $6,
                        last_payment_event = $7,
                        updated_at = NOW()
                    WHERE id = $1
                    "#,
                )
                .bind(order_id)
                .bind(&customer_id)
                .bind(&payment_method_id)
                .bind(&setup_intent_id)
                .bind(method_kind.map(|k| k.as_str()))
                .bind(PaymentStatus::CardOnFile.as_str())
                .bind(&event.event_type)
                .execute(&self.pool)
                .await?
                .rows_affected()
            }
            WebhookAction::PaymentSucceeded {
                order_id,
                payment_intent_id,
                amount_cents,
                currency,
                receipt_url,
            } => {
                let rows = sqlx::query(
                    r#"
                    UPDATE orders
                    SET stripe_payment_intent_id = $2,
                        payment_status = $3,
                        charged_amount_cents = $4,
                        charged_currency = COALESCE($5, charged_currency),
                        charged_at = $6,
                        receipt_url = COALESCE($7, receipt_url),
                        last_payment_event = $8,
                        last_payment_error = NULL,
                        updated_at = NOW()
                    WHERE id = $1
                    "#,
                )
                .bind(order_id)
                .bind(&payment_intent_id)
                .bind(PaymentStatus::Paid.as_str())
                .bind(amount_cents)
                .bind(&currency)
                .bind(event_timestamp)
                .bind(&receipt_url)
                .bind(&event.event_type)
                .execute(&self.pool)
                .await?
                .rows_affected();

                if rows > 0 {
                    self.flag_referral_award(order_id, &event.id).await?;
                }
                rows
            }
            WebhookAction::PaymentFailed {
                order_id,
                payment_intent_id,
                error_message,
            } => sqlx::query(
                r#"
                UPDATE orders
                SET stripe_payment_intent_id = $2,
                    payment_status = $3,
                    last_payment_error = $4,
                    last_payment_event = $5,
                    updated_at = NOW()
                WHERE id = $1
                "#,
            )
            .bind(order_id)
            .bind(&payment_intent_id)
            .bind(PaymentStatus::Failed.as_str())
            .bind(&error_message)
            .bind(&event.event_type)
            .execute(&self.pool)
            .await?
            .rows_affected(),
            WebhookAction::PaymentProcessing {
                order_id,
                payment_intent_id,
            } => sqlx::query(
                r#"
                UPDATE orders
                SET stripe_payment_intent_id = $2,
                    payment_status = $3,
                    last_payment_event = $4,
                    updated_at = NOW()
                WHERE id = $1
                "#,
            )
            .bind(order_id)
            .bind(&payment_intent_id)
            .bind(PaymentStatus::Processing.as_str())
            .bind(&event.event_type)
            .execute(&self.pool)
            .await?
            .rows_affected(),
            WebhookAction::Ignore { .. } => 0,
        };

        if updated == 0 {
            tracing::warn!(
                event_id = %event.id,
                order_id = %order_id,
                "Webhook references unknown order"
            );
            return Ok(WebhookOutcome::Ignored);
        }

        let event_type = match event.event_type.as_str() {
            "setup_intent.succeeded" => OrderEventType::SetupIntentSucceeded,
            "payment_intent.succeeded" => OrderEventType::PaymentSucceeded,
            "payment_intent.payment_failed" => OrderEventType::PaymentFailed,
            _ => OrderEventType::PaymentProcessing,
        };
        self.events
            .record(
                OrderEventBuilder::new(order_id, event_type)
                    .actor_type(ActorType::Stripe)
                    .stripe_event(event.id.clone())
                    .data(serde_json::json!({ "type": event.event_type })),
            )
            .await;

        tracing::info!(
            event_id = %event.id,
            event_type = %event.event_type,
            order_id = %order_id,
            "Webhook reconciled"
        );

        Ok(WebhookOutcome::Processed)
    }

    /// Set the award flag once for a paid referred order
    async fn flag_referral_award(&self, order_id: Uuid, stripe_event_id: &str) -> BillingResult<()> {
        let flagged = sqlx::query(
            r#"
            UPDATE orders
            SET referral_award_status = $2, updated_at = NOW()
            WHERE id = $1
              AND referral_code IS NOT NULL
              AND referral_award_status IS NULL
            "#,
        )
        .bind(order_id)
        .bind(REFERRAL_AWARD_PENDING)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if flagged > 0 {
            tracing::info!(order_id = %order_id, "Referral award flagged as pending");
            self.events
                .record(
                    OrderEventBuilder::new(order_id, OrderEventType::ReferralAwardFlagged)
                        .actor_type(ActorType::Stripe)
                        .stripe_event(stripe_event_id),
                )
                .await;
        }
        Ok(())
    }

    async fn lookup_method_kind(
        &self,
        order_id: Uuid,
        payment_method_id: &str,
    ) -> Option<PaymentMethodKind> {
        match self.gateway.payment_method_kind(payment_method_id).await {
            Ok(kind) => kind,
            Err(e) => {
                tracing::warn!(
                    order_id = %order_id,
                    error = %e,
                    "Could not retrieve payment method type"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SECRET: &str = "whsec_test_secret";

    fn sign(payload: &str, timestamp: i64, secret: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{}.{}", timestamp, payload).as_bytes());
        format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
    }

    fn event(event_type: &str, object: serde_json::Value) -> WebhookEvent {
        serde_json::from_value(json!({
            "id": "evt_1",
            "type": event_type,
            "created": 1_700_000_000,
            "data": { "object": object }
        }))
        .unwrap()
    }

    #[test]
    fn test_valid_signature() {
        let payload = r#"{"id":"evt_1"}"#;
        let header = sign(payload, 1_700_000_000, SECRET);
        assert!(verify_signature(payload, &header, SECRET, 1_700_000_100).is_ok());
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let header = sign(r#"{"id":"evt_1"}"#, 1_700_000_000, SECRET);
        assert!(matches!(
            verify_signature(r#"{"id":"evt_2"}"#, &header, SECRET, 1_700_000_000),
            Err(BillingError::WebhookSignatureInvalid)
        ));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let payload = "{}";
        let header = sign(payload, 1_700_000_000, "whsec_other");
        assert!(verify_signature(payload, &header, SECRET, 1_700_000_000).is_err());
    }

    #[test]
    fn test_stale_timestamp_rejected() {
        let payload = "{}";
        let header = sign(payload, 1_700_000_000, SECRET);
        assert!(verify_signature(payload, &header, SECRET, 1_700_000_301).is_err());
        assert!(verify_signature(payload, &header, SECRET, 1_700_000_300).is_ok());
    }

    #[test]
    fn test_malformed_header_rejected() {
        assert!(verify_signature("{}", "garbage", SECRET, 0).is_err());
        assert!(verify_signature("{}", "t=0", SECRET, 0).is_err());
        assert!(verify_signature("{}", "v1=abcd", SECRET, 0).is_err());
    }

    #[test]
    fn test_missing_secret_rejected() {
        let header = sign("{}", 0, SECRET);
        assert!(matches!(
            verify_signature("{}", &header, "", 0),
            Err(BillingError::Config(_))
        ));
    }

    #[test]
    fn test_any_v1_entry_may_match() {
        let payload = "{}";
        let good = sign(payload, 42, SECRET);
        let header = format!("t=42,v1={},{}", "00".repeat(32), good.split_once(',').unwrap().1);
        assert!(verify_signature(payload, &header, SECRET, 42).is_ok());
    }

    #[test]
    fn test_plan_setup_intent_succeeded() {
        let order_id = Uuid::new_v4();
        let action = plan_action(&event(
            "setup_intent.succeeded",
            json!({
                "id": "seti_1",
                "customer": "cus_1",
                "payment_method": { "id": "pm_1", "type": "sepa_debit" },
                "metadata": { "order_id": order_id.to_string() }
            }),
        ));

        assert_eq!(
            action,
            WebhookAction::SetupSucceeded {
                order_id,
                setup_intent_id: "seti_1".to_string(),
                customer_id: Some("cus_1".to_string()),
                payment_method_id: Some("pm_1".to_string()),
                method_kind: Some(PaymentMethodKind::SepaDebit),
            }
        );
    }

    #[test]
    fn test_plan_payment_succeeded() {
        let order_id = Uuid::new_v4();
        let action = plan_action(&event(
            "payment_intent.succeeded",
            json!({
                "id": "pi_1",
                "amount": 27400,
                "amount_received": 27400,
                "currency": "eur",
                "latest_charge": { "id": "ch_1", "receipt_url": "https://pay.stripe.com/r/1" },
                "metadata": { "order_id": order_id.to_string() }
            }),
        ));

        assert_eq!(
            action,
            WebhookAction::PaymentSucceeded {
                order_id,
                payment_intent_id: "pi_1".to_string(),
                amount_cents: 27400,
                currency: Some("eur".to_string()),
                receipt_url: Some("https://pay.stripe.com/r/1".to_string()),
            }
        );
    }

    #[test]
    fn test_plan_payment_succeeded_legacy_charges_list() {
        let order_id = Uuid::new_v4();
        let action = plan_action(&event(
            "payment_intent.succeeded",
            json!({
                "id": "pi_1",
                "amount": 27400,
                "latest_charge": "ch_1",
                "charges": { "data": [ { "receipt_url": "https://pay.stripe.com/r/legacy" } ] },
                "metadata": { "order_id": order_id.to_string() }
            }),
        ));

        match action {
            WebhookAction::PaymentSucceeded {
                amount_cents,
                receipt_url,
                ..
            } => {
                assert_eq!(amount_cents, 27400);
                assert_eq!(receipt_url.as_deref(), Some("https://pay.stripe.com/r/legacy"));
            }
            other => panic!("unexpected action {:?}", other),
        }
    }

    #[test]
    fn test_plan_payment_failed_carries_message() {
        let order_id = Uuid::new_v4();
        let action = plan_action(&event(
            "payment_intent.payment_failed",
            json!({
                "id": "pi_1",
                "last_payment_error": { "message": "Your card was declined.", "code": "card_declined" },
                "metadata": { "order_id": order_id.to_string() }
            }),
        ));

        assert_eq!(
            action,
            WebhookAction::PaymentFailed {
                order_id,
                payment_intent_id: "pi_1".to_string(),
                error_message: Some("Your card was declined.".to_string()),
            }
        );
    }

    #[test]
    fn test_plan_processing() {
        let order_id = Uuid::new_v4();
        let action = plan_action(&event(
            "payment_intent.processing",
            json!({ "id": "pi_1", "metadata": { "order_id": order_id.to_string() } }),
        ));
        assert_eq!(
            action,
            WebhookAction::PaymentProcessing {
                order_id,
                payment_intent_id: "pi_1".to_string()
            }
        );
    }

    #[test]
    fn test_plan_ignores_unknown_and_unkeyed_events() {
        assert!(matches!(
            plan_action(&event("invoice.paid", json!({ "id": "in_1" }))),
            WebhookAction::Ignore { .. }
        ));
        assert!(matches!(
            plan_action(&event("payment_intent.succeeded", json!({ "id": "pi_1" }))),
            WebhookAction::Ignore { .. }
        ));
        assert!(matches!(
            plan_action(&event(
                "payment_intent.succeeded",
                json!({ "id": "pi_1", "metadata": { "order_id": "not-a-uuid" } })
            )),
            WebhookAction::Ignore { .. }
        ));
    }

    #[test]
    fn test_redelivery_plans_identical_update() {
        let order_id = Uuid::new_v4();
        let object = json!({
            "id": "pi_1",
            "amount_received": 27400,
            "currency": "eur",
            "metadata": { "order_id": order_id.to_string() }
        });
        let first = plan_action(&event("payment_intent.succeeded", object.clone()));
        let second = plan_action(&event("payment_intent.succeeded", object));
        assert_eq!(first, second);
    }
}
