//! Stripe routes: payment-method binding and webhook reconciliation

use std::collections::HashMap;

use axum::{extract::State, http::HeaderMap, Json};
use serde::{Deserialize, Serialize};
use sternblitz_billing::{BillingError, SetupIntentRequest, SetupIntentResponse, WebhookOutcome};
use sternblitz_shared::{non_blank, normalize_email};
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct CreateSetupIntentRequest {
    pub email: Option<String>,
    pub name: Option<String>,
    pub order_id: Option<Uuid>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub received: bool,
    pub outcome: &'static str,
}

/// Create a SetupIntent so the customer's card or SEPA mandate can be
/// charged later
pub async fn create_setup_intent(
    State(state): State<AppState>,
    Json(req): Json<CreateSetupIntentRequest>,
) -> ApiResult<Json<SetupIntentResponse>> {
    let billing = state.billing()?;

    let email = non_blank(req.email.as_deref())
        .map(|e| normalize_email(&e))
        .transpose()?;

    let response = billing
        .setup_intents
        .create_setup_intent(SetupIntentRequest {
            email,
            name: non_blank(req.name.as_deref()),
            order_id: req.order_id,
            metadata: req.metadata,
        })
        .await
        .map_err(|e| match e {
            BillingError::StripeApi(msg) => {
                tracing::error!(order_id = ?req.order_id, error = %msg, "SetupIntent creation failed");
                ApiError::Upstream(msg)
            }
            other => other.into(),
        })?;

    Ok(Json(response))
}

/// Stripe webhook endpoint. The raw body is needed for signature checks.
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> ApiResult<Json<WebhookResponse>> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| {
            tracing::warn!("Webhook without Stripe-Signature header");
            ApiError::BadRequest("Stripe-Signature fehlt".to_string())
        })?;

    let billing = state.billing()?;

    let event = billing
        .webhooks
        .construct_event(&body, signature)
        .map_err(|e| {
            tracing::warn!(error = %e, "Rejected webhook");
            ApiError::BadRequest("Ungültige Webhook-Signatur".to_string())
        })?;

    let event_id = event.id.clone();
    let outcome = billing.webhooks.handle_event(event).await.map_err(|e| {
        // Non-2xx makes Stripe retry the delivery
        tracing::error!(event_id = %event_id, error = %e, "Webhook processing failed");
        ApiError::from(e)
    })?;

    Ok(Json(WebhookResponse {
        received: true,
        outcome: match outcome {
            WebhookOutcome::Processed => "processed",
            WebhookOutcome::Duplicate => "duplicate",
            WebhookOutcome::Ignored => "ignored",
        },
    }))
}
