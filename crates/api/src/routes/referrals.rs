//! Referral code routes

use axum::{extract::State, Extension, Json};
use serde::Deserialize;
use sternblitz_billing::{RedemptionOutcome, ReferralValidation};
use sternblitz_shared::{non_blank, normalize_email};
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    error::{ApiError, ApiResult},
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct ValidateReferralRequest {
    #[serde(default)]
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct RedeemReferralRequest {
    pub order_id: Uuid,
    #[serde(default)]
    pub code: String,
    pub email: Option<String>,
}

/// Check a referral code without side effects
pub async fn validate_referral(
    State(state): State<AppState>,
    Json(req): Json<ValidateReferralRequest>,
) -> ApiResult<Json<ReferralValidation>> {
    let validation = state.referrals.validate(&req.code).await?;
    Ok(Json(validation))
}

/// Apply a referral code (or the default discount) to an order.
///
/// Only customers redeem codes; a logged-in internal user is refused.
pub async fn redeem_referral(
    State(state): State<AppState>,
    auth_user: Option<Extension<AuthUser>>,
    Json(req): Json<RedeemReferralRequest>,
) -> ApiResult<Json<RedemptionOutcome>> {
    if let Some(Extension(user)) = auth_user {
        tracing::warn!(
            user_id = %user.user_id,
            order_id = %req.order_id,
            "Internal user attempted referral redemption"
        );
        return Err(ApiError::Forbidden);
    }

    let email = non_blank(req.email.as_deref())
        .map(|e| normalize_email(&e))
        .transpose()?;

    let outcome = state
        .referrals
        .redeem(req.order_id, &req.code, email.as_deref())
        .await?;

    Ok(Json(outcome))
}
