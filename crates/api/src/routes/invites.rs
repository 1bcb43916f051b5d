//! Team invite routes

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use sternblitz_shared::UserRole;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::{
    auth::{invite_state, AuthUser, InviteState},
    error::{ApiError, ApiResult},
    state::AppState,
};

const DEFAULT_EXPIRES_IN_DAYS: i64 = 7;
const MAX_EXPIRES_IN_DAYS: i64 = 90;

#[derive(Debug, Deserialize)]
pub struct CreateInviteRequest {
    pub team_id: Option<Uuid>,
    pub role: String,
    pub max_uses: Option<i32>,
    pub expires_in_days: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct CreateInviteResponse {
    pub id: Uuid,
    /// Raw token; shown exactly once
    pub token: String,
    pub team_id: Option<Uuid>,
    pub role: UserRole,
    pub max_uses: Option<i32>,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

#[derive(Debug, Deserialize)]
pub struct VerifyInviteQuery {
    #[serde(default)]
    pub token: String,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum VerifyInviteResponse {
    Valid {
        valid: bool,
        team_id: Option<Uuid>,
        role: String,
        #[serde(with = "time::serde::rfc3339")]
        expires_at: OffsetDateTime,
    },
    Invalid {
        valid: bool,
        reason: &'static str,
    },
}

/// Validated invite parameters
#[derive(Debug, PartialEq, Eq)]
struct InviteParams {
    role: UserRole,
    max_uses: Option<i32>,
    expires_in: Duration,
}

fn validate_create(req: &CreateInviteRequest) -> ApiResult<InviteParams> {
    let role: UserRole = req
        .role
        .parse()
        .map_err(|_| ApiError::Validation("Rolle muss admin oder sales sein".to_string()))?;

    if matches!(req.max_uses, Some(n) if n < 1) {
        return Err(ApiError::Validation(
            "max_uses muss mindestens 1 sein".to_string(),
        ));
    }

    let days = req.expires_in_days.unwrap_or(DEFAULT_EXPIRES_IN_DAYS);
    if !(1..=MAX_EXPIRES_IN_DAYS).contains(&days) {
        return Err(ApiError::Validation(format!(
            "expires_in_days muss zwischen 1 und {} liegen",
            MAX_EXPIRES_IN_DAYS
        )));
    }

    Ok(InviteParams {
        role,
        max_uses: req.max_uses,
        expires_in: Duration::days(days),
    })
}

/// Mint an invite (admin only)
pub async fn create_invite(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(req): Json<CreateInviteRequest>,
) -> ApiResult<(StatusCode, Json<CreateInviteResponse>)> {
    auth_user.require_admin()?;
    let params = validate_create(&req)?;

    let expires_at = OffsetDateTime::now_utc() + params.expires_in;
    let (token, invite) = state
        .invites
        .create(
            req.team_id,
            params.role,
            params.max_uses,
            expires_at,
            auth_user.user_id,
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateInviteResponse {
            id: invite.id,
            token,
            team_id: invite.team_id,
            role: params.role,
            max_uses: invite.max_uses,
            expires_at: invite.expires_at,
        }),
    ))
}

/// Check whether an invite token can still be used
pub async fn verify_invite(
    State(state): State<AppState>,
    Query(query): Query<VerifyInviteQuery>,
) -> ApiResult<Json<VerifyInviteResponse>> {
    let invite = if query.token.trim().is_empty() {
        None
    } else {
        state.invites.find(&query.token).await?
    };

    let response = match (invite_state(invite.as_ref(), OffsetDateTime::now_utc()), invite) {
        (InviteState::Valid, Some(invite)) => VerifyInviteResponse::Valid {
            valid: true,
            team_id: invite.team_id,
            role: invite.role,
            expires_at: invite.expires_at,
        },
        (invalid, _) => VerifyInviteResponse::Invalid {
            valid: false,
            reason: invalid.reason().unwrap_or("Invite not found"),
        },
    };

    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(role: &str, max_uses: Option<i32>, days: Option<i64>) -> CreateInviteRequest {
        CreateInviteRequest {
            team_id: None,
            role: role.to_string(),
            max_uses,
            expires_in_days: days,
        }
    }

    #[test]
    fn test_defaults() {
        let params = validate_create(&request("sales", None, None)).unwrap();
        assert_eq!(params.role, UserRole::Sales);
        assert_eq!(params.max_uses, None);
        assert_eq!(params.expires_in, Duration::days(7));
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(validate_create(&request("owner", None, None)).is_err());
        assert!(validate_create(&request("admin", Some(0), None)).is_err());
        assert!(validate_create(&request("admin", None, Some(0))).is_err());
        assert!(validate_create(&request("admin", None, Some(91))).is_err());
        assert!(validate_create(&request("admin", Some(1), Some(90))).is_ok());
    }

    #[test]
    fn test_invalid_response_shape() {
        let body = serde_json::to_value(VerifyInviteResponse::Invalid {
            valid: false,
            reason: "Invite limit reached",
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({ "valid": false, "reason": "Invite limit reached" })
        );
    }
}
