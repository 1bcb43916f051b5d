//! Sign links: single-use customer links that prefill the order form

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::{
    auth::{generate_token, AuthUser},
    error::{ApiError, ApiResult},
    state::AppState,
};

const DEFAULT_EXPIRES_IN_HOURS: i64 = 72;
const MAX_EXPIRES_IN_HOURS: i64 = 24 * 30;

/// Payload keys a sign link may carry
const ALLOWED_PAYLOAD_KEYS: &[&str] = &[
    "name",
    "company",
    "email",
    "phone",
    "billing_street",
    "billing_zip",
    "billing_city",
    "billing_country",
    "google_profile",
    "review_count",
    "notes",
];

#[derive(Debug, Deserialize)]
pub struct CreateSignLinkRequest {
    #[serde(default)]
    pub payload: Map<String, Value>,
    pub expires_in_hours: Option<i64>,
    pub org_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct CreateSignLinkResponse {
    pub token: String,
    pub url: String,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
    pub payload: Map<String, Value>,
}

#[derive(Debug, Serialize)]
pub struct SignLinkPayloadResponse {
    pub payload: Value,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

#[derive(Debug, Serialize)]
pub struct ConsumeSignLinkResponse {
    pub consumed: bool,
    pub payload: Value,
}

#[derive(sqlx::FromRow)]
struct SignLinkRow {
    payload: Value,
    expires_at: OffsetDateTime,
    used_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkState {
    Usable,
    Used,
    Expired,
}

/// A used link reports as used even after it has also expired
fn link_state(
    used_at: Option<OffsetDateTime>,
    expires_at: OffsetDateTime,
    now: OffsetDateTime,
) -> LinkState {
    if used_at.is_some() {
        LinkState::Used
    } else if expires_at <= now {
        LinkState::Expired
    } else {
        LinkState::Usable
    }
}

fn ensure_usable(row: &SignLinkRow) -> ApiResult<()> {
    match link_state(row.used_at, row.expires_at, OffsetDateTime::now_utc()) {
        LinkState::Usable => Ok(()),
        LinkState::Used => Err(ApiError::Gone("Link wurde bereits verwendet".to_string())),
        LinkState::Expired => Err(ApiError::Gone("Link ist abgelaufen".to_string())),
    }
}

fn filter_payload(payload: Map<String, Value>) -> Map<String, Value> {
    payload
        .into_iter()
        .filter(|(key, _)| ALLOWED_PAYLOAD_KEYS.contains(&key.as_str()))
        .collect()
}

async fn find_link(state: &AppState, token: &str) -> ApiResult<SignLinkRow> {
    sqlx::query_as("SELECT payload, expires_at, used_at FROM sign_links WHERE token = $1")
        .bind(token)
        .fetch_optional(&state.pool)
        .await?
        .ok_or(ApiError::NotFound)
}

/// Create a sign link for a prospect
pub async fn create_sign_link(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(req): Json<CreateSignLinkRequest>,
) -> ApiResult<(StatusCode, Json<CreateSignLinkResponse>)> {
    let hours = req.expires_in_hours.unwrap_or(DEFAULT_EXPIRES_IN_HOURS);
    if !(1..=MAX_EXPIRES_IN_HOURS).contains(&hours) {
        return Err(ApiError::Validation(format!(
            "expires_in_hours muss zwischen 1 und {} liegen",
            MAX_EXPIRES_IN_HOURS
        )));
    }

    let payload = filter_payload(req.payload);
    let token = generate_token();
    let expires_at = OffsetDateTime::now_utc() + Duration::hours(hours);

    sqlx::query(
        r#"
        INSERT INTO sign_links (id, token, payload, created_by, org_id, team_id, expires_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&token)
    .bind(Value::Object(payload.clone()))
    .bind(auth_user.user_id)
    .bind(req.org_id)
    .bind(auth_user.team_id)
    .bind(expires_at)
    .execute(&state.pool)
    .await?;

    tracing::info!(created_by = %auth_user.user_id, expires_at = %expires_at, "Sign link created");

    let url = format!("{}/sign/{}", state.config.public_url.trim_end_matches('/'), token);
    Ok((
        StatusCode::CREATED,
        Json(CreateSignLinkResponse {
            token,
            url,
            expires_at,
            payload,
        }),
    ))
}

/// Return the prefill payload of a usable link
pub async fn get_sign_link(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> ApiResult<Json<SignLinkPayloadResponse>> {
    let row = find_link(&state, &token).await?;
    ensure_usable(&row)?;

    Ok(Json(SignLinkPayloadResponse {
        payload: row.payload,
        expires_at: row.expires_at,
    }))
}

/// Mark a link as used. Exactly one caller wins.
pub async fn consume_sign_link(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> ApiResult<Json<ConsumeSignLinkResponse>> {
    let consumed: Option<(Value,)> = sqlx::query_as(
        r#"
        UPDATE sign_links
        SET used_at = NOW()
        WHERE token = $1 AND used_at IS NULL AND expires_at > NOW()
        RETURNING payload
        "#,
    )
    .bind(&token)
    .fetch_optional(&state.pool)
    .await?;

    match consumed {
        Some((payload,)) => {
            tracing::info!("Sign link consumed");
            Ok(Json(ConsumeSignLinkResponse {
                consumed: true,
                payload,
            }))
        }
        None => {
            // Explain why: unknown, used or expired
            let row = find_link(&state, &token).await?;
            ensure_usable(&row)?;
            Err(ApiError::Conflict("Link konnte nicht verwendet werden".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_link_state() {
        let now = OffsetDateTime::now_utc();
        let later = now + Duration::hours(1);
        let earlier = now - Duration::hours(1);

        assert_eq!(link_state(None, later, now), LinkState::Usable);
        assert_eq!(link_state(None, earlier, now), LinkState::Expired);
        assert_eq!(link_state(Some(earlier), later, now), LinkState::Used);
        assert_eq!(link_state(Some(earlier), earlier, now), LinkState::Used);
    }

    #[test]
    fn test_used_link_is_gone() {
        let row = SignLinkRow {
            payload: json!({}),
            expires_at: OffsetDateTime::now_utc() + Duration::hours(72),
            used_at: Some(OffsetDateTime::now_utc()),
        };
        match ensure_usable(&row) {
            Err(ApiError::Gone(msg)) => assert_eq!(msg, "Link wurde bereits verwendet"),
            other => panic!("expected Gone, got {:?}", other),
        }
    }

    #[test]
    fn test_payload_allow_list() {
        let payload = json!({
            "name": "Erika Muster",
            "google_profile": "https://g.page/r/abc",
            "review_count": 12,
            "stripe_customer_id": "cus_injected",
            "total_cents": 1
        });
        let Value::Object(map) = payload else {
            panic!("object expected")
        };

        let filtered = filter_payload(map);
        assert_eq!(filtered.len(), 3);
        assert!(!filtered.contains_key("stripe_customer_id"));
        assert!(!filtered.contains_key("total_cents"));
    }
}
