//! Registration and login for internal users

use std::time::{Duration, Instant};

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use sternblitz_shared::{normalize_email, UserRole};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    auth::{
        hash_password, invite_state, validate_password_strength, verify_password, InviteManager,
        InviteState,
    },
    error::{ApiError, ApiResult},
    state::AppState,
};

/// Minimum login response time, so unknown emails and wrong passwords are
/// indistinguishable by timing
const MIN_LOGIN_RESPONSE_TIME: Duration = Duration::from_millis(300);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub invite_token: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub role: UserRole,
    pub team_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub user: UserResponse,
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    full_name: String,
    password_hash: String,
    role: String,
    team_id: Option<Uuid>,
}

fn issue_token(state: &AppState, user: UserResponse) -> ApiResult<AuthResponse> {
    let access_token = state
        .jwt
        .generate_access_token(user.id, &user.email, user.role.as_str(), user.team_id)
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to issue access token");
            ApiError::Internal
        })?;

    Ok(AuthResponse {
        access_token,
        token_type: "Bearer",
        expires_in: state.jwt.access_token_expiry_seconds(),
        user,
    })
}

/// Register a new internal user with an invite token
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    // Everything that does not need the database is checked first
    let email = normalize_email(&req.email)?;
    validate_password_strength(&req.password).map_err(|e| ApiError::Validation(e.to_string()))?;

    let full_name = req.full_name.trim();
    if full_name.is_empty() || full_name.chars().count() > 200 {
        return Err(ApiError::Validation(
            "Name muss zwischen 1 und 200 Zeichen lang sein".to_string(),
        ));
    }

    let invite = state.invites.find(&req.invite_token).await?;
    let now = OffsetDateTime::now_utc();
    let invite = match (invite_state(invite.as_ref(), now), invite) {
        (InviteState::Valid, Some(invite)) => invite,
        (invalid, _) => {
            let reason = invalid.reason().unwrap_or("Invite not found");
            tracing::info!(reason = %reason, "register: Invite rejected");
            return Err(ApiError::BadRequest(reason.to_string()));
        }
    };
    let role: UserRole = invite.role.parse().map_err(|e: String| {
        tracing::error!(invite_id = %invite.id, error = %e, "register: Invite carries unknown role");
        ApiError::Internal
    })?;

    let password_hash = hash_password(&req.password).map_err(|e| {
        tracing::error!(error = %e, "register: Password hashing failed");
        ApiError::Internal
    })?;

    let mut tx = state.pool.begin().await?;

    // Another registration may have taken the last use since the read above
    if !InviteManager::consume(&mut *tx, invite.id).await? {
        let reason = if invite.expires_at <= OffsetDateTime::now_utc() {
            InviteState::Expired
        } else {
            InviteState::Exhausted
        };
        return Err(ApiError::BadRequest(
            reason.reason().unwrap_or("Invite limit reached").to_string(),
        ));
    }

    let user_id = Uuid::new_v4();
    let inserted = sqlx::query(
        r#"
        INSERT INTO users (id, email, full_name, password_hash, role, team_id)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(user_id)
    .bind(&email)
    .bind(full_name)
    .bind(&password_hash)
    .bind(role.as_str())
    .bind(invite.team_id)
    .execute(&mut *tx)
    .await;

    match inserted {
        Ok(_) => {}
        Err(sqlx::Error::Database(db_err)) if db_err.code().as_deref() == Some("23505") => {
            // Dropping the transaction rolls back the invite use
            return Err(ApiError::EmailAlreadyExists);
        }
        Err(e) => return Err(e.into()),
    }

    tx.commit().await?;

    tracing::info!(
        user_id = %user_id,
        invite_id = %invite.id,
        role = %role,
        "register: User created"
    );

    tokio::spawn({
        let mail = state.mail.clone();
        let email = email.clone();
        let full_name = full_name.to_string();
        async move {
            if let Err(e) = mail.send_welcome_email(&email, &full_name).await {
                tracing::warn!(user_id = %user_id, error = %e, "register: Welcome email failed");
            }
        }
    });

    let response = issue_token(
        &state,
        UserResponse {
            id: user_id,
            email,
            full_name: full_name.to_string(),
            role,
            team_id: invite.team_id,
        },
    )?;

    Ok((StatusCode::CREATED, Json(response)))
}

/// Log in with email and password
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let start = Instant::now();
    let result = login_inner(&state, &req).await;

    let elapsed = start.elapsed();
    if elapsed < MIN_LOGIN_RESPONSE_TIME {
        tokio::time::sleep(MIN_LOGIN_RESPONSE_TIME - elapsed).await;
    }

    result
}

async fn login_inner(state: &AppState, req: &LoginRequest) -> ApiResult<Json<AuthResponse>> {
    let email = req.email.trim().to_lowercase();

    let user: UserRow = sqlx::query_as(
        r#"
        SELECT id, email, full_name, password_hash, role, team_id
        FROM users
        WHERE email = $1
        "#,
    )
    .bind(&email)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| {
        tracing::info!("login: Unknown email");
        ApiError::InvalidCredentials
    })?;

    let valid = verify_password(&req.password, &user.password_hash).map_err(|e| {
        tracing::error!(user_id = %user.id, error = %e, "login: Stored hash unreadable");
        ApiError::Internal
    })?;
    if !valid {
        tracing::info!(user_id = %user.id, "login: Wrong password");
        return Err(ApiError::InvalidCredentials);
    }

    let role: UserRole = user.role.parse().map_err(|e: String| {
        tracing::error!(user_id = %user.id, error = %e, "login: Unknown role");
        ApiError::Internal
    })?;

    if let Err(e) = sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = $1")
        .bind(user.id)
        .execute(&state.pool)
        .await
    {
        tracing::warn!(user_id = %user.id, error = %e, "login: Failed to record login time");
    }

    tracing::info!(user_id = %user.id, role = %role, "login: Success");

    let response = issue_token(
        state,
        UserResponse {
            id: user.id,
            email: user.email,
            full_name: user.full_name,
            role,
            team_id: user.team_id,
        },
    )?;

    Ok(Json(response))
}
