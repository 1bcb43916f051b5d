//! Bearer-token authentication middleware

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use sternblitz_shared::UserRole;
use uuid::Uuid;

use super::jwt::{Claims, JwtError};
use crate::{error::ApiError, state::AppState};

/// Authenticated internal user, inserted as a request extension
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: String,
    pub role: UserRole,
    pub team_id: Option<Uuid>,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// Reject non-admin callers with 403
    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.is_admin() {
            Ok(())
        } else {
            tracing::warn!(user_id = %self.user_id, role = %self.role, "Admin action denied");
            Err(ApiError::Forbidden)
        }
    }
}

impl TryFrom<Claims> for AuthUser {
    type Error = ApiError;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        let role = claims.role.parse().map_err(|_| ApiError::InvalidToken)?;
        Ok(Self {
            user_id: claims.sub,
            email: claims.email,
            role,
            team_id: claims.team_id,
        })
    }
}

fn bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

fn authenticate(state: &AppState, token: &str) -> Result<AuthUser, ApiError> {
    let claims = state.jwt.validate_token(token).map_err(|e| match e {
        JwtError::Expired | JwtError::Invalid | JwtError::Validation(_) => ApiError::InvalidToken,
        JwtError::Encoding(_) => ApiError::Internal,
    })?;
    AuthUser::try_from(claims)
}

/// Require a valid session. Responds 401 otherwise.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(&request).ok_or(ApiError::Unauthorized)?;
    let auth_user = authenticate(&state, token)?;

    request.extensions_mut().insert(auth_user);
    Ok(next.run(request).await)
}

/// Attach the session when one is presented; anonymous and invalid tokens
/// pass through without an `AuthUser`.
pub async fn optional_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let auth_user = bearer_token(&request).and_then(|token| authenticate(&state, token).ok());

    if let Some(auth_user) = auth_user {
        request.extensions_mut().insert(auth_user);
    }
    next.run(request).await
}
