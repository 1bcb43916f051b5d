//! API error types and handling
//!
//! Every error renders as `{"error": "<message>", "code": "<CODE>"}`. Messages
//! are German because they are shown to sales staff and customers as-is.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use sternblitz_billing::BillingError;
use sternblitz_shared::{SternError, StatusError};

/// Application error type
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    // Authentication errors
    #[error("E-Mail oder Passwort ist falsch")]
    InvalidCredentials,
    #[error("E-Mail ist bereits registriert")]
    EmailAlreadyExists,
    #[error("Ungültiges oder abgelaufenes Token")]
    InvalidToken,
    #[error("Anmeldung erforderlich")]
    Unauthorized,
    #[error("Keine Berechtigung")]
    Forbidden,

    // Validation errors
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    BadRequest(String),

    // Resource errors
    #[error("Nicht gefunden")]
    NotFound,
    #[error("{0}")]
    Gone(String),
    #[error("{0}")]
    Conflict(String),

    // Upstream errors
    #[error("Zahlungsanbieter nicht erreichbar: {0}")]
    Upstream(String),
    #[error("Zahlungsfunktionen sind nicht aktiviert")]
    BillingDisabled,

    // Internal errors
    #[error("Database error: {0}")]
    Database(String),
    #[error("Interner Serverfehler")]
    Internal,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // Authentication
            ApiError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "INVALID_CREDENTIALS", self.to_string()),
            ApiError::EmailAlreadyExists => (StatusCode::CONFLICT, "EMAIL_EXISTS", self.to_string()),
            ApiError::InvalidToken => (StatusCode::UNAUTHORIZED, "INVALID_TOKEN", self.to_string()),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", self.to_string()),
            ApiError::Forbidden => (StatusCode::FORBIDDEN, "FORBIDDEN", self.to_string()),

            // Validation
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),

            // Resources
            ApiError::NotFound => (StatusCode::NOT_FOUND, "NOT_FOUND", self.to_string()),
            ApiError::Gone(msg) => (StatusCode::GONE, "GONE", msg.clone()),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),

            // Upstream
            ApiError::Upstream(_) => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", self.to_string()),
            ApiError::BillingDisabled => (StatusCode::SERVICE_UNAVAILABLE, "BILLING_DISABLED", self.to_string()),

            // Internal
            ApiError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR", "Datenbankfehler".to_string()),
            ApiError::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", self.to_string()),
        };

        let body = Json(json!({
            "error": message,
            "code": code,
        }));

        (status, body).into_response()
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::NotFound,
            sqlx::Error::Database(db_err) => {
                // PostgreSQL unique violation
                if db_err.code().as_deref() == Some("23505") {
                    return ApiError::Conflict("Eintrag existiert bereits".to_string());
                }
                // PostgreSQL foreign key violation
                if db_err.code().as_deref() == Some("23503") {
                    return ApiError::Validation(
                        "Referenzierter Datensatz existiert nicht".to_string(),
                    );
                }
                tracing::error!("Database error: {:?}", db_err);
                ApiError::Database(db_err.to_string())
            }
            _ => {
                tracing::error!("Database error: {:?}", err);
                ApiError::Database(err.to_string())
            }
        }
    }
}

impl From<BillingError> for ApiError {
    fn from(err: BillingError) -> Self {
        match err {
            // Card declined, invalid ids and the like: show Stripe's message
            BillingError::StripeApi(msg) => ApiError::BadRequest(msg),
            BillingError::WebhookSignatureInvalid | BillingError::WebhookPayloadInvalid(_) => {
                ApiError::BadRequest("Ungültige Webhook-Signatur".to_string())
            }
            BillingError::NotFound(_) => ApiError::NotFound,
            BillingError::InvalidInput(msg) => ApiError::Validation(msg),
            BillingError::PaymentMethodRequired => ApiError::BadRequest(
                "Für diesen Auftrag ist keine Zahlungsmethode hinterlegt".to_string(),
            ),
            BillingError::Database(msg) => {
                tracing::error!(error = %msg, "Billing database error");
                ApiError::Database(msg)
            }
            BillingError::Config(msg) | BillingError::Internal(msg) => {
                tracing::error!(error = %msg, "Billing error");
                ApiError::Internal
            }
        }
    }
}

impl From<StatusError> for ApiError {
    fn from(err: StatusError) -> Self {
        match err {
            StatusError::Empty => ApiError::Validation("Status fehlt".to_string()),
            StatusError::Unrecognized(input) => {
                ApiError::Validation(format!("Unbekannter Status: {}", input))
            }
        }
    }
}

impl From<SternError> for ApiError {
    fn from(err: SternError) -> Self {
        match err {
            SternError::Validation(msg) => ApiError::Validation(msg),
            SternError::Status(status) => status.into(),
        }
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn render(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_error_body_shape() {
        let (status, body) = render(ApiError::Gone("Link ist abgelaufen".to_string())).await;
        assert_eq!(status, StatusCode::GONE);
        assert_eq!(body, json!({ "error": "Link ist abgelaufen", "code": "GONE" }));
    }

    #[tokio::test]
    async fn test_internal_errors_hide_details() {
        let (status, body) =
            render(ApiError::Database("relation \"orders\" does not exist".to_string())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Datenbankfehler");

        let (_, body) = render(ApiError::Upstream("connection reset".to_string())).await;
        assert_eq!(body["code"], "UPSTREAM_ERROR");
    }

    #[tokio::test]
    async fn test_stripe_failure_is_bad_request_with_message() {
        let err: ApiError = BillingError::StripeApi("Your card was declined.".to_string()).into();
        let (status, body) = render(err).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Your card was declined.");
    }

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        assert!(matches!(
            ApiError::from(sqlx::Error::RowNotFound),
            ApiError::NotFound
        ));
    }
}
