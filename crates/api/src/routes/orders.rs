//! Order routes

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sternblitz_billing::{ActorType, ChargeReceipt, OrderEvent, OrderEventBuilder, OrderEventType};
use sternblitz_shared::{
    compute_final, non_blank, normalize_email, normalize_status, Order, OrderStatus, ORDER_COLUMNS,
};
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    error::{ApiError, ApiResult},
    state::AppState,
};

#[derive(Debug, Default, Deserialize)]
pub struct CreateOrderRequest {
    pub name: Option<String>,
    pub company: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub billing_street: Option<String>,
    pub billing_zip: Option<String>,
    pub billing_city: Option<String>,
    pub billing_country: Option<String>,
    #[serde(default)]
    pub custom_discount_cents: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub order_id: Uuid,
    pub previous: String,
    pub status: OrderStatus,
}

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    pub limit: Option<i64>,
}

/// Create an order at the configured base price
pub async fn create_order(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(req): Json<CreateOrderRequest>,
) -> ApiResult<(StatusCode, Json<Order>)> {
    if req.custom_discount_cents < 0 {
        return Err(ApiError::Validation(
            "Individueller Rabatt darf nicht negativ sein".to_string(),
        ));
    }
    let email = non_blank(req.email.as_deref())
        .map(|e| normalize_email(&e))
        .transpose()?;

    let base_price_cents = state.config.order_base_price_cents;
    let total_cents = compute_final(base_price_cents, 0, req.custom_discount_cents);

    let order: Order = sqlx::query_as(&format!(
        r#"
        INSERT INTO orders (
            id, name, company, email, phone,
            billing_street, billing_zip, billing_city, billing_country,
            base_price_cents, custom_discount_cents, total_cents, created_by
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        RETURNING {ORDER_COLUMNS}
        "#
    ))
    .bind(Uuid::new_v4())
    .bind(non_blank(req.name.as_deref()))
    .bind(non_blank(req.company.as_deref()))
    .bind(email)
    .bind(non_blank(req.phone.as_deref()))
    .bind(non_blank(req.billing_street.as_deref()))
    .bind(non_blank(req.billing_zip.as_deref()))
    .bind(non_blank(req.billing_city.as_deref()))
    .bind(non_blank(req.billing_country.as_deref()))
    .bind(base_price_cents)
    .bind(req.custom_discount_cents)
    .bind(total_cents)
    .bind(auth_user.user_id)
    .fetch_one(&state.pool)
    .await?;

    tracing::info!(
        order_id = %order.id,
        created_by = %auth_user.user_id,
        total_cents = order.total_cents,
        "Order created"
    );

    state
        .order_events
        .record(
            OrderEventBuilder::new(order.id, OrderEventType::OrderCreated)
                .data(json!({
                    "base_price_cents": order.base_price_cents,
                    "custom_discount_cents": order.custom_discount_cents,
                    "total_cents": order.total_cents,
                }))
                .actor(auth_user.user_id, ActorType::User),
        )
        .await;

    Ok((StatusCode::CREATED, Json(order)))
}

/// Fetch one order
pub async fn get_order(
    State(state): State<AppState>,
    Extension(_auth_user): Extension<AuthUser>,
    Path(order_id): Path<Uuid>,
) -> ApiResult<Json<Order>> {
    let order: Order = sqlx::query_as(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"
    ))
    .bind(order_id)
    .fetch_optional(&state.pool)
    .await?
    .ok_or(ApiError::NotFound)?;

    Ok(Json(order))
}

/// Hard delete an order (admin only). Its event log goes with it.
pub async fn delete_order(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(order_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    auth_user.require_admin()?;

    let deleted: Option<(Uuid,)> = sqlx::query_as("DELETE FROM orders WHERE id = $1 RETURNING id")
        .bind(order_id)
        .fetch_optional(&state.pool)
        .await?;

    if deleted.is_none() {
        return Err(ApiError::NotFound);
    }

    tracing::info!(order_id = %order_id, deleted_by = %auth_user.user_id, "Order deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Charge the stored payment method off-session (admin only)
pub async fn charge_order(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(order_id): Path<Uuid>,
) -> ApiResult<Json<ChargeReceipt>> {
    auth_user.require_admin()?;
    let billing = state.billing()?;

    let receipt = billing.charges.charge(order_id, auth_user.user_id).await?;
    Ok(Json(receipt))
}

/// Force an order into a status (admin only). Legacy labels are accepted.
pub async fn update_status(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(order_id): Path<Uuid>,
    Json(req): Json<UpdateStatusRequest>,
) -> ApiResult<Json<StatusResponse>> {
    auth_user.require_admin()?;
    let status = normalize_status(&req.status)?;

    let previous: Option<(String,)> = sqlx::query_as(
        r#"
        UPDATE orders o
        SET status = $2, updated_at = NOW()
        FROM (SELECT id, status FROM orders WHERE id = $1 FOR UPDATE) prev
        WHERE o.id = prev.id
        RETURNING prev.status
        "#,
    )
    .bind(order_id)
    .bind(status.as_str())
    .fetch_optional(&state.pool)
    .await?;
    let (previous,) = previous.ok_or(ApiError::NotFound)?;

    tracing::info!(
        order_id = %order_id,
        from = %previous,
        to = %status,
        actor = %auth_user.user_id,
        "Order status overridden"
    );

    state
        .order_events
        .record(
            OrderEventBuilder::new(order_id, OrderEventType::StatusOverride)
                .data(json!({
                    "from": previous,
                    "to": status.as_str(),
                    "input": req.status,
                }))
                .actor(auth_user.user_id, ActorType::Admin),
        )
        .await;

    Ok(Json(StatusResponse {
        order_id,
        previous,
        status,
    }))
}

/// Audit trail of an order, newest first
pub async fn list_events(
    State(state): State<AppState>,
    Extension(_auth_user): Extension<AuthUser>,
    Path(order_id): Path<Uuid>,
    Query(query): Query<EventsQuery>,
) -> ApiResult<Json<Vec<OrderEvent>>> {
    let limit = query.limit.unwrap_or(100).clamp(1, 500);
    let events = state
        .order_events
        .get_events_for_order(order_id, limit)
        .await?;
    Ok(Json(events))
}
