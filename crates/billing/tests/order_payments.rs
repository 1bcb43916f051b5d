//! Database-backed tests for referral redemption and webhook reconciliation.
//!
//! Run with `DATABASE_URL=postgres://... cargo test -p sternblitz-billing -- --ignored`

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use serde_json::json;
use sqlx::PgPool;
use sternblitz_billing::{
    BillingService, DiscountSource, FallbackReason, ReferralService, StripeConfig, WebhookEvent,
    WebhookOutcome,
};
use sternblitz_shared::{create_pool, run_migrations, PricingConfig};
use uuid::Uuid;

async fn setup() -> PgPool {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL required");
    let pool = create_pool(&url, 2).await.expect("Failed to create pool");
    run_migrations(&pool).await.expect("Failed to run migrations");
    pool
}

async fn insert_order(pool: &PgPool) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO orders (id, base_price_cents, total_cents) VALUES ($1, 29900, 29900)",
    )
    .bind(id)
    .execute(pool)
    .await
    .unwrap();
    id
}

fn billing(pool: &PgPool) -> BillingService {
    BillingService::new(
        StripeConfig {
            secret_key: "sk_test_unused".to_string(),
            webhook_secret: "whsec_test".to_string(),
            currency: stripe::Currency::EUR,
        },
        PricingConfig::default(),
        pool.clone(),
    )
}

#[tokio::test]
#[ignore] // Requires database
async fn test_exhausted_code_falls_back_to_default_discount() {
    let pool = setup().await;
    let order_id = insert_order(&pool).await;
    let code = format!("USED{}", &Uuid::new_v4().simple().to_string()[..8]).to_uppercase();

    sqlx::query(
        "INSERT INTO referral_codes (code, discount_cents, max_uses, uses_count) VALUES ($1, 5000, 1, 1)",
    )
    .bind(&code)
    .execute(&pool)
    .await
    .unwrap();

    let service = ReferralService::new(pool.clone(), PricingConfig::default());
    let outcome = service
        .redeem(order_id, &code.to_lowercase(), Some("kunde@example.de"))
        .await
        .unwrap();

    assert_eq!(outcome.discount_cents, 2_500);
    assert_eq!(outcome.total_cents, 27_400);
    assert_eq!(
        outcome.applied,
        DiscountSource::Fallback {
            reason: FallbackReason::Exhausted
        }
    );

    let (uses,): (i32,) = sqlx::query_as("SELECT uses_count FROM referral_codes WHERE code = $1")
        .bind(&code)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(uses, 1, "fallback must not consume a use");
}

#[tokio::test]
#[ignore] // Requires database
async fn test_valid_code_is_claimed_once() {
    let pool = setup().await;
    let first = insert_order(&pool).await;
    let second = insert_order(&pool).await;
    let code = format!("ONCE{}", &Uuid::new_v4().simple().to_string()[..8]).to_uppercase();

    sqlx::query(
        "INSERT INTO referral_codes (code, discount_cents, max_uses, uses_count) VALUES ($1, 5000, 1, 0)",
    )
    .bind(&code)
    .execute(&pool)
    .await
    .unwrap();

    let service = ReferralService::new(pool.clone(), PricingConfig::default());
    let a = service.redeem(first, &code, None).await.unwrap();
    let b = service.redeem(second, &code, None).await.unwrap();

    assert_eq!(a.applied, DiscountSource::Code);
    assert_eq!(a.total_cents, 24_900);
    assert!(matches!(b.applied, DiscountSource::Fallback { .. }));
}

#[tokio::test]
#[ignore] // Requires database
async fn test_payment_succeeded_redelivery_converges() {
    let pool = setup().await;
    let order_id = insert_order(&pool).await;
    sqlx::query("UPDATE orders SET referral_code = 'FRIEND' WHERE id = $1")
        .bind(order_id)
        .execute(&pool)
        .await
        .unwrap();

    let billing = billing(&pool);
    let event: WebhookEvent = serde_json::from_value(json!({
        "id": format!("evt_{}", Uuid::new_v4().simple()),
        "type": "payment_intent.succeeded",
        "created": 1_700_000_000,
        "data": { "object": {
            "id": "pi_redelivery",
            "amount_received": 27400,
            "currency": "eur",
            "metadata": { "order_id": order_id.to_string() }
        }}
    }))
    .unwrap();

    let first = billing.webhooks.handle_event(event.clone()).await.unwrap();
    let snapshot: (String, Option<i64>, Option<String>) = sqlx::query_as(
        "SELECT payment_status, charged_amount_cents, referral_award_status FROM orders WHERE id = $1",
    )
    .bind(order_id)
    .fetch_one(&pool)
    .await
    .unwrap();

    let second = billing.webhooks.handle_event(event).await.unwrap();
    let again: (String, Option<i64>, Option<String>) = sqlx::query_as(
        "SELECT payment_status, charged_amount_cents, referral_award_status FROM orders WHERE id = $1",
    )
    .bind(order_id)
    .fetch_one(&pool)
    .await
    .unwrap();

    assert_eq!(first, WebhookOutcome::Processed);
    assert_eq!(second, WebhookOutcome::Duplicate);
    assert_eq!(snapshot, again);
    assert_eq!(snapshot.0, "paid");
    assert_eq!(snapshot.1, Some(27_400));
    assert_eq!(snapshot.2.as_deref(), Some("pending"));
}

#[tokio::test]
#[ignore] // Requires database
async fn test_schema_rejects_out_of_range_values() {
    let pool = setup().await;
    let order_id = insert_order(&pool).await;

    let negative_code = sqlx::query(
        "INSERT INTO referral_codes (code, discount_cents) VALUES ($1, -500)",
    )
    .bind(format!("NEG{}", &Uuid::new_v4().simple().to_string()[..8]).to_uppercase())
    .execute(&pool)
    .await;
    assert!(negative_code.is_err(), "negative referral discount accepted");

    for (column, value) in [
        ("status", "neu"),
        ("payment_status", "refunded"),
        ("referral_channel", "partner"),
        ("payment_method_type", "paypal"),
    ] {
        let result = sqlx::query(&format!("UPDATE orders SET {} = $2 WHERE id = $1", column))
            .bind(order_id)
            .bind(value)
            .execute(&pool)
            .await;
        assert!(result.is_err(), "{} accepted {:?}", column, value);
    }
}
