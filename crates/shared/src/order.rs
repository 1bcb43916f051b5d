//! Order row as stored in Postgres

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::types::PaymentMethodKind;

/// Column list matching [`Order`], for `SELECT {ORDER_COLUMNS} FROM orders`
pub const ORDER_COLUMNS: &str = "id, name, company, email, phone, \
    billing_street, billing_zip, billing_city, billing_country, \
    base_price_cents, discount_cents, custom_discount_cents, total_cents, \
    referral_code, referral_channel, referral_referrer_order_id, referral_award_status, \
    stripe_customer_id, stripe_payment_method_id, stripe_setup_intent_id, \
    payment_method_type, stripe_payment_intent_id, payment_status, \
    last_payment_event, last_payment_error, charged_amount_cents, charged_currency, \
    charged_at, receipt_url, status, created_by, created_at, updated_at";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Order {
    pub id: Uuid,
    pub name: Option<String>,
    pub company: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub billing_street: Option<String>,
    pub billing_zip: Option<String>,
    pub billing_city: Option<String>,
    pub billing_country: Option<String>,

    pub base_price_cents: i64,
    pub discount_cents: i64,
    pub custom_discount_cents: i64,
    pub total_cents: i64,
    pub referral_code: Option<String>,
    pub referral_channel: String,
    pub referral_referrer_order_id: Option<Uuid>,
    pub referral_award_status: Option<String>,

    pub stripe_customer_id: Option<String>,
    pub stripe_payment_method_id: Option<String>,
    pub stripe_setup_intent_id: Option<String>,
    pub payment_method_type: Option<String>,
    pub stripe_payment_intent_id: Option<String>,
    pub payment_status: String,
    pub last_payment_event: Option<String>,
    pub last_payment_error: Option<String>,
    pub charged_amount_cents: Option<i64>,
    pub charged_currency: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub charged_at: Option<OffsetDateTime>,
    pub receipt_url: Option<String>,

    pub status: String,
    pub created_by: Option<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Order {
    pub fn payment_method_kind(&self) -> Option<PaymentMethodKind> {
        self.payment_method_type.as_deref()?.parse().ok()
    }
}
