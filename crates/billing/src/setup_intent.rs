//! Payment method binding via SetupIntent

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::customer::CustomerService;
use crate::error::{BillingError, BillingResult};
use crate::gateway::PaymentGateway;

/// Stripe accepts at most 50 metadata keys
const MAX_METADATA_KEYS: usize = 50;
const MAX_METADATA_KEY_LEN: usize = 40;
const MAX_METADATA_VALUE_LEN: usize = 500;

#[derive(Debug, Clone, Default)]
pub struct SetupIntentRequest {
    pub email: Option<String>,
    pub name: Option<String>,
    pub order_id: Option<Uuid>,
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SetupIntentResponse {
    pub client_secret: String,
    pub setup_intent_id: String,
    pub customer_id: Option<String>,
    pub customer_source: &'static str,
}

/// Creates SetupIntents so a payment method can be charged later off-session
#[derive(Clone)]
pub struct SetupIntentService {
    gateway: Arc<dyn PaymentGateway>,
    customers: CustomerService,
}

impl SetupIntentService {
    pub fn new(gateway: Arc<dyn PaymentGateway>, customers: CustomerService) -> Self {
        Self { gateway, customers }
    }

    pub async fn create_setup_intent(
        &self,
        request: SetupIntentRequest,
    ) -> BillingResult<SetupIntentResponse> {
        let order_id = requested_order_id(request.order_id, &request.metadata);
        let resolution = self
            .customers
            .resolve(order_id, request.email.as_deref(), request.name.as_deref())
            .await;

        let metadata = intent_metadata(request.metadata, order_id);
        let intent = self
            .gateway
            .create_setup_intent(resolution.customer_id(), metadata)
            .await?;

        let client_secret = intent.client_secret.ok_or_else(|| {
            BillingError::StripeApi("SetupIntent returned without client secret".to_string())
        })?;

        tracing::info!(
            order_id = ?order_id,
            setup_intent_id = %intent.id,
            customer_source = resolution.source(),
            "Created SetupIntent"
        );

        Ok(SetupIntentResponse {
            client_secret,
            setup_intent_id: intent.id,
            customer_id: resolution.customer_id().map(str::to_string),
            customer_source: resolution.source(),
        })
    }
}

/// Order the intent belongs to. The top-level field wins; otherwise a
/// `metadata.order_id` that parses as a UUID is used.
fn requested_order_id(
    order_id: Option<Uuid>,
    metadata: &HashMap<String, String>,
) -> Option<Uuid> {
    order_id.or_else(|| metadata.get("order_id")?.trim().parse().ok())
}

/// Caller metadata trimmed to Stripe's limits. `order_id` is rewritten from
/// [`requested_order_id`] and dropped when it is not a valid order id.
pub(crate) fn intent_metadata(
    metadata: HashMap<String, String>,
    order_id: Option<Uuid>,
) -> HashMap<String, String> {
    let order_id = requested_order_id(order_id, &metadata);
    let mut keys: Vec<String> = metadata
        .keys()
        .filter(|k| !k.is_empty() && k.len() <= MAX_METADATA_KEY_LEN && k.as_str() != "order_id")
        .cloned()
        .collect();
    keys.sort();
    keys.truncate(MAX_METADATA_KEYS - 1);

    let mut out: HashMap<String, String> = keys
        .into_iter()
        .filter_map(|k| {
            let value: String = metadata.get(&k)?.chars().take(MAX_METADATA_VALUE_LEN).collect();
            Some((k, value))
        })
        .collect();

    if let Some(order_id) = order_id {
        out.insert("order_id".to_string(), order_id.to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::fake::FakeGateway;
    use sqlx::postgres::PgPoolOptions;

    #[test]
    fn test_metadata_order_id_wins() {
        let order_id = Uuid::new_v4();
        let mut metadata = HashMap::new();
        metadata.insert("order_id".to_string(), "spoofed".to_string());
        metadata.insert("source".to_string(), "sign-form".to_string());

        let out = intent_metadata(metadata, Some(order_id));

        assert_eq!(out.get("order_id"), Some(&order_id.to_string()));
        assert_eq!(out.get("source"), Some(&"sign-form".to_string()));
    }

    #[test]
    fn test_metadata_order_id_kept_without_top_level_id() {
        let order_id = Uuid::new_v4();
        let mut metadata = HashMap::new();
        metadata.insert("order_id".to_string(), order_id.to_string());

        let out = intent_metadata(metadata, None);

        assert_eq!(out.get("order_id"), Some(&order_id.to_string()));
    }

    #[test]
    fn test_metadata_order_id_must_be_uuid() {
        let mut metadata = HashMap::new();
        metadata.insert("order_id".to_string(), "bestellung-17".to_string());

        let out = intent_metadata(metadata, None);

        assert!(!out.contains_key("order_id"));
    }

    #[test]
    fn test_metadata_limits() {
        let mut metadata = HashMap::new();
        for i in 0..80 {
            metadata.insert(format!("k{:02}", i), "x".repeat(600));
        }
        metadata.insert("k".repeat(41), "too long key".to_string());

        let out = intent_metadata(metadata, Some(Uuid::new_v4()));

        assert_eq!(out.len(), MAX_METADATA_KEYS);
        assert!(out.values().all(|v| v.len() <= MAX_METADATA_VALUE_LEN));
        assert!(!out.contains_key(&"k".repeat(41)));
    }

    #[tokio::test]
    async fn test_setup_intent_without_customer_when_unbound() {
        let gateway = Arc::new(FakeGateway {
            fail_customer_lookup: true,
            ..Default::default()
        });
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/sternblitz_test")
            .unwrap();
        let customers = CustomerService::new(gateway.clone(), pool);
        let service = SetupIntentService::new(gateway.clone(), customers);

        let response = service
            .create_setup_intent(SetupIntentRequest {
                email: Some("kunde@example.de".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(response.client_secret, "seti_test_secret");
        assert_eq!(response.customer_id, None);
        assert_eq!(response.customer_source, "unbound");

        let intents = gateway.setup_intents.lock().unwrap();
        assert_eq!(intents.len(), 1);
        assert_eq!(intents[0].0, None);
    }

    #[tokio::test]
    async fn test_setup_intent_carries_order_id_from_metadata() {
        let gateway = Arc::new(FakeGateway {
            fail_customer_lookup: true,
            ..Default::default()
        });
        // Stored-customer lookup fails fast and the intent is created unbound
        let pool = PgPoolOptions::new()
            .acquire_timeout(std::time::Duration::from_millis(200))
            .connect_lazy("postgres://sternblitz@127.0.0.1:1/unused")
            .unwrap();
        let customers = CustomerService::new(gateway.clone(), pool);
        let service = SetupIntentService::new(gateway.clone(), customers);
        let order_id = Uuid::new_v4();

        let mut metadata = HashMap::new();
        metadata.insert("order_id".to_string(), order_id.to_string());
        service
            .create_setup_intent(SetupIntentRequest {
                metadata,
                ..Default::default()
            })
            .await
            .unwrap();

        let intents = gateway.setup_intents.lock().unwrap();
        assert_eq!(intents[0].1.get("order_id"), Some(&order_id.to_string()));
    }
}
