//! Stripe customer resolution for orders

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::BillingResult;
use crate::gateway::PaymentGateway;

/// Where the customer for a SetupIntent came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "source", content = "customer_id", rename_all = "snake_case")]
pub enum CustomerResolution {
    /// Customer id already stored on the order
    Stored(String),
    /// Existing Stripe customer with the same email
    MatchedByEmail(String),
    /// Newly created Stripe customer
    Created(String),
    /// No customer; the SetupIntent is created without one
    Unbound,
}

impl CustomerResolution {
    pub fn customer_id(&self) -> Option<&str> {
        match self {
            Self::Stored(id) | Self::MatchedByEmail(id) | Self::Created(id) => Some(id),
            Self::Unbound => None,
        }
    }

    pub fn source(&self) -> &'static str {
        match self {
            Self::Stored(_) => "stored",
            Self::MatchedByEmail(_) => "matched_by_email",
            Self::Created(_) => "created",
            Self::Unbound => "unbound",
        }
    }
}

/// Customer service for resolving Stripe customers of orders
#[derive(Clone)]
pub struct CustomerService {
    gateway: Arc<dyn PaymentGateway>,
    pool: PgPool,
}

impl CustomerService {
    pub fn new(gateway: Arc<dyn PaymentGateway>, pool: PgPool) -> Self {
        Self { gateway, pool }
    }

    /// Resolve a customer by priority: stored on the order, matched by email,
    /// newly created. Failures are logged and yield [`CustomerResolution::Unbound`].
    pub async fn resolve(
        &self,
        order_id: Option<Uuid>,
        email: Option<&str>,
        name: Option<&str>,
    ) -> CustomerResolution {
        match self.try_resolve(order_id, email, name).await {
            Ok(resolution) => resolution,
            Err(e) => {
                tracing::warn!(
                    order_id = ?order_id,
                    error = %e,
                    "Customer resolution failed, continuing without customer"
                );
                CustomerResolution::Unbound
            }
        }
    }

    async fn try_resolve(
        &self,
        order_id: Option<Uuid>,
        email: Option<&str>,
        name: Option<&str>,
    ) -> BillingResult<CustomerResolution> {
        if let Some(order_id) = order_id {
            if let Some(customer_id) = self.stored_customer_id(order_id).await? {
                return Ok(CustomerResolution::Stored(customer_id));
            }
        }

        let Some(email) = email.map(str::trim).filter(|e| !e.is_empty()) else {
            return Ok(CustomerResolution::Unbound);
        };

        if let Some(customer_id) = self.gateway.find_customer_by_email(email).await? {
            return Ok(CustomerResolution::MatchedByEmail(customer_id));
        }

        let mut metadata = HashMap::new();
        metadata.insert("platform".to_string(), "sternblitz".to_string());
        if let Some(order_id) = order_id {
            metadata.insert("order_id".to_string(), order_id.to_string());
        }

        let customer_id = self.gateway.create_customer(email, name, metadata).await?;

        tracing::info!(
            order_id = ?order_id,
            customer_id = %customer_id,
            "Created Stripe customer"
        );

        if let Some(order_id) = order_id {
            if let Err(e) = self.store_customer_id(order_id, &customer_id).await {
                tracing::warn!(
                    order_id = %order_id,
                    customer_id = %customer_id,
                    error = %e,
                    "Failed to persist new Stripe customer on order"
                );
            }
        }

        Ok(CustomerResolution::Created(customer_id))
    }

    async fn stored_customer_id(&self, order_id: Uuid) -> BillingResult<Option<String>> {
        let row: Option<(Option<String>,)> =
            sqlx::query_as("SELECT stripe_customer_id FROM orders WHERE id = $1")
                .bind(order_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row
            .and_then(|(id,)| id)
            .filter(|id| !id.trim().is_empty()))
    }

    async fn store_customer_id(&self, order_id: Uuid, customer_id: &str) -> BillingResult<()> {
        sqlx::query(
            "UPDATE orders SET stripe_customer_id = $1, updated_at = NOW() WHERE id = $2",
        )
        .bind(customer_id)
        .bind(order_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::fake::FakeGateway;
    use sqlx::postgres::PgPoolOptions;

    fn lazy_pool() -> PgPool {
        PgPoolOptions::new()
            .connect_lazy("postgres://localhost/sternblitz_test")
            .unwrap()
    }

    #[tokio::test]
    async fn test_matches_existing_customer_by_email() {
        let gateway = FakeGateway::default();
        gateway
            .customers_by_email
            .lock()
            .unwrap()
            .insert("kunde@example.de".to_string(), "cus_existing".to_string());
        let gateway = Arc::new(gateway);
        let service = CustomerService::new(gateway.clone(), lazy_pool());

        let resolution = service
            .resolve(None, Some("kunde@example.de"), Some("Kunde"))
            .await;

        assert_eq!(
            resolution,
            CustomerResolution::MatchedByEmail("cus_existing".to_string())
        );
        assert!(gateway.created_customers.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_creates_customer_when_no_match() {
        let gateway = Arc::new(FakeGateway::default());
        let service = CustomerService::new(gateway.clone(), lazy_pool());

        let resolution = service.resolve(None, Some("neu@example.de"), None).await;

        assert_eq!(resolution.source(), "created");
        assert_eq!(gateway.created_customers.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_lookup_failure_is_unbound() {
        let gateway = Arc::new(FakeGateway {
            fail_customer_lookup: true,
            ..Default::default()
        });
        let service = CustomerService::new(gateway, lazy_pool());

        let resolution = service.resolve(None, Some("kunde@example.de"), None).await;

        assert_eq!(resolution, CustomerResolution::Unbound);
        assert_eq!(resolution.customer_id(), None);
    }

    #[tokio::test]
    async fn test_missing_email_is_unbound() {
        let service = CustomerService::new(Arc::new(FakeGateway::default()), lazy_pool());

        assert_eq!(service.resolve(None, None, None).await, CustomerResolution::Unbound);
        assert_eq!(
            service.resolve(None, Some("  "), None).await,
            CustomerResolution::Unbound
        );
    }

    #[test]
    fn test_resolution_serializes_tagged() {
        let json = serde_json::to_value(CustomerResolution::Stored("cus_1".to_string())).unwrap();
        assert_eq!(json["source"], "stored");
        assert_eq!(json["customer_id"], "cus_1");
    }
}
