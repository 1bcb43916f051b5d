//! Payment gateway seam
//!
//! The binder, charge executor and webhook reconciler only talk to Stripe
//! through [`PaymentGateway`]. [`StripeGateway`] is the production
//! implementation; tests substitute an in-memory gateway.

use std::collections::HashMap;

use async_trait::async_trait;
use sternblitz_shared::PaymentMethodKind;
use stripe::{
    CreateCustomer, CreatePaymentIntent, CreateSetupIntent, CreateSetupIntentUsage, Customer,
    CustomerId, Expandable, ListCustomers, PaymentIntent, PaymentIntentOffSession,
    PaymentIntentStatus, PaymentMethod, PaymentMethodId, PaymentMethodType, SetupIntent,
};

use crate::client::StripeClient;
use crate::error::{BillingError, BillingResult};

/// SetupIntent returned to the browser for payment-method entry
#[derive(Debug, Clone)]
pub struct CreatedSetupIntent {
    pub id: String,
    pub client_secret: Option<String>,
}

/// Parameters for an off-session, auto-confirmed charge
#[derive(Debug, Clone)]
pub struct OffSessionCharge {
    pub customer_id: String,
    pub payment_method_id: String,
    pub amount_cents: i64,
    pub method_types: Vec<PaymentMethodKind>,
    pub metadata: HashMap<String, String>,
}

/// PaymentIntent status as far as order bookkeeping cares
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntentStatus {
    Succeeded,
    Processing,
    RequiresAction,
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresCapture,
    Canceled,
    Unknown,
}

impl IntentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Processing => "processing",
            Self::RequiresAction => "requires_action",
            Self::RequiresPaymentMethod => "requires_payment_method",
            Self::RequiresConfirmation => "requires_confirmation",
            Self::RequiresCapture => "requires_capture",
            Self::Canceled => "canceled",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for IntentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of creating a PaymentIntent
#[derive(Debug, Clone)]
pub struct ChargeOutcome {
    pub intent_id: String,
    pub status: IntentStatus,
    pub amount_cents: i64,
    pub currency: String,
    pub receipt_url: Option<String>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Currency used for charges, lower-case ISO code
    fn currency(&self) -> String;

    async fn find_customer_by_email(&self, email: &str) -> BillingResult<Option<String>>;

    async fn create_customer(
        &self,
        email: &str,
        name: Option<&str>,
        metadata: HashMap<String, String>,
    ) -> BillingResult<String>;

    /// SetupIntent accepting card and SEPA debit for off-session use
    async fn create_setup_intent(
        &self,
        customer_id: Option<&str>,
        metadata: HashMap<String, String>,
    ) -> BillingResult<CreatedSetupIntent>;

    /// Live type of a stored payment method; `None` for types we do not charge
    async fn payment_method_kind(
        &self,
        payment_method_id: &str,
    ) -> BillingResult<Option<PaymentMethodKind>>;

    async fn create_off_session_charge(
        &self,
        charge: OffSessionCharge,
    ) -> BillingResult<ChargeOutcome>;
}

/// [`PaymentGateway`] backed by the Stripe API
#[derive(Clone)]
pub struct StripeGateway {
    stripe: StripeClient,
}

impl StripeGateway {
    pub fn new(stripe: StripeClient) -> Self {
        Self { stripe }
    }
}

fn parse_customer_id(id: &str) -> BillingResult<CustomerId> {
    id.parse::<CustomerId>()
        .map_err(|e| BillingError::StripeApi(format!("Invalid customer ID: {}", e)))
}

fn parse_payment_method_id(id: &str) -> BillingResult<PaymentMethodId> {
    id.parse::<PaymentMethodId>()
        .map_err(|e| BillingError::StripeApi(format!("Invalid payment method ID: {}", e)))
}

fn intent_status(status: PaymentIntentStatus) -> IntentStatus {
    match status {
        PaymentIntentStatus::Succeeded => IntentStatus::Succeeded,
        PaymentIntentStatus::Processing => IntentStatus::Processing,
        PaymentIntentStatus::RequiresAction => IntentStatus::RequiresAction,
        PaymentIntentStatus::RequiresPaymentMethod => IntentStatus::RequiresPaymentMethod,
        PaymentIntentStatus::RequiresConfirmation => IntentStatus::RequiresConfirmation,
        PaymentIntentStatus::RequiresCapture => IntentStatus::RequiresCapture,
        PaymentIntentStatus::Canceled => IntentStatus::Canceled,
        #[allow(unreachable_patterns)]
        _ => IntentStatus::Unknown,
    }
}

fn setup_intent_params(
    customer_id: Option<&str>,
    metadata: HashMap<String, String>,
) -> BillingResult<CreateSetupIntent<'static>> {
    let mut params = CreateSetupIntent::new();
    params.customer = customer_id.map(parse_customer_id).transpose()?;
    params.payment_method_types = Some(vec![
        PaymentMethodKind::Card.as_str().to_string(),
        PaymentMethodKind::SepaDebit.as_str().to_string(),
    ]);
    params.metadata = Some(metadata);
    params.usage = Some(CreateSetupIntentUsage::OffSession);
    Ok(params)
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    fn currency(&self) -> String {
        self.stripe.config().currency.to_string()
    }

    async fn find_customer_by_email(&self, email: &str) -> BillingResult<Option<String>> {
        let mut params = ListCustomers::new();
        params.email = Some(email);
        params.limit = Some(1);

        let customers = Customer::list(self.stripe.inner(), &params).await?;
        Ok(customers
            .data
            .into_iter()
            .next()
            .map(|customer| customer.id.to_string()))
    }

    async fn create_customer(
        &self,
        email: &str,
        name: Option<&str>,
        metadata: HashMap<String, String>,
    ) -> BillingResult<String> {
        let params = CreateCustomer {
            email: Some(email),
            name,
            metadata: Some(metadata),
            ..Default::default()
        };

        let customer = Customer::create(self.stripe.inner(), params).await?;
        Ok(customer.id.to_string())
    }

    async fn create_setup_intent(
        &self,
        customer_id: Option<&str>,
        metadata: HashMap<String, String>,
    ) -> BillingResult<CreatedSetupIntent> {
        let params = setup_intent_params(customer_id, metadata)?;
        let intent = SetupIntent::create(self.stripe.inner(), params).await?;
        Ok(CreatedSetupIntent {
            id: intent.id.to_string(),
            client_secret: intent.client_secret,
        })
    }

    async fn payment_method_kind(
        &self,
        payment_method_id: &str,
    ) -> BillingResult<Option<PaymentMethodKind>> {
        let id = parse_payment_method_id(payment_method_id)?;
        let method = PaymentMethod::retrieve(self.stripe.inner(), &id, &[]).await?;

        Ok(match method.type_ {
            PaymentMethodType::SepaDebit => Some(PaymentMethodKind::SepaDebit),
            PaymentMethodType::Card => Some(PaymentMethodKind::Card),
            _ => None,
        })
    }

    async fn create_off_session_charge(
        &self,
        charge: OffSessionCharge,
    ) -> BillingResult<ChargeOutcome> {
        let mut params = CreatePaymentIntent::new(charge.amount_cents, self.stripe.config().currency);
        params.customer = Some(parse_customer_id(&charge.customer_id)?);
        params.payment_method = Some(parse_payment_method_id(&charge.payment_method_id)?);
        params.payment_method_types = Some(
            charge
                .method_types
                .iter()
                .map(|kind| kind.as_str().to_string())
                .collect(),
        );
        params.confirm = Some(true);
        params.off_session = Some(PaymentIntentOffSession::Exists(true));
        params.metadata = Some(charge.metadata);
        params.expand = &["latest_charge"];

        let intent = PaymentIntent::create(self.stripe.inner(), params).await?;

        let receipt_url = match &intent.latest_charge {
            Some(Expandable::Object(latest)) => latest.receipt_url.clone(),
            _ => None,
        };

        Ok(ChargeOutcome {
            intent_id: intent.id.to_string(),
            status: intent_status(intent.status),
            amount_cents: intent.amount,
            currency: intent.currency.to_string(),
            receipt_url,
        })
    }
}
