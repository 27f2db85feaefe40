use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    app_error::AppResult,
    domain::entities::{gateway_mode::GatewayMode, gateway_provider::GatewayProvider},
};

// ============================================================================
// Port Types - Provider-agnostic gateway types
// ============================================================================

/// Identifier of a plan on the payment gateway
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GatewayPlanId(pub String);

impl GatewayPlanId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for GatewayPlanId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a subscription on the payment gateway
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GatewaySubscriptionId(pub String);

impl GatewaySubscriptionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for GatewaySubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One line item of a gateway subscription. `value` is in minor currency units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionItem {
    pub name: String,
    pub value: i64,
    pub amount: i64,
}

impl SubscriptionItem {
    /// `None` when `value * amount` overflows.
    pub fn total(&self) -> Option<i64> {
        self.value.checked_mul(self.amount)
    }
}

/// Optional correlation data attached to a gateway subscription
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_url: Option<String>,
}

impl SubscriptionMetadata {
    pub fn is_empty(&self) -> bool {
        self.custom_id.is_none() && self.notification_url.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingAddress {
    pub street: String,
    pub number: String,
    pub neighborhood: String,
    pub zipcode: String,
    pub city: String,
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub complement: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerIdentity {
    pub name: String,
    pub email: String,
    pub cpf: String,
    pub phone_number: String,
    /// Birth date, `YYYY-MM-DD`
    pub birth: String,
}

/// Credit-card payment data. The card itself is already tokenized client-side.
#[derive(Debug, Clone)]
pub struct CardPayment {
    pub payment_token: String,
    pub billing_address: BillingAddress,
    pub customer: CustomerIdentity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GatewayCharge {
    pub charge_id: String,
    pub status: String,
    pub total: Option<i64>,
}

/// Result of creating a subscription on the gateway
#[derive(Debug, Clone, Serialize)]
pub struct CreatedSubscription {
    pub subscription_id: GatewaySubscriptionId,
    pub status: String,
    pub charges: Vec<GatewayCharge>,
}

/// Result of binding a payment method to a gateway subscription
#[derive(Debug, Clone, Serialize)]
pub struct PaymentBinding {
    pub charge_id: Option<String>,
    /// Subscription status reported by the gateway after the bind
    pub status: String,
    pub charge_status: Option<String>,
}

impl PaymentBinding {
    /// Whether the gateway activated the subscription synchronously
    pub fn is_activated(&self) -> bool {
        self.status.eq_ignore_ascii_case("active")
    }
}

/// Subscription state as seen by the gateway
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionDetail {
    pub subscription_id: GatewaySubscriptionId,
    pub status: String,
    pub plan_id: Option<GatewayPlanId>,
    pub custom_id: Option<String>,
    pub charges: Vec<GatewayCharge>,
}

/// A non-success answer from the gateway (or a transport failure before one).
///
/// Carried verbatim to the caller so an operator can diagnose without logs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GatewayError {
    /// HTTP status, `None` for transport failures
    pub status: Option<u16>,
    /// Provider error code
    pub code: Option<String>,
    /// Provider error description
    pub description: Option<String>,
    /// Raw response body
    pub body: Option<String>,
}

impl GatewayError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            description: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn with_status(status: u16, description: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            description: Some(description.into()),
            ..Default::default()
        }
    }

    /// 400, 404 and 409 on a cancel mean the subscription is already gone
    /// or already canceled on the gateway side.
    pub fn is_benign_for_cancel(&self) -> bool {
        matches!(self.status, Some(400) | Some(404) | Some(409))
    }

    /// JSON view used in billing error responses and audit payloads
    pub fn details(&self) -> serde_json::Value {
        serde_json::json!({
            "status": self.status,
            "code": self.code,
            "description": self.description,
            "body": self.body,
        })
    }
}

impl std::fmt::Display for GatewayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.status, &self.code, &self.description) {
            (Some(status), Some(code), Some(desc)) => write!(f, "{} {}: {}", status, code, desc),
            (Some(status), None, Some(desc)) => write!(f, "{}: {}", status, desc),
            (Some(status), Some(code), None) => write!(f, "{} {}", status, code),
            (Some(status), None, None) => write!(f, "HTTP {}", status),
            (None, _, Some(desc)) => write!(f, "{}", desc),
            (None, _, None) => write!(f, "unknown gateway failure"),
        }
    }
}

impl std::error::Error for GatewayError {}

// ============================================================================
// Payment Gateway Port
// ============================================================================

/// Payment gateway port - the operations the billing flow consumes.
///
/// Implementations never retry; every failure is surfaced as
/// `AppError::Gateway` (or `AppError::Config` before any network call).
#[async_trait]
pub trait PaymentGatewayPort: Send + Sync {
    fn provider(&self) -> GatewayProvider;

    fn mode(&self) -> GatewayMode;

    /// Create a recurring plan. `interval_months` is the billing period,
    /// `repeats` the number of charges (`None` = until canceled).
    async fn create_plan(
        &self,
        name: &str,
        interval_months: i32,
        repeats: Option<i32>,
    ) -> AppResult<GatewayPlanId>;

    async fn create_subscription(
        &self,
        plan_id: &GatewayPlanId,
        items: &[SubscriptionItem],
        metadata: Option<&SubscriptionMetadata>,
    ) -> AppResult<CreatedSubscription>;

    /// Bind a tokenized credit card to the subscription, producing its first charge.
    async fn define_payment_method(
        &self,
        subscription_id: &GatewaySubscriptionId,
        payment: &CardPayment,
    ) -> AppResult<PaymentBinding>;

    async fn cancel_subscription(&self, subscription_id: &GatewaySubscriptionId)
    -> AppResult<()>;

    async fn detail_subscription(
        &self,
        subscription_id: &GatewaySubscriptionId,
    ) -> AppResult<SubscriptionDetail>;
}
