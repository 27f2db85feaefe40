use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::{
    app_error::AppResult,
    domain::entities::{
        subscription::SubscriptionStatus, transaction_status::TransactionStatus,
    },
};

use super::billing::{BillingUseCases, TenantEntitlement};

/// Gateway status that activates a subscription
const PAID_STATUS: &str = "paid";

/// A payment-status notification from the gateway
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayNotification {
    pub subscription_id: String,
    pub status: String,
    /// Provider-assigned event or notification token, when sent
    pub event_id: Option<String>,
}

impl GatewayNotification {
    /// Extract a notification from a raw JSON body.
    ///
    /// `subscription_id` may arrive as a number or a string. Returns `None`
    /// when either required field is missing.
    pub fn from_payload(payload: &serde_json::Value) -> Option<Self> {
        let subscription_id = match payload.get("subscription_id")? {
            serde_json::Value::String(s) if !s.trim().is_empty() => s.trim().to_string(),
            serde_json::Value::Number(n) => n.to_string(),
            _ => return None,
        };
        let status = payload.get("status")?.as_str()?.trim().to_lowercase();

        let event_id = ["event_id", "notification"]
            .iter()
            .filter_map(|key| payload.get(*key))
            .find_map(|v| match v {
                serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                serde_json::Value::Number(n) => Some(n.to_string()),
                _ => None,
            });

        Some(Self {
            subscription_id,
            status,
            event_id,
        })
    }

    /// Receipt key for the provider's event id. Notifications without one
    /// carry no identity across billing cycles and are never receipted.
    pub fn event_key(&self) -> Option<String> {
        self.event_id.as_ref().map(|id| format!("event:{}", id))
    }

    pub fn is_paid(&self) -> bool {
        self.status == PAID_STATUS
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookOutcome {
    Applied,
    Duplicate,
    Ignored,
    UnknownSubscription,
}

impl BillingUseCases {
    /// Apply a gateway notification. Only `paid` on a known, non-canceled
    /// subscription writes anything.
    #[instrument(skip(self, notification), fields(gateway_subscription_id = %notification.subscription_id, status = %notification.status))]
    pub async fn handle_gateway_notification(
        &self,
        notification: &GatewayNotification,
    ) -> AppResult<WebhookOutcome> {
        if !notification.is_paid() {
            debug!("Ignoring non-paid notification");
            return Ok(WebhookOutcome::Ignored);
        }

        let event_key = notification.event_key();
        if let Some(key) = event_key.as_deref()
            && self.receipt_repo.exists(key).await?
        {
            debug!(event_key = key, "Duplicate notification");
            return Ok(WebhookOutcome::Duplicate);
        }

        let Some(sub) = self
            .subscription_repo
            .get_by_gateway_id(&notification.subscription_id)
            .await?
        else {
            info!("Paid notification for unknown subscription");
            return Ok(WebhookOutcome::UnknownSubscription);
        };

        if sub.status == SubscriptionStatus::Canceled {
            info!(subscription_id = %sub.id, "Paid notification for canceled subscription");
            return Ok(WebhookOutcome::Ignored);
        }

        if event_key.is_none() && sub.status == SubscriptionStatus::Active {
            debug!(subscription_id = %sub.id, "Subscription already active");
            return Ok(WebhookOutcome::Duplicate);
        }

        let entitlement = match self.plan_repo.get_by_id(sub.plan_id).await? {
            Some(plan) => TenantEntitlement::for_plan(&plan),
            None => {
                let tenant = self.load_tenant(sub.tenant_id).await?;
                TenantEntitlement {
                    plan_slug: tenant.plan_slug.unwrap_or_default(),
                    seat_limit: None,
                }
            }
        };

        self.subscription_repo.activate(sub.id, &entitlement).await?;

        if let Some(charge_id) = sub.last_charge_id.as_deref() {
            self.transaction_repo
                .set_status_by_charge_id(charge_id, TransactionStatus::Paid)
                .await?;
        }

        if let Some(key) = event_key.as_deref() {
            self.receipt_repo.record(key).await?;
        }

        info!(
            subscription_id = %sub.id,
            tenant_id = %sub.tenant_id,
            plan_slug = %entitlement.plan_slug,
            "Subscription activated by gateway notification"
        );

        Ok(WebhookOutcome::Applied)
    }
}
