use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::payment_gateway::{
        CardPayment, CreatedSubscription, GatewayCharge, GatewayError, GatewayPlanId,
        GatewaySubscriptionId, PaymentBinding, PaymentGatewayPort, SubscriptionDetail,
        SubscriptionItem, SubscriptionMetadata,
    },
    domain::entities::{gateway_mode::GatewayMode, gateway_provider::GatewayProvider},
};

/// Payment tokens starting with this prefix are declined.
pub const DECLINE_TOKEN_PREFIX: &str = "decline";
/// Payment tokens starting with this prefix leave the subscription awaiting payment.
pub const PENDING_TOKEN_PREFIX: &str = "pending";

#[derive(Debug, Clone)]
struct DummySubscription {
    plan_id: GatewayPlanId,
    status: String,
    custom_id: Option<String>,
    charges: Vec<GatewayCharge>,
}

/// Dummy gateway for local development.
///
/// Simulates plans, subscriptions and card binds in memory without any
/// network call. The payment token picks the outcome: `decline...` is
/// refused, `pending...` leaves the subscription waiting for a
/// notification, anything else activates it.
#[derive(Default)]
pub struct DummyGatewayClient {
    subscriptions: Mutex<HashMap<String, DummySubscription>>,
}

impl DummyGatewayClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn short_id(prefix: &str) -> String {
        format!("{}_{}", prefix, Uuid::new_v4().simple())
    }

    fn not_found(subscription_id: &GatewaySubscriptionId) -> AppError {
        AppError::Gateway(GatewayError {
            status: Some(404),
            code: Some("3500010".into()),
            description: Some(format!("Subscription {} not found", subscription_id)),
            body: None,
        })
    }

    fn lock(&self) -> AppResult<std::sync::MutexGuard<'_, HashMap<String, DummySubscription>>> {
        self.subscriptions
            .lock()
            .map_err(|_| AppError::Internal("Dummy gateway state poisoned".into()))
    }
}

#[async_trait]
impl PaymentGatewayPort for DummyGatewayClient {
    fn provider(&self) -> GatewayProvider {
        GatewayProvider::Dummy
    }

    fn mode(&self) -> GatewayMode {
        GatewayMode::Sandbox
    }

    async fn create_plan(
        &self,
        name: &str,
        interval_months: i32,
        repeats: Option<i32>,
    ) -> AppResult<GatewayPlanId> {
        let plan_id = GatewayPlanId::new(Self::short_id("dummy_plan"));
        tracing::debug!(
            plan_id = %plan_id,
            name,
            interval_months,
            repeats = ?repeats,
            "Dummy: created plan"
        );
        Ok(plan_id)
    }

    async fn create_subscription(
        &self,
        plan_id: &GatewayPlanId,
        items: &[SubscriptionItem],
        metadata: Option<&SubscriptionMetadata>,
    ) -> AppResult<CreatedSubscription> {
        let subscription_id = GatewaySubscriptionId::new(Self::short_id("dummy_sub"));
        let charge = GatewayCharge {
            charge_id: Self::short_id("dummy_charge"),
            status: "new".into(),
            total: items.iter().map(SubscriptionItem::total).sum::<Option<i64>>(),
        };

        self.lock()?.insert(
            subscription_id.as_str().to_string(),
            DummySubscription {
                plan_id: plan_id.clone(),
                status: "new".into(),
                custom_id: metadata.and_then(|m| m.custom_id.clone()),
                charges: vec![charge.clone()],
            },
        );

        tracing::debug!(
            subscription_id = %subscription_id,
            plan_id = %plan_id,
            "Dummy: created subscription"
        );

        Ok(CreatedSubscription {
            subscription_id,
            status: "new".into(),
            charges: vec![charge],
        })
    }

    async fn define_payment_method(
        &self,
        subscription_id: &GatewaySubscriptionId,
        payment: &CardPayment,
    ) -> AppResult<PaymentBinding> {
        let mut subscriptions = self.lock()?;
        let sub = subscriptions
            .get_mut(subscription_id.as_str())
            .ok_or_else(|| Self::not_found(subscription_id))?;

        if payment.payment_token.starts_with(DECLINE_TOKEN_PREFIX) {
            return Err(AppError::Gateway(GatewayError {
                status: Some(400),
                code: Some("3500034".into()),
                description: Some("Card declined".into()),
                body: None,
            }));
        }

        let (status, charge_status) = if payment.payment_token.starts_with(PENDING_TOKEN_PREFIX) {
            ("new_charge", "waiting")
        } else {
            ("active", "paid")
        };

        sub.status = status.to_string();
        let charge = match sub.charges.first_mut() {
            Some(charge) => {
                charge.status = charge_status.to_string();
                charge.clone()
            }
            None => {
                let charge = GatewayCharge {
                    charge_id: Self::short_id("dummy_charge"),
                    status: charge_status.to_string(),
                    total: None,
                };
                sub.charges.push(charge.clone());
                charge
            }
        };

        tracing::debug!(
            subscription_id = %subscription_id,
            status,
            "Dummy: bound payment method"
        );

        Ok(PaymentBinding {
            charge_id: Some(charge.charge_id),
            status: status.to_string(),
            charge_status: Some(charge.status),
        })
    }

    async fn cancel_subscription(
        &self,
        subscription_id: &GatewaySubscriptionId,
    ) -> AppResult<()> {
        let mut subscriptions = self.lock()?;
        let sub = subscriptions
            .get_mut(subscription_id.as_str())
            .ok_or_else(|| Self::not_found(subscription_id))?;

        if sub.status == "canceled" {
            return Err(AppError::Gateway(GatewayError {
                status: Some(400),
                code: Some("3500040".into()),
                description: Some("Subscription already canceled".into()),
                body: None,
            }));
        }
        sub.status = "canceled".into();
        tracing::debug!(subscription_id = %subscription_id, "Dummy: canceled subscription");
        Ok(())
    }

    async fn detail_subscription(
        &self,
        subscription_id: &GatewaySubscriptionId,
    ) -> AppResult<SubscriptionDetail> {
        let subscriptions = self.lock()?;
        let sub = subscriptions
            .get(subscription_id.as_str())
            .ok_or_else(|| Self::not_found(subscription_id))?;

        Ok(SubscriptionDetail {
            subscription_id: subscription_id.clone(),
            status: sub.status.clone(),
            plan_id: Some(sub.plan_id.clone()),
            custom_id: sub.custom_id.clone(),
            charges: sub.charges.clone(),
        })
    }
}
