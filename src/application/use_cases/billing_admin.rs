use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::payment_gateway::GatewaySubscriptionId,
    domain::entities::subscription::SubscriptionStatus,
};

use super::billing::{
    BillingUseCases, SubscriptionProfile, TenantEntitlement, TenantProfile, TransactionProfile,
};

/// How many transactions the overview shows per tenant
pub const RECENT_TRANSACTIONS_LIMIT: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminBillingAction {
    /// Re-read the subscription from the gateway
    Refresh,
    Cancel,
    /// Make this the tenant's current subscription
    MarkActual,
}

impl AdminBillingAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdminBillingAction::Refresh => "refresh",
            AdminBillingAction::Cancel => "cancel",
            AdminBillingAction::MarkActual => "mark_actual",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionOverview {
    #[serde(flatten)]
    pub subscription: SubscriptionProfile,
    pub plan_slug: Option<String>,
    pub is_current: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct TenantBillingOverview {
    pub tenant: TenantProfile,
    pub subscriptions: Vec<SubscriptionOverview>,
    pub recent_transactions: Vec<TransactionProfile>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdminActionResult {
    pub action: AdminBillingAction,
    pub subscription: SubscriptionProfile,
    /// Status reported by the gateway (refresh only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway_status: Option<String>,
    pub message: String,
}

impl BillingUseCases {
    /// All tenants with their subscriptions and most recent transactions.
    pub async fn billing_overview(&self) -> AppResult<Vec<TenantBillingOverview>> {
        let tenants = self.tenant_repo.list_all().await?;
        let mut overview = Vec::with_capacity(tenants.len());

        for tenant in tenants {
            let subs = self.subscription_repo.list_by_tenant(tenant.id).await?;
            let mut subscriptions = Vec::with_capacity(subs.len());
            for sub in subs {
                let plan_slug = self.plan_repo.get_by_id(sub.plan_id).await?.map(|p| p.slug);
                subscriptions.push(SubscriptionOverview {
                    is_current: tenant.current_subscription_id == Some(sub.id),
                    plan_slug,
                    subscription: sub,
                });
            }
            let recent_transactions = self
                .transaction_repo
                .list_recent_by_tenant(tenant.id, RECENT_TRANSACTIONS_LIMIT)
                .await?;

            overview.push(TenantBillingOverview {
                tenant,
                subscriptions,
                recent_transactions,
            });
        }

        Ok(overview)
    }

    #[instrument(skip(self), fields(action = action.as_str()))]
    pub async fn admin_billing_action(
        &self,
        action: AdminBillingAction,
        subscription_id: Uuid,
    ) -> AppResult<AdminActionResult> {
        let sub = self
            .subscription_repo
            .get_by_id(subscription_id)
            .await?
            .ok_or(AppError::NotFound)?;

        let result = match action {
            AdminBillingAction::Refresh => self.admin_refresh(sub).await?,
            AdminBillingAction::Cancel => self.admin_cancel(sub).await?,
            AdminBillingAction::MarkActual => self.admin_mark_actual(sub).await?,
        };

        self.audit(
            "admin_billing_action",
            serde_json::json!({
                "action": action,
                "subscription_id": subscription_id,
                "status": result.subscription.status,
                "gateway_status": result.gateway_status,
            }),
        )
        .await;

        info!(subscription_id = %subscription_id, status = %result.subscription.status, "Admin billing action applied");
        Ok(result)
    }

    async fn admin_refresh(&self, sub: SubscriptionProfile) -> AppResult<AdminActionResult> {
        let gateway_id = sub
            .gateway_subscription_id
            .clone()
            .ok_or_else(|| AppError::InvalidInput("Subscription has no gateway id".into()))?;

        let detail = self
            .gateway
            .detail_subscription(&GatewaySubscriptionId::new(&gateway_id))
            .await?;
        let mapped = SubscriptionStatus::from_gateway(&detail.status);

        let (subscription, message) = if sub.status.is_terminal() {
            (sub, "Subscription is canceled locally; left unchanged".to_string())
        } else if mapped == sub.status {
            (sub, format!("Already {}", mapped))
        } else {
            let updated = match mapped {
                SubscriptionStatus::Active => {
                    let entitlement = match self.plan_repo.get_by_id(sub.plan_id).await? {
                        Some(plan) => TenantEntitlement::for_plan(&plan),
                        None => return Err(AppError::Internal("Subscription plan not found".into())),
                    };
                    self.subscription_repo.activate(sub.id, &entitlement).await?
                }
                SubscriptionStatus::Canceled => self.mark_canceled(&sub).await?,
                other => self.subscription_repo.set_status(sub.id, other).await?,
            };
            let message = format!("{} -> {}", sub.status, updated.status);
            (updated, message)
        };

        Ok(AdminActionResult {
            action: AdminBillingAction::Refresh,
            subscription,
            gateway_status: Some(detail.status),
            message,
        })
    }

    async fn admin_cancel(&self, sub: SubscriptionProfile) -> AppResult<AdminActionResult> {
        if sub.status.is_terminal() {
            return Ok(AdminActionResult {
                action: AdminBillingAction::Cancel,
                subscription: sub,
                gateway_status: None,
                message: "Already canceled".into(),
            });
        }

        let mut message = "Canceled".to_string();
        if let Some(gateway_id) = sub.gateway_subscription_id.as_deref() {
            match self
                .gateway
                .cancel_subscription(&GatewaySubscriptionId::new(gateway_id))
                .await
            {
                Ok(()) => {}
                Err(AppError::Gateway(ref g)) if g.is_benign_for_cancel() => {
                    message = format!("Canceled locally; gateway answered {}", g);
                }
                Err(e) => return Err(e),
            }
        }

        let subscription = self.mark_canceled(&sub).await?;
        Ok(AdminActionResult {
            action: AdminBillingAction::Cancel,
            subscription,
            gateway_status: None,
            message,
        })
    }

    async fn admin_mark_actual(&self, sub: SubscriptionProfile) -> AppResult<AdminActionResult> {
        if sub.status.is_terminal() {
            return Err(AppError::InvalidInput(
                "A canceled subscription cannot be made current".into(),
            ));
        }

        self.tenant_repo
            .set_current_subscription(sub.tenant_id, Some(sub.id))
            .await?;

        Ok(AdminActionResult {
            action: AdminBillingAction::MarkActual,
            subscription: sub,
            gateway_status: None,
            message: "Marked as current".into(),
        })
    }
}
