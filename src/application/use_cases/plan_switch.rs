use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::{
    app_error::AppError,
    application::ports::payment_gateway::GatewaySubscriptionId,
    domain::entities::{billing_stage::BillingStage, subscription::SubscriptionStatus},
};

use super::{
    billing::{BillingResult, BillingUseCases, SubscriptionProfile},
    provisioning::{CheckoutRequest, validate_checkout},
};

#[derive(Debug, Clone, Serialize)]
pub struct PlanSwitchOutcome {
    pub stage: BillingStage,
    pub new_subscription_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_charge_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_status: Option<SubscriptionStatus>,
    pub canceled_old: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_subscription_id: Option<String>,
}

impl BillingUseCases {
    /// Move a tenant from its active subscription onto a new plan.
    ///
    /// The old subscription is canceled first, best effort: a failed cancel
    /// leaves it active for the reconciler and never blocks the new checkout.
    #[instrument(skip(self, req), fields(tenant_id = ?req.tenant_id))]
    pub async fn change_plan(&self, req: &CheckoutRequest) -> BillingResult<PlanSwitchOutcome> {
        let checkout = validate_checkout(req)?;
        let (tenant, plan) = self.load_checkout_targets(&checkout).await?;

        let gateway_plan_id = self.ensure_gateway_plan(&plan).await?;

        let old = match self.subscription_repo.get_active_by_tenant(tenant.id).await {
            Ok(old) => old,
            Err(e) => {
                warn!(tenant_id = %tenant.id, error = %e, "Failed to look up active subscription");
                None
            }
        };

        let canceled_old = match &old {
            Some(sub) => self.cancel_for_switch(sub).await,
            None => false,
        };

        let outcome = self
            .run_checkout(&tenant, &plan, &gateway_plan_id, &checkout)
            .await?;

        self.reconcile_after_checkout(tenant.id, &outcome.gateway_subscription_id)
            .await;

        info!(
            tenant_id = %tenant.id,
            gateway_subscription_id = %outcome.gateway_subscription_id,
            canceled_old,
            "Plan switched"
        );

        Ok(PlanSwitchOutcome {
            stage: BillingStage::Done,
            new_subscription_id: outcome.gateway_subscription_id,
            new_charge_id: outcome.charge_id,
            new_status: Some(outcome.status),
            canceled_old,
            old_subscription_id: old.and_then(|s| s.gateway_subscription_id),
        })
    }

    /// Returns whether the old subscription ended up canceled locally.
    async fn cancel_for_switch(&self, sub: &SubscriptionProfile) -> bool {
        if let Some(gateway_id) = sub.gateway_subscription_id.as_deref() {
            match self
                .gateway
                .cancel_subscription(&GatewaySubscriptionId::new(gateway_id))
                .await
            {
                Ok(()) => {}
                Err(AppError::Gateway(ref g)) if g.is_benign_for_cancel() => {}
                Err(e) => {
                    warn!(
                        subscription_id = %sub.id,
                        gateway_subscription_id = gateway_id,
                        error = %e,
                        "Could not cancel previous subscription, leaving it active"
                    );
                    self.audit(
                        "plan_switch_cancel_failed",
                        serde_json::json!({
                            "tenant_id": sub.tenant_id,
                            "subscription_id": sub.id,
                            "gateway_subscription_id": gateway_id,
                            "error": e.to_string(),
                            "details": e.as_gateway().map(|g| g.details()),
                        }),
                    )
                    .await;
                    return false;
                }
            }
        }

        match self.mark_canceled(sub).await {
            Ok(_) => true,
            Err(e) => {
                warn!(subscription_id = %sub.id, error = %e, "Failed to mark previous subscription canceled");
                self.audit(
                    "plan_switch_persist_failed",
                    serde_json::json!({
                        "subscription_id": sub.id,
                        "error": e.to_string(),
                    }),
                )
                .await;
                false
            }
        }
    }
}
