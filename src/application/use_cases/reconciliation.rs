use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::payment_gateway::GatewaySubscriptionId,
    domain::entities::subscription::SubscriptionStatus,
};

use super::billing::{BillingUseCases, SubscriptionProfile};

/// Outcome of one reconciliation pass over a tenant
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconciliationReport {
    /// Canceled on the gateway and locally
    pub canceled: u32,
    /// Gateway answered 400/404/409; marked canceled locally
    pub already_gone: u32,
    /// Gateway cancel failed otherwise; local row untouched
    pub failed: u32,
    /// Rows matching the subscription to keep
    pub kept: u32,
}

impl ReconciliationReport {
    pub fn merge(&mut self, other: &ReconciliationReport) {
        self.canceled += other.canceled;
        self.already_gone += other.already_gone;
        self.failed += other.failed;
        self.kept += other.kept;
    }

    pub fn changed(&self) -> bool {
        self.canceled + self.already_gone > 0
    }
}

enum CancelOutcome {
    Canceled,
    AlreadyGone,
    Failed,
}

impl BillingUseCases {
    /// Cancel every open subscription of the tenant except the one whose
    /// gateway id is `keep`.
    ///
    /// Idempotent: a second pass over the same state finds nothing to do.
    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    pub async fn reconcile_tenant(
        &self,
        tenant_id: Uuid,
        keep: &str,
    ) -> AppResult<ReconciliationReport> {
        let open = self.subscription_repo.list_open_by_tenant(tenant_id).await?;
        let mut report = ReconciliationReport::default();

        for sub in open {
            let Some(gateway_id) = sub.gateway_subscription_id.clone() else {
                continue;
            };
            if gateway_id == keep {
                report.kept += 1;
                continue;
            }

            match self.cancel_stale(&sub, &gateway_id).await {
                CancelOutcome::Canceled => report.canceled += 1,
                CancelOutcome::AlreadyGone => report.already_gone += 1,
                CancelOutcome::Failed => report.failed += 1,
            }
        }

        if report.changed() || report.failed > 0 {
            info!(
                canceled = report.canceled,
                already_gone = report.already_gone,
                failed = report.failed,
                "Reconciled tenant subscriptions"
            );
        }

        Ok(report)
    }

    async fn cancel_stale(&self, sub: &SubscriptionProfile, gateway_id: &str) -> CancelOutcome {
        let outcome = match self
            .gateway
            .cancel_subscription(&GatewaySubscriptionId::new(gateway_id))
            .await
        {
            Ok(()) => CancelOutcome::Canceled,
            Err(AppError::Gateway(ref g)) if g.is_benign_for_cancel() => {
                debug!(gateway_subscription_id = gateway_id, status = ?g.status, "Subscription already gone on gateway");
                CancelOutcome::AlreadyGone
            }
            Err(e) => {
                warn!(
                    subscription_id = %sub.id,
                    gateway_subscription_id = gateway_id,
                    error = %e,
                    "Gateway cancel failed during reconciliation"
                );
                self.audit(
                    "reconciliation_cancel_failed",
                    serde_json::json!({
                        "tenant_id": sub.tenant_id,
                        "subscription_id": sub.id,
                        "gateway_subscription_id": gateway_id,
                        "error": e.to_string(),
                        "details": e.as_gateway().map(|g| g.details()),
                    }),
                )
                .await;
                return CancelOutcome::Failed;
            }
        };

        if let Err(e) = self.mark_canceled(sub).await {
            warn!(subscription_id = %sub.id, error = %e, "Failed to mark subscription canceled");
            self.audit(
                "reconciliation_persist_failed",
                serde_json::json!({
                    "subscription_id": sub.id,
                    "gateway_subscription_id": gateway_id,
                    "error": e.to_string(),
                }),
            )
            .await;
            return CancelOutcome::Failed;
        }

        self.audit(
            "subscription_reconciled",
            serde_json::json!({
                "tenant_id": sub.tenant_id,
                "subscription_id": sub.id,
                "gateway_subscription_id": gateway_id,
                "already_gone": matches!(outcome, CancelOutcome::AlreadyGone),
            }),
        )
        .await;

        outcome
    }

    /// Set the row canceled and drop the tenant's pointer if it pointed here.
    pub(super) async fn mark_canceled(
        &self,
        sub: &SubscriptionProfile,
    ) -> AppResult<SubscriptionProfile> {
        let updated = self
            .subscription_repo
            .set_status(sub.id, SubscriptionStatus::Canceled)
            .await?;
        self.tenant_repo
            .clear_current_subscription_if(sub.tenant_id, sub.id)
            .await?;
        Ok(updated)
    }

    /// Pick the subscription a tenant should keep: the current pointer if it
    /// is still open, else the newest active, else the newest.
    pub(super) fn choose_keeper<'a>(
        current: Option<Uuid>,
        open: &'a [SubscriptionProfile],
    ) -> Option<&'a SubscriptionProfile> {
        if let Some(current) = current
            && let Some(sub) = open.iter().find(|s| s.id == current)
        {
            return Some(sub);
        }
        let newest = |subs: Vec<&'a SubscriptionProfile>| subs.into_iter().max_by_key(|s| s.created_at);
        newest(open.iter().filter(|s| s.status.is_active()).collect())
            .or_else(|| newest(open.iter().collect()))
    }

    /// Reconcile every tenant holding more than one open subscription.
    pub async fn reconcile_all(&self) -> AppResult<ReconciliationReport> {
        let tenant_ids = self
            .subscription_repo
            .list_tenants_with_open_duplicates()
            .await?;
        let mut total = ReconciliationReport::default();

        for tenant_id in tenant_ids {
            let tenant = match self.tenant_repo.get_by_id(tenant_id).await {
                Ok(Some(tenant)) => tenant,
                Ok(None) => continue,
                Err(e) => {
                    warn!(tenant_id = %tenant_id, error = %e, "Failed to load tenant for reconciliation");
                    continue;
                }
            };

            let open = match self.subscription_repo.list_open_by_tenant(tenant_id).await {
                Ok(open) => open,
                Err(e) => {
                    warn!(tenant_id = %tenant_id, error = %e, "Failed to list open subscriptions for reconciliation");
                    continue;
                }
            };
            let Some(keep) = Self::choose_keeper(tenant.current_subscription_id, &open)
                .and_then(|s| s.gateway_subscription_id.clone())
            else {
                continue;
            };

            match self.reconcile_tenant(tenant_id, &keep).await {
                Ok(report) => total.merge(&report),
                Err(e) => {
                    warn!(tenant_id = %tenant_id, error = %e, "Scheduled reconciliation failed");
                }
            }
        }

        Ok(total)
    }
}
