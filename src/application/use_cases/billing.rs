use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::payment_gateway::{GatewayPlanId, PaymentGatewayPort},
    domain::entities::{
        billing_stage::BillingStage, subscription::SubscriptionStatus,
        transaction_status::TransactionStatus,
    },
};

// ============================================================================
// Profile Types
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct TenantProfile {
    pub id: Uuid,
    pub name: String,
    pub plan_slug: Option<String>,
    /// Seat limit enforced by employee creation
    pub max_employees: i32,
    pub feature_overrides: serde_json::Value,
    /// The tenant's single current subscription, if any
    pub current_subscription_id: Option<Uuid>,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BillingPlanProfile {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub price_cents: i64,
    pub currency: String,
    pub interval_months: i32,
    /// Number of charges; `None` charges until canceled
    pub repeats: Option<i32>,
    /// Plan id on the gateway, assigned on first checkout
    pub gateway_plan_id: Option<String>,
    pub features: Vec<String>,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionProfile {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub plan_id: Uuid,
    pub status: SubscriptionStatus,
    pub gateway_subscription_id: Option<String>,
    pub last_charge_id: Option<String>,
    pub created_at: Option<NaiveDateTime>,
    pub started_at: Option<NaiveDateTime>,
    pub canceled_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

impl SubscriptionProfile {
    /// Open subscriptions are the ones reconciliation still has to look at.
    pub fn is_open(&self) -> bool {
        !self.status.is_terminal() && self.gateway_subscription_id.is_some()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TransactionProfile {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub subscription_id: Option<Uuid>,
    pub gateway_charge_id: String,
    pub status: TransactionStatus,
    pub amount_cents: i64,
    pub currency: String,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditRecordProfile {
    pub id: Uuid,
    pub provider: String,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub headers: serde_json::Value,
    pub created_at: Option<NaiveDateTime>,
}

// ============================================================================
// Input Types
// ============================================================================

#[derive(Debug, Clone)]
pub struct NewSubscriptionInput {
    pub tenant_id: Uuid,
    pub plan_id: Uuid,
    pub gateway_subscription_id: String,
    pub status: SubscriptionStatus,
}

/// Final state of a subscription after the payment bind, keyed by gateway id
#[derive(Debug, Clone)]
pub struct SubscriptionUpsertInput {
    pub tenant_id: Uuid,
    pub plan_id: Uuid,
    pub gateway_subscription_id: String,
    pub status: SubscriptionStatus,
    pub last_charge_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TransactionUpsertInput {
    pub tenant_id: Uuid,
    pub subscription_id: Option<Uuid>,
    pub gateway_charge_id: String,
    pub status: TransactionStatus,
    pub amount_cents: i64,
    pub currency: String,
}

#[derive(Debug, Clone)]
pub struct NewAuditRecord {
    pub provider: String,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub headers: serde_json::Value,
}

/// What the tenant is entitled to once a subscription becomes active
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantEntitlement {
    pub plan_slug: String,
    /// `None` keeps the tenant's current seat limit
    pub seat_limit: Option<i32>,
}

impl TenantEntitlement {
    pub fn for_plan(plan: &BillingPlanProfile) -> Self {
        Self {
            plan_slug: plan.slug.clone(),
            seat_limit: crate::domain::entities::plan_entitlement::seat_limit_for(&plan.slug),
        }
    }
}

// ============================================================================
// Staged failures
// ============================================================================

/// A billing failure tagged with the pipeline stage it happened at.
#[derive(Debug)]
pub struct BillingFailure {
    pub stage: BillingStage,
    pub error: AppError,
}

impl BillingFailure {
    pub fn new(stage: BillingStage, error: AppError) -> Self {
        Self { stage, error }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(BillingStage::Validation, AppError::InvalidInput(message.into()))
    }

    /// Configuration problems are reported under their own stage whatever step hit them.
    pub fn at(stage: BillingStage) -> impl FnOnce(AppError) -> Self {
        move |error| match error {
            AppError::Config(_) => Self::new(BillingStage::Config, error),
            other => Self::new(stage, other),
        }
    }
}

impl std::fmt::Display for BillingFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} failed: {}", self.stage, self.error)
    }
}

impl std::error::Error for BillingFailure {}

pub type BillingResult<T> = Result<T, BillingFailure>;

// ============================================================================
// Repository Traits
// ============================================================================

#[async_trait]
pub trait TenantRepo: Send + Sync {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<TenantProfile>>;
    async fn list_all(&self) -> AppResult<Vec<TenantProfile>>;
    async fn set_current_subscription(
        &self,
        tenant_id: Uuid,
        subscription_id: Option<Uuid>,
    ) -> AppResult<()>;
    /// Clear the pointer only if it still points at `subscription_id`.
    /// Returns whether it was cleared.
    async fn clear_current_subscription_if(
        &self,
        tenant_id: Uuid,
        subscription_id: Uuid,
    ) -> AppResult<bool>;
}

#[async_trait]
pub trait BillingPlanRepo: Send + Sync {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<BillingPlanProfile>>;
    async fn get_by_slug(&self, slug: &str) -> AppResult<Option<BillingPlanProfile>>;
    /// Compare-and-swap on a NULL gateway plan id.
    /// Returns false when another writer got there first.
    async fn set_gateway_plan_id_if_absent(
        &self,
        id: Uuid,
        gateway_plan_id: &str,
    ) -> AppResult<bool>;
}

#[async_trait]
pub trait SubscriptionRepo: Send + Sync {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<SubscriptionProfile>>;
    async fn get_by_gateway_id(
        &self,
        gateway_subscription_id: &str,
    ) -> AppResult<Option<SubscriptionProfile>>;
    /// Most recent active subscription of a tenant
    async fn get_active_by_tenant(&self, tenant_id: Uuid)
    -> AppResult<Option<SubscriptionProfile>>;
    /// All subscriptions of a tenant, newest first
    async fn list_by_tenant(&self, tenant_id: Uuid) -> AppResult<Vec<SubscriptionProfile>>;
    /// Non-canceled subscriptions with a gateway id, newest first
    async fn list_open_by_tenant(&self, tenant_id: Uuid) -> AppResult<Vec<SubscriptionProfile>>;
    /// Tenants holding more than one open subscription
    async fn list_tenants_with_open_duplicates(&self) -> AppResult<Vec<Uuid>>;
    async fn create(&self, input: &NewSubscriptionInput) -> AppResult<SubscriptionProfile>;
    async fn upsert_by_gateway_id(
        &self,
        input: &SubscriptionUpsertInput,
    ) -> AppResult<SubscriptionProfile>;
    /// Set status. `started_at` and `canceled_at` are stamped the first time
    /// the row becomes active or canceled.
    async fn set_status(
        &self,
        id: Uuid,
        status: SubscriptionStatus,
    ) -> AppResult<SubscriptionProfile>;
    /// Mark active and move the tenant's pointer, plan slug and seat limit
    /// in the same transaction.
    async fn activate(
        &self,
        id: Uuid,
        entitlement: &TenantEntitlement,
    ) -> AppResult<SubscriptionProfile>;
}

#[async_trait]
pub trait TransactionRepo: Send + Sync {
    async fn upsert_by_charge_id(
        &self,
        input: &TransactionUpsertInput,
    ) -> AppResult<TransactionProfile>;
    /// Returns false when no transaction has this charge id
    async fn set_status_by_charge_id(
        &self,
        gateway_charge_id: &str,
        status: TransactionStatus,
    ) -> AppResult<bool>;
    async fn list_recent_by_tenant(
        &self,
        tenant_id: Uuid,
        limit: i64,
    ) -> AppResult<Vec<TransactionProfile>>;
}

#[async_trait]
pub trait BillingAuditRepo: Send + Sync {
    async fn record(&self, input: &NewAuditRecord) -> AppResult<()>;
}

#[async_trait]
pub trait WebhookReceiptRepo: Send + Sync {
    async fn exists(&self, event_key: &str) -> AppResult<bool>;
    /// Returns false if the key was already recorded
    async fn record(&self, event_key: &str) -> AppResult<bool>;
}

// ============================================================================
// Use Cases
// ============================================================================

#[derive(Clone)]
pub struct BillingUseCases {
    pub(super) tenant_repo: Arc<dyn TenantRepo>,
    pub(super) plan_repo: Arc<dyn BillingPlanRepo>,
    pub(super) subscription_repo: Arc<dyn SubscriptionRepo>,
    pub(super) transaction_repo: Arc<dyn TransactionRepo>,
    pub(super) audit_repo: Arc<dyn BillingAuditRepo>,
    pub(super) receipt_repo: Arc<dyn WebhookReceiptRepo>,
    pub(super) gateway: Arc<dyn PaymentGatewayPort>,
    /// Default notification URL sent with new subscriptions
    pub(super) notification_url: Option<String>,
}

impl BillingUseCases {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tenant_repo: Arc<dyn TenantRepo>,
        plan_repo: Arc<dyn BillingPlanRepo>,
        subscription_repo: Arc<dyn SubscriptionRepo>,
        transaction_repo: Arc<dyn TransactionRepo>,
        audit_repo: Arc<dyn BillingAuditRepo>,
        receipt_repo: Arc<dyn WebhookReceiptRepo>,
        gateway: Arc<dyn PaymentGatewayPort>,
        notification_url: Option<String>,
    ) -> Self {
        Self {
            tenant_repo,
            plan_repo,
            subscription_repo,
            transaction_repo,
            audit_repo,
            receipt_repo,
            gateway,
            notification_url,
        }
    }

    pub fn gateway(&self) -> &Arc<dyn PaymentGatewayPort> {
        &self.gateway
    }

    /// Append an audit record. Failures are logged, never propagated.
    pub(super) async fn audit(&self, event_type: &str, payload: serde_json::Value) {
        let record = NewAuditRecord {
            provider: self.gateway.provider().as_ref().to_string(),
            event_type: event_type.to_string(),
            payload,
            headers: serde_json::json!({}),
        };
        if let Err(e) = self.audit_repo.record(&record).await {
            warn!(error = %e, event_type, "Failed to write billing audit record");
        }
    }

    pub(super) async fn load_tenant(&self, tenant_id: Uuid) -> AppResult<TenantProfile> {
        self.tenant_repo
            .get_by_id(tenant_id)
            .await?
            .ok_or(AppError::NotFound)
    }

    pub(super) async fn load_plan(&self, plan_ref: &PlanRef) -> AppResult<BillingPlanProfile> {
        let plan = match plan_ref {
            PlanRef::Id(id) => self.plan_repo.get_by_id(*id).await?,
            PlanRef::Slug(slug) => self.plan_repo.get_by_slug(slug).await?,
        };
        plan.ok_or(AppError::NotFound)
    }

    /// Return the plan's gateway id, creating the gateway plan on first use.
    ///
    /// The id is persisted with a compare-and-swap on NULL. A writer that
    /// loses the race re-reads the plan and reuses the winner's id; the plan
    /// it created on the gateway is left orphaned and audited.
    pub async fn ensure_gateway_plan(
        &self,
        plan: &BillingPlanProfile,
    ) -> BillingResult<GatewayPlanId> {
        if let Some(existing) = plan.gateway_plan_id.as_deref()
            && !existing.trim().is_empty()
        {
            return Ok(GatewayPlanId::new(existing));
        }

        let created = self
            .gateway
            .create_plan(&plan.name, plan.interval_months, plan.repeats)
            .await
            .map_err(BillingFailure::at(BillingStage::Plan))?;

        info!(plan_id = %plan.id, gateway_plan_id = %created, "Created gateway plan");

        match self
            .plan_repo
            .set_gateway_plan_id_if_absent(plan.id, created.as_str())
            .await
        {
            Ok(true) => Ok(created),
            Ok(false) => {
                let stored = self
                    .plan_repo
                    .get_by_id(plan.id)
                    .await
                    .map_err(BillingFailure::at(BillingStage::Plan))?
                    .and_then(|p| p.gateway_plan_id);

                match stored {
                    Some(winner) => {
                        warn!(
                            plan_id = %plan.id,
                            orphan_gateway_plan_id = %created,
                            gateway_plan_id = %winner,
                            "Lost gateway plan race, reusing stored id"
                        );
                        self.audit(
                            "gateway_plan_orphaned",
                            serde_json::json!({
                                "plan_id": plan.id,
                                "orphan_gateway_plan_id": created.as_str(),
                                "gateway_plan_id": winner,
                            }),
                        )
                        .await;
                        Ok(GatewayPlanId::new(winner))
                    }
                    None => Ok(created),
                }
            }
            Err(e) => {
                // The gateway plan exists; losing the cached id only costs a
                // duplicate plan on the next checkout.
                warn!(plan_id = %plan.id, error = %e, "Failed to persist gateway plan id");
                self.audit(
                    "gateway_plan_persist_failed",
                    serde_json::json!({
                        "plan_id": plan.id,
                        "gateway_plan_id": created.as_str(),
                        "error": e.to_string(),
                    }),
                )
                .await;
                Ok(created)
            }
        }
    }
}

/// How a checkout request names its plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanRef {
    Id(Uuid),
    Slug(String),
}
