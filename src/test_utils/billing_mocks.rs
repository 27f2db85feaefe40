//! In-memory implementation of every billing repository trait.
//!
//! One store backs all repositories so that operations spanning tables
//! (activation moves the tenant pointer) behave like the Postgres adapter.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::use_cases::billing::{
        AuditRecordProfile, BillingAuditRepo, BillingPlanProfile, BillingPlanRepo,
        BillingUseCases, NewAuditRecord, NewSubscriptionInput, SubscriptionProfile,
        SubscriptionRepo, SubscriptionUpsertInput, TenantEntitlement, TenantProfile, TenantRepo,
        TransactionProfile, TransactionRepo, TransactionUpsertInput, WebhookReceiptRepo,
    },
    domain::entities::{subscription::SubscriptionStatus, transaction_status::TransactionStatus},
};

use super::gateway_mocks::RecordingGateway;

fn now() -> chrono::NaiveDateTime {
    chrono::Utc::now().naive_utc()
}

#[derive(Default)]
struct BillingState {
    tenants: HashMap<Uuid, TenantProfile>,
    plans: HashMap<Uuid, BillingPlanProfile>,
    subscriptions: HashMap<Uuid, SubscriptionProfile>,
    transactions: HashMap<String, TransactionProfile>,
    audits: Vec<AuditRecordProfile>,
    receipts: HashSet<String>,
    writes: usize,
    fail_subscription_inserts: bool,
    fail_open_listing_for: HashSet<Uuid>,
}

impl BillingState {
    fn stamp_status(sub: &mut SubscriptionProfile, status: SubscriptionStatus) {
        let ts = now();
        sub.status = status;
        if status == SubscriptionStatus::Active && sub.started_at.is_none() {
            sub.started_at = Some(ts);
        }
        if status == SubscriptionStatus::Canceled && sub.canceled_at.is_none() {
            sub.canceled_at = Some(ts);
        }
        sub.updated_at = Some(ts);
    }
}

// ============================================================================
// InMemoryBillingStore
// ============================================================================

#[derive(Default)]
pub struct InMemoryBillingStore {
    state: Mutex<BillingState>,
}

impl InMemoryBillingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_tenant(&self, tenant: TenantProfile) {
        self.state.lock().unwrap().tenants.insert(tenant.id, tenant);
    }

    pub fn insert_plan(&self, plan: BillingPlanProfile) {
        self.state.lock().unwrap().plans.insert(plan.id, plan);
    }

    pub fn insert_subscription(&self, sub: SubscriptionProfile) {
        self.state.lock().unwrap().subscriptions.insert(sub.id, sub);
    }

    pub fn insert_transaction(&self, tx: TransactionProfile) {
        self.state
            .lock()
            .unwrap()
            .transactions
            .insert(tx.gateway_charge_id.clone(), tx);
    }

    /// Simulate a concurrent writer storing a gateway plan id.
    pub fn set_plan_gateway_id(&self, plan_id: Uuid, gateway_plan_id: &str) {
        if let Some(plan) = self.state.lock().unwrap().plans.get_mut(&plan_id) {
            plan.gateway_plan_id = Some(gateway_plan_id.to_string());
        }
    }

    /// Make every subsequent `SubscriptionRepo::create` fail.
    pub fn fail_subscription_inserts(&self) {
        self.state.lock().unwrap().fail_subscription_inserts = true;
    }

    /// Make `SubscriptionRepo::list_open_by_tenant` fail for one tenant.
    pub fn fail_open_listing_for(&self, tenant_id: Uuid) {
        self.state
            .lock()
            .unwrap()
            .fail_open_listing_for
            .insert(tenant_id);
    }

    pub fn tenant(&self, id: Uuid) -> Option<TenantProfile> {
        self.state.lock().unwrap().tenants.get(&id).cloned()
    }

    pub fn plan(&self, id: Uuid) -> Option<BillingPlanProfile> {
        self.state.lock().unwrap().plans.get(&id).cloned()
    }

    pub fn subscription(&self, id: Uuid) -> Option<SubscriptionProfile> {
        self.state.lock().unwrap().subscriptions.get(&id).cloned()
    }

    pub fn subscription_by_gateway_id(&self, gateway_id: &str) -> Option<SubscriptionProfile> {
        self.state
            .lock()
            .unwrap()
            .subscriptions
            .values()
            .find(|s| s.gateway_subscription_id.as_deref() == Some(gateway_id))
            .cloned()
    }

    pub fn subscriptions_for(&self, tenant_id: Uuid) -> Vec<SubscriptionProfile> {
        let mut subs: Vec<SubscriptionProfile> = self
            .state
            .lock()
            .unwrap()
            .subscriptions
            .values()
            .filter(|s| s.tenant_id == tenant_id)
            .cloned()
            .collect();
        subs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        subs
    }

    pub fn transactions_for(&self, tenant_id: Uuid) -> Vec<TransactionProfile> {
        self.state
            .lock()
            .unwrap()
            .transactions
            .values()
            .filter(|t| t.tenant_id == tenant_id)
            .cloned()
            .collect()
    }

    pub fn audit_events(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .audits
            .iter()
            .map(|a| a.event_type.clone())
            .collect()
    }

    /// Number of repository writes since construction (seeding excluded).
    pub fn write_count(&self) -> usize {
        self.state.lock().unwrap().writes
    }
}

#[async_trait]
impl TenantRepo for InMemoryBillingStore {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<TenantProfile>> {
        Ok(self.tenant(id))
    }

    async fn list_all(&self) -> AppResult<Vec<TenantProfile>> {
        let mut tenants: Vec<TenantProfile> =
            self.state.lock().unwrap().tenants.values().cloned().collect();
        tenants.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tenants)
    }

    async fn set_current_subscription(
        &self,
        tenant_id: Uuid,
        subscription_id: Option<Uuid>,
    ) -> AppResult<()> {
        let mut state = self.state.lock().unwrap();
        state.writes += 1;
        let tenant = state.tenants.get_mut(&tenant_id).ok_or(AppError::NotFound)?;
        tenant.current_subscription_id = subscription_id;
        tenant.updated_at = Some(now());
        Ok(())
    }

    async fn clear_current_subscription_if(
        &self,
        tenant_id: Uuid,
        subscription_id: Uuid,
    ) -> AppResult<bool> {
        let mut state = self.state.lock().unwrap();
        state.writes += 1;
        match state.tenants.get_mut(&tenant_id) {
            Some(tenant) if tenant.current_subscription_id == Some(subscription_id) => {
                tenant.current_subscription_id = None;
                tenant.updated_at = Some(now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl BillingPlanRepo for InMemoryBillingStore {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<BillingPlanProfile>> {
        Ok(self.plan(id))
    }

    async fn get_by_slug(&self, slug: &str) -> AppResult<Option<BillingPlanProfile>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .plans
            .values()
            .find(|p| p.slug == slug)
            .cloned())
    }

    async fn set_gateway_plan_id_if_absent(
        &self,
        id: Uuid,
        gateway_plan_id: &str,
    ) -> AppResult<bool> {
        let mut state = self.state.lock().unwrap();
        state.writes += 1;
        let plan = state.plans.get_mut(&id).ok_or(AppError::NotFound)?;
        if plan.gateway_plan_id.is_some() {
            return Ok(false);
        }
        plan.gateway_plan_id = Some(gateway_plan_id.to_string());
        plan.updated_at = Some(now());
        Ok(true)
    }
}

#[async_trait]
impl SubscriptionRepo for InMemoryBillingStore {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<SubscriptionProfile>> {
        Ok(self.subscription(id))
    }

    async fn get_by_gateway_id(
        &self,
        gateway_subscription_id: &str,
    ) -> AppResult<Option<SubscriptionProfile>> {
        Ok(self.subscription_by_gateway_id(gateway_subscription_id))
    }

    async fn get_active_by_tenant(
        &self,
        tenant_id: Uuid,
    ) -> AppResult<Option<SubscriptionProfile>> {
        Ok(self
            .subscriptions_for(tenant_id)
            .into_iter()
            .find(|s| s.status == SubscriptionStatus::Active))
    }

    async fn list_by_tenant(&self, tenant_id: Uuid) -> AppResult<Vec<SubscriptionProfile>> {
        Ok(self.subscriptions_for(tenant_id))
    }

    async fn list_open_by_tenant(&self, tenant_id: Uuid) -> AppResult<Vec<SubscriptionProfile>> {
        if self
            .state
            .lock()
            .unwrap()
            .fail_open_listing_for
            .contains(&tenant_id)
        {
            return Err(AppError::Database("simulated listing failure".into()));
        }
        Ok(self
            .subscriptions_for(tenant_id)
            .into_iter()
            .filter(|s| s.is_open())
            .collect())
    }

    async fn list_tenants_with_open_duplicates(&self) -> AppResult<Vec<Uuid>> {
        let state = self.state.lock().unwrap();
        let mut counts: HashMap<Uuid, usize> = HashMap::new();
        for sub in state.subscriptions.values().filter(|s| s.is_open()) {
            *counts.entry(sub.tenant_id).or_default() += 1;
        }
        Ok(counts
            .into_iter()
            .filter(|(_, n)| *n > 1)
            .map(|(id, _)| id)
            .collect())
    }

    async fn create(&self, input: &NewSubscriptionInput) -> AppResult<SubscriptionProfile> {
        let mut state = self.state.lock().unwrap();
        if state.fail_subscription_inserts {
            return Err(AppError::Database("simulated insert failure".into()));
        }
        state.writes += 1;
        let ts = now();
        let sub = SubscriptionProfile {
            id: Uuid::new_v4(),
            tenant_id: input.tenant_id,
            plan_id: input.plan_id,
            status: input.status,
            gateway_subscription_id: Some(input.gateway_subscription_id.clone()),
            last_charge_id: None,
            created_at: Some(ts),
            started_at: None,
            canceled_at: None,
            updated_at: Some(ts),
        };
        state.subscriptions.insert(sub.id, sub.clone());
        Ok(sub)
    }

    async fn upsert_by_gateway_id(
        &self,
        input: &SubscriptionUpsertInput,
    ) -> AppResult<SubscriptionProfile> {
        let mut state = self.state.lock().unwrap();
        state.writes += 1;

        let existing = state
            .subscriptions
            .values_mut()
            .find(|s| {
                s.gateway_subscription_id.as_deref() == Some(input.gateway_subscription_id.as_str())
            });

        if let Some(sub) = existing {
            sub.plan_id = input.plan_id;
            if input.last_charge_id.is_some() {
                sub.last_charge_id = input.last_charge_id.clone();
            }
            BillingState::stamp_status(sub, input.status);
            return Ok(sub.clone());
        }

        let ts = now();
        let mut sub = SubscriptionProfile {
            id: Uuid::new_v4(),
            tenant_id: input.tenant_id,
            plan_id: input.plan_id,
            status: input.status,
            gateway_subscription_id: Some(input.gateway_subscription_id.clone()),
            last_charge_id: input.last_charge_id.clone(),
            created_at: Some(ts),
            started_at: None,
            canceled_at: None,
            updated_at: Some(ts),
        };
        BillingState::stamp_status(&mut sub, input.status);
        state.subscriptions.insert(sub.id, sub.clone());
        Ok(sub)
    }

    async fn set_status(
        &self,
        id: Uuid,
        status: SubscriptionStatus,
    ) -> AppResult<SubscriptionProfile> {
        let mut state = self.state.lock().unwrap();
        state.writes += 1;
        let sub = state.subscriptions.get_mut(&id).ok_or(AppError::NotFound)?;
        BillingState::stamp_status(sub, status);
        Ok(sub.clone())
    }

    async fn activate(
        &self,
        id: Uuid,
        entitlement: &TenantEntitlement,
    ) -> AppResult<SubscriptionProfile> {
        let mut state = self.state.lock().unwrap();
        state.writes += 1;
        let sub = state.subscriptions.get_mut(&id).ok_or(AppError::NotFound)?;
        BillingState::stamp_status(sub, SubscriptionStatus::Active);
        let sub = sub.clone();

        let tenant = state
            .tenants
            .get_mut(&sub.tenant_id)
            .ok_or(AppError::NotFound)?;
        tenant.current_subscription_id = Some(sub.id);
        tenant.plan_slug = Some(entitlement.plan_slug.clone());
        if let Some(limit) = entitlement.seat_limit {
            tenant.max_employees = limit;
        }
        tenant.updated_at = Some(now());
        Ok(sub)
    }
}

#[async_trait]
impl TransactionRepo for InMemoryBillingStore {
    async fn upsert_by_charge_id(
        &self,
        input: &TransactionUpsertInput,
    ) -> AppResult<TransactionProfile> {
        let mut state = self.state.lock().unwrap();
        state.writes += 1;
        let ts = now();
        let tx = state
            .transactions
            .entry(input.gateway_charge_id.clone())
            .and_modify(|t| {
                // Terminal statuses survive later upserts (matches Postgres ON CONFLICT)
                if !t.status.is_terminal() {
                    t.status = input.status;
                }
                t.amount_cents = input.amount_cents;
                t.subscription_id = input.subscription_id.or(t.subscription_id);
                t.updated_at = Some(ts);
            })
            .or_insert_with(|| TransactionProfile {
                id: Uuid::new_v4(),
                tenant_id: input.tenant_id,
                subscription_id: input.subscription_id,
                gateway_charge_id: input.gateway_charge_id.clone(),
                status: input.status,
                amount_cents: input.amount_cents,
                currency: input.currency.clone(),
                created_at: Some(ts),
                updated_at: Some(ts),
            });
        Ok(tx.clone())
    }

    async fn set_status_by_charge_id(
        &self,
        gateway_charge_id: &str,
        status: TransactionStatus,
    ) -> AppResult<bool> {
        let mut state = self.state.lock().unwrap();
        state.writes += 1;
        match state.transactions.get_mut(gateway_charge_id) {
            Some(tx) => {
                tx.status = status;
                tx.updated_at = Some(now());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_recent_by_tenant(
        &self,
        tenant_id: Uuid,
        limit: i64,
    ) -> AppResult<Vec<TransactionProfile>> {
        let mut txs = self.transactions_for(tenant_id);
        txs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        txs.truncate(limit.max(0) as usize);
        Ok(txs)
    }
}

#[async_trait]
impl BillingAuditRepo for InMemoryBillingStore {
    async fn record(&self, input: &NewAuditRecord) -> AppResult<()> {
        let mut state = self.state.lock().unwrap();
        state.writes += 1;
        state.audits.push(AuditRecordProfile {
            id: Uuid::new_v4(),
            provider: input.provider.clone(),
            event_type: input.event_type.clone(),
            payload: input.payload.clone(),
            headers: input.headers.clone(),
            created_at: Some(now()),
        });
        Ok(())
    }
}

#[async_trait]
impl WebhookReceiptRepo for InMemoryBillingStore {
    async fn exists(&self, event_key: &str) -> AppResult<bool> {
        Ok(self.state.lock().unwrap().receipts.contains(event_key))
    }

    async fn record(&self, event_key: &str) -> AppResult<bool> {
        let mut state = self.state.lock().unwrap();
        state.writes += 1;
        Ok(state.receipts.insert(event_key.to_string()))
    }
}

// ============================================================================
// BillingHarness
// ============================================================================

/// In-memory store plus recording gateway, wired into `BillingUseCases`.
pub struct BillingHarness {
    pub store: Arc<InMemoryBillingStore>,
    pub gateway: Arc<RecordingGateway>,
    pub notification_url: Option<String>,
}

impl Default for BillingHarness {
    fn default() -> Self {
        Self::new()
    }
}

impl BillingHarness {
    pub fn new() -> Self {
        Self {
            store: Arc::new(InMemoryBillingStore::new()),
            gateway: Arc::new(RecordingGateway::new()),
            notification_url: None,
        }
    }

    pub fn with_tenant(self, tenant: TenantProfile) -> Self {
        self.store.insert_tenant(tenant);
        self
    }

    pub fn with_plan(self, plan: BillingPlanProfile) -> Self {
        self.store.insert_plan(plan);
        self
    }

    pub fn with_subscription(self, sub: SubscriptionProfile) -> Self {
        self.store.insert_subscription(sub);
        self
    }

    pub fn with_transaction(self, tx: TransactionProfile) -> Self {
        self.store.insert_transaction(tx);
        self
    }

    pub fn use_cases(&self) -> BillingUseCases {
        BillingUseCases::new(
            self.store.clone(),
            self.store.clone(),
            self.store.clone(),
            self.store.clone(),
            self.store.clone(),
            self.store.clone(),
            self.gateway.clone(),
            self.notification_url.clone(),
        )
    }
}
