//! Recording payment gateway for use-case tests.
//!
//! Counts every call, remembers the line items and cancels it saw, and can
//! be scripted to fail a specific operation.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::payment_gateway::{
        CardPayment, CreatedSubscription, GatewayError, GatewayPlanId, GatewaySubscriptionId,
        PaymentBinding, PaymentGatewayPort, SubscriptionDetail, SubscriptionItem,
        SubscriptionMetadata,
    },
    domain::entities::{gateway_mode::GatewayMode, gateway_provider::GatewayProvider},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatewayOp {
    CreatePlan,
    CreateSubscription,
    DefinePaymentMethod,
    CancelSubscription,
    DetailSubscription,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GatewayCalls {
    pub create_plan: u32,
    pub create_subscription: u32,
    pub define_payment_method: u32,
    pub cancel_subscription: u32,
    pub detail_subscription: u32,
}

impl GatewayCalls {
    pub fn total(&self) -> u32 {
        self.create_plan
            + self.create_subscription
            + self.define_payment_method
            + self.cancel_subscription
            + self.detail_subscription
    }
}

struct GatewayState {
    calls: GatewayCalls,
    seq: u64,
    next_failures: HashMap<GatewayOp, u16>,
    cancel_failures: HashMap<String, u16>,
    bind_status: String,
    remote_status: HashMap<String, String>,
    last_items: Vec<SubscriptionItem>,
    last_metadata: Option<SubscriptionMetadata>,
    canceled: Vec<String>,
}

pub struct RecordingGateway {
    state: Mutex<GatewayState>,
}

impl Default for RecordingGateway {
    fn default() -> Self {
        Self::new()
    }
}

fn simulated_error(op: GatewayOp, status: u16) -> AppError {
    AppError::Gateway(GatewayError {
        status: Some(status),
        code: Some(format!("{}", 3_500_000 + status as u32)),
        description: Some(format!("simulated {:?} failure", op)),
        body: Some(format!(r#"{{"code":{},"error":"simulated"}}"#, status)),
    })
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(GatewayState {
                calls: GatewayCalls::default(),
                seq: 0,
                next_failures: HashMap::new(),
                cancel_failures: HashMap::new(),
                bind_status: "new_charge".to_string(),
                remote_status: HashMap::new(),
                last_items: Vec::new(),
                last_metadata: None,
                canceled: Vec::new(),
            }),
        }
    }

    pub fn calls(&self) -> GatewayCalls {
        self.state.lock().unwrap().calls
    }

    /// Fail the next call of `op` with the given HTTP status.
    pub fn fail_next(&self, op: GatewayOp, status: u16) {
        self.state.lock().unwrap().next_failures.insert(op, status);
    }

    /// Fail every cancel of this gateway subscription id.
    pub fn fail_cancel_for(&self, gateway_id: &str, status: u16) {
        self.state
            .lock()
            .unwrap()
            .cancel_failures
            .insert(gateway_id.to_string(), status);
    }

    /// Subscription status returned by the payment bind.
    pub fn set_bind_status(&self, status: &str) {
        self.state.lock().unwrap().bind_status = status.to_string();
    }

    /// Status returned by `detail_subscription` for this id.
    pub fn set_remote_status(&self, gateway_id: &str, status: &str) {
        self.state
            .lock()
            .unwrap()
            .remote_status
            .insert(gateway_id.to_string(), status.to_string());
    }

    pub fn last_items(&self) -> Vec<SubscriptionItem> {
        self.state.lock().unwrap().last_items.clone()
    }

    pub fn last_metadata(&self) -> Option<SubscriptionMetadata> {
        self.state.lock().unwrap().last_metadata.clone()
    }

    /// Gateway ids successfully canceled, in call order.
    pub fn canceled_ids(&self) -> Vec<String> {
        self.state.lock().unwrap().canceled.clone()
    }

    fn begin(&self, op: GatewayOp) -> AppResult<u64> {
        let mut state = self.state.lock().unwrap();
        match op {
            GatewayOp::CreatePlan => state.calls.create_plan += 1,
            GatewayOp::CreateSubscription => state.calls.create_subscription += 1,
            GatewayOp::DefinePaymentMethod => state.calls.define_payment_method += 1,
            GatewayOp::CancelSubscription => state.calls.cancel_subscription += 1,
            GatewayOp::DetailSubscription => state.calls.detail_subscription += 1,
        }
        if let Some(status) = state.next_failures.remove(&op) {
            return Err(simulated_error(op, status));
        }
        state.seq += 1;
        Ok(state.seq)
    }
}

#[async_trait]
impl PaymentGatewayPort for RecordingGateway {
    fn provider(&self) -> GatewayProvider {
        GatewayProvider::Dummy
    }

    fn mode(&self) -> GatewayMode {
        GatewayMode::Sandbox
    }

    async fn create_plan(
        &self,
        _name: &str,
        _interval_months: i32,
        _repeats: Option<i32>,
    ) -> AppResult<GatewayPlanId> {
        let seq = self.begin(GatewayOp::CreatePlan)?;
        Ok(GatewayPlanId::new(format!("plan-{}", seq)))
    }

    async fn create_subscription(
        &self,
        _plan_id: &GatewayPlanId,
        items: &[SubscriptionItem],
        metadata: Option<&SubscriptionMetadata>,
    ) -> AppResult<CreatedSubscription> {
        let seq = self.begin(GatewayOp::CreateSubscription)?;
        let mut state = self.state.lock().unwrap();
        state.last_items = items.to_vec();
        state.last_metadata = metadata.cloned();
        Ok(CreatedSubscription {
            subscription_id: GatewaySubscriptionId::new(format!("sub-{}", seq)),
            status: "new".to_string(),
            charges: vec![],
        })
    }

    async fn define_payment_method(
        &self,
        _subscription_id: &GatewaySubscriptionId,
        _payment: &CardPayment,
    ) -> AppResult<PaymentBinding> {
        let seq = self.begin(GatewayOp::DefinePaymentMethod)?;
        let status = self.state.lock().unwrap().bind_status.clone();
        Ok(PaymentBinding {
            charge_id: Some(format!("charge-{}", seq)),
            status,
            charge_status: Some("waiting".to_string()),
        })
    }

    async fn cancel_subscription(&self, subscription_id: &GatewaySubscriptionId) -> AppResult<()> {
        self.begin(GatewayOp::CancelSubscription)?;
        let mut state = self.state.lock().unwrap();
        if let Some(status) = state.cancel_failures.get(subscription_id.as_str()) {
            return Err(simulated_error(GatewayOp::CancelSubscription, *status));
        }
        state.canceled.push(subscription_id.as_str().to_string());
        Ok(())
    }

    async fn detail_subscription(
        &self,
        subscription_id: &GatewaySubscriptionId,
    ) -> AppResult<SubscriptionDetail> {
        self.begin(GatewayOp::DetailSubscription)?;
        let status = self
            .state
            .lock()
            .unwrap()
            .remote_status
            .get(subscription_id.as_str())
            .cloned()
            .unwrap_or_else(|| "active".to_string());
        Ok(SubscriptionDetail {
            subscription_id: subscription_id.clone(),
            status,
            plan_id: None,
            custom_id: None,
            charges: vec![],
        })
    }
}
