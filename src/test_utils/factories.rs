//! Test data factories for creating valid test fixtures.
//!
//! Each factory function creates a complete, valid object with sensible defaults.
//! Use the closure parameter to override specific fields as needed.

use chrono::NaiveDateTime;
use uuid::Uuid;

use crate::{
    application::use_cases::{
        billing::{BillingPlanProfile, SubscriptionProfile, TenantProfile, TransactionProfile},
        provisioning::{AddressRequest, CheckoutRequest, CustomerRequest, ItemRequest},
    },
    domain::entities::{
        plan_entitlement::FREE_TIER_SEATS, subscription::SubscriptionStatus,
        transaction_status::TransactionStatus,
    },
};

/// Fixed timestamp for deterministic tests.
pub fn test_datetime() -> NaiveDateTime {
    chrono::NaiveDate::from_ymd_opt(2024, 1, 15)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap()
}

/// Create a test tenant on the free tier.
pub fn create_test_tenant(overrides: impl FnOnce(&mut TenantProfile)) -> TenantProfile {
    let mut tenant = TenantProfile {
        id: Uuid::new_v4(),
        name: "Acme Recrutamento".to_string(),
        plan_slug: Some("free".to_string()),
        max_employees: FREE_TIER_SEATS,
        feature_overrides: serde_json::json!({}),
        current_subscription_id: None,
        created_at: Some(test_datetime()),
        updated_at: Some(test_datetime()),
    };
    overrides(&mut tenant);
    tenant
}

/// Create a monthly plan that already has a gateway id.
pub fn create_test_plan(overrides: impl FnOnce(&mut BillingPlanProfile)) -> BillingPlanProfile {
    let mut plan = BillingPlanProfile {
        id: Uuid::new_v4(),
        slug: "pro".to_string(),
        name: "Plano Pro".to_string(),
        price_cents: 9900,
        currency: "BRL".to_string(),
        interval_months: 1,
        repeats: None,
        gateway_plan_id: Some(format!("plan-{}", &Uuid::new_v4().simple().to_string()[..8])),
        features: vec!["recruitment".to_string(), "analytics".to_string()],
        created_at: Some(test_datetime()),
        updated_at: Some(test_datetime()),
    };
    overrides(&mut plan);
    plan
}

/// Create a waiting subscription with a gateway id.
pub fn create_test_subscription(
    tenant_id: Uuid,
    plan_id: Uuid,
    overrides: impl FnOnce(&mut SubscriptionProfile),
) -> SubscriptionProfile {
    let mut sub = SubscriptionProfile {
        id: Uuid::new_v4(),
        tenant_id,
        plan_id,
        status: SubscriptionStatus::Waiting,
        gateway_subscription_id: Some(format!(
            "gw-{}",
            &Uuid::new_v4().simple().to_string()[..8]
        )),
        last_charge_id: None,
        created_at: Some(test_datetime()),
        started_at: None,
        canceled_at: None,
        updated_at: Some(test_datetime()),
    };
    overrides(&mut sub);
    sub
}

/// Create a waiting transaction for a charge.
pub fn create_test_transaction(
    tenant_id: Uuid,
    charge_id: &str,
    overrides: impl FnOnce(&mut TransactionProfile),
) -> TransactionProfile {
    let mut tx = TransactionProfile {
        id: Uuid::new_v4(),
        tenant_id,
        subscription_id: None,
        gateway_charge_id: charge_id.to_string(),
        status: TransactionStatus::Waiting,
        amount_cents: 9900,
        currency: "BRL".to_string(),
        created_at: Some(test_datetime()),
        updated_at: Some(test_datetime()),
    };
    overrides(&mut tx);
    tx
}

/// A checkout body that passes validation.
pub fn valid_checkout_request(tenant_id: Uuid, plan_id: Uuid) -> CheckoutRequest {
    CheckoutRequest {
        tenant_id: Some(tenant_id.to_string()),
        plan_id: Some(plan_id.to_string()),
        plan_slug: None,
        item: Some(ItemRequest {
            name: Some("Plano Pro".to_string()),
            value: Some(9900.0),
            amount: Some(1.0),
        }),
        metadata: None,
        customer: Some(CustomerRequest {
            name: Some("Maria Souza".to_string()),
            email: Some("maria@acme.com.br".to_string()),
            cpf: Some("123.456.789-09".to_string()),
            phone_number: Some("(11) 98765-4321".to_string()),
            birth: Some("1990-05-17".to_string()),
        }),
        billing_address: Some(AddressRequest {
            street: Some("Av. Paulista".to_string()),
            number: Some("1000".to_string()),
            neighborhood: Some("Bela Vista".to_string()),
            zipcode: Some("01310-100".to_string()),
            city: Some("São Paulo".to_string()),
            state: Some("sp".to_string()),
            complement: None,
        }),
        payment_token: Some("tok_4f1c2d".to_string()),
        current_plan_slug: None,
    }
}
