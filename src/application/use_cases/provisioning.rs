use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    application::{
        ports::payment_gateway::{
            BillingAddress, CardPayment, CustomerIdentity, GatewayPlanId, SubscriptionItem,
            SubscriptionMetadata,
        },
        validators::{
            MAX_CHECKOUT_TOTAL_CENTS, checkout_total, digits_only, https_url,
            is_positive_integral, is_valid_birth_date, is_valid_cpf, is_valid_email,
            sanitize_custom_id,
        },
    },
    domain::entities::{
        billing_stage::BillingStage, subscription::SubscriptionStatus,
        transaction_status::TransactionStatus,
    },
};

use super::billing::{
    BillingFailure, BillingPlanProfile, BillingResult, BillingUseCases, NewSubscriptionInput,
    PlanRef, SubscriptionUpsertInput, TenantEntitlement, TenantProfile, TransactionUpsertInput,
};

// ============================================================================
// Request Types
// ============================================================================

/// Checkout body shared by subscribe and change-plan.
///
/// Every field is optional at the serde level so validation can name each
/// missing one instead of failing on the first.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckoutRequest {
    pub tenant_id: Option<String>,
    pub plan_id: Option<String>,
    pub plan_slug: Option<String>,
    pub item: Option<ItemRequest>,
    pub metadata: Option<MetadataRequest>,
    pub customer: Option<CustomerRequest>,
    pub billing_address: Option<AddressRequest>,
    pub payment_token: Option<String>,
    /// Plan the caller believes is current; informational only
    pub current_plan_slug: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemRequest {
    pub name: Option<String>,
    pub value: Option<f64>,
    pub amount: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetadataRequest {
    pub custom_id: Option<String>,
    pub notification_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomerRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub cpf: Option<String>,
    pub phone_number: Option<String>,
    pub birth: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AddressRequest {
    pub street: Option<String>,
    pub number: Option<String>,
    pub neighborhood: Option<String>,
    pub zipcode: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub complement: Option<String>,
}

/// A checkout that passed validation
#[derive(Debug, Clone)]
pub struct ValidatedCheckout {
    pub tenant_id: Uuid,
    pub plan: PlanRef,
    pub item_name: Option<String>,
    pub value: i64,
    pub amount: i64,
    pub custom_id: Option<String>,
    pub notification_url: Option<String>,
    pub payment: CardPayment,
}

impl ValidatedCheckout {
    /// Bounded by `MAX_CHECKOUT_TOTAL_CENTS` once validated.
    pub fn total_cents(&self) -> i64 {
        self.value.saturating_mul(self.amount)
    }
}

// ============================================================================
// Result Types
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct ProvisionOutcome {
    /// Gateway subscription id
    pub subscription_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub charge_id: Option<String>,
    pub status: SubscriptionStatus,
    pub stage: BillingStage,
}

/// Steps 3-7 of a checkout, shared by provisioning and plan switching
#[derive(Debug, Clone)]
pub(super) struct CheckoutOutcome {
    pub gateway_subscription_id: String,
    pub charge_id: Option<String>,
    pub status: SubscriptionStatus,
}

// ============================================================================
// Validation
// ============================================================================

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Validate a checkout body. All problems are reported at once, missing
/// fields first, named by their JSON path.
pub fn validate_checkout(req: &CheckoutRequest) -> BillingResult<ValidatedCheckout> {
    let mut missing: Vec<&'static str> = Vec::new();
    let mut invalid: Vec<String> = Vec::new();

    let tenant_id = match present(&req.tenant_id) {
        None => {
            missing.push("tenant_id");
            None
        }
        Some(raw) => match Uuid::parse_str(raw) {
            Ok(id) => Some(id),
            Err(_) => {
                invalid.push("tenant_id must be a UUID".into());
                None
            }
        },
    };

    let plan = match (present(&req.plan_id), present(&req.plan_slug)) {
        (Some(raw), _) => match Uuid::parse_str(raw) {
            Ok(id) => Some(PlanRef::Id(id)),
            Err(_) => {
                invalid.push("plan_id must be a UUID".into());
                None
            }
        },
        (None, Some(slug)) => Some(PlanRef::Slug(slug.to_lowercase())),
        (None, None) => {
            missing.push("plan_id");
            None
        }
    };

    let item = req.item.clone().unwrap_or_default();
    let mut amount_field = |name: &'static str, value: Option<f64>| -> Option<i64> {
        match value {
            None => {
                missing.push(name);
                None
            }
            Some(v) if is_positive_integral(v) => Some(v as i64),
            Some(_) => {
                invalid.push(format!("{} must be a positive whole number", name));
                None
            }
        }
    };
    let value = amount_field("item.value", item.value);
    let amount = amount_field("item.amount", item.amount);
    if let (Some(value), Some(amount)) = (value, amount)
        && checkout_total(value, amount).is_none()
    {
        invalid.push(format!(
            "item.value x item.amount must not exceed {} cents",
            MAX_CHECKOUT_TOTAL_CENTS
        ));
    }

    let payment_token = present(&req.payment_token).map(str::to_string);
    if payment_token.is_none() {
        missing.push("payment_token");
    }

    let customer = req.customer.clone().unwrap_or_default();
    let customer_name = present(&customer.name).map(str::to_string);
    if customer_name.is_none() {
        missing.push("customer.name");
    }
    let email = present(&customer.email).map(str::to_string);
    match &email {
        None => missing.push("customer.email"),
        Some(e) if !is_valid_email(e) => invalid.push("customer.email is not a valid email".into()),
        _ => {}
    }
    let cpf = present(&customer.cpf).map(str::to_string);
    match &cpf {
        None => missing.push("customer.cpf"),
        Some(c) if !is_valid_cpf(c) => invalid.push("customer.cpf must have 11 digits".into()),
        _ => {}
    }
    let phone = present(&customer.phone_number).map(digits_only);
    match &phone {
        None => missing.push("customer.phone_number"),
        Some(p) if p.len() < 10 => {
            invalid.push("customer.phone_number must include the area code".into())
        }
        _ => {}
    }
    let birth = present(&customer.birth).map(str::to_string);
    match &birth {
        None => missing.push("customer.birth"),
        Some(b) if !is_valid_birth_date(b) => {
            invalid.push("customer.birth must be YYYY-MM-DD".into())
        }
        _ => {}
    }

    let address = req.billing_address.clone().unwrap_or_default();
    let mut address_field = |name: &'static str, value: &Option<String>| -> String {
        match present(value) {
            Some(v) => v.to_string(),
            None => {
                missing.push(name);
                String::new()
            }
        }
    };
    let street = address_field("billing_address.street", &address.street);
    let number = address_field("billing_address.number", &address.number);
    let neighborhood = address_field("billing_address.neighborhood", &address.neighborhood);
    let zipcode = address_field("billing_address.zipcode", &address.zipcode);
    let city = address_field("billing_address.city", &address.city);
    let state = address_field("billing_address.state", &address.state);

    if !missing.is_empty() {
        return Err(BillingFailure::validation(format!(
            "Missing required field(s): {}",
            missing.join(", ")
        )));
    }
    if !invalid.is_empty() {
        return Err(BillingFailure::validation(invalid.join("; ")));
    }

    // Every Option below was checked by the missing-field pass.
    let (
        Some(tenant_id),
        Some(plan),
        Some(value),
        Some(amount),
        Some(payment_token),
        Some(name),
        Some(email),
        Some(cpf),
        Some(phone_number),
        Some(birth),
    ) = (
        tenant_id,
        plan,
        value,
        amount,
        payment_token,
        customer_name,
        email,
        cpf,
        phone,
        birth,
    )
    else {
        return Err(BillingFailure::validation("Invalid checkout request"));
    };

    let metadata = req.metadata.clone().unwrap_or_default();

    Ok(ValidatedCheckout {
        tenant_id,
        plan,
        item_name: present(&item.name).map(str::to_string),
        value,
        amount,
        custom_id: metadata.custom_id.as_deref().and_then(sanitize_custom_id),
        notification_url: metadata.notification_url.as_deref().and_then(https_url),
        payment: CardPayment {
            payment_token,
            billing_address: BillingAddress {
                street,
                number,
                neighborhood,
                zipcode: digits_only(&zipcode),
                city,
                state: state.to_uppercase(),
                complement: present(&address.complement).map(str::to_string),
            },
            customer: CustomerIdentity {
                name,
                email: email.to_lowercase(),
                cpf: digits_only(&cpf),
                phone_number,
                birth,
            },
        },
    })
}

// ============================================================================
// Subscription Provisioner
// ============================================================================

impl BillingUseCases {
    /// Subscribe a tenant to a plan.
    ///
    /// Validation runs before any gateway call. Local bookkeeping failures
    /// after the gateway accepted the subscription are logged and audited
    /// but never fail the request.
    #[instrument(skip(self, req), fields(tenant_id = ?req.tenant_id))]
    pub async fn provision(&self, req: &CheckoutRequest) -> BillingResult<ProvisionOutcome> {
        let checkout = validate_checkout(req)?;
        let (tenant, plan) = self.load_checkout_targets(&checkout).await?;

        let gateway_plan_id = self.ensure_gateway_plan(&plan).await?;
        let outcome = self
            .run_checkout(&tenant, &plan, &gateway_plan_id, &checkout)
            .await?;

        self.reconcile_after_checkout(tenant.id, &outcome.gateway_subscription_id)
            .await;

        info!(
            tenant_id = %tenant.id,
            gateway_subscription_id = %outcome.gateway_subscription_id,
            status = %outcome.status,
            "Subscription provisioned"
        );

        Ok(ProvisionOutcome {
            subscription_id: outcome.gateway_subscription_id,
            charge_id: outcome.charge_id,
            status: outcome.status,
            stage: BillingStage::Done,
        })
    }

    pub(super) async fn load_checkout_targets(
        &self,
        checkout: &ValidatedCheckout,
    ) -> BillingResult<(TenantProfile, BillingPlanProfile)> {
        let tenant = self
            .load_tenant(checkout.tenant_id)
            .await
            .map_err(BillingFailure::at(BillingStage::Validation))?;
        let plan = self
            .load_plan(&checkout.plan)
            .await
            .map_err(BillingFailure::at(BillingStage::Plan))?;
        Ok((tenant, plan))
    }

    pub(super) fn build_metadata(
        &self,
        tenant: &TenantProfile,
        checkout: &ValidatedCheckout,
    ) -> SubscriptionMetadata {
        SubscriptionMetadata {
            custom_id: checkout
                .custom_id
                .clone()
                .or_else(|| sanitize_custom_id(&tenant.id.to_string())),
            notification_url: checkout
                .notification_url
                .clone()
                .or_else(|| self.notification_url.as_deref().and_then(https_url)),
        }
    }

    /// Create the gateway subscription, bind the card and record the result.
    pub(super) async fn run_checkout(
        &self,
        tenant: &TenantProfile,
        plan: &BillingPlanProfile,
        gateway_plan_id: &GatewayPlanId,
        checkout: &ValidatedCheckout,
    ) -> BillingResult<CheckoutOutcome> {
        let items = [SubscriptionItem {
            name: checkout
                .item_name
                .clone()
                .unwrap_or_else(|| plan.name.clone()),
            value: checkout.value,
            amount: checkout.amount,
        }];
        let metadata = self.build_metadata(tenant, checkout);

        let created = self
            .gateway
            .create_subscription(
                gateway_plan_id,
                &items,
                (!metadata.is_empty()).then_some(&metadata),
            )
            .await
            .map_err(BillingFailure::at(BillingStage::Subscription))?;
        let gateway_subscription_id = created.subscription_id.as_str().to_string();

        if let Err(e) = self
            .subscription_repo
            .create(&NewSubscriptionInput {
                tenant_id: tenant.id,
                plan_id: plan.id,
                gateway_subscription_id: gateway_subscription_id.clone(),
                status: SubscriptionStatus::Waiting,
            })
            .await
        {
            warn!(
                tenant_id = %tenant.id,
                gateway_subscription_id = %gateway_subscription_id,
                error = %e,
                "Failed to insert waiting subscription"
            );
            self.audit(
                "subscription_insert_failed",
                serde_json::json!({
                    "tenant_id": tenant.id,
                    "gateway_subscription_id": gateway_subscription_id,
                    "error": e.to_string(),
                }),
            )
            .await;
        }

        let binding = match self
            .gateway
            .define_payment_method(&created.subscription_id, &checkout.payment)
            .await
        {
            Ok(binding) => binding,
            Err(e) => {
                self.audit(
                    "payment_bind_failed",
                    serde_json::json!({
                        "tenant_id": tenant.id,
                        "gateway_subscription_id": gateway_subscription_id,
                        "error": e.to_string(),
                        "details": e.as_gateway().map(|g| g.details()),
                    }),
                )
                .await;
                return Err(BillingFailure::at(BillingStage::Payment)(e));
            }
        };

        let status = if binding.is_activated() {
            SubscriptionStatus::Active
        } else {
            SubscriptionStatus::PendingPayment
        };
        let charge_id = binding
            .charge_id
            .clone()
            .or_else(|| created.charges.first().map(|c| c.charge_id.clone()));

        let local_id = self
            .persist_checkout_result(tenant, plan, &gateway_subscription_id, status, &charge_id)
            .await;

        if let Some(charge_id) = &charge_id
            && let Err(e) = self
                .transaction_repo
                .upsert_by_charge_id(&TransactionUpsertInput {
                    tenant_id: tenant.id,
                    subscription_id: local_id,
                    gateway_charge_id: charge_id.clone(),
                    status: TransactionStatus::Waiting,
                    amount_cents: checkout.total_cents(),
                    currency: plan.currency.clone(),
                })
                .await
        {
            warn!(charge_id = %charge_id, error = %e, "Failed to record transaction");
            self.audit(
                "transaction_upsert_failed",
                serde_json::json!({
                    "tenant_id": tenant.id,
                    "charge_id": charge_id,
                    "error": e.to_string(),
                }),
            )
            .await;
        }

        Ok(CheckoutOutcome {
            gateway_subscription_id,
            charge_id,
            status,
        })
    }

    /// Upsert the subscription row and, when active, move the tenant onto it.
    /// Returns the local id when the row could be written.
    async fn persist_checkout_result(
        &self,
        tenant: &TenantProfile,
        plan: &BillingPlanProfile,
        gateway_subscription_id: &str,
        status: SubscriptionStatus,
        charge_id: &Option<String>,
    ) -> Option<Uuid> {
        let upserted = self
            .subscription_repo
            .upsert_by_gateway_id(&SubscriptionUpsertInput {
                tenant_id: tenant.id,
                plan_id: plan.id,
                gateway_subscription_id: gateway_subscription_id.to_string(),
                status,
                last_charge_id: charge_id.clone(),
            })
            .await;

        let subscription = match upserted {
            Ok(sub) => sub,
            Err(e) => {
                warn!(
                    tenant_id = %tenant.id,
                    gateway_subscription_id,
                    error = %e,
                    "Failed to upsert subscription after payment bind"
                );
                self.audit(
                    "subscription_upsert_failed",
                    serde_json::json!({
                        "tenant_id": tenant.id,
                        "gateway_subscription_id": gateway_subscription_id,
                        "status": status,
                        "charge_id": charge_id,
                        "error": e.to_string(),
                    }),
                )
                .await;
                return None;
            }
        };

        if status.is_active()
            && let Err(e) = self
                .subscription_repo
                .activate(subscription.id, &TenantEntitlement::for_plan(plan))
                .await
        {
            warn!(
                tenant_id = %tenant.id,
                subscription_id = %subscription.id,
                error = %e,
                "Failed to move tenant onto activated subscription"
            );
            self.audit(
                "tenant_activation_failed",
                serde_json::json!({
                    "tenant_id": tenant.id,
                    "subscription_id": subscription.id,
                    "error": e.to_string(),
                }),
            )
            .await;
        }

        Some(subscription.id)
    }

    /// Synchronous reconciliation at the tail of a checkout. Never fails the caller.
    pub(super) async fn reconcile_after_checkout(&self, tenant_id: Uuid, keep: &str) {
        match self.reconcile_tenant(tenant_id, keep).await {
            Ok(report) if report.failed > 0 => {
                self.audit(
                    "reconciliation_incomplete",
                    serde_json::json!({
                        "tenant_id": tenant_id,
                        "keep": keep,
                        "report": report,
                    }),
                )
                .await;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(tenant_id = %tenant_id, error = %e, "Post-checkout reconciliation failed");
                self.audit(
                    "reconciliation_failed",
                    serde_json::json!({
                        "tenant_id": tenant_id,
                        "keep": keep,
                        "error": e.to_string(),
                    }),
                )
                .await;
            }
        }
    }
}
