use async_trait::async_trait;
use std::sync::Arc;

use crate::{
    app_error::AppResult,
    application::ports::payment_gateway::{
        CardPayment, CreatedSubscription, GatewayCharge, GatewayPlanId, GatewaySubscriptionId,
        PaymentBinding, PaymentGatewayPort, SubscriptionDetail, SubscriptionItem,
        SubscriptionMetadata,
    },
    domain::entities::{gateway_mode::GatewayMode, gateway_provider::GatewayProvider},
    infra::{
        efi_client::{
            EfiBillingAddress, EfiCharge, EfiClient, EfiCreditCard, EfiCustomer, EfiItem,
            EfiMetadata, EfiPayRequest, EfiPaymentMethod, EfiPlanRequest, EfiSubscriptionRequest,
        },
        gateway_credentials::GatewayCredentials,
        gateway_trace::GatewayTraceHook,
    },
};

/// Adapter that wraps EfiClient to implement PaymentGatewayPort.
pub struct EfiGatewayAdapter {
    client: EfiClient,
    mode: GatewayMode,
}

impl EfiGatewayAdapter {
    pub fn new(
        credentials: GatewayCredentials,
        trace: Arc<dyn GatewayTraceHook>,
    ) -> AppResult<Self> {
        let mode = credentials.mode;
        Ok(Self {
            client: EfiClient::new(credentials, trace)?,
            mode,
        })
    }

    fn map_charge(charge: EfiCharge) -> GatewayCharge {
        GatewayCharge {
            charge_id: charge.charge_id,
            status: charge.status,
            total: charge.total,
        }
    }

    fn pay_request(payment: &CardPayment) -> EfiPayRequest {
        let address = &payment.billing_address;
        let customer = &payment.customer;
        EfiPayRequest {
            payment: EfiPaymentMethod {
                credit_card: EfiCreditCard {
                    billing_address: EfiBillingAddress {
                        street: address.street.clone(),
                        number: address.number.clone(),
                        neighborhood: address.neighborhood.clone(),
                        zipcode: address.zipcode.clone(),
                        city: address.city.clone(),
                        state: address.state.clone(),
                        complement: address.complement.clone(),
                    },
                    payment_token: payment.payment_token.clone(),
                    customer: EfiCustomer {
                        name: customer.name.clone(),
                        email: customer.email.clone(),
                        cpf: customer.cpf.clone(),
                        birth: customer.birth.clone(),
                        phone_number: customer.phone_number.clone(),
                    },
                },
            },
        }
    }
}

#[async_trait]
impl PaymentGatewayPort for EfiGatewayAdapter {
    fn provider(&self) -> GatewayProvider {
        GatewayProvider::Efi
    }

    fn mode(&self) -> GatewayMode {
        self.mode
    }

    // ========================================================================
    // Plans
    // ========================================================================

    async fn create_plan(
        &self,
        name: &str,
        interval_months: i32,
        repeats: Option<i32>,
    ) -> AppResult<GatewayPlanId> {
        let plan = self
            .client
            .create_plan(&EfiPlanRequest {
                name: name.to_string(),
                interval: interval_months,
                repeats,
            })
            .await?;
        Ok(GatewayPlanId::new(plan.plan_id))
    }

    // ========================================================================
    // Subscriptions
    // ========================================================================

    async fn create_subscription(
        &self,
        plan_id: &GatewayPlanId,
        items: &[SubscriptionItem],
        metadata: Option<&SubscriptionMetadata>,
    ) -> AppResult<CreatedSubscription> {
        let request = EfiSubscriptionRequest {
            items: items
                .iter()
                .map(|item| EfiItem {
                    name: item.name.clone(),
                    value: item.value,
                    amount: item.amount,
                })
                .collect(),
            metadata: metadata.filter(|m| !m.is_empty()).map(|m| EfiMetadata {
                custom_id: m.custom_id.clone(),
                notification_url: m.notification_url.clone(),
            }),
        };

        let created = self
            .client
            .create_subscription(plan_id.as_str(), &request)
            .await?;

        Ok(CreatedSubscription {
            subscription_id: GatewaySubscriptionId::new(created.subscription_id),
            status: created.status,
            charges: created.charges.into_iter().map(Self::map_charge).collect(),
        })
    }

    async fn define_payment_method(
        &self,
        subscription_id: &GatewaySubscriptionId,
        payment: &CardPayment,
    ) -> AppResult<PaymentBinding> {
        let paid = self
            .client
            .pay_subscription(subscription_id.as_str(), &Self::pay_request(payment))
            .await?;

        let (charge_id, charge_status) = match paid.charge {
            Some(charge) => (Some(charge.charge_id), Some(charge.status)),
            None => (None, None),
        };

        Ok(PaymentBinding {
            charge_id,
            status: paid.status,
            charge_status,
        })
    }

    async fn cancel_subscription(
        &self,
        subscription_id: &GatewaySubscriptionId,
    ) -> AppResult<()> {
        self.client
            .cancel_subscription(subscription_id.as_str())
            .await
    }

    async fn detail_subscription(
        &self,
        subscription_id: &GatewaySubscriptionId,
    ) -> AppResult<SubscriptionDetail> {
        let detail = self
            .client
            .detail_subscription(subscription_id.as_str())
            .await?;

        Ok(SubscriptionDetail {
            subscription_id: GatewaySubscriptionId::new(detail.subscription_id),
            status: detail.status,
            plan_id: detail.plan.map(|p| GatewayPlanId::new(p.plan_id)),
            custom_id: detail.custom_id,
            charges: detail.history.into_iter().map(Self::map_charge).collect(),
        })
    }
}
