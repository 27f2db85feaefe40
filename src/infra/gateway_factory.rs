use std::sync::Arc;

use tracing::info;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::payment_gateway::PaymentGatewayPort,
    domain::entities::gateway_provider::GatewayProvider,
    infra::{
        config::GatewaySettings, dummy_gateway_client::DummyGatewayClient,
        efi_gateway_adapter::EfiGatewayAdapter, gateway_credentials::resolve_credentials,
        gateway_trace::trace_hook_for,
    },
};

/// Build the configured payment gateway.
///
/// Credentials are resolved here, so a misconfigured deployment fails at
/// startup with `AppError::Config` instead of on the first checkout.
pub fn build_gateway(settings: &GatewaySettings) -> AppResult<Arc<dyn PaymentGatewayPort>> {
    if !settings.provider.supports_mode(settings.mode) {
        return Err(AppError::Config(format!(
            "{} does not support {} mode",
            settings.provider.display_name(),
            settings.mode
        )));
    }

    let gateway: Arc<dyn PaymentGatewayPort> = match settings.provider {
        GatewayProvider::Efi => {
            let credentials = resolve_credentials(settings)?;
            Arc::new(EfiGatewayAdapter::new(
                credentials,
                trace_hook_for(settings.trace),
            )?)
        }
        GatewayProvider::Dummy => Arc::new(DummyGatewayClient::new()),
    };

    info!(
        provider = gateway.provider().as_ref(),
        mode = %gateway.mode(),
        trace = settings.trace,
        "Payment gateway ready"
    );
    Ok(gateway)
}
