use crate::{
    adapters::http::app_state::AppState,
    infra::{
        config::AppConfig, error::InfraError, gateway_factory::build_gateway,
        postgres_persistence,
    },
    use_cases::billing::{
        BillingAuditRepo, BillingPlanRepo, BillingUseCases, SubscriptionRepo, TenantRepo,
        TransactionRepo, WebhookReceiptRepo,
    },
};
use std::fs::File;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub async fn init_app_state() -> anyhow::Result<AppState> {
    let config = AppConfig::from_env()?;

    let postgres_arc = Arc::new(postgres_persistence(&config.database_url).await?);

    let gateway = build_gateway(&config.gateway).map_err(InfraError::GatewayInit)?;

    let billing_use_cases = BillingUseCases::new(
        postgres_arc.clone() as Arc<dyn TenantRepo>,
        postgres_arc.clone() as Arc<dyn BillingPlanRepo>,
        postgres_arc.clone() as Arc<dyn SubscriptionRepo>,
        postgres_arc.clone() as Arc<dyn TransactionRepo>,
        postgres_arc.clone() as Arc<dyn BillingAuditRepo>,
        postgres_arc as Arc<dyn WebhookReceiptRepo>,
        gateway,
        config.notification_url.clone(),
    );

    Ok(AppState {
        config: Arc::new(config),
        billing_use_cases: Arc::new(billing_use_cases),
    })
}

fn open_log_file(path: &str) -> Result<File, InfraError> {
    File::create(path).map_err(InfraError::LogFile)
}

pub fn init_tracing(log_file: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "hr_billing=debug,tower_http=debug".into());

    // Console (pretty logs)
    let console_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .pretty();

    // File (structured JSON logs)
    match open_log_file(log_file) {
        Ok(file) => {
            let json_layer = fmt::layer()
                .json()
                .with_writer(file)
                .with_current_span(true)
                .with_span_list(true);

            tracing_subscriber::registry()
                .with(filter)
                .with(console_layer)
                .with(json_layer)
                .try_init()
                .ok();
        }
        Err(e) => {
            tracing_subscriber::registry()
                .with(filter)
                .with(console_layer)
                .try_init()
                .ok();
            tracing::warn!(error = %e, log_file, "Logging to console only");
        }
    }
}
