use std::sync::Arc;

use crate::{infra::config::AppConfig, use_cases::billing::BillingUseCases};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub billing_use_cases: Arc<BillingUseCases>,
}
