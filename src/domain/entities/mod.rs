pub mod billing_stage;
pub mod gateway_mode;
pub mod gateway_provider;
pub mod plan_entitlement;
pub mod subscription;
pub mod transaction_status;
