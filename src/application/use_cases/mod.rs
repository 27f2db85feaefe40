pub mod billing;
pub mod billing_admin;
pub mod billing_webhook;
pub mod plan_switch;
pub mod provisioning;
pub mod reconciliation;
