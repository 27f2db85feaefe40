//! Test app state builder for HTTP-level testing.
//!
//! `TestAppStateBuilder` wires `BillingUseCases` to the in-memory store and
//! the recording gateway and wraps them in an `AppState`.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::HeaderValue;
use secrecy::SecretString;
use time::Duration;

use crate::{
    adapters::http::app_state::AppState,
    application::{
        jwt::{self, ADMIN_ROLE},
        use_cases::billing::{
            BillingPlanProfile, BillingUseCases, SubscriptionProfile, TenantProfile,
            TransactionProfile,
        },
    },
    domain::entities::{gateway_mode::GatewayMode, gateway_provider::GatewayProvider},
    infra::config::{AppConfig, GatewaySettings},
    test_utils::{InMemoryBillingStore, RecordingGateway},
};

pub const TEST_ADMIN_SECRET: &str = "test-admin-secret";

/// Sign an admin bearer token against `TEST_ADMIN_SECRET`.
pub fn test_admin_token(role: &str) -> String {
    jwt::issue_admin(
        "ops@example.com",
        role,
        &SecretString::from(TEST_ADMIN_SECRET),
        Duration::minutes(5),
    )
    .expect("test token should sign")
}

/// `Authorization` header value for an admin token.
pub fn admin_bearer() -> String {
    format!("Bearer {}", test_admin_token(ADMIN_ROLE))
}

/// Builder for creating `AppState` with in-memory mocks for testing.
///
/// # Example
///
/// ```ignore
/// let tenant = create_test_tenant(|_| {});
/// let (app_state, store, gateway) = TestAppStateBuilder::new()
///     .with_tenant(tenant)
///     .build();
/// ```
pub struct TestAppStateBuilder {
    store: Arc<InMemoryBillingStore>,
    gateway: Arc<RecordingGateway>,
    webhook_secret: Option<String>,
}

impl Default for TestAppStateBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestAppStateBuilder {
    pub fn new() -> Self {
        Self {
            store: Arc::new(InMemoryBillingStore::new()),
            gateway: Arc::new(RecordingGateway::new()),
            webhook_secret: None,
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

    /// Require signed notifications on the webhook route.
    pub fn with_webhook_secret(mut self, secret: &str) -> Self {
        self.webhook_secret = Some(secret.to_string());
        self
    }

    /// Build the AppState.
    /// Returns (AppState, Arc<InMemoryBillingStore>, Arc<RecordingGateway>) for test assertions.
    pub fn build(self) -> (AppState, Arc<InMemoryBillingStore>, Arc<RecordingGateway>) {
        let billing_use_cases = Arc::new(BillingUseCases::new(
            self.store.clone(),
            self.store.clone(),
            self.store.clone(),
            self.store.clone(),
            self.store.clone(),
            self.store.clone(),
            self.gateway.clone(),
            None,
        ));

        // Create minimal config for testing
        let config = Arc::new(AppConfig {
            database_url: String::new(),
            bind_addr: "127.0.0.1:3001".parse::<SocketAddr>().unwrap(),
            cors_origin: HeaderValue::from_static("http://localhost:3000"),
            admin_jwt_secret: SecretString::from(TEST_ADMIN_SECRET),
            gateway: GatewaySettings {
                provider: GatewayProvider::Dummy,
                mode: GatewayMode::Sandbox,
                client_id: None,
                client_secret: None,
                cert_path: None,
                cert_base64: None,
                cert_passphrase: None,
                trace: false,
            },
            webhook_secret: self.webhook_secret.map(SecretString::from),
            notification_url: None,
            reconcile_interval_secs: 0,
            log_file: "test.log".to_string(),
        });

        let app_state = AppState {
            config,
            billing_use_cases,
        };

        (app_state, self.store, self.gateway)
    }
}
