use std::net::SocketAddr;

use axum::http::HeaderValue;
use env_helpers::get_env_default;
use secrecy::SecretString;

use crate::{
    domain::entities::{gateway_mode::GatewayMode, gateway_provider::GatewayProvider},
    infra::error::InfraError,
};

/// Raw gateway settings as read from the environment.
///
/// Values are not validated here; `gateway_credentials` trims them and turns
/// anything missing into a configuration error naming the variable.
#[derive(Clone)]
pub struct GatewaySettings {
    pub provider: GatewayProvider,
    pub mode: GatewayMode,
    pub client_id: Option<String>,
    pub client_secret: Option<SecretString>,
    pub cert_path: Option<String>,
    pub cert_base64: Option<SecretString>,
    pub cert_passphrase: Option<SecretString>,
    /// Log every gateway request/response through `tracing`
    pub trace: bool,
}

pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub cors_origin: HeaderValue,
    /// HS256 secret for admin bearer tokens
    pub admin_jwt_secret: SecretString,
    pub gateway: GatewaySettings,
    /// Shared secret for inbound notification signatures. Unset disables verification.
    pub webhook_secret: Option<SecretString>,
    /// Default notification URL attached to new gateway subscriptions
    pub notification_url: Option<String>,
    /// Seconds between scheduled reconciliation passes, 0 disables the loop
    pub reconcile_interval_secs: u64,
    pub log_file: String,
}

/// Read an optional variable, treating blank values as unset.
fn optional_env(var: &str) -> Option<String> {
    std::env::var(var)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required_env(var: &'static str) -> Result<String, InfraError> {
    optional_env(var).ok_or(InfraError::ConfigMissing { var })
}

impl AppConfig {
    pub fn from_env() -> Result<Self, InfraError> {
        let database_url = required_env("DATABASE_URL")?;
        let admin_jwt_secret = SecretString::new(required_env("ADMIN_JWT_SECRET")?.into());

        let bind_addr: String = get_env_default("BIND_ADDR", "127.0.0.1:3001".to_string());
        let bind_addr: SocketAddr = bind_addr.parse().map_err(|_| InfraError::ConfigInvalid {
            var: "BIND_ADDR",
            reason: "expected host:port".into(),
        })?;

        let cors_origin: String =
            get_env_default("CORS_ORIGIN", String::from("http://localhost:3000"));
        let cors_origin: HeaderValue =
            cors_origin.parse().map_err(|_| InfraError::ConfigInvalid {
                var: "CORS_ORIGIN",
                reason: "not a valid header value".into(),
            })?;

        let provider: String = get_env_default("GATEWAY_PROVIDER", "efi".to_string());
        let provider: GatewayProvider =
            provider.parse().map_err(|_| InfraError::ConfigInvalid {
                var: "GATEWAY_PROVIDER",
                reason: format!("unknown provider '{}'", provider),
            })?;
        let sandbox: bool = get_env_default("GATEWAY_SANDBOX", true);
        let mode = GatewayMode::from_sandbox_flag(sandbox);
        if !provider.supports_mode(mode) {
            return Err(InfraError::ConfigInvalid {
                var: "GATEWAY_SANDBOX",
                reason: format!("provider '{}' only runs in sandbox", provider),
            });
        }

        let gateway = GatewaySettings {
            provider,
            mode,
            client_id: optional_env("GATEWAY_CLIENT_ID"),
            client_secret: optional_env("GATEWAY_CLIENT_SECRET").map(|s| SecretString::new(s.into())),
            cert_path: optional_env("GATEWAY_CERT_PATH"),
            cert_base64: optional_env("GATEWAY_CERT_BASE64").map(|s| SecretString::new(s.into())),
            cert_passphrase: optional_env("GATEWAY_CERT_PASSPHRASE")
                .map(|s| SecretString::new(s.into())),
            trace: get_env_default("GATEWAY_TRACE", false),
        };

        Ok(Self {
            database_url,
            bind_addr,
            cors_origin,
            admin_jwt_secret,
            gateway,
            webhook_secret: optional_env("GATEWAY_WEBHOOK_SECRET")
                .map(|s| SecretString::new(s.into())),
            notification_url: optional_env("GATEWAY_NOTIFICATION_URL"),
            reconcile_interval_secs: get_env_default("RECONCILE_INTERVAL_SECS", 300),
            log_file: get_env_default("LOG_FILE", "app.log".to_string()),
        })
    }
}
