use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::{Client, Identity, Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize, de::DeserializeOwned};
use tokio::sync::Mutex;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::payment_gateway::GatewayError,
    domain::entities::gateway_mode::GatewayMode,
    infra::{
        gateway_credentials::GatewayCredentials,
        gateway_trace::{GatewayTraceHook, TracedRequest, TracedResponse},
        http_client::client_builder,
    },
};

const EFI_PRODUCTION_BASE: &str = "https://cobrancas.api.efipay.com.br";
const EFI_SANDBOX_BASE: &str = "https://cobrancas-h.api.efipay.com.br";

/// Tokens are refreshed this long before the gateway says they expire.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(30);

pub fn base_url_for(mode: GatewayMode) -> &'static str {
    match mode {
        GatewayMode::Production => EFI_PRODUCTION_BASE,
        GatewayMode::Sandbox => EFI_SANDBOX_BASE,
    }
}

struct CachedToken {
    token: SecretString,
    refresh_at: Instant,
}

/// Raw HTTP client for the Efí billing API.
///
/// Authenticates with OAuth client credentials over mTLS and caches the
/// access token in memory. Never retries.
pub struct EfiClient {
    http: Client,
    base_url: String,
    client_id: String,
    client_secret: SecretString,
    token: Mutex<Option<CachedToken>>,
    trace: Arc<dyn GatewayTraceHook>,
    /// Keeps a materialized certificate file alive as long as the client
    _credentials: Option<GatewayCredentials>,
}

impl EfiClient {
    pub fn new(credentials: GatewayCredentials, trace: Arc<dyn GatewayTraceHook>) -> AppResult<Self> {
        let identity = Identity::from_pem(&credentials.identity_pem).map_err(|e| {
            AppError::Config(format!("Gateway certificate could not be loaded: {}", e))
        })?;
        let http = client_builder()
            .identity(identity)
            .build()
            .map_err(|e| AppError::Config(format!("Gateway HTTP client could not be built: {}", e)))?;

        let mut client = Self::with_http_client(
            http,
            base_url_for(credentials.mode),
            credentials.client_id.clone(),
            credentials.client_secret.clone(),
            trace,
        );
        client._credentials = Some(credentials);
        Ok(client)
    }

    /// Client over an already-built `reqwest::Client` and base URL.
    pub(crate) fn with_http_client(
        http: Client,
        base_url: impl Into<String>,
        client_id: String,
        client_secret: SecretString,
        trace: Arc<dyn GatewayTraceHook>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client_id,
            client_secret,
            token: Mutex::new(None),
            trace,
            _credentials: None,
        }
    }

    // ========================================================================
    // Authorization
    // ========================================================================

    async fn access_token(&self) -> AppResult<SecretString> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref()
            && Instant::now() < token.refresh_at
        {
            return Ok(token.token.clone());
        }

        let response = self
            .http
            .post(format!("{}/v1/authorize", self.base_url))
            .basic_auth(&self.client_id, Some(self.client_secret.expose_secret()))
            .json(&serde_json::json!({ "grant_type": "client_credentials" }))
            .send()
            .await
            .map_err(|e| GatewayError::transport(format!("Gateway authorization failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::transport(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            // The body may echo the client id; never log it.
            tracing::error!(status = %status, "Gateway authorization rejected");
            return Err(gateway_error(status, &body).into());
        }

        let auth: EfiAuthResponse = serde_json::from_str(&body).map_err(|e| {
            GatewayError::with_status(
                status.as_u16(),
                format!("Unexpected authorization response: {}", e),
            )
        })?;

        let lifetime = Duration::from_secs(auth.expires_in.max(0) as u64);
        let token = SecretString::new(auth.access_token.into());
        *cached = Some(CachedToken {
            token: token.clone(),
            refresh_at: Instant::now() + lifetime.saturating_sub(TOKEN_EXPIRY_MARGIN),
        });
        tracing::debug!(expires_in = auth.expires_in, "Obtained gateway access token");
        Ok(token)
    }

    // ========================================================================
    // Plans
    // ========================================================================

    pub async fn create_plan(&self, request: &EfiPlanRequest) -> AppResult<EfiPlan> {
        let body = self
            .request(Method::POST, "/v1/plan", Some(to_json(request)?))
            .await?;
        parse_data(body)
    }

    // ========================================================================
    // Subscriptions
    // ========================================================================

    pub async fn create_subscription(
        &self,
        plan_id: &str,
        request: &EfiSubscriptionRequest,
    ) -> AppResult<EfiSubscription> {
        let body = self
            .request(
                Method::POST,
                &format!("/v1/plan/{}/subscription", plan_id),
                Some(to_json(request)?),
            )
            .await?;
        parse_data(body)
    }

    pub async fn pay_subscription(
        &self,
        subscription_id: &str,
        request: &EfiPayRequest,
    ) -> AppResult<EfiPayment> {
        let body = self
            .request(
                Method::POST,
                &format!("/v1/subscription/{}/pay", subscription_id),
                Some(to_json(request)?),
            )
            .await?;
        parse_data(body)
    }

    pub async fn cancel_subscription(&self, subscription_id: &str) -> AppResult<()> {
        self.request(
            Method::PUT,
            &format!("/v1/subscription/{}/cancel", subscription_id),
            None,
        )
        .await?;
        Ok(())
    }

    pub async fn detail_subscription(
        &self,
        subscription_id: &str,
    ) -> AppResult<EfiSubscriptionDetail> {
        let body = self
            .request(
                Method::GET,
                &format!("/v1/subscription/{}", subscription_id),
                None,
            )
            .await?;
        parse_data(body)
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> AppResult<serde_json::Value> {
        let token = self.access_token().await?;

        let traced = TracedRequest {
            method: &method,
            path,
            body: body.as_ref(),
        };
        self.trace.on_request(&traced);
        let started = Instant::now();

        let mut builder = self
            .http
            .request(method.clone(), format!("{}{}", self.base_url, path))
            .bearer_auth(token.expose_secret());
        if let Some(json) = body.as_ref() {
            builder = builder.json(json);
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                let message = format!("Gateway request failed: {}", e);
                self.trace.on_response(
                    &traced,
                    &TracedResponse {
                        status: None,
                        body: &message,
                        elapsed_ms: started.elapsed().as_millis(),
                    },
                );
                return Err(GatewayError::transport(message).into());
            }
        };

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| GatewayError::transport(format!("Failed to read response: {}", e)))?;
        self.trace.on_response(
            &traced,
            &TracedResponse {
                status: Some(status.as_u16()),
                body: &text,
                elapsed_ms: started.elapsed().as_millis(),
            },
        );

        handle_response(status, &text).map_err(|e| {
            tracing::error!(status = %status, path, error = %e, "Gateway API error");
            AppError::Gateway(e)
        })
    }
}

fn to_json<T: Serialize>(value: &T) -> AppResult<serde_json::Value> {
    serde_json::to_value(value)
        .map_err(|e| AppError::Internal(format!("Failed to encode gateway request: {}", e)))
}

/// Turn a raw gateway answer into its JSON body or a `GatewayError`.
pub(crate) fn handle_response(
    status: StatusCode,
    body: &str,
) -> Result<serde_json::Value, GatewayError> {
    if !status.is_success() {
        return Err(gateway_error(status, body));
    }
    if body.trim().is_empty() {
        return Ok(serde_json::Value::Null);
    }
    serde_json::from_str(body).map_err(|e| GatewayError {
        status: Some(status.as_u16()),
        code: None,
        description: Some(format!("Failed to parse gateway response: {}", e)),
        body: Some(body.to_string()),
    })
}

fn gateway_error(status: StatusCode, body: &str) -> GatewayError {
    let parsed = serde_json::from_str::<EfiErrorBody>(body).ok();
    let code = parsed
        .as_ref()
        .and_then(|e| e.code.as_ref())
        .and_then(value_as_string);
    let description = parsed.as_ref().and_then(|e| {
        e.error_description
            .as_ref()
            .and_then(describe)
            .or_else(|| e.error.clone())
    });

    GatewayError {
        status: Some(status.as_u16()),
        code,
        description: description.or_else(|| status.canonical_reason().map(str::to_string)),
        body: Some(body.to_string()),
    }
}

/// `error_description` is either a string or `{ property, message }`.
fn describe(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Object(map) => {
            let message = map.get("message").and_then(|m| m.as_str());
            let property = map.get("property").and_then(|p| p.as_str());
            match (property, message) {
                (Some(p), Some(m)) => Some(format!("{}: {}", p, m)),
                (None, Some(m)) => Some(m.to_string()),
                _ => Some(value.to_string()),
            }
        }
        serde_json::Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn value_as_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Extract and decode the `data` member of a success envelope.
fn parse_data<T: DeserializeOwned>(body: serde_json::Value) -> AppResult<T> {
    let raw = body.to_string();
    let data = body.get("data").cloned().unwrap_or(serde_json::Value::Null);
    serde_json::from_value(data).map_err(|e| {
        AppError::Gateway(GatewayError {
            status: None,
            code: None,
            description: Some(format!("Unexpected gateway response shape: {}", e)),
            body: Some(raw),
        })
    })
}

/// Gateway ids arrive as numbers; they are kept as strings locally.
fn id_as_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    value_as_string(&value).ok_or_else(|| serde::de::Error::custom("expected string or number id"))
}

// ============================================================================
// Efí Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct EfiAuthResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Deserialize)]
struct EfiErrorBody {
    code: Option<serde_json::Value>,
    error: Option<String>,
    error_description: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct EfiPlanRequest {
    pub name: String,
    pub interval: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repeats: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct EfiPlan {
    #[serde(deserialize_with = "id_as_string")]
    pub plan_id: String,
    pub name: Option<String>,
    pub interval: Option<i32>,
    pub repeats: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct EfiItem {
    pub name: String,
    pub value: i64,
    pub amount: i64,
}

#[derive(Debug, Serialize)]
pub struct EfiMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EfiSubscriptionRequest {
    pub items: Vec<EfiItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<EfiMetadata>,
}

#[derive(Debug, Deserialize)]
pub struct EfiCharge {
    #[serde(alias = "id", deserialize_with = "id_as_string")]
    pub charge_id: String,
    pub status: String,
    pub total: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct EfiSubscription {
    #[serde(deserialize_with = "id_as_string")]
    pub subscription_id: String,
    pub status: String,
    #[serde(default)]
    pub charges: Vec<EfiCharge>,
}

#[derive(Debug, Serialize)]
pub struct EfiBillingAddress {
    pub street: String,
    pub number: String,
    pub neighborhood: String,
    pub zipcode: String,
    pub city: String,
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub complement: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EfiCustomer {
    pub name: String,
    pub email: String,
    pub cpf: String,
    pub birth: String,
    pub phone_number: String,
}

#[derive(Debug, Serialize)]
pub struct EfiCreditCard {
    pub billing_address: EfiBillingAddress,
    pub payment_token: String,
    pub customer: EfiCustomer,
}

#[derive(Debug, Serialize)]
pub struct EfiPaymentMethod {
    pub credit_card: EfiCreditCard,
}

#[derive(Debug, Serialize)]
pub struct EfiPayRequest {
    pub payment: EfiPaymentMethod,
}

#[derive(Debug, Deserialize)]
pub struct EfiPayment {
    #[serde(deserialize_with = "id_as_string")]
    pub subscription_id: String,
    pub status: String,
    pub charge: Option<EfiCharge>,
}

#[derive(Debug, Deserialize)]
pub struct EfiSubscriptionDetail {
    #[serde(deserialize_with = "id_as_string")]
    pub subscription_id: String,
    pub status: String,
    pub custom_id: Option<String>,
    pub plan: Option<EfiPlan>,
    #[serde(default)]
    pub history: Vec<EfiCharge>,
}
