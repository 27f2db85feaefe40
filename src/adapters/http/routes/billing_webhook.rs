//! Gateway payment notifications.

use axum::{
    Json, Router,
    extract::State,
    http::HeaderMap,
    response::IntoResponse,
    routing::post,
};
use secrecy::ExposeSecret;
use tracing::{error, info, warn};

use crate::{
    adapters::http::app_state::AppState,
    app_error::{AppError, AppResult},
    infra::webhook_signature::{SIGNATURE_HEADER, verify_signature},
    use_cases::billing_webhook::GatewayNotification,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/webhook", post(gateway_webhook))
}

fn received() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "received": true }))
}

/// POST /api/billing/webhook
///
/// Once the signature checks out (or no secret is configured) the gateway
/// always gets `200 {"received": true}`; unknown ids, other statuses and
/// processing errors are logged, never surfaced.
async fn gateway_webhook(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> AppResult<impl IntoResponse> {
    if let Some(secret) = app_state.config.webhook_secret.as_ref() {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                warn!("Gateway notification without signature");
                AppError::InvalidCredentials
            })?;
        verify_signature(&body, signature, secret.expose_secret()).inspect_err(|_| {
            warn!("Gateway notification signature mismatch");
        })?;
    }

    let payload: serde_json::Value = match serde_json::from_str(&body) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(error = %e, "Gateway notification is not JSON");
            return Ok(received());
        }
    };

    let Some(notification) = GatewayNotification::from_payload(&payload) else {
        warn!("Gateway notification without subscription_id or status");
        return Ok(received());
    };

    match app_state
        .billing_use_cases
        .handle_gateway_notification(&notification)
        .await
    {
        Ok(outcome) => info!(
            gateway_subscription_id = %notification.subscription_id,
            status = %notification.status,
            outcome = ?outcome,
            "Gateway notification handled"
        ),
        Err(e) => error!(
            gateway_subscription_id = %notification.subscription_id,
            error = %e,
            "Gateway notification processing failed"
        ),
    }

    Ok(received())
}
