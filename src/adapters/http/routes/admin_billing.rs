use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    adapters::http::app_state::AppState,
    app_error::{AppError, AppResult},
    use_cases::billing_admin::AdminBillingAction,
};

/// Back-office routes. Mounted behind `require_admin`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/overview", get(overview))
        .route("/action", post(action))
}

#[derive(Deserialize)]
struct ActionPayload {
    action: AdminBillingAction,
    subscription_id: Uuid,
}

/// GET /api/admin/billing/overview
async fn overview(State(app_state): State<AppState>) -> AppResult<impl IntoResponse> {
    let tenants = app_state.billing_use_cases.billing_overview().await?;
    Ok(Json(serde_json::json!({ "tenants": tenants })))
}

/// POST /api/admin/billing/action
async fn action(
    State(app_state): State<AppState>,
    payload: Result<Json<ActionPayload>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let Json(payload) = payload.map_err(|e| AppError::InvalidInput(e.body_text()))?;

    let result = app_state
        .billing_use_cases
        .admin_billing_action(payload.action, payload.subscription_id)
        .await?;

    Ok(Json(result))
}
