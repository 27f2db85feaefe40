use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    response::IntoResponse,
    routing::post,
};

use crate::{
    adapters::http::app_state::AppState,
    use_cases::{
        billing::{BillingFailure, BillingResult},
        provisioning::CheckoutRequest,
    },
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/subscribe", post(subscribe))
        .route("/change-plan", post(change_plan))
}

/// Malformed bodies are reported as validation failures, like missing fields.
fn checkout_body(
    payload: Result<Json<CheckoutRequest>, JsonRejection>,
) -> BillingResult<CheckoutRequest> {
    payload
        .map(|Json(req)| req)
        .map_err(|rejection| BillingFailure::validation(rejection.body_text()))
}

/// POST /api/billing/subscribe
async fn subscribe(
    State(app_state): State<AppState>,
    payload: Result<Json<CheckoutRequest>, JsonRejection>,
) -> BillingResult<impl IntoResponse> {
    let req = checkout_body(payload)?;
    let outcome = app_state.billing_use_cases.provision(&req).await?;
    Ok(Json(outcome))
}

/// POST /api/billing/change-plan
async fn change_plan(
    State(app_state): State<AppState>,
    payload: Result<Json<CheckoutRequest>, JsonRejection>,
) -> BillingResult<impl IntoResponse> {
    let req = checkout_body(payload)?;
    let outcome = app_state.billing_use_cases.change_plan(&req).await?;
    Ok(Json(outcome))
}
