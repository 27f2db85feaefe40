use axum::{Json, extract::State, response::IntoResponse};
use serde::Serialize;

use crate::adapters::http::app_state::AppState;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    gateway: String,
    mode: String,
}

pub async fn health(State(app_state): State<AppState>) -> impl IntoResponse {
    let gateway = app_state.billing_use_cases.gateway();
    Json(HealthResponse {
        status: "ok",
        gateway: gateway.provider().as_ref().to_string(),
        mode: gateway.mode().to_string(),
    })
}
