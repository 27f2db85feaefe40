pub mod admin_billing;
pub mod billing;
pub mod billing_webhook;
pub mod health;

use axum::{Router, middleware, routing::get};

use crate::adapters::http::{app_state::AppState, middleware::require_admin};

pub fn router(app_state: AppState) -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .nest("/billing", billing::router().merge(billing_webhook::router()))
        .nest(
            "/admin/billing",
            admin_billing::router()
                .route_layer(middleware::from_fn_with_state(app_state, require_admin)),
        )
}
