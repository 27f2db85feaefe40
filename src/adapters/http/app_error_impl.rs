use crate::app_error::{AppError, ErrorCode};
use crate::use_cases::billing::BillingFailure;
use axum::Json;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the error before it gets converted into a status response.
        tracing::error!(error = ?self, "Request failed");

        match self {
            AppError::Database(_) => {
                error_resp(StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::DatabaseError, None)
            }
            AppError::InvalidCredentials => {
                error_resp(StatusCode::UNAUTHORIZED, ErrorCode::InvalidCredentials, None)
            }
            AppError::Forbidden => error_resp(StatusCode::FORBIDDEN, ErrorCode::Forbidden, None),
            AppError::InvalidInput(msg) => {
                error_resp(StatusCode::BAD_REQUEST, ErrorCode::InvalidInput, Some(msg))
            }
            AppError::NotFound => error_resp(StatusCode::NOT_FOUND, ErrorCode::NotFound, None),
            AppError::Config(msg) => error_resp(
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorCode::ConfigError,
                Some(msg),
            ),
            AppError::Gateway(e) => error_resp(
                StatusCode::BAD_GATEWAY,
                ErrorCode::GatewayError,
                Some(e.to_string()),
            ),
            AppError::Internal(_) => {
                error_resp(StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::InternalError, None)
            }
        }
    }
}

fn error_resp(status: StatusCode, code: ErrorCode, message: Option<String>) -> Response {
    let body = match message {
        Some(msg) => serde_json::json!({ "code": code.as_str(), "message": msg }),
        None => serde_json::json!({ "code": code.as_str() }),
    };
    (status, Json(body)).into_response()
}

fn billing_status(error: &AppError) -> StatusCode {
    match error {
        AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        AppError::NotFound => StatusCode::NOT_FOUND,
        AppError::Gateway(_) => StatusCode::BAD_GATEWAY,
        AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
        AppError::Forbidden => StatusCode::FORBIDDEN,
        AppError::Config(_) | AppError::Database(_) | AppError::Internal(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Staged billing failures answer `{ error, stage, hint?, details? }`.
impl IntoResponse for BillingFailure {
    fn into_response(self) -> Response {
        tracing::error!(stage = %self.stage, error = ?self.error, "Billing request failed");

        let status = billing_status(&self.error);
        let message = match &self.error {
            // Database and internal messages stay in the logs
            AppError::Database(_) => "Database operation failed".to_string(),
            AppError::Internal(_) => "Internal error".to_string(),
            other => other.to_string(),
        };

        let mut body = serde_json::json!({
            "error": message,
            "stage": self.stage.as_str(),
        });
        if let Some(hint) = self.stage.hint() {
            body["hint"] = serde_json::Value::from(hint);
        }
        if let Some(gateway) = self.error.as_gateway() {
            body["details"] = gateway.details();
        }

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::payment_gateway::GatewayError;
    use crate::domain::entities::billing_stage::BillingStage;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn validation_failure_is_bad_request_with_hint() {
        let response = BillingFailure::validation("Missing fields: customer.cpf").into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["stage"], "validation");
        assert!(body["error"].as_str().unwrap().contains("customer.cpf"));
        assert!(body["hint"].is_string());
        assert!(body.get("details").is_none());
    }

    #[tokio::test]
    async fn gateway_failure_is_bad_gateway_with_details() {
        let failure = BillingFailure::new(
            BillingStage::Payment,
            AppError::Gateway(GatewayError {
                status: Some(400),
                code: Some("3500034".into()),
                description: Some("Card declined".into()),
                body: None,
            }),
        );

        let response = failure.into_response();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = body_json(response).await;
        assert_eq!(body["stage"], "payment");
        assert_eq!(body["details"]["code"], "3500034");
        assert_eq!(body["details"]["status"], 400);
    }

    #[tokio::test]
    async fn config_failure_is_server_error() {
        let failure = BillingFailure::new(
            BillingStage::Config,
            AppError::Config("GATEWAY_CLIENT_ID is not set".into()),
        );

        let response = failure.into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["stage"], "config");
    }

    #[tokio::test]
    async fn missing_tenant_is_not_found_and_database_text_is_hidden() {
        let not_found = BillingFailure::new(BillingStage::Validation, AppError::NotFound);
        assert_eq!(not_found.into_response().status(), StatusCode::NOT_FOUND);

        let db = BillingFailure::new(
            BillingStage::Persist,
            AppError::Database("relation \"subscriptions\" does not exist".into()),
        );
        let body = body_json(db.into_response()).await;
        assert_eq!(body["error"], "Database operation failed");
        assert!(body.get("hint").is_none());
    }

    #[tokio::test]
    async fn app_error_uses_code_shape() {
        let response = AppError::Forbidden.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = body_json(response).await;
        assert_eq!(body, serde_json::json!({ "code": "FORBIDDEN" }));
    }
}
