use async_trait::async_trait;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::billing::WebhookReceiptRepo,
};

#[async_trait]
impl WebhookReceiptRepo for PostgresPersistence {
    async fn exists(&self, event_key: &str) -> AppResult<bool> {
        let found: Option<i32> =
            sqlx::query_scalar("SELECT 1 FROM webhook_receipts WHERE event_key = $1")
                .bind(event_key)
                .fetch_optional(&self.pool)
                .await
                .map_err(AppError::from)?;
        Ok(found.is_some())
    }

    async fn record(&self, event_key: &str) -> AppResult<bool> {
        let result = sqlx::query(
            "INSERT INTO webhook_receipts (event_key) VALUES ($1) ON CONFLICT (event_key) DO NOTHING",
        )
        .bind(event_key)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(result.rows_affected() == 1)
    }
}
