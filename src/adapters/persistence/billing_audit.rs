use async_trait::async_trait;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::billing::{BillingAuditRepo, NewAuditRecord},
};

#[async_trait]
impl BillingAuditRepo for PostgresPersistence {
    async fn record(&self, input: &NewAuditRecord) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO billing_audit_log (provider, event_type, payload, headers)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&input.provider)
        .bind(&input.event_type)
        .bind(&input.payload)
        .bind(&input.headers)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(())
    }
}
