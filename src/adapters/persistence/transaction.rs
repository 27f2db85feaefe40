use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::billing::{
        TransactionProfile, TransactionRepo, TransactionUpsertInput,
    },
    domain::entities::transaction_status::TransactionStatus,
};

fn row_to_profile(row: &sqlx::postgres::PgRow) -> TransactionProfile {
    TransactionProfile {
        id: row.get("id"),
        tenant_id: row.get("tenant_id"),
        subscription_id: row.get("subscription_id"),
        gateway_charge_id: row.get("gateway_charge_id"),
        status: row.get("status"),
        amount_cents: row.get("amount_cents"),
        currency: row.get("currency"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

const SELECT_COLS: &str = r#"
    id, tenant_id, subscription_id, gateway_charge_id, status, amount_cents, currency,
    created_at, updated_at
"#;

#[async_trait]
impl TransactionRepo for PostgresPersistence {
    async fn upsert_by_charge_id(
        &self,
        input: &TransactionUpsertInput,
    ) -> AppResult<TransactionProfile> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO billing_transactions (
                tenant_id, subscription_id, gateway_charge_id, status, amount_cents, currency
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (gateway_charge_id) DO UPDATE SET
                status = CASE
                    WHEN billing_transactions.status IN ('paid', 'failed')
                    THEN billing_transactions.status
                    ELSE EXCLUDED.status
                END,
                amount_cents = EXCLUDED.amount_cents,
                subscription_id = COALESCE(EXCLUDED.subscription_id, billing_transactions.subscription_id),
                updated_at = NOW()
            RETURNING {}
            "#,
            SELECT_COLS
        ))
        .bind(input.tenant_id)
        .bind(input.subscription_id)
        .bind(&input.gateway_charge_id)
        .bind(input.status)
        .bind(input.amount_cents)
        .bind(&input.currency)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row_to_profile(&row))
    }

    async fn set_status_by_charge_id(
        &self,
        gateway_charge_id: &str,
        status: TransactionStatus,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE billing_transactions
            SET status = $2, updated_at = NOW()
            WHERE gateway_charge_id = $1
            "#,
        )
        .bind(gateway_charge_id)
        .bind(status)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_recent_by_tenant(
        &self,
        tenant_id: Uuid,
        limit: i64,
    ) -> AppResult<Vec<TransactionProfile>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {} FROM billing_transactions
            WHERE tenant_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
            SELECT_COLS
        ))
        .bind(tenant_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(rows.iter().map(row_to_profile).collect())
    }
}
