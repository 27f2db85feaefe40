use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::billing::{TenantProfile, TenantRepo},
};

fn row_to_profile(row: &sqlx::postgres::PgRow) -> TenantProfile {
    TenantProfile {
        id: row.get("id"),
        name: row.get("name"),
        plan_slug: row.get("plan_slug"),
        max_employees: row.get("max_employees"),
        feature_overrides: row.get("feature_overrides"),
        current_subscription_id: row.get("current_subscription_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

const SELECT_COLS: &str = r#"
    id, name, plan_slug, max_employees, feature_overrides, current_subscription_id,
    created_at, updated_at
"#;

#[async_trait]
impl TenantRepo for PostgresPersistence {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<TenantProfile>> {
        let row = sqlx::query(&format!("SELECT {} FROM tenants WHERE id = $1", SELECT_COLS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::from)?;
        Ok(row.as_ref().map(row_to_profile))
    }

    async fn list_all(&self) -> AppResult<Vec<TenantProfile>> {
        let rows = sqlx::query(&format!("SELECT {} FROM tenants ORDER BY name", SELECT_COLS))
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::from)?;
        Ok(rows.iter().map(row_to_profile).collect())
    }

    async fn set_current_subscription(
        &self,
        tenant_id: Uuid,
        subscription_id: Option<Uuid>,
    ) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE tenants SET current_subscription_id = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(tenant_id)
        .bind(subscription_id)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    async fn clear_current_subscription_if(
        &self,
        tenant_id: Uuid,
        subscription_id: Uuid,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE tenants
            SET current_subscription_id = NULL, updated_at = NOW()
            WHERE id = $1 AND current_subscription_id = $2
            "#,
        )
        .bind(tenant_id)
        .bind(subscription_id)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(result.rows_affected() > 0)
    }
}
