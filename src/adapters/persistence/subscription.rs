use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::billing::{
        NewSubscriptionInput, SubscriptionProfile, SubscriptionRepo, SubscriptionUpsertInput,
        TenantEntitlement,
    },
    domain::entities::subscription::SubscriptionStatus,
};

fn row_to_profile(row: &sqlx::postgres::PgRow) -> SubscriptionProfile {
    SubscriptionProfile {
        id: row.get("id"),
        tenant_id: row.get("tenant_id"),
        plan_id: row.get("plan_id"),
        status: row.get("status"),
        gateway_subscription_id: row.get("gateway_subscription_id"),
        last_charge_id: row.get("last_charge_id"),
        created_at: row.get("created_at"),
        started_at: row.get("started_at"),
        canceled_at: row.get("canceled_at"),
        updated_at: row.get("updated_at"),
    }
}

const SELECT_COLS: &str = r#"
    id, tenant_id, plan_id, status, gateway_subscription_id, last_charge_id,
    created_at, started_at, canceled_at, updated_at
"#;

// `started_at`/`canceled_at` are stamped once, the first time the row reaches that status.
const STAMP_COLS: &str = r#"
    started_at = CASE WHEN $2 = 'active'::subscription_status
        THEN COALESCE(subscriptions.started_at, NOW()) ELSE subscriptions.started_at END,
    canceled_at = CASE WHEN $2 = 'canceled'::subscription_status
        THEN COALESCE(subscriptions.canceled_at, NOW()) ELSE subscriptions.canceled_at END
"#;

#[async_trait]
impl SubscriptionRepo for PostgresPersistence {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<SubscriptionProfile>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM subscriptions WHERE id = $1",
            SELECT_COLS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.as_ref().map(row_to_profile))
    }

    async fn get_by_gateway_id(
        &self,
        gateway_subscription_id: &str,
    ) -> AppResult<Option<SubscriptionProfile>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM subscriptions WHERE gateway_subscription_id = $1",
            SELECT_COLS
        ))
        .bind(gateway_subscription_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.as_ref().map(row_to_profile))
    }

    async fn get_active_by_tenant(
        &self,
        tenant_id: Uuid,
    ) -> AppResult<Option<SubscriptionProfile>> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {} FROM subscriptions
            WHERE tenant_id = $1 AND status = 'active'
            ORDER BY created_at DESC
            LIMIT 1
            "#,
            SELECT_COLS
        ))
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.as_ref().map(row_to_profile))
    }

    async fn list_by_tenant(&self, tenant_id: Uuid) -> AppResult<Vec<SubscriptionProfile>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM subscriptions WHERE tenant_id = $1 ORDER BY created_at DESC",
            SELECT_COLS
        ))
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(rows.iter().map(row_to_profile).collect())
    }

    async fn list_open_by_tenant(&self, tenant_id: Uuid) -> AppResult<Vec<SubscriptionProfile>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {} FROM subscriptions
            WHERE tenant_id = $1
              AND status <> 'canceled'
              AND gateway_subscription_id IS NOT NULL
            ORDER BY created_at DESC
            "#,
            SELECT_COLS
        ))
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(rows.iter().map(row_to_profile).collect())
    }

    async fn list_tenants_with_open_duplicates(&self) -> AppResult<Vec<Uuid>> {
        let rows = sqlx::query(
            r#"
            SELECT tenant_id FROM subscriptions
            WHERE status <> 'canceled' AND gateway_subscription_id IS NOT NULL
            GROUP BY tenant_id
            HAVING COUNT(*) > 1
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(rows.iter().map(|row| row.get("tenant_id")).collect())
    }

    async fn create(&self, input: &NewSubscriptionInput) -> AppResult<SubscriptionProfile> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO subscriptions (tenant_id, plan_id, status, gateway_subscription_id)
            VALUES ($1, $2, $3, $4)
            RETURNING {}
            "#,
            SELECT_COLS
        ))
        .bind(input.tenant_id)
        .bind(input.plan_id)
        .bind(input.status)
        .bind(&input.gateway_subscription_id)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row_to_profile(&row))
    }

    async fn upsert_by_gateway_id(
        &self,
        input: &SubscriptionUpsertInput,
    ) -> AppResult<SubscriptionProfile> {
        // $2 is the status so STAMP_COLS can reference it.
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO subscriptions (
                gateway_subscription_id, status, tenant_id, plan_id, last_charge_id,
                started_at, canceled_at
            )
            VALUES (
                $1, $2, $3, $4, $5,
                CASE WHEN $2 = 'active'::subscription_status THEN NOW() END,
                CASE WHEN $2 = 'canceled'::subscription_status THEN NOW() END
            )
            ON CONFLICT (gateway_subscription_id) DO UPDATE SET
                status = EXCLUDED.status,
                plan_id = EXCLUDED.plan_id,
                last_charge_id = COALESCE(EXCLUDED.last_charge_id, subscriptions.last_charge_id),
                {},
                updated_at = NOW()
            RETURNING {}
            "#,
            STAMP_COLS, SELECT_COLS
        ))
        .bind(&input.gateway_subscription_id)
        .bind(input.status)
        .bind(input.tenant_id)
        .bind(input.plan_id)
        .bind(&input.last_charge_id)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row_to_profile(&row))
    }

    async fn set_status(
        &self,
        id: Uuid,
        status: SubscriptionStatus,
    ) -> AppResult<SubscriptionProfile> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE subscriptions SET
                status = $2,
                {},
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            STAMP_COLS, SELECT_COLS
        ))
        .bind(id)
        .bind(status)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;

        row.as_ref().map(row_to_profile).ok_or(AppError::NotFound)
    }

    async fn activate(
        &self,
        id: Uuid,
        entitlement: &TenantEntitlement,
    ) -> AppResult<SubscriptionProfile> {
        let mut tx = self.pool.begin().await.map_err(AppError::from)?;

        let row = sqlx::query(&format!(
            r#"
            UPDATE subscriptions SET
                status = $2,
                {},
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            STAMP_COLS, SELECT_COLS
        ))
        .bind(id)
        .bind(SubscriptionStatus::Active)
        .fetch_optional(&mut *tx)
        .await
        .map_err(AppError::from)?;

        let Some(row) = row else {
            tx.rollback().await.ok();
            return Err(AppError::NotFound);
        };
        let subscription = row_to_profile(&row);

        let result = sqlx::query(
            r#"
            UPDATE tenants SET
                current_subscription_id = $2,
                plan_slug = $3,
                max_employees = COALESCE($4, max_employees),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(subscription.tenant_id)
        .bind(subscription.id)
        .bind(&entitlement.plan_slug)
        .bind(entitlement.seat_limit)
        .execute(&mut *tx)
        .await
        .map_err(AppError::from)?;

        if result.rows_affected() == 0 {
            tx.rollback().await.ok();
            return Err(AppError::NotFound);
        }

        tx.commit().await.map_err(AppError::from)?;
        Ok(subscription)
    }
}
