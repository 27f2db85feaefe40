use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::billing::{BillingPlanProfile, BillingPlanRepo},
};

fn row_to_profile(row: &sqlx::postgres::PgRow) -> BillingPlanProfile {
    let id: Uuid = row.get("id");
    let features_json: serde_json::Value = row.get("features");
    let features: Vec<String> =
        super::parse_json_column(&features_json, "features", "billing_plans", id);

    BillingPlanProfile {
        id,
        slug: row.get("slug"),
        name: row.get("name"),
        price_cents: row.get("price_cents"),
        currency: row.get("currency"),
        interval_months: row.get("interval_months"),
        repeats: row.get("repeats"),
        gateway_plan_id: row.get("gateway_plan_id"),
        features,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

const SELECT_COLS: &str = r#"
    id, slug, name, price_cents, currency, interval_months, repeats, gateway_plan_id,
    features, created_at, updated_at
"#;

#[async_trait]
impl BillingPlanRepo for PostgresPersistence {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<BillingPlanProfile>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM billing_plans WHERE id = $1",
            SELECT_COLS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.as_ref().map(row_to_profile))
    }

    async fn get_by_slug(&self, slug: &str) -> AppResult<Option<BillingPlanProfile>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM billing_plans WHERE slug = $1",
            SELECT_COLS
        ))
        .bind(slug)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.as_ref().map(row_to_profile))
    }

    async fn set_gateway_plan_id_if_absent(
        &self,
        id: Uuid,
        gateway_plan_id: &str,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE billing_plans
            SET gateway_plan_id = $2, updated_at = NOW()
            WHERE id = $1 AND gateway_plan_id IS NULL
            "#,
        )
        .bind(id)
        .bind(gateway_plan_id)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(result.rows_affected() == 1)
    }
}
