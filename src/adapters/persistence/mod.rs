use sqlx::PgPool;
use uuid::Uuid;

use crate::app_error::AppError;

const MAX_JSON_LOG_LEN: usize = 200;

/// Leading `MAX_JSON_LOG_LEN` bytes of a JSON column, cut on a char boundary.
fn json_excerpt(json: &serde_json::Value) -> String {
    let raw = json.to_string();
    if raw.len() <= MAX_JSON_LOG_LEN {
        return raw;
    }
    let cut = (0..=MAX_JSON_LOG_LEN)
        .rev()
        .find(|i| raw.is_char_boundary(*i))
        .unwrap_or(0);
    format!("{}...", &raw[..cut])
}

/// Decode a JSONB column. NULL and undecodable values become `T::default()`;
/// the latter is logged with the owning table and row.
pub fn parse_json_column<T: serde::de::DeserializeOwned + Default>(
    json: &serde_json::Value,
    column: &str,
    table: &str,
    row_id: Uuid,
) -> T {
    if json.is_null() {
        return T::default();
    }

    serde_json::from_value(json.clone()).unwrap_or_else(|err| {
        tracing::warn!(
            table,
            column,
            row_id = %row_id,
            raw_json = %json_excerpt(json),
            error = %err,
            "Undecodable JSON column, using default"
        );
        T::default()
    })
}

pub mod billing_audit;
pub mod billing_plan;
pub mod subscription;
pub mod tenant;
pub mod transaction;
pub mod webhook_receipt;

#[derive(Clone)]
pub struct PostgresPersistence {
    pool: PgPool,
}

impl PostgresPersistence {
    pub fn new(pool: PgPool) -> Self {
        PostgresPersistence { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Billing entity owning a constraint, from Postgres' default
/// `<table>_<column>_key` / `<table>_<column>_fkey` naming.
fn constrained_entity(constraint: Option<&str>) -> &'static str {
    const TABLES: [(&str, &str); 6] = [
        ("billing_plans_", "Billing plan"),
        ("subscriptions_", "Subscription"),
        ("billing_transactions_", "Billing transaction"),
        ("billing_audit_log_", "Audit record"),
        ("webhook_receipts_", "Webhook receipt"),
        ("fk_tenants_", "Tenant"),
    ];
    let constraint = constraint.unwrap_or_default();
    TABLES
        .iter()
        .find(|(prefix, _)| constraint.starts_with(prefix))
        .map_or("Billing record", |(_, entity)| *entity)
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        use sqlx::error::ErrorKind;

        match &err {
            sqlx::Error::RowNotFound => AppError::NotFound,
            sqlx::Error::Database(db_err) => {
                let entity = constrained_entity(db_err.constraint());
                match db_err.kind() {
                    ErrorKind::UniqueViolation => AppError::InvalidInput(format!(
                        "{} with this gateway id or slug already exists",
                        entity
                    )),
                    ErrorKind::ForeignKeyViolation => AppError::InvalidInput(format!(
                        "{} references a tenant, plan or subscription that does not exist",
                        entity
                    )),
                    ErrorKind::NotNullViolation => {
                        AppError::InvalidInput(format!("{} is missing a required column", entity))
                    }
                    _ => {
                        tracing::error!(error = ?err, "Billing store error");
                        AppError::Database("Database operation failed".into())
                    }
                }
            }
            _ => {
                tracing::error!(error = ?err, "Billing store error");
                AppError::Database("Database operation failed".into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_json_valid_array() {
        let json = serde_json::json!(["recruitment", "analytics"]);
        let result: Vec<String> = parse_json_column(&json, "features", "billing_plans", Uuid::nil());
        assert_eq!(result, vec!["recruitment", "analytics"]);
    }

    #[test]
    fn parse_json_sql_null_returns_default() {
        let result: Vec<String> =
            parse_json_column(&serde_json::Value::Null, "features", "billing_plans", Uuid::nil());
        assert!(result.is_empty());
    }

    #[test]
    fn parse_json_wrong_structure_returns_default() {
        let json = serde_json::json!({"key": "value"});
        let result: Vec<String> = parse_json_column(&json, "features", "billing_plans", Uuid::nil());
        assert!(result.is_empty());
    }

    #[test]
    fn parse_json_truncates_multibyte_payload_safely() {
        let json = serde_json::json!("ç".repeat(300));
        let result: Vec<String> = parse_json_column(&json, "features", "billing_plans", Uuid::nil());
        assert!(result.is_empty());
    }

    #[test]
    fn long_json_excerpt_is_cut() {
        let excerpt = json_excerpt(&serde_json::json!("ç".repeat(300)));
        assert!(excerpt.ends_with("..."));
        assert!(excerpt.len() <= MAX_JSON_LOG_LEN + 3);
    }

    #[test]
    fn constraint_names_map_to_billing_entities() {
        assert_eq!(
            constrained_entity(Some("subscriptions_gateway_subscription_id_key")),
            "Subscription"
        );
        assert_eq!(
            constrained_entity(Some("billing_transactions_gateway_charge_id_key")),
            "Billing transaction"
        );
        assert_eq!(constrained_entity(Some("billing_plans_slug_key")), "Billing plan");
        assert_eq!(constrained_entity(None), "Billing record");
    }

    #[test]
    fn row_not_found_maps_to_not_found() {
        assert!(matches!(AppError::from(sqlx::Error::RowNotFound), AppError::NotFound));
    }
}
