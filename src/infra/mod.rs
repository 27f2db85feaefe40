use crate::{adapters::persistence::PostgresPersistence, infra::db::init_db};

pub mod app;
pub mod config;
pub mod db;
pub mod dummy_gateway_client;
pub mod efi_client;
pub mod efi_gateway_adapter;
pub mod error;
pub mod gateway_credentials;
pub mod gateway_factory;
pub mod gateway_trace;
pub mod http_client;
pub mod reconciliation_loop;
pub mod setup;
pub mod webhook_signature;

pub async fn postgres_persistence(database_url: &str) -> anyhow::Result<PostgresPersistence> {
    let pool = init_db(database_url).await?;
    let persistence = PostgresPersistence::new(pool);
    Ok(persistence)
}
