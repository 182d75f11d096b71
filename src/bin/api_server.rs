// HTTP API server binary for catalog-sync

use anyhow::Result;
use catalog_sync::api::ApiServer;
use catalog_sync::database_ops::{Db, PgCatalogStore};
use catalog_sync::orchestrator::{SyncConfig, SyncService};
use catalog_sync::tracing::{init_tracing, DEFAULT_FILTER};
use catalog_sync::util::env as env_util;
use std::sync::Arc;

#[actix_web::main]
async fn main() -> Result<()> {
    // Load dotenv/env once (safe to call multiple times)
    env_util::init_env();
    init_tracing(DEFAULT_FILTER)?;

    tracing::info!("Initializing catalog-sync API server");

    let server = ApiServer::from_env()?;

    let database_url = env_util::db_url()?;
    let max_connections: u32 = env_util::env_parse("DB_MAX_CONNS", 10u32);
    let db = Db::connect(&database_url, max_connections).await?;
    tracing::info!("Database connected successfully");

    let service = SyncService::with_http(&SyncConfig::from_env(), Arc::new(PgCatalogStore::new(db)))?;
    server.run(service).await
}
