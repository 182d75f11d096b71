use anyhow::{Context, Result};
use catalog_sync::api::ApiServer;
use catalog_sync::database_ops::{CatalogStore, Db, MemoryCatalogStore, PgCatalogStore};
use catalog_sync::orchestrator::{SyncConfig, SyncService};
use catalog_sync::tracing::{init_tracing, DEFAULT_FILTER};
use catalog_sync::util::env as env_util;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "catalog-sync", version, about = "Product catalog scraper and price tracker")]
struct Cli {
    /// Optional override for the database URL
    #[arg(long, global = true)]
    db_url: Option<String>,
    /// Override FETCH_CONCURRENCY
    #[arg(long, global = true)]
    concurrency: Option<usize>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
#[command(rename_all = "kebab-case")]
enum Commands {
    /// Run the HTTP API
    Serve {
        /// Override API_PORT
        #[arg(long)]
        port: Option<u16>,
    },
    /// Scrape one product and reconcile it into the catalog
    Read {
        product_id: i64,
        /// Reconcile against an empty in-memory catalog instead of Postgres
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },
    /// Re-scrape every stored product and record a new price for each variant
    Pop,
    /// Print the stored catalog with price history as JSON
    Products,
    /// Apply pending SQL migrations
    Migrate {
        #[arg(long, default_value = "./migrations")]
        dir: PathBuf,
    },
}

async fn connect(db_url: Option<&str>) -> Result<Db> {
    let database_url = match db_url {
        Some(url) => url.to_string(),
        None => env_util::db_url()?,
    };
    let max_connections: u32 = env_util::env_parse("DB_MAX_CONNS", 10u32);
    Db::connect(&database_url, max_connections).await
}

async fn pg_store(db_url: Option<&str>) -> Result<Arc<dyn CatalogStore>> {
    Ok(Arc::new(PgCatalogStore::new(connect(db_url).await?)))
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = SyncConfig::from_env();
    if let Some(n) = cli.concurrency {
        config.fetch_concurrency = n.max(1);
    }
    let db_url = cli.db_url.as_deref();

    match cli.command {
        Commands::Serve { port } => {
            env_util::preflight_check(
                "serve",
                &[],
                &["DATABASE_URL", "API_HOST", "API_PORT", "API_SECRET", "CATALOG_BASE_URL"],
            )?;
            let server = ApiServer::from_env()?.with_port(port);
            let service = SyncService::with_http(&config, pg_store(db_url).await?)?;
            server.run(service).await
        }
        Commands::Read {
            product_id,
            dry_run,
        } => {
            let store: Arc<dyn CatalogStore> = if dry_run {
                Arc::new(MemoryCatalogStore::new())
            } else {
                pg_store(db_url).await?
            };
            let service = SyncService::with_http(&config, store)?;
            let (record, outcome) = service.read(product_id).await?;
            info!(
                product_id,
                brand_inserted = outcome.brand_inserted,
                product_inserted = outcome.product_inserted,
                variants = outcome.variants_inserted,
                prices = outcome.prices_inserted,
                dry_run,
                "read complete"
            );
            println!("{}", serde_json::to_string_pretty(&record)?);
            Ok(())
        }
        Commands::Pop => {
            let service = SyncService::with_http(&config, pg_store(db_url).await?)?;
            let report = service.sync_all().await?;
            println!("{}", serde_json::to_string_pretty(&report.products)?);
            Ok(())
        }
        Commands::Products => {
            let store = pg_store(db_url).await?;
            let entries = store.catalog().await?;
            println!("{}", serde_json::to_string_pretty(&entries)?);
            Ok(())
        }
        Commands::Migrate { dir } => {
            let db = connect(db_url).await?;
            db.migrate(&dir)
                .await
                .with_context(|| format!("migrating from {}", dir.display()))
        }
    }
}

#[actix_web::main]
async fn main() -> Result<()> {
    env_util::init_env();
    init_tracing(DEFAULT_FILTER)?;

    let cli = Cli::parse();
    let command = format!("{:?}", cli.command);
    if let Err(err) = run(cli).await {
        error!(command, error = ?err, "command failed");
        return Err(err);
    }
    Ok(())
}
