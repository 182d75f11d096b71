// API server implementation using actix-web

use crate::api::{auth, middleware, routes};
use crate::orchestrator::SyncService;
use crate::util::env::{env_opt, env_parse};
use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};

pub struct ApiServer {
    pub host: String,
    pub port: u16,
    pub api_secret: Option<String>,
    pub allowed_origins: String,
}

impl ApiServer {
    /// Create server from environment variables
    pub fn from_env() -> Result<Self> {
        crate::util::env::init_env();

        let host = env_opt("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = match env_opt("API_PORT") {
            Some(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("Invalid API_PORT {raw:?}"))?,
            None => 8080,
        };
        let api_secret = env_opt("API_SECRET");
        if api_secret.is_none() {
            tracing::warn!("API_SECRET not set; endpoints are unauthenticated");
        }
        let allowed_origins = env_opt("ALLOWED_ORIGINS")
            .unwrap_or_else(|| "http://localhost:3000".to_string());

        Ok(Self {
            host,
            port,
            api_secret,
            allowed_origins,
        })
    }

    /// Override the bind port (e.g. from a CLI flag).
    pub fn with_port(mut self, port: Option<u16>) -> Self {
        if let Some(port) = port {
            self.port = port;
        }
        self
    }

    /// Start the HTTP server
    pub async fn run(self, service: SyncService) -> Result<()> {
        let bind_addr = format!("{}:{}", self.host, self.port);
        let workers = env_parse("API_WORKERS", num_workers_default());

        tracing::info!(
            host = %self.host,
            port = %self.port,
            workers,
            auth = self.api_secret.is_some(),
            "Starting catalog-sync API server"
        );

        let service_data = web::Data::new(service);
        let api_secret = self.api_secret.clone();
        let allowed_origins = self.allowed_origins.clone();

        HttpServer::new(move || {
            let (logger, compress) = middleware::setup_middleware();
            let cors = middleware::setup_cors(&allowed_origins);
            let auth = auth::Auth::new(api_secret.clone());

            App::new()
                .app_data(service_data.clone())
                .wrap(auth)
                .wrap(cors)
                .wrap(compress)
                .wrap(logger)
                .configure(routes::configure_routes)
        })
        .workers(workers)
        .bind(&bind_addr)
        .with_context(|| format!("Failed to bind to {}", bind_addr))?
        .run()
        .await
        .context("HTTP server error")?;

        Ok(())
    }
}

fn num_workers_default() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(2)
}
