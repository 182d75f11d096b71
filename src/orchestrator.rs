//! Fetch → extract → reconcile pipeline.
//!
//! `sync_all` runs in two phases: a bounded-concurrency fetch stage that
//! downloads and normalizes every known product, then a strictly sequential
//! reconciliation stage. Reconciliations from overlapping requests are
//! serialized per brand through [`ProductLocks`].

use anyhow::{Context, Result};
use futures::{stream, StreamExt, TryStreamExt};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{info, instrument};

use crate::catalog::extract::extract_product_data;
use crate::catalog::fetch::{HttpPageFetcher, PageFetcher, DEFAULT_CATALOG_BASE_URL, DEFAULT_USER_AGENT};
use crate::catalog::models::ScrapedProduct;
use crate::catalog::reconcile::ReconcileOutcome;
use crate::database_ops::store::CatalogStore;
use crate::normalization::normalize_product;
use crate::util::env::{env_opt, env_parse};

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub catalog_base_url: String,
    pub fetch_concurrency: usize,
    pub fetch_timeout: Duration,
    pub user_agent: String,
    pub lock_stripes: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            catalog_base_url: DEFAULT_CATALOG_BASE_URL.to_string(),
            fetch_concurrency: 8,
            fetch_timeout: Duration::from_secs(20),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            lock_stripes: 64,
        }
    }
}

impl SyncConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            catalog_base_url: env_opt("CATALOG_BASE_URL").unwrap_or(defaults.catalog_base_url),
            fetch_concurrency: env_parse("FETCH_CONCURRENCY", defaults.fetch_concurrency).max(1),
            fetch_timeout: Duration::from_secs(env_parse("FETCH_TIMEOUT_SECS", 20u64)),
            user_agent: env_opt("FETCH_USER_AGENT").unwrap_or(defaults.user_agent),
            lock_stripes: env_parse("SYNC_LOCK_STRIPES", defaults.lock_stripes).max(1),
        }
    }
}

/// Fixed table of async mutexes; a key always maps to the same stripe.
pub struct ProductLocks {
    stripes: Vec<Mutex<()>>,
}

impl ProductLocks {
    pub fn new(stripes: usize) -> Self {
        Self {
            stripes: (0..stripes.max(1)).map(|_| Mutex::new(())).collect(),
        }
    }

    pub fn stripe_of(&self, key: i64) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() % self.stripes.len() as u64) as usize
    }

    pub async fn lock(&self, key: i64) -> MutexGuard<'_, ()> {
        self.stripes[self.stripe_of(key)].lock().await
    }
}

/// Result of a full sync: normalized records in input order plus the writes
/// performed for each.
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    pub products: Vec<ScrapedProduct>,
    pub outcomes: Vec<ReconcileOutcome>,
}

#[derive(Clone)]
pub struct SyncService {
    fetcher: Arc<dyn PageFetcher>,
    store: Arc<dyn CatalogStore>,
    locks: Arc<ProductLocks>,
    fetch_concurrency: usize,
}

impl SyncService {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        store: Arc<dyn CatalogStore>,
        fetch_concurrency: usize,
        lock_stripes: usize,
    ) -> Self {
        Self {
            fetcher,
            store,
            locks: Arc::new(ProductLocks::new(lock_stripes)),
            fetch_concurrency: fetch_concurrency.max(1),
        }
    }

    /// Service fetching over HTTP according to `config`.
    pub fn with_http(config: &SyncConfig, store: Arc<dyn CatalogStore>) -> Result<Self> {
        let fetcher = HttpPageFetcher::new(
            &config.catalog_base_url,
            config.fetch_timeout,
            &config.user_agent,
        )?;
        Ok(Self::new(
            Arc::new(fetcher),
            store,
            config.fetch_concurrency,
            config.lock_stripes,
        ))
    }

    pub fn store(&self) -> &Arc<dyn CatalogStore> {
        &self.store
    }

    /// Fetch and normalize one product page without touching storage.
    #[instrument(skip(self))]
    pub async fn scrape(&self, product_id: i64) -> Result<ScrapedProduct> {
        let html = self
            .fetcher
            .fetch_product_page(product_id)
            .await
            .with_context(|| format!("fetching product {product_id}"))?;
        let raw = extract_product_data(&html)
            .with_context(|| format!("extracting product {product_id}"))?;
        let record = normalize_product(raw)
            .with_context(|| format!("normalizing product {product_id}"))?;
        Ok(record)
    }

    async fn reconcile_locked(&self, record: &ScrapedProduct) -> Result<ReconcileOutcome> {
        let _guard = self.locks.lock(record.brand.id).await;
        self.store.reconcile(record).await
    }

    /// Fetch, extract and reconcile a single product.
    #[instrument(skip(self))]
    pub async fn read(&self, product_id: i64) -> Result<(ScrapedProduct, ReconcileOutcome)> {
        let record = self.scrape(product_id).await?;
        let outcome = self.reconcile_locked(&record).await?;
        Ok((record, outcome))
    }

    /// Re-fetch every stored product and reconcile each in turn. The first
    /// failure aborts the run; products reconciled before it stay committed.
    #[instrument(skip(self))]
    pub async fn sync_all(&self) -> Result<SyncReport> {
        let ids = self.store.known_product_ids().await?;
        info!(
            products = ids.len(),
            concurrency = self.fetch_concurrency,
            "sync: fetch stage"
        );

        let products: Vec<ScrapedProduct> = stream::iter(ids)
            .map(|id| self.scrape(id))
            .buffered(self.fetch_concurrency)
            .try_collect()
            .await?;

        info!(products = products.len(), "sync: reconcile stage");
        let mut outcomes = Vec::with_capacity(products.len());
        for record in &products {
            outcomes.push(self.reconcile_locked(record).await?);
        }

        let prices: usize = outcomes.iter().map(|o| o.prices_inserted).sum();
        info!(products = products.len(), prices, "sync complete");
        Ok(SyncReport { products, outcomes })
    }
}
