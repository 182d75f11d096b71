use anyhow::Result;
use async_trait::async_trait;

use crate::catalog::models::{CatalogEntry, ScrapedProduct};
use crate::catalog::reconcile::ReconcileOutcome;

/// Storage seam for the sync pipeline and the HTTP handlers.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// IDs of every stored product, ascending.
    async fn known_product_ids(&self) -> Result<Vec<i64>>;

    /// Reconcile one scraped product atomically: either every planned insert
    /// and price observation lands, or none does.
    async fn reconcile(&self, record: &ScrapedProduct) -> Result<ReconcileOutcome>;

    /// Every stored product with brand, variants and price history.
    async fn catalog(&self) -> Result<Vec<CatalogEntry>>;

    /// Cheap connectivity probe for health checks.
    async fn ping(&self) -> Result<()>;
}
