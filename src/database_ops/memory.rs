//! In-process catalog used by tests and by `read --dry-run`.
//!
//! Primary and foreign keys are enforced the way the Postgres schema
//! enforces them, and error messages name the same constraints, so the
//! reconciler sees the same failures it would see against the database.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use tokio::sync::Mutex;

use crate::catalog::models::{
    Brand, CatalogEntry, PriceObservation, Product, ScrapedProduct, Variant, VariantHistory,
};
use crate::catalog::reconcile::{reconcile, CatalogGateway, ReconcileOutcome};
use crate::database_ops::store::CatalogStore;

#[derive(Debug, Clone, Default)]
pub struct CatalogState {
    pub brands: BTreeMap<i64, Brand>,
    pub products: BTreeMap<i64, Product>,
    pub variants: BTreeMap<i64, Variant>,
    pub prices: Vec<PriceObservation>,
}

fn duplicate_key(constraint: &str, id: impl std::fmt::Display) -> anyhow::Error {
    anyhow::anyhow!(
        "duplicate key value violates unique constraint \"{constraint}\" (id={id})"
    )
}

fn missing_parent(constraint: &str, id: i64) -> anyhow::Error {
    anyhow::anyhow!(
        "insert violates foreign key constraint \"{constraint}\" (referenced id={id} not present)"
    )
}

#[async_trait]
impl CatalogGateway for CatalogState {
    async fn find_brand(&mut self, id: i64) -> Result<Option<Brand>> {
        Ok(self.brands.get(&id).cloned())
    }

    async fn find_product(&mut self, id: i64) -> Result<Option<Product>> {
        Ok(self.products.get(&id).cloned())
    }

    async fn find_variants_by_product(&mut self, product_id: i64) -> Result<Vec<Variant>> {
        Ok(self
            .variants
            .values()
            .filter(|v| v.product_id == product_id)
            .cloned()
            .collect())
    }

    async fn insert_brand(&mut self, brand: &Brand) -> Result<Brand> {
        if self.brands.contains_key(&brand.id) {
            return Err(duplicate_key("brands_pkey", brand.id));
        }
        self.brands.insert(brand.id, brand.clone());
        Ok(brand.clone())
    }

    async fn insert_product(&mut self, product: &Product) -> Result<Product> {
        if self.products.contains_key(&product.id) {
            return Err(duplicate_key("products_pkey", product.id));
        }
        if !self.brands.contains_key(&product.brand_id) {
            return Err(missing_parent("products_brand_id_fkey", product.brand_id));
        }
        self.products.insert(product.id, product.clone());
        Ok(product.clone())
    }

    // Batch inserts validate every row first so a failing batch writes nothing,
    // like a single multi-row INSERT.
    async fn insert_variants(&mut self, variants: &[Variant]) -> Result<Vec<Variant>> {
        let mut seen = std::collections::HashSet::new();
        for v in variants {
            if self.variants.contains_key(&v.id) || !seen.insert(v.id) {
                return Err(duplicate_key("variants_pkey", v.id));
            }
            if !self.products.contains_key(&v.product_id) {
                return Err(missing_parent("variants_product_id_fkey", v.product_id));
            }
        }
        for v in variants {
            self.variants.insert(v.id, v.clone());
        }
        Ok(variants.to_vec())
    }

    async fn insert_prices(&mut self, prices: &[PriceObservation]) -> Result<Vec<PriceObservation>> {
        let mut seen = std::collections::HashSet::new();
        for p in prices {
            if self.prices.iter().any(|existing| existing.id == p.id) || !seen.insert(p.id.as_str()) {
                return Err(duplicate_key("prices_pkey", &p.id));
            }
            if !self.variants.contains_key(&p.variant_id) {
                return Err(missing_parent("prices_variant_id_fkey", p.variant_id));
            }
        }
        self.prices.extend_from_slice(prices);
        Ok(prices.to_vec())
    }
}

impl CatalogState {
    pub fn catalog_entries(&self) -> Vec<CatalogEntry> {
        self.products
            .values()
            .map(|product| {
                let variants = self
                    .variants
                    .values()
                    .filter(|v| v.product_id == product.id)
                    .map(|variant| {
                        let mut prices: Vec<PriceObservation> = self
                            .prices
                            .iter()
                            .filter(|p| p.variant_id == variant.id)
                            .cloned()
                            .collect();
                        prices.sort_by(|a, b| b.created_at.cmp(&a.created_at));
                        VariantHistory {
                            variant: variant.clone(),
                            prices,
                        }
                    })
                    .collect();
                CatalogEntry {
                    product: product.clone(),
                    brand: self.brands.get(&product.brand_id).cloned(),
                    variants,
                }
            })
            .collect()
    }
}

/// Catalog store over a [`CatalogState`] behind an async mutex. Each
/// reconciliation works on a copy that replaces the state only on success.
#[derive(Debug, Default)]
pub struct MemoryCatalogStore {
    state: Mutex<CatalogState>,
}

impl MemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn snapshot(&self) -> CatalogState {
        self.state.lock().await.clone()
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalogStore {
    async fn known_product_ids(&self) -> Result<Vec<i64>> {
        Ok(self.state.lock().await.products.keys().copied().collect())
    }

    async fn reconcile(&self, record: &ScrapedProduct) -> Result<ReconcileOutcome> {
        let mut guard = self.state.lock().await;
        let mut scratch = guard.clone();
        let outcome = reconcile(&mut scratch, record, Utc::now()).await?;
        *guard = scratch;
        Ok(outcome)
    }

    async fn catalog(&self) -> Result<Vec<CatalogEntry>> {
        Ok(self.state.lock().await.catalog_entries())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

/// Seed a store with a product that already exists in full (used by tests in
/// several modules).
#[cfg(test)]
pub(crate) async fn seeded_store(records: &[ScrapedProduct]) -> MemoryCatalogStore {
    let store = MemoryCatalogStore::new();
    for record in records {
        if let Err(e) = store.reconcile(record).await {
            panic!("seeding failed: {e:#}");
        }
    }
    store
}
