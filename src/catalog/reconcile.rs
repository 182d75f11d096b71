//! Decides which catalog rows a scraped product needs and applies them
//! through a [`CatalogGateway`].
//!
//! The decision itself is the pure [`decide`] table; [`reconcile`] performs
//! the top-down existence checks (brand, then product, then variants),
//! issues the planned inserts and always appends one price observation per
//! scraped variant.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::catalog::ids::new_price_id;
use crate::catalog::models::{Brand, PriceObservation, Product, ScrapedProduct, Variant};

/// Row-level access used by the reconciler. Implementations are expected to
/// run every call of one reconciliation inside a single transaction.
#[async_trait]
pub trait CatalogGateway: Send {
    async fn find_brand(&mut self, id: i64) -> Result<Option<Brand>>;
    async fn find_product(&mut self, id: i64) -> Result<Option<Product>>;
    async fn find_variants_by_product(&mut self, product_id: i64) -> Result<Vec<Variant>>;
    async fn insert_brand(&mut self, brand: &Brand) -> Result<Brand>;
    async fn insert_product(&mut self, product: &Product) -> Result<Product>;
    async fn insert_variants(&mut self, variants: &[Variant]) -> Result<Vec<Variant>>;
    async fn insert_prices(&mut self, prices: &[PriceObservation]) -> Result<Vec<PriceObservation>>;
}

/// Inserts required for one product. Price observations are not part of the
/// plan because they are appended unconditionally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WritePlan {
    pub insert_brand: bool,
    pub insert_product: bool,
    pub insert_variants: bool,
}

impl WritePlan {
    pub const EVERYTHING: Self = Self {
        insert_brand: true,
        insert_product: true,
        insert_variants: true,
    };
    pub const PRODUCT_AND_VARIANTS: Self = Self {
        insert_brand: false,
        insert_product: true,
        insert_variants: true,
    };
    pub const VARIANTS_ONLY: Self = Self {
        insert_brand: false,
        insert_product: false,
        insert_variants: true,
    };
    pub const PRICES_ONLY: Self = Self {
        insert_brand: false,
        insert_product: false,
        insert_variants: false,
    };
}

/// Decision table for one product.
///
/// A missing parent forces insertion of everything below it, whatever the
/// lower-level flags say. Variant existence is "any variant stored for the
/// product", not a per-variant check: a product whose variant set grew since
/// the last run gets no variant inserts.
pub fn decide(brand_exists: bool, product_exists: bool, any_variant_exists: bool) -> WritePlan {
    match (brand_exists, product_exists, any_variant_exists) {
        (false, _, _) => WritePlan::EVERYTHING,
        (true, false, _) => WritePlan::PRODUCT_AND_VARIANTS,
        (true, true, false) => WritePlan::VARIANTS_ONLY,
        (true, true, true) => WritePlan::PRICES_ONLY,
    }
}

/// Writes performed by one reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileOutcome {
    pub product_id: i64,
    pub plan: WritePlan,
    pub brand_inserted: bool,
    pub product_inserted: bool,
    pub variants_inserted: usize,
    pub prices_inserted: usize,
}

/// One observation per scraped variant, all stamped with `observed_at`.
pub fn price_observations(record: &ScrapedProduct, observed_at: DateTime<Utc>) -> Vec<PriceObservation> {
    record
        .variants
        .iter()
        .map(|v| PriceObservation {
            id: new_price_id(),
            variant_id: v.id,
            price: v.price,
            created_at: observed_at,
            in_stock: v.has_stock,
        })
        .collect()
}

pub async fn reconcile<G>(
    gateway: &mut G,
    record: &ScrapedProduct,
    observed_at: DateTime<Utc>,
) -> Result<ReconcileOutcome>
where
    G: CatalogGateway + ?Sized,
{
    let brand_exists = gateway
        .find_brand(record.brand.id)
        .await
        .with_context(|| format!("looking up brand {}", record.brand.id))?
        .is_some();
    let product_exists = brand_exists
        && gateway
            .find_product(record.id)
            .await
            .with_context(|| format!("looking up product {}", record.id))?
            .is_some();
    let any_variant_exists = product_exists
        && !gateway
            .find_variants_by_product(record.id)
            .await
            .with_context(|| format!("looking up variants of product {}", record.id))?
            .is_empty();

    let plan = decide(brand_exists, product_exists, any_variant_exists);
    debug!(
        product_id = record.id,
        brand_id = record.brand.id,
        brand_exists,
        product_exists,
        any_variant_exists,
        ?plan,
        "reconcile plan"
    );

    let mut outcome = ReconcileOutcome {
        product_id: record.id,
        plan,
        ..Default::default()
    };

    if plan.insert_brand {
        gateway
            .insert_brand(&record.brand)
            .await
            .with_context(|| format!("inserting brand {}", record.brand.id))?;
        outcome.brand_inserted = true;
    }
    if plan.insert_product {
        gateway
            .insert_product(&record.product())
            .await
            .with_context(|| format!("inserting product {}", record.id))?;
        outcome.product_inserted = true;
    }
    if plan.insert_variants {
        let inserted = gateway
            .insert_variants(&record.variant_rows())
            .await
            .with_context(|| format!("inserting variants of product {}", record.id))?;
        outcome.variants_inserted = inserted.len();
    }

    let prices = price_observations(record, observed_at);
    let inserted = gateway
        .insert_prices(&prices)
        .await
        .with_context(|| format!("inserting price observations for product {}", record.id))?;
    outcome.prices_inserted = inserted.len();

    info!(
        product_id = outcome.product_id,
        brand_inserted = outcome.brand_inserted,
        product_inserted = outcome.product_inserted,
        variants_inserted = outcome.variants_inserted,
        prices_inserted = outcome.prices_inserted,
        "product reconciled"
    );
    Ok(outcome)
}
